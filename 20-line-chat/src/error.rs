use std::{io, net::SocketAddr, string::FromUtf8Error};

use thiserror::Error;

/// Failures surfaced by a [`crate::channel::LineReader`] or [`crate::channel::LineWriter`].
///
/// Every variant is terminal for the connection it came from: callers close
/// the channel and move on.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("connection error: {0}")]
    Connection(#[from] io::Error),

    #[error("peer closed the connection in the middle of a line")]
    Truncated,

    #[error("line exceeds the {limit} byte limit")]
    LineTooLong { limit: usize },

    #[error("line is not valid UTF-8")]
    InvalidUtf8(#[from] FromUtf8Error),

    #[error("outgoing text contains an embedded newline")]
    EmbeddedNewline,
}

impl ChannelError {
    /// True when the peer is gone (reset, broken pipe, abrupt EOF) rather than
    /// misbehaving at the protocol level.
    pub fn is_peer_gone(&self) -> bool {
        match self {
            ChannelError::Truncated => true,
            ChannelError::Connection(err) => matches!(
                err.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::UnexpectedEof
                    | io::ErrorKind::NotConnected
            ),
            _ => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}, maybe the port is already in use?")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("could not resolve {target}")]
    Resolve {
        target: String,
        #[source]
        source: io::Error,
    },

    #[error("no address found for {0}")]
    NoAddress(String),

    #[error("failed to connect to {addr}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
}
