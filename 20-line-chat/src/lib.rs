//! Line-oriented TCP chat: a command server and an interactive client.
//!
//! The wire protocol is plain UTF-8 text, one command per `\n`-terminated
//! line. Each module owns one concern:
//!
//! - [`channel`] frames a byte stream into lines and back.
//! - [`command`] holds the ordered, first-match dispatch tables.
//! - [`registry`] tracks live server sessions for bookkeeping.
//! - [`server`] accepts connections and runs one session task per client.
//! - [`client`] drives the send and receive tasks of a single connection.
//! - [`config`] and [`cli`] turn command-line arguments into settings.
//! - [`error`] defines the typed failures shared by the above.
//!
//! Tests use this crate directly to exercise both state machines over real
//! loopback sockets as well as in-memory pipes.

use tracing::warn;

pub mod channel;
pub mod cli;
pub mod client;
pub mod command;
pub mod config;
pub mod error;
pub mod registry;
pub mod server;

/// Resolves on Ctrl-C. If the handler cannot be installed it never resolves.
pub async fn ctrl_c() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = ?err, "failed to install ctrl-c handler");
        std::future::pending::<()>().await;
    }
}
