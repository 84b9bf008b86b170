use std::{future::Future, net::SocketAddr, sync::Arc};

use anyhow::Result;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::{TcpListener, TcpStream},
    select,
};
use tracing::{debug, info, warn};

use crate::{
    channel::{LineChannel, LineReader, LineWriter},
    command::{CLOSE_CONFIRM, SERVER_COMMANDS, ServerCommand, message_line},
    config::ServerConfig,
    error::{ChannelError, ServerError},
    registry::{Registration, SessionId, SessionRegistry},
};

pub struct Server {
    listener: TcpListener,
    config: Arc<ServerConfig>,
    registry: Arc<SessionRegistry>,
}

impl Server {
    /// Binds the loopback address from `config`.
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        let addr = config.listen_addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        Ok(Self::new(listener, config))
    }

    pub fn new(listener: TcpListener, config: ServerConfig) -> Self {
        Self {
            listener,
            config: Arc::new(config),
            registry: Arc::new(SessionRegistry::new()),
        }
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn registry(&self) -> Arc<SessionRegistry> {
        Arc::clone(&self.registry)
    }

    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let Server {
            listener,
            config,
            registry,
        } = self;
        tokio::pin!(shutdown);

        loop {
            select! {
                _ = &mut shutdown => {
                    info!(live_sessions = registry.len(), "server shutting down");
                    break;
                }
                accept_result = listener.accept() => {
                    handle_accept_result(accept_result, &config, &registry);
                }
            }
        }

        Ok(())
    }

    pub async fn run_until_ctrl_c(self) -> Result<()> {
        self.run_until(crate::ctrl_c()).await
    }
}

fn handle_accept_result(
    result: std::io::Result<(TcpStream, SocketAddr)>,
    config: &Arc<ServerConfig>,
    registry: &Arc<SessionRegistry>,
) {
    match result {
        Ok((stream, peer)) => spawn_session(stream, peer, config, registry),
        Err(err) => warn!(error = ?err, "failed to accept connection"),
    }
}

fn spawn_session(
    stream: TcpStream,
    peer: SocketAddr,
    config: &Arc<ServerConfig>,
    registry: &Arc<SessionRegistry>,
) {
    // Register before spawning so the entry exists from the moment of accept.
    let registration = registry.register(Some(peer));
    let channel = LineChannel::from_tcp(stream, config.max_line_bytes);
    let session = ClientSession::new(channel, registration, Arc::clone(config));

    tokio::spawn(async move {
        session.run().await;
    });
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connected,
    Closing,
    Closed,
}

/// Why a session's receive loop ended.
#[derive(Debug)]
pub enum SessionEnd {
    /// The client asked to `CLOSE` and was sent a confirmation.
    Closed,
    PeerDisconnected,
    Failed(ChannelError),
}

/// Server side of one accepted connection.
pub struct ClientSession<R, W> {
    reader: LineReader<R>,
    writer: LineWriter<W>,
    registration: Registration,
    config: Arc<ServerConfig>,
    state: SessionState,
}

impl<R, W> ClientSession<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(
        channel: LineChannel<R, W>,
        registration: Registration,
        config: Arc<ServerConfig>,
    ) -> Self {
        let (reader, writer) = channel.split();
        Self {
            reader,
            writer,
            registration,
            config,
            state: SessionState::Connected,
        }
    }

    pub fn id(&self) -> &SessionId {
        self.registration.id()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Serves the connection until it closes, then unregisters it.
    pub async fn run(mut self) -> SessionEnd {
        info!(session = %self.id(), "connected");

        let end = self.serve().await;
        self.finish(&end).await;
        end
    }

    async fn serve(&mut self) -> SessionEnd {
        if let Some(welcome) = self.config.welcome.as_deref() {
            if let Err(err) = self.send(&message_line(welcome)).await {
                return SessionEnd::Failed(err);
            }
        }

        while self.state == SessionState::Connected {
            let line = match self.reader.read_line().await {
                Ok(Some(line)) => line,
                Ok(None) => return SessionEnd::PeerDisconnected,
                Err(err) => return SessionEnd::Failed(err),
            };

            debug!(session = %self.id(), "<- {line}");
            if let Err(err) = self.dispatch(&line).await {
                return SessionEnd::Failed(err);
            }
        }

        SessionEnd::Closed
    }

    async fn dispatch(&mut self, line: &str) -> Result<(), ChannelError> {
        match SERVER_COMMANDS.dispatch(line) {
            Some(ServerCommand::Hello) => {
                let greeting = format!("Hello from {}", self.config.host_name);
                self.send(&message_line(&greeting)).await
            }
            Some(ServerCommand::Close) => {
                self.send(CLOSE_CONFIRM).await?;
                self.state = SessionState::Closing;
                Ok(())
            }
            Some(ServerCommand::NotFound) | None => {
                self.send(&message_line("Command not found")).await
            }
        }
    }

    async fn send(&self, line: &str) -> Result<(), ChannelError> {
        debug!(session = %self.id(), "-> {line}");
        self.writer.write_line(line).await
    }

    async fn finish(&mut self, end: &SessionEnd) {
        self.state = SessionState::Closed;

        if let Err(err) = self.writer.shutdown().await {
            debug!(session = %self.id(), error = ?err, "failed to shut down writer");
        }
        let connected_for = self
            .registration
            .info()
            .map(|info| info.connected_at.elapsed())
            .unwrap_or_default();
        self.registration.release();

        match end {
            SessionEnd::Closed => {
                info!(session = %self.id(), ?connected_for, "disconnected")
            }
            SessionEnd::PeerDisconnected => {
                info!(session = %self.id(), "peer hung up")
            }
            SessionEnd::Failed(err) if err.is_peer_gone() => {
                info!(session = %self.id(), error = %err, "connection reset")
            }
            SessionEnd::Failed(err) => {
                warn!(session = %self.id(), error = %err, "session closed with error")
            }
        }
    }
}
