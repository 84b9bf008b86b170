//! Interactive client: one connection, two tasks.
//!
//! The send task forwards console lines to the server; the receive task
//! prints what the server says. Both share the connection's [`LineWriter`],
//! a closing flag and a [`CancellationToken`]. When the receive task ends
//! for any reason it cancels the token, which stops the send task even while
//! it is parked waiting for console input.

use std::{
    future::Future,
    io::BufRead,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
};

use tokio::{
    io::{self, AsyncRead, AsyncWrite, AsyncWriteExt},
    net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    select,
    sync::mpsc,
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    channel::{LineChannel, LineReader, LineWriter},
    command::{
        CLIENT_RECEIVE_COMMANDS, CLIENT_SEND_COMMANDS, ConsoleCommand, ServerReply, message_text,
    },
    config::ClientConfig,
    error::{ChannelError, ClientError},
};

pub const CLOSED_NOTICE: &str = "The connection to the server has been closed.";
pub const DROPPED_NOTICE: &str = "connection dropped by the server.";
pub const HUNG_UP_NOTICE: &str = "The server closed the connection.";
pub const INTERRUPTED_NOTICE: &str = "Client shut down (Keyboard interrupt)";

/// Line sent on the operator's behalf when console input runs out.
const CLOSE_REQUEST: &str = "CLOSE";

/// How a client session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientExit {
    /// The server acknowledged our `CLOSE`.
    Confirmed,
    /// The server ended the stream without a confirmation.
    ServerClosed,
    ConnectionLost,
    Interrupted,
}

impl ClientExit {
    pub fn notice(self) -> &'static str {
        match self {
            ClientExit::Confirmed => CLOSED_NOTICE,
            ClientExit::ServerClosed => HUNG_UP_NOTICE,
            ClientExit::ConnectionLost => DROPPED_NOTICE,
            ClientExit::Interrupted => INTERRUPTED_NOTICE,
        }
    }
}

pub struct ClientConnection<R, W> {
    reader: LineReader<R>,
    writer: LineWriter<W>,
}

impl ClientConnection<OwnedReadHalf, OwnedWriteHalf> {
    /// Resolves `host:port` and connects to the first address that accepts.
    pub async fn connect(config: &ClientConfig) -> Result<Self, ClientError> {
        let target = config.target();
        let addrs = tokio::net::lookup_host(&target)
            .await
            .map_err(|source| ClientError::Resolve {
                target: target.clone(),
                source,
            })?;

        let mut last_error = None;
        for addr in addrs {
            match TcpStream::connect(addr).await {
                Ok(stream) => {
                    info!(%addr, "connected");
                    let channel = LineChannel::from_tcp(stream, config.max_line_bytes);
                    return Ok(Self::new(channel));
                }
                Err(source) => {
                    debug!(%addr, error = ?source, "connect attempt failed");
                    last_error = Some(ClientError::Connect { addr, source });
                }
            }
        }

        Err(last_error.unwrap_or(ClientError::NoAddress(target)))
    }
}

impl<R, W> ClientConnection<R, W>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(channel: LineChannel<R, W>) -> Self {
        let (reader, writer) = channel.split();
        Self { reader, writer }
    }

    /// Runs the send and receive tasks until the connection ends.
    ///
    /// `input` yields console lines, `output` receives everything meant for
    /// the operator, and `interrupt` resolving shuts the client down.
    pub async fn run<O, F>(
        self,
        input: mpsc::Receiver<String>,
        output: O,
        interrupt: F,
    ) -> ClientExit
    where
        O: AsyncWrite + Unpin + Send + 'static,
        F: Future<Output = ()>,
    {
        let ClientConnection { reader, writer } = self;
        let closing = Arc::new(AtomicBool::new(false));
        let stop_sending = CancellationToken::new();
        let stop_receiving = CancellationToken::new();

        let send_task = tokio::spawn(send_loop(
            writer.clone(),
            input,
            Arc::clone(&closing),
            stop_sending.clone(),
        ));
        let mut receive_task = tokio::spawn(receive_loop(
            reader,
            writer,
            output,
            closing,
            stop_sending.clone(),
            stop_receiving.clone(),
        ));

        tokio::pin!(interrupt);
        let exit = select! {
            joined = &mut receive_task => joined,
            _ = &mut interrupt => {
                stop_receiving.cancel();
                (&mut receive_task).await
            }
        };

        let exit = exit.unwrap_or_else(|err| {
            warn!(error = ?err, "receive task failed");
            ClientExit::ConnectionLost
        });
        // The receive task normally cancels this itself, unless it panicked.
        stop_sending.cancel();
        await_task(send_task, "send").await;
        exit
    }

    pub async fn run_until_ctrl_c<O>(
        self,
        input: mpsc::Receiver<String>,
        output: O,
    ) -> ClientExit
    where
        O: AsyncWrite + Unpin + Send + 'static,
    {
        self.run(input, output, crate::ctrl_c()).await
    }
}

async fn await_task(task: JoinHandle<()>, name: &str) {
    if let Err(err) = task.await {
        warn!(task = name, error = ?err, "client task failed");
    }
}

async fn send_loop<W>(
    writer: LineWriter<W>,
    mut input: mpsc::Receiver<String>,
    closing: Arc<AtomicBool>,
    cancel: CancellationToken,
) where
    W: AsyncWrite + Unpin,
{
    while !closing.load(Ordering::SeqCst) {
        let line = select! {
            _ = cancel.cancelled() => return,
            line = input.recv() => line,
        };

        // Running out of console input closes the session politely.
        let (line, command) = match line {
            Some(line) => {
                let command = CLIENT_SEND_COMMANDS
                    .dispatch(&line)
                    .unwrap_or(ConsoleCommand::Forward);
                (line, command)
            }
            None => (CLOSE_REQUEST.to_string(), ConsoleCommand::Close),
        };

        match writer.write_line(&line).await {
            Ok(()) => {}
            Err(ChannelError::EmbeddedNewline) => {
                warn!("console line contains a newline, not sent");
                continue;
            }
            Err(err) => {
                debug!(error = %err, "send failed");
                return;
            }
        }

        if command == ConsoleCommand::Close {
            closing.store(true, Ordering::SeqCst);
        }
    }
}

async fn receive_loop<R, W, O>(
    mut reader: LineReader<R>,
    writer: LineWriter<W>,
    mut output: O,
    closing: Arc<AtomicBool>,
    stop_sending: CancellationToken,
    interrupt: CancellationToken,
) -> ClientExit
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
    O: AsyncWrite + Unpin,
{
    let exit = loop {
        let line = select! {
            _ = interrupt.cancelled() => break ClientExit::Interrupted,
            line = reader.read_line() => line,
        };

        match line {
            Ok(Some(line)) => match CLIENT_RECEIVE_COMMANDS.dispatch(&line) {
                Some(ServerReply::Message) => {
                    report(write_console(&mut output, message_text(&line)).await);
                }
                Some(ServerReply::CloseConfirm) => {
                    closing.store(true, Ordering::SeqCst);
                    break ClientExit::Confirmed;
                }
                None => debug!(%line, "dropping unrecognised server line"),
            },
            Ok(None) => break ClientExit::ServerClosed,
            Err(err) => {
                debug!(error = %err, "receive failed");
                break ClientExit::ConnectionLost;
            }
        }
    };

    closing.store(true, Ordering::SeqCst);
    stop_sending.cancel();

    report(write_console(&mut output, exit.notice()).await);
    if let Err(err) = writer.shutdown().await {
        debug!(error = %err, "failed to shut down connection");
    }

    exit
}

async fn write_console<O>(output: &mut O, line: &str) -> io::Result<()>
where
    O: AsyncWrite + Unpin,
{
    output.write_all(line.as_bytes()).await?;
    output.write_all(b"\n").await?;
    output.flush().await
}

fn report(result: io::Result<()>) {
    if let Err(err) = result {
        debug!(error = ?err, "failed to write to console");
    }
}

/// Reads stdin on a dedicated OS thread and forwards each line.
///
/// A blocking console read cannot be cancelled, so it stays off the runtime;
/// the thread exits once the receiver is dropped and the next line arrives,
/// or with the process.
pub fn spawn_console_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);

    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if tx.blocking_send(line).is_err() {
                        break;
                    }
                }
                Err(err) => {
                    warn!(error = ?err, "failed to read console input");
                    break;
                }
            }
        }
    });

    rx
}
