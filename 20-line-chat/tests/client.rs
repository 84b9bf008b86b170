use std::time::Duration;

use anyhow::Result;
use line_chat::{
    channel::LineReader,
    client::{CLOSED_NOTICE, ClientConnection, ClientExit},
    config::{ClientConfig, ServerConfig},
    server::Server,
};
use tokio::{
    io::{DuplexStream, duplex},
    net::TcpListener,
    sync::{mpsc, oneshot},
    time::{sleep, timeout},
};

const WAIT: Duration = Duration::from_secs(2);

async fn next_line(console: &mut LineReader<DuplexStream>) -> Result<Option<String>> {
    Ok(timeout(WAIT, console.read_line()).await??)
}

#[tokio::test]
async fn client_talks_to_a_real_server() -> Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let server = Server::new(
        listener,
        ServerConfig {
            host_name: "test-host".into(),
            ..ServerConfig::default()
        },
    );
    let addr = server.local_addr()?;
    let registry = server.registry();
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let server_task = tokio::spawn(async move {
        let shutdown = async move {
            let _ = shutdown_rx.await;
        };
        let _ = server.run_until(shutdown).await;
    });

    let connection = ClientConnection::connect(&ClientConfig::new("127.0.0.1", addr.port())).await?;
    let (console_out, console_in) = duplex(1024);
    let mut console = LineReader::new(console_in, 1024);
    let (input, input_rx) = mpsc::channel(8);
    let client = tokio::spawn(connection.run(input_rx, console_out, std::future::pending()));

    assert_eq!(next_line(&mut console).await?.as_deref(), Some("Welcome aboard !"));

    input.send("HELLO".into()).await?;
    assert_eq!(
        next_line(&mut console).await?.as_deref(),
        Some("Hello from test-host")
    );

    input.send("XYZZY".into()).await?;
    assert_eq!(
        next_line(&mut console).await?.as_deref(),
        Some("Command not found")
    );

    input.send("CLOSE".into()).await?;
    assert_eq!(next_line(&mut console).await?.as_deref(), Some(CLOSED_NOTICE));
    assert_eq!(timeout(WAIT, client).await??, ClientExit::Confirmed);

    timeout(WAIT, async {
        while !registry.is_empty() {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await?;

    let _ = shutdown_tx.send(());
    let _ = server_task.await;
    Ok(())
}

#[tokio::test]
async fn connecting_to_a_closed_port_fails() -> Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();
    drop(listener);

    let result = ClientConnection::connect(&ClientConfig::new("127.0.0.1", port)).await;
    assert!(result.is_err());
    Ok(())
}
