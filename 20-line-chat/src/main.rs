use anyhow::Result;
use clap::Parser;
use tracing::{debug, info, warn};

use line_chat::{
    cli::{Cli, Command},
    client::{self, ClientConnection},
    config::{ClientConfig, ServerConfig},
    server::Server,
};

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Command::Server(args) => run_server(ServerConfig::from(args)).await?,
        Command::Client(args) => run_client(ClientConfig::from(args)).await,
    }

    Ok(())
}

async fn run_server(config: ServerConfig) -> Result<()> {
    let server = match Server::bind(config).await {
        Ok(server) => server,
        Err(err) => {
            warn!(error = ?err, "server failed to start");
            println!("{err}");
            return Ok(());
        }
    };

    let addr = server.local_addr()?;
    info!("server listening on {}", addr);
    if let Err(err) = server.run_until_ctrl_c().await {
        warn!("server exited with error: {err:?}");
        return Err(err);
    }

    println!("Server shut down");
    Ok(())
}

async fn run_client(config: ClientConfig) {
    let connection = match ClientConnection::connect(&config).await {
        Ok(connection) => connection,
        Err(err) => {
            debug!(error = ?err, "connection failed");
            println!("Can't connect to server host.");
            return;
        }
    };
    println!("Connection established with the server.");

    let input = client::spawn_console_reader();
    let exit = connection
        .run_until_ctrl_c(input, tokio::io::stdout())
        .await;
    info!(?exit, "client finished");
}
