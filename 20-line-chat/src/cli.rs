use clap::{Args, Parser, Subcommand};

use crate::config::{
    ClientConfig, DEFAULT_MAX_LINE_BYTES, DEFAULT_PORT, DEFAULT_WELCOME, ServerConfig,
    local_host_name,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Accept client connections on the loopback interface.
    Server(ServerArgs),
    /// Connect to a server and exchange commands from the console.
    Client(ClientArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ServerArgs {
    /// Port to listen on. Use 0 for an ephemeral port.
    #[arg(default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Longest line accepted from a client, in bytes.
    #[arg(long, default_value_t = DEFAULT_MAX_LINE_BYTES)]
    pub max_line_bytes: usize,

    /// Name announced in HELLO replies. Defaults to the machine's host name.
    #[arg(long)]
    pub name: Option<String>,

    /// Do not greet clients when they connect.
    #[arg(long)]
    pub no_welcome: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ClientArgs {
    /// Host name or IP address of the server.
    pub host: String,

    /// Port the server listens on.
    #[arg(default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Longest line accepted from the server, in bytes.
    #[arg(long, default_value_t = DEFAULT_MAX_LINE_BYTES)]
    pub max_line_bytes: usize,
}

impl From<ServerArgs> for ServerConfig {
    fn from(args: ServerArgs) -> Self {
        Self {
            port: args.port,
            max_line_bytes: args.max_line_bytes,
            host_name: args.name.unwrap_or_else(local_host_name),
            welcome: (!args.no_welcome).then(|| DEFAULT_WELCOME.to_string()),
        }
    }
}

impl From<ClientArgs> for ClientConfig {
    fn from(args: ClientArgs) -> Self {
        Self {
            host: args.host,
            port: args.port,
            max_line_bytes: args.max_line_bytes,
        }
    }
}
