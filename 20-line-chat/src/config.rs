use std::net::{Ipv4Addr, SocketAddr};

use sysinfo::System;

pub const DEFAULT_PORT: u16 = 1991;

/// Upper bound on a single protocol line, delimiter excluded.
pub const DEFAULT_MAX_LINE_BYTES: usize = 64 * 1024;

pub const DEFAULT_WELCOME: &str = "Welcome aboard !";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub max_line_bytes: usize,
    /// Name announced in `HELLO` replies.
    pub host_name: String,
    /// Sent as `MSG <welcome>` right after accept.
    pub welcome: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
            host_name: local_host_name(),
            welcome: Some(DEFAULT_WELCOME.to_string()),
        }
    }
}

impl ServerConfig {
    /// The server only ever listens on loopback.
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::LOCALHOST, self.port))
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    pub max_line_bytes: usize,
}

impl ClientConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
        }
    }

    pub fn target(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

pub fn local_host_name() -> String {
    System::host_name().unwrap_or_else(|| "localhost".to_string())
}
