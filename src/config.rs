//! Command-line configuration
//!
//! `serve` options become a [`ChatConfig`], `connect` options a
//! [`ClientConfig`]. Values clap cannot check on its own are validated in
//! `to_config`.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::client::ClientConfig;
use crate::error::{ChatError, Result};
use crate::{ChatConfig, FanOut};

/// Line-oriented TCP chat relay
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Verbose logging (DEBUG level)
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the chat server
    Serve(ServeArgs),
    /// Join a chat server from this terminal
    Connect(ConnectArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, short, default_value_t = 8080)]
    pub port: u16,

    /// Refuse clients beyond this many (unlimited if unset)
    #[arg(long, value_name = "NUM")]
    pub max_connections: Option<usize>,

    /// Disconnect clients that send nothing for this many seconds (never if unset)
    #[arg(long, value_name = "SECS")]
    pub idle_timeout: Option<u64>,

    /// Longest accepted input line in bytes
    #[arg(long, value_name = "BYTES", default_value_t = 64 * 1024)]
    pub max_line_length: usize,

    /// Do not send a client's own messages back to it
    #[arg(long, default_value_t = false)]
    pub no_echo: bool,
}

impl ServeArgs {
    pub fn to_config(&self) -> Result<ChatConfig> {
        let host: IpAddr = self
            .host
            .parse()
            .map_err(|e| ChatError::config(format!("invalid host '{}': {}", self.host, e)))?;

        if self.max_line_length == 0 {
            return Err(ChatError::config("max line length must be positive"));
        }
        if self.idle_timeout == Some(0) {
            return Err(ChatError::config("idle timeout must be positive"));
        }

        Ok(ChatConfig {
            bind_addr: SocketAddr::new(host, self.port),
            max_connections: self.max_connections,
            idle_timeout: self.idle_timeout.map(Duration::from_secs),
            max_line_length: self.max_line_length,
            fan_out: if self.no_echo {
                FanOut::ExcludeSender
            } else {
                FanOut::All
            },
        })
    }
}

#[derive(Args, Debug, Clone)]
pub struct ConnectArgs {
    /// Display name announced to other clients
    pub name: String,

    /// Server address
    #[arg(long, short, default_value = "127.0.0.1:8080", value_name = "HOST:PORT")]
    pub addr: String,
}

impl ConnectArgs {
    pub fn to_config(&self) -> Result<ClientConfig> {
        Ok(ClientConfig {
            server_addr: self.addr.parse()?,
            ..Default::default()
        })
    }
}
