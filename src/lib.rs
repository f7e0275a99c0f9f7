//! Line-oriented TCP chat relay
//!
//! Clients connect over TCP, send a display name as their first line, and every
//! following line is relayed to the connected clients as `[name]: text`. The
//! server keeps a registry of active clients behind one lock and funnels every
//! outbound line through a single dispatcher task so broadcasts never interleave.

pub mod client;
pub mod config;
pub mod error;
pub mod message;
pub mod server;
pub mod transport;

pub use client::{ChatClient, ClientConfig};
pub use error::{ChatError, Result};
pub use message::{Broadcast, ChatEvent};
pub use server::{ChatHub, ChatServer, ClientRegistry, ClientState, Dispatcher, Session};

use std::fmt;
use std::net::SocketAddr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Get current timestamp in milliseconds since UNIX epoch
pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Opaque identity of one accepted connection
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ClientId(Uuid);

impl ClientId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Which registry entries receive a broadcast
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FanOut {
    /// Every alive client, the sender included
    #[default]
    All,
    /// Every alive client except the one that produced the message
    ExcludeSender,
}

/// Chat server configuration
#[derive(Clone, Debug)]
pub struct ChatConfig {
    /// Server listen address
    pub bind_addr: SocketAddr,
    /// Maximum number of registered clients, unlimited when `None`
    pub max_connections: Option<usize>,
    /// Close sessions that send nothing for this long, never when `None`
    pub idle_timeout: Option<Duration>,
    /// Maximum length of one inbound line in bytes
    pub max_line_length: usize,
    /// Broadcast recipients
    pub fan_out: FanOut,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            max_connections: None,
            idle_timeout: None,
            max_line_length: 64 * 1024,
            fan_out: FanOut::All,
        }
    }
}
