//! Chat events and their wire rendering
//!
//! Every event renders to exactly one newline-terminated line.

use std::fmt;
use std::net::SocketAddr;

use bytes::Bytes;

use crate::ClientId;

/// Something worth telling every client about
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChatEvent {
    /// A client finished its handshake
    Joined { name: String },
    /// A client sent a line
    Text { name: String, text: String },
    /// A client closed its stream cleanly
    Left { name: String },
}

impl ChatEvent {
    pub fn joined(name: impl Into<String>) -> Self {
        ChatEvent::Joined { name: name.into() }
    }

    pub fn text(name: impl Into<String>, text: impl Into<String>) -> Self {
        ChatEvent::Text {
            name: name.into(),
            text: text.into(),
        }
    }

    pub fn left(name: impl Into<String>) -> Self {
        ChatEvent::Left { name: name.into() }
    }
}

impl fmt::Display for ChatEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatEvent::Joined { name } => write!(f, ">>> {} joined", name),
            ChatEvent::Text { name, text } => write!(f, "[{}]: {}", name, text),
            ChatEvent::Left { name } => write!(f, ">>> {} left", name),
        }
    }
}

/// A queued event together with the client that caused it
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Broadcast {
    pub origin: Option<ClientId>,
    pub event: ChatEvent,
}

impl Broadcast {
    pub fn new(origin: Option<ClientId>, event: ChatEvent) -> Self {
        Self { origin, event }
    }

    /// Render the event as one wire line, terminator included
    pub fn to_wire(&self) -> Bytes {
        Bytes::from(format!("{}\n", self.event))
    }
}

/// First line a client receives after connecting
pub fn welcome_line(local_addr: SocketAddr) -> Bytes {
    Bytes::from(format!("Hello, you are connected to {}\n", local_addr))
}
