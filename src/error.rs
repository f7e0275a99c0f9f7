//! Error handling for the chat relay

use std::fmt;

use crate::ClientId;

/// Result type alias for chat operations
pub type Result<T> = std::result::Result<T, ChatError>;

/// Chat relay error types
#[derive(Debug, Clone)]
pub enum ChatError {
    /// Listener failed to accept a connection
    Accept(String),
    /// Reading from a client stream failed
    Read(String),
    /// Client stream ended before the session expected it to
    EndOfInput,
    /// Writing to a client stream failed
    Write(String),
    /// A client with this id is already registered
    DuplicateClient(ClientId),
    /// Resource limit exceeded
    ResourceLimit(String),
    /// Idle timeout elapsed
    Timeout(String),
    /// Other network errors (bind, local address lookup)
    Network(String),
    /// Configuration error
    Config(String),
    /// Server internal error
    Internal(String),
}

impl ChatError {
    /// Get error code for this error type
    pub fn code(&self) -> u32 {
        match self {
            ChatError::Accept(_) => 1000,
            ChatError::Read(_) => 1001,
            ChatError::EndOfInput => 1002,
            ChatError::Write(_) => 1003,
            ChatError::DuplicateClient(_) => 1004,
            ChatError::ResourceLimit(_) => 1005,
            ChatError::Timeout(_) => 1006,
            ChatError::Network(_) => 1007,
            ChatError::Config(_) => 1008,
            ChatError::Internal(_) => 1009,
        }
    }

    /// Get human-readable error message
    pub fn message(&self) -> String {
        match self {
            ChatError::Accept(msg)
            | ChatError::Read(msg)
            | ChatError::Write(msg)
            | ChatError::ResourceLimit(msg)
            | ChatError::Timeout(msg)
            | ChatError::Network(msg)
            | ChatError::Config(msg)
            | ChatError::Internal(msg) => msg.clone(),
            ChatError::EndOfInput => "stream closed".to_string(),
            ChatError::DuplicateClient(id) => id.to_string(),
        }
    }

    /// Whether this error only affects a single session
    pub fn is_session_local(&self) -> bool {
        matches!(
            self,
            ChatError::Read(_)
                | ChatError::EndOfInput
                | ChatError::Write(_)
                | ChatError::Timeout(_)
        )
    }

    /// Create an accept error
    pub fn accept<T: Into<String>>(msg: T) -> Self {
        ChatError::Accept(msg.into())
    }

    /// Create a read error
    pub fn read<T: Into<String>>(msg: T) -> Self {
        ChatError::Read(msg.into())
    }

    /// Create a write error
    pub fn write<T: Into<String>>(msg: T) -> Self {
        ChatError::Write(msg.into())
    }

    /// Create a resource limit error
    pub fn resource_limit<T: Into<String>>(msg: T) -> Self {
        ChatError::ResourceLimit(msg.into())
    }

    /// Create a timeout error
    pub fn timeout<T: Into<String>>(msg: T) -> Self {
        ChatError::Timeout(msg.into())
    }

    /// Create a network error
    pub fn network<T: Into<String>>(msg: T) -> Self {
        ChatError::Network(msg.into())
    }

    /// Create a configuration error
    pub fn config<T: Into<String>>(msg: T) -> Self {
        ChatError::Config(msg.into())
    }

    /// Create an internal error
    pub fn internal<T: Into<String>>(msg: T) -> Self {
        ChatError::Internal(msg.into())
    }
}

impl fmt::Display for ChatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatError::Accept(msg) => write!(f, "Accept error: {}", msg),
            ChatError::Read(msg) => write!(f, "Read error: {}", msg),
            ChatError::EndOfInput => write!(f, "End of input"),
            ChatError::Write(msg) => write!(f, "Write error: {}", msg),
            ChatError::DuplicateClient(id) => write!(f, "Client already registered: {}", id),
            ChatError::ResourceLimit(msg) => write!(f, "Resource limit exceeded: {}", msg),
            ChatError::Timeout(msg) => write!(f, "Timeout: {}", msg),
            ChatError::Network(msg) => write!(f, "Network error: {}", msg),
            ChatError::Config(msg) => write!(f, "Configuration error: {}", msg),
            ChatError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ChatError {}

impl From<std::io::Error> for ChatError {
    fn from(err: std::io::Error) -> Self {
        ChatError::Network(format!("IO error: {}", err))
    }
}

impl From<tokio::time::error::Elapsed> for ChatError {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        ChatError::Timeout(format!("no input: {}", err))
    }
}

impl From<std::net::AddrParseError> for ChatError {
    fn from(err: std::net::AddrParseError) -> Self {
        ChatError::Config(format!("invalid address: {}", err))
    }
}
