//! Transport layer for line-oriented client streams
//!
//! This module provides:
//! - Newline framing over an async byte stream
//! - A shared, closeable output handle per client
//! - Connection splitting for accepted TCP streams

pub mod connection;
pub mod framer;
pub mod output;

pub use connection::Connection;
pub use framer::LineFramer;
pub use output::OutputHandle;
