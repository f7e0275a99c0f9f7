//! Accepted client connection
//!
//! Splits a byte stream into its line-reading half and its shared output half.

use std::net::SocketAddr;

use tokio::io::{AsyncRead, AsyncWrite, ReadHalf};
use tokio::net::TcpStream;

use super::framer::LineFramer;
use super::output::OutputHandle;

/// A single client connection, ready to be handed to a session
pub struct Connection<S> {
    pub framer: LineFramer<ReadHalf<S>>,
    pub output: OutputHandle,
    pub peer_addr: SocketAddr,
    pub local_addr: SocketAddr,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    /// Wrap any bidirectional stream
    pub fn new(
        stream: S,
        peer_addr: SocketAddr,
        local_addr: SocketAddr,
        max_line_length: usize,
    ) -> Self {
        let (read_half, write_half) = tokio::io::split(stream);

        Connection {
            framer: LineFramer::new(read_half, max_line_length),
            output: OutputHandle::new(write_half),
            peer_addr,
            local_addr,
        }
    }
}

impl Connection<TcpStream> {
    /// Wrap an accepted TCP stream
    pub fn from_tcp(
        stream: TcpStream,
        peer_addr: SocketAddr,
        max_line_length: usize,
    ) -> std::io::Result<Self> {
        // Nagle would hold back short chat lines
        stream.set_nodelay(true)?;
        let local_addr = stream.local_addr()?;
        Ok(Self::new(stream, peer_addr, local_addr, max_line_length))
    }
}
