//! Line chat client
//!
//! Connects to a chat server, sends the display name, and exchanges plain text
//! lines. [`ChatClient::run_interactive`] drives a terminal session: server
//! lines go to the output, input lines go to the server, `/quit` leaves.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::error::{ChatError, Result};

/// Local command that ends an interactive session
pub const QUIT_COMMAND: &str = "/quit";

/// Chat client configuration
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Server address to connect to
    pub server_addr: SocketAddr,
    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            connect_timeout_secs: 10,
        }
    }
}

/// Events that the client can receive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// A line from the server
    Line(String),
    /// Server closed the connection or reading failed
    Disconnected(String),
}

/// TCP chat client
pub struct ChatClient {
    config: ClientConfig,
    name: Option<String>,
    writer: Option<OwnedWriteHalf>,
}

impl ChatClient {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            name: None,
            writer: None,
        }
    }

    /// Connect and send `name` as the handshake line.
    ///
    /// Returns the stream of server lines, welcome line first.
    pub async fn connect(&mut self, name: &str) -> Result<mpsc::UnboundedReceiver<ClientEvent>> {
        info!("Connecting to chat server at {}", self.config.server_addr);

        let stream = tokio::time::timeout(
            Duration::from_secs(self.config.connect_timeout_secs),
            TcpStream::connect(self.config.server_addr),
        )
        .await
        .map_err(|_| ChatError::timeout("Connection timeout"))?
        .map_err(|e| ChatError::network(format!("Failed to connect: {}", e)))?;
        stream.set_nodelay(true)?;

        let (read_half, write_half) = stream.into_split();
        self.writer = Some(write_half);

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            let mut lines = BufReader::new(read_half).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if event_tx.send(ClientEvent::Line(line)).is_err() {
                            break;
                        }
                    }
                    Ok(None) => {
                        let _ = event_tx.send(ClientEvent::Disconnected("server closed".into()));
                        break;
                    }
                    Err(e) => {
                        let _ = event_tx.send(ClientEvent::Disconnected(e.to_string()));
                        break;
                    }
                }
            }
        });

        self.send_line(name).await?;
        self.name = Some(name.to_string());
        info!("Connected as '{}'", name);

        Ok(event_rx)
    }

    /// Send one chat line
    pub async fn send_message(&mut self, text: &str) -> Result<()> {
        self.send_line(text).await
    }

    async fn send_line(&mut self, text: &str) -> Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| ChatError::network("Not connected to server"))?;

        let mut line = String::with_capacity(text.len() + 1);
        line.push_str(text.trim_end_matches(['\r', '\n']));
        line.push('\n');

        writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| ChatError::write(e.to_string()))
    }

    /// Close the write side, which the server treats as a clean departure
    pub async fn disconnect(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.shutdown().await?;
            info!("Disconnected from chat server");
        }
        self.name = None;
        Ok(())
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn is_connected(&self) -> bool {
        self.writer.is_some()
    }

    /// Relay between a terminal and the server until `/quit`, end of input,
    /// or the server going away.
    pub async fn run_interactive<I, O>(mut self, name: &str, input: I, mut output: O) -> Result<()>
    where
        I: AsyncRead + Unpin,
        O: AsyncWrite + Unpin,
    {
        let mut events = self.connect(name).await?;
        let mut input = BufReader::new(input).lines();

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(ClientEvent::Line(line)) => {
                        output.write_all(line.as_bytes()).await?;
                        output.write_all(b"\n").await?;
                        output.flush().await?;
                    }
                    Some(ClientEvent::Disconnected(reason)) => {
                        debug!("Server connection ended: {}", reason);
                        output.write_all(b"Disconnected from server\n").await?;
                        output.flush().await?;
                        return Ok(());
                    }
                    None => return Ok(()),
                },
                typed = input.next_line() => match typed? {
                    Some(line) if is_quit_command(&line) => break,
                    Some(line) => self.send_message(&line).await?,
                    None => break,
                },
            }
        }

        self.disconnect().await
    }
}

/// Whether a typed line is the local quit command
pub fn is_quit_command(line: &str) -> bool {
    line.trim().eq_ignore_ascii_case(QUIT_COMMAND)
}
