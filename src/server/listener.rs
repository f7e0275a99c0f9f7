//! TCP listener
//!
//! Binds the server socket, spawns the dispatcher, and runs one session task
//! per accepted connection until asked to stop.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::ChatConfig;
use crate::error::{ChatError, Result};
use crate::server::dispatcher::Dispatcher;
use crate::server::hub::ChatHub;
use crate::server::session::Session;
use crate::transport::Connection;

/// Pause after a failed accept so a persistent error (e.g. EMFILE) does not spin
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Line-oriented TCP chat server
pub struct ChatServer {
    hub: Arc<ChatHub>,
    dispatcher: Dispatcher,
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl ChatServer {
    /// Bind the listen socket. Nothing is accepted until [`run`](Self::run).
    pub async fn bind(config: ChatConfig) -> Result<Self> {
        let bind_addr = config.bind_addr;
        let listener = TcpListener::bind(bind_addr)
            .await
            .map_err(|e| ChatError::network(format!("Failed to bind {}: {}", bind_addr, e)))?;
        let local_addr = listener.local_addr()?;

        let (hub, dispatcher) = ChatHub::new(config);

        info!("Chat server listening on {}", local_addr);

        Ok(Self {
            hub,
            dispatcher,
            listener,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn hub(&self) -> Arc<ChatHub> {
        Arc::clone(&self.hub)
    }

    /// Accept connections forever
    pub async fn run(self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Accept connections until `shutdown` completes, then abort every session
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let ChatServer {
            hub,
            dispatcher,
            listener,
            local_addr,
        } = self;

        let dispatcher_task = tokio::spawn(dispatcher.run());
        let mut sessions = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer_addr)) => {
                        sessions.spawn(serve_connection(Arc::clone(&hub), stream, peer_addr));
                    }
                    Err(e) => {
                        let err = ChatError::accept(e.to_string());
                        error!("{}", err);
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                },
                Some(joined) = sessions.join_next(), if !sessions.is_empty() => {
                    if let Err(e) = joined {
                        if e.is_panic() {
                            error!("Session task panicked: {}", e);
                        }
                    }
                }
                _ = &mut shutdown => {
                    info!("Shutdown requested on {}", local_addr);
                    break;
                }
            }
        }

        let open = sessions.len();
        sessions.shutdown().await;
        dispatcher_task.abort();
        info!(
            "Chat server on {} stopped, {} sessions closed",
            local_addr, open
        );

        Ok(())
    }

    pub fn stats(&self) -> ServerStats {
        let hub = self.hub.stats();
        ServerStats {
            connected_clients: hub.connected_clients,
            alive_clients: hub.alive_clients,
            bind_address: self.local_addr,
            max_connections: self.hub.config().max_connections,
        }
    }
}

/// Server statistics
#[derive(Debug, Clone)]
pub struct ServerStats {
    pub connected_clients: usize,
    pub alive_clients: usize,
    pub bind_address: SocketAddr,
    pub max_connections: Option<usize>,
}

/// Run one session and log how it ended
async fn serve_connection(hub: Arc<ChatHub>, stream: TcpStream, peer_addr: SocketAddr) {
    let connection = match Connection::from_tcp(stream, peer_addr, hub.config().max_line_length)
    {
        Ok(connection) => connection,
        Err(e) => {
            warn!(peer = %peer_addr, "Failed to set up connection: {}", e);
            return;
        }
    };

    let session = Session::from_connection(hub, connection);
    let client_id = session.id();
    info!(client_id = %client_id, peer = %peer_addr, "Client connected");

    match session.run().await {
        Ok(summary) => {
            info!(
                client_id = %client_id,
                name = %summary.name,
                messages = summary.messages,
                "Client left"
            );
        }
        Err(ChatError::EndOfInput) => {
            debug!(client_id = %client_id, peer = %peer_addr, "Client disconnected before handshake");
        }
        Err(e @ ChatError::ResourceLimit(_)) => {
            warn!(peer = %peer_addr, "Connection refused: {}", e);
        }
        Err(e) if e.is_session_local() => {
            info!(client_id = %client_id, peer = %peer_addr, "Client dropped: {}", e);
        }
        Err(e) => {
            error!(client_id = %client_id, peer = %peer_addr, "Session failed: {}", e);
        }
    }
}
