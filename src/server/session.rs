//! Per-connection session
//!
//! A session walks one client through
//! `Connecting → Handshaking → Active → Closing → Closed`. It never writes
//! broadcast lines itself: everything it wants the room to see goes through
//! the hub's queue. The only direct write is the welcome line, sent before the
//! client is registered and therefore before the dispatcher can see it.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite, ReadHalf};
use tracing::debug;

use crate::ClientId;
use crate::error::{ChatError, Result};
use crate::message::{ChatEvent, welcome_line};
use crate::server::hub::ChatHub;
use crate::server::registry::ClientState;
use crate::transport::{Connection, LineFramer, OutputHandle};

/// Lifecycle of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Accepted, welcome not yet sent
    Connecting,
    /// Registered, waiting for the display name
    Handshaking,
    /// Relaying lines
    Active,
    /// Removing the registry entry and closing the stream
    Closing,
    /// Terminal
    Closed,
}

/// Returned by a session that ended with a clean end of stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub id: ClientId,
    pub name: String,
    pub messages: u64,
}

/// Removes the registry entry if the session is dropped before it closes
struct Registration {
    hub: Arc<ChatHub>,
    id: ClientId,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.hub.registry().remove(self.id);
    }
}

pub struct Session<R> {
    id: ClientId,
    hub: Arc<ChatHub>,
    framer: LineFramer<R>,
    output: OutputHandle,
    peer_addr: SocketAddr,
    local_addr: SocketAddr,
    state: SessionState,
    registration: Option<Registration>,
    name: String,
    messages: u64,
}

impl<S> Session<ReadHalf<S>>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    pub fn from_connection(hub: Arc<ChatHub>, connection: Connection<S>) -> Self {
        Session::new(
            hub,
            connection.framer,
            connection.output,
            connection.peer_addr,
            connection.local_addr,
        )
    }
}

impl<R: AsyncRead + Unpin> Session<R> {
    pub fn new(
        hub: Arc<ChatHub>,
        framer: LineFramer<R>,
        output: OutputHandle,
        peer_addr: SocketAddr,
        local_addr: SocketAddr,
    ) -> Self {
        Self {
            id: ClientId::new(),
            hub,
            framer,
            output,
            peer_addr,
            local_addr,
            state: SessionState::Connecting,
            registration: None,
            name: String::new(),
            messages: 0,
        }
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    fn transition(&mut self, next: SessionState) {
        debug!(client_id = %self.id, from = ?self.state, to = ?next, "Session state change");
        self.state = next;
    }

    /// Drive the session to `Closed`.
    ///
    /// `Ok` means the client closed its stream after the handshake and a
    /// departure was announced. Every other exit is an `Err`; cleanup has run
    /// either way.
    pub async fn run(mut self) -> Result<SessionSummary> {
        let result = self.relay().await;
        self.close().await;
        result
    }

    async fn relay(&mut self) -> Result<SessionSummary> {
        self.connect().await?;
        self.handshake().await?;
        self.active().await
    }

    async fn connect(&mut self) -> Result<()> {
        self.output
            .write_line(&welcome_line(self.local_addr))
            .await
            .map_err(|e| ChatError::write(e.to_string()))?;

        let entry = ClientState::new(self.id, self.output.clone(), self.peer_addr);
        self.hub.registry().register(entry)?;
        self.registration = Some(Registration {
            hub: Arc::clone(&self.hub),
            id: self.id,
        });

        self.transition(SessionState::Handshaking);
        Ok(())
    }

    async fn handshake(&mut self) -> Result<()> {
        let name = match self.read_line().await? {
            Some(line) => line.trim().to_string(),
            None => return Err(ChatError::EndOfInput),
        };

        if !self.hub.registry().set_name(self.id, name.as_str()) {
            return Err(ChatError::internal("Client removed during handshake"));
        }
        self.name = name;
        debug!(client_id = %self.id, name = %self.name, "Handshake complete");

        self.hub
            .broadcast(Some(self.id), ChatEvent::joined(self.name.as_str()))?;
        self.transition(SessionState::Active);
        Ok(())
    }

    async fn active(&mut self) -> Result<SessionSummary> {
        loop {
            match self.read_line().await? {
                Some(line) => {
                    let event = ChatEvent::text(self.name.as_str(), line.trim());
                    self.hub.broadcast(Some(self.id), event)?;
                    self.messages += 1;
                }
                None => {
                    self.hub
                        .broadcast(Some(self.id), ChatEvent::left(self.name.as_str()))?;
                    return Ok(SessionSummary {
                        id: self.id,
                        name: self.name.clone(),
                        messages: self.messages,
                    });
                }
            }
        }
    }

    async fn read_line(&mut self) -> Result<Option<String>> {
        let read = match self.hub.config().idle_timeout {
            Some(limit) => tokio::time::timeout(limit, self.framer.next_line()).await?,
            None => self.framer.next_line().await,
        };
        read.map_err(|e| ChatError::read(e.to_string()))
    }

    async fn close(&mut self) {
        self.transition(SessionState::Closing);
        self.hub.registry().remove(self.id);
        self.registration = None;
        self.output.close().await;
        self.transition(SessionState::Closed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ChatConfig, FanOut};
    use std::time::Duration;
    use tokio::io::{
        AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines, ReadHalf, WriteHalf,
    };
    use tokio::task::JoinHandle;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(2);

    struct TestClient {
        lines: Lines<BufReader<ReadHalf<DuplexStream>>>,
        writer: WriteHalf<DuplexStream>,
        session: JoinHandle<Result<SessionSummary>>,
        id: ClientId,
    }

    impl TestClient {
        async fn next(&mut self) -> Option<String> {
            timeout(WAIT, self.lines.next_line())
                .await
                .expect("timed out waiting for a line")
                .unwrap()
        }

        async fn send(&mut self, line: &str) {
            self.writer.write_all(line.as_bytes()).await.unwrap();
        }
    }

    fn start_hub(config: ChatConfig) -> Arc<ChatHub> {
        let (hub, dispatcher) = ChatHub::new(config);
        tokio::spawn(dispatcher.run());
        hub
    }

    fn connect(hub: &Arc<ChatHub>) -> TestClient {
        let (client_side, server_side) = tokio::io::duplex(4096);
        let connection = Connection::new(
            server_side,
            "127.0.0.1:50001".parse().unwrap(),
            "127.0.0.1:8080".parse().unwrap(),
            hub.config().max_line_length,
        );
        let session = Session::from_connection(Arc::clone(hub), connection);
        let id = session.id();

        let (read_half, writer) = tokio::io::split(client_side);
        TestClient {
            lines: BufReader::new(read_half).lines(),
            writer,
            session: tokio::spawn(session.run()),
            id,
        }
    }

    async fn wait_until_gone(hub: &ChatHub, id: ClientId) {
        timeout(WAIT, async {
            while hub.registry().contains(id) {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("client never left the registry");
    }

    #[tokio::test]
    async fn test_full_lifecycle() {
        let hub = start_hub(ChatConfig::default());
        let mut alice = connect(&hub);

        assert_eq!(
            alice.next().await.as_deref(),
            Some("Hello, you are connected to 127.0.0.1:8080")
        );

        alice.send("  alice \n").await;
        assert_eq!(alice.next().await.as_deref(), Some(">>> alice joined"));
        assert_eq!(hub.registry().get(alice.id).unwrap().display_name, "alice");

        alice.send("hello world \r\n").await;
        assert_eq!(alice.next().await.as_deref(), Some("[alice]: hello world"));

        alice.writer.shutdown().await.unwrap();
        let summary = timeout(WAIT, alice.session).await.unwrap().unwrap().unwrap();
        assert_eq!(summary.name, "alice");
        assert_eq!(summary.messages, 1);
        assert!(!hub.registry().contains(alice.id));
    }

    #[tokio::test]
    async fn test_departure_is_announced() {
        let hub = start_hub(ChatConfig::default());
        let mut alice = connect(&hub);

        alice.next().await;
        alice.send("alice\n").await;
        assert_eq!(alice.next().await.as_deref(), Some(">>> alice joined"));

        let mut bob = connect(&hub);
        bob.next().await;
        bob.send("bob\n").await;
        assert_eq!(bob.next().await.as_deref(), Some(">>> bob joined"));
        assert_eq!(alice.next().await.as_deref(), Some(">>> bob joined"));

        let bob_id = bob.id;
        bob.writer.shutdown().await.unwrap();
        assert_eq!(alice.next().await.as_deref(), Some(">>> bob left"));
        wait_until_gone(&hub, bob_id).await;
        assert_eq!(hub.registry().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_name_is_accepted() {
        let hub = start_hub(ChatConfig::default());
        let mut anon = connect(&hub);

        anon.next().await;
        anon.send("   \n").await;
        assert_eq!(anon.next().await.as_deref(), Some(">>>  joined"));

        anon.send("anyone?\n").await;
        assert_eq!(anon.next().await.as_deref(), Some("[]: anyone?"));
    }

    #[tokio::test]
    async fn test_eof_during_handshake() {
        let hub = start_hub(ChatConfig::default());
        let mut ghost = connect(&hub);
        let id = ghost.id;

        ghost.next().await;
        ghost.writer.shutdown().await.unwrap();

        let result = timeout(WAIT, ghost.session).await.unwrap().unwrap();
        assert!(matches!(result, Err(ChatError::EndOfInput)));
        assert!(!hub.registry().contains(id));
        // Nothing was announced
        assert_eq!(ghost.lines.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_read_error_skips_departure() {
        let config = ChatConfig {
            max_line_length: 8,
            ..Default::default()
        };
        let hub = start_hub(config);
        let mut alice = connect(&hub);
        alice.next().await;
        alice.send("alice\n").await;
        alice.next().await;

        let mut bob = connect(&hub);
        bob.next().await;
        bob.send("bob\n").await;
        assert_eq!(alice.next().await.as_deref(), Some(">>> bob joined"));

        bob.send("this line is far too long\n").await;
        let result = timeout(WAIT, bob.session).await.unwrap().unwrap();
        assert!(matches!(result, Err(ChatError::Read(_))));

        // alice sees her own next message, not a departure for bob
        alice.send("hi\n").await;
        assert_eq!(alice.next().await.as_deref(), Some("[alice]: hi"));
        assert_eq!(hub.registry().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_timeout_closes_session() {
        let config = ChatConfig {
            idle_timeout: Some(Duration::from_secs(300)),
            ..Default::default()
        };
        let hub = start_hub(config);
        let mut idle = connect(&hub);

        idle.next().await;
        // Paused clock: the idle limit elapses as soon as every task is blocked
        let result = timeout(Duration::from_secs(600), idle.session)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(result, Err(ChatError::Timeout(_))));
        assert!(hub.registry().is_empty());
        assert_eq!(idle.lines.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_registration_refused_at_capacity() {
        let config = ChatConfig {
            max_connections: Some(1),
            fan_out: FanOut::All,
            ..Default::default()
        };
        let hub = start_hub(config);
        let mut first = connect(&hub);
        first.next().await;
        first.send("first\n").await;
        first.next().await;

        let second = connect(&hub);
        let result = timeout(WAIT, second.session).await.unwrap().unwrap();
        assert!(matches!(result, Err(ChatError::ResourceLimit(_))));
        assert_eq!(hub.registry().len(), 1);
    }

    #[tokio::test]
    async fn test_aborted_session_leaves_registry() {
        let hub = start_hub(ChatConfig::default());
        let mut alice = connect(&hub);
        alice.next().await;
        alice.send("alice\n").await;
        alice.next().await;
        assert!(hub.registry().contains(alice.id));

        alice.session.abort();
        let _ = alice.session.await;
        assert!(!hub.registry().contains(alice.id));
    }
}
