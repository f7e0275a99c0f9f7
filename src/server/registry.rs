//! Registry of connected clients
//!
//! Every read and write of the client map happens under one `parking_lot`
//! mutex. The lock is never held across an `.await`, which keeps I/O out of the
//! critical section and lets a session's drop guard clean up synchronously.

use std::collections::HashMap;
use std::net::SocketAddr;

use parking_lot::Mutex;

use crate::ClientId;
use crate::error::{ChatError, Result};
use crate::transport::OutputHandle;

/// State of one connected client
#[derive(Debug, Clone)]
pub struct ClientState {
    pub id: ClientId,
    /// Empty until the handshake completes
    pub display_name: String,
    pub output: OutputHandle,
    /// Cleared on write failure; no broadcast is written to a dead client
    pub alive: bool,
    pub remote_addr: SocketAddr,
    pub connected_at: u64,
}

impl ClientState {
    pub fn new(id: ClientId, output: OutputHandle, remote_addr: SocketAddr) -> Self {
        Self {
            id,
            display_name: String::new(),
            output,
            alive: true,
            remote_addr,
            connected_at: crate::current_timestamp(),
        }
    }
}

/// Mutually exclusive map from client id to client state
#[derive(Debug, Default)]
pub struct ClientRegistry {
    entries: Mutex<HashMap<ClientId, ClientState>>,
    /// Admission cap, unlimited when `None`
    max_clients: Option<usize>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry that refuses registrations beyond `max_clients`
    pub fn with_capacity_limit(max_clients: Option<usize>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            max_clients,
        }
    }

    /// Insert a new client
    pub fn register(&self, state: ClientState) -> Result<()> {
        let mut entries = self.entries.lock();

        if entries.contains_key(&state.id) {
            return Err(ChatError::DuplicateClient(state.id));
        }

        if let Some(max) = self.max_clients {
            if entries.len() >= max {
                return Err(ChatError::resource_limit(format!(
                    "Maximum connections reached: {}",
                    max
                )));
            }
        }

        entries.insert(state.id, state);
        Ok(())
    }

    /// Set the display name. Returns `false` if the client is already gone.
    pub fn set_name(&self, id: ClientId, name: impl Into<String>) -> bool {
        let mut entries = self.entries.lock();
        match entries.get_mut(&id) {
            Some(entry) => {
                entry.display_name = name.into();
                true
            }
            None => false,
        }
    }

    /// Mark a client dead without removing it
    pub fn deactivate(&self, id: ClientId) -> bool {
        let mut entries = self.entries.lock();
        match entries.get_mut(&id) {
            Some(entry) => {
                entry.alive = false;
                true
            }
            None => false,
        }
    }

    /// Remove a client. Idempotent.
    pub fn remove(&self, id: ClientId) -> Option<ClientState> {
        self.entries.lock().remove(&id)
    }

    /// Point-in-time copy of every entry
    pub fn snapshot(&self) -> Vec<ClientState> {
        self.entries.lock().values().cloned().collect()
    }

    pub fn get(&self, id: ClientId) -> Option<ClientState> {
        self.entries.lock().get(&id).cloned()
    }

    pub fn contains(&self, id: ClientId) -> bool {
        self.entries.lock().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Number of entries still accepting writes
    pub fn alive_count(&self) -> usize {
        self.entries
            .lock()
            .values()
            .filter(|entry| entry.alive)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn entry() -> ClientState {
        let (client, _server) = tokio::io::duplex(64);
        ClientState::new(
            ClientId::new(),
            OutputHandle::new(client),
            "127.0.0.1:40000".parse().unwrap(),
        )
    }

    #[test]
    fn test_register_and_snapshot() {
        let registry = ClientRegistry::new();
        let a = entry();
        let b = entry();
        let (a_id, b_id) = (a.id, b.id);

        registry.register(a).unwrap();
        registry.register(b).unwrap();
        assert_eq!(registry.len(), 2);

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.iter().all(|c| c.alive && c.display_name.is_empty()));
        assert!(snapshot.iter().any(|c| c.id == a_id));
        assert!(snapshot.iter().any(|c| c.id == b_id));
    }

    #[test]
    fn test_duplicate_register_fails() {
        let registry = ClientRegistry::new();
        let a = entry();
        let dup = a.clone();

        registry.register(a).unwrap();
        let err = registry.register(dup).unwrap_err();
        assert!(matches!(err, ChatError::DuplicateClient(_)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_capacity_limit() {
        let registry = ClientRegistry::with_capacity_limit(Some(1));
        registry.register(entry()).unwrap();

        let err = registry.register(entry()).unwrap_err();
        assert!(matches!(err, ChatError::ResourceLimit(_)));
    }

    #[test]
    fn test_set_name_on_missing_client_is_noop() {
        let registry = ClientRegistry::new();
        assert!(!registry.set_name(ClientId::new(), "ghost"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_set_name_and_deactivate() {
        let registry = ClientRegistry::new();
        let a = entry();
        let id = a.id;
        registry.register(a).unwrap();

        assert!(registry.set_name(id, "alice"));
        assert_eq!(registry.get(id).unwrap().display_name, "alice");

        assert!(registry.deactivate(id));
        assert!(registry.deactivate(id));
        let state = registry.get(id).unwrap();
        assert!(!state.alive);
        // Deactivate does not remove
        assert!(registry.contains(id));
    }

    #[test]
    fn test_remove_is_idempotent() {
        let registry = ClientRegistry::new();
        let a = entry();
        let b = entry();
        let id = a.id;
        registry.register(a).unwrap();
        registry.register(b).unwrap();

        assert!(registry.remove(id).is_some());
        let after_once: Vec<ClientId> = registry.snapshot().iter().map(|c| c.id).collect();

        assert!(registry.remove(id).is_none());
        let after_twice: Vec<ClientId> = registry.snapshot().iter().map(|c| c.id).collect();

        assert_eq!(after_once, after_twice);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let registry = ClientRegistry::new();
        let a = entry();
        let id = a.id;
        registry.register(a).unwrap();

        let snapshot = registry.snapshot();
        registry.deactivate(id);
        registry.remove(id);

        assert_eq!(snapshot.len(), 1);
        assert!(snapshot[0].alive);
    }

    #[test]
    fn test_concurrent_register_remove() {
        let registry = Arc::new(ClientRegistry::new());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    let mut ids = Vec::new();
                    for _ in 0..50 {
                        let e = entry();
                        ids.push(e.id);
                        registry.register(e).unwrap();
                    }
                    for id in ids.iter().take(20) {
                        registry.remove(*id);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.len(), 8 * 30);
    }
}
