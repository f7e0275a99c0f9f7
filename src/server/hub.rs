//! Shared chat state
//!
//! A `ChatHub` owns the client registry and the producer side of the broadcast
//! queue. It is built once per server and shared by `Arc` with every session;
//! the matching [`Dispatcher`] owns the consumer side.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::error::{ChatError, Result};
use crate::message::{Broadcast, ChatEvent};
use crate::server::dispatcher::Dispatcher;
use crate::server::registry::ClientRegistry;
use crate::{ChatConfig, ClientId};

#[derive(Debug)]
pub struct ChatHub {
    registry: Arc<ClientRegistry>,
    queue: mpsc::UnboundedSender<Broadcast>,
    config: ChatConfig,
}

impl ChatHub {
    /// Create a hub and the dispatcher that drains its queue.
    ///
    /// The dispatcher stops once the hub and every clone of its `Arc` are gone.
    pub fn new(config: ChatConfig) -> (Arc<Self>, Dispatcher) {
        let (queue, queue_rx) = mpsc::unbounded_channel();
        let registry = Arc::new(ClientRegistry::with_capacity_limit(config.max_connections));
        let dispatcher = Dispatcher::new(Arc::clone(&registry), queue_rx, config.fan_out);

        let hub = Arc::new(Self {
            registry,
            queue,
            config,
        });

        (hub, dispatcher)
    }

    pub fn registry(&self) -> &ClientRegistry {
        &self.registry
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Queue an event for delivery. Never blocks.
    pub fn broadcast(&self, origin: Option<ClientId>, event: ChatEvent) -> Result<()> {
        self.queue
            .send(Broadcast::new(origin, event))
            .map_err(|_| ChatError::internal("Broadcast queue closed"))
    }

    pub fn stats(&self) -> HubStats {
        HubStats {
            connected_clients: self.registry.len(),
            alive_clients: self.registry.alive_count(),
        }
    }
}

/// Registry counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubStats {
    pub connected_clients: usize,
    pub alive_clients: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_broadcast_reaches_dispatcher_queue() {
        let (hub, mut dispatcher) = ChatHub::new(ChatConfig::default());
        let id = ClientId::new();

        hub.broadcast(Some(id), ChatEvent::joined("alice")).unwrap();
        hub.broadcast(Some(id), ChatEvent::text("alice", "hi")).unwrap();

        let first = dispatcher.recv().await.unwrap();
        let second = dispatcher.recv().await.unwrap();
        assert_eq!(first.event, ChatEvent::joined("alice"));
        assert_eq!(second.event, ChatEvent::text("alice", "hi"));
        assert_eq!(second.origin, Some(id));
    }

    #[tokio::test]
    async fn test_broadcast_fails_without_dispatcher() {
        let (hub, dispatcher) = ChatHub::new(ChatConfig::default());
        drop(dispatcher);

        let err = hub.broadcast(None, ChatEvent::left("bob")).unwrap_err();
        assert!(matches!(err, ChatError::Internal(_)));
    }

    #[tokio::test]
    async fn test_dispatcher_stops_when_hub_dropped() {
        let (hub, dispatcher) = ChatHub::new(ChatConfig::default());
        let task = tokio::spawn(dispatcher.run());

        drop(hub);
        tokio::time::timeout(std::time::Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
    }

    #[test]
    fn test_capacity_limit_comes_from_config() {
        let config = ChatConfig {
            max_connections: Some(0),
            ..Default::default()
        };
        let (hub, _dispatcher) = ChatHub::new(config);
        assert_eq!(hub.stats().connected_clients, 0);
        assert_eq!(hub.config().max_connections, Some(0));
    }
}
