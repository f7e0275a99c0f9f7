//! Broadcast dispatcher
//!
//! The only task that writes broadcast lines. It takes one message at a time
//! from the queue and writes it to every alive client before looking at the
//! next, so two broadcasts never interleave on the same stream and every
//! recipient sees messages in queue order.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::FanOut;
use crate::message::Broadcast;
use crate::server::registry::ClientRegistry;

/// Outcome of delivering one broadcast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub failed: usize,
}

pub struct Dispatcher {
    registry: Arc<ClientRegistry>,
    queue: mpsc::UnboundedReceiver<Broadcast>,
    fan_out: FanOut,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<ClientRegistry>,
        queue: mpsc::UnboundedReceiver<Broadcast>,
        fan_out: FanOut,
    ) -> Self {
        Self {
            registry,
            queue,
            fan_out,
        }
    }

    /// Drain the queue until every producer is gone
    pub async fn run(mut self) {
        while let Some(broadcast) = self.queue.recv().await {
            let report = self.deliver(&broadcast).await;
            debug!(
                delivered = report.delivered,
                failed = report.failed,
                "Broadcast: {}",
                broadcast.event
            );
        }
        debug!("Broadcast queue closed, dispatcher stopping");
    }

    /// Wait for the next queued broadcast without delivering it
    pub async fn recv(&mut self) -> Option<Broadcast> {
        self.queue.recv().await
    }

    /// Write one broadcast to every eligible client.
    ///
    /// A failed write deactivates and closes that client only; delivery to the
    /// rest of the snapshot continues.
    pub async fn deliver(&self, broadcast: &Broadcast) -> DeliveryReport {
        let line = broadcast.to_wire();
        let mut report = DeliveryReport::default();

        // Lock is released here; all writes happen on the copy
        let recipients = self.registry.snapshot();

        for client in recipients {
            if !client.alive {
                continue;
            }
            if self.fan_out == FanOut::ExcludeSender && broadcast.origin == Some(client.id) {
                continue;
            }

            match client.output.write_line(&line).await {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.failed += 1;
                    if self.registry.deactivate(client.id) {
                        warn!(
                            client_id = %client.id,
                            peer = %client.remote_addr,
                            "Write failed, deactivating client: {}",
                            e
                        );
                    } else {
                        debug!(client_id = %client.id, "Write to departed client failed: {}", e);
                    }
                    client.output.close().await;
                }
            }
        }

        report
    }
}
