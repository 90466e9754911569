//! Subscriber registry for observer transports.
//!
//! A transport (WebSocket handler, SSE stream, CLI tail) registers a
//! subscriber at accept time and removes it at close time; there is no
//! ambient global map. The registry is thread-safe via an interior `RwLock`
//! and is designed to be wrapped in `Arc` with a single owning service.

use std::collections::HashMap;

use tokio::sync::{broadcast, mpsc, RwLock};
use uuid::Uuid;

use crate::bus::PipelineEvent;

/// Channel sender half for pushing events to one subscriber.
pub type SubscriberSender = mpsc::UnboundedSender<PipelineEvent>;

/// A registered observer connection.
struct Subscriber {
    /// Only events on this channel are delivered; `None` receives all.
    channel: Option<String>,
    sender: SubscriberSender,
}

/// Manages all active observer subscriptions.
pub struct SubscriberRegistry {
    subscribers: RwLock<HashMap<Uuid, Subscriber>>,
}

impl SubscriberRegistry {
    /// Create a new, empty registry.
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
        }
    }

    /// Register a subscriber, optionally filtered to one channel.
    ///
    /// Returns the subscriber id (needed for [`remove`](Self::remove)) and
    /// the receiver half the transport forwards from.
    pub async fn add(
        &self,
        channel: Option<String>,
    ) -> (Uuid, mpsc::UnboundedReceiver<PipelineEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        self.subscribers
            .write()
            .await
            .insert(id, Subscriber { channel, sender: tx });
        (id, rx)
    }

    /// Remove a subscriber by id. Unknown ids are a no-op.
    pub async fn remove(&self, id: Uuid) {
        self.subscribers.write().await.remove(&id);
    }

    /// Deliver an event to every subscriber whose filter matches.
    ///
    /// Subscribers whose receivers have been dropped are skipped; they are
    /// cleaned up when the owning transport calls [`remove`](Self::remove).
    pub async fn dispatch(&self, event: &PipelineEvent) {
        let subs = self.subscribers.read().await;
        for sub in subs.values() {
            let matches = match &sub.channel {
                Some(channel) => *channel == event.channel,
                None => true,
            };
            if matches {
                let _ = sub.sender.send(event.clone());
            }
        }
    }

    /// Current number of registered subscribers.
    pub async fn count(&self) -> usize {
        self.subscribers.read().await.len()
    }

    /// Drop every subscription, e.g. during graceful shutdown.
    pub async fn shutdown_all(&self) {
        let mut subs = self.subscribers.write().await;
        let count = subs.len();
        subs.clear();
        tracing::info!(count, "Dropped all event subscribers");
    }
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Forward every bus event into the registry until the bus closes.
///
/// Runs as a long-lived task; lagged receivers log and continue, so a burst
/// of events degrades observers rather than the pipeline.
pub async fn forward(
    mut receiver: broadcast::Receiver<PipelineEvent>,
    registry: std::sync::Arc<SubscriberRegistry>,
) {
    loop {
        match receiver.recv().await {
            Ok(event) => registry.dispatch(&event).await,
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::warn!(skipped = n, "Event forwarder lagged, events dropped");
            }
            Err(broadcast::error::RecvError::Closed) => {
                tracing::info!("Event bus closed, forwarder shutting down");
                break;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
