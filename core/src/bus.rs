// Per-realm message bus on top of the shared transport
use crate::envelope::{InboundMessage, MessageEnvelope, MessageType, Origin};
use crate::transport::{Transport, TransportListener};
use crate::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

pub type SubscriptionId = String;

/// Message handler trait
///
/// Each accepted envelope runs `handle` in its own task; invocations overlap
/// freely and the bus never waits for one to finish.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: InboundMessage) -> Result<()>;
}

/// Snapshot of a bus's counters.
///
/// `dropped_envelopes` counts frames, not subscriptions: a frame rejected at
/// the boundary is counted once however many handlers are registered.
/// `total_delivered` counts handler invocations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusStats {
    pub total_published: u64,
    pub total_delivered: u64,
    pub dropped_envelopes: u64,
    pub active_subscriptions: usize,
}

#[derive(Default)]
struct Counters {
    published: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
}

struct Subscription {
    expected_origin: Origin,
    handler: Arc<dyn MessageHandler>,
}

/// Typed publish/subscribe layer owned by one realm.
///
/// One listener task per bus decodes and filters each frame once, then fans
/// it out to the matching subscriptions. Clones share subscriptions, counters
/// and the listener, so a handler may hold a clone to publish replies while
/// the realm keeps the original.
#[derive(Clone)]
pub struct MessageBus {
    origin: Origin,
    transport: Transport,

    // Subscription id -> handler
    subscriptions: Arc<DashMap<SubscriptionId, Subscription>>,

    // Started by the first subscribe, stopped by shutdown
    listener: Arc<Mutex<Option<JoinHandle<()>>>>,

    counters: Arc<Counters>,
}

impl MessageBus {
    pub fn new(origin: Origin, transport: Transport) -> Self {
        Self {
            origin,
            transport,
            subscriptions: Arc::new(DashMap::new()),
            listener: Arc::new(Mutex::new(None)),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Realm this bus tags outbound envelopes with
    pub fn origin(&self) -> Origin {
        self.origin
    }

    /// Wrap `payload` in an envelope from this realm and broadcast it.
    ///
    /// Never blocks and never fails: an envelope that cannot be encoded is
    /// logged and dropped.
    pub fn publish<T: Serialize>(&self, kind: MessageType, payload: T, hash: Option<String>) {
        let envelope = MessageEnvelope::new(kind, payload, self.origin, hash);
        let frame = match envelope.encode() {
            Ok(frame) => frame,
            Err(e) => {
                warn!(target: "bus", origin = %self.origin, kind = %kind, error = %e, "Failed to encode envelope");
                return;
            }
        };

        let observed = self.transport.send(frame);
        debug!(
            target: "bus",
            origin = %self.origin,
            kind = %kind,
            hash = ?envelope.meta.hash,
            observed,
            "Published envelope"
        );
        self.counters.published.fetch_add(1, Ordering::Relaxed);
    }

    /// Deliver every envelope from `expected_origin` that carries a hash to `handler`.
    ///
    /// The bus listener is registered before this returns, so anything
    /// broadcast afterwards is observed. Must be called from within a tokio
    /// runtime.
    pub fn subscribe(
        &self,
        expected_origin: Origin,
        handler: Arc<dyn MessageHandler>,
    ) -> SubscriptionId {
        let subscription_id = format!(
            "sub_{}_{}",
            expected_origin.as_str().to_lowercase(),
            uuid::Uuid::new_v4()
        );
        self.subscriptions.insert(
            subscription_id.clone(),
            Subscription {
                expected_origin,
                handler,
            },
        );
        self.ensure_listener();

        info!(
            target: "bus",
            origin = %self.origin,
            expected_origin = %expected_origin,
            subscription = %subscription_id,
            "Created subscription"
        );
        subscription_id
    }

    /// Remove a subscription. Returns false for an unknown id.
    pub fn unsubscribe(&self, subscription_id: &str) -> bool {
        match self.subscriptions.remove(subscription_id) {
            Some((_, sub)) => {
                info!(
                    target: "bus",
                    subscription = %subscription_id,
                    expected_origin = %sub.expected_origin,
                    "Unsubscribed"
                );
                true
            }
            None => false,
        }
    }

    /// Stop the listener and drop every subscription of this bus and its clones
    pub fn shutdown(&self) {
        info!(target: "bus", origin = %self.origin, "Message bus shutting down");
        if let Some(task) = self.lock_listener().take() {
            task.abort();
        }
        self.subscriptions.clear();
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Current counters and the number of active subscriptions
    pub fn stats(&self) -> BusStats {
        BusStats {
            total_published: self.counters.published.load(Ordering::Relaxed),
            total_delivered: self.counters.delivered.load(Ordering::Relaxed),
            dropped_envelopes: self.counters.dropped.load(Ordering::Relaxed),
            active_subscriptions: self.subscriptions.len(),
        }
    }

    fn lock_listener(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        // The guarded value is a plain handle, so a poisoned lock is still usable
        self.listener
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn ensure_listener(&self) {
        let mut slot = self.lock_listener();
        if slot.as_ref().is_some_and(|task| !task.is_finished()) {
            return;
        }

        let listener = self.transport.listen();
        let task = tokio::spawn(run_listener(
            listener,
            self.origin,
            Arc::clone(&self.subscriptions),
            Arc::clone(&self.counters),
        ));
        debug!(target: "bus", origin = %self.origin, "Started bus listener");
        *slot = Some(task);
    }
}

async fn run_listener(
    mut listener: TransportListener,
    own_origin: Origin,
    subscriptions: Arc<DashMap<SubscriptionId, Subscription>>,
    counters: Arc<Counters>,
) {
    while let Some(frame) = listener.recv().await {
        let message = match InboundMessage::decode(&frame) {
            Ok(message) => message,
            Err(e) => {
                debug!(target: "bus", origin = %own_origin, reason = %e, "Dropped envelope");
                counters.dropped.fetch_add(1, Ordering::Relaxed);
                continue;
            }
        };

        // A realm never processes its own broadcasts
        if message.origin == own_origin {
            trace!(target: "bus", origin = %own_origin, "Ignored own envelope");
            continue;
        }
        let kind = message.kind();
        if message.hash.is_none() {
            debug!(target: "bus", origin = %own_origin, kind = %kind, "Dropped envelope without hash");
            counters.dropped.fetch_add(1, Ordering::Relaxed);
            continue;
        }

        // Collect first so no map shard stays locked while tasks are spawned
        let targets: Vec<(SubscriptionId, Arc<dyn MessageHandler>)> = subscriptions
            .iter()
            .filter(|entry| entry.expected_origin == message.origin)
            .map(|entry| (entry.key().clone(), Arc::clone(&entry.handler)))
            .collect();

        for (sub_id, handler) in targets {
            counters.delivered.fetch_add(1, Ordering::Relaxed);
            let message = message.clone();
            tokio::spawn(async move {
                if let Err(e) = handler.handle(message).await {
                    warn!(target: "bus", subscription = %sub_id, kind = %kind, error = %e, "Handler failed");
                }
            });
        }
    }
    debug!(target: "bus", origin = %own_origin, "Transport closed; listener exiting");
}
