// Injected-realm side of the thumbnail protocol
use crate::bus::{MessageBus, MessageHandler};
use crate::envelope::{InboundMessage, MessageBody, MessageType, ThumbnailData};
use crate::{BtdError, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::time::{timeout, Duration};
use tracing::{debug, warn};

/// Requester configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequesterConfig {
    /// How long to wait for a reply before giving up, in milliseconds.
    /// The content realm sends nothing when it has no thumbnail, so this
    /// also bounds the "no thumbnail" case.
    pub timeout_ms: u64,
}

impl Default for RequesterConfig {
    fn default() -> Self {
        Self { timeout_ms: 10_000 }
    }
}

type Pending = Arc<DashMap<String, oneshot::Sender<ThumbnailData>>>;

/// Publishes `CHIRP_URLS` requests and matches replies by correlation hash.
///
/// Replies may arrive in any order; only the hash ties a reply to its caller.
pub struct ThumbnailRequester {
    bus: MessageBus,
    config: RequesterConfig,
    /// Pending requests: hash -> reply channel
    pending: Pending,
}

impl ThumbnailRequester {
    pub fn new(bus: MessageBus, config: RequesterConfig) -> Self {
        Self {
            bus,
            config,
            pending: Arc::new(DashMap::new()),
        }
    }

    /// Fresh correlation token
    pub fn next_hash() -> String {
        uuid::Uuid::new_v4().simple().to_string()
    }

    /// Handler completing pending requests; subscribe it to the content realm.
    pub fn response_handler(&self) -> Arc<dyn MessageHandler> {
        Arc::new(ResponseRouter {
            pending: Arc::clone(&self.pending),
        })
    }

    /// Ask the content realm for a thumbnail of a chirp's URL entities.
    ///
    /// Fails with `Timeout` when no reply arrives in time, which is also what
    /// happens when the chirp has no eligible URL or no provider claims it.
    pub async fn request<T: Serialize>(&self, entities: &[T]) -> Result<ThumbnailData> {
        let hash = Self::next_hash();
        let (tx, rx) = oneshot::channel();

        // Register before publishing so a fast reply cannot be missed
        self.pending.insert(hash.clone(), tx);
        let _entry = PendingEntry {
            pending: &self.pending,
            hash: &hash,
        };
        self.bus
            .publish(MessageType::ChirpUrls, entities, Some(hash.clone()));

        match timeout(Duration::from_millis(self.config.timeout_ms), rx).await {
            Ok(Ok(data)) => Ok(data),
            Ok(Err(_)) => Err(BtdError::ChannelClosed(format!(
                "reply channel for {} dropped",
                hash
            ))),
            Err(_) => {
                debug!(target: "requester", hash = %hash, "Thumbnail request timed out");
                Err(BtdError::Timeout(self.config.timeout_ms))
            }
        }
    }

    /// Requests still waiting for a reply
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

/// Removes a request's pending entry however the request ends, including
/// when the caller drops the future before a reply arrives.
struct PendingEntry<'a> {
    pending: &'a Pending,
    hash: &'a str,
}

impl Drop for PendingEntry<'_> {
    fn drop(&mut self) {
        self.pending.remove(self.hash);
    }
}

struct ResponseRouter {
    pending: Pending,
}

#[async_trait]
impl MessageHandler for ResponseRouter {
    async fn handle(&self, message: InboundMessage) -> Result<()> {
        let Some(hash) = message.hash else {
            return Ok(());
        };

        match message.body {
            MessageBody::ThumbnailData(data) => match self.pending.remove(&hash) {
                Some((_, tx)) => {
                    if tx.send(data).is_err() {
                        debug!(target: "requester", hash = %hash, "Caller gone before reply");
                    }
                }
                None => {
                    warn!(target: "requester", hash = %hash, "Reply for unknown or expired request");
                }
            },
            MessageBody::ChirpUrls(_) => {}
        }
        Ok(())
    }
}
