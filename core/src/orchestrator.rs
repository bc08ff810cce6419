// Content-realm handling of thumbnail requests
use crate::bus::{MessageBus, MessageHandler};
use crate::envelope::{InboundMessage, MessageBody, MessageType, UrlEntity};
use crate::providers::ProviderRegistry;
use crate::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Terminal state of one orchestration run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Every entity was malformed or an attachment
    NoEligibleUrl,
    /// No registered provider claims the selected URL
    NoProvider,
    /// The provider's fetch returned an error; nothing was published
    FetchFailed,
    /// A `THUMBNAIL_DATA` reply went out with the request hash
    Published,
}

/// Turns a `CHIRP_URLS` request into at most one `THUMBNAIL_DATA` reply.
pub struct RequestOrchestrator {
    registry: Arc<ProviderRegistry>,
    bus: MessageBus,
    runs: AtomicU64,
}

impl RequestOrchestrator {
    pub fn new(registry: Arc<ProviderRegistry>, bus: MessageBus) -> Self {
        Self {
            registry,
            bus,
            runs: AtomicU64::new(0),
        }
    }

    /// Pick the URL to thumbnail: the last well-formed, non-attachment entity.
    pub fn select_url(entities: &[Value]) -> Option<UrlEntity> {
        entities
            .iter()
            .filter_map(UrlEntity::from_value)
            .filter(UrlEntity::is_eligible)
            .last()
    }

    /// Run the filter, select, resolve, fetch, respond pipeline for one request.
    ///
    /// The provider fetch is the only await point. Failed fetches are logged
    /// and not retried; no error is sent back to the requesting realm.
    #[tracing::instrument(skip(self, entities), fields(candidates = entities.len()))]
    pub async fn handle_chirp_urls(&self, hash: &str, entities: &[Value]) -> Outcome {
        self.runs.fetch_add(1, Ordering::Relaxed);

        let Some(entity) = Self::select_url(entities) else {
            debug!(target: "orchestrator", hash = %hash, "No eligible URL in chirp");
            return Outcome::NoEligibleUrl;
        };
        let url = entity.expanded_url;

        let Some(provider) = self.registry.resolve(&url) else {
            debug!(target: "orchestrator", hash = %hash, url = %url, "No provider for URL");
            return Outcome::NoProvider;
        };

        match provider.fetch_data(&url).await {
            Ok(data) => {
                self.bus
                    .publish(MessageType::ThumbnailData, data, Some(hash.to_string()));
                info!(target: "orchestrator", hash = %hash, url = %url, provider = %provider.name(), "Published thumbnail data");
                Outcome::Published
            }
            Err(e) => {
                warn!(target: "orchestrator", hash = %hash, url = %url, provider = %provider.name(), error = %e, "Thumbnail fetch failed");
                Outcome::FetchFailed
            }
        }
    }

    /// Number of runs started so far
    pub fn run_count(&self) -> u64 {
        self.runs.load(Ordering::Relaxed)
    }
}

/// Handler the content realm registers for envelopes from the injected realm.
pub struct ContentDispatcher {
    orchestrator: Arc<RequestOrchestrator>,
}

impl ContentDispatcher {
    pub fn new(orchestrator: Arc<RequestOrchestrator>) -> Self {
        Self { orchestrator }
    }
}

#[async_trait]
impl MessageHandler for ContentDispatcher {
    async fn handle(&self, message: InboundMessage) -> Result<()> {
        let Some(hash) = message.hash else {
            return Ok(());
        };

        match message.body {
            MessageBody::ChirpUrls(entities) => {
                self.orchestrator.handle_chirp_urls(&hash, &entities).await;
            }
            MessageBody::ThumbnailData(_) => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_select_url_takes_last_eligible() {
        let entities = vec![
            json!({"expanded_url": "https://example.com/first", "isUrlForAttachment": false}),
            json!({"expanded_url": "https://example.com/img.png", "isUrlForAttachment": true}),
            json!({"expanded_url": "https://example.com/last", "isUrlForAttachment": false}),
        ];
        let selected = RequestOrchestrator::select_url(&entities).unwrap();
        assert_eq!(selected.expanded_url, "https://example.com/last");
    }

    #[test]
    fn test_select_url_skips_trailing_malformed() {
        let entities = vec![
            json!({"expanded_url": "https://example.com/a", "isUrlForAttachment": false}),
            json!({"isUrlForAttachment": false}),
            json!("https://example.com/raw"),
            json!(null),
        ];
        let selected = RequestOrchestrator::select_url(&entities).unwrap();
        assert_eq!(selected.expanded_url, "https://example.com/a");
    }

    #[test]
    fn test_select_url_none_when_only_attachments() {
        let entities = vec![
            json!({"expanded_url": "https://example.com/1.png", "isUrlForAttachment": true}),
            json!({"expanded_url": "https://example.com/2.png", "isUrlForAttachment": true}),
        ];
        assert!(RequestOrchestrator::select_url(&entities).is_none());
        assert!(RequestOrchestrator::select_url(&[]).is_none());
    }
}
