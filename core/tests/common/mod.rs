//! Shared fakes for the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use btd_core::transport::TransportListener;
use btd_core::{BtdError, InboundMessage, MessageHandler, Result, ThumbnailData, ThumbnailProvider};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout, Duration, Instant};

/// Mock provider claiming URLs with a given prefix and echoing them back
pub struct PrefixProvider {
    pub name: String,
    pub prefix: String,
    pub delay_ms: u64,
    pub fetches: AtomicUsize,
}

impl PrefixProvider {
    pub fn new(name: &str, prefix: &str) -> Self {
        Self::with_delay(name, prefix, 0)
    }

    pub fn with_delay(name: &str, prefix: &str, delay_ms: u64) -> Self {
        Self {
            name: name.to_string(),
            prefix: prefix.to_string(),
            delay_ms,
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ThumbnailProvider for PrefixProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn matches(&self, url: &str) -> bool {
        url.starts_with(&self.prefix)
    }

    async fn fetch_data(&self, url: &str) -> Result<ThumbnailData> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.delay_ms > 0 {
            sleep(Duration::from_millis(self.delay_ms)).await;
        }
        Ok(ThumbnailData(json!({"provider": self.name, "url": url})))
    }
}

/// Mock provider that claims everything and always errors
pub struct FailingProvider;

#[async_trait]
impl ThumbnailProvider for FailingProvider {
    fn name(&self) -> &str {
        "failing"
    }

    fn matches(&self, _url: &str) -> bool {
        true
    }

    async fn fetch_data(&self, _url: &str) -> Result<ThumbnailData> {
        Err(BtdError::ProviderError("intentional error".to_string()))
    }
}

/// Handler forwarding every delivered message to a channel
pub struct ForwardHandler {
    pub tx: mpsc::UnboundedSender<InboundMessage>,
}

#[async_trait]
impl MessageHandler for ForwardHandler {
    async fn handle(&self, message: InboundMessage) -> Result<()> {
        let _ = self.tx.send(message);
        Ok(())
    }
}

pub fn forward_handler() -> (ForwardHandler, mpsc::UnboundedReceiver<InboundMessage>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ForwardHandler { tx }, rx)
}

/// Raw text frame as another realm would put it on the transport
pub fn raw_frame(kind: &str, payload: Value, origin: &str, hash: Option<&str>) -> String {
    let mut meta = json!({ "origin": origin });
    if let Some(hash) = hash {
        meta["hash"] = json!(hash);
    }
    json!({ "type": kind, "payload": payload, "meta": meta }).to_string()
}

pub fn url_entity(url: &str, attachment: bool) -> Value {
    json!({ "expanded_url": url, "isUrlForAttachment": attachment })
}

/// Next frame of the given type seen by `listener` within `within_ms`, parsed as JSON
pub async fn next_frame_of_type(
    listener: &mut TransportListener,
    kind: &str,
    within_ms: u64,
) -> Option<Value> {
    let deadline = Instant::now() + Duration::from_millis(within_ms);
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let frame = timeout(remaining, listener.recv()).await.ok()??;
        let value: Value = serde_json::from_str(&frame).ok()?;
        if value["type"] == kind {
            return Some(value);
        }
    }
}
