/// oEmbed Thumbnail Provider
///
/// Claims URLs matching a configured regular expression and asks an oEmbed
/// endpoint for their embed description. The JSON body is passed through as
/// thumbnail data untouched.
use crate::envelope::ThumbnailData;
use crate::providers::ThumbnailProvider;
use crate::{BtdError, Result};
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for an oEmbed provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OEmbedConfig {
    /// Name shown in logs
    pub name: String,
    /// Regular expression a URL must match to be claimed
    pub pattern: String,
    /// oEmbed endpoint, queried as `{endpoint}?url=...&format=json`
    pub endpoint: String,
    /// Timeout for endpoint requests in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// User agent string
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_user_agent() -> String {
    "btd-bridge/0.1".to_string()
}

impl Default for OEmbedConfig {
    fn default() -> Self {
        Self {
            name: "youtube".to_string(),
            pattern: r"^https?://(www\.)?(youtube\.com/watch|youtu\.be/)".to_string(),
            endpoint: "https://www.youtube.com/oembed".to_string(),
            timeout_ms: default_timeout_ms(),
            user_agent: default_user_agent(),
        }
    }
}

pub struct OEmbedProvider {
    config: OEmbedConfig,
    pattern: Regex,
    http_client: reqwest::Client,
}

impl OEmbedProvider {
    pub fn new(config: OEmbedConfig) -> Result<Self> {
        let pattern = Regex::new(&config.pattern).map_err(|e| {
            BtdError::ProviderError(format!("Invalid pattern for {}: {}", config.name, e))
        })?;

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(&config.user_agent)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Ok(Self {
            config,
            pattern,
            http_client,
        })
    }
}

#[async_trait]
impl ThumbnailProvider for OEmbedProvider {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn matches(&self, url: &str) -> bool {
        self.pattern.is_match(url)
    }

    async fn fetch_data(&self, url: &str) -> Result<ThumbnailData> {
        debug!(target: "oembed", provider = %self.config.name, url = %url, "Fetching oEmbed data");

        let response = self
            .http_client
            .get(&self.config.endpoint)
            .query(&[("url", url), ("format", "json")])
            .send()
            .await
            .map_err(|e| {
                warn!(target: "oembed", provider = %self.config.name, error = %e, "oEmbed request failed");
                BtdError::ProviderError(format!("oEmbed request failed: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            warn!(target: "oembed", provider = %self.config.name, status = %status, "oEmbed endpoint returned error");
            return Err(BtdError::ProviderError(format!(
                "oEmbed endpoint returned status: {}",
                status
            )));
        }

        let body: serde_json::Value = response.json().await.map_err(|e| {
            warn!(target: "oembed", provider = %self.config.name, error = %e, "Failed to parse oEmbed response");
            BtdError::ProviderError(format!("Failed to parse oEmbed response: {}", e))
        })?;

        Ok(ThumbnailData(body))
    }
}
