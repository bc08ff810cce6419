use std::fs;
use std::path::Path;

use btd_core::providers::OEmbedConfig;
use btd_core::transport::DEFAULT_CAPACITY;
use btd_core::{RequesterConfig, Settings};

/// High-level configuration for the relay demo
#[derive(Clone, Debug)]
pub struct RelayConfig {
    /// Frames a slow realm may lag behind before losing some
    pub transport_capacity: usize,
    pub requester: RequesterConfig,
    /// Providers in resolution order
    pub providers: Vec<OEmbedConfig>,
    /// Snapshot handed to the injected realm
    pub settings: Settings,
}

impl Default for RelayConfig {
    fn default() -> Self {
        let user_agent = std::env::var("BTD_USER_AGENT")
            .ok()
            .filter(|s| !s.is_empty());
        let mut youtube = OEmbedConfig::default();
        if let Some(ua) = user_agent {
            youtube.user_agent = ua;
        }

        Self {
            transport_capacity: std::env::var("BTD_TRANSPORT_CAPACITY")
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(DEFAULT_CAPACITY),
            requester: RequesterConfig {
                timeout_ms: std::env::var("BTD_REQUEST_TIMEOUT_MS")
                    .ok()
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(10_000),
            },
            providers: vec![youtube],
            settings: Settings::default(),
        }
    }
}

impl RelayConfig {
    /// Load configuration from a TOML file (path via BTD_RELAY_CONFIG or ./thumbnail_relay.toml),
    /// overlaying values onto env-driven defaults.
    pub fn load() -> Self {
        let default = Self::default();
        let path =
            std::env::var("BTD_RELAY_CONFIG").unwrap_or_else(|_| "thumbnail_relay.toml".into());
        let p = Path::new(&path);
        if !p.exists() {
            tracing::info!(target: "thumbnail_relay", path = %path, "No TOML config found; using defaults/env");
            return default;
        }
        match fs::read_to_string(p) {
            Ok(s) => match Self::overlay_toml(&s, default.clone()) {
                Ok(cfg) => cfg,
                Err(e) => {
                    tracing::warn!(target: "thumbnail_relay", error = %e, "Failed to parse TOML; using defaults");
                    default
                }
            },
            Err(e) => {
                tracing::warn!(target: "thumbnail_relay", error = %e, "Failed to read TOML; using defaults");
                default
            }
        }
    }

    /// Apply a TOML document on top of `base`
    pub fn overlay_toml(raw: &str, base: Self) -> Result<Self, toml::de::Error> {
        let t: RelayToml = toml::from_str(raw)?;
        Ok(t.overlay(base))
    }
}

// =========================
// TOML overlay definitions
// =========================

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct RelayToml {
    pub transport_capacity: Option<usize>,
    pub request_timeout_ms: Option<u64>,
    pub providers: Option<Vec<OEmbedConfig>>,
    pub settings: Option<serde_json::Map<String, serde_json::Value>>,
}

impl RelayToml {
    fn overlay(self, mut base: RelayConfig) -> RelayConfig {
        if let Some(c) = self.transport_capacity {
            base.transport_capacity = c;
        }
        if let Some(t) = self.request_timeout_ms {
            base.requester.timeout_ms = t;
        }
        if let Some(p) = self.providers {
            base.providers = p;
        }
        if let Some(s) = self.settings {
            base.settings = Settings::from(s);
        }
        base
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn overlay_replaces_only_given_fields() {
        let base = RelayConfig {
            transport_capacity: 64,
            requester: RequesterConfig { timeout_ms: 5_000 },
            providers: vec![OEmbedConfig::default()],
            settings: Settings::default(),
        };
        let cfg = RelayConfig::overlay_toml("request_timeout_ms = 250\n", base).unwrap();
        assert_eq!(cfg.transport_capacity, 64);
        assert_eq!(cfg.requester.timeout_ms, 250);
        assert_eq!(cfg.providers.len(), 1);
        assert_eq!(cfg.providers[0].name, "youtube");
    }

    #[test]
    fn overlay_reads_providers_and_settings() {
        let raw = r#"
transport_capacity = 16

[[providers]]
name = "vimeo"
pattern = "^https://vimeo\\.com/"
endpoint = "https://vimeo.com/api/oembed.json"

[[providers]]
name = "youtube"
pattern = "^https://youtu\\.be/"
endpoint = "https://www.youtube.com/oembed"
timeout_ms = 3000

[settings]
showThumbnails = true
theme = "dark"
"#;
        let cfg = RelayConfig::overlay_toml(raw, RelayConfig::default()).unwrap();
        assert_eq!(cfg.transport_capacity, 16);
        let names: Vec<_> = cfg.providers.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["vimeo", "youtube"]);
        assert_eq!(cfg.providers[0].timeout_ms, 10_000);
        assert_eq!(cfg.providers[1].timeout_ms, 3_000);
        assert_eq!(cfg.settings.get("showThumbnails"), Some(&json!(true)));
        assert_eq!(cfg.settings.get("theme"), Some(&json!("dark")));
    }

    #[test]
    fn overlay_rejects_bad_toml() {
        assert!(RelayConfig::overlay_toml("transport_capacity = \"many\"", RelayConfig::default()).is_err());
    }
}
