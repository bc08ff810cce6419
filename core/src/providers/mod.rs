/// Thumbnail providers and the ordered registry that picks one per URL
pub mod oembed;

pub use oembed::{OEmbedConfig, OEmbedProvider};

use crate::envelope::ThumbnailData;
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

/// Pluggable strategy producing thumbnail data for the URLs it claims.
#[async_trait]
pub trait ThumbnailProvider: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Whether this provider claims `url`
    fn matches(&self, url: &str) -> bool;

    /// Fetch thumbnail data for a URL previously accepted by `matches`
    async fn fetch_data(&self, url: &str) -> Result<ThumbnailData>;
}

/// Ordered, immutable list of providers.
///
/// Match predicates may overlap, so resolution walks the list in
/// registration order and the first claimant wins.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn ThumbnailProvider>>,
}

impl ProviderRegistry {
    pub fn builder() -> ProviderRegistryBuilder {
        ProviderRegistryBuilder::default()
    }

    /// First provider whose `matches` holds for `url`, or `None` for "no thumbnail".
    pub fn resolve(&self, url: &str) -> Option<Arc<dyn ThumbnailProvider>> {
        let found = self.providers.iter().find(|p| p.matches(url)).cloned();
        match &found {
            Some(provider) => {
                debug!(target: "providers", url = %url, provider = %provider.name(), "Resolved provider")
            }
            None => debug!(target: "providers", url = %url, "No provider matches"),
        }
        found
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Provider names in resolution order
    pub fn names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }
}

/// Collects providers in declaration order; frozen by [`build`](Self::build).
#[derive(Default)]
pub struct ProviderRegistryBuilder {
    providers: Vec<Arc<dyn ThumbnailProvider>>,
}

impl ProviderRegistryBuilder {
    pub fn register(mut self, provider: Arc<dyn ThumbnailProvider>) -> Self {
        info!(target: "providers", provider = %provider.name(), position = self.providers.len(), "Registering thumbnail provider");
        self.providers.push(provider);
        self
    }

    pub fn build(self) -> ProviderRegistry {
        ProviderRegistry {
            providers: self.providers,
        }
    }
}
