// BTD Core Library
// Cross-realm message bus and thumbnail provider resolution

pub mod bus;
pub mod envelope;
pub mod orchestrator;
pub mod providers;
pub mod realm;
pub mod requester;
pub mod settings;
pub mod telemetry;
pub mod transport;

// Export core types
pub use bus::{BusStats, MessageBus, MessageHandler, SubscriptionId};
pub use envelope::{
    DecodeError, InboundMessage, MessageBody, MessageEnvelope, MessageType, Meta, Origin,
    ThumbnailData, UrlEntity,
};
pub use orchestrator::{ContentDispatcher, Outcome, RequestOrchestrator};
pub use providers::{ProviderRegistry, ThumbnailProvider};
pub use realm::{ContentRealm, InjectRealm};
pub use requester::{RequesterConfig, ThumbnailRequester};
pub use settings::Settings;
pub use transport::Transport;

// Error types
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BtdError {
    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("Settings error: {0}")]
    SettingsError(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Request timed out after {0} ms")]
    Timeout(u64),

    #[error("Channel closed: {0}")]
    ChannelClosed(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}
pub type Result<T> = std::result::Result<T, BtdError>;
