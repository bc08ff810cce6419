// Startup routines owning each realm's bus and subscriptions
use crate::bus::{MessageBus, SubscriptionId};
use crate::envelope::Origin;
use crate::orchestrator::{ContentDispatcher, RequestOrchestrator};
use crate::providers::ProviderRegistry;
use crate::requester::{RequesterConfig, ThumbnailRequester};
use crate::settings::Settings;
use crate::transport::Transport;
use crate::Result;
use std::sync::Arc;
use tracing::info;

/// Privileged realm: answers thumbnail requests from the injected realm.
pub struct ContentRealm {
    bus: MessageBus,
    orchestrator: Arc<RequestOrchestrator>,
    settings: Settings,
    subscription: SubscriptionId,
}

impl ContentRealm {
    /// Wire the dispatcher onto a fresh bus. Must run inside a tokio runtime.
    pub fn start(transport: &Transport, registry: Arc<ProviderRegistry>, settings: Settings) -> Self {
        let bus = MessageBus::new(Origin::Content, transport.clone());
        let orchestrator = Arc::new(RequestOrchestrator::new(registry, bus.clone()));
        let dispatcher = Arc::new(ContentDispatcher::new(Arc::clone(&orchestrator)));
        let subscription = bus.subscribe(Origin::Inject, dispatcher);

        info!(target: "realm", realm = %Origin::Content, subscription = %subscription, "Content realm started");
        Self {
            bus,
            orchestrator,
            settings,
            subscription,
        }
    }

    pub fn bus(&self) -> &MessageBus {
        &self.bus
    }

    pub fn orchestrator(&self) -> &Arc<RequestOrchestrator> {
        &self.orchestrator
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Settings snapshot in the form the injected realm bootstraps from
    pub fn inject_dataset(&self) -> Result<String> {
        self.settings.to_dataset()
    }

    pub fn shutdown(&self) {
        info!(target: "realm", realm = %Origin::Content, subscription = %self.subscription, "Content realm shutting down");
        self.bus.shutdown();
    }
}

/// Page realm: asks for thumbnails and receives correlated replies.
pub struct InjectRealm {
    bus: MessageBus,
    requester: ThumbnailRequester,
    settings: Settings,
}

impl InjectRealm {
    /// Bootstrap from the settings dataset produced by [`ContentRealm::inject_dataset`].
    pub fn start(transport: &Transport, dataset: &str, config: RequesterConfig) -> Result<Self> {
        let settings = Settings::from_dataset(dataset)?;
        let bus = MessageBus::new(Origin::Inject, transport.clone());
        let requester = ThumbnailRequester::new(bus.clone(), config);
        let subscription = bus.subscribe(Origin::Content, requester.response_handler());

        info!(target: "realm", realm = %Origin::Inject, subscription = %subscription, settings = settings.0.len(), "Injected realm started");
        Ok(Self {
            bus,
            requester,
            settings,
        })
    }

    pub fn bus(&self) -> &MessageBus {
        &self.bus
    }

    pub fn requester(&self) -> &ThumbnailRequester {
        &self.requester
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn shutdown(&self) {
        info!(target: "realm", realm = %Origin::Inject, "Injected realm shutting down");
        self.bus.shutdown();
    }
}
