//! Webhook system facade.

use serde_json::{Map, Value};
use std::sync::Arc;

use outpost_events::{
    EventBus, EventCatalog, EventTypeRegistry, TransformerRegistry, WebhookEvent,
};

use crate::client::WebhookClient;
use crate::config::WebhooksConfig;
use crate::delivery::{DeliveryEngine, WorkerPool};
use crate::dispatcher::{DispatchOutcome, WebhookDispatcher};
use crate::endpoint::{Endpoint, EndpointInput, EndpointSecret};
use crate::error::WebhookResult;
use crate::listener::DispatchWebhookListener;
use crate::manager::EndpointManager;
use crate::payload::PayloadBuilder;
use crate::queue::{InMemoryQueue, WebhookQueue};
use crate::retry::RetryStrategy;
use crate::storage::{EndpointStore, InMemoryEndpointStore};

/// Builder for [`WebhookSystem`].
pub struct WebhookSystemBuilder {
    config: WebhooksConfig,
    event_types: Arc<EventTypeRegistry>,
    transformers: TransformerRegistry,
    store: Option<Arc<dyn EndpointStore>>,
    queue: Option<Arc<dyn WebhookQueue>>,
    retry: Option<Arc<dyn RetryStrategy>>,
}

impl WebhookSystemBuilder {
    /// Routing table of event types that can be listened to.
    pub fn event_types(mut self, registry: Arc<EventTypeRegistry>) -> Self {
        self.event_types = registry;
        self
    }

    /// Transformers referenced by the catalog.
    pub fn transformers(mut self, transformers: TransformerRegistry) -> Self {
        self.transformers = transformers;
        self
    }

    /// Endpoint store. Defaults to an in-memory store.
    pub fn store(mut self, store: Arc<dyn EndpointStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Job queue. Defaults to an in-memory queue.
    pub fn queue(mut self, queue: Arc<dyn WebhookQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    /// Retry strategy. Defaults to the configured policy.
    pub fn retry(mut self, retry: Arc<dyn RetryStrategy>) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Builds the system, validating the catalog.
    pub fn build(self) -> WebhookResult<WebhookSystem> {
        let config = self.config;

        let catalog = Arc::new(EventCatalog::from_config(
            config.events.clone(),
            self.event_types,
            &self.transformers,
        )?);

        let store: Arc<dyn EndpointStore> = match self.store {
            Some(store) => store,
            None => Arc::new(InMemoryEndpointStore::new(config.cipher()?)),
        };
        let queue: Arc<dyn WebhookQueue> = match self.queue {
            Some(queue) => queue,
            None => InMemoryQueue::shared(),
        };
        let retry: Arc<dyn RetryStrategy> = match self.retry {
            Some(retry) => retry,
            None => Arc::new(config.delivery.retry_policy()),
        };

        let client = WebhookClient::new(&config.delivery)?;
        let engine = Arc::new(DeliveryEngine::new(queue, retry, client));
        let builder = Arc::new(PayloadBuilder::new(
            Arc::clone(&catalog),
            config.app_name.clone(),
            config.environment.clone(),
        ));
        let dispatcher = Arc::new(
            WebhookDispatcher::new(Arc::clone(&store), builder, Arc::clone(&engine))
                .with_fallback_secret(config.secret.clone()),
        );
        let manager = EndpointManager::new(store, Arc::clone(&catalog), Arc::clone(&dispatcher));

        tracing::debug!(events = catalog.len(), "Webhook system built");

        Ok(WebhookSystem {
            config,
            catalog,
            engine,
            dispatcher,
            manager,
        })
    }
}

/// Wires catalog, store, dispatcher and delivery together.
pub struct WebhookSystem {
    config: WebhooksConfig,
    catalog: Arc<EventCatalog>,
    engine: Arc<DeliveryEngine>,
    dispatcher: Arc<WebhookDispatcher>,
    manager: EndpointManager,
}

impl WebhookSystem {
    pub fn builder(config: WebhooksConfig) -> WebhookSystemBuilder {
        WebhookSystemBuilder {
            config,
            event_types: Arc::new(EventTypeRegistry::default()),
            transformers: TransformerRegistry::new(),
            store: None,
            queue: None,
            retry: None,
        }
    }

    /// Dispatches an event key with explicit data.
    pub async fn dispatch(
        &self,
        event_key: &str,
        data: Option<Map<String, Value>>,
        meta: Map<String, Value>,
    ) -> WebhookResult<DispatchOutcome> {
        self.dispatcher.dispatch(event_key, None, data, meta).await
    }

    /// Dispatches an event under its catalog key.
    pub async fn dispatch_event(&self, event: &dyn WebhookEvent) -> WebhookResult<DispatchOutcome> {
        self.dispatcher.dispatch_event(event).await
    }

    /// Endpoint management.
    pub fn endpoints(&self) -> &EndpointManager {
        &self.manager
    }

    pub fn catalog(&self) -> &Arc<EventCatalog> {
        &self.catalog
    }

    pub fn engine(&self) -> &Arc<DeliveryEngine> {
        &self.engine
    }

    pub fn dispatcher(&self) -> &Arc<WebhookDispatcher> {
        &self.dispatcher
    }

    pub fn config(&self) -> &WebhooksConfig {
        &self.config
    }

    /// Starts the configured number of delivery workers.
    pub fn start_workers(&self) -> WorkerPool {
        let delivery = &self.config.delivery;
        self.engine
            .start(delivery.worker_count, delivery.poll_interval())
    }

    /// Delivers queued jobs until none is left.
    pub async fn drain(&self) -> WebhookResult<usize> {
        self.engine.drain().await
    }

    /// Subscribes a dispatch listener for every registered event type in the
    /// catalog.
    ///
    /// Returns the number of listeners registered.
    pub async fn connect_to_events(&self, bus: &EventBus) -> usize {
        for entry in self.catalog.entries() {
            if !self.catalog.registry().contains(entry.event_type()) {
                tracing::debug!(
                    event_key = %entry.key,
                    event_type = entry.event_type(),
                    "Skipping listener for unregistered event type"
                );
            }
        }

        let types = self.catalog.listenable_types();
        for info in &types {
            let listener = DispatchWebhookListener::new(Arc::clone(&self.dispatcher));
            bus.subscribe(info.name, Arc::new(listener)).await;
        }
        tracing::info!(listeners = types.len(), "Webhook listeners registered");
        types.len()
    }

    /// Creates the endpoints declared in configuration.
    pub async fn seed_endpoints(&self) -> WebhookResult<Vec<Endpoint>> {
        let mut created = Vec::with_capacity(self.config.endpoints.len());
        for seed in &self.config.endpoints {
            let input = EndpointInput {
                url: seed.url.clone(),
                description: seed.description.clone(),
                enabled: seed.enabled,
                events: seed.events.clone(),
            };
            let secret = match &seed.secret {
                Some(secret) => EndpointSecret::new(secret.clone()),
                None => EndpointSecret::generate(),
            };
            created.push(self.manager.create_with_secret(input, secret).await?);
        }
        Ok(created)
    }
}
