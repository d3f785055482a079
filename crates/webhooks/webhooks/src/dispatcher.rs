//! Fan-out of events to subscribed endpoints.

use serde_json::{Map, Value};
use std::sync::Arc;

use outpost_events::WebhookEvent;

use crate::delivery::{DeliveryEngine, WebhookDelivery, WebhookJob};
use crate::endpoint::{Endpoint, EndpointSecret};
use crate::error::{WebhookError, WebhookResult};
use crate::payload::{Envelope, PayloadBuilder};
use crate::signature::WebhookSigner;
use crate::storage::EndpointStore;

/// Result of one dispatch.
#[derive(Debug, Clone, Default)]
pub struct DispatchOutcome {
    /// Envelope shared by all jobs, `None` when nothing matched.
    pub envelope: Option<Arc<Envelope>>,
    /// Jobs handed to the delivery engine.
    pub submitted: usize,
    /// Matched endpoints that could not be submitted.
    pub skipped: usize,
}

/// Matches events to endpoints and submits one delivery job per endpoint.
pub struct WebhookDispatcher {
    store: Arc<dyn EndpointStore>,
    builder: Arc<PayloadBuilder>,
    engine: Arc<DeliveryEngine>,
    fallback_secret: Option<EndpointSecret>,
}

impl WebhookDispatcher {
    pub fn new(
        store: Arc<dyn EndpointStore>,
        builder: Arc<PayloadBuilder>,
        engine: Arc<DeliveryEngine>,
    ) -> Self {
        Self {
            store,
            builder,
            engine,
            fallback_secret: None,
        }
    }

    /// Sets the secret used for endpoints without their own.
    pub fn with_fallback_secret(mut self, secret: impl Into<String>) -> Self {
        let secret = EndpointSecret::new(secret);
        self.fallback_secret = (!secret.is_empty()).then_some(secret);
        self
    }

    pub fn builder(&self) -> &Arc<PayloadBuilder> {
        &self.builder
    }

    /// Dispatches an event key to every enabled, subscribed endpoint.
    ///
    /// No envelope is built when no endpoint matches.
    pub async fn dispatch(
        &self,
        event_key: &str,
        event: Option<&dyn WebhookEvent>,
        data: Option<Map<String, Value>>,
        meta: Map<String, Value>,
    ) -> WebhookResult<DispatchOutcome> {
        let endpoints = self.store.find_enabled_subscribed_to(event_key).await?;
        if endpoints.is_empty() {
            tracing::debug!(event_key = %event_key, "No endpoints subscribed");
            return Ok(DispatchOutcome::default());
        }

        let envelope = Arc::new(self.builder.build(event_key, event, data, meta)?);
        let body: Arc<str> = Arc::from(envelope.to_body()?);

        let mut outcome = DispatchOutcome {
            envelope: Some(Arc::clone(&envelope)),
            ..Default::default()
        };

        for endpoint in &endpoints {
            let submitted = match self.job_for(endpoint, &envelope, &body) {
                Ok(job) => self.engine.submit(job).await,
                Err(e) => Err(e),
            };
            match submitted {
                Ok(()) => outcome.submitted += 1,
                Err(e) => {
                    tracing::error!(
                        endpoint_id = %endpoint.id,
                        url = %endpoint.url,
                        event_key = %event_key,
                        error = %e,
                        "Failed to submit webhook"
                    );
                    outcome.skipped += 1;
                }
            }
        }

        tracing::info!(
            event_key = %event_key,
            envelope_id = %envelope.id,
            submitted = outcome.submitted,
            skipped = outcome.skipped,
            "Webhook dispatched"
        );

        Ok(outcome)
    }

    /// Dispatches an event under its resolved key.
    ///
    /// Events without a key are skipped silently.
    pub async fn dispatch_event(&self, event: &dyn WebhookEvent) -> WebhookResult<DispatchOutcome> {
        match self.builder.catalog().resolve_key(event) {
            Some(key) => self.dispatch(&key, Some(event), None, Map::new()).await,
            None => {
                tracing::debug!(event_type = event.type_name(), "Event has no webhook key");
                Ok(DispatchOutcome::default())
            }
        }
    }

    /// Sends an envelope to one endpoint exactly once, outside the queue.
    pub async fn send_once(&self, endpoint: &Endpoint, envelope: Envelope) -> WebhookResult<WebhookDelivery> {
        let envelope = Arc::new(envelope);
        let body: Arc<str> = Arc::from(envelope.to_body()?);
        let job = self.job_for(endpoint, &envelope, &body)?;
        Ok(self.engine.send_once(&job).await)
    }

    fn job_for(
        &self,
        endpoint: &Endpoint,
        envelope: &Arc<Envelope>,
        body: &Arc<str>,
    ) -> WebhookResult<WebhookJob> {
        let secret = self.signing_secret(endpoint)?;
        let signature = WebhookSigner::new(secret.expose()).sign_header(body.as_bytes());
        Ok(WebhookJob::new(
            endpoint,
            Arc::clone(envelope),
            Arc::clone(body),
            signature,
            self.engine.max_attempts(),
        ))
    }

    fn signing_secret<'a>(&'a self, endpoint: &'a Endpoint) -> WebhookResult<&'a EndpointSecret> {
        if !endpoint.secret.is_empty() {
            return Ok(&endpoint.secret);
        }
        match &self.fallback_secret {
            Some(secret) => {
                tracing::warn!(
                    endpoint_id = %endpoint.id,
                    "Endpoint has no secret, signing with the shared fallback secret"
                );
                Ok(secret)
            }
            None => Err(WebhookError::MissingSecret(endpoint.id.to_string())),
        }
    }
}
