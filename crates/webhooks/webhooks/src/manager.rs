//! Endpoint management: validation, CRUD and test sends.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::sync::Arc;

use outpost_events::EventCatalog;

use crate::dispatcher::WebhookDispatcher;
use crate::endpoint::{
    Endpoint, EndpointChanges, EndpointId, EndpointInput, EndpointSecret, EndpointUpdate,
    NewEndpoint,
};
use crate::error::{WebhookError, WebhookResult};
use crate::payload::format_timestamp;
use crate::storage::EndpointStore;
use crate::validation::ValidationErrors;

/// Event key used for test sends.
pub const TEST_EVENT_KEY: &str = "webhooks.test";

/// Maximum description length, in characters.
pub const MAX_DESCRIPTION_CHARS: usize = 255;

/// Result kind of a test send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestVariant {
    Success,
    Failure,
}

/// Result of a test send, ready to show to a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestOutcome {
    pub variant: TestVariant,
    pub heading: String,
    pub message: String,
}

impl TestOutcome {
    fn success(url: &str) -> Self {
        Self {
            variant: TestVariant::Success,
            heading: "Test webhook sent successfully".to_string(),
            message: format!("Webhook was successfully delivered to {}", url),
        }
    }

    fn failure(url: &str, error: &str) -> Self {
        Self {
            variant: TestVariant::Failure,
            heading: "Test webhook failed".to_string(),
            message: format!("Failed to deliver webhook to {}: {}", url, error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.variant == TestVariant::Success
    }
}

/// Validates and applies endpoint changes.
pub struct EndpointManager {
    store: Arc<dyn EndpointStore>,
    catalog: Arc<EventCatalog>,
    dispatcher: Arc<WebhookDispatcher>,
}

impl EndpointManager {
    pub fn new(
        store: Arc<dyn EndpointStore>,
        catalog: Arc<EventCatalog>,
        dispatcher: Arc<WebhookDispatcher>,
    ) -> Self {
        Self {
            store,
            catalog,
            dispatcher,
        }
    }

    /// Validates a full endpoint input.
    pub fn validate(&self, input: &EndpointInput) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        validate_url(&input.url, &mut errors);
        if let Some(description) = &input.description {
            validate_description(description, &mut errors);
        }
        self.validate_events(&input.events, &mut errors);
        errors.into_result()
    }

    /// Validates only the fields present in an update.
    pub fn validate_update(&self, update: &EndpointUpdate) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Some(url) = &update.url {
            validate_url(url, &mut errors);
        }
        if let Some(Some(description)) = &update.description {
            validate_description(description, &mut errors);
        }
        if let Some(events) = &update.events {
            self.validate_events(events, &mut errors);
        }
        errors.into_result()
    }

    fn validate_events(&self, events: &[String], errors: &mut ValidationErrors) {
        for (i, key) in events.iter().enumerate() {
            if !self.catalog.exists(key) {
                errors.add(
                    format!("events.{}", i),
                    format!("The event key '{}' is not configured in the webhooks catalog.", key),
                );
            }
        }
    }

    /// Validates and creates an endpoint with a fresh secret.
    pub async fn create(&self, input: EndpointInput) -> WebhookResult<Endpoint> {
        self.create_with_secret(input, EndpointSecret::generate()).await
    }

    /// Validates and creates an endpoint signing with a given secret.
    pub async fn create_with_secret(
        &self,
        input: EndpointInput,
        secret: EndpointSecret,
    ) -> WebhookResult<Endpoint> {
        self.validate(&input)?;

        let mut endpoint = NewEndpoint::new(input.url)
            .enabled(input.enabled)
            .secret(secret);
        endpoint.description = input.description;

        let created = self.store.insert(endpoint, &input.events).await?;
        tracing::info!(endpoint_id = %created.id, url = %created.url, "Webhook endpoint created");
        Ok(created)
    }

    /// Applies a partial update.
    ///
    /// An update without fields returns the endpoint unchanged.
    pub async fn update(&self, id: EndpointId, update: EndpointUpdate) -> WebhookResult<Endpoint> {
        let current = self.get(id).await?;
        if update.is_empty() {
            return Ok(current);
        }
        self.validate_update(&update)?;

        let changes = EndpointChanges {
            url: update.url,
            description: update.description,
            enabled: update.enabled,
            secret: None,
        };
        let updated = self
            .store
            .update(id, changes, update.events.as_deref())
            .await?;
        tracing::info!(endpoint_id = %id, "Webhook endpoint updated");
        Ok(updated)
    }

    /// Deletes an endpoint and its subscriptions.
    pub async fn delete(&self, id: EndpointId) -> WebhookResult<()> {
        if !self.store.delete(id).await? {
            return Err(WebhookError::EndpointNotFound(id.to_string()));
        }
        tracing::info!(endpoint_id = %id, "Webhook endpoint deleted");
        Ok(())
    }

    /// Replaces the signing secret with a freshly generated one.
    pub async fn rotate_secret(&self, id: EndpointId) -> WebhookResult<Endpoint> {
        let changes = EndpointChanges {
            secret: Some(EndpointSecret::generate()),
            ..Default::default()
        };
        let endpoint = self.store.update(id, changes, None).await?;
        tracing::info!(endpoint_id = %id, "Webhook endpoint secret rotated");
        Ok(endpoint)
    }

    pub async fn find(&self, id: EndpointId) -> WebhookResult<Option<Endpoint>> {
        self.store.find_by_id(id).await
    }

    pub async fn list(&self) -> WebhookResult<Vec<Endpoint>> {
        self.store.list().await
    }

    pub async fn subscribed_event_keys(&self, id: EndpointId) -> WebhookResult<Vec<String>> {
        self.store.subscribed_event_keys(id).await
    }

    /// Sends a test envelope with a single attempt.
    ///
    /// Delivery problems are reported in the outcome; only a missing
    /// endpoint is an error.
    pub async fn test(&self, id: EndpointId) -> WebhookResult<TestOutcome> {
        let endpoint = self.get(id).await?;

        let mut data = Map::new();
        data.insert("message".to_string(), json!("This is a test webhook payload"));
        data.insert("timestamp".to_string(), Value::String(format_timestamp(&Utc::now())));
        let mut meta = Map::new();
        meta.insert("test".to_string(), Value::Bool(true));

        let delivery = match self
            .dispatcher
            .builder()
            .build(TEST_EVENT_KEY, None, Some(data), meta)
        {
            Ok(envelope) => self.dispatcher.send_once(&endpoint, envelope).await,
            Err(e) => Err(e),
        };

        let outcome = match delivery {
            Ok(delivery) => match delivery.error {
                None => TestOutcome::success(&endpoint.url),
                Some(error) => TestOutcome::failure(&endpoint.url, &error),
            },
            Err(e) => TestOutcome::failure(&endpoint.url, &e.to_string()),
        };

        if outcome.is_success() {
            tracing::info!(endpoint_id = %id, url = %endpoint.url, "Test webhook delivered");
        } else {
            tracing::warn!(endpoint_id = %id, url = %endpoint.url, message = %outcome.message, "Test webhook failed");
        }
        Ok(outcome)
    }

    async fn get(&self, id: EndpointId) -> WebhookResult<Endpoint> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| WebhookError::EndpointNotFound(id.to_string()))
    }
}

fn validate_url(url: &str, errors: &mut ValidationErrors) {
    if url.trim().is_empty() {
        errors.add("url", "The URL field is required.");
        return;
    }
    if url::Url::parse(url).is_err() {
        errors.add("url", "The URL must be a valid URL.");
    }
    if !url.starts_with("https://") {
        errors.add("url", "The URL must start with https://");
    }
}

fn validate_description(description: &str, errors: &mut ValidationErrors) {
    if description.chars().count() > MAX_DESCRIPTION_CHARS {
        errors.add(
            "description",
            format!(
                "The description may not be greater than {} characters.",
                MAX_DESCRIPTION_CHARS
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url_errors(url: &str) -> Vec<String> {
        let mut errors = ValidationErrors::new();
        validate_url(url, &mut errors);
        errors.get("url").to_vec()
    }

    #[test]
    fn test_url_rules() {
        assert!(url_errors("https://example.com/hook").is_empty());
        assert_eq!(url_errors(""), ["The URL field is required."]);
        assert_eq!(
            url_errors("http://insecure.example.com"),
            ["The URL must start with https://"]
        );
        assert_eq!(
            url_errors("not a url"),
            [
                "The URL must be a valid URL.",
                "The URL must start with https://"
            ]
        );
    }

    #[test]
    fn test_description_limit_counts_chars() {
        let mut errors = ValidationErrors::new();
        validate_description(&"é".repeat(MAX_DESCRIPTION_CHARS), &mut errors);
        assert!(errors.is_empty());

        validate_description(&"a".repeat(MAX_DESCRIPTION_CHARS + 1), &mut errors);
        assert!(errors.has("description"));
    }

    #[test]
    fn test_outcome_serialization() {
        let outcome = TestOutcome::failure("https://a.example", "boom");
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["variant"], json!("failure"));
        assert_eq!(value["message"], json!("Failed to deliver webhook to https://a.example: boom"));
        assert!(TestOutcome::success("https://a.example").is_success());
    }
}
