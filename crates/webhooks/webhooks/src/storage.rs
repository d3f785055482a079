//! Endpoint storage trait and in-memory implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::crypto::SecretCipher;
use crate::endpoint::{Endpoint, EndpointChanges, EndpointId, EndpointSecret, NewEndpoint};
use crate::error::{WebhookError, WebhookResult};

/// Trait for endpoint storage backends.
///
/// Subscriptions are owned by their endpoint: they are replaced as a whole
/// and removed with it.
#[async_trait]
pub trait EndpointStore: Send + Sync {
    // ==================== Queries ====================

    /// Enabled endpoints subscribed to `event_key`, each at most once.
    async fn find_enabled_subscribed_to(&self, event_key: &str) -> WebhookResult<Vec<Endpoint>>;

    /// Gets an endpoint by ID.
    async fn find_by_id(&self, id: EndpointId) -> WebhookResult<Option<Endpoint>>;

    /// Lists all endpoints.
    async fn list(&self) -> WebhookResult<Vec<Endpoint>>;

    /// Event keys an endpoint is subscribed to, sorted.
    async fn subscribed_event_keys(&self, id: EndpointId) -> WebhookResult<Vec<String>>;

    // ==================== Writes ====================

    /// Inserts an endpoint with its subscriptions.
    async fn insert(&self, endpoint: NewEndpoint, event_keys: &[String]) -> WebhookResult<Endpoint>;

    /// Updates an endpoint. `Some(keys)` replaces its subscriptions.
    async fn update(
        &self,
        id: EndpointId,
        changes: EndpointChanges,
        event_keys: Option<&[String]>,
    ) -> WebhookResult<Endpoint>;

    /// Deletes an endpoint and its subscriptions.
    ///
    /// Returns `false` if the endpoint did not exist.
    async fn delete(&self, id: EndpointId) -> WebhookResult<bool>;
}

struct StoredEndpoint {
    id: EndpointId,
    url: String,
    description: Option<String>,
    enabled: bool,
    /// Encrypted secret, empty when the endpoint has none.
    secret: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Default)]
struct Tables {
    endpoints: Vec<StoredEndpoint>,
    subscriptions: BTreeMap<(EndpointId, String), Uuid>,
}

impl Tables {
    fn position(&self, id: EndpointId) -> Option<usize> {
        self.endpoints.iter().position(|e| e.id == id)
    }

    fn is_subscribed(&self, id: EndpointId, event_key: &str) -> bool {
        self.subscriptions
            .contains_key(&(id, event_key.to_string()))
    }

    fn replace_subscriptions(&mut self, id: EndpointId, event_keys: &[String]) {
        let wanted: BTreeSet<&str> = event_keys.iter().map(String::as_str).collect();
        self.subscriptions
            .retain(|(endpoint_id, key), _| *endpoint_id != id || wanted.contains(key.as_str()));
        for key in wanted {
            self.subscriptions
                .entry((id, key.to_string()))
                .or_insert_with(Uuid::new_v4);
        }
    }

    fn remove_subscriptions(&mut self, id: EndpointId) {
        self.subscriptions.retain(|(endpoint_id, _), _| *endpoint_id != id);
    }
}

/// In-memory endpoint store.
///
/// Both tables sit behind one lock, so a subscription replace is atomic.
/// Secrets are kept encrypted with the store's [`SecretCipher`].
pub struct InMemoryEndpointStore {
    tables: RwLock<Tables>,
    cipher: SecretCipher,
}

impl InMemoryEndpointStore {
    /// Creates a store encrypting secrets with `cipher`.
    pub fn new(cipher: SecretCipher) -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            cipher,
        }
    }

    /// Number of subscription rows, across all endpoints.
    pub async fn subscription_count(&self) -> usize {
        self.tables.read().await.subscriptions.len()
    }

    fn encrypt(&self, secret: &EndpointSecret) -> WebhookResult<String> {
        if secret.is_empty() {
            return Ok(String::new());
        }
        self.cipher.encrypt(secret.expose())
    }

    fn load(&self, stored: &StoredEndpoint) -> WebhookResult<Endpoint> {
        let secret = if stored.secret.is_empty() {
            EndpointSecret::new("")
        } else {
            EndpointSecret::new(self.cipher.decrypt(&stored.secret)?)
        };

        Ok(Endpoint {
            id: stored.id,
            url: stored.url.clone(),
            description: stored.description.clone(),
            enabled: stored.enabled,
            secret,
            created_at: stored.created_at,
            updated_at: stored.updated_at,
        })
    }
}

impl Default for InMemoryEndpointStore {
    fn default() -> Self {
        Self::new(SecretCipher::ephemeral())
    }
}

#[async_trait]
impl EndpointStore for InMemoryEndpointStore {
    async fn find_enabled_subscribed_to(&self, event_key: &str) -> WebhookResult<Vec<Endpoint>> {
        let tables = self.tables.read().await;
        tables
            .endpoints
            .iter()
            .filter(|e| e.enabled && tables.is_subscribed(e.id, event_key))
            .map(|e| self.load(e))
            .collect()
    }

    async fn find_by_id(&self, id: EndpointId) -> WebhookResult<Option<Endpoint>> {
        let tables = self.tables.read().await;
        tables
            .endpoints
            .iter()
            .find(|e| e.id == id)
            .map(|e| self.load(e))
            .transpose()
    }

    async fn list(&self) -> WebhookResult<Vec<Endpoint>> {
        let tables = self.tables.read().await;
        tables.endpoints.iter().map(|e| self.load(e)).collect()
    }

    async fn subscribed_event_keys(&self, id: EndpointId) -> WebhookResult<Vec<String>> {
        let tables = self.tables.read().await;
        Ok(tables
            .subscriptions
            .keys()
            .filter(|(endpoint_id, _)| *endpoint_id == id)
            .map(|(_, key)| key.clone())
            .collect())
    }

    async fn insert(&self, endpoint: NewEndpoint, event_keys: &[String]) -> WebhookResult<Endpoint> {
        let secret = self.encrypt(&endpoint.secret)?;
        let now = Utc::now();
        let stored = StoredEndpoint {
            id: EndpointId::new(),
            url: endpoint.url,
            description: endpoint.description,
            enabled: endpoint.enabled,
            secret,
            created_at: now,
            updated_at: now,
        };

        let mut tables = self.tables.write().await;
        let loaded = self.load(&stored)?;
        tables.replace_subscriptions(stored.id, event_keys);
        tables.endpoints.push(stored);
        Ok(loaded)
    }

    async fn update(
        &self,
        id: EndpointId,
        changes: EndpointChanges,
        event_keys: Option<&[String]>,
    ) -> WebhookResult<Endpoint> {
        let secret = changes
            .secret
            .as_ref()
            .map(|secret| self.encrypt(secret))
            .transpose()?;

        let mut tables = self.tables.write().await;
        let idx = tables
            .position(id)
            .ok_or_else(|| WebhookError::EndpointNotFound(id.to_string()))?;

        let changed = !changes.is_empty() || event_keys.is_some();
        let mut endpoint = self.load(&tables.endpoints[idx])?;
        changes.apply(&mut endpoint);
        if changed {
            endpoint.updated_at = Utc::now();
        }

        let stored = &mut tables.endpoints[idx];
        stored.url.clone_from(&endpoint.url);
        stored.description.clone_from(&endpoint.description);
        stored.enabled = endpoint.enabled;
        stored.updated_at = endpoint.updated_at;
        if let Some(secret) = secret {
            stored.secret = secret;
        }

        if let Some(keys) = event_keys {
            tables.replace_subscriptions(id, keys);
        }
        Ok(endpoint)
    }

    async fn delete(&self, id: EndpointId) -> WebhookResult<bool> {
        let mut tables = self.tables.write().await;
        let Some(idx) = tables.position(id) else {
            return Ok(false);
        };
        tables.endpoints.remove(idx);
        tables.remove_subscriptions(id);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(keys: &[&str]) -> Vec<String> {
        keys.iter().map(|k| k.to_string()).collect()
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let store = InMemoryEndpointStore::default();
        let endpoint = store
            .insert(
                NewEndpoint::new("https://a.example/hook").description("orders"),
                &keys(&["orders.created", "orders.created", "orders.paid"]),
            )
            .await
            .unwrap();

        assert!(endpoint.secret.expose().starts_with("whsec_"));
        assert_eq!(store.subscription_count().await, 2);
        assert_eq!(
            store.subscribed_event_keys(endpoint.id).await.unwrap(),
            ["orders.created", "orders.paid"]
        );

        let found = store.find_by_id(endpoint.id).await.unwrap().unwrap();
        assert_eq!(found.secret, endpoint.secret);
        assert_eq!(found.description.as_deref(), Some("orders"));
    }

    #[tokio::test]
    async fn test_secret_is_encrypted_at_rest() {
        let store = InMemoryEndpointStore::default();
        let endpoint = store
            .insert(NewEndpoint::new("https://a.example"), &[])
            .await
            .unwrap();

        let tables = store.tables.read().await;
        assert_ne!(tables.endpoints[0].secret, endpoint.secret.expose());
        assert!(!tables.endpoints[0].secret.contains("whsec_"));
    }

    #[tokio::test]
    async fn test_find_enabled_subscribed_to() {
        let store = InMemoryEndpointStore::default();
        let a = store
            .insert(NewEndpoint::new("https://a.example"), &keys(&["orders.created"]))
            .await
            .unwrap();
        store
            .insert(
                NewEndpoint::new("https://b.example").enabled(false),
                &keys(&["orders.created"]),
            )
            .await
            .unwrap();
        store
            .insert(NewEndpoint::new("https://c.example"), &keys(&["orders.paid"]))
            .await
            .unwrap();

        let found = store.find_enabled_subscribed_to("orders.created").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, a.id);
        assert!(store.find_enabled_subscribed_to("users.deleted").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_replaces_subscriptions() {
        let store = InMemoryEndpointStore::default();
        let endpoint = store
            .insert(NewEndpoint::new("https://a.example"), &keys(&["a.one", "a.two"]))
            .await
            .unwrap();

        let updated = store
            .update(
                endpoint.id,
                EndpointChanges {
                    enabled: Some(false),
                    ..Default::default()
                },
                Some(&keys(&["a.two", "a.three"])),
            )
            .await
            .unwrap();

        assert!(!updated.enabled);
        assert!(updated.updated_at >= endpoint.updated_at);
        assert_eq!(
            store.subscribed_event_keys(endpoint.id).await.unwrap(),
            ["a.three", "a.two"]
        );

        // Keys untouched when not supplied.
        store
            .update(endpoint.id, EndpointChanges::default(), None)
            .await
            .unwrap();
        assert_eq!(store.subscription_count().await, 2);
    }

    #[tokio::test]
    async fn test_update_missing_endpoint() {
        let store = InMemoryEndpointStore::default();
        let result = store
            .update(EndpointId::new(), EndpointChanges::default(), None)
            .await;
        assert!(matches!(result, Err(WebhookError::EndpointNotFound(_))));
    }

    #[tokio::test]
    async fn test_update_persists_changes() {
        let store = InMemoryEndpointStore::default();
        let endpoint = store
            .insert(NewEndpoint::new("https://a.example").description("old"), &[])
            .await
            .unwrap();

        store
            .update(
                endpoint.id,
                EndpointChanges {
                    url: Some("https://b.example".to_string()),
                    description: Some(None),
                    secret: Some(EndpointSecret::new("whsec_rotated")),
                    ..Default::default()
                },
                None,
            )
            .await
            .unwrap();

        let found = store.find_by_id(endpoint.id).await.unwrap().unwrap();
        assert_eq!(found.url, "https://b.example");
        assert_eq!(found.description, None);
        assert!(found.enabled);
        assert_eq!(found.secret.expose(), "whsec_rotated");
        assert!(!store.tables.read().await.endpoints[0].secret.contains("whsec_"));
    }

    #[tokio::test]
    async fn test_delete_cascades() {
        let store = InMemoryEndpointStore::default();
        let endpoint = store
            .insert(NewEndpoint::new("https://a.example"), &keys(&["a.one", "a.two"]))
            .await
            .unwrap();

        assert!(store.delete(endpoint.id).await.unwrap());
        assert!(!store.delete(endpoint.id).await.unwrap());
        assert_eq!(store.subscription_count().await, 0);
        assert!(store.subscribed_event_keys(endpoint.id).await.unwrap().is_empty());
        assert!(store.find_enabled_subscribed_to("a.one").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_secret_round_trips() {
        let store = InMemoryEndpointStore::default();
        let endpoint = store
            .insert(
                NewEndpoint::new("https://a.example").secret(EndpointSecret::new("")),
                &[],
            )
            .await
            .unwrap();
        assert!(endpoint.secret.is_empty());
        assert!(store.find_by_id(endpoint.id).await.unwrap().unwrap().secret.is_empty());
    }
}
