//! Webhook endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::crypto::{SECRET_PREFIX, generate_secret};

/// Unique identifier of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EndpointId(Uuid);

impl EndpointId {
    /// Creates a new random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for EndpointId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for EndpointId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Signing secret of an endpoint.
///
/// `Debug` and `Display` only show the prefix.
#[derive(Clone, PartialEq, Eq)]
pub struct EndpointSecret(String);

impl EndpointSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Generates a fresh `whsec_` secret.
    pub fn generate() -> Self {
        Self(generate_secret())
    }

    /// Returns the plaintext secret.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn redacted(&self) -> &'static str {
        if self.0.starts_with(SECRET_PREFIX) {
            "whsec_********"
        } else if self.0.is_empty() {
            ""
        } else {
            "********"
        }
    }
}

impl fmt::Debug for EndpointSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EndpointSecret({:?})", self.redacted())
    }
}

impl fmt::Display for EndpointSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.redacted())
    }
}

/// A registered webhook endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct Endpoint {
    /// Unique identifier.
    pub id: EndpointId,
    /// Target URL, absolute and https.
    pub url: String,
    /// Optional description.
    pub description: Option<String>,
    /// Whether deliveries are sent.
    pub enabled: bool,
    /// Signing secret. Never serialized.
    #[serde(skip)]
    pub secret: EndpointSecret,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row to insert into an endpoint store.
#[derive(Debug, Clone)]
pub struct NewEndpoint {
    pub url: String,
    pub description: Option<String>,
    pub enabled: bool,
    pub secret: EndpointSecret,
}

impl NewEndpoint {
    /// Creates an enabled endpoint with a generated secret.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            description: None,
            enabled: true,
            secret: EndpointSecret::generate(),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn secret(mut self, secret: EndpointSecret) -> Self {
        self.secret = secret;
        self
    }
}

/// Partial update of an endpoint row. `None` leaves a column untouched.
#[derive(Debug, Clone, Default)]
pub struct EndpointChanges {
    pub url: Option<String>,
    pub description: Option<Option<String>>,
    pub enabled: Option<bool>,
    pub secret: Option<EndpointSecret>,
}

impl EndpointChanges {
    pub fn is_empty(&self) -> bool {
        self.url.is_none()
            && self.description.is_none()
            && self.enabled.is_none()
            && self.secret.is_none()
    }

    /// Applies the changes to an endpoint.
    pub fn apply(self, endpoint: &mut Endpoint) {
        if let Some(url) = self.url {
            endpoint.url = url;
        }
        if let Some(description) = self.description {
            endpoint.description = description;
        }
        if let Some(enabled) = self.enabled {
            endpoint.enabled = enabled;
        }
        if let Some(secret) = self.secret {
            endpoint.secret = secret;
        }
    }
}

fn default_enabled() -> bool {
    true
}

/// Input for creating an endpoint through the manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointInput {
    pub url: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Event keys to subscribe to.
    #[serde(default)]
    pub events: Vec<String>,
}

impl EndpointInput {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            description: None,
            enabled: true,
            events: Vec::new(),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn events(mut self, events: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.events = events.into_iter().map(Into::into).collect();
        self
    }
}

/// Partial input for updating an endpoint. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct EndpointUpdate {
    #[serde(default)]
    pub url: Option<String>,
    /// `Some(None)` clears the description.
    #[serde(default, deserialize_with = "present")]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub enabled: Option<bool>,
    /// `Some` replaces the whole subscription set.
    #[serde(default)]
    pub events: Option<Vec<String>>,
}

impl EndpointUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn description(mut self, description: Option<String>) -> Self {
        self.description = Some(description);
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    pub fn events(mut self, events: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.events = Some(events.into_iter().map(Into::into).collect());
        self
    }

    /// Returns `true` if no field was supplied.
    pub fn is_empty(&self) -> bool {
        self.url.is_none()
            && self.description.is_none()
            && self.enabled.is_none()
            && self.events.is_none()
    }
}

/// Distinguishes an explicit `null` from an absent field.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_is_redacted() {
        let secret = EndpointSecret::new("whsec_abcdefghijklmnopqrstuvwxyz012345");
        assert_eq!(format!("{:?}", secret), "EndpointSecret(\"whsec_********\")");
        assert_eq!(secret.to_string(), "whsec_********");
        assert_eq!(EndpointSecret::new("custom").to_string(), "********");
    }

    #[test]
    fn test_endpoint_serialization_skips_secret() {
        let now = Utc::now();
        let endpoint = Endpoint {
            id: EndpointId::new(),
            url: "https://example.com/hook".to_string(),
            description: None,
            enabled: true,
            secret: EndpointSecret::new("whsec_topsecret"),
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_string(&endpoint).unwrap();
        assert!(!json.contains("topsecret"));
        assert!(!format!("{:?}", endpoint).contains("topsecret"));
    }

    #[test]
    fn test_endpoint_id_parse() {
        let id = EndpointId::new();
        assert_eq!(id.to_string().parse::<EndpointId>().unwrap(), id);
        assert!("nope".parse::<EndpointId>().is_err());
    }

    #[test]
    fn test_update_distinguishes_null_from_absent() {
        let absent: EndpointUpdate = serde_json::from_str(r#"{"enabled": false}"#).unwrap();
        assert_eq!(absent.description, None);
        assert_eq!(absent.enabled, Some(false));

        let cleared: EndpointUpdate = serde_json::from_str(r#"{"description": null}"#).unwrap();
        assert_eq!(cleared.description, Some(None));

        assert!(EndpointUpdate::new().is_empty());
    }

    #[test]
    fn test_input_defaults() {
        let input: EndpointInput =
            serde_json::from_str(r#"{"url": "https://example.com"}"#).unwrap();
        assert!(input.enabled);
        assert!(input.events.is_empty());
    }

    #[test]
    fn test_changes_apply() {
        let now = Utc::now();
        let mut endpoint = Endpoint {
            id: EndpointId::new(),
            url: "https://a.example".to_string(),
            description: Some("old".to_string()),
            enabled: true,
            secret: EndpointSecret::new("whsec_1"),
            created_at: now,
            updated_at: now,
        };
        EndpointChanges {
            enabled: Some(false),
            description: Some(None),
            ..Default::default()
        }
        .apply(&mut endpoint);
        assert!(!endpoint.enabled);
        assert_eq!(endpoint.description, None);
        assert_eq!(endpoint.url, "https://a.example");
    }
}
