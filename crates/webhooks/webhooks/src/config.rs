//! Webhook configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use outpost_events::EventConfig;

use crate::crypto::SecretCipher;
use crate::error::{WebhookError, WebhookResult};
use crate::retry::{BackoffKind, RetryPolicy};

/// Top-level webhook configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhooksConfig {
    /// Application name reported in envelope meta.
    pub app_name: String,
    /// Environment reported in envelope meta.
    pub environment: String,
    /// Fallback signing secret for endpoints without one.
    pub secret: String,
    /// Base64 key used to encrypt endpoint secrets at rest.
    pub encryption_key: Option<String>,
    /// Event catalog, keyed by event key.
    pub events: BTreeMap<String, EventConfig>,
    /// Delivery settings.
    pub delivery: DeliveryConfig,
    /// Endpoints created at startup.
    pub endpoints: Vec<SeedEndpoint>,
}

impl Default for WebhooksConfig {
    fn default() -> Self {
        Self {
            app_name: "outpost".to_string(),
            environment: "production".to_string(),
            secret: String::new(),
            encryption_key: None,
            events: BTreeMap::new(),
            delivery: DeliveryConfig::default(),
            endpoints: Vec::new(),
        }
    }
}

impl WebhooksConfig {
    /// Parses configuration from TOML.
    pub fn from_toml_str(content: &str) -> WebhookResult<Self> {
        toml::from_str(content).map_err(|e| WebhookError::ConfigError(e.to_string()))
    }

    /// Loads configuration from a TOML file and applies environment overrides.
    pub fn load(path: impl AsRef<Path>) -> WebhookResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            WebhookError::ConfigError(format!("cannot read {}: {}", path.display(), e))
        })?;
        let mut config = Self::from_toml_str(&content)?;
        config.apply_env();
        Ok(config)
    }

    /// Overrides settings from `WEBHOOK_SECRET`, `APP_NAME`, `APP_ENV` and
    /// `WEBHOOK_ENCRYPTION_KEY`.
    pub fn apply_env(&mut self) {
        self.apply_vars(|name| std::env::var(name).ok());
    }

    fn apply_vars(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(secret) = var("WEBHOOK_SECRET") {
            self.secret = secret;
        }
        if let Some(app_name) = var("APP_NAME") {
            self.app_name = app_name;
        }
        if let Some(environment) = var("APP_ENV") {
            self.environment = environment;
        }
        if let Some(key) = var("WEBHOOK_ENCRYPTION_KEY").filter(|key| !key.is_empty()) {
            self.encryption_key = Some(key);
        }
    }

    /// Cipher for secrets at rest.
    ///
    /// Without a configured key a random one is used, so stored secrets do
    /// not survive a restart.
    pub fn cipher(&self) -> WebhookResult<SecretCipher> {
        match &self.encryption_key {
            Some(key) => SecretCipher::from_base64(key),
            None => {
                tracing::warn!("No encryption key configured, using an ephemeral key");
                Ok(SecretCipher::ephemeral())
            }
        }
    }
}

/// Delivery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Attempts per endpoint, the first one included.
    pub tries: u32,
    /// Per-attempt timeout in seconds.
    pub timeout_secs: u64,
    /// Backoff curve between attempts.
    pub backoff: BackoffKind,
    pub backoff_base_ms: u64,
    pub backoff_multiplier: f64,
    pub backoff_max_ms: u64,
    /// Random extra delay as a fraction of the computed delay.
    pub jitter: f64,
    pub worker_count: usize,
    pub poll_interval_ms: u64,
    pub verify_ssl: bool,
    pub follow_redirects: bool,
    pub user_agent: String,
    /// Static headers added to every delivery.
    pub headers: BTreeMap<String, String>,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            tries: 3,
            timeout_secs: 3,
            backoff: BackoffKind::Exponential,
            backoff_base_ms: 10_000,
            backoff_multiplier: 10.0,
            backoff_max_ms: 100_000_000,
            jitter: 0.0,
            worker_count: 4,
            poll_interval_ms: 100,
            verify_ssl: true,
            follow_redirects: false,
            user_agent: concat!("outpost/", env!("CARGO_PKG_VERSION")).to_string(),
            headers: BTreeMap::new(),
        }
    }
}

impl DeliveryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Retry policy described by these settings.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            kind: self.backoff,
            tries: self.tries.max(1),
            base: Duration::from_millis(self.backoff_base_ms),
            multiplier: self.backoff_multiplier.max(1.0),
            max_delay: Duration::from_millis(self.backoff_max_ms),
            jitter: self.jitter.clamp(0.0, 1.0),
        }
    }
}

/// Endpoint declared in configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedEndpoint {
    pub url: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub events: Vec<String>,
    /// Fixed secret; generated when absent.
    #[serde(default)]
    pub secret: Option<String>,
}

fn enabled_by_default() -> bool {
    true
}
