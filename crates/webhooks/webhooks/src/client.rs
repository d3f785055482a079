//! HTTP transport for deliveries.

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use std::time::{Duration, Instant};

use crate::config::DeliveryConfig;
use crate::delivery::WebhookJob;
use crate::error::{WebhookError, WebhookResult};
use crate::signature::SIGNATURE_HEADER;

/// Header carrying the envelope id.
pub const ID_HEADER: &str = "X-Webhook-Id";

/// Header carrying the event key.
pub const EVENT_HEADER: &str = "X-Webhook-Event";

/// Maximum number of response body characters kept in errors and logs.
const MAX_BODY_CHARS: usize = 512;

/// Response of a successful delivery.
#[derive(Debug, Clone)]
pub struct DeliveryResponse {
    pub status: u16,
    pub body: String,
    pub duration_ms: u64,
}

/// Sends signed envelopes over HTTP.
#[derive(Debug, Clone)]
pub struct WebhookClient {
    client: reqwest::Client,
    timeout: Duration,
}

impl WebhookClient {
    /// Builds a client from delivery settings.
    pub fn new(config: &DeliveryConfig) -> WebhookResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        for (name, value) in &config.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                WebhookError::ConfigError(format!("invalid header name '{}': {}", name, e))
            })?;
            let value = HeaderValue::from_str(value).map_err(|e| {
                WebhookError::ConfigError(format!("invalid value for header '{}': {}", name, e))
            })?;
            headers.insert(name, value);
        }
        let user_agent = HeaderValue::from_str(&config.user_agent)
            .map_err(|e| WebhookError::ConfigError(format!("invalid user agent: {}", e)))?;
        headers.insert(USER_AGENT, user_agent);

        let redirects = if config.follow_redirects {
            reqwest::redirect::Policy::limited(5)
        } else {
            reqwest::redirect::Policy::none()
        };

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .redirect(redirects)
            .danger_accept_invalid_certs(!config.verify_ssl)
            .build()
            .map_err(|e| WebhookError::ConfigError(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            timeout: config.timeout(),
        })
    }

    /// Per-attempt timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Performs one delivery attempt.
    ///
    /// Any non-2xx status is an error carrying the status and a truncated body.
    pub async fn send(&self, job: &WebhookJob) -> WebhookResult<DeliveryResponse> {
        let start = Instant::now();

        let response = self
            .client
            .post(&job.url)
            .header(SIGNATURE_HEADER, &job.signature)
            .header(ID_HEADER, job.envelope.id.to_string())
            .header(EVENT_HEADER, &job.envelope.event_key)
            .timeout(self.timeout)
            .body(job.body.to_string())
            .send()
            .await?;

        let status = response.status();
        let body = truncate(response.text().await.unwrap_or_default());
        let duration_ms = start.elapsed().as_millis() as u64;

        if status.is_success() {
            Ok(DeliveryResponse {
                status: status.as_u16(),
                body,
                duration_ms,
            })
        } else {
            Err(WebhookError::HttpStatus {
                status: status.as_u16(),
                body,
            })
        }
    }
}

fn truncate(mut body: String) -> String {
    if let Some((idx, _)) = body.char_indices().nth(MAX_BODY_CHARS) {
        body.truncate(idx);
    }
    body
}
