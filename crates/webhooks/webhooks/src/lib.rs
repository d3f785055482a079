//! # Outpost Webhooks
//!
//! Outbound webhook pipeline:
//! - Payload normalization and delivery envelopes
//! - Endpoint storage with secrets encrypted at rest
//! - Endpoint validation and management
//! - Fan-out dispatch of events to subscribed endpoints
//! - Queued delivery with retries, signed with HMAC-SHA256
//! - Receiver-side signature verification
//!
//! ## Example
//!
//! ```rust,ignore
//! use outpost_webhooks::{EndpointInput, WebhookSystem, WebhooksConfig};
//!
//! let config = WebhooksConfig::load("outpost.toml")?;
//! let system = WebhookSystem::builder(config)
//!     .event_types(Arc::new(registry))
//!     .build()?;
//!
//! system
//!     .endpoints()
//!     .create(EndpointInput::new("https://example.com/webhook").events(["orders.created"]))
//!     .await?;
//!
//! // Dispatch automatically when events hit the bus
//! system.connect_to_events(&event_bus).await;
//! let workers = system.start_workers();
//! ```

mod client;
mod config;
mod crypto;
mod delivery;
mod dispatcher;
mod endpoint;
mod error;
mod listener;
mod manager;
mod payload;
mod queue;
mod receiver;
mod retry;
mod signature;
mod storage;
mod system;
mod validation;

pub use client::{DeliveryResponse, EVENT_HEADER, ID_HEADER, WebhookClient};
pub use config::{DeliveryConfig, SeedEndpoint, WebhooksConfig};
pub use crypto::{SECRET_PREFIX, SecretCipher, generate_secret};
pub use delivery::{DeliveryEngine, WebhookDelivery, WebhookJob, WebhookJobStatus, WorkerPool};
pub use dispatcher::{DispatchOutcome, WebhookDispatcher};
pub use endpoint::{
    Endpoint, EndpointChanges, EndpointId, EndpointInput, EndpointSecret, EndpointUpdate,
    NewEndpoint,
};
pub use error::{WebhookError, WebhookResult};
pub use listener::DispatchWebhookListener;
pub use manager::{EndpointManager, MAX_DESCRIPTION_CHARS, TEST_EVENT_KEY, TestOutcome, TestVariant};
pub use payload::{
    Envelope, MAX_DEPTH, PayloadBuilder, format_timestamp, normalize_fields, normalize_json,
    normalize_value,
};
pub use queue::{InMemoryQueue, MAX_FINISHED, QueueError, WebhookQueue};
pub use receiver::WebhookReceiver;
pub use retry::{BackoffKind, RetryPolicy, RetryStrategy};
pub use signature::{SIGNATURE_HEADER, SIGNATURE_PREFIX, SignatureError, WebhookSigner};
pub use storage::{EndpointStore, InMemoryEndpointStore};
pub use system::{WebhookSystem, WebhookSystemBuilder};
pub use validation::ValidationErrors;
