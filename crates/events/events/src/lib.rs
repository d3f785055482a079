//! # Outpost Events
//!
//! Event side of the webhook pipeline:
//! - Event traits distinguishing self-describing and plain events
//! - Reflected field values for plain events
//! - An immutable event type registry built at startup
//! - The event catalog mapping event keys to types, metadata and transformers
//! - An in-process event bus with async handlers
//!
//! ## Example
//!
//! ```rust,ignore
//! use outpost_events::{EventCatalog, EventConfig, EventTypeRegistry, TransformerRegistry, WebhookEvent};
//!
//! #[derive(WebhookEvent)]
//! pub struct OrderShipped {
//!     pub order_id: u64,
//!     pub carrier: String,
//! }
//!
//! let registry = EventTypeRegistry::builder()
//!     .register::<OrderShipped>()
//!     .build()?;
//!
//! let catalog = EventCatalog::from_config(
//!     [("orders.shipped".to_string(), EventConfig::new("OrderShipped").with_group("Orders"))],
//!     Arc::new(registry),
//!     &TransformerRegistry::new(),
//! )?;
//!
//! assert_eq!(catalog.resolve_key(&event).as_deref(), Some("orders.shipped"));
//! ```

mod bus;
mod catalog;
mod error;
mod event;
mod handler;
mod registry;
mod transformer;
mod value;

pub use bus::EventBus;
pub use catalog::{CatalogEntry, DEFAULT_GROUP, EventCatalog, EventConfig, EventMetadata};
pub use error::{EventError, EventResult};
pub use event::{
    EventDescriptor, EventKind, EventType, PlainEvent, SelfDescribingEvent, WebhookEvent,
};
pub use handler::{EventHandler, HandlerResult, SharedHandler};
pub use registry::{EventTypeInfo, EventTypeRegistry, EventTypeRegistryBuilder};
pub use transformer::{FnTransformer, PayloadTransformer, TransformerRegistry};
pub use value::{Exportable, FieldValue, Fields, ToFieldValue};

pub use outpost_macros::WebhookEvent;

#[doc(hidden)]
pub mod __private {
    pub use serde_json;
}
