//! Event traits.
//!
//! Every event that can be routed to webhooks implements [`WebhookEvent`]
//! and is one of two kinds:
//!
//! - [`SelfDescribingEvent`]: knows its own event key, UI metadata and payload.
//! - [`PlainEvent`]: only exposes its public fields; the key comes from the
//!   catalog and the payload from a transformer or field reflection.
//!
//! The derive macro `#[derive(WebhookEvent)]` generates all of this.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::any::Any;

use crate::value::Fields;

/// UI metadata for an event key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDescriptor {
    /// The event key, e.g. `orders.shipped`.
    pub key: String,
    /// Group shown in the endpoint form.
    pub group: String,
    /// Human readable label.
    pub label: String,
    /// Optional description.
    pub description: Option<String>,
}

impl EventDescriptor {
    /// Creates a descriptor labelled with its own key in the `Other` group.
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            label: key.clone(),
            key,
            group: crate::catalog::DEFAULT_GROUP.to_string(),
            description: None,
        }
    }

    /// Sets the group.
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    /// Sets the label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Which capabilities an event instance offers.
pub enum EventKind<'a> {
    SelfDescribing(&'a dyn SelfDescribingEvent),
    Plain(&'a dyn PlainEvent),
}

/// An event that can be fired into the webhook pipeline.
pub trait WebhookEvent: Any + Send + Sync {
    /// Stable type identifier matched against catalog entries.
    fn type_name(&self) -> &'static str;

    /// Returns the capability view of this event.
    fn kind(&self) -> EventKind<'_>;

    /// Upcast for downcasting in transformers.
    fn as_any(&self) -> &dyn Any;
}

/// An event that only exposes its public fields.
pub trait PlainEvent {
    /// Returns the publicly exposed fields.
    fn public_fields(&self) -> Fields;
}

/// An event that describes its own key, metadata and payload.
pub trait SelfDescribingEvent {
    /// Returns key and UI metadata.
    fn descriptor(&self) -> EventDescriptor;

    /// Returns the payload sent as envelope `data`, used verbatim.
    fn webhook_payload(&self) -> Map<String, Value>;

    /// Returns the event key.
    fn event_key(&self) -> String {
        self.descriptor().key
    }
}

/// Static information about a concrete event type.
///
/// Used to build the routing table at startup.
pub trait EventType: WebhookEvent + Sized {
    /// Type identifier, equal to [`WebhookEvent::type_name`].
    const TYPE_NAME: &'static str;

    /// Returns the descriptor if the type is self-describing.
    fn descriptor() -> Option<EventDescriptor> {
        None
    }
}
