//! Payload transformers.
//!
//! A transformer turns a plain event into envelope `data` when the event
//! cannot describe its own payload. Catalog entries reference transformers
//! by name; names are resolved once when the catalog is built.

use serde_json::{Map, Value};
use std::any::TypeId;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::{EventError, EventResult};
use crate::event::{EventType, WebhookEvent};

/// Converts an event into webhook payload data.
pub trait PayloadTransformer: Send + Sync {
    /// Builds the payload. The returned map is used verbatim.
    fn transform(&self, event: &dyn WebhookEvent) -> EventResult<Map<String, Value>>;

    /// The event type this transformer accepts, if it is restricted to one.
    fn accepts(&self) -> Option<TypeId> {
        None
    }
}

/// Transformer backed by a closure over a concrete event type.
pub struct FnTransformer<E, F> {
    name: String,
    func: F,
    _event: PhantomData<fn(&E)>,
}

impl<E, F> FnTransformer<E, F>
where
    E: EventType,
    F: Fn(&E) -> Map<String, Value> + Send + Sync,
{
    /// Creates a transformer for events of type `E`.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
            _event: PhantomData,
        }
    }
}

impl<E, F> PayloadTransformer for FnTransformer<E, F>
where
    E: EventType,
    F: Fn(&E) -> Map<String, Value> + Send + Sync,
{
    fn transform(&self, event: &dyn WebhookEvent) -> EventResult<Map<String, Value>> {
        let event = event.as_any().downcast_ref::<E>().ok_or_else(|| {
            EventError::TransformFailed(
                self.name.clone(),
                format!("expected {}, got {}", E::TYPE_NAME, event.type_name()),
            )
        })?;
        Ok((self.func)(event))
    }

    fn accepts(&self) -> Option<TypeId> {
        Some(TypeId::of::<E>())
    }
}

/// Named transformers available to the catalog.
#[derive(Clone, Default)]
pub struct TransformerRegistry {
    transformers: HashMap<String, Arc<dyn PayloadTransformer>>,
}

impl TransformerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a transformer under a name.
    pub fn with(mut self, name: impl Into<String>, transformer: impl PayloadTransformer + 'static) -> Self {
        self.insert(name, Arc::new(transformer));
        self
    }

    /// Adds a closure transformer for events of type `E`.
    pub fn with_fn<E, F>(self, name: impl Into<String>, func: F) -> Self
    where
        E: EventType,
        F: Fn(&E) -> Map<String, Value> + Send + Sync + 'static,
    {
        let name = name.into();
        let transformer = FnTransformer::<E, F>::new(name.clone(), func);
        self.with(name, transformer)
    }

    /// Inserts a shared transformer, replacing any previous one with that name.
    pub fn insert(&mut self, name: impl Into<String>, transformer: Arc<dyn PayloadTransformer>) {
        self.transformers.insert(name.into(), transformer);
    }

    /// Looks up a transformer.
    pub fn get(&self, name: &str) -> Option<Arc<dyn PayloadTransformer>> {
        self.transformers.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.transformers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transformers.is_empty()
    }
}

impl std::fmt::Debug for TransformerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.transformers.keys().collect();
        names.sort();
        f.debug_struct("TransformerRegistry").field("names", &names).finish()
    }
}
