//! Event type registry.
//!
//! Built once at startup and immutable afterwards. It is the routing table
//! mapping type identifiers used in configuration to concrete Rust types.

use std::any::TypeId;
use std::collections::BTreeMap;

use crate::error::{EventError, EventResult};
use crate::event::{EventDescriptor, EventType};

/// Information about one registered event type.
#[derive(Debug, Clone)]
pub struct EventTypeInfo {
    /// Type identifier.
    pub name: &'static str,
    /// Rust type id.
    pub type_id: TypeId,
    /// Descriptor when the type is self-describing.
    pub descriptor: Option<EventDescriptor>,
}

impl EventTypeInfo {
    /// Returns `true` if the type describes its own key and metadata.
    pub fn is_self_describing(&self) -> bool {
        self.descriptor.is_some()
    }
}

/// Registry of known event types.
#[derive(Debug, Clone, Default)]
pub struct EventTypeRegistry {
    types: BTreeMap<&'static str, EventTypeInfo>,
}

impl EventTypeRegistry {
    /// Starts building a registry.
    pub fn builder() -> EventTypeRegistryBuilder {
        EventTypeRegistryBuilder::default()
    }

    /// Looks up a type by identifier.
    pub fn get(&self, name: &str) -> Option<&EventTypeInfo> {
        self.types.get(name)
    }

    /// Returns `true` if the identifier is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Iterates registered types in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = &EventTypeInfo> {
        self.types.values()
    }

    /// Returns the number of registered types.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

/// Builder for [`EventTypeRegistry`].
#[derive(Debug, Default)]
pub struct EventTypeRegistryBuilder {
    types: Vec<EventTypeInfo>,
}

impl EventTypeRegistryBuilder {
    /// Registers an event type.
    pub fn register<T: EventType>(mut self) -> Self {
        self.types.push(EventTypeInfo {
            name: T::TYPE_NAME,
            type_id: TypeId::of::<T>(),
            descriptor: T::descriptor(),
        });
        self
    }

    /// Builds the registry, rejecting two different types under one identifier.
    pub fn build(self) -> EventResult<EventTypeRegistry> {
        let mut types: BTreeMap<&'static str, EventTypeInfo> = BTreeMap::new();
        for info in self.types {
            if let Some(existing) = types.get(info.name) {
                if existing.type_id != info.type_id {
                    return Err(EventError::DuplicateEventType(info.name.to_string()));
                }
                continue;
            }
            types.insert(info.name, info);
        }
        Ok(EventTypeRegistry { types })
    }
}
