//! Event catalog.
//!
//! Maps event keys (`<group>.<name>`) to the event type that produces them,
//! the UI metadata shown when subscribing, and an optional transformer.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use crate::error::{EventError, EventResult};
use crate::event::{EventKind, WebhookEvent};
use crate::registry::{EventTypeInfo, EventTypeRegistry};
use crate::transformer::{PayloadTransformer, TransformerRegistry};

/// Group used for keys without a configured group.
pub const DEFAULT_GROUP: &str = "Other";

/// Configuration of one catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventConfig {
    /// Event type identifier.
    pub event: String,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Name of a registered transformer.
    #[serde(default)]
    pub transformer: Option<String>,
}

impl EventConfig {
    /// Creates an entry for the given event type.
    pub fn new(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            group: None,
            label: None,
            description: None,
            transformer: None,
        }
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_transformer(mut self, transformer: impl Into<String>) -> Self {
        self.transformer = Some(transformer.into());
        self
    }
}

/// Metadata shown for an event key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    pub group: String,
    pub label: String,
    pub description: Option<String>,
}

impl EventMetadata {
    fn unknown(key: &str) -> Self {
        Self {
            group: DEFAULT_GROUP.to_string(),
            label: key.to_string(),
            description: None,
        }
    }
}

/// A resolved catalog entry.
#[derive(Clone)]
pub struct CatalogEntry {
    pub key: String,
    pub config: EventConfig,
    transformer: Option<Arc<dyn PayloadTransformer>>,
}

impl CatalogEntry {
    /// Event type identifier.
    pub fn event_type(&self) -> &str {
        &self.config.event
    }

    /// Resolved transformer.
    pub fn transformer(&self) -> Option<&Arc<dyn PayloadTransformer>> {
        self.transformer.as_ref()
    }
}

impl std::fmt::Debug for CatalogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogEntry")
            .field("key", &self.key)
            .field("config", &self.config)
            .finish()
    }
}

/// Immutable catalog of subscribable event keys.
#[derive(Debug, Clone)]
pub struct EventCatalog {
    entries: Vec<CatalogEntry>,
    index: HashMap<String, usize>,
    registry: Arc<EventTypeRegistry>,
}

impl EventCatalog {
    /// Builds the catalog from configuration.
    ///
    /// Entries whose event type is not registered are kept so that keys can
    /// still be dispatched manually. An unknown transformer name, or a
    /// transformer bound to a different event type, is an error.
    pub fn from_config<I>(
        config: I,
        registry: Arc<EventTypeRegistry>,
        transformers: &TransformerRegistry,
    ) -> EventResult<Self>
    where
        I: IntoIterator<Item = (String, EventConfig)>,
    {
        let mut entries = Vec::new();
        let mut index = HashMap::new();

        for (key, config) in config {
            if key.trim().is_empty() {
                return Err(EventError::InvalidCatalogEntry {
                    key,
                    reason: "event key is empty".to_string(),
                });
            }
            if config.event.trim().is_empty() {
                return Err(EventError::InvalidCatalogEntry {
                    key,
                    reason: "event type is empty".to_string(),
                });
            }
            if index.contains_key(&key) {
                return Err(EventError::InvalidCatalogEntry {
                    key,
                    reason: "event key is defined twice".to_string(),
                });
            }

            let transformer = match &config.transformer {
                Some(name) => {
                    let transformer =
                        transformers
                            .get(name)
                            .ok_or_else(|| EventError::UnknownTransformer {
                                key: key.clone(),
                                transformer: name.clone(),
                            })?;
                    let registered = registry.get(&config.event).map(|info| info.type_id);
                    if let (Some(accepted), Some(registered)) = (transformer.accepts(), registered) {
                        if accepted != registered {
                            return Err(EventError::InvalidCatalogEntry {
                                key,
                                reason: format!(
                                    "transformer '{}' does not accept {}",
                                    name, config.event
                                ),
                            });
                        }
                    }
                    Some(transformer)
                }
                None => None,
            };

            if !registry.contains(&config.event) {
                tracing::debug!(
                    event_key = %key,
                    event_type = %config.event,
                    "Catalog entry references an unregistered event type"
                );
            }

            index.insert(key.clone(), entries.len());
            entries.push(CatalogEntry {
                key,
                config,
                transformer,
            });
        }

        Ok(Self {
            entries,
            index,
            registry,
        })
    }

    /// Creates an empty catalog.
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
            registry: Arc::new(EventTypeRegistry::default()),
        }
    }

    /// Resolves the event key for an event.
    ///
    /// Self-describing events name their own key. Plain events are matched
    /// against entries in catalog order by type identifier.
    pub fn resolve_key(&self, event: &dyn WebhookEvent) -> Option<String> {
        match event.kind() {
            EventKind::SelfDescribing(event) => Some(event.event_key()),
            EventKind::Plain(_) => {
                let type_name = event.type_name();
                self.entries
                    .iter()
                    .find(|entry| entry.event_type() == type_name)
                    .map(|entry| entry.key.clone())
            }
        }
    }

    /// Returns UI metadata for a key.
    pub fn metadata(&self, key: &str) -> EventMetadata {
        let Some(entry) = self.get(key) else {
            return EventMetadata::unknown(key);
        };

        if let Some(descriptor) = self
            .registry
            .get(entry.event_type())
            .and_then(|info| info.descriptor.as_ref())
        {
            return EventMetadata {
                group: descriptor.group.clone(),
                label: descriptor.label.clone(),
                description: descriptor.description.clone(),
            };
        }

        EventMetadata {
            group: entry
                .config
                .group
                .clone()
                .unwrap_or_else(|| DEFAULT_GROUP.to_string()),
            label: entry.config.label.clone().unwrap_or_else(|| key.to_string()),
            description: entry.config.description.clone(),
        }
    }

    /// Returns `true` if the key is in the catalog.
    pub fn exists(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Looks up an entry.
    pub fn get(&self, key: &str) -> Option<&CatalogEntry> {
        self.index.get(key).map(|&i| &self.entries[i])
    }

    /// Event type identifier configured for a key.
    pub fn event_type_name(&self, key: &str) -> Option<&str> {
        self.get(key).map(CatalogEntry::event_type)
    }

    /// Transformer configured for a key.
    pub fn transformer(&self, key: &str) -> Option<Arc<dyn PayloadTransformer>> {
        self.get(key).and_then(|entry| entry.transformer.clone())
    }

    /// All entries in catalog order.
    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    /// All keys in catalog order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.key.as_str())
    }

    /// Keys with their metadata, grouped by metadata group.
    pub fn grouped(&self) -> BTreeMap<String, Vec<(String, EventMetadata)>> {
        let mut groups: BTreeMap<String, Vec<(String, EventMetadata)>> = BTreeMap::new();
        for entry in &self.entries {
            let metadata = self.metadata(&entry.key);
            groups
                .entry(metadata.group.clone())
                .or_default()
                .push((entry.key.clone(), metadata));
        }
        groups
    }

    /// Registered event types referenced by the catalog, each once.
    ///
    /// Entries with unregistered types are left out.
    pub fn listenable_types(&self) -> Vec<&EventTypeInfo> {
        let mut seen = HashSet::new();
        self.entries
            .iter()
            .filter_map(|entry| self.registry.get(entry.event_type()))
            .filter(|info| seen.insert(info.name))
            .collect()
    }

    /// The routing table this catalog was built against.
    pub fn registry(&self) -> &Arc<EventTypeRegistry> {
        &self.registry
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
