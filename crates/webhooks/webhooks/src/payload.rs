//! Payload building.
//!
//! Turns an event (or explicit data) into envelope `data`, normalizing
//! reflected fields into depth-bounded JSON, and wraps it into an
//! [`Envelope`].

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use uuid::Uuid;

use outpost_events::{EventCatalog, EventKind, FieldValue, Fields, WebhookEvent};

use crate::error::WebhookResult;

/// Nesting depth after which non-scalar values collapse to a type tag.
pub const MAX_DEPTH: usize = 5;

/// Formats a timestamp as RFC 3339 with a `+00:00` offset and second precision.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, false)
}

mod rfc3339 {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_timestamp(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

/// The unit delivered to every endpoint of one dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub id: Uuid,
    pub event_key: String,
    #[serde(with = "rfc3339")]
    pub occurred_at: DateTime<Utc>,
    pub data: Map<String, Value>,
    pub meta: Map<String, Value>,
}

impl Envelope {
    /// Serializes the envelope into the exact body that is signed and sent.
    pub fn to_body(&self) -> WebhookResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Builds envelopes for dispatches.
#[derive(Debug, Clone)]
pub struct PayloadBuilder {
    catalog: Arc<EventCatalog>,
    default_meta: Map<String, Value>,
}

impl PayloadBuilder {
    /// Creates a builder with `app_name` and `environment` as default meta.
    pub fn new(
        catalog: Arc<EventCatalog>,
        app_name: impl Into<String>,
        environment: impl Into<String>,
    ) -> Self {
        let mut default_meta = Map::new();
        default_meta.insert("app_name".to_string(), Value::String(app_name.into()));
        default_meta.insert("environment".to_string(), Value::String(environment.into()));
        Self {
            catalog,
            default_meta,
        }
    }

    pub fn catalog(&self) -> &Arc<EventCatalog> {
        &self.catalog
    }

    /// Builds an envelope for `event_key`.
    ///
    /// Data precedence: explicit data, then nothing when there is no event,
    /// then the event's own payload, then the key's transformer, then the
    /// event's normalized public fields.
    pub fn build(
        &self,
        event_key: &str,
        event: Option<&dyn WebhookEvent>,
        data: Option<Map<String, Value>>,
        meta: Map<String, Value>,
    ) -> WebhookResult<Envelope> {
        let data = self.extract_data(event_key, event, data)?;
        Ok(self.wrap(event_key, data, meta))
    }

    /// Resolves envelope `data`.
    pub fn extract_data(
        &self,
        event_key: &str,
        event: Option<&dyn WebhookEvent>,
        data: Option<Map<String, Value>>,
    ) -> WebhookResult<Map<String, Value>> {
        if let Some(data) = data {
            return Ok(data);
        }
        let Some(event) = event else {
            return Ok(Map::new());
        };

        match event.kind() {
            EventKind::SelfDescribing(event) => Ok(event.webhook_payload()),
            EventKind::Plain(plain) => match self.catalog.transformer(event_key) {
                Some(transformer) => Ok(transformer.transform(event)?),
                None => Ok(normalize_fields(&plain.public_fields(), event.type_name())),
            },
        }
    }

    /// Wraps data into a new envelope with a fresh id and timestamp.
    ///
    /// Caller meta is merged over the defaults; caller keys win.
    pub fn wrap(&self, event_key: &str, data: Map<String, Value>, meta: Map<String, Value>) -> Envelope {
        let mut merged = self.default_meta.clone();
        merged.extend(meta);

        Envelope {
            id: Uuid::new_v4(),
            event_key: event_key.to_string(),
            occurred_at: Utc::now(),
            data,
            meta: merged,
        }
    }
}

/// Normalizes reflected public fields.
///
/// An empty field set yields `{"event": {"class": <type name>}}`.
pub fn normalize_fields(fields: &Fields, type_name: &str) -> Map<String, Value> {
    if fields.is_empty() {
        let mut data = Map::new();
        data.insert("event".to_string(), json!({ "class": type_name }));
        return data;
    }

    fields
        .iter()
        .map(|(name, value)| (name.clone(), normalize_value(value, 0)))
        .collect()
}

/// Normalizes one value at the given depth.
pub fn normalize_value(value: &FieldValue, depth: usize) -> Value {
    match value {
        FieldValue::Null => Value::Null,
        FieldValue::Bool(b) => Value::Bool(*b),
        FieldValue::Number(n) => Value::Number(n.clone()),
        FieldValue::String(s) => Value::String(s.clone()),
        _ if depth > MAX_DEPTH => json!({ "type": value.type_name() }),
        FieldValue::Sequence(items) => Value::Array(
            items
                .iter()
                .map(|item| normalize_value(item, depth + 1))
                .collect(),
        ),
        FieldValue::Mapping(map) => Value::Object(normalize_mapping(map, depth + 1)),
        FieldValue::Timestamp(ts) => Value::String(format_timestamp(ts)),
        FieldValue::Exportable(exportable) => {
            normalize_value(&FieldValue::Mapping(exportable.export()), depth + 1)
        }
        FieldValue::Serializable { value, .. } => {
            normalize_value(&FieldValue::from(value.clone()), depth + 1)
        }
        FieldValue::Opaque(type_name) => json!({ "class": type_name }),
    }
}

fn normalize_mapping(map: &Fields, depth: usize) -> Map<String, Value> {
    map.iter()
        .map(|(key, value)| (key.clone(), normalize_value(value, depth)))
        .collect()
}

/// Normalizes an arbitrary JSON value, starting at depth 0.
pub fn normalize_json(value: &Value) -> Value {
    normalize_value(&FieldValue::from(value.clone()), 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use outpost_events::Exportable;

    fn builder() -> PayloadBuilder {
        PayloadBuilder::new(Arc::new(EventCatalog::empty()), "shop", "testing")
    }

    fn meta(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_json_safe_input_is_unchanged() {
        let value = json!({"a": 1, "b": 2.5, "c": "x", "d": null, "e": [true, false]});
        assert_eq!(normalize_json(&value), value);
    }

    #[test]
    fn test_depth_guard() {
        let mut nested = json!("leaf");
        for _ in 0..10 {
            nested = json!({ "child": nested });
        }
        let normalized = normalize_json(&nested);

        // Top value is depth 0; the mapping reached at depth 6 collapses.
        let mut cursor = &normalized;
        for _ in 0..6 {
            cursor = &cursor["child"];
        }
        assert_eq!(cursor, &json!({"type": "mapping"}));
    }

    #[test]
    fn test_scalars_survive_past_depth_limit() {
        let value = FieldValue::String("deep".to_string());
        assert_eq!(normalize_value(&value, 50), json!("deep"));
        assert_eq!(
            normalize_value(&FieldValue::Sequence(vec![]), 6),
            json!({"type": "sequence"})
        );
    }

    #[test]
    fn test_timestamp_format() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();
        assert_eq!(
            normalize_value(&FieldValue::Timestamp(ts), 0),
            json!("2024-05-06T07:08:09+00:00")
        );
    }

    #[test]
    fn test_opaque_and_serializable() {
        assert_eq!(
            normalize_value(&FieldValue::Opaque("app::Socket"), 0),
            json!({"class": "app::Socket"})
        );
        let value = FieldValue::Serializable {
            type_name: "app::Money",
            value: json!({"amount": 100, "currency": "EUR"}),
        };
        assert_eq!(
            normalize_value(&value, 0),
            json!({"amount": 100, "currency": "EUR"})
        );
    }

    struct Money;

    impl Exportable for Money {
        fn type_name(&self) -> &'static str {
            "app::Money"
        }

        fn export(&self) -> Fields {
            let mut fields = Fields::new();
            fields.insert("amount".to_string(), FieldValue::Number(100.into()));
            fields
        }
    }

    #[test]
    fn test_exportable() {
        let value = FieldValue::Exportable(Arc::new(Money));
        assert_eq!(normalize_value(&value, 0), json!({"amount": 100}));
        assert_eq!(normalize_value(&value, 6), json!({"type": "app::Money"}));
    }

    #[test]
    fn test_empty_fields_report_class() {
        let data = normalize_fields(&Fields::new(), "Heartbeat");
        assert_eq!(Value::Object(data), json!({"event": {"class": "Heartbeat"}}));
    }

    #[test]
    fn test_explicit_data_wins_and_meta_merges() {
        let envelope = builder()
            .build(
                "orders.created",
                None,
                Some(meta(&[("order_id", json!(42))])),
                meta(&[("environment", json!("staging")), ("test", json!(true))]),
            )
            .unwrap();

        assert_eq!(envelope.event_key, "orders.created");
        assert_eq!(Value::Object(envelope.data), json!({"order_id": 42}));
        assert_eq!(
            Value::Object(envelope.meta),
            json!({"app_name": "shop", "environment": "staging", "test": true})
        );
    }

    #[test]
    fn test_no_event_no_data_is_empty() {
        let envelope = builder().build("a.b", None, None, Map::new()).unwrap();
        assert!(envelope.data.is_empty());
        assert_eq!(envelope.meta["app_name"], json!("shop"));
    }

    #[test]
    fn test_envelope_wire_shape() {
        let envelope = builder().build("a.b", None, None, Map::new()).unwrap();
        let body: Value = serde_json::from_str(&envelope.to_body().unwrap()).unwrap();
        let mut keys: Vec<_> = body.as_object().unwrap().keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, ["data", "event_key", "id", "meta", "occurred_at"]);
        assert!(body["occurred_at"].as_str().unwrap().ends_with("+00:00"));

        let parsed: Envelope = serde_json::from_value(body).unwrap();
        assert_eq!(parsed.id, envelope.id);
    }

    #[test]
    fn test_fresh_id_per_envelope() {
        let builder = builder();
        let a = builder.wrap("k", Map::new(), Map::new());
        let b = builder.wrap("k", Map::new(), Map::new());
        assert_ne!(a.id, b.id);
    }
}
