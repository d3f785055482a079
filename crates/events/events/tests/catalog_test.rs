//! Catalog resolution and derive macro tests.

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::sync::Arc;

use outpost_events::{
    EventCatalog, EventConfig, EventError, EventKind, EventTypeRegistry, FieldValue, PlainEvent,
    TransformerRegistry, WebhookEvent,
};

#[derive(WebhookEvent)]
pub struct OrderCreated {
    pub order_id: u64,
    pub total: f64,
    pub placed_at: DateTime<Utc>,
    pub tags: Vec<String>,
    #[webhook(serialize)]
    pub address: Address,
    #[webhook(rename = "customer")]
    pub customer_email: Option<String>,
    #[webhook(skip)]
    pub password_hash: String,
    #[webhook(opaque)]
    pub connection: Connection,
    internal_note: String,
}

#[derive(Serialize)]
pub struct Address {
    pub city: String,
}

pub struct Connection;

#[derive(WebhookEvent)]
pub struct UserDeleted {
    pub user_id: String,
}

#[derive(WebhookEvent)]
#[webhook(name = "billing::InvoicePaid")]
pub struct InvoicePaidRaw {
    pub invoice_id: String,
}

#[derive(WebhookEvent)]
pub struct Heartbeat;

#[derive(WebhookEvent)]
#[webhook(
    key = "invoices.paid",
    group = "Billing",
    label = "Invoice paid",
    description = "An invoice was paid in full",
    payload = "to_payload"
)]
pub struct InvoicePaid {
    invoice_id: String,
}

impl InvoicePaid {
    fn to_payload(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("invoice".to_string(), json!(self.invoice_id));
        map
    }
}

fn order() -> OrderCreated {
    OrderCreated {
        order_id: 42,
        total: 19.5,
        placed_at: Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
        tags: vec!["gift".to_string()],
        address: Address {
            city: "Lisbon".to_string(),
        },
        customer_email: None,
        password_hash: "secret".to_string(),
        connection: Connection,
        internal_note: "never exposed".to_string(),
    }
}

fn registry() -> Arc<EventTypeRegistry> {
    Arc::new(
        EventTypeRegistry::builder()
            .register::<OrderCreated>()
            .register::<UserDeleted>()
            .register::<InvoicePaid>()
            .register::<Heartbeat>()
            .build()
            .unwrap(),
    )
}

fn catalog() -> EventCatalog {
    EventCatalog::from_config(
        [
            (
                "orders.created".to_string(),
                EventConfig::new("OrderCreated")
                    .with_group("Orders")
                    .with_label("Order created"),
            ),
            (
                "orders.created_copy".to_string(),
                EventConfig::new("OrderCreated"),
            ),
            (
                "invoices.paid".to_string(),
                EventConfig::new("InvoicePaid")
                    .with_group("Ignored")
                    .with_label("Ignored"),
            ),
            ("legacy.thing".to_string(), EventConfig::new("MissingType")),
        ],
        registry(),
        &TransformerRegistry::new(),
    )
    .unwrap()
}

#[test]
fn test_plain_event_reflects_public_fields() {
    let event = order();
    assert_eq!(event.type_name(), "OrderCreated");
    assert_eq!(event.internal_note, "never exposed");

    let EventKind::Plain(plain) = event.kind() else {
        panic!("expected a plain event");
    };
    let fields = plain.public_fields();

    let names: Vec<_> = fields.keys().cloned().collect();
    assert_eq!(
        names,
        ["address", "connection", "customer", "order_id", "placed_at", "tags", "total"]
    );
    assert!(matches!(fields["placed_at"], FieldValue::Timestamp(_)));
    assert!(matches!(fields["customer"], FieldValue::Null));
    assert!(matches!(fields["address"], FieldValue::Serializable { .. }));
    assert!(fields["connection"].type_name().ends_with("Connection"));
}

#[test]
fn test_unit_event_has_no_fields() {
    assert!(Heartbeat.public_fields().is_empty());
}

#[test]
fn test_name_override() {
    let event = InvoicePaidRaw {
        invoice_id: "inv_1".to_string(),
    };
    assert_eq!(event.type_name(), "billing::InvoicePaid");
}

#[test]
fn test_resolve_key_for_plain_event_uses_first_entry() {
    let catalog = catalog();
    assert_eq!(catalog.resolve_key(&order()).as_deref(), Some("orders.created"));
}

#[test]
fn test_resolve_key_for_self_describing_event() {
    let catalog = catalog();
    let event = InvoicePaid {
        invoice_id: "inv_1".to_string(),
    };
    assert_eq!(catalog.resolve_key(&event).as_deref(), Some("invoices.paid"));

    // The key comes from the type itself, even with an empty catalog.
    assert_eq!(
        EventCatalog::empty().resolve_key(&event).as_deref(),
        Some("invoices.paid")
    );
}

#[test]
fn test_resolve_key_unknown_event_is_none() {
    let catalog = catalog();
    let event = UserDeleted {
        user_id: "u1".to_string(),
    };
    assert_eq!(catalog.resolve_key(&event), None);
}

#[test]
fn test_metadata_precedence() {
    let catalog = catalog();

    let configured = catalog.metadata("orders.created");
    assert_eq!(configured.group, "Orders");
    assert_eq!(configured.label, "Order created");
    assert_eq!(configured.description, None);

    let defaults = catalog.metadata("orders.created_copy");
    assert_eq!(defaults.group, "Other");
    assert_eq!(defaults.label, "orders.created_copy");

    let self_described = catalog.metadata("invoices.paid");
    assert_eq!(self_described.group, "Billing");
    assert_eq!(self_described.label, "Invoice paid");
    assert_eq!(
        self_described.description.as_deref(),
        Some("An invoice was paid in full")
    );

    let unknown = catalog.metadata("nope.nothing");
    assert_eq!(unknown.group, "Other");
    assert_eq!(unknown.label, "nope.nothing");
    assert_eq!(unknown.description, None);
}

#[test]
fn test_exists_and_lookup() {
    let catalog = catalog();
    assert!(catalog.exists("orders.created"));
    assert!(catalog.exists("legacy.thing"));
    assert!(!catalog.exists("orders.deleted"));
    assert_eq!(catalog.event_type_name("legacy.thing"), Some("MissingType"));
    assert_eq!(catalog.len(), 4);
}

#[test]
fn test_grouped() {
    let grouped = catalog().grouped();
    let groups: Vec<_> = grouped.keys().cloned().collect();
    assert_eq!(groups, ["Billing", "Orders", "Other"]);
    assert_eq!(grouped["Other"].len(), 2);
}

#[test]
fn test_listenable_types_are_distinct_and_registered() {
    let catalog = catalog();
    let names: Vec<_> = catalog.listenable_types().iter().map(|info| info.name).collect();
    assert_eq!(names, ["OrderCreated", "InvoicePaid"]);
}

#[test]
fn test_unknown_transformer_fails_fast() {
    let result = EventCatalog::from_config(
        [(
            "orders.created".to_string(),
            EventConfig::new("OrderCreated").with_transformer("missing"),
        )],
        registry(),
        &TransformerRegistry::new(),
    );
    assert!(matches!(
        result,
        Err(EventError::UnknownTransformer { transformer, .. }) if transformer == "missing"
    ));
}

#[test]
fn test_transformer_for_wrong_type_fails_fast() {
    let transformers = TransformerRegistry::new()
        .with_fn::<UserDeleted, _>("user", |event| {
            let mut map = Map::new();
            map.insert("id".to_string(), json!(event.user_id));
            map
        });
    let result = EventCatalog::from_config(
        [(
            "orders.created".to_string(),
            EventConfig::new("OrderCreated").with_transformer("user"),
        )],
        registry(),
        &transformers,
    );
    assert!(matches!(result, Err(EventError::InvalidCatalogEntry { .. })));
}

#[test]
fn test_transformer_resolved_for_key() {
    let transformers = TransformerRegistry::new()
        .with_fn::<OrderCreated, _>("order", |event| {
            let mut map = Map::new();
            map.insert("id".to_string(), json!(event.order_id));
            map
        });
    let catalog = EventCatalog::from_config(
        [(
            "orders.created".to_string(),
            EventConfig::new("OrderCreated").with_transformer("order"),
        )],
        registry(),
        &transformers,
    )
    .unwrap();

    let transformer = catalog.transformer("orders.created").unwrap();
    let data = transformer.transform(&order()).unwrap();
    assert_eq!(Value::Object(data), json!({"id": 42}));

    let wrong = UserDeleted {
        user_id: "u".to_string(),
    };
    assert!(matches!(
        transformer.transform(&wrong),
        Err(EventError::TransformFailed(..))
    ));
}

#[test]
fn test_empty_key_rejected() {
    let result = EventCatalog::from_config(
        [(" ".to_string(), EventConfig::new("OrderCreated"))],
        registry(),
        &TransformerRegistry::new(),
    );
    assert!(matches!(result, Err(EventError::InvalidCatalogEntry { .. })));
}
