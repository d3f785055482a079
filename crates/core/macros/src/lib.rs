//! # Outpost Macros
//!
//! Procedural macros for the Outpost webhook system.
//!
//! - `WebhookEvent` - Derive macro turning a struct into a webhook event

use proc_macro::TokenStream;

mod event_macro;

/// Derive macro for webhook events.
///
/// Without a `key` the struct becomes a plain event: its `pub` fields are
/// reflected into the payload when no transformer is configured. Private
/// fields are never exposed.
///
/// Field attributes:
/// - `#[webhook(skip)]` leaves the field out
/// - `#[webhook(rename = "name")]` changes the payload field name
/// - `#[webhook(serialize)]` serializes the field with serde
/// - `#[webhook(export)]` exports the field through `Exportable` (requires `Clone`)
/// - `#[webhook(opaque)]` only records the field's type name
///
/// With `key` and `payload` the struct describes its own event key, UI
/// metadata and payload.
///
/// # Example
///
/// ```rust,ignore
/// #[derive(WebhookEvent)]
/// pub struct OrderShipped {
///     pub order_id: u64,
///     pub shipped_at: DateTime<Utc>,
///     #[webhook(serialize)]
///     pub address: Address,
///     internal_note: String,
/// }
///
/// #[derive(WebhookEvent)]
/// #[webhook(key = "invoices.paid", group = "Billing", label = "Invoice paid", payload = "to_payload")]
/// pub struct InvoicePaid {
///     invoice_id: String,
/// }
/// ```
#[proc_macro_derive(WebhookEvent, attributes(webhook))]
pub fn derive_webhook_event(input: TokenStream) -> TokenStream {
    event_macro::derive_webhook_event_impl(input)
}
