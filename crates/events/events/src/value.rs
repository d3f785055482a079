//! Reflected field values.
//!
//! Events that do not describe their own payload expose their public fields
//! as a [`Fields`] map. Each value is one of a closed set of shapes which the
//! payload builder knows how to normalize into JSON.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Number, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// Public fields of an event, keyed by field name.
pub type Fields = BTreeMap<String, FieldValue>;

/// A value that can export itself to a plain mapping.
pub trait Exportable: Send + Sync {
    /// Runtime type name used when the value has to be collapsed.
    fn type_name(&self) -> &'static str;

    /// Exports the value as a mapping of fields.
    fn export(&self) -> Fields;
}

/// One reflected value.
#[derive(Clone)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Sequence(Vec<FieldValue>),
    Mapping(Fields),
    Timestamp(DateTime<Utc>),
    /// A value exported on demand into a mapping.
    Exportable(Arc<dyn Exportable>),
    /// A value already serialized to its JSON-native form.
    Serializable {
        type_name: &'static str,
        value: Value,
    },
    /// A value with no known representation; carries only its type name.
    Opaque(&'static str),
}

impl FieldValue {
    /// Returns `true` for null, bool, number and string.
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            FieldValue::Null | FieldValue::Bool(_) | FieldValue::Number(_) | FieldValue::String(_)
        )
    }

    /// Name used in type tags when a value is collapsed.
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Null => "null",
            FieldValue::Bool(_) => "bool",
            FieldValue::Number(_) => "number",
            FieldValue::String(_) => "string",
            FieldValue::Sequence(_) => "sequence",
            FieldValue::Mapping(_) => "mapping",
            FieldValue::Timestamp(_) => "timestamp",
            FieldValue::Exportable(value) => value.type_name(),
            FieldValue::Serializable { type_name, .. } => type_name,
            FieldValue::Opaque(type_name) => type_name,
        }
    }

    /// Wraps a serializable value, keeping its Rust type name.
    ///
    /// A value that fails to serialize becomes opaque.
    pub fn serializable<T: Serialize + ?Sized>(value: &T) -> Self {
        let type_name = std::any::type_name::<T>();
        match serde_json::to_value(value) {
            Ok(value) => FieldValue::Serializable { type_name, value },
            Err(e) => {
                tracing::warn!(type_name, error = %e, "Field failed to serialize, treating as opaque");
                FieldValue::Opaque(type_name)
            }
        }
    }

    /// Marks a value of type `T` as opaque.
    pub fn opaque<T: ?Sized>() -> Self {
        FieldValue::Opaque(std::any::type_name::<T>())
    }
}

impl fmt::Debug for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => f.write_str("Null"),
            FieldValue::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            FieldValue::Number(n) => f.debug_tuple("Number").field(n).finish(),
            FieldValue::String(s) => f.debug_tuple("String").field(s).finish(),
            FieldValue::Sequence(items) => f.debug_tuple("Sequence").field(items).finish(),
            FieldValue::Mapping(map) => f.debug_tuple("Mapping").field(map).finish(),
            FieldValue::Timestamp(ts) => f.debug_tuple("Timestamp").field(ts).finish(),
            FieldValue::Exportable(value) => {
                f.debug_tuple("Exportable").field(&value.type_name()).finish()
            }
            FieldValue::Serializable { type_name, value } => f
                .debug_struct("Serializable")
                .field("type_name", type_name)
                .field("value", value)
                .finish(),
            FieldValue::Opaque(type_name) => f.debug_tuple("Opaque").field(type_name).finish(),
        }
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => FieldValue::Null,
            Value::Bool(b) => FieldValue::Bool(b),
            Value::Number(n) => FieldValue::Number(n),
            Value::String(s) => FieldValue::String(s),
            Value::Array(items) => {
                FieldValue::Sequence(items.into_iter().map(FieldValue::from).collect())
            }
            Value::Object(map) => FieldValue::Mapping(
                map.into_iter()
                    .map(|(k, v)| (k, FieldValue::from(v)))
                    .collect(),
            ),
        }
    }
}

/// Conversion of a field into a [`FieldValue`].
///
/// Implemented for the common scalar, collection and time types. Fields of
/// other types can be annotated with `#[webhook(serialize)]` or
/// `#[webhook(opaque)]` when deriving `WebhookEvent`.
pub trait ToFieldValue {
    fn to_field_value(&self) -> FieldValue;
}

impl ToFieldValue for FieldValue {
    fn to_field_value(&self) -> FieldValue {
        self.clone()
    }
}

impl ToFieldValue for bool {
    fn to_field_value(&self) -> FieldValue {
        FieldValue::Bool(*self)
    }
}

macro_rules! impl_integer {
    ($($ty:ty),*) => {
        $(
            impl ToFieldValue for $ty {
                fn to_field_value(&self) -> FieldValue {
                    FieldValue::Number(Number::from(*self))
                }
            }
        )*
    };
}

impl_integer!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl ToFieldValue for f32 {
    fn to_field_value(&self) -> FieldValue {
        f64::from(*self).to_field_value()
    }
}

impl ToFieldValue for f64 {
    fn to_field_value(&self) -> FieldValue {
        Number::from_f64(*self).map_or(FieldValue::Null, FieldValue::Number)
    }
}

impl ToFieldValue for str {
    fn to_field_value(&self) -> FieldValue {
        FieldValue::String(self.to_string())
    }
}

impl ToFieldValue for String {
    fn to_field_value(&self) -> FieldValue {
        FieldValue::String(self.clone())
    }
}

impl ToFieldValue for uuid::Uuid {
    fn to_field_value(&self) -> FieldValue {
        FieldValue::String(self.to_string())
    }
}

impl ToFieldValue for DateTime<Utc> {
    fn to_field_value(&self) -> FieldValue {
        FieldValue::Timestamp(*self)
    }
}

impl ToFieldValue for Value {
    fn to_field_value(&self) -> FieldValue {
        FieldValue::from(self.clone())
    }
}

impl<T: ToFieldValue> ToFieldValue for Option<T> {
    fn to_field_value(&self) -> FieldValue {
        match self {
            Some(value) => value.to_field_value(),
            None => FieldValue::Null,
        }
    }
}

impl<T: ToFieldValue> ToFieldValue for [T] {
    fn to_field_value(&self) -> FieldValue {
        FieldValue::Sequence(self.iter().map(ToFieldValue::to_field_value).collect())
    }
}

impl<T: ToFieldValue> ToFieldValue for Vec<T> {
    fn to_field_value(&self) -> FieldValue {
        self.as_slice().to_field_value()
    }
}

impl<T: ToFieldValue> ToFieldValue for BTreeMap<String, T> {
    fn to_field_value(&self) -> FieldValue {
        FieldValue::Mapping(
            self.iter()
                .map(|(k, v)| (k.clone(), v.to_field_value()))
                .collect(),
        )
    }
}

impl<T: ToFieldValue, S> ToFieldValue for HashMap<String, T, S> {
    fn to_field_value(&self) -> FieldValue {
        FieldValue::Mapping(
            self.iter()
                .map(|(k, v)| (k.clone(), v.to_field_value()))
                .collect(),
        )
    }
}

impl<T: ToFieldValue + ?Sized> ToFieldValue for &T {
    fn to_field_value(&self) -> FieldValue {
        (**self).to_field_value()
    }
}

impl<T: ToFieldValue + ?Sized> ToFieldValue for Box<T> {
    fn to_field_value(&self) -> FieldValue {
        (**self).to_field_value()
    }
}

impl<T: ToFieldValue + ?Sized> ToFieldValue for Arc<T> {
    fn to_field_value(&self) -> FieldValue {
        (**self).to_field_value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalars_convert() {
        assert!(matches!(true.to_field_value(), FieldValue::Bool(true)));
        assert!(matches!(42u32.to_field_value(), FieldValue::Number(_)));
        assert!(matches!(f64::NAN.to_field_value(), FieldValue::Null));
        assert!(matches!(None::<String>.to_field_value(), FieldValue::Null));
        assert!("x".to_field_value().is_scalar());
    }

    #[test]
    fn test_json_value_converts_structurally() {
        let value = json!({"a": [1, {"b": null}]}).to_field_value();
        let FieldValue::Mapping(map) = value else {
            panic!("expected mapping");
        };
        let FieldValue::Sequence(items) = &map["a"] else {
            panic!("expected sequence");
        };
        assert_eq!(items.len(), 2);
        assert!(matches!(items[1], FieldValue::Mapping(_)));
    }

    #[test]
    fn test_type_names() {
        struct Money;
        assert_eq!(FieldValue::Sequence(vec![]).type_name(), "sequence");
        assert!(FieldValue::opaque::<Money>().type_name().ends_with("Money"));
        let serialized = FieldValue::serializable(&vec![1, 2]);
        assert!(serialized.type_name().contains("Vec"));
    }

    #[test]
    fn test_unserializable_value_becomes_opaque() {
        let mut map = BTreeMap::new();
        map.insert(vec![1u8], 1u8);
        let value = FieldValue::serializable(&map);
        assert!(matches!(value, FieldValue::Opaque(name) if name.contains("BTreeMap")));
    }
}
