//! Field level validation errors.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Validation failures keyed by field name (`url`, `description`, `events.0`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors {
    errors: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a message for a field.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    /// Returns `true` if the field has at least one error.
    pub fn has(&self, field: &str) -> bool {
        self.errors.contains_key(field)
    }

    /// Messages recorded for a field.
    pub fn get(&self, field: &str) -> &[String] {
        self.errors.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Fields with errors, in order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.errors.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// `Ok(())` when nothing was recorded.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("The given data was invalid")?;
        for (field, messages) in &self.errors {
            for message in messages {
                write!(f, "; {}: {}", field, message)?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collects_messages_per_field() {
        let mut errors = ValidationErrors::new();
        assert!(errors.clone().into_result().is_ok());

        errors.add("url", "The url must start with https://.");
        errors.add("url", "The url must be a valid URL.");
        errors.add("events.1", "The selected event is invalid.");

        assert!(errors.has("url"));
        assert_eq!(errors.get("url").len(), 2);
        assert!(errors.get("description").is_empty());
        assert_eq!(errors.fields().collect::<Vec<_>>(), ["events.1", "url"]);
        assert!(errors.to_string().starts_with("The given data was invalid; events.1:"));
    }

    #[test]
    fn test_serializes_as_map() {
        let mut errors = ValidationErrors::new();
        errors.add("url", "bad");
        assert_eq!(
            serde_json::to_value(&errors).unwrap(),
            serde_json::json!({"url": ["bad"]})
        );
    }
}
