//! Validation State
//!
//! Field-level input errors collected while validating a single request.

use std::fmt;

use serde::ser::{Serialize, SerializeMap, Serializer};

/// Ordered mapping from field name to the error messages raised for it.
///
/// Fields keep the order in which they first received an error, and each
/// field keeps its messages in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationState {
    errors: Vec<(String, Vec<String>)>,
}

impl ValidationState {
    /// Create an empty validation state
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error message against a field
    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        let field = field.into();
        let message = message.into();

        match self.errors.iter_mut().find(|(name, _)| *name == field) {
            Some((_, messages)) => messages.push(message),
            None => self.errors.push((field, vec![message])),
        }
    }

    /// Record an error if the value is empty or only whitespace
    pub fn require_not_blank(&mut self, field: &str, value: &str) {
        if value.trim().is_empty() {
            self.add_error(field, format!("{} must not be empty.", field));
        }
    }

    /// True iff at least one field has an error
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Number of fields with errors
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Messages recorded for a field
    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.errors
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, messages)| messages.as_slice())
    }

    /// Iterate fields and their messages in insertion order
    pub fn errors(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.errors
            .iter()
            .map(|(field, messages)| (field.as_str(), messages.as_slice()))
    }
}

impl fmt::Display for ValidationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, (field, messages)) in self.errors.iter().enumerate() {
            if idx > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}: {}", field, messages.join(", "))?;
        }
        Ok(())
    }
}

impl Serialize for ValidationState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.errors.len()))?;
        for (field, messages) in &self.errors {
            map.serialize_entry(field, messages)?;
        }
        map.end()
    }
}
