//! Observation: one decoded numeric reading for a series key.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Immutable decoded record: series key, named numeric fields, timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Identifier of the logical series (stock symbol, health subject).
    pub series_key: String,
    /// Numeric fields by name.
    pub fields: BTreeMap<String, f64>,
    /// Event time.
    pub timestamp: DateTime<Utc>,
}

impl Observation {
    /// Create an observation with no fields.
    pub fn new(series_key: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            series_key: series_key.into(),
            fields: BTreeMap::new(),
            timestamp,
        }
    }

    /// Builder: add a field.
    pub fn with_field(mut self, name: impl Into<String>, value: f64) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    /// Value of a field, if present.
    pub fn field(&self, name: &str) -> Option<f64> {
        self.fields.get(name).copied()
    }

    /// Whether the field is present.
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }
}
