use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// Typed value stored under a step-data key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum StepValue {
    Flag(bool),
    Counter(i64),
    Decimal(f64),
    Text(String),
    /// Percentage (0..=100) toward a required skill level.
    LevelProgress(f64),
}

/// Free-form markers and counters attached to one quest slot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepData(BTreeMap<String, StepValue>);

impl StepData {
    pub fn get(&self, key: &str) -> Option<&StepValue> {
        self.0.get(key)
    }

    pub fn flag(&self, key: &str) -> bool {
        matches!(self.0.get(key), Some(StepValue::Flag(true)))
    }

    pub fn counter(&self, key: &str) -> i64 {
        match self.0.get(key) {
            Some(StepValue::Counter(value)) => *value,
            _ => 0,
        }
    }

    pub fn level_progress(&self, key: &str) -> Option<f64> {
        match self.0.get(key) {
            Some(StepValue::LevelProgress(percent)) => Some(*percent),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &StepValue)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub(crate) fn insert(&mut self, key: impl Into<String>, value: StepValue) {
        self.0.insert(key.into(), value);
    }

    pub(crate) fn set_flag(&mut self, key: impl Into<String>) {
        self.insert(key, StepValue::Flag(true));
    }

    /// Adds `delta` to a counter, treating a missing or non-counter value as 0.
    pub(crate) fn add_counter(&mut self, key: &str, delta: i64) -> i64 {
        let total = self.counter(key).saturating_add(delta);
        self.insert(key, StepValue::Counter(total));
        total
    }

    pub(crate) fn clear(&mut self) {
        self.0.clear();
    }

    pub fn encode_blob(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decodes a stored blob field by field. Besides the tagged form written
    /// by [`StepData::encode_blob`], bare scalars from older saves are
    /// accepted. Fields that match neither are dropped with a warning.
    pub fn decode_blob(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() {
            return Self::default();
        }

        let fields = match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(fields)) => fields,
            Ok(other) => {
                warn!(found = %value_kind(&other), "step_data_blob_not_an_object");
                return Self::default();
            }
            Err(error) => {
                warn!(error = %error, "step_data_blob_unreadable");
                return Self::default();
            }
        };

        let mut data = Self::default();
        for (key, value) in fields {
            match decode_field(value) {
                Some(decoded) => data.insert(key, decoded),
                None => warn!(key = %key, "step_data_field_dropped"),
            }
        }
        data
    }
}

fn decode_field(value: Value) -> Option<StepValue> {
    match value {
        Value::Object(_) => serde_json::from_value::<StepValue>(value).ok(),
        Value::Bool(flag) => Some(StepValue::Flag(flag)),
        Value::Number(number) => match number.as_i64() {
            Some(integer) => Some(StepValue::Counter(integer)),
            None => number.as_f64().map(StepValue::Decimal),
        },
        Value::String(text) => Some(StepValue::Text(text)),
        Value::Null | Value::Array(_) => None,
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
