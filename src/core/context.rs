use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

/// Context keys the lane harness populates before the first step runs.
pub mod shared_keys {
    pub const LANE_NAME: &str = "lane_name";
    pub const PLATFORM_NAME: &str = "platform_name";
}

/// The shared key-value store actions use to communicate within one lane
/// run. Created by the lane harness, passed by reference into every
/// invocation, dropped when the run ends - never a process global.
///
/// Reads of unset keys return None rather than failing: "previous action's
/// output if present, otherwise fall back" is the primary composition idiom.
/// Writes are last-write-wins. Access is strictly sequential (one action at
/// a time), so no locking is needed.
#[derive(Debug, Clone, Default)]
pub struct LaneContext {
    values: BTreeMap<String, Value>,
    sensitive_keys: BTreeSet<String>,
}

impl LaneContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }

    /// Store a value that must never appear in the default rendering.
    pub fn set_sensitive(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        self.sensitive_keys.insert(key.clone());
        self.values.insert(key, value);
    }

    pub fn is_sensitive(&self, key: &str) -> bool {
        self.sensitive_keys.contains(key)
    }

    /// Remove a key, e.g. an action cleaning up a temp artifact path it
    /// published earlier. Cleanup is the action's concern, not the context's.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.sensitive_keys.remove(key);
        self.values.remove(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Render the context with sensitive values replaced. This is the only
    /// rendering that should ever reach logs or error text.
    pub fn to_redacted_json(&self) -> Value {
        let map: serde_json::Map<String, Value> = self
            .values
            .iter()
            .map(|(k, v)| {
                if self.sensitive_keys.contains(k) {
                    (k.clone(), Value::String("[REDACTED]".to_string()))
                } else {
                    (k.clone(), v.clone())
                }
            })
            .collect();
        Value::Object(map)
    }
}

impl std::fmt::Display for LaneContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_redacted_json())
    }
}
