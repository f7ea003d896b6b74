use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Per-request context handed to every implementation and override layer.
///
/// Immutable once built: layers can read values the caller attached, but cannot use
/// the context as a side channel between siblings. Cloning is cheap.
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: Uuid,
    values: Arc<BTreeMap<String, JsonValue>>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self {
            request_id: Uuid::now_v7(),
            values: Arc::new(BTreeMap::new()),
        }
    }

    /// Returns a copy of this context carrying one more value.
    pub fn with_value(&self, key: impl Into<String>, value: JsonValue) -> Self {
        let mut values = (*self.values).clone();
        values.insert(key.into(), value);
        Self {
            request_id: self.request_id,
            values: Arc::new(values),
        }
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.values.get(key)
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}
