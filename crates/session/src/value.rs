//! Per-session claim payload.
//!
//! On the wire the payload is a JSON object keyed by claim id, each entry holding the
//! value and the time it was fetched:
//!
//! ```text
//! { "st-role": { "v": ["admin"], "t": 1700000000000 } }
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::claim::ClaimId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimValue {
    #[serde(rename = "v")]
    pub value: JsonValue,
    #[serde(rename = "t", with = "chrono::serde::ts_milliseconds")]
    pub last_fetched_at: DateTime<Utc>,
}

impl ClaimValue {
    pub fn new(value: JsonValue, last_fetched_at: DateTime<Utc>) -> Self {
        Self {
            value,
            last_fetched_at,
        }
    }

    /// Whether the value is older than `max_age` at `now`.
    pub fn is_stale(&self, max_age: Option<Duration>, now: DateTime<Utc>) -> bool {
        match max_age {
            Some(max_age) => now - self.last_fetched_at > max_age,
            None => false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClaimStore(BTreeMap<ClaimId, ClaimValue>);

impl ClaimStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, claim_id: &ClaimId) -> Option<&ClaimValue> {
        self.0.get(claim_id)
    }

    pub fn set(&mut self, claim_id: ClaimId, value: JsonValue, now: DateTime<Utc>) {
        self.0.insert(claim_id, ClaimValue::new(value, now));
    }

    pub fn remove(&mut self, claim_id: &ClaimId) -> Option<ClaimValue> {
        self.0.remove(claim_id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ClaimId, &ClaimValue)> {
        self.0.iter()
    }

    /// JSON rendering of the payload (what a token-minting layer would embed).
    pub fn to_json(&self) -> JsonValue {
        serde_json::to_value(self).unwrap_or(JsonValue::Null)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    #[test]
    fn payload_uses_compact_wire_keys() {
        let at = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        let mut store = ClaimStore::new();
        store.set(ClaimId::new("role"), json!(["admin"]), at);

        assert_eq!(
            store.to_json(),
            json!({ "role": { "v": ["admin"], "t": 1_700_000_000_000i64 } })
        );

        let parsed: ClaimStore =
            serde_json::from_value(json!({ "role": { "v": ["user"], "t": 5 } })).unwrap();
        let value = parsed.get(&ClaimId::new("role")).unwrap();
        assert_eq!(value.value, json!(["user"]));
        assert_eq!(value.last_fetched_at.timestamp_millis(), 5);
    }

    #[test]
    fn staleness_respects_max_age() {
        let now = Utc::now();
        let value = ClaimValue::new(json!(true), now - Duration::seconds(30));

        assert!(!value.is_stale(None, now));
        assert!(!value.is_stale(Some(Duration::seconds(60)), now));
        assert!(value.is_stale(Some(Duration::seconds(10)), now));
    }
}
