//! In-memory response cache.
//!
//! Keys are opaque and chosen by the caller. Entries live until [`ResponseCache::clear`]
//! is called; there is no expiry or size bound.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
pub struct ResponseCache {
    entries: Mutex<HashMap<String, Value>>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.lock().get(key).cloned()
    }

    /// Stores `value`, replacing any previous entry for `key`.
    pub fn put(&self, key: impl Into<String>, value: Value) {
        self.lock().insert(key.into(), value);
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Value>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn get_put_clear() {
        let cache = ResponseCache::new();
        assert_eq!(cache.get("k"), None);

        cache.put("k", json!({"isValid": true}));
        assert_eq!(cache.get("k"), Some(json!({"isValid": true})));

        cache.put("k", json!({"isValid": true, "id": 2}));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("k").unwrap()["id"], 2);

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.get("k"), None);
    }
}
