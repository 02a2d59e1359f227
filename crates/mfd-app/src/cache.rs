use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

/// Process wide cache for computed read views. Deliberately a dumb map with a
/// single flush operation - there is no partial eviction, the only way stale
/// entries leave is the administrative [`Cache::clear`].
#[derive(Clone, Default)]
pub struct Cache {
    entries: Arc<RwLock<HashMap<String, serde_json::Value>>>,
}

impl Cache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.entries.read().unwrap().get(key).cloned()
    }

    pub fn put(&self, key: impl Into<String>, value: serde_json::Value) {
        self.entries.write().unwrap().insert(key.into(), value);
    }

    pub fn clear(&self) {
        self.entries.write().unwrap().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
