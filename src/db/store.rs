use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

pub type StoreValues = HashMap<String, Value>;

pub const API_KEY: &str = "apiKey";
pub const FILTER_CONDITION: &str = "filterCondition";
pub const IS_ENABLED: &str = "isEnabled";
pub const CLASSIFICATIONS: &str = "tweetClassifications";

pub const SETTINGS_KEYS: [&str; 3] = [API_KEY, FILTER_CONDITION, IS_ENABLED];

/// Asynchronous key-value persistence shared with the settings form.
///
/// `get` returns only the keys that exist; absent keys are simply missing
/// from the map.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, keys: &[&str]) -> Result<StoreValues>;
    async fn set(&self, values: StoreValues) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<StoreValues>,
    writes: Mutex<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_values(values: StoreValues) -> Self {
        Self {
            values: Mutex::new(values),
            writes: Mutex::new(0),
        }
    }

    /// Number of `set` calls served so far.
    pub fn write_count(&self) -> usize {
        *self.writes.lock()
    }

    pub fn value(&self, key: &str) -> Option<Value> {
        self.values.lock().get(key).cloned()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, keys: &[&str]) -> Result<StoreValues> {
        let values = self.values.lock();
        Ok(keys
            .iter()
            .filter_map(|key| values.get(*key).map(|v| (key.to_string(), v.clone())))
            .collect())
    }

    async fn set(&self, values: StoreValues) -> Result<()> {
        self.values.lock().extend(values);
        *self.writes.lock() += 1;
        Ok(())
    }
}
