use serde_json::{json, Value};
use thiserror::Error;

use crate::db::store::{self, KeyValueStore, StoreValues};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_key: String,
    pub filter_condition: String,
    pub is_enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            filter_condition: String::new(),
            is_enabled: true,
        }
    }
}

impl Settings {
    /// Missing strings read as empty; a missing `isEnabled` reads as enabled.
    pub fn from_values(values: &StoreValues) -> Self {
        let string = |key: &str| {
            values
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        Self {
            api_key: string(store::API_KEY),
            filter_condition: string(store::FILTER_CONDITION),
            is_enabled: values
                .get(store::IS_ENABLED)
                .and_then(Value::as_bool)
                .unwrap_or(true),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty() && !self.filter_condition.is_empty()
    }

    pub fn should_run(&self) -> bool {
        self.is_enabled && self.is_configured()
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Please fill in all fields")]
    Incomplete,
    #[error("failed to save settings: {0}")]
    Store(#[from] anyhow::Error),
}

pub async fn save_settings(
    kv: &dyn KeyValueStore,
    api_key: &str,
    filter_condition: &str,
    is_enabled: bool,
) -> Result<(), SettingsError> {
    if api_key.is_empty() || filter_condition.is_empty() {
        return Err(SettingsError::Incomplete);
    }
    kv.set(StoreValues::from([
        (store::API_KEY.to_string(), json!(api_key)),
        (store::FILTER_CONDITION.to_string(), json!(filter_condition)),
        (store::IS_ENABLED.to_string(), json!(is_enabled)),
    ]))
    .await?;
    Ok(())
}

/// Writes only the enable toggle.
pub async fn set_enabled(kv: &dyn KeyValueStore, enabled: bool) -> Result<(), SettingsError> {
    kv.set(StoreValues::from([(
        store::IS_ENABLED.to_string(),
        json!(enabled),
    )]))
    .await?;
    Ok(())
}
