use std::sync::Arc;

use anyhow::Result;
use parking_lot::RwLock;

use crate::{
    cache::{CachePolicy, ClassificationCache},
    db::store::{self, KeyValueStore},
    domain::Settings,
    tasks::inflight::InFlightTracker,
};

pub struct FilterContext {
    kv: Arc<dyn KeyValueStore>,
    settings: RwLock<Settings>,
    cache: ClassificationCache,
    inflight: InFlightTracker,
}

impl FilterContext {
    /// Loads settings and cached verdicts. Store failures leave defaults in
    /// place, which keeps the filter inactive until settings can be read.
    pub async fn initialize(kv: Arc<dyn KeyValueStore>, policy: CachePolicy) -> Arc<Self> {
        let context = Arc::new(Self {
            cache: ClassificationCache::new(kv.clone(), policy),
            kv,
            settings: RwLock::new(Settings::default()),
            inflight: InFlightTracker::new(),
        });

        if let Err(err) = context.refresh_settings().await {
            tracing::warn!(
                target: "settings",
                error = %err,
                "could not read settings; using defaults"
            );
        }
        context.cache.load().await;
        context
    }

    /// Re-reads every settings key, as on a settings-update notification.
    pub async fn refresh_settings(&self) -> Result<Settings> {
        let values = self.kv.get(&store::SETTINGS_KEYS).await?;
        let settings = Settings::from_values(&values);
        *self.settings.write() = settings.clone();
        tracing::info!(
            target: "settings",
            enabled = settings.is_enabled,
            configured = settings.is_configured(),
            "settings loaded"
        );
        Ok(settings)
    }

    pub fn settings(&self) -> Settings {
        self.settings.read().clone()
    }

    pub fn cache(&self) -> &ClassificationCache {
        &self.cache
    }

    pub fn inflight(&self) -> &InFlightTracker {
        &self.inflight
    }

    pub fn store(&self) -> Arc<dyn KeyValueStore> {
        self.kv.clone()
    }

    pub async fn shutdown(&self) {
        self.cache.persist_now().await;
    }
}
