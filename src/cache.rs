use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use anyhow::{Context, Result};
use futures::FutureExt;
use parking_lot::Mutex;
use serde_json::Value;

use crate::{
    db::store::{self, KeyValueStore, StoreValues},
    domain::{ClassificationMap, Decision, Fingerprint},
    tasks::debounce::{FlushAction, FlushDebouncer},
};

#[derive(Debug, Clone, Copy)]
pub struct CachePolicy {
    pub debounce_window: Duration,
    pub flush_threshold: usize,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            debounce_window: Duration::from_millis(100),
            flush_threshold: 10,
        }
    }
}

struct CacheState {
    entries: Mutex<HashMap<Fingerprint, Decision>>,
    pending_saves: AtomicUsize,
    kv: Arc<dyn KeyValueStore>,
}

/// In-memory verdicts backed by the key-value store.
///
/// Writes to the store are debounced; reaching `flush_threshold` unsaved
/// entries bypasses the debounce so an abrupt exit loses fewer verdicts.
pub struct ClassificationCache {
    state: Arc<CacheState>,
    flusher: FlushDebouncer,
    policy: CachePolicy,
}

impl ClassificationCache {
    pub fn new(kv: Arc<dyn KeyValueStore>, policy: CachePolicy) -> Self {
        let state = Arc::new(CacheState {
            entries: Mutex::new(HashMap::new()),
            pending_saves: AtomicUsize::new(0),
            kv,
        });
        let action: FlushAction = {
            let state = state.clone();
            Arc::new(move || {
                let state = state.clone();
                async move { state.persist().await }.boxed()
            })
        };
        let (flusher, _worker) = FlushDebouncer::spawn(policy.debounce_window, action);
        Self {
            state,
            flusher,
            policy,
        }
    }

    pub fn get(&self, fingerprint: &Fingerprint) -> Option<Decision> {
        self.state.entries.lock().get(fingerprint).copied()
    }

    pub fn put(&self, fingerprint: Fingerprint, decision: Decision) {
        self.state.entries.lock().insert(fingerprint, decision);
        self.state.pending_saves.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record(&self, fingerprint: Fingerprint, decision: Decision) {
        self.put(fingerprint, decision);
        self.flush(false);
    }

    pub fn flush(&self, force: bool) {
        let threshold = self.policy.flush_threshold;
        let reached = self
            .state
            .pending_saves
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |pending| {
                (pending >= threshold).then_some(0)
            })
            .is_ok();
        if force || reached {
            self.flusher.force_flush();
        } else {
            self.flusher.schedule();
        }
    }

    /// Merges persisted verdicts into memory. Returns the resulting size.
    ///
    /// A missing or undecodable value leaves the cache as it was. Entries
    /// decided during this session win over persisted ones.
    pub async fn load(&self) -> usize {
        match self.read_persisted().await {
            Ok(persisted) => {
                let mut entries = self.state.entries.lock();
                for (key, keep) in persisted {
                    entries
                        .entry(Fingerprint::from(key))
                        .or_insert(Decision::from(keep));
                }
                let loaded = entries.len();
                tracing::info!(target: "cache", entries = loaded, "loaded cached classifications");
                loaded
            }
            Err(err) => {
                tracing::warn!(
                    target: "cache",
                    error = %err,
                    "could not load cached classifications; starting empty"
                );
                self.len()
            }
        }
    }

    pub async fn persist_now(&self) {
        self.state.persist().await;
    }

    pub fn len(&self) -> usize {
        self.state.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn pending_saves(&self) -> usize {
        self.state.pending_saves.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> ClassificationMap {
        self.state.snapshot()
    }

    async fn read_persisted(&self) -> Result<ClassificationMap> {
        let values = self.state.kv.get(&[store::CLASSIFICATIONS]).await?;
        match values.get(store::CLASSIFICATIONS) {
            None | Some(Value::Null) => Ok(ClassificationMap::new()),
            Some(Value::String(raw)) if raw.trim().is_empty() => Ok(ClassificationMap::new()),
            Some(Value::String(raw)) => {
                serde_json::from_str(raw).context("stored classifications are not a JSON object")
            }
            Some(other) => serde_json::from_value(other.clone())
                .context("stored classifications have an unexpected shape"),
        }
    }
}

impl CacheState {
    fn snapshot(&self) -> ClassificationMap {
        self.entries
            .lock()
            .iter()
            .map(|(key, decision)| (key.as_str().to_string(), decision.is_keep()))
            .collect()
    }

    async fn persist(&self) {
        self.pending_saves.store(0, Ordering::SeqCst);
        let snapshot = self.snapshot();
        let total = snapshot.len();

        let encoded = match serde_json::to_string(&snapshot) {
            Ok(encoded) => encoded,
            Err(err) => {
                tracing::warn!(target: "cache", error = %err, "failed to encode classifications");
                return;
            }
        };

        let values =
            StoreValues::from([(store::CLASSIFICATIONS.to_string(), Value::String(encoded))]);
        match self.kv.set(values).await {
            Ok(()) => tracing::debug!(target: "cache", entries = total, "saved classifications"),
            Err(err) => tracing::warn!(
                target: "cache",
                entries = total,
                error = %err,
                "failed to save classifications; keeping them in memory"
            ),
        }
    }
}
