use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use futures::{
    future::{BoxFuture, Shared},
    FutureExt,
};
use parking_lot::Mutex;

use crate::domain::{Decision, Fingerprint};

pub type PendingDecision = Shared<BoxFuture<'static, Decision>>;

struct Entry {
    generation: u64,
    pending: PendingDecision,
}

#[derive(Default)]
struct Registry {
    entries: Mutex<HashMap<Fingerprint, Entry>>,
    generations: AtomicU64,
}

/// Outstanding remote classifications keyed by fingerprint.
///
/// At most one request per fingerprint is outstanding; later callers join
/// the pending result instead of starting their own.
#[derive(Clone, Default)]
pub struct InFlightTracker {
    registry: Arc<Registry>,
}

/// Outcome of [`InFlightTracker::register`].
pub enum Claim {
    /// The caller owns the request and must resolve it through the guard.
    Owner(InFlightGuard),
    /// Another caller already owns a request for this fingerprint.
    Joined(PendingDecision),
}

impl InFlightTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has(&self, fingerprint: &Fingerprint) -> bool {
        self.registry.entries.lock().contains_key(fingerprint)
    }

    pub fn len(&self) -> usize {
        self.registry.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registers `request` unless one is already in flight for `fingerprint`.
    ///
    /// Futures are lazy, so a request that loses the race is dropped without
    /// ever reaching the network.
    pub fn register(
        &self,
        fingerprint: Fingerprint,
        request: BoxFuture<'static, Decision>,
    ) -> Claim {
        let mut entries = self.registry.entries.lock();
        if let Some(existing) = entries.get(&fingerprint) {
            return Claim::Joined(existing.pending.clone());
        }

        let generation = self.registry.generations.fetch_add(1, Ordering::Relaxed);
        let pending = request.shared();
        entries.insert(
            fingerprint.clone(),
            Entry {
                generation,
                pending: pending.clone(),
            },
        );

        Claim::Owner(InFlightGuard {
            fingerprint,
            generation,
            pending,
            tracker: self.clone(),
        })
    }

    /// Waits on the pending result for `fingerprint`, if any.
    pub async fn wait_for(&self, fingerprint: &Fingerprint) -> Option<Decision> {
        let pending = self
            .registry
            .entries
            .lock()
            .get(fingerprint)
            .map(|entry| entry.pending.clone())?;
        Some(pending.await)
    }

    pub fn clear(&self, fingerprint: &Fingerprint) {
        self.registry.entries.lock().remove(fingerprint);
    }

    fn release(&self, fingerprint: &Fingerprint, generation: u64) {
        let mut entries = self.registry.entries.lock();
        if entries
            .get(fingerprint)
            .is_some_and(|entry| entry.generation == generation)
        {
            entries.remove(fingerprint);
        }
    }
}

/// Ownership of one in-flight request. Dropping it clears the entry.
pub struct InFlightGuard {
    fingerprint: Fingerprint,
    generation: u64,
    pending: PendingDecision,
    tracker: InFlightTracker,
}

impl InFlightGuard {
    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    pub async fn wait(&self) -> Decision {
        self.pending.clone().await
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.tracker.release(&self.fingerprint, self.generation);
    }
}
