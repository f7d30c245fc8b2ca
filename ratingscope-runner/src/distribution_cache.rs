//! Generation-scoped cache of derived distributions.
//!
//! Each reload of the store produces a new `Generation`: the sample set, its
//! sorted copy and an empty memo table. Readers take an `Arc` to the current
//! generation and work on that snapshot, so a result is always computed from
//! and stored into the same generation. A reload swaps the `Arc`; readers
//! still holding the old one finish against the old data.

use parking_lot::{Mutex, RwLock};
use ratingscope_core::data::{RatingStore, StoreError};
use ratingscope_core::stats::{percentile_of_sorted, BandwidthRule, Distribution, DistributionKey};
use ratingscope_core::{SampleOrigin, SampleSet};
use std::collections::HashMap;
use std::sync::Arc;

/// One consistent pairing of a sample set with its memoized distributions.
#[derive(Debug)]
pub struct Generation {
    id: u64,
    samples: SampleSet,
    sorted: Vec<u32>,
    memo: Mutex<HashMap<DistributionKey, Arc<Distribution>>>,
}

impl Generation {
    fn new(id: u64, samples: SampleSet) -> Self {
        let sorted = samples.sorted();
        Self {
            id,
            samples,
            sorted,
            memo: Mutex::new(HashMap::new()),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn samples(&self) -> &SampleSet {
        &self.samples
    }

    pub fn origin(&self) -> SampleOrigin {
        self.samples.origin()
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Percentile rank of `value`; not memoized.
    pub fn percentile(&self, value: f64) -> f64 {
        percentile_of_sorted(&self.sorted, value)
    }

    /// Memoized distribution for `key`.
    ///
    /// Computation runs outside the memo lock. If two callers race on the
    /// same key, the first insert wins and both get that `Arc`.
    pub fn distribution(&self, key: DistributionKey) -> Arc<Distribution> {
        if let Some(hit) = self.memo.lock().get(&key) {
            return Arc::clone(hit);
        }

        let computed = Arc::new(key.compute(self.samples.values()));
        tracing::debug!(generation = self.id, key = %key, "computed distribution");

        let mut memo = self.memo.lock();
        Arc::clone(memo.entry(key).or_insert(computed))
    }

    /// Number of memoized distributions.
    pub fn cached_keys(&self) -> usize {
        self.memo.lock().len()
    }
}

/// Serves distributions and percentiles for the current dataset.
pub struct DistributionCache {
    store: RatingStore,
    current: RwLock<Arc<Generation>>,
    /// Serializes reloads so generation ids install in order.
    reload_lock: Mutex<u64>,
}

impl DistributionCache {
    /// Load the first generation from `store`.
    ///
    /// A read failure falls back to the bootstrap sample set.
    pub fn new(store: RatingStore) -> Self {
        let samples = match store.read() {
            Ok(samples) => samples,
            Err(e) => {
                tracing::warn!(
                    path = %store.path().display(),
                    error = %e,
                    "failed to load dataset, serving bootstrap samples"
                );
                ratingscope_core::data::bootstrap_samples()
            }
        };
        Self::with_samples(store, samples)
    }

    /// Start from an in-memory sample set instead of reading the store.
    pub fn with_samples(store: RatingStore, samples: SampleSet) -> Self {
        tracing::info!(
            samples = samples.len(),
            origin = ?samples.origin(),
            "distribution cache ready"
        );
        Self {
            store,
            current: RwLock::new(Arc::new(Generation::new(1, samples))),
            reload_lock: Mutex::new(1),
        }
    }

    pub fn store(&self) -> &RatingStore {
        &self.store
    }

    /// Re-read the store and install a new generation.
    ///
    /// The file is read without holding the generation lock. On failure the
    /// current generation stays in place.
    pub fn reload(&self) -> Result<u64, StoreError> {
        let mut last_id = self.reload_lock.lock();
        let samples = self.store.read()?;
        let id = *last_id + 1;
        let next = Arc::new(Generation::new(id, samples));

        let (count, origin) = (next.sample_count(), next.origin());
        *self.current.write() = next;
        *last_id = id;

        tracing::info!(generation = id, samples = count, origin = ?origin, "dataset reloaded");
        Ok(id)
    }

    /// The current generation. Hold it to answer several questions from one
    /// consistent sample set.
    pub fn snapshot(&self) -> Arc<Generation> {
        self.current.read().clone()
    }

    pub fn get(&self, key: DistributionKey) -> Arc<Distribution> {
        self.snapshot().distribution(key)
    }

    pub fn percentile(&self, value: f64) -> f64 {
        self.snapshot().percentile(value)
    }

    /// Density of the KDE for `rule` at `value`, fitting it on first use.
    pub fn density_at(&self, rule: BandwidthRule, value: f64) -> f64 {
        self.get(DistributionKey::Density(rule)).density_at(value)
    }

    pub fn generation(&self) -> u64 {
        self.current.read().id()
    }

    pub fn sample_count(&self) -> usize {
        self.current.read().sample_count()
    }

    pub fn origin(&self) -> SampleOrigin {
        self.current.read().origin()
    }
}
