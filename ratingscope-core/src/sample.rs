//! The rating sample set shared by the store, collector and statistics.

use serde::{Deserialize, Serialize};

/// Where a sample set came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleOrigin {
    /// Parsed from the persisted dataset.
    Collected,
    /// Synthetic placeholder used before the first successful collection.
    Bootstrap,
}

/// Ordered rating values, one per ranked user. Duplicates carry density mass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleSet {
    values: Vec<u32>,
    origin: SampleOrigin,
}

impl SampleSet {
    pub fn new(values: Vec<u32>, origin: SampleOrigin) -> Self {
        Self { values, origin }
    }

    pub fn collected(values: Vec<u32>) -> Self {
        Self::new(values, SampleOrigin::Collected)
    }

    pub fn values(&self) -> &[u32] {
        &self.values
    }

    pub fn into_values(self) -> Vec<u32> {
        self.values
    }

    pub fn origin(&self) -> SampleOrigin {
        self.origin
    }

    pub fn is_bootstrap(&self) -> bool {
        self.origin == SampleOrigin::Bootstrap
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn min(&self) -> Option<u32> {
        self.values.iter().copied().min()
    }

    pub fn max(&self) -> Option<u32> {
        self.values.iter().copied().max()
    }

    /// Ascending copy, used for binary-search percentile lookups.
    pub fn sorted(&self) -> Vec<u32> {
        let mut sorted = self.values.clone();
        sorted.sort_unstable();
        sorted
    }
}
