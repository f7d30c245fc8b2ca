//! Property tests for the distribution cache.

use proptest::prelude::*;
use ratingscope_core::data::RatingStore;
use ratingscope_core::stats::{percentile_of, DistributionKey};
use ratingscope_core::SampleSet;
use ratingscope_runner::DistributionCache;
use std::sync::Arc;

fn cache_over(values: Vec<u32>) -> DistributionCache {
    DistributionCache::with_samples(
        RatingStore::new("unused/ratings.csv"),
        SampleSet::collected(values),
    )
}

proptest! {
    /// The cached sorted copy answers exactly like a scan of the raw samples.
    #[test]
    fn percentile_matches_linear_scan(
        values in prop::collection::vec(0u32..3500, 1..300),
        queries in prop::collection::vec(-5.0..3600.0f64, 1..20),
    ) {
        let cache = cache_over(values.clone());
        for q in queries {
            prop_assert_eq!(cache.percentile(q), percentile_of(&values, q));
        }
    }

    /// Any key memoizes to one shared result per generation.
    #[test]
    fn every_key_memoizes(
        values in prop::collection::vec(0u32..3500, 1..200),
        bins in 1usize..80,
    ) {
        let cache = cache_over(values);
        let key = DistributionKey::Histogram { bins };
        prop_assert!(Arc::ptr_eq(&cache.get(key), &cache.get(key)));
    }
}
