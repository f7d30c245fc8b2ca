//! Deterministic placeholder dataset.
//!
//! Served before the first collection has ever completed so the query path
//! has something to answer with. The values are clearly synthetic and the
//! resulting `SampleSet` is tagged `SampleOrigin::Bootstrap`.

use crate::sample::{SampleOrigin, SampleSet};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

pub const BOOTSTRAP_SEED: u64 = 0x5EED_0A7E;
pub const BOOTSTRAP_SIZE: usize = 10_000;
pub const BOOTSTRAP_MEAN: f64 = 1400.0;
pub const BOOTSTRAP_STD_DEV: f64 = 450.0;
pub const RATING_MIN: u32 = 0;
pub const RATING_MAX: u32 = 3300;

/// Normal(1400, 450) draws, rounded and clipped to `[RATING_MIN, RATING_MAX]`.
pub fn bootstrap_samples() -> SampleSet {
    let mut rng = StdRng::seed_from_u64(BOOTSTRAP_SEED);
    let normal = Normal::new(BOOTSTRAP_MEAN, BOOTSTRAP_STD_DEV)
        .expect("bootstrap normal parameters are valid");

    let values = (0..BOOTSTRAP_SIZE)
        .map(|_| {
            let draw: f64 = normal.sample(&mut rng);
            draw.round().clamp(RATING_MIN as f64, RATING_MAX as f64) as u32
        })
        .collect();

    SampleSet::new(values, SampleOrigin::Bootstrap)
}
