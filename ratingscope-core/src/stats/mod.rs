//! Statistics over a rating sample set: percentile rank, Gaussian KDE and
//! density histogram.

pub mod histogram;
pub mod kde;
pub mod key;
pub mod percentile;

pub use histogram::{histogram, Histogram};
pub use kde::{density, density_on_grid, DensityCurve, GaussianKde, DENSITY_GRID_POINTS};
pub use key::{
    BandwidthRule, Distribution, DistributionKey, DistributionKeyError, DEFAULT_HISTOGRAM_BINS,
};
pub use percentile::{percentile_of, percentile_of_sorted};
