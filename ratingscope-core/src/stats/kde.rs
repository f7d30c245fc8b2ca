//! Gaussian kernel density estimation over integer ratings.
//!
//! Ratings repeat heavily (a few thousand distinct values across hundreds of
//! thousands of users), so the fitted model keeps `(value, count)` pairs and
//! weights each kernel by its count. Each evaluation only visits support
//! points within `KERNEL_CUTOFF` bandwidths; beyond that a kernel contributes
//! less than `exp(-32)` of its peak.

use super::key::BandwidthRule;
use rayon::prelude::*;
use serde::Serialize;
use std::f64::consts::PI;
use std::sync::Arc;

/// Points on the precomputed density grid.
pub const DENSITY_GRID_POINTS: usize = 1000;

/// Kernel truncation radius, in bandwidths.
pub const KERNEL_CUTOFF: f64 = 8.0;

/// A fitted Gaussian KDE. Cheap to clone.
#[derive(Debug, Clone)]
pub struct GaussianKde {
    /// Distinct values ascending, with multiplicities.
    support: Arc<[(f64, f64)]>,
    bandwidth: f64,
    norm: f64,
}

impl GaussianKde {
    /// Fit to `samples` with the bandwidth chosen by `rule`.
    ///
    /// Bandwidth is `factor * sigma` with sigma the sample standard deviation
    /// (n - 1 denominator). A degenerate sigma (single sample or all values
    /// equal) is replaced by 1. An empty set fits a model that is zero
    /// everywhere.
    pub fn fit(samples: &[u32], rule: BandwidthRule) -> Self {
        let n = samples.len();
        let mut sorted = samples.to_vec();
        sorted.sort_unstable();

        let mut support: Vec<(f64, f64)> = Vec::new();
        for v in sorted {
            match support.last_mut() {
                Some((value, count)) if *value == v as f64 => *count += 1.0,
                _ => support.push((v as f64, 1.0)),
            }
        }

        let sigma = match sample_std_dev(&support, n) {
            Some(s) if s > 0.0 && s.is_finite() => s,
            _ => 1.0,
        };
        let bandwidth = rule.factor(n) * sigma;
        let norm = if n == 0 {
            0.0
        } else {
            1.0 / (n as f64 * bandwidth * (2.0 * PI).sqrt())
        };

        Self {
            support: support.into(),
            bandwidth,
            norm,
        }
    }

    pub fn bandwidth(&self) -> f64 {
        self.bandwidth
    }

    /// Estimated density at `x`.
    pub fn evaluate(&self, x: f64) -> f64 {
        let h = self.bandwidth;
        let reach = KERNEL_CUTOFF * h;
        let lo = self.support.partition_point(|&(p, _)| p < x - reach);
        let hi = self.support.partition_point(|&(p, _)| p <= x + reach);

        let sum: f64 = self.support[lo..hi]
            .iter()
            .map(|&(p, weight)| {
                let z = (x - p) / h;
                weight * (-0.5 * z * z).exp()
            })
            .sum();
        sum * self.norm
    }

    /// Evaluate at many points in parallel.
    pub fn evaluate_many(&self, xs: &[f64]) -> Vec<f64> {
        xs.par_iter().map(|&x| self.evaluate(x)).collect()
    }
}

fn sample_std_dev(support: &[(f64, f64)], n: usize) -> Option<f64> {
    if n < 2 {
        return None;
    }
    let n = n as f64;
    let mean = support.iter().map(|&(v, w)| v * w).sum::<f64>() / n;
    let ss = support
        .iter()
        .map(|&(v, w)| w * (v - mean) * (v - mean))
        .sum::<f64>();
    Some((ss / (n - 1.0)).sqrt())
}

/// A density curve sampled on an even grid over `[min, max]` of the samples,
/// plus the model for point evaluation.
#[derive(Debug, Clone, Serialize)]
pub struct DensityCurve {
    pub rule: BandwidthRule,
    pub bandwidth: f64,
    pub xs: Vec<f64>,
    pub ys: Vec<f64>,
    #[serde(skip)]
    pub kde: GaussianKde,
}

impl DensityCurve {
    /// Density at an arbitrary point, off-grid included.
    pub fn density_at(&self, x: f64) -> f64 {
        self.kde.evaluate(x)
    }
}

/// Fit a KDE and sample it on `DENSITY_GRID_POINTS` points.
pub fn density(samples: &[u32], rule: BandwidthRule) -> DensityCurve {
    density_on_grid(samples, rule, DENSITY_GRID_POINTS)
}

/// Fit a KDE and sample it on `points` evenly spaced points over `[min, max]`.
pub fn density_on_grid(samples: &[u32], rule: BandwidthRule, points: usize) -> DensityCurve {
    let kde = GaussianKde::fit(samples, rule);
    let xs = match (samples.iter().min(), samples.iter().max()) {
        (Some(&min), Some(&max)) => linspace(min as f64, max as f64, points),
        _ => Vec::new(),
    };
    let ys = kde.evaluate_many(&xs);

    DensityCurve {
        rule,
        bandwidth: kde.bandwidth(),
        xs,
        ys,
        kde,
    }
}

/// `points` evenly spaced values from `start` to `end`, both inclusive.
pub fn linspace(start: f64, end: f64, points: usize) -> Vec<f64> {
    match points {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (points - 1) as f64;
            (0..points)
                .map(|i| if i == points - 1 { end } else { start + step * i as f64 })
                .collect()
        }
    }
}
