//! Equal-width density histogram.

use serde::Serialize;

/// Bin count used when a request does not name one.
pub const DEFAULT_BINS: usize = 60;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Histogram {
    /// `bins + 1` ascending edges.
    pub edges: Vec<f64>,
    /// Midpoint of each bin.
    pub centers: Vec<f64>,
    /// Raw count per bin.
    pub counts: Vec<u64>,
    /// `count / (n * width)`, so the bars integrate to one.
    pub densities: Vec<f64>,
}

impl Histogram {
    pub fn bins(&self) -> usize {
        self.counts.len()
    }

    pub fn bin_width(&self) -> f64 {
        match (self.edges.first(), self.edges.last()) {
            (Some(lo), Some(hi)) if self.bins() > 0 => (hi - lo) / self.bins() as f64,
            _ => 0.0,
        }
    }

    /// Index of the bin containing `x`, or `None` outside the edges.
    pub fn bin_of(&self, x: f64) -> Option<usize> {
        bin_index(&self.edges, x)
    }

    /// Density of the bin containing `x`, or 0 outside the edges.
    pub fn density_at(&self, x: f64) -> f64 {
        match self.bin_of(x) {
            Some(i) => self.densities[i],
            None => 0.0,
        }
    }
}

/// Histogram of `samples` over `[min, max]` with `bins` equal-width bins.
///
/// The last bin is closed on the right. When every sample is equal the range
/// widens to `[v - 0.5, v + 0.5]`. A zero bin count is treated as one.
pub fn histogram(samples: &[u32], bins: usize) -> Histogram {
    let bins = bins.max(1);
    let (lo, hi) = match (samples.iter().min(), samples.iter().max()) {
        (Some(&min), Some(&max)) if min == max => (min as f64 - 0.5, max as f64 + 0.5),
        (Some(&min), Some(&max)) => (min as f64, max as f64),
        _ => (0.0, 1.0),
    };
    let width = (hi - lo) / bins as f64;

    let edges: Vec<f64> = (0..=bins)
        .map(|i| if i == bins { hi } else { lo + width * i as f64 })
        .collect();
    let centers: Vec<f64> = edges.windows(2).map(|e| (e[0] + e[1]) / 2.0).collect();

    // Same edge lookup as `density_at`, so a sample's bar is the one it is counted in.
    let mut counts = vec![0u64; bins];
    for &v in samples {
        if let Some(idx) = bin_index(&edges, f64::from(v)) {
            counts[idx] += 1;
        }
    }

    let n = samples.len() as f64;
    let densities = counts
        .iter()
        .map(|&c| if n > 0.0 { c as f64 / (n * width) } else { 0.0 })
        .collect();

    Histogram {
        edges,
        centers,
        counts,
        densities,
    }
}

fn bin_index(edges: &[f64], x: f64) -> Option<usize> {
    let (&lo, &hi) = (edges.first()?, edges.last()?);
    if x < lo || x > hi || edges.len() < 2 {
        return None;
    }
    let bins = edges.len() - 1;
    // First edge strictly greater than x, minus one; the right edge belongs to the last bin.
    let idx = edges.partition_point(|&e| e <= x).saturating_sub(1);
    Some(idx.min(bins - 1))
}
