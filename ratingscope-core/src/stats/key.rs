//! Distribution keys and the values they compute.
//!
//! A `DistributionKey` names one derived distribution of a sample set (a KDE
//! with a bandwidth rule, or a histogram with a bin count). Keys are hashable
//! so a cache can memoize one `Distribution` per key.

use super::histogram::{histogram, Histogram, DEFAULT_BINS};
use super::kde::{density, DensityCurve};
use serde::{Serialize, Serializer};
use std::fmt;
use std::hash::{Hash, Hasher};
use thiserror::Error;

/// Default histogram bin count.
pub const DEFAULT_HISTOGRAM_BINS: usize = DEFAULT_BINS;

#[derive(Debug, Error, PartialEq)]
pub enum DistributionKeyError {
    #[error("unknown distribution kind '{0}' (expected 'density' or 'histogram')")]
    UnknownKind(String),

    #[error("invalid bandwidth '{0}' (expected 'scott', 'silverman' or a positive number)")]
    InvalidBandwidth(String),

    #[error("invalid bin count '{0}' (expected a positive integer)")]
    InvalidBins(String),
}

/// KDE bandwidth selection.
#[derive(Debug, Clone, Copy)]
pub enum BandwidthRule {
    /// `n^(-1/5)`
    Scott,
    /// `(3n/4)^(-1/5)`
    Silverman,
    /// Fixed factor, multiplied by the sample standard deviation.
    Scalar(f64),
}

impl BandwidthRule {
    /// Factor applied to the sample standard deviation for `n` samples.
    pub fn factor(self, n: usize) -> f64 {
        let n = n.max(1) as f64;
        match self {
            BandwidthRule::Scott => n.powf(-0.2),
            BandwidthRule::Silverman => (n * 0.75).powf(-0.2),
            BandwidthRule::Scalar(f) => f,
        }
    }

    pub fn parse(s: &str) -> Result<Self, DistributionKeyError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "scott" => Ok(BandwidthRule::Scott),
            "silverman" => Ok(BandwidthRule::Silverman),
            other => match other.parse::<f64>() {
                Ok(f) if f.is_finite() && f > 0.0 => Ok(BandwidthRule::Scalar(f)),
                _ => Err(DistributionKeyError::InvalidBandwidth(s.to_string())),
            },
        }
    }
}

// Scalars compare by bit pattern so the rule can key a map. Parsing rejects
// NaN, so bitwise and numeric equality agree for every constructible value.
impl PartialEq for BandwidthRule {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (BandwidthRule::Scott, BandwidthRule::Scott) => true,
            (BandwidthRule::Silverman, BandwidthRule::Silverman) => true,
            (BandwidthRule::Scalar(a), BandwidthRule::Scalar(b)) => a.to_bits() == b.to_bits(),
            _ => false,
        }
    }
}

impl Eq for BandwidthRule {}

impl Hash for BandwidthRule {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        if let BandwidthRule::Scalar(f) = self {
            f.to_bits().hash(state);
        }
    }
}

impl fmt::Display for BandwidthRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BandwidthRule::Scott => write!(f, "scott"),
            BandwidthRule::Silverman => write!(f, "silverman"),
            BandwidthRule::Scalar(v) => write!(f, "{v}"),
        }
    }
}

impl Serialize for BandwidthRule {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            BandwidthRule::Scalar(v) => serializer.serialize_f64(*v),
            other => serializer.collect_str(other),
        }
    }
}

/// Identifies one memoizable distribution of a sample set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DistributionKey {
    Density(BandwidthRule),
    Histogram { bins: usize },
}

impl Default for DistributionKey {
    fn default() -> Self {
        DistributionKey::Density(BandwidthRule::Scott)
    }
}

impl DistributionKey {
    /// Parse a `(kind, param)` pair as supplied by a caller.
    ///
    /// `kind` is `density` or `histogram`. A missing param selects Scott's
    /// rule or `DEFAULT_HISTOGRAM_BINS`.
    pub fn parse(kind: &str, param: Option<&str>) -> Result<Self, DistributionKeyError> {
        match kind.trim().to_ascii_lowercase().as_str() {
            "density" | "kde" => match param {
                None => Ok(DistributionKey::Density(BandwidthRule::Scott)),
                Some(p) => BandwidthRule::parse(p).map(DistributionKey::Density),
            },
            "histogram" | "hist" => match param {
                None => Ok(DistributionKey::Histogram {
                    bins: DEFAULT_HISTOGRAM_BINS,
                }),
                Some(p) => match p.trim().parse::<usize>() {
                    Ok(bins) if bins > 0 => Ok(DistributionKey::Histogram { bins }),
                    _ => Err(DistributionKeyError::InvalidBins(p.to_string())),
                },
            },
            _ => Err(DistributionKeyError::UnknownKind(kind.to_string())),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            DistributionKey::Density(_) => "density",
            DistributionKey::Histogram { .. } => "histogram",
        }
    }

    /// Compute the distribution this key names over `samples`.
    pub fn compute(&self, samples: &[u32]) -> Distribution {
        match *self {
            DistributionKey::Density(rule) => Distribution::Density(density(samples, rule)),
            DistributionKey::Histogram { bins } => {
                Distribution::Histogram(histogram(samples, bins))
            }
        }
    }
}

impl fmt::Display for DistributionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DistributionKey::Density(rule) => write!(f, "density({rule})"),
            DistributionKey::Histogram { bins } => write!(f, "histogram({bins})"),
        }
    }
}

/// A computed distribution.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Distribution {
    Density(DensityCurve),
    Histogram(Histogram),
}

impl Distribution {
    /// Density at `x`: the KDE value, or the density of the histogram bin
    /// holding `x`.
    pub fn density_at(&self, x: f64) -> f64 {
        match self {
            Distribution::Density(curve) => curve.density_at(x),
            Distribution::Histogram(h) => h.density_at(x),
        }
    }
}
