//! Percentile rank of a value within a sample set.

/// `100 * |{s <= value}| / |samples|`, or 0 for an empty set.
pub fn percentile_of(samples: &[u32], value: f64) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let at_or_below = samples.iter().filter(|&&s| s as f64 <= value).count();
    100.0 * at_or_below as f64 / samples.len() as f64
}

/// Same as [`percentile_of`] for an ascending slice, in `O(log n)`.
pub fn percentile_of_sorted(sorted: &[u32], value: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    debug_assert!(sorted.windows(2).all(|w| w[0] <= w[1]));
    let at_or_below = sorted.partition_point(|&s| s as f64 <= value);
    100.0 * at_or_below as f64 / sorted.len() as f64
}
