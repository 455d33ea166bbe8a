//! Robust Statistics - Median / MAD outlier scoring
//!
//! Scores a value against a window using the median and the median absolute
//! deviation (MAD) instead of mean and standard deviation. A single extreme
//! reading does not inflate the MAD, so an outlier cannot mask itself.
//!
//! ## Robust z-score
//!
//! ```text
//! z = 0.6745 * (x - median) / MAD        (z = 0 when MAD == 0)
//! ```
//!
//! The 0.6745 factor rescales MAD to a consistent estimator of the standard
//! deviation under a normal distribution, so one threshold (3.5 by default)
//! applies across channels with very different units.
//!
//! ## Usage
//!
//! ```ignore
//! let window = [10.0, 10.0, 10.0, 10.0, 11.0];
//! let score = RobustScore::compute(11.0, &window);
//! assert_eq!(score.mad, 0.0);
//! assert_eq!(score.z, 0.0);
//! ```

use serde::{Deserialize, Serialize};

/// Rescales MAD to sigma-equivalent units for normally distributed data.
pub const MAD_CONSISTENCY: f64 = 0.6745;

/// Median of a slice (non-destructive, clones and sorts).
///
/// Returns 0.0 for an empty slice.
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Median absolute deviation around the median.
///
/// 0.0 for empty and single-element slices.
pub fn mad(values: &[f64]) -> f64 {
    mad_around(values, median(values))
}

fn mad_around(values: &[f64], center: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let deviations: Vec<f64> = values.iter().map(|x| (x - center).abs()).collect();
    median(&deviations)
}

/// Robust z-score of `x` against `values`.
pub fn robust_zscore(x: f64, values: &[f64]) -> f64 {
    RobustScore::compute(x, values).z
}

/// Median, MAD and robust z-score of one value against a window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RobustScore {
    pub median: f64,
    pub mad: f64,
    pub z: f64,
}

impl RobustScore {
    pub fn compute(x: f64, values: &[f64]) -> Self {
        let median = median(values);
        let mad = mad_around(values, median);
        let z = if mad == 0.0 {
            0.0
        } else {
            MAD_CONSISTENCY * (x - median) / mad
        };
        Self { median, mad, z }
    }

    /// True when |z| strictly exceeds `threshold`.
    pub fn exceeds(&self, threshold: f64) -> bool {
        self.z.abs() > threshold
    }
}
