//! Anomaly Classifier - per-channel robust scoring plus the surge floor rule
//!
//! Two independent, non-exclusive rules run on every reading:
//!
//! 1. **Statistical**: for each measured channel, the newest value is scored
//!    against the window (which already contains it). |z| above the threshold
//!    flags the channel. Skipped while the window is shorter than the scoring
//!    minimum.
//! 2. **Surge floor**: a surge margin below the floor flags `SurgeMargin`
//!    regardless of history. Low margin is dangerous even when it is "normal"
//!    for the machine.
//!
//! Every channel that fires appears in the flags, not just the worst one.
//! Values are rounded only after scoring.

use tracing::trace;

use crate::config::DetectionConfig;
use crate::statistics::RobustScore;
use crate::types::{round_to, AnomalyFlags, Channel, Reading};

/// Stateless classifier configured with detection thresholds.
#[derive(Debug, Clone)]
pub struct AnomalyClassifier {
    config: DetectionConfig,
}

impl Default for AnomalyClassifier {
    fn default() -> Self {
        Self::new(DetectionConfig::default())
    }
}

impl AnomalyClassifier {
    pub fn new(config: DetectionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    /// Whether a window of `len` readings is long enough for statistical scoring.
    pub fn can_score(&self, len: usize) -> bool {
        len >= self.config.min_window_for_scoring
    }

    /// Classify `reading` against `window`.
    ///
    /// `window` is expected to include `reading` as its newest element.
    pub fn classify(&self, reading: &Reading, window: &[Reading]) -> AnomalyFlags {
        let mut flags = AnomalyFlags::new();
        let decimals = self.config.flag_precision_decimals;

        if self.can_score(window.len()) {
            for channel in Channel::MEASURED {
                let Some(current) = reading.value(channel) else {
                    continue;
                };
                let values: Vec<f64> = window.iter().filter_map(|r| r.value(channel)).collect();
                let score = RobustScore::compute(current, &values);
                trace!(
                    channel = %channel,
                    value = current,
                    median = score.median,
                    mad = score.mad,
                    z = score.z,
                    "Scored channel"
                );
                if score.exceeds(self.config.robust_z_threshold) {
                    flags.insert(channel, round_to(current, decimals));
                }
            }
        }

        if let Some(margin) = reading.value(Channel::SurgeMargin) {
            if margin < self.config.surge_margin_floor_percent {
                flags.insert(Channel::SurgeMargin, round_to(margin, decimals));
            }
        }

        flags
    }
}
