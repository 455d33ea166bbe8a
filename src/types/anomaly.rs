//! Anomaly flag and event types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{Channel, MachineId, Reading};

/// Round a value to a fixed number of decimal places.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// Channels that breached a rule on one reading, with their rounded values.
///
/// Non-empty iff the reading is anomalous. Iteration follows the canonical
/// [`Channel`] order, never insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnomalyFlags(BTreeMap<Channel, f64>);

impl AnomalyFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, channel: Channel, value: f64) {
        self.0.insert(channel, value);
    }

    pub fn contains(&self, channel: Channel) -> bool {
        self.0.contains_key(&channel)
    }

    pub fn get(&self, channel: Channel) -> Option<f64> {
        self.0.get(&channel).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn channels(&self) -> impl Iterator<Item = Channel> + '_ {
        self.0.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Channel, f64)> + '_ {
        self.0.iter().map(|(c, v)| (*c, *v))
    }
}

impl FromIterator<(Channel, f64)> for AnomalyFlags {
    fn from_iter<I: IntoIterator<Item = (Channel, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A recorded anomaly: the reading, what fired, and the operator advisory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyEvent {
    pub machine_id: MachineId,
    pub reading: Reading,
    pub flags: AnomalyFlags,
    pub recommendation: String,
}
