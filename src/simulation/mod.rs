//! Telemetry Generator - Gaussian draws around each machine's baseline
//!
//! Stands in for the real sensor feed. Every measured channel is sampled
//! independently from `Normal(mean, stddev)`; derived channels are computed
//! from the sampled values.

use chrono::{DateTime, Utc};
use rand::prelude::*;
use rand_distr::{Distribution, Normal};
use std::collections::BTreeMap;

use crate::config::MachineBaseline;
use crate::types::{Channel, MachineId, Reading};

#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    #[error("machine {machine}: invalid distribution for {channel} (mean={mean}, stddev={stddev}): {source}")]
    InvalidDistribution {
        machine: MachineId,
        channel: Channel,
        mean: f64,
        stddev: f64,
        #[source]
        source: rand_distr::NormalError,
    },
    #[error("machine {0}: baseline has no measured channels")]
    EmptyBaseline(MachineId),
}

/// Per-machine reading source.
#[derive(Debug)]
pub struct TelemetryGenerator {
    machine_id: MachineId,
    channels: Vec<(Channel, Normal<f64>)>,
    surge_pressure_ratio: f64,
    rng: StdRng,
}

impl TelemetryGenerator {
    /// Build a generator. `seed` makes the sequence reproducible.
    pub fn new(
        machine_id: impl Into<MachineId>,
        baseline: &MachineBaseline,
        surge_pressure_ratio: f64,
        seed: Option<u64>,
    ) -> Result<Self, SimulationError> {
        let machine_id = machine_id.into();

        let channels = baseline
            .measured()
            .into_iter()
            .map(|(channel, b)| {
                Normal::new(b.mean, b.stddev)
                    .map(|dist| (channel, dist))
                    .map_err(|source| SimulationError::InvalidDistribution {
                        machine: machine_id.clone(),
                        channel,
                        mean: b.mean,
                        stddev: b.stddev,
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        if channels.is_empty() {
            return Err(SimulationError::EmptyBaseline(machine_id));
        }

        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            machine_id,
            channels,
            surge_pressure_ratio,
            rng,
        })
    }

    pub fn machine_id(&self) -> &str {
        &self.machine_id
    }

    /// Draw a reading stamped with the current time.
    pub fn next_reading(&mut self) -> Reading {
        self.next_reading_at(Utc::now())
    }

    /// Draw a reading with an explicit timestamp.
    pub fn next_reading_at(&mut self, timestamp: DateTime<Utc>) -> Reading {
        let measured: BTreeMap<Channel, f64> = self
            .channels
            .iter()
            .map(|(channel, dist)| (*channel, dist.sample(&mut self.rng)))
            .collect();
        Reading::from_measurements(timestamp, measured, self.surge_pressure_ratio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChannelBaseline;

    #[test]
    fn test_reading_has_every_channel() {
        let mut gen =
            TelemetryGenerator::new("c1", &MachineBaseline::default_compressor(), 10.0, Some(7))
                .unwrap();
        let reading = gen.next_reading();
        for channel in Channel::ALL {
            assert!(reading.value(channel).is_some(), "missing {channel}");
        }
    }

    #[test]
    fn test_surge_margin_is_derived_from_pressure_ratio() {
        let mut gen =
            TelemetryGenerator::new("c1", &MachineBaseline::default_compressor(), 10.0, Some(1))
                .unwrap();
        for _ in 0..20 {
            let r = gen.next_reading();
            let pr = r.value(Channel::PressureRatio).unwrap();
            let margin = r.value(Channel::SurgeMargin).unwrap();
            assert!((margin - (pr - 10.0) / pr * 100.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let baseline = MachineBaseline::default_compressor();
        let mut a = TelemetryGenerator::new("c1", &baseline, 10.0, Some(42)).unwrap();
        let mut b = TelemetryGenerator::new("c1", &baseline, 10.0, Some(42)).unwrap();
        let ts = Utc::now();
        for _ in 0..5 {
            assert_eq!(a.next_reading_at(ts), b.next_reading_at(ts));
        }
    }

    #[test]
    fn test_zero_stddev_yields_constant_channel() {
        let mut baseline = MachineBaseline::default_compressor();
        baseline.insert(Channel::Vibration, ChannelBaseline::new(0.3, 0.0));
        let mut gen = TelemetryGenerator::new("c1", &baseline, 10.0, Some(3)).unwrap();
        for _ in 0..5 {
            assert_eq!(gen.next_reading().value(Channel::Vibration), Some(0.3));
        }
    }

    #[test]
    fn test_invalid_stddev_is_rejected() {
        let mut baseline = MachineBaseline::default_compressor();
        baseline.insert(Channel::RotorSpeed, ChannelBaseline::new(20_000.0, -1.0));
        let err = TelemetryGenerator::new("c9", &baseline, 10.0, None).unwrap_err();
        assert!(err.to_string().contains("c9"));
        assert!(err.to_string().contains("RPM"));
    }

    #[test]
    fn test_empty_baseline_is_rejected() {
        let err = TelemetryGenerator::new("c1", &MachineBaseline::default(), 10.0, None).unwrap_err();
        assert!(matches!(err, SimulationError::EmptyBaseline(_)));
    }
}
