//! Telemetry reading types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Machine identifier as configured in `[machines.<id>]`.
pub type MachineId = String;

/// A named telemetry channel on a compressor.
///
/// Declaration order is the canonical channel order: it drives `BTreeMap`
/// iteration, JSON field order in ledger payloads and CSV column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Channel {
    /// Inlet temperature (°C)
    #[serde(rename = "T_in")]
    InletTemperature,
    /// Outlet temperature (°C)
    #[serde(rename = "T_out")]
    OutletTemperature,
    /// Rotor speed (rpm)
    #[serde(rename = "RPM")]
    RotorSpeed,
    /// Vibration velocity (mm/s)
    Vibration,
    /// Outlet / inlet pressure ratio
    PressureRatio,
    /// Derived: distance from the surge line (%)
    SurgeMargin,
}

impl Channel {
    /// Channels drawn from a baseline distribution and scored statistically.
    pub const MEASURED: [Channel; 5] = [
        Channel::InletTemperature,
        Channel::OutletTemperature,
        Channel::RotorSpeed,
        Channel::Vibration,
        Channel::PressureRatio,
    ];

    /// Channels computed from measured channels at generation time.
    pub const DERIVED: [Channel; 1] = [Channel::SurgeMargin];

    /// Every channel, in canonical order.
    pub const ALL: [Channel; 6] = [
        Channel::InletTemperature,
        Channel::OutletTemperature,
        Channel::RotorSpeed,
        Channel::Vibration,
        Channel::PressureRatio,
        Channel::SurgeMargin,
    ];

    /// Wire name used in config, JSON and CSV.
    pub fn name(&self) -> &'static str {
        match self {
            Channel::InletTemperature => "T_in",
            Channel::OutletTemperature => "T_out",
            Channel::RotorSpeed => "RPM",
            Channel::Vibration => "Vibration",
            Channel::PressureRatio => "PressureRatio",
            Channel::SurgeMargin => "SurgeMargin",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            Channel::InletTemperature | Channel::OutletTemperature => "°C",
            Channel::RotorSpeed => "rpm",
            Channel::Vibration => "mm/s",
            Channel::PressureRatio => "",
            Channel::SurgeMargin => "%",
        }
    }

    pub fn is_derived(&self) -> bool {
        Self::DERIVED.contains(self)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Error returned when parsing an unknown channel name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownChannel(pub String);

impl fmt::Display for UnknownChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown channel '{}'", self.0)
    }
}

impl std::error::Error for UnknownChannel {}

impl FromStr for Channel {
    type Err = UnknownChannel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Channel::ALL
            .iter()
            .copied()
            .find(|c| c.name() == s)
            .ok_or_else(|| UnknownChannel(s.to_string()))
    }
}

/// Surge margin in percent for a given operating pressure ratio.
///
/// `(PR - PR_surge) / PR * 100`, or 0 when the pressure ratio is zero.
pub fn surge_margin_percent(pressure_ratio: f64, surge_pressure_ratio: f64) -> f64 {
    if pressure_ratio == 0.0 {
        return 0.0;
    }
    (pressure_ratio - surge_pressure_ratio) / pressure_ratio * 100.0
}

/// One timestamped sample of every channel for a single machine.
///
/// Values are stored at full precision; rounding only happens when a value is
/// copied into [`AnomalyFlags`](super::AnomalyFlags).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub timestamp: DateTime<Utc>,
    pub values: BTreeMap<Channel, f64>,
}

impl Reading {
    pub fn new(timestamp: DateTime<Utc>, values: BTreeMap<Channel, f64>) -> Self {
        Self { timestamp, values }
    }

    /// Build a reading from measured channels, computing the derived channels.
    pub fn from_measurements(
        timestamp: DateTime<Utc>,
        measured: BTreeMap<Channel, f64>,
        surge_pressure_ratio: f64,
    ) -> Self {
        let mut values = measured;
        let pressure_ratio = values.get(&Channel::PressureRatio).copied().unwrap_or(0.0);
        values.insert(
            Channel::SurgeMargin,
            surge_margin_percent(pressure_ratio, surge_pressure_ratio),
        );
        Self { timestamp, values }
    }

    pub fn value(&self, channel: Channel) -> Option<f64> {
        self.values.get(&channel).copied()
    }

    /// Every measured channel present and every stored value finite.
    pub fn validate(&self) -> Result<(), ReadingDefect> {
        if let Some(channel) = Channel::MEASURED
            .iter()
            .find(|c| !self.values.contains_key(*c))
        {
            return Err(ReadingDefect::MissingChannel(*channel));
        }
        match self.values.iter().find(|(_, v)| !v.is_finite()) {
            Some((channel, value)) => Err(ReadingDefect::NonFinite {
                channel: *channel,
                value: *value,
            }),
            None => Ok(()),
        }
    }
}

/// Why a reading cannot be scored or recorded.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReadingDefect {
    #[error("missing channel {0}")]
    MissingChannel(Channel),
    #[error("channel {channel} is not finite ({value})")]
    NonFinite { channel: Channel, value: f64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_names_round_trip_through_from_str() {
        for channel in Channel::ALL {
            assert_eq!(channel.name().parse::<Channel>().unwrap(), channel);
        }
        assert!("T_mid".parse::<Channel>().is_err());
    }

    #[test]
    fn test_channel_serde_uses_wire_names() {
        let json = serde_json::to_string(&Channel::RotorSpeed).unwrap();
        assert_eq!(json, "\"RPM\"");
        let parsed: Channel = serde_json::from_str("\"T_out\"").unwrap();
        assert_eq!(parsed, Channel::OutletTemperature);
    }

    #[test]
    fn test_surge_margin_formula() {
        // PR 12, surge at 10 -> (12 - 10) / 12 * 100 = 16.67%
        assert!((surge_margin_percent(12.0, 10.0) - 16.666_666).abs() < 1e-3);
        assert_eq!(surge_margin_percent(0.0, 10.0), 0.0);
        assert!(surge_margin_percent(9.0, 10.0) < 0.0);
    }

    #[test]
    fn test_from_measurements_adds_surge_margin() {
        let measured = BTreeMap::from([(Channel::PressureRatio, 11.0)]);
        let reading = Reading::from_measurements(Utc::now(), measured, 10.0);
        let margin = reading.value(Channel::SurgeMargin).unwrap();
        assert!((margin - 9.0909).abs() < 1e-3);
    }

    fn complete(pressure_ratio: f64) -> Reading {
        let measured = Channel::MEASURED
            .iter()
            .map(|c| (*c, 1.0))
            .chain([(Channel::PressureRatio, pressure_ratio)])
            .collect();
        Reading::from_measurements(Utc::now(), measured, 10.0)
    }

    #[test]
    fn test_validate_accepts_complete_reading() {
        assert_eq!(complete(12.0).validate(), Ok(()));
    }

    #[test]
    fn test_validate_names_missing_channel() {
        let mut reading = complete(12.0);
        reading.values.remove(&Channel::Vibration);
        assert_eq!(
            reading.validate(),
            Err(ReadingDefect::MissingChannel(Channel::Vibration))
        );
    }

    #[test]
    fn test_validate_rejects_non_finite_values() {
        // NaN pressure ratio also poisons the derived surge margin
        let err = complete(f64::NAN).validate().unwrap_err();
        assert!(matches!(
            err,
            ReadingDefect::NonFinite { channel: Channel::PressureRatio, .. }
        ));

        let mut reading = complete(12.0);
        reading.values.insert(Channel::RotorSpeed, f64::INFINITY);
        assert!(matches!(
            reading.validate(),
            Err(ReadingDefect::NonFinite { channel: Channel::RotorSpeed, .. })
        ));
    }

    #[test]
    fn test_only_surge_margin_is_derived() {
        assert!(Channel::SurgeMargin.is_derived());
        assert!(Channel::MEASURED.iter().all(|c| !c.is_derived()));
    }
}
