//! Monitor Configuration - machine baselines and detection tuning as TOML
//!
//! Every tunable that drives generation, scoring and recording is a field in
//! this module. Each struct implements `Default` with the built-in values from
//! [`super::defaults`], so a missing file still yields a runnable monitor.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::defaults;
use crate::types::Channel;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "AEROTWIN_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "monitor_config.toml";

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for a monitoring deployment.
///
/// Load with `MonitorConfig::load()` which searches:
/// 1. An explicit path (CLI `--config`)
/// 2. `$AEROTWIN_CONFIG` env var
/// 3. `./monitor_config.toml`
/// 4. Built-in defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Cadence, window size and RNG seed
    #[serde(default)]
    pub monitor: MonitorSettings,

    /// Robust scoring and surge floor thresholds
    #[serde(default)]
    pub detection: DetectionConfig,

    /// Derived-channel constants
    #[serde(default)]
    pub physics: PhysicsConfig,

    /// Read-only HTTP API
    #[serde(default)]
    pub server: ServerConfig,

    /// Periodic CSV export
    #[serde(default)]
    pub export: ExportConfig,

    /// Per-machine Gaussian baselines: `{machine_id: {channel: {mean, stddev}}}`
    #[serde(default = "default_machines")]
    pub machines: BTreeMap<String, MachineBaseline>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            monitor: MonitorSettings::default(),
            detection: DetectionConfig::default(),
            physics: PhysicsConfig::default(),
            server: ServerConfig::default(),
            export: ExportConfig::default(),
            machines: default_machines(),
        }
    }
}

fn default_machines() -> BTreeMap<String, MachineBaseline> {
    defaults::DEFAULT_MACHINE_IDS
        .iter()
        .map(|id| (id.to_string(), MachineBaseline::default_compressor()))
        .collect()
}

impl MonitorConfig {
    /// Load configuration using the standard search order.
    ///
    /// A file that exists but fails to parse or validate is a fatal startup
    /// error; only the absence of any file falls back to defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        // 1. Explicit path
        if let Some(path) = explicit {
            let config = Self::load_from_file(path)?;
            info!(path = %path.display(), machines = config.machines.len(), "Loaded monitor config");
            return Ok(config);
        }

        // 2. Env var
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                let config = Self::load_from_file(&p)?;
                info!(path = %p.display(), machines = config.machines.len(), "Loaded monitor config from {}", CONFIG_ENV_VAR);
                return Ok(config);
            }
            warn!(path = %path, "{} points to non-existent file, falling back", CONFIG_ENV_VAR);
        }

        // 3. ./monitor_config.toml
        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            let config = Self::load_from_file(&local)?;
            info!(machines = config.machines.len(), "Loaded monitor config from ./{}", LOCAL_CONFIG_FILE);
            return Ok(config);
        }

        // 4. Defaults
        info!("No {} found, using built-in defaults", LOCAL_CONFIG_FILE);
        let config = Self::default();
        config.validate()?;
        Ok(config)
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::parse(&contents, path)
    }

    /// Parse and validate an in-memory TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Self::parse(contents, Path::new("<inline>"))
    }

    fn parse(contents: &str, origin: &Path) -> Result<Self, ConfigError> {
        // Two-pass: check for unknown keys first (warnings only)
        for w in super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }

        let config: Self = toml::from_str(contents)
            .map_err(|e| ConfigError::Parse(origin.to_path_buf(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Configured machine ids, sorted.
    pub fn machine_ids(&self) -> Vec<String> {
        self.machines.keys().cloned().collect()
    }

    pub fn cadence(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.monitor.cadence_secs)
    }

    /// Validate every section for internal consistency.
    ///
    /// Rules:
    /// - Cadence and window size must be > 0
    /// - Window must be able to hold the scoring minimum
    /// - Thresholds and the surge ratio must be finite and positive
    /// - Every machine must define every measured channel, and nothing else
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        let m = &self.monitor;
        if m.cadence_secs == 0 {
            errors.push("monitor.cadence_secs must be > 0".to_string());
        }
        if m.window_size == 0 {
            errors.push("monitor.window_size must be > 0".to_string());
        }

        let d = &self.detection;
        if d.min_window_for_scoring == 0 {
            errors.push("detection.min_window_for_scoring must be > 0".to_string());
        }
        if m.window_size < d.min_window_for_scoring {
            errors.push(format!(
                "monitor.window_size ({}) must be >= detection.min_window_for_scoring ({})",
                m.window_size, d.min_window_for_scoring
            ));
        }
        if !d.robust_z_threshold.is_finite() || d.robust_z_threshold <= 0.0 {
            errors.push(format!(
                "detection.robust_z_threshold must be finite and > 0 (got {})",
                d.robust_z_threshold
            ));
        }
        if !d.surge_margin_floor_percent.is_finite() {
            errors.push(format!(
                "detection.surge_margin_floor_percent must be finite (got {})",
                d.surge_margin_floor_percent
            ));
        }
        if d.flag_precision_decimals > 10 {
            errors.push(format!(
                "detection.flag_precision_decimals ({}) must be <= 10",
                d.flag_precision_decimals
            ));
        }

        let p = &self.physics;
        if !p.surge_pressure_ratio.is_finite() || p.surge_pressure_ratio <= 0.0 {
            errors.push(format!(
                "physics.surge_pressure_ratio must be finite and > 0 (got {})",
                p.surge_pressure_ratio
            ));
        }

        if self.export.interval_secs == 0 {
            errors.push("export.interval_secs must be > 0".to_string());
        }

        if self.machines.is_empty() {
            errors.push("at least one [machines.<id>] table is required".to_string());
        }
        for (machine_id, baseline) in &self.machines {
            baseline.check(machine_id, &mut errors);
        }

        // Range checks that depend on the physical meaning of values
        let (range_errors, range_warnings) = super::validation::validate_physical_ranges(self);
        errors.extend(range_errors);
        for w in &range_warnings {
            warn!("{}", w);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

// ============================================================================
// Sections
// ============================================================================

/// Worker scheduling and window sizing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    /// Seconds between generation cycles
    pub cadence_secs: u64,
    /// Readings kept per machine
    pub window_size: usize,
    /// Base RNG seed; each worker offsets it by its machine ordinal
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            cadence_secs: defaults::CADENCE_SECS,
            window_size: defaults::WINDOW_SIZE,
            seed: None,
        }
    }
}

/// Anomaly classifier thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// |robust z| strictly above this flags a measured channel
    pub robust_z_threshold: f64,
    /// Readings required in the window before scoring
    pub min_window_for_scoring: usize,
    /// Surge margin (%) below which the reading is always flagged
    pub surge_margin_floor_percent: f64,
    /// Decimal places kept in flag values
    pub flag_precision_decimals: u32,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            robust_z_threshold: defaults::ROBUST_Z_THRESHOLD,
            min_window_for_scoring: defaults::MIN_WINDOW_FOR_SCORING,
            surge_margin_floor_percent: defaults::SURGE_MARGIN_FLOOR_PERCENT,
            flag_precision_decimals: defaults::FLAG_PRECISION_DECIMALS,
        }
    }
}

/// Constants for derived channels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// Pressure ratio at the surge line
    pub surge_pressure_ratio: f64,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            surge_pressure_ratio: defaults::SURGE_PRESSURE_RATIO,
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub enabled: bool,
    pub addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            addr: defaults::SERVER_ADDR.to_string(),
        }
    }
}

/// Periodic CSV export of window statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Output file; export is disabled when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub csv_path: Option<PathBuf>,
    pub interval_secs: u64,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            csv_path: None,
            interval_secs: defaults::EXPORT_INTERVAL_SECS,
        }
    }
}

// ============================================================================
// Machine Baselines
// ============================================================================

/// Gaussian baseline for one channel
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelBaseline {
    pub mean: f64,
    pub stddev: f64,
}

impl ChannelBaseline {
    pub const fn new(mean: f64, stddev: f64) -> Self {
        Self { mean, stddev }
    }
}

impl From<(f64, f64)> for ChannelBaseline {
    fn from((mean, stddev): (f64, f64)) -> Self {
        Self { mean, stddev }
    }
}

/// Channel baselines for one machine, keyed by wire channel name.
///
/// Keys stay strings at the serde layer so that an unknown channel produces a
/// validation error naming the machine, rather than an opaque parse error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MachineBaseline {
    channels: BTreeMap<String, ChannelBaseline>,
}

impl MachineBaseline {
    /// TFE731-class compressor baseline.
    pub fn default_compressor() -> Self {
        let mut baseline = Self::default();
        baseline.insert(Channel::InletTemperature, defaults::INLET_TEMPERATURE.into());
        baseline.insert(Channel::OutletTemperature, defaults::OUTLET_TEMPERATURE.into());
        baseline.insert(Channel::RotorSpeed, defaults::ROTOR_SPEED.into());
        baseline.insert(Channel::Vibration, defaults::VIBRATION.into());
        baseline.insert(Channel::PressureRatio, defaults::PRESSURE_RATIO.into());
        baseline
    }

    pub fn insert(&mut self, channel: Channel, baseline: ChannelBaseline) {
        self.channels.insert(channel.name().to_string(), baseline);
    }

    pub fn get(&self, channel: Channel) -> Option<ChannelBaseline> {
        self.channels.get(channel.name()).copied()
    }

    /// Baselines for every measured channel present, in canonical order.
    pub fn measured(&self) -> Vec<(Channel, ChannelBaseline)> {
        Channel::MEASURED
            .iter()
            .filter_map(|c| self.get(*c).map(|b| (*c, b)))
            .collect()
    }

    pub fn raw_channels(&self) -> impl Iterator<Item = (&str, &ChannelBaseline)> {
        self.channels.iter().map(|(k, v)| (k.as_str(), v))
    }

    fn check(&self, machine_id: &str, errors: &mut Vec<String>) {
        for (name, baseline) in &self.channels {
            match name.parse::<Channel>() {
                Err(_) => errors.push(format!(
                    "machines.{machine_id}: unknown channel '{name}'"
                )),
                Ok(channel) if channel.is_derived() => errors.push(format!(
                    "machines.{machine_id}.{name}: derived channel cannot have a baseline"
                )),
                Ok(_) => {}
            }
            if !baseline.mean.is_finite() || !baseline.stddev.is_finite() {
                errors.push(format!(
                    "machines.{machine_id}.{name}: mean and stddev must be finite (got mean={}, stddev={})",
                    baseline.mean, baseline.stddev
                ));
            } else if baseline.stddev < 0.0 {
                errors.push(format!(
                    "machines.{machine_id}.{name}: stddev ({}) cannot be negative",
                    baseline.stddev
                ));
            }
        }
        for channel in Channel::MEASURED {
            if self.get(channel).is_none() {
                errors.push(format!(
                    "machines.{machine_id}: missing baseline for channel '{channel}'"
                ));
            }
        }
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(PathBuf, toml::de::Error),
    Serialize(toml::ser::Error),
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(path, e) => write!(f, "Config I/O error ({}): {}", path.display(), e),
            ConfigError::Parse(path, e) => {
                write!(f, "Config parse error ({}): {}", path.display(), e)
            }
            ConfigError::Serialize(e) => write!(f, "Config serialization error: {}", e),
            ConfigError::Validation(errors) => {
                writeln!(f, "Config validation failed:")?;
                for e in errors {
                    writeln!(f, "  - {}", e)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}
