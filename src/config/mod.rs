//! Monitor Configuration Module
//!
//! Per-deployment configuration loaded from TOML: machine baselines,
//! detection thresholds, cadence and the optional API / export surfaces.
//!
//! ## Loading Order
//!
//! 1. `--config <path>` on the command line
//! 2. `AEROTWIN_CONFIG` environment variable (path to TOML file)
//! 3. `monitor_config.toml` in the current working directory
//! 4. Built-in defaults (three TFE731-class compressors)
//!
//! The loaded config is passed by value into the monitor at construction;
//! there is no process-wide config singleton.
//!
//! ```ignore
//! let config = MonitorConfig::load(None)?;
//! let monitor = Monitor::new(&config);
//! ```

mod monitor_config;
pub mod defaults;
pub mod validation;

pub use monitor_config::*;
