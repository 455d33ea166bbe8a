//! AeroTwin: compressor telemetry monitoring
//!
//! Robust anomaly detection over rolling telemetry windows, with every
//! anomaly recorded in a tamper-evident hash chain.
//!
//! ## Architecture
//!
//! - **Window Store**: bounded per-machine reading history
//! - **Statistics / Detection**: median/MAD robust z-scores plus a surge floor
//! - **Advisory**: template recommendations per flagged channel
//! - **Ledger**: SHA-256 hash chain of anomaly events
//! - **Pipeline**: the shared `Monitor` handle and one worker per machine

pub mod advisory;
pub mod api;
pub mod config;
pub mod detection;
pub mod export;
pub mod ledger;
pub mod pipeline;
pub mod simulation;
pub mod statistics;
pub mod types;
pub mod window;

// Re-export configuration
pub use config::{ConfigError, MonitorConfig};

// Re-export commonly used types
pub use types::{AnomalyEvent, AnomalyFlags, Channel, MachineId, Reading};

// Re-export the core components
pub use detection::AnomalyClassifier;
pub use ledger::{Block, ChainFault, ChainVerdict, Ledger, LedgerError, LedgerPayload};
pub use pipeline::{CycleOutcome, MachineWorker, Monitor, PipelineError, WorkerPhase, WorkerStats};
pub use simulation::{SimulationError, TelemetryGenerator};
pub use window::WindowStore;
