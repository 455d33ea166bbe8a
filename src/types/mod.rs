//! Shared data structures for compressor telemetry monitoring
//!
//! - `Reading`: one timestamped sample of every channel for a machine
//! - `Channel`: the closed set of measured and derived channels
//! - `AnomalyFlags` / `AnomalyEvent`: classifier output recorded in the ledger

mod anomaly;
mod reading;

pub use anomaly::*;
pub use reading::*;
