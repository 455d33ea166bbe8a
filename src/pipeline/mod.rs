//! Monitoring pipeline: the shared `Monitor` handle and per-machine workers
//!
//! ```text
//! TelemetryGenerator -> WindowStore -> AnomalyClassifier -> advisory -> Ledger
//!        (worker)          (push)          (score)          (flag)     (record)
//! ```

mod monitor;
mod worker;

pub use monitor::{CycleOutcome, Monitor};
pub use worker::{MachineWorker, WorkerPhase, WorkerStats};

use crate::config::MonitorConfig;
use crate::ledger::LedgerError;
use crate::simulation::{SimulationError, TelemetryGenerator};
use crate::types::ReadingDefect;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("unknown machine '{0}'")]
    UnknownMachine(String),
    #[error("invalid reading for '{machine}': {defect}")]
    InvalidReading {
        machine: String,
        #[source]
        defect: ReadingDefect,
    },
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// One worker per configured machine, in machine id order.
///
/// With a configured seed each worker draws from `seed + ordinal`.
pub fn build_workers(
    config: &MonitorConfig,
    monitor: &Monitor,
) -> Result<Vec<MachineWorker>, SimulationError> {
    config
        .machines
        .iter()
        .enumerate()
        .map(|(ordinal, (machine_id, baseline))| {
            let seed = config
                .monitor
                .seed
                .map(|s| s.wrapping_add(ordinal as u64));
            let generator = TelemetryGenerator::new(
                machine_id.clone(),
                baseline,
                config.physics.surge_pressure_ratio,
                seed,
            )?;
            Ok(MachineWorker::new(generator, monitor.clone(), config.cadence()))
        })
        .collect()
}
