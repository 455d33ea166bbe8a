//! Shared monitoring handle
//!
//! `Monitor` owns the window store, the ledger, the latest-anomaly board and
//! the classifier. Workers, the API and the exporter each hold a clone; all
//! state sits behind one `Arc`.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

use super::PipelineError;
use crate::advisory;
use crate::config::MonitorConfig;
use crate::detection::AnomalyClassifier;
use crate::ledger::{Block, ChainVerdict, Ledger, LedgerPayload};
use crate::types::{AnomalyEvent, AnomalyFlags, MachineId, Reading};
use crate::window::WindowStore;

/// What one ingest cycle produced.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    Nominal,
    Anomalous {
        event: AnomalyEvent,
        /// Ledger index of the recorded event; `None` if the append failed
        block_index: Option<u64>,
    },
}

impl CycleOutcome {
    pub fn is_anomalous(&self) -> bool {
        matches!(self, CycleOutcome::Anomalous { .. })
    }
}

#[derive(Debug)]
struct MonitorInner {
    machine_ids: Vec<MachineId>,
    windows: WindowStore,
    ledger: Ledger,
    latest_anomalies: RwLock<HashMap<MachineId, AnomalyEvent>>,
    classifier: AnomalyClassifier,
}

/// Cloneable handle to all monitoring state.
#[derive(Debug, Clone)]
pub struct Monitor {
    inner: Arc<MonitorInner>,
}

impl Monitor {
    /// Build the monitor for the configured machine registry.
    pub fn new(config: &MonitorConfig) -> Self {
        let machine_ids = config.machine_ids();
        Self {
            inner: Arc::new(MonitorInner {
                windows: WindowStore::with_machines(
                    config.monitor.window_size,
                    machine_ids.iter().cloned(),
                ),
                ledger: Ledger::new(),
                latest_anomalies: RwLock::new(HashMap::new()),
                classifier: AnomalyClassifier::new(config.detection.clone()),
                machine_ids,
            }),
        }
    }

    /// Configured machine ids, sorted.
    pub fn machine_ids(&self) -> &[MachineId] {
        &self.inner.machine_ids
    }

    pub fn has_machine(&self, machine_id: &str) -> bool {
        self.inner.machine_ids.iter().any(|id| id == machine_id)
    }

    pub fn classifier(&self) -> &AnomalyClassifier {
        &self.inner.classifier
    }

    // ========================================================================
    // Read side
    // ========================================================================

    /// Copy of a machine's window, oldest first. `None` for unknown machines.
    pub fn get_window(&self, machine_id: &str) -> Option<Vec<Reading>> {
        if !self.has_machine(machine_id) {
            return None;
        }
        self.inner.windows.snapshot(machine_id)
    }

    /// Copy of the full chain.
    pub fn get_ledger(&self) -> Vec<Block> {
        self.inner.ledger.snapshot()
    }

    pub fn ledger_len(&self) -> usize {
        self.inner.ledger.len()
    }

    pub fn verify_ledger(&self) -> ChainVerdict {
        self.inner.ledger.verify()
    }

    /// Most recent anomaly recorded for a machine.
    pub fn get_latest_anomaly(&self, machine_id: &str) -> Option<AnomalyEvent> {
        let board = self.inner.latest_anomalies.read().unwrap_or_else(|e| {
            warn!("RwLock poisoned on latest anomaly read, recovering");
            e.into_inner()
        });
        board.get(machine_id).cloned()
    }

    // ========================================================================
    // Cycle steps
    // ========================================================================

    /// Push a reading and return the window snapshot that now includes it.
    ///
    /// Incomplete or non-finite readings are rejected and never reach the window.
    pub fn record_reading(
        &self,
        machine_id: &str,
        reading: Reading,
    ) -> Result<Vec<Reading>, PipelineError> {
        if !self.has_machine(machine_id) {
            return Err(PipelineError::UnknownMachine(machine_id.to_string()));
        }
        if let Err(defect) = reading.validate() {
            warn!(machine = %machine_id, %defect, "Rejecting reading");
            return Err(PipelineError::InvalidReading {
                machine: machine_id.to_string(),
                defect,
            });
        }
        self.inner.windows.push(machine_id, reading);
        Ok(self.inner.windows.snapshot(machine_id).unwrap_or_default())
    }

    /// Run the classifier over a fresh snapshot.
    pub fn score(&self, reading: &Reading, window: &[Reading]) -> AnomalyFlags {
        self.inner.classifier.classify(reading, window)
    }

    /// Build the event for non-empty flags, publish it and append it to the ledger.
    ///
    /// The latest-anomaly board is updated even when the append fails.
    pub fn record_anomaly(
        &self,
        machine_id: &str,
        reading: Reading,
        flags: AnomalyFlags,
    ) -> (AnomalyEvent, Result<Block, PipelineError>) {
        let event = AnomalyEvent {
            machine_id: machine_id.to_string(),
            recommendation: advisory::recommend(&flags),
            reading,
            flags,
        };

        {
            let mut board = self.inner.latest_anomalies.write().unwrap_or_else(|e| {
                warn!("RwLock poisoned on latest anomaly write, recovering");
                e.into_inner()
            });
            board.insert(machine_id.to_string(), event.clone());
        }

        let appended = self
            .inner
            .ledger
            .append(LedgerPayload::Anomaly(event.clone()))
            .map_err(PipelineError::from);
        (event, appended)
    }

    /// Full cycle for one externally supplied reading:
    /// push, snapshot, classify, advise, record.
    pub fn ingest(&self, machine_id: &str, reading: Reading) -> Result<CycleOutcome, PipelineError> {
        let window = self.record_reading(machine_id, reading.clone())?;
        let flags = self.score(&reading, &window);
        if flags.is_empty() {
            debug!(machine = %machine_id, window = window.len(), "Reading nominal");
            return Ok(CycleOutcome::Nominal);
        }

        let (event, appended) = self.record_anomaly(machine_id, reading, flags);
        let block = appended?;
        Ok(CycleOutcome::Anomalous {
            event,
            block_index: Some(block.index),
        })
    }
}
