//! Per-machine generation loop
//!
//! One `MachineWorker` per configured machine. Each tick runs a complete,
//! await-free cycle (generate, score, flag/record or no-flag), so cancellation
//! is only ever observed between cycles and never leaves a half-recorded
//! anomaly behind.

use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use super::monitor::{CycleOutcome, Monitor};
use super::PipelineError;
use crate::simulation::TelemetryGenerator;
use crate::types::MachineId;

/// Where a worker is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerPhase {
    Idle,
    Generate,
    Score,
    Flag,
    Record,
    NoFlag,
    Sleep,
    Stopped,
}

/// Counters reported when a worker stops.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub machine_id: MachineId,
    pub cycles: u64,
    pub anomalies: u64,
    pub append_failures: u64,
}

pub struct MachineWorker {
    generator: TelemetryGenerator,
    monitor: Monitor,
    cadence: Duration,
    phase: WorkerPhase,
    stats: WorkerStats,
}

impl MachineWorker {
    pub fn new(generator: TelemetryGenerator, monitor: Monitor, cadence: Duration) -> Self {
        let stats = WorkerStats {
            machine_id: generator.machine_id().to_string(),
            ..WorkerStats::default()
        };
        Self {
            generator,
            monitor,
            cadence,
            phase: WorkerPhase::Idle,
            stats,
        }
    }

    pub fn machine_id(&self) -> &str {
        &self.stats.machine_id
    }

    pub fn phase(&self) -> WorkerPhase {
        self.phase
    }

    pub fn stats(&self) -> &WorkerStats {
        &self.stats
    }

    fn set_phase(&mut self, phase: WorkerPhase) {
        trace!(machine = %self.stats.machine_id, from = ?self.phase, to = ?phase, "Worker phase");
        self.phase = phase;
    }

    /// One generate/score/record cycle. Contains no await points.
    ///
    /// Ledger append failures are logged and counted; the cycle still
    /// reports the anomaly.
    pub fn run_cycle(&mut self) -> Result<CycleOutcome, PipelineError> {
        self.set_phase(WorkerPhase::Generate);
        let reading = self.generator.next_reading();

        self.set_phase(WorkerPhase::Score);
        let machine_id = self.stats.machine_id.clone();
        let window = self.monitor.record_reading(&machine_id, reading.clone())?;
        let flags = self.monitor.score(&reading, &window);
        self.stats.cycles += 1;

        if flags.is_empty() {
            self.set_phase(WorkerPhase::NoFlag);
            debug!(machine = %machine_id, window = window.len(), "Reading nominal");
            return Ok(CycleOutcome::Nominal);
        }

        self.set_phase(WorkerPhase::Flag);
        self.stats.anomalies += 1;
        let channels: Vec<&str> = flags.channels().map(|c| c.name()).collect();
        warn!(machine = %machine_id, flags = ?channels, "Anomaly detected");

        self.set_phase(WorkerPhase::Record);
        let (event, appended) = self.monitor.record_anomaly(&machine_id, reading, flags);
        let block_index = match appended {
            Ok(block) => {
                info!(machine = %machine_id, block = block.index, "Anomaly recorded in ledger");
                Some(block.index)
            }
            Err(e) => {
                self.stats.append_failures += 1;
                error!(machine = %machine_id, error = %e, "Failed to append anomaly to ledger");
                None
            }
        };

        Ok(CycleOutcome::Anomalous { event, block_index })
    }

    /// Run cycles at the configured cadence until `cancel` fires.
    ///
    /// The first cycle runs immediately.
    pub async fn run(mut self, cancel: CancellationToken) -> WorkerStats {
        info!(machine = %self.stats.machine_id, cadence = ?self.cadence, "Worker starting");

        let mut interval = tokio::time::interval(self.cadence);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    break;
                }
                _ = interval.tick() => {
                    if let Err(e) = self.run_cycle() {
                        error!(machine = %self.stats.machine_id, error = %e, "Cycle failed");
                    }
                    self.set_phase(WorkerPhase::Sleep);
                }
            }
        }

        self.set_phase(WorkerPhase::Stopped);
        info!(
            machine = %self.stats.machine_id,
            cycles = self.stats.cycles,
            anomalies = self.stats.anomalies,
            "Worker stopped"
        );
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChannelBaseline, MachineBaseline, MonitorConfig};
    use crate::types::Channel;

    fn worker_with(baseline: MachineBaseline, config: &MonitorConfig) -> MachineWorker {
        let monitor = Monitor::new(config);
        let generator = TelemetryGenerator::new("compressor-1", &baseline, 10.0, Some(11)).unwrap();
        MachineWorker::new(generator, monitor, Duration::from_millis(10))
    }

    #[test]
    fn test_nominal_cycle_ends_in_no_flag() {
        // Constant baseline: MAD 0 and margin 16.7%, nothing can fire
        let mut baseline = MachineBaseline::default();
        for channel in Channel::MEASURED {
            let mean = MachineBaseline::default_compressor().get(channel).unwrap().mean;
            baseline.insert(channel, ChannelBaseline::new(mean, 0.0));
        }
        let mut worker = worker_with(baseline, &MonitorConfig::default());
        for _ in 0..10 {
            assert_eq!(worker.run_cycle().unwrap(), CycleOutcome::Nominal);
            assert_eq!(worker.phase(), WorkerPhase::NoFlag);
        }
        assert_eq!(worker.stats().cycles, 10);
        assert_eq!(worker.stats().anomalies, 0);
    }

    #[test]
    fn test_anomalous_cycle_records_block() {
        // Mean PR 10.5 with no spread: margin 4.76% every cycle
        let mut baseline = MachineBaseline::default_compressor();
        baseline.insert(Channel::PressureRatio, ChannelBaseline::new(10.5, 0.0));
        let config = MonitorConfig::default();
        let mut worker = worker_with(baseline, &config);

        let outcome = worker.run_cycle().unwrap();
        assert_eq!(worker.phase(), WorkerPhase::Record);
        let CycleOutcome::Anomalous { event, block_index } = outcome else {
            panic!("expected anomaly");
        };
        assert_eq!(block_index, Some(1));
        assert_eq!(event.flags.get(Channel::SurgeMargin), Some(4.76));
        assert_eq!(worker.stats().anomalies, 1);
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel_and_reports_stats() {
        let worker = worker_with(MachineBaseline::default_compressor(), &MonitorConfig::default());
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(worker.run(cancel.clone()));

        tokio::time::sleep(Duration::from_millis(60)).await;
        cancel.cancel();
        let stats = handle.await.unwrap();

        assert_eq!(stats.machine_id, "compressor-1");
        assert!(stats.cycles >= 1);
        assert_eq!(stats.append_failures, 0);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_runs_no_cycle() {
        let worker = worker_with(MachineBaseline::default_compressor(), &MonitorConfig::default());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let stats = worker.run(cancel).await;
        assert_eq!(stats.cycles, 0);
    }
}
