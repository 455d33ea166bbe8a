//! Periodic CSV export of window statistics
//!
//! Appends one row per machine with the window size plus the mean and
//! population standard deviation of every measured channel. The output is
//! meant as a retraining dataset, so rows only ever get appended and the
//! header is written once, when the file is created.

use chrono::{DateTime, Utc};
use statrs::statistics::Statistics;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::pipeline::Monitor;
use crate::types::{Channel, Reading};

/// Aggregate of one machine's current window.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowSummary {
    pub machine_id: String,
    pub timestamp: DateTime<Utc>,
    pub samples: usize,
    /// `(channel, mean, population std dev)` in canonical channel order
    pub channels: Vec<(Channel, f64, f64)>,
}

impl WindowSummary {
    /// Summarize a window. `None` when the window is empty.
    pub fn from_window(
        machine_id: &str,
        timestamp: DateTime<Utc>,
        window: &[Reading],
    ) -> Option<Self> {
        if window.is_empty() {
            return None;
        }
        let channels = Channel::MEASURED
            .iter()
            .map(|channel| {
                let values: Vec<f64> = window.iter().filter_map(|r| r.value(*channel)).collect();
                if values.is_empty() {
                    (*channel, f64::NAN, f64::NAN)
                } else {
                    (*channel, values.iter().mean(), values.iter().population_std_dev())
                }
            })
            .collect();
        Some(Self {
            machine_id: machine_id.to_string(),
            timestamp,
            samples: window.len(),
            channels,
        })
    }

    pub fn to_csv_row(&self) -> String {
        let mut fields = vec![
            self.timestamp.to_rfc3339(),
            csv_field(&self.machine_id),
            self.samples.to_string(),
        ];
        for (_, mean, std_dev) in &self.channels {
            fields.push(format_stat(*mean));
            fields.push(format_stat(*std_dev));
        }
        fields.join(",")
    }
}

/// RFC 4180 quoting for free-text fields.
fn csv_field(raw: &str) -> String {
    if raw.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw.to_string()
    }
}

fn format_stat(value: f64) -> String {
    if value.is_finite() {
        format!("{value:.4}")
    } else {
        String::new()
    }
}

/// Column header matching [`WindowSummary::to_csv_row`].
pub fn csv_header() -> String {
    let mut columns = vec![
        "timestamp".to_string(),
        "machine_id".to_string(),
        "samples".to_string(),
    ];
    for channel in Channel::MEASURED {
        columns.push(format!("{}_mean", channel.name()));
        columns.push(format!("{}_std", channel.name()));
    }
    columns.join(",")
}

/// Append rows to `path`, writing the header first if the file is new or empty.
pub fn append_rows(path: &Path, summaries: &[WindowSummary]) -> io::Result<usize> {
    let is_new = std::fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    if is_new {
        writeln!(file, "{}", csv_header())?;
    }
    for summary in summaries {
        writeln!(file, "{}", summary.to_csv_row())?;
    }
    file.flush()?;
    Ok(summaries.len())
}

/// Background task that snapshots every window and appends to a CSV file.
#[derive(Debug, Clone)]
pub struct CsvExporter {
    monitor: Monitor,
    path: PathBuf,
    interval: Duration,
}

impl CsvExporter {
    pub fn new(monitor: Monitor, path: PathBuf, interval: Duration) -> Self {
        Self {
            monitor,
            path,
            interval,
        }
    }

    /// Export all non-empty windows once. Returns rows written.
    pub fn export_once(&self) -> io::Result<usize> {
        let now = Utc::now();
        let summaries: Vec<WindowSummary> = self
            .monitor
            .machine_ids()
            .iter()
            .filter_map(|id| {
                let window = self.monitor.get_window(id)?;
                WindowSummary::from_window(id, now, &window)
            })
            .collect();

        if summaries.is_empty() {
            debug!("No readings yet, skipping export");
            return Ok(0);
        }
        append_rows(&self.path, &summaries)
    }

    /// Export every interval until cancelled. Returns total rows written.
    pub async fn run(self, cancel: CancellationToken) -> u64 {
        info!(path = %self.path.display(), interval = ?self.interval, "CSV exporter starting");

        let start = tokio::time::Instant::now() + self.interval;
        let mut interval = tokio::time::interval_at(start, self.interval);
        let mut rows_written = 0u64;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    // File I/O stays off the async workers
                    let exporter = self.clone();
                    match tokio::task::spawn_blocking(move || exporter.export_once()).await {
                        Ok(Ok(rows)) => {
                            rows_written += rows as u64;
                            debug!(rows, path = %self.path.display(), "Exported window statistics");
                        }
                        Ok(Err(e)) => {
                            warn!(path = %self.path.display(), error = %e, "CSV export failed");
                        }
                        Err(e) => {
                            error!(error = %e, "CSV export task failed");
                        }
                    }
                }
            }
        }

        info!(rows = rows_written, "CSV exporter stopped");
        rows_written
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MonitorConfig;
    use chrono::TimeZone;
    use std::collections::BTreeMap;

    fn reading(seq: i64, t_in: f64) -> Reading {
        Reading::from_measurements(
            Utc.timestamp_opt(1_700_000_000 + seq, 0).unwrap(),
            BTreeMap::from([
                (Channel::InletTemperature, t_in),
                (Channel::OutletTemperature, 400.0),
                (Channel::RotorSpeed, 20_000.0),
                (Channel::Vibration, 0.3),
                (Channel::PressureRatio, 12.0),
            ]),
            10.0,
        )
    }

    #[test]
    fn test_summary_uses_population_std_dev() {
        let window = vec![reading(0, 20.0), reading(1, 30.0)];
        let summary = WindowSummary::from_window("m1", Utc::now(), &window).unwrap();
        assert_eq!(summary.samples, 2);
        let (channel, mean, std_dev) = summary.channels[0];
        assert_eq!(channel, Channel::InletTemperature);
        assert!((mean - 25.0).abs() < 1e-9);
        assert!((std_dev - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_window_has_no_summary() {
        assert!(WindowSummary::from_window("m1", Utc::now(), &[]).is_none());
    }

    #[test]
    fn test_header_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.csv");
        let summary = WindowSummary::from_window("m1", Utc::now(), &[reading(0, 25.0)]).unwrap();

        append_rows(&path, std::slice::from_ref(&summary)).unwrap();
        append_rows(&path, std::slice::from_ref(&summary)).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], csv_header());
        assert!(lines[0].starts_with("timestamp,machine_id,samples,T_in_mean,T_in_std"));
        assert_eq!(lines[1].split(',').count(), lines[0].split(',').count());
    }

    #[test]
    fn test_export_once_skips_empty_windows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.csv");
        let monitor = Monitor::new(&MonitorConfig::default());
        let exporter = CsvExporter::new(monitor.clone(), path.clone(), Duration::from_secs(30));

        assert_eq!(exporter.export_once().unwrap(), 0);
        assert!(!path.exists());

        monitor.ingest("compressor-3", reading(0, 25.0)).unwrap();
        assert_eq!(exporter.export_once().unwrap(), 1);
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains(",compressor-3,1,25.0000,0.0000,"));
    }

    #[test]
    fn test_machine_id_with_separator_is_quoted() {
        let summary =
            WindowSummary::from_window("bay 2, \"east\"", Utc::now(), &[reading(0, 25.0)]).unwrap();
        let row = summary.to_csv_row();
        assert!(row.contains(",\"bay 2, \"\"east\"\"\",1,"), "{row}");

        let plain = WindowSummary::from_window("compressor-1", Utc::now(), &[reading(0, 25.0)])
            .unwrap()
            .to_csv_row();
        assert!(plain.contains(",compressor-1,1,"));
    }

    #[tokio::test]
    async fn test_run_exports_until_cancelled() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.csv");
        let monitor = Monitor::new(&MonitorConfig::default());
        monitor.ingest("compressor-1", reading(0, 25.0)).unwrap();

        let exporter = CsvExporter::new(monitor, path.clone(), Duration::from_millis(10));
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(exporter.run(cancel.clone()));

        tokio::time::sleep(Duration::from_millis(60)).await;
        cancel.cancel();
        let rows = handle.await.unwrap();

        assert!(rows >= 1);
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count() as u64, rows + 1);
    }

    #[test]
    fn test_unwritable_path_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("stats.csv");
        let summary = WindowSummary::from_window("m1", Utc::now(), &[reading(0, 25.0)]).unwrap();
        assert!(append_rows(&path, &[summary]).is_err());
    }
}
