//! AeroTwin - compressor digital twin monitor
//!
//! Generates telemetry for every configured compressor, scores each reading
//! with robust statistics and records anomalies in a hash-chained ledger.
//!
//! # Usage
//!
//! ```bash
//! # Built-in defaults (three compressors, 5 s cadence, API on :8080)
//! cargo run --release
//!
//! # Custom config, reproducible run, CSV export
//! ./aerotwin --config monitor_config.toml --seed 42 --export-csv stats.csv
//! ```
//!
//! # Environment Variables
//!
//! - `AEROTWIN_CONFIG`: Path to the monitor TOML config
//! - `AEROTWIN_CORS_ORIGINS`: Extra allowed CORS origins for the API
//! - `RUST_LOG`: Logging level (default: info)

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use aerotwin::api::{create_app, DashboardState};
use aerotwin::config::MonitorConfig;
use aerotwin::export::CsvExporter;
use aerotwin::ledger::ChainVerdict;
use aerotwin::pipeline::{build_workers, Monitor, WorkerStats};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "aerotwin")]
#[command(about = "AeroTwin compressor telemetry monitor")]
#[command(version)]
struct CliArgs {
    /// Path to the monitor TOML config (overrides AEROTWIN_CONFIG)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Override the API server address (default: "0.0.0.0:8080")
    #[arg(short, long)]
    addr: Option<String>,

    /// Override seconds between generation cycles
    #[arg(long)]
    cadence_secs: Option<u64>,

    /// Seed the generators for a reproducible run
    #[arg(long)]
    seed: Option<u64>,

    /// Do not start the HTTP API
    #[arg(long)]
    no_server: bool,

    /// Append window statistics to this CSV file
    #[arg(long, value_name = "PATH")]
    export_csv: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

impl CliArgs {
    /// Fold command-line overrides into the loaded config.
    fn apply(&self, config: &mut MonitorConfig) {
        if let Some(ref addr) = self.addr {
            config.server.addr = addr.clone();
        }
        if let Some(cadence) = self.cadence_secs {
            config.monitor.cadence_secs = cadence;
        }
        if let Some(seed) = self.seed {
            config.monitor.seed = Some(seed);
        }
        if self.no_server {
            config.server.enabled = false;
        }
        if let Some(ref path) = self.export_csv {
            config.export.csv_path = Some(path.clone());
        }
    }
}

// ============================================================================
// Task Names for Supervisor Logging
// ============================================================================

#[derive(Debug, Clone)]
enum TaskName {
    HttpServer,
    Worker(WorkerStats),
    CsvExporter,
}

impl std::fmt::Display for TaskName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskName::HttpServer => write!(f, "HttpServer"),
            TaskName::Worker(stats) => write!(f, "Worker[{}]", stats.machine_id),
            TaskName::CsvExporter => write!(f, "CsvExporter"),
        }
    }
}

// ============================================================================
// Task Spawning
// ============================================================================

/// Spawn the HTTP server task into the JoinSet.
fn spawn_http_server(
    task_set: &mut JoinSet<Result<TaskName>>,
    listener: tokio::net::TcpListener,
    monitor: Monitor,
    cancel_token: CancellationToken,
) {
    let app = create_app(DashboardState::new(monitor));
    task_set.spawn(async move {
        info!("[HttpServer] Task starting");

        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                cancel_token.cancelled().await;
                info!("[HttpServer] Received shutdown signal");
            })
            .await;

        match result {
            Ok(()) => {
                info!("[HttpServer] Graceful shutdown complete");
                Ok(TaskName::HttpServer)
            }
            Err(e) => {
                error!("[HttpServer] Server error: {}", e);
                Err(anyhow::anyhow!("HTTP server error: {}", e))
            }
        }
    });
}

/// Bind the API listener, or `None` when the server is disabled.
async fn bind_api(config: &MonitorConfig) -> Result<Option<tokio::net::TcpListener>> {
    if !config.server.enabled {
        info!("API server disabled");
        return Ok(None);
    }
    let listener = tokio::net::TcpListener::bind(&config.server.addr)
        .await
        .with_context(|| format!("Failed to bind API server to {}", config.server.addr))?;
    info!("API listening on http://{}/api/v1", config.server.addr);
    Ok(Some(listener))
}

/// Spawn the periodic CSV exporter.
fn spawn_exporter(
    task_set: &mut JoinSet<Result<TaskName>>,
    exporter: CsvExporter,
    cancel_token: CancellationToken,
) {
    task_set.spawn(async move {
        exporter.run(cancel_token).await;
        Ok(TaskName::CsvExporter)
    });
}

// ============================================================================
// Supervisor
// ============================================================================

fn log_task_completion(task: &TaskName) {
    match task {
        TaskName::Worker(stats) => info!(
            machine = %stats.machine_id,
            cycles = stats.cycles,
            anomalies = stats.anomalies,
            append_failures = stats.append_failures,
            "Supervisor: worker finished"
        ),
        other => info!("Supervisor: Task {} completed normally", other),
    }
}

/// Run the supervisor loop: monitor tasks, cancel on failure.
///
/// On shutdown every remaining task is joined, so each worker finishes the
/// cycle it is in before the process exits.
async fn run_supervisor(
    task_set: &mut JoinSet<Result<TaskName>>,
    cancel_token: CancellationToken,
) -> Result<()> {
    info!("Supervisor: {} tasks spawned, monitoring...", task_set.len());

    let mut failure: Option<anyhow::Error> = None;
    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                info!("Supervisor: Shutdown signal received");
                break;
            }
            result = task_set.join_next() => {
                match result {
                    Some(Ok(Ok(task))) => log_task_completion(&task),
                    Some(Ok(Err(e))) => {
                        error!("Supervisor: Task failed with error: {}", e);
                        cancel_token.cancel();
                        failure = Some(e);
                        break;
                    }
                    Some(Err(e)) => {
                        error!("Supervisor: Task panicked: {}", e);
                        cancel_token.cancel();
                        failure = Some(anyhow::anyhow!("Task panicked: {}", e));
                        break;
                    }
                    None => {
                        info!("Supervisor: All tasks completed");
                        break;
                    }
                }
            }
        }
    }

    while let Some(result) = task_set.join_next().await {
        match result {
            Ok(Ok(task)) => log_task_completion(&task),
            Ok(Err(e)) => warn!("Supervisor: Task failed during shutdown: {}", e),
            Err(e) => warn!("Supervisor: Task panicked during shutdown: {}", e),
        }
    }

    match failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_tracing(args.log_json);

    let mut config =
        MonitorConfig::load(args.config.as_deref()).context("Failed to load monitor config")?;
    args.apply(&mut config);
    config
        .validate()
        .context("Invalid configuration after command-line overrides")?;

    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("  AeroTwin - Compressor Telemetry Monitor");
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!(
        machines = ?config.machine_ids(),
        cadence_secs = config.monitor.cadence_secs,
        window = config.monitor.window_size,
        threshold = config.detection.robust_z_threshold,
        "Monitor configured"
    );
    if let Some(seed) = config.monitor.seed {
        info!(seed, "Deterministic generation enabled");
    }

    // Graceful shutdown via Ctrl+C
    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received Ctrl+C, initiating shutdown...");
        shutdown_token.cancel();
    });

    let monitor = Monitor::new(&config);
    let workers = build_workers(&config, &monitor).context("Failed to build telemetry generators")?;

    // Bind before any worker exists so a bind failure aborts nothing
    let listener = bind_api(&config).await?;

    let mut task_set: JoinSet<Result<TaskName>> = JoinSet::new();

    for worker in workers {
        let token = cancel_token.clone();
        task_set.spawn(async move { Ok(TaskName::Worker(worker.run(token).await)) });
    }

    if let Some(listener) = listener {
        spawn_http_server(&mut task_set, listener, monitor.clone(), cancel_token.clone());
    }

    if let Some(ref path) = config.export.csv_path {
        let exporter = CsvExporter::new(
            monitor.clone(),
            path.clone(),
            Duration::from_secs(config.export.interval_secs),
        );
        spawn_exporter(&mut task_set, exporter, cancel_token.clone());
    }

    let supervised = run_supervisor(&mut task_set, cancel_token).await;

    match monitor.verify_ledger() {
        ChainVerdict::Valid { length } => {
            info!(blocks = length, "Final ledger verification: valid");
        }
        ChainVerdict::Invalid { index, fault } => {
            error!(block = index, fault = %fault, "Final ledger verification: INVALID");
        }
    }

    supervised?;
    info!("AeroTwin shutdown complete");
    Ok(())
}
