//! Read-only handlers over the shared `Monitor`.
//!
//! Handlers return [`ApiResult`]: an [`Envelope`] on success, an
//! [`ApiError`] otherwise.

use axum::extract::{Path, State};
use serde::Serialize;

use super::envelope::{ApiError, ApiResult, Envelope};
use crate::ledger::{Block, ChainVerdict};
use crate::pipeline::Monitor;
use crate::types::{AnomalyEvent, Reading};

/// State shared by every handler.
#[derive(Clone)]
pub struct DashboardState {
    pub monitor: Monitor,
}

impl DashboardState {
    pub fn new(monitor: Monitor) -> Self {
        Self { monitor }
    }
}

// ============================================================================
// Response types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub machines: usize,
    pub ledger_length: usize,
}

#[derive(Debug, Serialize)]
pub struct WindowResponse {
    pub machine_id: String,
    pub len: usize,
    pub readings: Vec<Reading>,
}

#[derive(Debug, Serialize)]
pub struct AnomalyResponse {
    pub machine_id: String,
    pub anomaly: Option<AnomalyEvent>,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/v1/health
pub async fn health(State(state): State<DashboardState>) -> ApiResult<HealthResponse> {
    let monitor = &state.monitor;
    Ok(Envelope::new(
        HealthResponse {
            status: "ok",
            machines: monitor.machine_ids().len(),
            ledger_length: monitor.ledger_len(),
        },
        monitor,
    ))
}

/// GET /api/v1/machines
pub async fn machines(State(state): State<DashboardState>) -> ApiResult<Vec<String>> {
    Ok(Envelope::new(state.monitor.machine_ids().to_vec(), &state.monitor))
}

/// GET /api/v1/machines/:id/window
pub async fn machine_window(
    State(state): State<DashboardState>,
    Path(machine_id): Path<String>,
) -> ApiResult<WindowResponse> {
    let readings = state
        .monitor
        .get_window(&machine_id)
        .ok_or_else(|| ApiError::UnknownMachine(machine_id.clone()))?;
    Ok(Envelope::new(
        WindowResponse {
            len: readings.len(),
            machine_id,
            readings,
        },
        &state.monitor,
    ))
}

/// GET /api/v1/machines/:id/anomaly
pub async fn machine_anomaly(
    State(state): State<DashboardState>,
    Path(machine_id): Path<String>,
) -> ApiResult<AnomalyResponse> {
    if !state.monitor.has_machine(&machine_id) {
        return Err(ApiError::UnknownMachine(machine_id));
    }
    let anomaly = state.monitor.get_latest_anomaly(&machine_id);
    Ok(Envelope::new(
        AnomalyResponse {
            machine_id,
            anomaly,
        },
        &state.monitor,
    ))
}

/// GET /api/v1/ledger
pub async fn ledger(State(state): State<DashboardState>) -> ApiResult<Vec<Block>> {
    Ok(Envelope::new(state.monitor.get_ledger(), &state.monitor))
}

/// GET /api/v1/ledger/verify
pub async fn ledger_verify(State(state): State<DashboardState>) -> ApiResult<ChainVerdict> {
    // Hashing the whole chain is CPU-bound
    let monitor = state.monitor.clone();
    let verdict = tokio::task::spawn_blocking(move || monitor.verify_ledger())
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Ledger verification task failed");
            ApiError::Internal("Ledger verification failed")
        })?;
    Ok(Envelope::new(verdict, &state.monitor))
}
