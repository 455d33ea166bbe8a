//! v1 API route table.

use axum::routing::get;
use axum::Router;

use super::handlers::{self, DashboardState};

/// Build the v1 API router.
pub fn api_routes(state: DashboardState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        // Machines
        .route("/machines", get(handlers::machines))
        .route("/machines/:id/window", get(handlers::machine_window))
        .route("/machines/:id/anomaly", get(handlers::machine_anomaly))
        // Ledger
        .route("/ledger", get(handlers::ledger))
        .route("/ledger/verify", get(handlers::ledger_verify))
        .with_state(state)
}
