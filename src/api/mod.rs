//! REST API module using Axum
//!
//! Read-only view of the monitor under `/api/v1`: machine windows, latest
//! anomalies, the ledger and its verification verdict. Nothing here can
//! mutate monitoring state.

pub mod envelope;
pub mod handlers;
mod routes;

pub use handlers::DashboardState;

use axum::http::{header, Method, Uri};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use envelope::ApiError;

/// Env var listing extra allowed CORS origins, comma-separated.
pub const CORS_ORIGINS_ENV_VAR: &str = "AEROTWIN_CORS_ORIGINS";

async fn not_found(uri: Uri) -> ApiError {
    ApiError::NoRoute(uri.path().to_string())
}

/// Same-origin only unless `AEROTWIN_CORS_ORIGINS` is set.
fn build_cors_layer() -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET])
        .allow_headers([header::CONTENT_TYPE]);
    match std::env::var(CORS_ORIGINS_ENV_VAR) {
        Ok(origins) => {
            let allowed: Vec<_> = origins
                .split(',')
                .filter_map(|o| o.trim().parse().ok())
                .collect();
            tracing::info!(origins = %origins, "CORS: allowing configured origins");
            cors.allow_origin(allowed)
        }
        Err(_) => cors,
    }
}

/// Create the complete application router.
pub fn create_app(state: DashboardState) -> Router {
    Router::new()
        .nest("/api/v1", routes::api_routes(state))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer())
}
