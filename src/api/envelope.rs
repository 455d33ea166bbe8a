//! JSON envelope for the v1 API.
//!
//! Success bodies are `{ "data": ..., "meta": ... }`, failures are
//! `{ "error": { "code", "message" }, "meta": ... }`. Successful responses
//! also report the monitor's size in `meta`, so a client polling any
//! endpoint can tell when the ledger has grown.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::pipeline::Monitor;

pub const API_VERSION: &str = "1";

/// Metadata attached to every body.
#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub api_version: &'static str,
    pub generated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub machines: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ledger_length: Option<usize>,
}

impl ResponseMeta {
    /// Bare metadata, used where no monitor is in reach.
    pub fn now() -> Self {
        Self {
            api_version: API_VERSION,
            generated_at: Utc::now(),
            machines: None,
            ledger_length: None,
        }
    }

    pub fn for_monitor(monitor: &Monitor) -> Self {
        Self {
            machines: Some(monitor.machine_ids().len()),
            ledger_length: Some(monitor.ledger_len()),
            ..Self::now()
        }
    }
}

/// Successful body.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

impl<T: Serialize> Envelope<T> {
    pub fn new(data: T, monitor: &Monitor) -> Self {
        Self {
            data,
            meta: ResponseMeta::for_monitor(monitor),
        }
    }
}

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Every failure the API can report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Path names a machine outside the configured registry
    UnknownMachine(String),
    /// No route matches the request path
    NoRoute(String),
    /// Background task failed; details stay in the log
    Internal(&'static str),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::UnknownMachine(_) | ApiError::NoRoute(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::UnknownMachine(_) => "UNKNOWN_MACHINE",
            ApiError::NoRoute(_) => "NOT_FOUND",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn message(&self) -> String {
        match self {
            ApiError::UnknownMachine(id) => format!("No machine with id '{id}'"),
            ApiError::NoRoute(path) => format!("No route for {path}"),
            ApiError::Internal(what) => (*what).to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: ErrorDetail,
    meta: ResponseMeta,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code(),
                message: self.message(),
            },
            meta: ResponseMeta::now(),
        };
        (self.status(), Json(body)).into_response()
    }
}

/// Handler result: an enveloped payload or an [`ApiError`].
pub type ApiResult<T> = Result<Envelope<T>, ApiError>;
