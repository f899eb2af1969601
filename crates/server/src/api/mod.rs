//! HTTP endpoint modules.
//!
//! Shared error shape and helpers live here; each sub-module owns one
//! area of the surface.

mod doc;
mod health;
mod rotations;
mod trigger;

use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

// ── Shared types ─────────────────────────────────────────────────

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct QueryErrorResponse {
    pub error: String,
}

/// Error half of every handler's `Result`.
pub type ApiError = (StatusCode, Json<QueryErrorResponse>);

pub(crate) fn error_response(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(QueryErrorResponse { error: message.into() }))
}

// ── Re-exports ───────────────────────────────────────────────────

pub use doc::ApiDoc;
pub use health::health;
pub use rotations::{on_call_view, rotation_on_call, rotation_signal, workflows_list};
pub use trigger::{trigger_get, trigger_post};
