//! Per-rotation endpoints: signal a live workflow, ask who is on call, and
//! list the tenant's running workflows.

use std::collections::HashSet;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use oncall_core::{
    active_override, base_assignee, effective_assignee, next_transition, NextTransition, RotationSnapshot,
    UserId,
};
use oncall_scheduler::InstanceInfo;

use crate::auth::authenticate;
use crate::state::AppState;

use super::{error_response, ApiError, QueryErrorResponse};

/// Load a rotation the caller's tenant owns; anything else is a 404.
async fn tenant_rotation(state: &AppState, tenant_id: &str, id: &str) -> Result<RotationSnapshot, ApiError> {
    match state.rotations.get_rotation(id).await {
        Ok(Some(rotation)) if !rotation.deleted && rotation.tenant_id == tenant_id => Ok(rotation),
        Ok(_) => Err(error_response(StatusCode::NOT_FOUND, format!("rotation not found: {id}"))),
        Err(e) => {
            tracing::warn!(rotation_id = id, error = %e, "rotation lookup failed");
            Err(error_response(StatusCode::BAD_GATEWAY, e.to_string()))
        }
    }
}

// ── Signal ───────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct SignalResponse {
    pub rotation_id: String,
    pub signaled: bool,
}

#[utoipa::path(
    post,
    path = "/api/rotations/{id}/signal",
    tag = "Workflows",
    params(
        ("id" = String, Path, description = "Rotation id")
    ),
    responses(
        (status = 200, description = "Workflow woken for recomputation", body = Object),
        (status = 401, description = "Missing or unknown API key", body = QueryErrorResponse),
        (status = 404, description = "Rotation unknown or no workflow running", body = QueryErrorResponse)
    )
)]
pub async fn rotation_signal(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<SignalResponse>, ApiError> {
    let tenant_id = authenticate(&headers, &state.config.auth)?;
    tenant_rotation(&state, &tenant_id, &id).await?;

    if !state.engine.signal(&id) {
        return Err(error_response(
            StatusCode::NOT_FOUND,
            format!("no workflow running for rotation {id}"),
        ));
    }
    tracing::info!(rotation_id = %id, tenant_id = %tenant_id, "workflow signalled");
    Ok(Json(SignalResponse { rotation_id: id, signaled: true }))
}

// ── On-call query ────────────────────────────────────────────────

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct OnCallQuery {
    /// Instant to evaluate (RFC 3339); defaults to now.
    pub at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct OnCallResponse {
    pub rotation_id: String,
    pub name: String,
    pub at: DateTime<Utc>,
    pub assignee: Option<UserId>,
    /// Who the plain rotation order would put on call.
    pub base_assignee: Option<UserId>,
    pub override_id: Option<String>,
    pub next_transition: Option<NextTransition>,
}

/// Evaluate `rotation` at `at` into the response shape.
pub fn on_call_view(rotation: &RotationSnapshot, at: DateTime<Utc>) -> OnCallResponse {
    let override_id = if rotation.assignees.is_empty() {
        None
    } else {
        active_override(rotation, at).map(|o| o.id.clone())
    };
    OnCallResponse {
        rotation_id: rotation.rotation_id.clone(),
        name: rotation.name.clone(),
        at,
        assignee: effective_assignee(rotation, at),
        base_assignee: base_assignee(rotation, at).cloned(),
        override_id,
        next_transition: next_transition(rotation, at),
    }
}

#[utoipa::path(
    get,
    path = "/api/rotations/{id}/on-call",
    tag = "Rotations",
    params(
        ("id" = String, Path, description = "Rotation id"),
        OnCallQuery
    ),
    responses(
        (status = 200, description = "Effective assignee and next transition", body = Object),
        (status = 401, description = "Missing or unknown API key", body = QueryErrorResponse),
        (status = 404, description = "Rotation not found", body = QueryErrorResponse),
        (status = 422, description = "Rotation data is invalid", body = QueryErrorResponse)
    )
)]
pub async fn rotation_on_call(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(query): Query<OnCallQuery>,
) -> Result<Json<OnCallResponse>, ApiError> {
    let tenant_id = authenticate(&headers, &state.config.auth)?;
    let rotation = tenant_rotation(&state, &tenant_id, &id).await?;
    rotation
        .validate()
        .map_err(|e| error_response(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))?;

    let at = query.at.unwrap_or_else(Utc::now);
    Ok(Json(on_call_view(&rotation, at)))
}

// ── Running workflows ────────────────────────────────────────────

#[utoipa::path(
    get,
    path = "/api/workflows",
    tag = "Workflows",
    responses(
        (status = 200, description = "Running workflow instances of the caller's tenant", body = Object),
        (status = 401, description = "Missing or unknown API key", body = QueryErrorResponse),
        (status = 502, description = "Rotation list unavailable", body = QueryErrorResponse)
    )
)]
pub async fn workflows_list(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<InstanceInfo>>, ApiError> {
    let tenant_id = authenticate(&headers, &state.config.auth)?;
    let owned: HashSet<String> = state
        .rotations
        .list_rotation_ids(&tenant_id)
        .await
        .map_err(|e| error_response(StatusCode::BAD_GATEWAY, e.to_string()))?
        .into_iter()
        .collect();

    Ok(Json(
        state
            .engine
            .running()
            .into_iter()
            .filter(|i| owned.contains(&i.rotation_id))
            .collect(),
    ))
}
