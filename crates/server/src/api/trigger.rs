//! Trigger endpoints: start rotation workflows by id, id list, or all.
//!
//! Partial failure is still a 200; the body says which ids started, which
//! were missing and which failed.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;

use crate::auth::authenticate;
use crate::gateway::{trigger_workflows, GatewayError, TriggerReport, TriggerSelection};
use crate::state::AppState;

use super::{error_response, ApiError, QueryErrorResponse};

#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TriggerQuery {
    /// A single rotation id.
    pub id: Option<String>,
    /// Comma-separated rotation ids.
    pub ids: Option<String>,
    /// Start every rotation of the caller's tenant.
    pub all: Option<bool>,
}

/// Either `"a,b"` or `["a", "b"]`.
#[derive(Debug, Deserialize, utoipa::ToSchema)]
#[serde(untagged)]
pub enum IdList {
    Csv(String),
    List(Vec<String>),
}

#[derive(Debug, Default, Deserialize, utoipa::ToSchema)]
pub struct TriggerBody {
    pub id: Option<String>,
    pub ids: Option<IdList>,
    pub all: Option<bool>,
}

impl TriggerBody {
    fn selection(&self) -> Result<TriggerSelection, GatewayError> {
        let lists: Vec<&str> = match &self.ids {
            Some(IdList::Csv(csv)) => vec![csv.as_str()],
            Some(IdList::List(ids)) => ids.iter().map(String::as_str).collect(),
            None => Vec::new(),
        };
        TriggerSelection::from_parts(self.id.as_deref(), lists, self.all.unwrap_or(false))
    }
}

fn gateway_error(e: GatewayError) -> ApiError {
    match e {
        GatewayError::EmptyRequest => error_response(StatusCode::BAD_REQUEST, e.to_string()),
        GatewayError::ListFailed { .. } => {
            tracing::warn!(error = %e, "trigger: could not resolve rotation list");
            error_response(StatusCode::BAD_GATEWAY, e.to_string())
        }
    }
}

async fn run(
    state: &AppState,
    tenant_id: &str,
    selection: Result<TriggerSelection, GatewayError>,
) -> Result<Json<TriggerReport>, ApiError> {
    let selection = selection.map_err(gateway_error)?;
    trigger_workflows(
        selection,
        tenant_id,
        state.rotations.as_ref(),
        state.engine.as_ref(),
        state.config.scheduler.trigger_concurrency,
    )
    .await
    .map(Json)
    .map_err(gateway_error)
}

#[utoipa::path(
    get,
    path = "/api/rotations/trigger",
    tag = "Workflows",
    params(TriggerQuery),
    responses(
        (status = 200, description = "Batch processed (possibly with missing or failed ids)", body = TriggerReport),
        (status = 400, description = "No ids requested", body = QueryErrorResponse),
        (status = 401, description = "Missing or unknown API key", body = QueryErrorResponse),
        (status = 502, description = "Rotation list unavailable", body = QueryErrorResponse)
    )
)]
pub async fn trigger_get(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<TriggerQuery>,
) -> Result<Json<TriggerReport>, ApiError> {
    let tenant_id = authenticate(&headers, &state.config.auth)?;
    let selection = TriggerSelection::from_parts(
        query.id.as_deref(),
        query.ids.as_deref(),
        query.all.unwrap_or(false),
    );
    run(&state, &tenant_id, selection).await
}

#[utoipa::path(
    post,
    path = "/api/rotations/trigger",
    tag = "Workflows",
    request_body = TriggerBody,
    responses(
        (status = 200, description = "Batch processed (possibly with missing or failed ids)", body = TriggerReport),
        (status = 400, description = "No ids requested", body = QueryErrorResponse),
        (status = 401, description = "Missing or unknown API key", body = QueryErrorResponse),
        (status = 502, description = "Rotation list unavailable", body = QueryErrorResponse)
    )
)]
pub async fn trigger_post(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<TriggerBody>,
) -> Result<Json<TriggerReport>, ApiError> {
    let tenant_id = authenticate(&headers, &state.config.auth)?;
    run(&state, &tenant_id, body.selection()).await
}
