//! Starts rotation workflows in bulk on behalf of one tenant.
//!
//! Every requested id is handled on its own: a missing rotation or a failed
//! start is recorded in the report and never aborts the rest of the batch.

use std::collections::HashSet;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{info, warn};

use oncall_core::{RotationId, RotationStore, StoreError};
use oncall_scheduler::WorkflowStarter;

/// What the caller asked to start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerSelection {
    Ids(Vec<RotationId>),
    /// Every live rotation of the tenant, resolved at call time.
    All,
}

impl TriggerSelection {
    /// Combine a single id, comma-separated lists and the `all` flag.
    ///
    /// `all` wins over explicit ids. Ids are trimmed, blanks dropped and
    /// duplicates removed keeping first-seen order.
    pub fn from_parts<'a>(
        id: Option<&'a str>,
        lists: impl IntoIterator<Item = &'a str>,
        all: bool,
    ) -> Result<Self, GatewayError> {
        if all {
            return Ok(Self::All);
        }

        let ids = dedup_in_order(
            id.into_iter()
                .chain(lists)
                .flat_map(|raw| raw.split(','))
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(str::to_string),
        );

        if ids.is_empty() {
            Err(GatewayError::EmptyRequest)
        } else {
            Ok(Self::Ids(ids))
        }
    }
}

/// Drop repeated ids, keeping the first occurrence.
fn dedup_in_order(ids: impl IntoIterator<Item = RotationId>) -> Vec<RotationId> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(id.clone())).collect()
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("no rotation ids requested: pass `id`, `ids` or `all=true`")]
    EmptyRequest,

    #[error("failed to list rotations for tenant {tenant}: {source}")]
    ListFailed { tenant: String, source: StoreError },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, utoipa::ToSchema)]
pub struct FailedStart {
    pub id: RotationId,
    pub error: String,
}

/// Per-batch outcome. `requested` counts the normalized ids; the buckets
/// keep request order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, utoipa::ToSchema)]
pub struct TriggerReport {
    pub requested: usize,
    pub started: Vec<RotationId>,
    pub missing: Vec<RotationId>,
    pub failed: Vec<FailedStart>,
}

enum IdOutcome {
    Started,
    Missing,
    Failed(String),
}

/// Resolve the selection, check each id belongs to `tenant_id`, and start
/// the ones that exist with up to `concurrency` starts in flight.
pub async fn trigger_workflows(
    selection: TriggerSelection,
    tenant_id: &str,
    rotations: &dyn RotationStore,
    starter: &dyn WorkflowStarter,
    concurrency: usize,
) -> Result<TriggerReport, GatewayError> {
    let requested = match selection {
        TriggerSelection::Ids(ids) => ids,
        TriggerSelection::All => dedup_in_order(
            rotations
                .list_rotation_ids(tenant_id)
                .await
                .map_err(|source| GatewayError::ListFailed {
                    tenant: tenant_id.to_string(),
                    source,
                })?,
        ),
    };

    let outcomes: Vec<IdOutcome> = stream::iter(requested.clone())
        .map(|id| async move { start_one(&id, tenant_id, rotations, starter).await })
        .buffered(concurrency.max(1))
        .collect()
        .await;

    let mut report = TriggerReport {
        requested: requested.len(),
        ..Default::default()
    };
    for (id, outcome) in requested.into_iter().zip(outcomes) {
        match outcome {
            IdOutcome::Started => report.started.push(id),
            IdOutcome::Missing => report.missing.push(id),
            IdOutcome::Failed(error) => report.failed.push(FailedStart { id, error }),
        }
    }

    info!(
        tenant_id,
        requested = report.requested,
        started = report.started.len(),
        missing = report.missing.len(),
        failed = report.failed.len(),
        "workflow trigger batch processed"
    );
    Ok(report)
}

async fn start_one(
    id: &str,
    tenant_id: &str,
    rotations: &dyn RotationStore,
    starter: &dyn WorkflowStarter,
) -> IdOutcome {
    match rotations.get_rotation(id).await {
        Ok(Some(rotation)) if !rotation.deleted && rotation.tenant_id == tenant_id => {}
        Ok(_) => return IdOutcome::Missing,
        Err(e) => {
            warn!(rotation_id = id, error = %e, "existence check failed");
            return IdOutcome::Failed(e.to_string());
        }
    }

    match starter.start(id).await {
        Ok(outcome) => {
            info!(rotation_id = id, ?outcome, "workflow start requested");
            IdOutcome::Started
        }
        Err(e) => {
            warn!(rotation_id = id, error = %e, "workflow start failed");
            IdOutcome::Failed(e.to_string())
        }
    }
}
