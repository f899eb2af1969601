//! The per-rotation scheduling loop.
//!
//! Each round re-fetches the rotation, derives who is on call right now,
//! notifies if that differs from the last observation, then sleeps until
//! the next instant the answer can change. A signal cuts the sleep short.
//! The loop ends only when the rotation disappears or becomes unusable.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use oncall_core::{
    effective_assignee, next_transition, NextTransition, RotationId, RotationSnapshot, RotationStore,
    TransitionReason, UserId,
};
use oncall_notify::ChangeNotifier;

use crate::checkpoint::{CheckpointStore, WorkflowCheckpoint};
use crate::clock::Clock;
use crate::retry::RetryPolicy;

/// Longest single timer; longer waits are split so far-future boundaries
/// stay within what the runtime's timer wheel handles.
const MAX_SLEEP: Duration = Duration::from_secs(24 * 3600);

/// Everything a workflow instance talks to.
#[derive(Clone)]
pub struct WorkflowDeps {
    pub rotations: Arc<dyn RotationStore>,
    pub notifier: Arc<dyn ChangeNotifier>,
    pub checkpoints: Arc<dyn CheckpointStore>,
    pub clock: Arc<dyn Clock>,
    pub retry: RetryPolicy,
}

/// Why a workflow instance stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowExit {
    /// The rotation was deleted or no longer exists.
    Deleted,
    /// The rotation can't be scheduled (bad data or a permanent store error).
    Halted { reason: String },
}

/// Run the scheduling loop for one rotation until it terminates.
///
/// `resume` carries the checkpoint of a previous run of the same rotation.
/// Without one, the first observed assignee is recorded silently.
pub async fn run_rotation_workflow(
    rotation_id: RotationId,
    deps: WorkflowDeps,
    signal: Arc<Notify>,
    resume: Option<WorkflowCheckpoint>,
) -> WorkflowExit {
    let started_at = deps.clock.now();

    // `None` = nothing observed yet; `Some(None)` = observed "nobody".
    let mut last_seen: Option<Option<UserId>> = None;
    let mut reason = TransitionReason::ManualChange;

    if let Some(cp) = &resume {
        last_seen = Some(cp.last_assignee.clone());
        if cp.is_overdue(started_at) {
            reason = cp.next_reason.unwrap_or(TransitionReason::ManualChange);
        }
    }

    info!(rotation_id = %rotation_id, resumed = resume.is_some(), "rotation workflow started");

    loop {
        let snapshot = match fetch_snapshot(&rotation_id, &deps).await {
            Ok(s) => s,
            Err(exit) => {
                finish(&rotation_id, &deps, &exit).await;
                return exit;
            }
        };

        // Recompute against the real time, not the planned wake time.
        let now = deps.clock.now();
        let current = effective_assignee(&snapshot, now);

        match &last_seen {
            Some(previous) if *previous != current => {
                let outcome = deps
                    .notifier
                    .notify_on_change(&rotation_id, previous.as_deref(), current.as_deref(), reason)
                    .await;
                info!(
                    rotation_id = %rotation_id,
                    reason = %reason,
                    previous = previous.as_deref().unwrap_or("-"),
                    new = current.as_deref().unwrap_or("-"),
                    outcome = ?outcome,
                    "on-call assignee changed"
                );
            }
            Some(_) => {
                debug!(rotation_id = %rotation_id, reason = %reason, "assignee unchanged");
            }
            None => {
                info!(
                    rotation_id = %rotation_id,
                    assignee = current.as_deref().unwrap_or("-"),
                    "initial assignee recorded"
                );
            }
        }

        let next = next_transition(&snapshot, now);
        save_checkpoint(&rotation_id, &deps, current.clone(), next, now).await;
        last_seen = Some(current);

        if let Some(next) = next {
            debug!(rotation_id = %rotation_id, wake_at = %next.time, reason = %next.reason, "sleeping");
        } else {
            debug!(rotation_id = %rotation_id, "no upcoming transition, waiting for a signal");
        }
        reason = wait_for_wake(next, &signal, deps.clock.as_ref()).await;
    }
}

/// Fetch and validate, retrying transient store failures indefinitely.
async fn fetch_snapshot(rotation_id: &str, deps: &WorkflowDeps) -> Result<RotationSnapshot, WorkflowExit> {
    let mut attempt: u32 = 0;
    loop {
        match deps.rotations.get_rotation(rotation_id).await {
            Ok(Some(snapshot)) if !snapshot.deleted => {
                snapshot
                    .validate()
                    .map_err(|e| WorkflowExit::Halted { reason: e.to_string() })?;
                return Ok(snapshot);
            }
            Ok(_) => return Err(WorkflowExit::Deleted),
            Err(e) if e.is_transient() => {
                let delay = deps.retry.delay(attempt);
                warn!(
                    rotation_id,
                    attempt,
                    retry_in_ms = delay.as_millis() as u64,
                    error = %e,
                    "rotation fetch failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt = attempt.saturating_add(1);
            }
            Err(e) => return Err(WorkflowExit::Halted { reason: e.to_string() }),
        }
    }
}

/// Sleep until `next` (or forever without one); a signal wins with
/// `manual_change`. Signals sent while nobody waits are kept by `Notify`.
async fn wait_for_wake(next: Option<NextTransition>, signal: &Notify, clock: &dyn Clock) -> TransitionReason {
    let Some(next) = next else {
        signal.notified().await;
        return TransitionReason::ManualChange;
    };

    loop {
        let remaining = (next.time - clock.now()).to_std().unwrap_or(Duration::ZERO);
        if remaining.is_zero() {
            return next.reason;
        }
        tokio::select! {
            biased;
            _ = tokio::time::sleep(remaining.min(MAX_SLEEP)) => {}
            _ = signal.notified() => return TransitionReason::ManualChange,
        }
    }
}

async fn save_checkpoint(
    rotation_id: &str,
    deps: &WorkflowDeps,
    last_assignee: Option<UserId>,
    next: Option<NextTransition>,
    now: DateTime<Utc>,
) {
    let checkpoint = WorkflowCheckpoint {
        rotation_id: rotation_id.to_string(),
        last_assignee,
        next_wake_at: next.map(|n| n.time),
        next_reason: next.map(|n| n.reason),
        updated_at: now,
    };
    if let Err(e) = deps.checkpoints.save(&checkpoint).await {
        warn!(rotation_id, error = %e, "failed to persist workflow checkpoint");
    }
}

async fn finish(rotation_id: &str, deps: &WorkflowDeps, exit: &WorkflowExit) {
    match exit {
        WorkflowExit::Deleted => info!(rotation_id, "rotation deleted, workflow terminated"),
        WorkflowExit::Halted { reason } => {
            warn!(rotation_id, reason = %reason, "rotation cannot be scheduled, workflow halted")
        }
    }
    if let Err(e) = deps.checkpoints.remove(rotation_id).await {
        warn!(rotation_id, error = %e, "failed to remove workflow checkpoint");
    }
}
