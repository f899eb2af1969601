//! Assignment calculator: who is on call at an instant, and when that can
//! next change.
//!
//! Everything here is pure. Callers hand in a snapshot and a timestamp and
//! always re-derive the effective assignee on both sides of a transition;
//! the transition reason is informational only.

use chrono::{DateTime, TimeDelta, Utc};

use crate::rotation::{NextTransition, Override, RotationSnapshot, TransitionReason, UserId};

/// Whole milliseconds from `from` to `to`, rounded toward negative infinity.
fn elapsed_ms_floor(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    let delta = to - from;
    let ms = delta.num_milliseconds();
    // num_milliseconds truncates toward zero; pull negative sub-ms remainders down.
    if delta < TimeDelta::milliseconds(ms) {
        ms - 1
    } else {
        ms
    }
}

/// Floor-divided shift index of `at` relative to the anchor. `None` when the
/// shift length is not positive.
fn shift_index(snapshot: &RotationSnapshot, at: DateTime<Utc>) -> Option<i64> {
    if snapshot.shift_length_ms <= 0 {
        return None;
    }
    Some(elapsed_ms_floor(snapshot.anchor_at, at).div_euclid(snapshot.shift_length_ms))
}

/// Start instant of shift `index`, or `None` when it falls outside the
/// representable timestamp range.
fn shift_start(snapshot: &RotationSnapshot, index: i64) -> Option<DateTime<Utc>> {
    let offset_ms = index.checked_mul(snapshot.shift_length_ms)?;
    let offset = TimeDelta::try_milliseconds(offset_ms)?;
    snapshot.anchor_at.checked_add_signed(offset)
}

/// The assignee the plain rotation order puts on call at `at`, ignoring
/// overrides.
pub fn base_assignee(snapshot: &RotationSnapshot, at: DateTime<Utc>) -> Option<&UserId> {
    let n = snapshot.assignees.len() as i64;
    if n == 0 {
        return None;
    }
    let index = shift_index(snapshot, at)?;
    let position = index.rem_euclid(n) as u32;
    snapshot.assignee_at(position).map(|a| &a.id)
}

/// The override in force at `at`. Where several overlap, the most recently
/// created one wins; equal creation times fall back to the greater id.
pub fn active_override(snapshot: &RotationSnapshot, at: DateTime<Utc>) -> Option<&Override> {
    snapshot
        .overrides
        .iter()
        .filter(|o| o.covers(at))
        .max_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)))
}

/// Who is effectively on call at `at`.
///
/// A rotation without base assignees has nobody on call, even when an
/// override covers `at`.
pub fn effective_assignee(snapshot: &RotationSnapshot, at: DateTime<Utc>) -> Option<UserId> {
    if snapshot.assignees.is_empty() {
        return None;
    }
    if let Some(ovr) = active_override(snapshot, at) {
        return Some(ovr.assignee_id.clone());
    }
    base_assignee(snapshot, at).cloned()
}

/// Earliest instant strictly after `now` at which the effective assignee
/// might change. `None` when nothing can ever change.
pub fn next_transition(snapshot: &RotationSnapshot, now: DateTime<Utc>) -> Option<NextTransition> {
    let mut candidates: Vec<NextTransition> = Vec::with_capacity(1 + snapshot.overrides.len() * 2);

    if !snapshot.assignees.is_empty() {
        // The floor index puts `now` inside shift `index`, so the next shift
        // starts strictly later even when `now` sits exactly on a boundary.
        let next_shift = shift_index(snapshot, now)
            .and_then(|index| index.checked_add(1))
            .and_then(|index| shift_start(snapshot, index));
        if let Some(time) = next_shift {
            candidates.push(NextTransition { time, reason: TransitionReason::ShiftChange });
        }
    }

    for ovr in &snapshot.overrides {
        if ovr.start_at > now {
            candidates.push(NextTransition { time: ovr.start_at, reason: TransitionReason::OverrideStart });
        }
        if ovr.end_at > now {
            candidates.push(NextTransition { time: ovr.end_at, reason: TransitionReason::OverrideEnd });
        }
    }

    candidates
        .into_iter()
        .filter(|c| c.time > now)
        .min_by(|a, b| a.time.cmp(&b.time).then_with(|| a.reason.priority().cmp(&b.reason.priority())))
}
