use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::InvalidState;

pub type RotationId = String;
pub type TenantId = String;
pub type UserId = String;

/// One base-rotation member and its slot in the rotation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignee {
    pub id: UserId,
    pub position: u32,
}

/// A manually scheduled interval `[start_at, end_at)` that supersedes the
/// base assignee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Override {
    pub id: String,
    pub assignee_id: UserId,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Override {
    /// Whether `at` falls inside the half-open interval.
    pub fn covers(&self, at: DateTime<Utc>) -> bool {
        self.start_at <= at && at < self.end_at
    }
}

/// Immutable view of one rotation, fetched fresh for every evaluation round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationSnapshot {
    pub rotation_id: RotationId,
    pub tenant_id: TenantId,
    pub name: String,
    pub anchor_at: DateTime<Utc>,
    pub shift_length_ms: i64,
    #[serde(default)]
    pub assignees: Vec<Assignee>,
    #[serde(default)]
    pub overrides: Vec<Override>,
    #[serde(default)]
    pub deleted: bool,
}

impl RotationSnapshot {
    /// Check the structural invariants the calculator relies on.
    pub fn validate(&self) -> Result<(), InvalidState> {
        if self.shift_length_ms <= 0 {
            return Err(InvalidState::NonPositiveShiftLength(self.shift_length_ms));
        }

        let n = self.assignees.len();
        let mut seen = vec![false; n];
        for assignee in &self.assignees {
            let pos = assignee.position as usize;
            if pos >= n || seen[pos] {
                let mut positions: Vec<u32> = self.assignees.iter().map(|a| a.position).collect();
                positions.sort_unstable();
                return Err(InvalidState::NonContiguousPositions { expected: n, positions });
            }
            seen[pos] = true;
        }

        if let Some(bad) = self.overrides.iter().find(|o| o.end_at <= o.start_at) {
            return Err(InvalidState::EmptyOverride(bad.id.clone()));
        }

        Ok(())
    }

    /// Assignee holding `position`, if any.
    pub fn assignee_at(&self, position: u32) -> Option<&Assignee> {
        self.assignees.iter().find(|a| a.position == position)
    }
}

/// Why the effective assignee might have changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionReason {
    ShiftChange,
    OverrideStart,
    OverrideEnd,
    /// Recomputation requested by a signal rather than by the clock.
    ManualChange,
}

impl TransitionReason {
    /// Human-readable phrase used in notifications.
    pub fn phrase(self) -> &'static str {
        match self {
            TransitionReason::ShiftChange => "scheduled shift change",
            TransitionReason::OverrideStart => "override started",
            TransitionReason::OverrideEnd => "override ended",
            TransitionReason::ManualChange => "manual update",
        }
    }

    /// Tie-break order when several candidates share the same instant.
    pub(crate) fn priority(self) -> u8 {
        match self {
            TransitionReason::OverrideEnd => 0,
            TransitionReason::OverrideStart => 1,
            TransitionReason::ShiftChange => 2,
            TransitionReason::ManualChange => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TransitionReason::ShiftChange => "shift_change",
            TransitionReason::OverrideStart => "override_start",
            TransitionReason::OverrideEnd => "override_end",
            TransitionReason::ManualChange => "manual_change",
        }
    }
}

impl std::fmt::Display for TransitionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Earliest future instant at which the effective assignee might change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextTransition {
    pub time: DateTime<Utc>,
    pub reason: TransitionReason,
}

/// Messaging credentials configured for a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessagingIntegration {
    Slack { bot_token: String, channel_id: String },
    Webhook { url: String },
}

/// A user as known to the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Messaging-platform user id, when the user linked an account.
    #[serde(default)]
    pub mention_id: Option<String>,
    pub display_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn snapshot(assignees: Vec<(&str, u32)>) -> RotationSnapshot {
        RotationSnapshot {
            rotation_id: "rot-1".to_string(),
            tenant_id: "acme".to_string(),
            name: "Primary".to_string(),
            anchor_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            shift_length_ms: 3_600_000,
            assignees: assignees
                .into_iter()
                .map(|(id, position)| Assignee { id: id.to_string(), position })
                .collect(),
            overrides: Vec::new(),
            deleted: false,
        }
    }

    #[test]
    fn valid_snapshot_passes() {
        assert!(snapshot(vec![("a", 1), ("b", 0), ("c", 2)]).validate().is_ok());
        assert!(snapshot(vec![]).validate().is_ok());
    }

    #[test]
    fn rejects_non_positive_shift_length() {
        let mut snap = snapshot(vec![("a", 0)]);
        snap.shift_length_ms = 0;
        assert_eq!(snap.validate(), Err(InvalidState::NonPositiveShiftLength(0)));
        snap.shift_length_ms = -5;
        assert!(snap.validate().is_err());
    }

    #[test]
    fn rejects_gaps_and_duplicate_positions() {
        assert!(matches!(
            snapshot(vec![("a", 0), ("b", 2)]).validate(),
            Err(InvalidState::NonContiguousPositions { expected: 2, .. })
        ));
        assert!(snapshot(vec![("a", 0), ("b", 0)]).validate().is_err());
    }

    #[test]
    fn rejects_empty_override() {
        let mut snap = snapshot(vec![("a", 0)]);
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        snap.overrides.push(Override {
            id: "ovr-1".to_string(),
            assignee_id: "z".to_string(),
            start_at: at,
            end_at: at,
            created_at: at,
        });
        assert_eq!(snap.validate(), Err(InvalidState::EmptyOverride("ovr-1".to_string())));
    }

    #[test]
    fn reason_serializes_snake_case() {
        let json = serde_json::to_string(&TransitionReason::OverrideStart).unwrap();
        assert_eq!(json, "\"override_start\"");
        let back: TransitionReason = serde_json::from_str("\"manual_change\"").unwrap();
        assert_eq!(back, TransitionReason::ManualChange);
    }

    #[test]
    fn reason_phrases() {
        assert_eq!(TransitionReason::ShiftChange.phrase(), "scheduled shift change");
        assert_eq!(TransitionReason::OverrideStart.phrase(), "override started");
        assert_eq!(TransitionReason::OverrideEnd.phrase(), "override ended");
        assert_eq!(TransitionReason::ManualChange.phrase(), "manual update");
    }

    #[test]
    fn integration_is_tagged_by_kind() {
        let json = r#"{"kind":"slack","bot_token":"xoxb-1","channel_id":"C1"}"#;
        let parsed: MessagingIntegration = serde_json::from_str(json).unwrap();
        assert_eq!(
            parsed,
            MessagingIntegration::Slack {
                bot_token: "xoxb-1".to_string(),
                channel_id: "C1".to_string()
            }
        );
    }
}
