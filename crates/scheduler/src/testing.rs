//! In-memory collaborators shared by the workflow and engine tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use oncall_core::{Assignee, Override, RotationId, RotationSnapshot, RotationStore, StoreError, TransitionReason};
use oncall_notify::{ChangeNotifier, NotifyOutcome};

use crate::checkpoint::MemoryCheckpointStore;
use crate::clock::TokioClock;
use crate::retry::RetryPolicy;
use crate::workflow::WorkflowDeps;

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

pub const HOUR_MS: i64 = 3_600_000;

pub fn hourly_rotation(id: &str, people: &[&str]) -> RotationSnapshot {
    RotationSnapshot {
        rotation_id: id.to_string(),
        tenant_id: "acme".to_string(),
        name: format!("Rotation {id}"),
        anchor_at: t0(),
        shift_length_ms: HOUR_MS,
        assignees: people
            .iter()
            .enumerate()
            .map(|(i, p)| Assignee { id: p.to_string(), position: i as u32 })
            .collect(),
        overrides: Vec::new(),
        deleted: false,
    }
}

pub fn override_for(id: &str, who: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Override {
    Override {
        id: id.to_string(),
        assignee_id: who.to_string(),
        start_at: start,
        end_at: end,
        created_at: t0(),
    }
}

/// Rotation store whose contents tests can edit between rounds.
#[derive(Default)]
pub struct FakeRotations {
    rotations: Mutex<HashMap<RotationId, RotationSnapshot>>,
    scripted_errors: Mutex<VecDeque<StoreError>>,
    fetches: Mutex<usize>,
}

impl FakeRotations {
    pub fn with(rotations: Vec<RotationSnapshot>) -> Arc<Self> {
        let fake = Self::default();
        {
            let mut map = fake.rotations.lock().unwrap();
            for r in rotations {
                map.insert(r.rotation_id.clone(), r);
            }
        }
        Arc::new(fake)
    }

    pub fn put(&self, rotation: RotationSnapshot) {
        self.rotations.lock().unwrap().insert(rotation.rotation_id.clone(), rotation);
    }

    pub fn edit(&self, id: &str, f: impl FnOnce(&mut RotationSnapshot)) {
        let mut map = self.rotations.lock().unwrap();
        f(map.get_mut(id).unwrap());
    }

    /// The next `get_rotation` calls fail with these errors, in order.
    pub fn fail_next(&self, errors: Vec<StoreError>) {
        self.scripted_errors.lock().unwrap().extend(errors);
    }

    pub fn fetches(&self) -> usize {
        *self.fetches.lock().unwrap()
    }
}

#[async_trait]
impl RotationStore for FakeRotations {
    async fn get_rotation(&self, id: &str) -> Result<Option<RotationSnapshot>, StoreError> {
        *self.fetches.lock().unwrap() += 1;
        if let Some(err) = self.scripted_errors.lock().unwrap().pop_front() {
            return Err(err);
        }
        Ok(self.rotations.lock().unwrap().get(id).cloned())
    }

    async fn list_rotation_ids(&self, tenant_id: &str) -> Result<Vec<RotationId>, StoreError> {
        let mut ids: Vec<RotationId> = self
            .rotations
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.tenant_id == tenant_id)
            .map(|r| r.rotation_id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub rotation_id: String,
    pub previous: Option<String>,
    pub new: Option<String>,
    pub reason: TransitionReason,
    pub at: DateTime<Utc>,
}

/// Records every call; stamps it with the tokio-driven wall clock.
pub struct RecordingNotifier {
    clock: TokioClock,
    pub calls: Mutex<Vec<Change>>,
}

impl RecordingNotifier {
    pub fn new(clock: TokioClock) -> Arc<Self> {
        Arc::new(Self { clock, calls: Mutex::new(Vec::new()) })
    }

    pub fn calls(&self) -> Vec<Change> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChangeNotifier for RecordingNotifier {
    async fn notify_on_change(
        &self,
        rotation_id: &str,
        previous: Option<&str>,
        new: Option<&str>,
        reason: TransitionReason,
    ) -> NotifyOutcome {
        use crate::clock::Clock;
        self.calls.lock().unwrap().push(Change {
            rotation_id: rotation_id.to_string(),
            previous: previous.map(str::to_string),
            new: new.map(str::to_string),
            reason,
            at: self.clock.now(),
        });
        NotifyOutcome::Delivered { channel: "recording".to_string() }
    }
}

pub struct Harness {
    pub rotations: Arc<FakeRotations>,
    pub notifier: Arc<RecordingNotifier>,
    pub checkpoints: Arc<MemoryCheckpointStore>,
    pub clock: TokioClock,
}

impl Harness {
    /// Must be called inside a paused tokio runtime so the clock starts at `t0()`.
    pub fn new(rotations: Vec<RotationSnapshot>) -> Self {
        let clock = TokioClock::starting_at(t0());
        Self {
            rotations: FakeRotations::with(rotations),
            notifier: RecordingNotifier::new(clock),
            checkpoints: Arc::new(MemoryCheckpointStore::new()),
            clock,
        }
    }

    pub fn deps(&self) -> WorkflowDeps {
        WorkflowDeps {
            rotations: self.rotations.clone(),
            notifier: self.notifier.clone(),
            checkpoints: self.checkpoints.clone(),
            clock: Arc::new(self.clock),
            retry: RetryPolicy::default(),
        }
    }
}
