//! Hosts workflow instances: at most one live task per rotation id.
//!
//! The registry is a plain `std::sync::Mutex` and is never held across an
//! `.await`. Instances deregister themselves when their loop ends; a
//! generation counter keeps a finished task from evicting its successor.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use oncall_core::RotationId;

use crate::checkpoint::WorkflowCheckpoint;
use crate::workflow::{run_rotation_workflow, WorkflowDeps, WorkflowExit};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("workflow engine is not accepting new instances")]
    Unavailable,

    #[error("workflow engine is at capacity ({0} instances)")]
    AtCapacity(usize),
}

/// Result of a successful start request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StartOutcome {
    /// A new instance was spawned.
    Started,
    /// An instance was already live; it was signalled to re-check instead.
    Attached,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstanceInfo {
    pub rotation_id: RotationId,
    pub started_at: DateTime<Utc>,
    pub resumed: bool,
}

/// The seam the trigger gateway starts workflows through.
#[async_trait]
pub trait WorkflowStarter: Send + Sync {
    async fn start(&self, rotation_id: &str) -> Result<StartOutcome, EngineError>;
}

struct Instance {
    generation: u64,
    signal: Arc<Notify>,
    handle: JoinHandle<()>,
    info: InstanceInfo,
}

struct Registry {
    accepting: bool,
    next_generation: u64,
    instances: HashMap<RotationId, Instance>,
}

pub struct WorkflowEngine {
    deps: WorkflowDeps,
    max_instances: usize,
    registry: Arc<Mutex<Registry>>,
}

fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl WorkflowEngine {
    pub fn new(deps: WorkflowDeps, max_instances: usize) -> Self {
        Self {
            deps,
            max_instances: max_instances.max(1),
            registry: Arc::new(Mutex::new(Registry {
                accepting: true,
                next_generation: 0,
                instances: HashMap::new(),
            })),
        }
    }

    /// Start (or attach to) the workflow for `rotation_id`.
    pub fn start_instance(
        &self,
        rotation_id: &str,
        resume: Option<WorkflowCheckpoint>,
    ) -> Result<StartOutcome, EngineError> {
        let mut registry = lock(&self.registry);

        if !registry.accepting {
            return Err(EngineError::Unavailable);
        }

        if let Some(existing) = registry.instances.get(rotation_id) {
            if !existing.handle.is_finished() {
                existing.signal.notify_one();
                return Ok(StartOutcome::Attached);
            }
        }

        let replacing = registry.instances.contains_key(rotation_id);
        if !replacing && registry.instances.len() >= self.max_instances {
            return Err(EngineError::AtCapacity(self.max_instances));
        }

        let generation = registry.next_generation;
        registry.next_generation += 1;

        let signal = Arc::new(Notify::new());
        let info = InstanceInfo {
            rotation_id: rotation_id.to_string(),
            started_at: self.deps.clock.now(),
            resumed: resume.is_some(),
        };

        // The task can't deregister before it is inserted: removal needs this lock.
        let handle = tokio::spawn(run_instance(
            rotation_id.to_string(),
            generation,
            self.deps.clone(),
            signal.clone(),
            resume,
            self.registry.clone(),
        ));

        registry.instances.insert(
            rotation_id.to_string(),
            Instance { generation, signal, handle, info },
        );

        info!(rotation_id, generation, "workflow instance started");
        Ok(StartOutcome::Started)
    }

    /// Wake a live instance for an immediate recompute. Returns `false` if
    /// no instance is running for `rotation_id`.
    pub fn signal(&self, rotation_id: &str) -> bool {
        let registry = lock(&self.registry);
        match registry.instances.get(rotation_id) {
            Some(instance) if !instance.handle.is_finished() => {
                instance.signal.notify_one();
                true
            }
            _ => false,
        }
    }

    /// Live instances, ordered by rotation id.
    pub fn running(&self) -> Vec<InstanceInfo> {
        let registry = lock(&self.registry);
        let mut live: Vec<InstanceInfo> = registry
            .instances
            .values()
            .filter(|i| !i.handle.is_finished())
            .map(|i| i.info.clone())
            .collect();
        live.sort_by(|a, b| a.rotation_id.cmp(&b.rotation_id));
        live
    }

    pub fn is_running(&self, rotation_id: &str) -> bool {
        lock(&self.registry)
            .instances
            .get(rotation_id)
            .is_some_and(|i| !i.handle.is_finished())
    }

    /// Restart one instance per persisted checkpoint. Returns how many started.
    pub async fn resume_from_checkpoints(&self) -> usize {
        let checkpoints = match self.deps.checkpoints.list().await {
            Ok(list) => list,
            Err(e) => {
                warn!(error = %e, "failed to list workflow checkpoints, nothing resumed");
                return 0;
            }
        };

        let mut resumed = 0;
        for checkpoint in checkpoints {
            let rotation_id = checkpoint.rotation_id.clone();
            match self.start_instance(&rotation_id, Some(checkpoint)) {
                Ok(StartOutcome::Started) => resumed += 1,
                Ok(StartOutcome::Attached) => {}
                Err(e) => warn!(rotation_id = %rotation_id, error = %e, "failed to resume workflow"),
            }
        }

        info!(resumed, "workflow instances resumed from checkpoints");
        resumed
    }

    /// Stop accepting starts and abort every live instance. Checkpoints are
    /// kept so the next process can resume.
    pub fn shutdown(&self) {
        let drained: Vec<Instance> = {
            let mut registry = lock(&self.registry);
            registry.accepting = false;
            registry.instances.drain().map(|(_, i)| i).collect()
        };
        let count = drained.len();
        for instance in drained {
            instance.handle.abort();
        }
        info!(aborted = count, "workflow engine shut down");
    }
}

#[async_trait]
impl WorkflowStarter for WorkflowEngine {
    async fn start(&self, rotation_id: &str) -> Result<StartOutcome, EngineError> {
        self.start_instance(rotation_id, None)
    }
}

async fn run_instance(
    rotation_id: RotationId,
    generation: u64,
    deps: WorkflowDeps,
    signal: Arc<Notify>,
    resume: Option<WorkflowCheckpoint>,
    registry: Arc<Mutex<Registry>>,
) {
    let exit = run_rotation_workflow(rotation_id.clone(), deps, signal, resume).await;

    {
        let mut registry = lock(&registry);
        if registry
            .instances
            .get(&rotation_id)
            .is_some_and(|i| i.generation == generation)
        {
            registry.instances.remove(&rotation_id);
        }
    }

    match exit {
        WorkflowExit::Deleted => info!(rotation_id = %rotation_id, "workflow instance finished"),
        WorkflowExit::Halted { reason } => {
            warn!(rotation_id = %rotation_id, reason = %reason, "workflow instance halted")
        }
    }
}
