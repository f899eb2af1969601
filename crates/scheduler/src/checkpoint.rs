//! Durable workflow progress.
//!
//! A checkpoint records the last assignee a workflow observed and when it
//! next intends to wake. After a restart the engine resumes one instance
//! per checkpoint, and the workflow compares against the recorded assignee
//! instead of treating its first observation as new.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use oncall_core::{RotationId, TransitionReason, UserId};

#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("invalid checkpoint key: {0:?}")]
    InvalidKey(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowCheckpoint {
    pub rotation_id: RotationId,
    /// Assignee observed on the last completed round (`None` = nobody).
    pub last_assignee: Option<UserId>,
    pub next_wake_at: Option<DateTime<Utc>>,
    pub next_reason: Option<TransitionReason>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowCheckpoint {
    /// Whether the recorded wake time has already passed at `now`.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.next_wake_at.is_some_and(|at| at <= now)
    }
}

#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn save(&self, checkpoint: &WorkflowCheckpoint) -> Result<(), CheckpointError>;
    async fn load(&self, rotation_id: &str) -> Result<Option<WorkflowCheckpoint>, CheckpointError>;
    async fn remove(&self, rotation_id: &str) -> Result<(), CheckpointError>;
    async fn list(&self) -> Result<Vec<WorkflowCheckpoint>, CheckpointError>;
}

// ── File store ────────────────────────────────────────────────

/// One JSON file per rotation under a directory.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    dir: PathBuf,
}

impl FileCheckpointStore {
    /// Open (and create if needed) a checkpoint directory.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, CheckpointError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, rotation_id: &str) -> Result<PathBuf, CheckpointError> {
        if rotation_id.is_empty() {
            return Err(CheckpointError::InvalidKey(rotation_id.to_string()));
        }
        Ok(self.dir.join(format!("{}.json", file_stem(rotation_id))))
    }
}

/// Ids are opaque; percent-encoding keeps separators out of the file name.
fn file_stem(rotation_id: &str) -> String {
    urlencoding::encode(rotation_id).into_owned()
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn save(&self, checkpoint: &WorkflowCheckpoint) -> Result<(), CheckpointError> {
        let path = self.path_for(&checkpoint.rotation_id)?;
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(checkpoint)?;
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn load(&self, rotation_id: &str) -> Result<Option<WorkflowCheckpoint>, CheckpointError> {
        let path = self.path_for(rotation_id)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn remove(&self, rotation_id: &str) -> Result<(), CheckpointError> {
        let path = self.path_for(rotation_id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self) -> Result<Vec<WorkflowCheckpoint>, CheckpointError> {
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        let mut checkpoints = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = tokio::fs::read(&path).await?;
            match serde_json::from_slice::<WorkflowCheckpoint>(&bytes) {
                Ok(cp) => checkpoints.push(cp),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable checkpoint");
                }
            }
        }

        checkpoints.sort_by(|a, b| a.rotation_id.cmp(&b.rotation_id));
        Ok(checkpoints)
    }
}

// ── Memory store ──────────────────────────────────────────────

/// Process-local checkpoints; nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    entries: Mutex<HashMap<RotationId, WorkflowCheckpoint>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<RotationId, WorkflowCheckpoint>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn save(&self, checkpoint: &WorkflowCheckpoint) -> Result<(), CheckpointError> {
        self.entries()
            .insert(checkpoint.rotation_id.clone(), checkpoint.clone());
        Ok(())
    }

    async fn load(&self, rotation_id: &str) -> Result<Option<WorkflowCheckpoint>, CheckpointError> {
        Ok(self.entries().get(rotation_id).cloned())
    }

    async fn remove(&self, rotation_id: &str) -> Result<(), CheckpointError> {
        self.entries().remove(rotation_id);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<WorkflowCheckpoint>, CheckpointError> {
        let mut all: Vec<WorkflowCheckpoint> = self.entries().values().cloned().collect();
        all.sort_by(|a, b| a.rotation_id.cmp(&b.rotation_id));
        Ok(all)
    }
}
