//! File-backed directory of rotations, integrations and users.
//!
//! The YAML file is re-read on every call, so an edit is picked up by the
//! next workflow fetch (or immediately after a signal). Read and parse
//! failures are reported as transient: the file may be mid-edit, and a
//! workflow will retry rather than halt.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use oncall_core::{
    Identity, IntegrationStore, MessagingIntegration, RotationId, RotationSnapshot, RotationStore,
    StoreError, TenantId, UserDirectory, UserId,
};

/// On-disk layout of the directory file.
#[derive(Debug, Default, Deserialize)]
pub struct DirectoryFile {
    #[serde(default)]
    pub rotations: Vec<RotationSnapshot>,
    #[serde(default)]
    pub integrations: HashMap<TenantId, MessagingIntegration>,
    #[serde(default)]
    pub users: HashMap<UserId, Identity>,
}

#[derive(Debug, Clone)]
pub struct FileDirectory {
    path: PathBuf,
}

impl FileDirectory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and parse the whole file.
    pub async fn load(&self) -> Result<DirectoryFile, StoreError> {
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            StoreError::Unavailable(format!("failed to read {}: {e}", self.path.display()))
        })?;
        let parsed: DirectoryFile = serde_yaml::from_str(&raw).map_err(|e| {
            StoreError::Unavailable(format!("failed to parse {}: {e}", self.path.display()))
        })?;
        debug!(
            path = %self.path.display(),
            rotations = parsed.rotations.len(),
            "directory file loaded"
        );
        Ok(parsed)
    }
}

#[async_trait]
impl RotationStore for FileDirectory {
    async fn get_rotation(&self, id: &str) -> Result<Option<RotationSnapshot>, StoreError> {
        let file = self.load().await?;
        Ok(file.rotations.into_iter().find(|r| r.rotation_id == id))
    }

    async fn list_rotation_ids(&self, tenant_id: &str) -> Result<Vec<RotationId>, StoreError> {
        let file = self.load().await?;
        Ok(file
            .rotations
            .into_iter()
            .filter(|r| r.tenant_id == tenant_id && !r.deleted)
            .map(|r| r.rotation_id)
            .collect())
    }
}

#[async_trait]
impl IntegrationStore for FileDirectory {
    async fn get_integration(&self, tenant_id: &str) -> Result<Option<MessagingIntegration>, StoreError> {
        Ok(self.load().await?.integrations.remove(tenant_id))
    }
}

#[async_trait]
impl UserDirectory for FileDirectory {
    async fn resolve_identity(&self, user_id: &str) -> Result<Option<Identity>, StoreError> {
        Ok(self.load().await?.users.remove(user_id))
    }
}
