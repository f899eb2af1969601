//! Contracts for the external collaborators the scheduler consumes.
//!
//! Rotation data, messaging credentials and user identities are owned
//! elsewhere; implementations only have to hand back consistent snapshots.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::rotation::{Identity, MessagingIntegration, RotationId, RotationSnapshot};

/// Read access to rotation snapshots.
#[async_trait]
pub trait RotationStore: Send + Sync {
    /// Fetch a fresh snapshot. `Ok(None)` means the rotation does not exist.
    async fn get_rotation(&self, id: &str) -> Result<Option<RotationSnapshot>, StoreError>;

    /// All rotation ids owned by `tenant_id`, read at call time.
    async fn list_rotation_ids(&self, tenant_id: &str) -> Result<Vec<RotationId>, StoreError>;
}

/// Per-tenant messaging credentials.
#[async_trait]
pub trait IntegrationStore: Send + Sync {
    async fn get_integration(&self, tenant_id: &str) -> Result<Option<MessagingIntegration>, StoreError>;
}

/// Resolves user ids to something a human recognizes.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn resolve_identity(&self, user_id: &str) -> Result<Option<Identity>, StoreError>;
}
