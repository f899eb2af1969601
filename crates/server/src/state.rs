use std::sync::Arc;

use oncall_core::{Config, RotationStore};
use oncall_scheduler::WorkflowEngine;

/// Shared state handed to every handler.
pub struct AppState {
    pub config: Config,
    pub rotations: Arc<dyn RotationStore>,
    pub engine: Arc<WorkflowEngine>,
}
