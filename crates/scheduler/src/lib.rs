//! Per-rotation scheduling workflows and the engine that hosts them.
//!
//! One long-lived task per rotation sleeps until the next instant the
//! on-call assignee can change, re-reads the rotation, and hands any
//! observed change to a [`ChangeNotifier`](oncall_notify::ChangeNotifier).
//! Progress is checkpointed so a restarted process picks up where it left
//! off.

pub mod checkpoint;
pub mod clock;
pub mod engine;
pub mod retry;
pub mod workflow;

#[cfg(test)]
pub(crate) mod testing;

pub use checkpoint::{
    CheckpointError, CheckpointStore, FileCheckpointStore, MemoryCheckpointStore, WorkflowCheckpoint,
};
pub use clock::{Clock, SystemClock};
pub use engine::{EngineError, InstanceInfo, StartOutcome, WorkflowEngine, WorkflowStarter};
pub use retry::RetryPolicy;
pub use workflow::{run_rotation_workflow, WorkflowDeps, WorkflowExit};
