pub mod assignment;
pub mod config;
pub mod error;
pub mod rotation;
pub mod store;

pub use assignment::{active_override, base_assignee, effective_assignee, next_transition};
pub use config::Config;
pub use error::*;
pub use rotation::*;
pub use store::{IntegrationStore, RotationStore, UserDirectory};
