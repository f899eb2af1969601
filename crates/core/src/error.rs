use thiserror::Error;

/// A rotation snapshot that cannot be evaluated. Fatal for the instance
/// watching that rotation, never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidState {
    #[error("shift length must be positive, got {0}ms")]
    NonPositiveShiftLength(i64),

    #[error("assignee positions must be a permutation of 0..{expected}, got {positions:?}")]
    NonContiguousPositions { expected: usize, positions: Vec<u32> },

    #[error("override '{0}' ends at or before its start")]
    EmptyOverride(String),
}

/// Errors raised by the external collaborators (rotation store, integration
/// store, user directory).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Backend temporarily unreachable; callers retry.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Backend returned data that cannot be decoded.
    #[error("store returned corrupt data: {0}")]
    Corrupt(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}
