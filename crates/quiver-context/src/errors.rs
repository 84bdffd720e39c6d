//! Engine error types.
//!
//! Only rebuilds can fail. Per-turn assembly over a published generation
//! always produces a result; budget shortfalls are reported as omissions.

use quiver_skills::{CycleError, IndexError};

/// Failure to build or publish a new generation.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// One or more skill documents failed validation.
    #[error(transparent)]
    Index(#[from] IndexError),

    /// Required dependencies form a cycle.
    #[error(transparent)]
    Cycle(#[from] CycleError),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
