//! Error taxonomy for the engine.
//!
//! Validation problems are reported before a trigger is built or an edit is
//! applied. Everything that goes wrong while a segment runs is an
//! [`EngineError`] returned once to whoever fired the run.

use thiserror::Error;

/// Configuration or edit rejected before anything runs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("segment name must not be empty")]
    EmptyName,

    #[error("scheduled trigger has no fire time set")]
    MissingFireAt,

    #[error("effect index {index} out of bounds (length: {len})")]
    EffectIndex { index: usize, len: usize },
}

/// Failure of a single run or activation.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The run was cancelled, either explicitly or by a newer fire of the
    /// same segment. Effects already executed stay executed.
    #[error("run cancelled after {completed} of {total} effects")]
    Cancelled { completed: usize, total: usize },

    /// The trigger was disarmed before it invoked its callback.
    #[error("trigger disarmed before firing")]
    Disarmed,

    #[error("effect {index} ({kind}) failed: {message}")]
    EffectFailed {
        index: usize,
        kind: &'static str,
        message: String,
    },
}

impl EngineError {
    pub fn is_cancellation(&self) -> bool {
        matches!(self, EngineError::Cancelled { .. } | EngineError::Disarmed)
    }
}

pub type Result<T, E = EngineError> = std::result::Result<T, E>;
