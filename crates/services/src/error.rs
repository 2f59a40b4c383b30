//! Shared error types for the services crate.

use thiserror::Error;

use assess_core::model::{FeedbackError, SessionStateError};
use assess_core::steps::ModuleStep;
use storage::repository::StorageError;

/// Errors emitted by `ModuleSession`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("module already submitted")]
    Completed,
    #[error("unknown question ordinal {0}")]
    UnknownQuestion(u32),
    #[error("unknown accordion item {0}")]
    UnknownItem(String),
    #[error("accordion item {0} has no control question")]
    NoControl(String),
    #[error("selection does not fit question {0}")]
    InvalidSelection(u32),
    #[error("selection does not fit control question of item {0}")]
    InvalidControlSelection(String),
    #[error("step guard holds at {0}")]
    StepBlocked(ModuleStep),
    #[error("no step in that direction")]
    EndOfSequence,
    #[error("results are entered through submission")]
    SubmitRequired,
    #[error(transparent)]
    State(#[from] SessionStateError),
}

/// Errors emitted by `SubmissionService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SubmissionError {
    #[error("module {0} is not part of the area")]
    UnknownModule(String),
    #[error("module is not ready for submission")]
    NotReady,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `ProgressService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressServiceError {
    #[error(transparent)]
    Feedback(#[from] FeedbackError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `Aggregator` and `StatisticsService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AggregateError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}
