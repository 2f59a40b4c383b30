use thiserror::Error;

use crate::model::{CatalogError, FeedbackError, ParseIdError, ProgressError, SessionStateError};

/// Umbrella error for callers that cross several domain concerns.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    SessionState(#[from] SessionStateError),
    #[error(transparent)]
    Progress(#[from] ProgressError),
    #[error(transparent)]
    Feedback(#[from] FeedbackError),
    #[error(transparent)]
    ParseId(#[from] ParseIdError),
}
