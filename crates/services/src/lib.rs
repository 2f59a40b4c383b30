#![forbid(unsafe_code)]

pub mod aggregate;
pub mod error;
pub mod progress;
pub mod sessions;
pub mod stats;

pub use assess_core::Clock;

pub use error::{AggregateError, ProgressServiceError, SessionError, SubmissionError};

pub use aggregate::{Aggregator, OptionDistribution, QuestionDistribution};
pub use progress::ProgressService;
pub use sessions::{Autosaver, ModuleSession, SubmissionService, shuffle_module};
pub use stats::{AreaFeedbackStats, PlatformSummary, StatisticsService};
