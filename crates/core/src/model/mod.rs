mod answer;
mod artifacts;
mod catalog;
mod ids;
mod progress;
mod session;

pub use ids::{AreaId, LearnerCode, ModuleId, ParseIdError};

pub use answer::{AnswerSet, AnswerValue};
pub use artifacts::{Badge, FeedbackError, OverallFeedback, ResponseEvent};
pub use catalog::{
    AccordionItem, AnswerOption, CatalogError, ControlQuestion, LearningArea, Module, ModuleKind,
    Question, QuestionKind,
};
pub use progress::{
    AreaProgress, LearnerRecord, MergeOutcome, ModuleProgress, ProgressError, ProgressPatch,
    score_totals,
};
pub use session::{SessionStateError, ShuffledModule};
