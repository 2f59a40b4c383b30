#![forbid(unsafe_code)]

pub mod codec;
pub mod error;
pub mod model;
pub mod policy;
pub mod scoring;
pub mod steps;
pub mod time;

pub use error::Error;
pub use time::{Clock, FIXED_TEST_TIMESTAMP, fixed_clock, fixed_now};

pub use model::{
    AccordionItem, AnswerOption, AnswerSet, AnswerValue, AreaId, AreaProgress, Badge,
    CatalogError, ControlQuestion, FeedbackError, LearnerCode, LearnerRecord, LearningArea,
    MergeOutcome, Module, ModuleId, ModuleKind, ModuleProgress, OverallFeedback, ParseIdError,
    ProgressError, ProgressPatch, Question, QuestionKind, ResponseEvent, SessionStateError,
    ShuffledModule,
};

pub use codec::{decode_answer, decode_set, encode_answer, encode_set};
pub use policy::{ModulePolicy, policy_for};
pub use steps::{ModuleStep, StepSequence};
