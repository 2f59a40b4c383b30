use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::model::{LearnerCode, ModuleId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum FeedbackError {
    #[error("satisfaction rating out of range: {value} (expected 1..=5)")]
    SatisfactionOutOfRange { value: u8 },

    #[error("recommendation rating out of range: {value} (expected 1..=5)")]
    RecommendationOutOfRange { value: u8 },
}

/// A completion badge. At most one exists per learner and module; repeat
/// submissions leave the original issue date untouched.
///
/// The module title is denormalized so badge listings render without the
/// catalog at hand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Badge {
    module_id: ModuleId,
    module_title: String,
    learner_code: LearnerCode,
    issued_at: DateTime<Utc>,
}

impl Badge {
    #[must_use]
    pub fn new(
        module_id: ModuleId,
        module_title: impl Into<String>,
        learner_code: LearnerCode,
        issued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            module_id,
            module_title: module_title.into(),
            learner_code,
            issued_at,
        }
    }

    #[must_use]
    pub fn module_id(&self) -> &ModuleId {
        &self.module_id
    }

    #[must_use]
    pub fn module_title(&self) -> &str {
        &self.module_title
    }

    #[must_use]
    pub fn learner_code(&self) -> &LearnerCode {
        &self.learner_code
    }

    #[must_use]
    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }
}

/// End-of-area feedback a learner files exactly once. Both ratings use a
/// 1 to 5 scale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverallFeedback {
    satisfaction: u8,
    favorite_module: ModuleId,
    would_recommend: u8,
    submitted_at: DateTime<Utc>,
}

impl OverallFeedback {
    /// # Errors
    ///
    /// Returns `FeedbackError` if either rating falls outside 1..=5.
    pub fn new(
        satisfaction: u8,
        favorite_module: ModuleId,
        would_recommend: u8,
        submitted_at: DateTime<Utc>,
    ) -> Result<Self, FeedbackError> {
        if !(1..=5).contains(&satisfaction) {
            return Err(FeedbackError::SatisfactionOutOfRange {
                value: satisfaction,
            });
        }
        if !(1..=5).contains(&would_recommend) {
            return Err(FeedbackError::RecommendationOutOfRange {
                value: would_recommend,
            });
        }
        Ok(Self {
            satisfaction,
            favorite_module,
            would_recommend,
            submitted_at,
        })
    }

    #[must_use]
    pub fn satisfaction(&self) -> u8 {
        self.satisfaction
    }

    #[must_use]
    pub fn favorite_module(&self) -> &ModuleId {
        &self.favorite_module
    }

    #[must_use]
    pub fn would_recommend(&self) -> u8 {
        self.would_recommend
    }

    #[must_use]
    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }

    /// A rating of 4 or 5 counts as a recommendation.
    #[must_use]
    pub fn recommends(&self) -> bool {
        self.would_recommend >= 4
    }
}

/// One answered question captured at submission time, keyed by the question's
/// catalog ordinal and carrying each chosen option's display text.
///
/// Events are append-only; aggregation never needs the shuffled layout the
/// learner saw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseEvent {
    id: Uuid,
    learner_code: LearnerCode,
    module_id: ModuleId,
    question_ordinal: u32,
    question_text: String,
    selected: Vec<String>,
    recorded_at: DateTime<Utc>,
}

impl ResponseEvent {
    /// Captures a freshly answered question under a new event id.
    #[must_use]
    pub fn record(
        learner_code: LearnerCode,
        module_id: ModuleId,
        question_ordinal: u32,
        question_text: impl Into<String>,
        selected: Vec<String>,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            learner_code,
            module_id,
            question_ordinal,
            question_text: question_text.into(),
            selected,
            recorded_at,
        }
    }

    /// Rehydrates an event from persisted storage.
    #[must_use]
    pub fn from_persisted(
        id: Uuid,
        learner_code: LearnerCode,
        module_id: ModuleId,
        question_ordinal: u32,
        question_text: impl Into<String>,
        selected: Vec<String>,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            learner_code,
            module_id,
            question_ordinal,
            question_text: question_text.into(),
            selected,
            recorded_at,
        }
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub fn learner_code(&self) -> &LearnerCode {
        &self.learner_code
    }

    #[must_use]
    pub fn module_id(&self) -> &ModuleId {
        &self.module_id
    }

    #[must_use]
    pub fn question_ordinal(&self) -> u32 {
        self.question_ordinal
    }

    #[must_use]
    pub fn question_text(&self) -> &str {
        &self.question_text
    }

    #[must_use]
    pub fn selected(&self) -> &[String] {
        &self.selected
    }

    #[must_use]
    pub fn recorded_at(&self) -> DateTime<Utc> {
        self.recorded_at
    }
}
