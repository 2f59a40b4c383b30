use assess_core::model::{
    AreaId, Badge, LearnerCode, LearnerRecord, MergeOutcome, ModuleId, ModuleProgress,
    OverallFeedback, ProgressPatch, ResponseEvent,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Repository contract for the learner registry.
#[async_trait]
pub trait LearnerRepository: Send + Sync {
    /// Register a learner under a fresh code.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the code is already taken.
    async fn create_learner(&self, learner: &LearnerRecord) -> Result<(), StorageError>;

    /// Fetch a learner by code.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_learner(&self, code: &LearnerCode) -> Result<LearnerRecord, StorageError>;

    /// List all registered learners.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the registry cannot be read.
    async fn list_learners(&self) -> Result<Vec<LearnerRecord>, StorageError>;

    /// Rewrite a learner's derived totals.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the learner does not exist.
    async fn set_score_totals(
        &self,
        code: &LearnerCode,
        total_points: u32,
        overall_progress: u8,
    ) -> Result<(), StorageError>;
}

/// Repository contract for per-module progress records.
///
/// Saves are merges. `merge_module_progress` applies a partial patch on top
/// of the stored record, preserving every stored field the patch leaves
/// unset, and resolves racing writers by `last_updated`: an older patch is
/// skipped and reported as `MergeOutcome::Stale`.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Fetch one module's progress, if any interaction was recorded.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be read.
    async fn module_progress(
        &self,
        learner: &LearnerCode,
        module: &ModuleId,
    ) -> Result<Option<ModuleProgress>, StorageError>;

    /// Fetch all module progress for one learner, keyed by module id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the records cannot be read.
    async fn all_module_progress(
        &self,
        learner: &LearnerCode,
    ) -> Result<BTreeMap<ModuleId, ModuleProgress>, StorageError>;

    /// Merge a partial update into the stored record. A missing record is
    /// created from started defaults first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the merged record cannot be written.
    async fn merge_module_progress(
        &self,
        learner: &LearnerCode,
        module: &ModuleId,
        patch: &ProgressPatch,
    ) -> Result<MergeOutcome, StorageError>;

    /// Replace the record with zeroed progress and cleared answers (the
    /// explicit reset action).
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be written.
    async fn reset_module_progress(
        &self,
        learner: &LearnerCode,
        module: &ModuleId,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError>;
}

/// Repository contract for completion badges.
#[async_trait]
pub trait BadgeRepository: Send + Sync {
    /// Insert a badge unless one already exists for (learner, module).
    /// Returns whether the badge was inserted; an existing badge is never
    /// overwritten.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the badge cannot be written.
    async fn insert_badge(&self, badge: &Badge) -> Result<bool, StorageError>;

    /// All badges of one learner, keyed by module id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the badges cannot be read.
    async fn badges(&self, learner: &LearnerCode)
    -> Result<BTreeMap<ModuleId, Badge>, StorageError>;

    /// Total number of badges issued across all learners.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the badges cannot be read.
    async fn count_badges(&self) -> Result<u64, StorageError>;
}

/// Repository contract for area-level overall feedback.
#[async_trait]
pub trait FeedbackRepository: Send + Sync {
    /// Insert feedback unless the learner already filed some for the area.
    /// Returns whether the feedback was inserted.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the feedback cannot be written.
    async fn insert_overall_feedback(
        &self,
        learner: &LearnerCode,
        area: &AreaId,
        feedback: &OverallFeedback,
    ) -> Result<bool, StorageError>;

    /// The learner's feedback for one area, if filed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the feedback cannot be read.
    async fn overall_feedback(
        &self,
        learner: &LearnerCode,
        area: &AreaId,
    ) -> Result<Option<OverallFeedback>, StorageError>;

    /// Every learner's feedback for one area.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the feedback cannot be read.
    async fn list_feedback_for_area(
        &self,
        area: &AreaId,
    ) -> Result<Vec<(LearnerCode, OverallFeedback)>, StorageError>;
}

/// Repository contract for the append-only response-event log.
#[async_trait]
pub trait EventRepository: Send + Sync {
    /// Append a batch of response events.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the events cannot be written.
    async fn append_events(&self, events: &[ResponseEvent]) -> Result<(), StorageError>;

    /// All recorded events for one module, across learners.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the log cannot be read.
    async fn events_for_module(
        &self,
        module: &ModuleId,
    ) -> Result<Vec<ResponseEvent>, StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    learners: Arc<Mutex<HashMap<LearnerCode, LearnerRecord>>>,
    progress: Arc<Mutex<HashMap<(LearnerCode, ModuleId), ModuleProgress>>>,
    badges: Arc<Mutex<HashMap<(LearnerCode, ModuleId), Badge>>>,
    feedback: Arc<Mutex<HashMap<(LearnerCode, AreaId), OverallFeedback>>>,
    events: Arc<Mutex<Vec<ResponseEvent>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

#[async_trait]
impl LearnerRepository for InMemoryRepository {
    async fn create_learner(&self, learner: &LearnerRecord) -> Result<(), StorageError> {
        let mut guard = self.learners.lock().map_err(poisoned)?;
        if guard.contains_key(learner.code()) {
            return Err(StorageError::Conflict);
        }
        guard.insert(learner.code().clone(), learner.clone());
        Ok(())
    }

    async fn get_learner(&self, code: &LearnerCode) -> Result<LearnerRecord, StorageError> {
        let guard = self.learners.lock().map_err(poisoned)?;
        guard.get(code).cloned().ok_or(StorageError::NotFound)
    }

    async fn list_learners(&self) -> Result<Vec<LearnerRecord>, StorageError> {
        let guard = self.learners.lock().map_err(poisoned)?;
        let mut learners: Vec<LearnerRecord> = guard.values().cloned().collect();
        learners.sort_by(|a, b| a.code().cmp(b.code()));
        Ok(learners)
    }

    async fn set_score_totals(
        &self,
        code: &LearnerCode,
        total_points: u32,
        overall_progress: u8,
    ) -> Result<(), StorageError> {
        let mut guard = self.learners.lock().map_err(poisoned)?;
        let record = guard.get_mut(code).ok_or(StorageError::NotFound)?;
        record.set_score_totals(total_points, overall_progress);
        Ok(())
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn module_progress(
        &self,
        learner: &LearnerCode,
        module: &ModuleId,
    ) -> Result<Option<ModuleProgress>, StorageError> {
        let guard = self.progress.lock().map_err(poisoned)?;
        Ok(guard.get(&(learner.clone(), module.clone())).cloned())
    }

    async fn all_module_progress(
        &self,
        learner: &LearnerCode,
    ) -> Result<BTreeMap<ModuleId, ModuleProgress>, StorageError> {
        let guard = self.progress.lock().map_err(poisoned)?;
        Ok(guard
            .iter()
            .filter(|((code, _), _)| code == learner)
            .map(|((_, module), record)| (module.clone(), record.clone()))
            .collect())
    }

    async fn merge_module_progress(
        &self,
        learner: &LearnerCode,
        module: &ModuleId,
        patch: &ProgressPatch,
    ) -> Result<MergeOutcome, StorageError> {
        let mut guard = self.progress.lock().map_err(poisoned)?;
        let key = (learner.clone(), module.clone());
        match patch.apply_to(guard.get(&key)) {
            Some(merged) => {
                guard.insert(key, merged);
                Ok(MergeOutcome::Applied)
            }
            None => Ok(MergeOutcome::Stale),
        }
    }

    async fn reset_module_progress(
        &self,
        learner: &LearnerCode,
        module: &ModuleId,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut guard = self.progress.lock().map_err(poisoned)?;
        guard.insert((learner.clone(), module.clone()), ModuleProgress::zeroed(at));
        Ok(())
    }
}

#[async_trait]
impl BadgeRepository for InMemoryRepository {
    async fn insert_badge(&self, badge: &Badge) -> Result<bool, StorageError> {
        let mut guard = self.badges.lock().map_err(poisoned)?;
        let key = (badge.learner_code().clone(), badge.module_id().clone());
        if guard.contains_key(&key) {
            return Ok(false);
        }
        guard.insert(key, badge.clone());
        Ok(true)
    }

    async fn badges(
        &self,
        learner: &LearnerCode,
    ) -> Result<BTreeMap<ModuleId, Badge>, StorageError> {
        let guard = self.badges.lock().map_err(poisoned)?;
        Ok(guard
            .iter()
            .filter(|((code, _), _)| code == learner)
            .map(|((_, module), badge)| (module.clone(), badge.clone()))
            .collect())
    }

    async fn count_badges(&self) -> Result<u64, StorageError> {
        let guard = self.badges.lock().map_err(poisoned)?;
        Ok(guard.len() as u64)
    }
}

#[async_trait]
impl FeedbackRepository for InMemoryRepository {
    async fn insert_overall_feedback(
        &self,
        learner: &LearnerCode,
        area: &AreaId,
        feedback: &OverallFeedback,
    ) -> Result<bool, StorageError> {
        let mut guard = self.feedback.lock().map_err(poisoned)?;
        let key = (learner.clone(), area.clone());
        if guard.contains_key(&key) {
            return Ok(false);
        }
        guard.insert(key, feedback.clone());
        Ok(true)
    }

    async fn overall_feedback(
        &self,
        learner: &LearnerCode,
        area: &AreaId,
    ) -> Result<Option<OverallFeedback>, StorageError> {
        let guard = self.feedback.lock().map_err(poisoned)?;
        Ok(guard.get(&(learner.clone(), area.clone())).cloned())
    }

    async fn list_feedback_for_area(
        &self,
        area: &AreaId,
    ) -> Result<Vec<(LearnerCode, OverallFeedback)>, StorageError> {
        let guard = self.feedback.lock().map_err(poisoned)?;
        let mut entries: Vec<(LearnerCode, OverallFeedback)> = guard
            .iter()
            .filter(|((_, a), _)| a == area)
            .map(|((code, _), feedback)| (code.clone(), feedback.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(entries)
    }
}

#[async_trait]
impl EventRepository for InMemoryRepository {
    async fn append_events(&self, events: &[ResponseEvent]) -> Result<(), StorageError> {
        let mut guard = self.events.lock().map_err(poisoned)?;
        guard.extend_from_slice(events);
        Ok(())
    }

    async fn events_for_module(
        &self,
        module: &ModuleId,
    ) -> Result<Vec<ResponseEvent>, StorageError> {
        let guard = self.events.lock().map_err(poisoned)?;
        Ok(guard
            .iter()
            .filter(|event| event.module_id() == module)
            .cloned()
            .collect())
    }
}

/// Aggregates the repositories behind trait objects for easy backend
/// swapping.
#[derive(Clone)]
pub struct Storage {
    pub learners: Arc<dyn LearnerRepository>,
    pub progress: Arc<dyn ProgressRepository>,
    pub badges: Arc<dyn BadgeRepository>,
    pub feedback: Arc<dyn FeedbackRepository>,
    pub events: Arc<dyn EventRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let learners: Arc<dyn LearnerRepository> = Arc::new(repo.clone());
        let progress: Arc<dyn ProgressRepository> = Arc::new(repo.clone());
        let badges: Arc<dyn BadgeRepository> = Arc::new(repo.clone());
        let feedback: Arc<dyn FeedbackRepository> = Arc::new(repo.clone());
        let events: Arc<dyn EventRepository> = Arc::new(repo);
        Self {
            learners,
            progress,
            badges,
            feedback,
            events,
        }
    }
}
