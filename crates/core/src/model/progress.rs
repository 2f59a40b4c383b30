use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::model::{AnswerSet, LearnerCode, LearningArea, ModuleId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("progress percent out of range: {value}")]
    ProgressOutOfRange { value: u8 },

    #[error("learner name is empty")]
    EmptyName,
}

/// Persisted per-module state of one learner.
///
/// `progress` is the coarse percentage shown on overview pages: 0 for an
/// untouched module, 1 once started, 100 once completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleProgress {
    completed: bool,
    score: u32,
    progress: u8,
    answers: AnswerSet,
    last_updated: DateTime<Utc>,
}

impl ModuleProgress {
    /// State written the first time a learner interacts with a module.
    #[must_use]
    pub fn started(at: DateTime<Utc>) -> Self {
        Self {
            completed: false,
            score: 0,
            progress: 1,
            answers: AnswerSet::new(),
            last_updated: at,
        }
    }

    /// State written by the explicit reset action: completion, score and
    /// progress zeroed, answers cleared.
    #[must_use]
    pub fn zeroed(at: DateTime<Utc>) -> Self {
        Self {
            completed: false,
            score: 0,
            progress: 0,
            answers: AnswerSet::new(),
            last_updated: at,
        }
    }

    /// Rehydrates module progress from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::ProgressOutOfRange` if `progress` exceeds 100.
    pub fn from_persisted(
        completed: bool,
        score: u32,
        progress: u8,
        answers: AnswerSet,
        last_updated: DateTime<Utc>,
    ) -> Result<Self, ProgressError> {
        if progress > 100 {
            return Err(ProgressError::ProgressOutOfRange { value: progress });
        }
        Ok(Self {
            completed,
            score,
            progress,
            answers,
            last_updated,
        })
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    #[must_use]
    pub fn score(&self) -> u32 {
        self.score
    }

    #[must_use]
    pub fn progress(&self) -> u8 {
        self.progress
    }

    #[must_use]
    pub fn answers(&self) -> &AnswerSet {
        &self.answers
    }

    #[must_use]
    pub fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }
}

/// Outcome of applying a `ProgressPatch` against the stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The patch was merged into the stored record.
    Applied,
    /// The patch's timestamp was older than the stored record; nothing changed.
    Stale,
}

/// A partial update to `ModuleProgress`.
///
/// Saves are merges, never replaces: fields left as `None` keep their stored
/// values. `last_updated` is mandatory and decides last-write-wins ordering
/// between the debounced and immediate save paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressPatch {
    completed: Option<bool>,
    score: Option<u32>,
    progress: Option<u8>,
    answers: Option<AnswerSet>,
    last_updated: DateTime<Utc>,
}

impl ProgressPatch {
    #[must_use]
    pub fn new(last_updated: DateTime<Utc>) -> Self {
        Self {
            completed: None,
            score: None,
            progress: None,
            answers: None,
            last_updated,
        }
    }

    #[must_use]
    pub fn with_completed(mut self, completed: bool) -> Self {
        self.completed = Some(completed);
        self
    }

    #[must_use]
    pub fn with_score(mut self, score: u32) -> Self {
        self.score = Some(score);
        self
    }

    #[must_use]
    pub fn with_progress(mut self, progress: u8) -> Self {
        self.progress = Some(progress);
        self
    }

    #[must_use]
    pub fn with_answers(mut self, answers: AnswerSet) -> Self {
        self.answers = Some(answers);
        self
    }

    #[must_use]
    pub fn completed(&self) -> Option<bool> {
        self.completed
    }

    #[must_use]
    pub fn score(&self) -> Option<u32> {
        self.score
    }

    #[must_use]
    pub fn progress(&self) -> Option<u8> {
        self.progress
    }

    #[must_use]
    pub fn answers(&self) -> Option<&AnswerSet> {
        self.answers.as_ref()
    }

    #[must_use]
    pub fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }

    /// Merges this patch into the stored record.
    ///
    /// Returns the merged record, or `None` when the patch is stale (its
    /// timestamp is strictly older than the stored one). Both storage
    /// backends share this logic so merge semantics cannot drift.
    #[must_use]
    pub fn apply_to(&self, existing: Option<&ModuleProgress>) -> Option<ModuleProgress> {
        if let Some(existing) = existing {
            if self.last_updated < existing.last_updated {
                return None;
            }
        }
        let base = existing
            .cloned()
            .unwrap_or_else(|| ModuleProgress::started(self.last_updated));
        Some(ModuleProgress {
            completed: self.completed.unwrap_or(base.completed),
            score: self.score.unwrap_or(base.score),
            progress: self.progress.unwrap_or(base.progress),
            answers: self.answers.clone().unwrap_or(base.answers),
            last_updated: self.last_updated,
        })
    }
}

/// Aggregate progress over one learning area. Never persisted; always
/// recomputed from the per-module records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AreaProgress {
    completed: u32,
    total: u32,
    points: u32,
    max_points: u32,
}

impl AreaProgress {
    /// Derives area progress from the area's catalog and the learner's
    /// per-module records. Modules without a record count as untouched.
    #[must_use]
    pub fn compute(area: &LearningArea, records: &BTreeMap<ModuleId, ModuleProgress>) -> Self {
        let mut completed = 0_u32;
        let mut points = 0_u32;
        for module in area.modules() {
            if let Some(record) = records.get(module.id()) {
                if record.is_completed() {
                    completed += 1;
                }
                points += record.score();
            }
        }
        Self {
            completed,
            total: u32::try_from(area.modules().len()).unwrap_or(u32::MAX),
            points,
            max_points: area.max_points(),
        }
    }

    #[must_use]
    pub fn completed(&self) -> u32 {
        self.completed
    }

    #[must_use]
    pub fn total(&self) -> u32 {
        self.total
    }

    #[must_use]
    pub fn points(&self) -> u32 {
        self.points
    }

    #[must_use]
    pub fn max_points(&self) -> u32 {
        self.max_points
    }

    /// Accumulated points as a rounded percentage of the area maximum.
    #[must_use]
    pub fn percent(&self) -> u8 {
        if self.max_points == 0 {
            return 0;
        }
        let pct = (f64::from(self.points) / f64::from(self.max_points) * 100.0).round();
        // points never exceed the catalog maximum, so this stays within u8
        pct.clamp(0.0, 100.0) as u8
    }

    /// Certificate eligibility: at least half of the area's points.
    ///
    /// Pure derivation; safe to recompute on every view.
    #[must_use]
    pub fn certificate_eligible(&self) -> bool {
        self.percent() >= 50
    }
}

/// A learner's registry entry. The code is issued once by the external
/// access-control surface; totals are derived aggregates rewritten on every
/// submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LearnerRecord {
    code: LearnerCode,
    name: String,
    total_points: u32,
    overall_progress: u8,
    created_at: DateTime<Utc>,
}

impl LearnerRecord {
    /// Creates a fresh learner record with zeroed totals.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::EmptyName` if the display name is blank.
    pub fn new(
        code: LearnerCode,
        name: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, ProgressError> {
        Self::from_persisted(code, name, 0, 0, created_at)
    }

    /// Rehydrates a learner record from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError` if the name is blank or `overall_progress`
    /// exceeds 100.
    pub fn from_persisted(
        code: LearnerCode,
        name: impl Into<String>,
        total_points: u32,
        overall_progress: u8,
        created_at: DateTime<Utc>,
    ) -> Result<Self, ProgressError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ProgressError::EmptyName);
        }
        if overall_progress > 100 {
            return Err(ProgressError::ProgressOutOfRange {
                value: overall_progress,
            });
        }
        Ok(Self {
            code,
            name,
            total_points,
            overall_progress,
            created_at,
        })
    }

    #[must_use]
    pub fn code(&self) -> &LearnerCode {
        &self.code
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn total_points(&self) -> u32 {
        self.total_points
    }

    #[must_use]
    pub fn overall_progress(&self) -> u8 {
        self.overall_progress
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Overwrites the derived totals. Values above 100 percent are clamped.
    pub fn set_score_totals(&mut self, total_points: u32, overall_progress: u8) {
        self.total_points = total_points;
        self.overall_progress = overall_progress.min(100);
    }
}

/// Recomputes a learner's derived totals from their module records.
///
/// Total points is the plain sum of module scores; overall progress is that
/// sum as a rounded percentage of the area maximum.
#[must_use]
pub fn score_totals(
    area: &LearningArea,
    records: &BTreeMap<ModuleId, ModuleProgress>,
) -> (u32, u8) {
    let progress = AreaProgress::compute(area, records);
    (progress.points(), progress.percent())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        AnswerOption, AnswerValue, AreaId, Module, ModuleKind, Question, QuestionKind,
    };
    use crate::time::fixed_now;
    use chrono::Duration;

    fn answers_with(ordinal: u32, value: AnswerValue) -> AnswerSet {
        let mut set = AnswerSet::new();
        set.set_question(ordinal, value);
        set
    }

    #[test]
    fn merge_preserves_fields_absent_from_patch() {
        let now = fixed_now();
        let stored = ModuleProgress::from_persisted(
            false,
            40,
            1,
            answers_with(0, AnswerValue::SingleText("A".into())),
            now,
        )
        .unwrap();

        let patch = ProgressPatch::new(now + Duration::seconds(5))
            .with_answers(answers_with(1, AnswerValue::SingleText("B".into())));
        let merged = patch.apply_to(Some(&stored)).unwrap();

        // untouched fields survive
        assert_eq!(merged.score(), 40);
        assert!(!merged.is_completed());
        assert_eq!(merged.progress(), 1);
        // the patched field is replaced wholesale
        assert!(merged.answers().question(0).is_none());
        assert_eq!(
            merged.answers().question(1),
            Some(&AnswerValue::SingleText("B".into()))
        );
        assert_eq!(merged.last_updated(), now + Duration::seconds(5));
    }

    #[test]
    fn stale_patch_is_skipped() {
        let now = fixed_now();
        let stored =
            ModuleProgress::from_persisted(false, 10, 1, AnswerSet::new(), now).unwrap();
        let stale = ProgressPatch::new(now - Duration::seconds(1)).with_score(99);
        assert!(stale.apply_to(Some(&stored)).is_none());

        // equal timestamps still apply (idempotent re-write)
        let equal = ProgressPatch::new(now).with_score(11);
        assert_eq!(equal.apply_to(Some(&stored)).unwrap().score(), 11);
    }

    #[test]
    fn patch_against_absent_record_uses_started_defaults() {
        let now = fixed_now();
        let merged = ProgressPatch::new(now)
            .with_answers(answers_with(0, AnswerValue::SingleText("A".into())))
            .apply_to(None)
            .unwrap();
        assert!(!merged.is_completed());
        assert_eq!(merged.score(), 0);
        assert_eq!(merged.progress(), 1);
    }

    fn tiny_area() -> LearningArea {
        let question = Question::new(
            0,
            "Q",
            QuestionKind::Knowledge,
            vec![
                AnswerOption::new("Right", true),
                AnswerOption::new("Wrong", false),
            ],
        )
        .unwrap();
        let m1 = Module::new(
            ModuleId::new("one").unwrap(),
            "One",
            ModuleKind::Knowledge,
            100,
            vec![question.clone()],
            Vec::new(),
        )
        .unwrap();
        let m2 = Module::new(
            ModuleId::new("two").unwrap(),
            "Two",
            ModuleKind::Knowledge,
            100,
            vec![question],
            Vec::new(),
        )
        .unwrap();
        LearningArea::new(AreaId::new("area").unwrap(), "Area", vec![m1, m2]).unwrap()
    }

    #[test]
    fn area_progress_counts_points_and_completion() {
        let area = tiny_area();
        let now = fixed_now();
        let mut records = BTreeMap::new();
        records.insert(
            ModuleId::new("one").unwrap(),
            ModuleProgress::from_persisted(true, 80, 100, AnswerSet::new(), now).unwrap(),
        );

        let progress = AreaProgress::compute(&area, &records);
        assert_eq!(progress.completed(), 1);
        assert_eq!(progress.total(), 2);
        assert_eq!(progress.points(), 80);
        assert_eq!(progress.max_points(), 200);
        assert_eq!(progress.percent(), 40);
        assert!(!progress.certificate_eligible());
    }

    #[test]
    fn certificate_threshold_is_half_the_area_maximum() {
        let area = tiny_area();
        let now = fixed_now();
        let mut records = BTreeMap::new();
        records.insert(
            ModuleId::new("one").unwrap(),
            ModuleProgress::from_persisted(true, 100, 100, AnswerSet::new(), now).unwrap(),
        );
        // exactly 50 percent qualifies
        let progress = AreaProgress::compute(&area, &records);
        assert_eq!(progress.percent(), 50);
        assert!(progress.certificate_eligible());
    }

    #[test]
    fn learner_record_validates_and_updates_totals() {
        let code = LearnerCode::new("LERN-1").unwrap();
        assert!(LearnerRecord::new(code.clone(), "  ", fixed_now()).is_err());

        let mut record = LearnerRecord::new(code, "Alex", fixed_now()).unwrap();
        record.set_score_totals(260, 65);
        assert_eq!(record.total_points(), 260);
        assert_eq!(record.overall_progress(), 65);
    }
}
