//! Learner-facing progress reads and overall feedback submission.

use std::sync::Arc;

use assess_core::model::{
    AreaId, AreaProgress, LearnerCode, LearningArea, ModuleId, OverallFeedback,
};
use assess_core::time::Clock;
use storage::repository::{FeedbackRepository, ProgressRepository};

use crate::error::ProgressServiceError;

/// Assembles progress views and accepts the one-time area feedback.
#[derive(Clone)]
pub struct ProgressService {
    clock: Clock,
    progress: Arc<dyn ProgressRepository>,
    feedback: Arc<dyn FeedbackRepository>,
}

impl ProgressService {
    #[must_use]
    pub fn new(
        clock: Clock,
        progress: Arc<dyn ProgressRepository>,
        feedback: Arc<dyn FeedbackRepository>,
    ) -> Self {
        Self {
            clock,
            progress,
            feedback,
        }
    }

    /// Derives the learner's standing across one area from the stored
    /// per-module records.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if the records cannot be read.
    pub async fn area_progress(
        &self,
        learner: &LearnerCode,
        area: &LearningArea,
    ) -> Result<AreaProgress, ProgressServiceError> {
        let records = self.progress.all_module_progress(learner).await?;
        Ok(AreaProgress::compute(area, &records))
    }

    /// Whether the learner has earned the area certificate (half the points).
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if the records cannot be read.
    pub async fn certificate_eligible(
        &self,
        learner: &LearnerCode,
        area: &LearningArea,
    ) -> Result<bool, ProgressServiceError> {
        Ok(self.area_progress(learner, area).await?.certificate_eligible())
    }

    /// Files the learner's overall feedback for an area, once.
    ///
    /// Returns `false` when feedback already exists; the stored ratings are
    /// never overwritten.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Feedback` if a rating falls outside
    /// 1..=5 and `ProgressServiceError::Storage` if the write fails.
    pub async fn submit_overall_feedback(
        &self,
        learner: &LearnerCode,
        area: &AreaId,
        satisfaction: u8,
        favorite_module: ModuleId,
        would_recommend: u8,
    ) -> Result<bool, ProgressServiceError> {
        let feedback = OverallFeedback::new(
            satisfaction,
            favorite_module,
            would_recommend,
            self.clock.now(),
        )?;
        let inserted = self
            .feedback
            .insert_overall_feedback(learner, area, &feedback)
            .await?;
        Ok(inserted)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use assess_core::model::{
        AnswerOption, Module, ModuleKind, ProgressPatch, Question, QuestionKind,
    };
    use assess_core::time::{fixed_clock, fixed_now};
    use storage::repository::InMemoryRepository;

    fn module(id: &str, max_points: u32) -> Module {
        let options = vec![
            AnswerOption::new("Right", true),
            AnswerOption::new("Wrong", false),
        ];
        Module::new(
            ModuleId::new(id).unwrap(),
            id.to_uppercase(),
            ModuleKind::Knowledge,
            max_points,
            vec![Question::new(0, "Prompt", QuestionKind::Knowledge, options).unwrap()],
            Vec::new(),
        )
        .unwrap()
    }

    fn area() -> LearningArea {
        LearningArea::new(
            AreaId::new("health").unwrap(),
            "Health Basics",
            vec![module("hygiene", 100), module("nutrition", 100)],
        )
        .unwrap()
    }

    fn service(repo: &Arc<InMemoryRepository>) -> ProgressService {
        ProgressService::new(fixed_clock(), repo.clone(), repo.clone())
    }

    async fn store_score(repo: &InMemoryRepository, learner: &LearnerCode, id: &str, score: u32) {
        let patch = ProgressPatch::new(fixed_now())
            .with_completed(true)
            .with_score(score)
            .with_progress(100);
        repo.merge_module_progress(learner, &ModuleId::new(id).unwrap(), &patch)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn area_progress_counts_only_recorded_modules() {
        let repo = Arc::new(InMemoryRepository::new());
        let learner = LearnerCode::new("ABC123").unwrap();
        store_score(&repo, &learner, "hygiene", 80).await;

        let progress = service(&repo)
            .area_progress(&learner, &area())
            .await
            .unwrap();
        assert_eq!(progress.completed(), 1);
        assert_eq!(progress.total(), 2);
        assert_eq!(progress.points(), 80);
        assert_eq!(progress.percent(), 40);
    }

    #[tokio::test]
    async fn certificate_opens_at_half_the_points() {
        let repo = Arc::new(InMemoryRepository::new());
        let learner = LearnerCode::new("ABC123").unwrap();
        let service = service(&repo);

        store_score(&repo, &learner, "hygiene", 99).await;
        assert!(!service.certificate_eligible(&learner, &area()).await.unwrap());

        store_score(&repo, &learner, "nutrition", 1).await;
        // exactly 50 percent qualifies
        assert!(service.certificate_eligible(&learner, &area()).await.unwrap());
    }

    #[tokio::test]
    async fn overall_feedback_is_write_once() {
        let repo = Arc::new(InMemoryRepository::new());
        let learner = LearnerCode::new("ABC123").unwrap();
        let area_id = AreaId::new("health").unwrap();
        let favorite = ModuleId::new("hygiene").unwrap();
        let service = service(&repo);

        let first = service
            .submit_overall_feedback(&learner, &area_id, 5, favorite.clone(), 4)
            .await
            .unwrap();
        assert!(first);

        let second = service
            .submit_overall_feedback(&learner, &area_id, 1, favorite, 1)
            .await
            .unwrap();
        assert!(!second);

        let stored = repo
            .overall_feedback(&learner, &area_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.satisfaction(), 5);
        assert!(stored.recommends());
    }

    #[tokio::test]
    async fn feedback_ratings_are_validated() {
        let repo = Arc::new(InMemoryRepository::new());
        let learner = LearnerCode::new("ABC123").unwrap();
        let result = service(&repo)
            .submit_overall_feedback(
                &learner,
                &AreaId::new("health").unwrap(),
                0,
                ModuleId::new("hygiene").unwrap(),
                3,
            )
            .await;
        assert!(matches!(result, Err(ProgressServiceError::Feedback(_))));
    }
}
