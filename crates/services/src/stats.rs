//! Platform-wide and per-area statistics.

use std::collections::BTreeMap;
use std::sync::Arc;

use assess_core::model::{AreaId, ModuleId};
use storage::repository::{BadgeRepository, FeedbackRepository, LearnerRepository};

use crate::error::AggregateError;

/// Headline numbers across all learners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformSummary {
    pub learners: u64,
    pub badges_issued: u64,
    /// Learners at or past half the area points.
    pub certificate_eligible: u64,
}

/// Statistics over the learners who filed overall feedback for one area.
#[derive(Debug, Clone, PartialEq)]
pub struct AreaFeedbackStats {
    pub respondents: u64,
    /// Mean total points of the feedback givers, rounded.
    pub average_points: u32,
    /// Mean satisfaction rating, one decimal.
    pub average_satisfaction: f64,
    /// Most-named favorite module; ties go to the smaller id.
    pub favorite_module: Option<ModuleId>,
    /// Percent of recommendation ratings at 4 or above, rounded.
    pub recommend_rate: u8,
}

/// Read-only reporting over the registry, badges and feedback.
#[derive(Clone)]
pub struct StatisticsService {
    learners: Arc<dyn LearnerRepository>,
    badges: Arc<dyn BadgeRepository>,
    feedback: Arc<dyn FeedbackRepository>,
}

impl StatisticsService {
    #[must_use]
    pub fn new(
        learners: Arc<dyn LearnerRepository>,
        badges: Arc<dyn BadgeRepository>,
        feedback: Arc<dyn FeedbackRepository>,
    ) -> Self {
        Self {
            learners,
            badges,
            feedback,
        }
    }

    /// Counts learners, issued badges and certificate-eligible learners.
    ///
    /// # Errors
    ///
    /// Returns `AggregateError::Storage` if the registry or badges cannot be
    /// read.
    pub async fn platform_summary(&self) -> Result<PlatformSummary, AggregateError> {
        let learners = self.learners.list_learners().await?;
        let badges_issued = self.badges.count_badges().await?;
        let certificate_eligible = learners
            .iter()
            .filter(|record| record.overall_progress() >= 50)
            .count() as u64;
        Ok(PlatformSummary {
            learners: learners.len() as u64,
            badges_issued,
            certificate_eligible,
        })
    }

    /// Aggregates one area's overall feedback.
    ///
    /// Zero respondents come back as an all-zero record with no favorite.
    ///
    /// # Errors
    ///
    /// Returns `AggregateError::Storage` if the feedback or a giver's record
    /// cannot be read.
    pub async fn area_feedback_stats(
        &self,
        area: &AreaId,
    ) -> Result<AreaFeedbackStats, AggregateError> {
        let entries = self.feedback.list_feedback_for_area(area).await?;
        if entries.is_empty() {
            return Ok(AreaFeedbackStats {
                respondents: 0,
                average_points: 0,
                average_satisfaction: 0.0,
                favorite_module: None,
                recommend_rate: 0,
            });
        }

        let mut points_sum = 0_u64;
        let mut satisfaction_sum = 0_u64;
        let mut recommends = 0_u64;
        let mut favorites: BTreeMap<&ModuleId, u64> = BTreeMap::new();
        for (learner, feedback) in &entries {
            let record = self.learners.get_learner(learner).await?;
            points_sum += u64::from(record.total_points());
            satisfaction_sum += u64::from(feedback.satisfaction());
            if feedback.recommends() {
                recommends += 1;
            }
            *favorites.entry(feedback.favorite_module()).or_default() += 1;
        }

        let n = entries.len() as f64;
        // ascending iteration plus a strict comparison keeps the smaller id
        // on ties
        let mut favorite_module: Option<ModuleId> = None;
        let mut best = 0_u64;
        for (id, count) in &favorites {
            if *count > best {
                best = *count;
                favorite_module = Some((*id).clone());
            }
        }
        Ok(AreaFeedbackStats {
            respondents: entries.len() as u64,
            average_points: (points_sum as f64 / n).round() as u32,
            average_satisfaction: (satisfaction_sum as f64 * 10.0 / n).round() / 10.0,
            favorite_module,
            recommend_rate: (recommends as f64 * 100.0 / n).round() as u8,
        })
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use assess_core::model::{Badge, LearnerCode, LearnerRecord, OverallFeedback};
    use assess_core::time::fixed_now;
    use storage::repository::InMemoryRepository;

    fn service(repo: &Arc<InMemoryRepository>) -> StatisticsService {
        StatisticsService::new(repo.clone(), repo.clone(), repo.clone())
    }

    async fn register(repo: &InMemoryRepository, code: &str, points: u32, percent: u8) {
        let learner = LearnerCode::new(code).unwrap();
        let record = LearnerRecord::new(learner.clone(), code, fixed_now()).unwrap();
        repo.create_learner(&record).await.unwrap();
        repo.set_score_totals(&learner, points, percent).await.unwrap();
    }

    async fn file_feedback(
        repo: &InMemoryRepository,
        code: &str,
        satisfaction: u8,
        favorite: &str,
        recommend: u8,
    ) {
        let feedback = OverallFeedback::new(
            satisfaction,
            ModuleId::new(favorite).unwrap(),
            recommend,
            fixed_now(),
        )
        .unwrap();
        repo.insert_overall_feedback(
            &LearnerCode::new(code).unwrap(),
            &AreaId::new("health").unwrap(),
            &feedback,
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn platform_summary_counts_learners_badges_and_eligibility() {
        let repo = Arc::new(InMemoryRepository::new());
        register(&repo, "AAA111", 120, 60).await;
        register(&repo, "BBB222", 100, 50).await;
        register(&repo, "CCC333", 30, 15).await;
        for code in ["AAA111", "BBB222"] {
            let badge = Badge::new(
                ModuleId::new("hygiene").unwrap(),
                "Hand Hygiene",
                LearnerCode::new(code).unwrap(),
                fixed_now(),
            );
            repo.insert_badge(&badge).await.unwrap();
        }

        let summary = service(&repo).platform_summary().await.unwrap();
        assert_eq!(summary.learners, 3);
        assert_eq!(summary.badges_issued, 2);
        assert_eq!(summary.certificate_eligible, 2);
    }

    #[tokio::test]
    async fn feedback_stats_average_mode_and_recommend_rate() {
        let repo = Arc::new(InMemoryRepository::new());
        register(&repo, "AAA111", 120, 60).await;
        register(&repo, "BBB222", 80, 40).await;
        register(&repo, "CCC333", 40, 20).await;
        file_feedback(&repo, "AAA111", 5, "hygiene", 5).await;
        file_feedback(&repo, "BBB222", 4, "nutrition", 4).await;
        file_feedback(&repo, "CCC333", 2, "hygiene", 2).await;

        let stats = service(&repo)
            .area_feedback_stats(&AreaId::new("health").unwrap())
            .await
            .unwrap();
        assert_eq!(stats.respondents, 3);
        assert_eq!(stats.average_points, 80);
        assert!((stats.average_satisfaction - 3.7).abs() < f64::EPSILON);
        assert_eq!(stats.favorite_module, Some(ModuleId::new("hygiene").unwrap()));
        assert_eq!(stats.recommend_rate, 67);
    }

    #[tokio::test]
    async fn no_feedback_means_empty_stats() {
        let repo = Arc::new(InMemoryRepository::new());
        let stats = service(&repo)
            .area_feedback_stats(&AreaId::new("health").unwrap())
            .await
            .unwrap();
        assert_eq!(stats.respondents, 0);
        assert_eq!(stats.favorite_module, None);
        assert_eq!(stats.recommend_rate, 0);
    }
}
