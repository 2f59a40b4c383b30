use assess_core::model::{AreaId, LearnerCode, OverallFeedback};

use super::{SqliteRepository, mapping::map_feedback_row};
use crate::repository::{FeedbackRepository, StorageError};

#[async_trait::async_trait]
impl FeedbackRepository for SqliteRepository {
    async fn insert_overall_feedback(
        &self,
        learner: &LearnerCode,
        area: &AreaId,
        feedback: &OverallFeedback,
    ) -> Result<bool, StorageError> {
        let result = sqlx::query(
            r"
            INSERT OR IGNORE INTO overall_feedback (
                learner_code, area_id, satisfaction, favorite_module,
                would_recommend, submitted_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
        )
        .bind(learner.as_str())
        .bind(area.as_str())
        .bind(i64::from(feedback.satisfaction()))
        .bind(feedback.favorite_module().as_str())
        .bind(i64::from(feedback.would_recommend()))
        .bind(feedback.submitted_at())
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(result.rows_affected() == 1)
    }

    async fn overall_feedback(
        &self,
        learner: &LearnerCode,
        area: &AreaId,
    ) -> Result<Option<OverallFeedback>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT learner_code, satisfaction, favorite_module, would_recommend, submitted_at
            FROM overall_feedback
            WHERE learner_code = ?1 AND area_id = ?2
            ",
        )
        .bind(learner.as_str())
        .bind(area.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        row.map(|row| map_feedback_row(&row).map(|(_, feedback)| feedback))
            .transpose()
    }

    async fn list_feedback_for_area(
        &self,
        area: &AreaId,
    ) -> Result<Vec<(LearnerCode, OverallFeedback)>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT learner_code, satisfaction, favorite_module, would_recommend, submitted_at
            FROM overall_feedback
            WHERE area_id = ?1
            ORDER BY learner_code ASC
            ",
        )
        .bind(area.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        rows.iter().map(map_feedback_row).collect()
    }
}
