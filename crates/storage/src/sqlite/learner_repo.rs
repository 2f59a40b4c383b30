use assess_core::model::{LearnerCode, LearnerRecord};

use super::{SqliteRepository, mapping::map_learner_row};
use crate::repository::{LearnerRepository, StorageError};

#[async_trait::async_trait]
impl LearnerRepository for SqliteRepository {
    async fn create_learner(&self, learner: &LearnerRecord) -> Result<(), StorageError> {
        let result = sqlx::query(
            r"
            INSERT INTO learners (code, name, total_points, overall_progress, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
        )
        .bind(learner.code().as_str())
        .bind(learner.name())
        .bind(i64::from(learner.total_points()))
        .bind(i64::from(learner.overall_progress()))
        .bind(learner.created_at())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if e.as_database_error().is_some_and(|d| d.is_unique_violation()) => {
                Err(StorageError::Conflict)
            }
            Err(e) => Err(StorageError::Connection(e.to_string())),
        }
    }

    async fn get_learner(&self, code: &LearnerCode) -> Result<LearnerRecord, StorageError> {
        let row = sqlx::query(
            r"
            SELECT code, name, total_points, overall_progress, created_at
            FROM learners
            WHERE code = ?1
            ",
        )
        .bind(code.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        match row {
            Some(row) => map_learner_row(&row),
            None => Err(StorageError::NotFound),
        }
    }

    async fn list_learners(&self) -> Result<Vec<LearnerRecord>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT code, name, total_points, overall_progress, created_at
            FROM learners
            ORDER BY code ASC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut learners = Vec::with_capacity(rows.len());
        for row in rows {
            learners.push(map_learner_row(&row)?);
        }
        Ok(learners)
    }

    async fn set_score_totals(
        &self,
        code: &LearnerCode,
        total_points: u32,
        overall_progress: u8,
    ) -> Result<(), StorageError> {
        let result = sqlx::query(
            r"
            UPDATE learners
            SET total_points = ?2, overall_progress = ?3
            WHERE code = ?1
            ",
        )
        .bind(code.as_str())
        .bind(i64::from(total_points))
        .bind(i64::from(overall_progress.min(100)))
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }
}
