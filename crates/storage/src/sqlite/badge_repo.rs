use std::collections::BTreeMap;

use assess_core::model::{Badge, LearnerCode, ModuleId};
use sqlx::Row;

use super::{SqliteRepository, mapping::map_badge_row};
use crate::repository::{BadgeRepository, StorageError};

#[async_trait::async_trait]
impl BadgeRepository for SqliteRepository {
    async fn insert_badge(&self, badge: &Badge) -> Result<bool, StorageError> {
        let result = sqlx::query(
            r"
            INSERT OR IGNORE INTO badges (learner_code, module_id, module_title, issued_at)
            VALUES (?1, ?2, ?3, ?4)
            ",
        )
        .bind(badge.learner_code().as_str())
        .bind(badge.module_id().as_str())
        .bind(badge.module_title())
        .bind(badge.issued_at())
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(result.rows_affected() == 1)
    }

    async fn badges(
        &self,
        learner: &LearnerCode,
    ) -> Result<BTreeMap<ModuleId, Badge>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT learner_code, module_id, module_title, issued_at
            FROM badges
            WHERE learner_code = ?1
            ORDER BY module_id ASC
            ",
        )
        .bind(learner.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut badges = BTreeMap::new();
        for row in &rows {
            let badge = map_badge_row(row)?;
            badges.insert(badge.module_id().clone(), badge);
        }
        Ok(badges)
    }

    async fn count_badges(&self) -> Result<u64, StorageError> {
        let row = sqlx::query(
            r"
            SELECT COUNT(*) as count
            FROM badges
            ",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let count: i64 = row
            .try_get("count")
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}
