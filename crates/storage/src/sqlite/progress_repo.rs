use std::collections::BTreeMap;

use assess_core::model::{
    AnswerValue, LearnerCode, MergeOutcome, ModuleId, ModuleProgress, ProgressPatch,
};
use chrono::{DateTime, Utc};
use sqlx::Row;

use super::{
    SqliteRepository,
    mapping::{answer_value_rows, collect_answer_set, map_progress_row, module_id_from_str, ser},
};
use crate::repository::{ProgressRepository, StorageError};

const SELECT_ANSWERS: &str = r"
    SELECT target_kind, target_key, multi, position, value_kind, value
    FROM module_answers
    WHERE learner_code = ?1 AND module_id = ?2
    ORDER BY target_kind ASC, target_key ASC, position ASC
";

async fn insert_answer_rows(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    learner: &LearnerCode,
    module: &ModuleId,
    target_kind: &str,
    target_key: &str,
    value: &AnswerValue,
) -> Result<(), StorageError> {
    for (position, (multi, value_kind, text)) in
        answer_value_rows(value).into_iter().enumerate()
    {
        sqlx::query(
            r"
            INSERT INTO module_answers (
                learner_code, module_id, target_kind, target_key,
                multi, position, value_kind, value
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ",
        )
        .bind(learner.as_str())
        .bind(module.as_str())
        .bind(target_kind)
        .bind(target_key)
        .bind(multi)
        .bind(
            i64::try_from(position)
                .map_err(|_| StorageError::Serialization("position overflow".into()))?,
        )
        .bind(value_kind)
        .bind(text)
        .execute(&mut **tx)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;
    }
    Ok(())
}

#[async_trait::async_trait]
impl ProgressRepository for SqliteRepository {
    async fn module_progress(
        &self,
        learner: &LearnerCode,
        module: &ModuleId,
    ) -> Result<Option<ModuleProgress>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT completed, score, progress, last_updated
            FROM module_progress
            WHERE learner_code = ?1 AND module_id = ?2
            ",
        )
        .bind(learner.as_str())
        .bind(module.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let answer_rows = sqlx::query(SELECT_ANSWERS)
            .bind(learner.as_str())
            .bind(module.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(Some(map_progress_row(
            &row,
            collect_answer_set(&answer_rows)?,
        )?))
    }

    async fn all_module_progress(
        &self,
        learner: &LearnerCode,
    ) -> Result<BTreeMap<ModuleId, ModuleProgress>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT module_id, completed, score, progress, last_updated
            FROM module_progress
            WHERE learner_code = ?1
            ORDER BY module_id ASC
            ",
        )
        .bind(learner.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut records = BTreeMap::new();
        for row in rows {
            let module =
                module_id_from_str(&row.try_get::<String, _>("module_id").map_err(ser)?)?;
            let answer_rows = sqlx::query(SELECT_ANSWERS)
                .bind(learner.as_str())
                .bind(module.as_str())
                .fetch_all(&self.pool)
                .await
                .map_err(|e| StorageError::Connection(e.to_string()))?;
            let record = map_progress_row(&row, collect_answer_set(&answer_rows)?)?;
            records.insert(module, record);
        }
        Ok(records)
    }

    async fn merge_module_progress(
        &self,
        learner: &LearnerCode,
        module: &ModuleId,
        patch: &ProgressPatch,
    ) -> Result<MergeOutcome, StorageError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let row = sqlx::query(
            r"
            SELECT completed, score, progress, last_updated
            FROM module_progress
            WHERE learner_code = ?1 AND module_id = ?2
            ",
        )
        .bind(learner.as_str())
        .bind(module.as_str())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let existing = match row {
            Some(row) => {
                let answer_rows = sqlx::query(SELECT_ANSWERS)
                    .bind(learner.as_str())
                    .bind(module.as_str())
                    .fetch_all(&mut *tx)
                    .await
                    .map_err(|e| StorageError::Connection(e.to_string()))?;
                Some(map_progress_row(&row, collect_answer_set(&answer_rows)?)?)
            }
            None => None,
        };

        // dropping the transaction on the stale path rolls back the read
        let Some(merged) = patch.apply_to(existing.as_ref()) else {
            return Ok(MergeOutcome::Stale);
        };

        sqlx::query(
            r"
            INSERT INTO module_progress (
                learner_code, module_id, completed, score, progress, last_updated
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(learner_code, module_id) DO UPDATE SET
                completed = excluded.completed,
                score = excluded.score,
                progress = excluded.progress,
                last_updated = excluded.last_updated
            ",
        )
        .bind(learner.as_str())
        .bind(module.as_str())
        .bind(merged.is_completed())
        .bind(i64::from(merged.score()))
        .bind(i64::from(merged.progress()))
        .bind(merged.last_updated())
        .execute(&mut *tx)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        // answer rows are rewritten only when the patch carries answers;
        // otherwise the stored rows already equal the merged set
        if patch.answers().is_some() {
            sqlx::query(
                r"
                DELETE FROM module_answers
                WHERE learner_code = ?1 AND module_id = ?2
                ",
            )
            .bind(learner.as_str())
            .bind(module.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

            for (&ordinal, value) in merged.answers().questions() {
                insert_answer_rows(
                    &mut tx,
                    learner,
                    module,
                    "question",
                    &ordinal.to_string(),
                    value,
                )
                .await?;
            }
            for (id, value) in merged.answers().accordion_answers() {
                insert_answer_rows(&mut tx, learner, module, "accordion", id, value).await?;
            }
        }

        tx.commit()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(MergeOutcome::Applied)
    }

    async fn reset_module_progress(
        &self,
        learner: &LearnerCode,
        module: &ModuleId,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let zeroed = ModuleProgress::zeroed(at);
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        sqlx::query(
            r"
            INSERT INTO module_progress (
                learner_code, module_id, completed, score, progress, last_updated
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(learner_code, module_id) DO UPDATE SET
                completed = excluded.completed,
                score = excluded.score,
                progress = excluded.progress,
                last_updated = excluded.last_updated
            ",
        )
        .bind(learner.as_str())
        .bind(module.as_str())
        .bind(zeroed.is_completed())
        .bind(i64::from(zeroed.score()))
        .bind(i64::from(zeroed.progress()))
        .bind(zeroed.last_updated())
        .execute(&mut *tx)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        sqlx::query(
            r"
            DELETE FROM module_answers
            WHERE learner_code = ?1 AND module_id = ?2
            ",
        )
        .bind(learner.as_str())
        .bind(module.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(())
    }
}
