use assess_core::model::{LearnerCode, ModuleId, ResponseEvent};
use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use super::{
    SqliteRepository,
    mapping::{i64_to_u32, learner_code_from_str, module_id_from_str, ser},
};
use crate::repository::{EventRepository, StorageError};

/// Rows of one event, collected while walking the ordered result set.
struct EventRows {
    id: Uuid,
    learner: LearnerCode,
    module: ModuleId,
    question_ordinal: u32,
    question_text: String,
    selected: Vec<String>,
    recorded_at: DateTime<Utc>,
}

impl EventRows {
    fn into_event(self) -> ResponseEvent {
        ResponseEvent::from_persisted(
            self.id,
            self.learner,
            self.module,
            self.question_ordinal,
            self.question_text,
            self.selected,
            self.recorded_at,
        )
    }
}

#[async_trait::async_trait]
impl EventRepository for SqliteRepository {
    async fn append_events(&self, events: &[ResponseEvent]) -> Result<(), StorageError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        for event in events {
            for (position, text) in event.selected().iter().enumerate() {
                sqlx::query(
                    r"
                    INSERT INTO response_events (
                        event_id, position, learner_code, module_id,
                        question_ordinal, question_text, selected, recorded_at
                    )
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                    ",
                )
                .bind(event.id().to_string())
                .bind(
                    i64::try_from(position)
                        .map_err(|_| StorageError::Serialization("position overflow".into()))?,
                )
                .bind(event.learner_code().as_str())
                .bind(event.module_id().as_str())
                .bind(i64::from(event.question_ordinal()))
                .bind(event.question_text())
                .bind(text)
                .bind(event.recorded_at())
                .execute(&mut *tx)
                .await
                .map_err(|e| StorageError::Connection(e.to_string()))?;
            }
        }

        tx.commit()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(())
    }

    async fn events_for_module(
        &self,
        module: &ModuleId,
    ) -> Result<Vec<ResponseEvent>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT event_id, position, learner_code, module_id,
                   question_ordinal, question_text, selected, recorded_at
            FROM response_events
            WHERE module_id = ?1
            ORDER BY recorded_at ASC, event_id ASC, position ASC
            ",
        )
        .bind(module.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut events = Vec::new();
        let mut pending: Option<EventRows> = None;
        for row in &rows {
            let id =
                Uuid::parse_str(&row.try_get::<String, _>("event_id").map_err(ser)?)
                    .map_err(ser)?;
            let text: String = row.try_get("selected").map_err(ser)?;

            match pending.as_mut() {
                Some(open) if open.id == id => open.selected.push(text),
                _ => {
                    if let Some(done) = pending.take() {
                        events.push(done.into_event());
                    }
                    pending = Some(EventRows {
                        id,
                        learner: learner_code_from_str(
                            &row.try_get::<String, _>("learner_code").map_err(ser)?,
                        )?,
                        module: module_id_from_str(
                            &row.try_get::<String, _>("module_id").map_err(ser)?,
                        )?,
                        question_ordinal: i64_to_u32(
                            "question_ordinal",
                            row.try_get("question_ordinal").map_err(ser)?,
                        )?,
                        question_text: row.try_get("question_text").map_err(ser)?,
                        selected: vec![text],
                        recorded_at: row.try_get("recorded_at").map_err(ser)?,
                    });
                }
            }
        }
        if let Some(done) = pending.take() {
            events.push(done.into_event());
        }
        Ok(events)
    }
}
