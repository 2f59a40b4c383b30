use assess_core::model::{
    AnswerSet, AnswerValue, Badge, LearnerCode, LearnerRecord, ModuleId, ModuleProgress,
    OverallFeedback,
};
use sqlx::Row;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn i64_to_u32(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} out of range")))
}

fn i64_to_u8(field: &'static str, v: i64) -> Result<u8, StorageError> {
    u8::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} out of range")))
}

pub(crate) fn learner_code_from_str(raw: &str) -> Result<LearnerCode, StorageError> {
    LearnerCode::new(raw).map_err(ser)
}

pub(crate) fn module_id_from_str(raw: &str) -> Result<ModuleId, StorageError> {
    ModuleId::new(raw).map_err(ser)
}

pub(crate) fn map_learner_row(row: &sqlx::sqlite::SqliteRow) -> Result<LearnerRecord, StorageError> {
    let code = learner_code_from_str(&row.try_get::<String, _>("code").map_err(ser)?)?;
    let name: String = row.try_get("name").map_err(ser)?;
    let total_points = i64_to_u32("total_points", row.try_get("total_points").map_err(ser)?)?;
    let overall_progress =
        i64_to_u8("overall_progress", row.try_get("overall_progress").map_err(ser)?)?;
    LearnerRecord::from_persisted(
        code,
        name,
        total_points,
        overall_progress,
        row.try_get("created_at").map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_badge_row(row: &sqlx::sqlite::SqliteRow) -> Result<Badge, StorageError> {
    Ok(Badge::new(
        module_id_from_str(&row.try_get::<String, _>("module_id").map_err(ser)?)?,
        row.try_get::<String, _>("module_title").map_err(ser)?,
        learner_code_from_str(&row.try_get::<String, _>("learner_code").map_err(ser)?)?,
        row.try_get("issued_at").map_err(ser)?,
    ))
}

pub(crate) fn map_feedback_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<(LearnerCode, OverallFeedback), StorageError> {
    let code = learner_code_from_str(&row.try_get::<String, _>("learner_code").map_err(ser)?)?;
    let feedback = OverallFeedback::new(
        i64_to_u8("satisfaction", row.try_get("satisfaction").map_err(ser)?)?,
        module_id_from_str(&row.try_get::<String, _>("favorite_module").map_err(ser)?)?,
        i64_to_u8("would_recommend", row.try_get("would_recommend").map_err(ser)?)?,
        row.try_get("submitted_at").map_err(ser)?,
    )
    .map_err(ser)?;
    Ok((code, feedback))
}

/// Builds a progress record from its row plus the matching answer rows.
pub(crate) fn map_progress_row(
    row: &sqlx::sqlite::SqliteRow,
    answers: AnswerSet,
) -> Result<ModuleProgress, StorageError> {
    ModuleProgress::from_persisted(
        row.try_get("completed").map_err(ser)?,
        i64_to_u32("score", row.try_get("score").map_err(ser)?)?,
        i64_to_u8("progress", row.try_get("progress").map_err(ser)?)?,
        answers,
        row.try_get("last_updated").map_err(ser)?,
    )
    .map_err(ser)
}

/// Flattens one answer value into per-selection rows as
/// `(multi, value_kind, value)` tuples.
pub(crate) fn answer_value_rows(value: &AnswerValue) -> Vec<(bool, &'static str, String)> {
    match value {
        AnswerValue::SingleIndex(i) => vec![(false, "index", i.to_string())],
        AnswerValue::MultiIndex(is) => {
            is.iter().map(|i| (true, "index", i.to_string())).collect()
        }
        AnswerValue::SingleText(t) => vec![(false, "text", t.clone())],
        AnswerValue::MultiText(ts) => ts.iter().map(|t| (true, "text", t.clone())).collect(),
    }
}

fn build_answer_value(
    multi: bool,
    value_kind: &str,
    values: Vec<String>,
) -> Result<AnswerValue, StorageError> {
    if !multi && values.len() != 1 {
        return Err(StorageError::Serialization(format!(
            "single answer with {} rows",
            values.len()
        )));
    }
    match value_kind {
        "index" => {
            let indices = values
                .iter()
                .map(|v| v.parse::<u32>().map_err(ser))
                .collect::<Result<Vec<u32>, StorageError>>()?;
            if multi {
                Ok(AnswerValue::MultiIndex(indices))
            } else {
                Ok(AnswerValue::SingleIndex(indices[0]))
            }
        }
        "text" => {
            if multi {
                Ok(AnswerValue::MultiText(values))
            } else {
                Ok(AnswerValue::SingleText(
                    values.into_iter().next().unwrap_or_default(),
                ))
            }
        }
        other => Err(StorageError::Serialization(format!(
            "invalid value kind: {other}"
        ))),
    }
}

/// Rebuilds an answer set from per-selection rows ordered by
/// `(target_kind, target_key, position)`.
pub(crate) fn collect_answer_set(
    rows: &[sqlx::sqlite::SqliteRow],
) -> Result<AnswerSet, StorageError> {
    let mut set = AnswerSet::new();
    let mut i = 0;
    while i < rows.len() {
        let target_kind: String = rows[i].try_get("target_kind").map_err(ser)?;
        let target_key: String = rows[i].try_get("target_key").map_err(ser)?;

        let mut multi = false;
        let mut value_kind: Option<String> = None;
        let mut values: Vec<String> = Vec::new();
        while i < rows.len() {
            let row = &rows[i];
            let kind: String = row.try_get("target_kind").map_err(ser)?;
            let key: String = row.try_get("target_key").map_err(ser)?;
            if kind != target_kind || key != target_key {
                break;
            }
            multi = row.try_get("multi").map_err(ser)?;
            let vk: String = row.try_get("value_kind").map_err(ser)?;
            if value_kind.as_ref().is_some_and(|k| *k != vk) {
                return Err(StorageError::Serialization(format!(
                    "mixed value kinds for answer {target_key}"
                )));
            }
            value_kind = Some(vk);
            values.push(row.try_get("value").map_err(ser)?);
            i += 1;
        }

        let value = build_answer_value(multi, value_kind.as_deref().unwrap_or(""), values)?;
        match target_kind.as_str() {
            "question" => {
                let ordinal: u32 = target_key.parse().map_err(ser)?;
                set.set_question(ordinal, value);
            }
            "accordion" => set.set_accordion(target_key, value),
            other => {
                return Err(StorageError::Serialization(format!(
                    "invalid answer target kind: {other}"
                )));
            }
        }
    }
    Ok(set)
}
