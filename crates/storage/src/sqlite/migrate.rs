use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Runs a single, consolidated migration for the current schema.
///
/// Creates the full schema (learners, module progress with per-selection
/// answer rows, badges, overall feedback, response events, and indexes).
#[allow(clippy::too_many_lines)]
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    // Version 1: full schema.
    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS learners (
                    code TEXT PRIMARY KEY,
                    name TEXT NOT NULL,
                    total_points INTEGER NOT NULL CHECK (total_points >= 0),
                    overall_progress INTEGER NOT NULL CHECK (overall_progress BETWEEN 0 AND 100),
                    created_at TEXT NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS module_progress (
                    learner_code TEXT NOT NULL,
                    module_id TEXT NOT NULL,
                    completed INTEGER NOT NULL CHECK (completed IN (0, 1)),
                    score INTEGER NOT NULL CHECK (score >= 0),
                    progress INTEGER NOT NULL CHECK (progress BETWEEN 0 AND 100),
                    last_updated TEXT NOT NULL,
                    PRIMARY KEY (learner_code, module_id),
                    FOREIGN KEY (learner_code) REFERENCES learners(code) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        // One row per selection. target_key is the question ordinal (as text)
        // or the accordion item id; value_kind marks legacy index rows.
        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS module_answers (
                    learner_code TEXT NOT NULL,
                    module_id TEXT NOT NULL,
                    target_kind TEXT NOT NULL CHECK (target_kind IN ('question', 'accordion')),
                    target_key TEXT NOT NULL,
                    multi INTEGER NOT NULL CHECK (multi IN (0, 1)),
                    position INTEGER NOT NULL CHECK (position >= 0),
                    value_kind TEXT NOT NULL CHECK (value_kind IN ('index', 'text')),
                    value TEXT NOT NULL,
                    PRIMARY KEY (learner_code, module_id, target_kind, target_key, position),
                    FOREIGN KEY (learner_code, module_id)
                        REFERENCES module_progress(learner_code, module_id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS badges (
                    learner_code TEXT NOT NULL,
                    module_id TEXT NOT NULL,
                    module_title TEXT NOT NULL,
                    issued_at TEXT NOT NULL,
                    PRIMARY KEY (learner_code, module_id),
                    FOREIGN KEY (learner_code) REFERENCES learners(code) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS overall_feedback (
                    learner_code TEXT NOT NULL,
                    area_id TEXT NOT NULL,
                    satisfaction INTEGER NOT NULL CHECK (satisfaction BETWEEN 1 AND 5),
                    favorite_module TEXT NOT NULL,
                    would_recommend INTEGER NOT NULL CHECK (would_recommend BETWEEN 1 AND 5),
                    submitted_at TEXT NOT NULL,
                    PRIMARY KEY (learner_code, area_id),
                    FOREIGN KEY (learner_code) REFERENCES learners(code) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        // One row per chosen option; rows of one event share an event_id.
        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS response_events (
                    event_id TEXT NOT NULL,
                    position INTEGER NOT NULL CHECK (position >= 0),
                    learner_code TEXT NOT NULL,
                    module_id TEXT NOT NULL,
                    question_ordinal INTEGER NOT NULL CHECK (question_ordinal >= 0),
                    question_text TEXT NOT NULL,
                    selected TEXT NOT NULL,
                    recorded_at TEXT NOT NULL,
                    PRIMARY KEY (event_id, position),
                    FOREIGN KEY (learner_code) REFERENCES learners(code) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_module_answers_record
                    ON module_answers (learner_code, module_id);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_response_events_module_question
                    ON response_events (module_id, question_ordinal);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_overall_feedback_area
                    ON overall_feedback (area_id);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
    }

    Ok(())
}
