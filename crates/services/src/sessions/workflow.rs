//! Module lifecycle writes: start marks, submission and reset.

use std::sync::Arc;

use assess_core::model::{
    AnswerValue, Badge, LearnerCode, LearningArea, MergeOutcome, ModuleId, ProgressPatch, Question,
    ResponseEvent, score_totals,
};
use assess_core::time::Clock;
use storage::repository::{
    BadgeRepository, EventRepository, LearnerRepository, ProgressRepository,
};

use super::service::ModuleSession;
use crate::error::SubmissionError;

/// Orchestrates the persisted module lifecycle around a [`ModuleSession`].
///
/// Submission is the single path that marks a module completed: it scores the
/// session, merges the final record, issues the badge, rewrites the learner's
/// totals and appends the response events. Already-completed modules are
/// never rescored; a repeat submit returns the stored score and writes
/// nothing.
#[derive(Clone)]
pub struct SubmissionService {
    clock: Clock,
    learners: Arc<dyn LearnerRepository>,
    progress: Arc<dyn ProgressRepository>,
    badges: Arc<dyn BadgeRepository>,
    events: Arc<dyn EventRepository>,
}

impl SubmissionService {
    #[must_use]
    pub fn new(
        clock: Clock,
        learners: Arc<dyn LearnerRepository>,
        progress: Arc<dyn ProgressRepository>,
        badges: Arc<dyn BadgeRepository>,
        events: Arc<dyn EventRepository>,
    ) -> Self {
        Self {
            clock,
            learners,
            progress,
            badges,
            events,
        }
    }

    /// Marks a module as touched the first time a learner opens it.
    ///
    /// An absent record or one still at progress 0 is bumped to 1 percent;
    /// anything further along is left alone.
    ///
    /// # Errors
    ///
    /// Returns `SubmissionError::Storage` if the record cannot be read or
    /// written.
    pub async fn mark_started(
        &self,
        learner: &LearnerCode,
        module: &ModuleId,
    ) -> Result<(), SubmissionError> {
        let stored = self.progress.module_progress(learner, module).await?;
        if stored.is_some_and(|p| p.progress() > 0) {
            return Ok(());
        }
        let patch = ProgressPatch::new(self.clock.now()).with_progress(1);
        self.progress
            .merge_module_progress(learner, module, &patch)
            .await?;
        Ok(())
    }

    /// Submits a finished session and returns the module score.
    ///
    /// If the stored record is already completed the stored score comes back
    /// untouched and no write happens. Otherwise the session must be
    /// submittable; the score is computed from the answers, the record is
    /// merged as completed, the badge is issued if absent, the learner's
    /// totals are recomputed and one response event is appended per answered
    /// question. The session itself moves to its results step.
    ///
    /// # Errors
    ///
    /// Returns `SubmissionError::UnknownModule` if the module is not part of
    /// `area`, `SubmissionError::NotReady` if the session's step guard still
    /// holds, and `SubmissionError::Storage` for persistence failures.
    pub async fn submit(
        &self,
        session: &mut ModuleSession,
        learner: &LearnerCode,
        area: &LearningArea,
    ) -> Result<u32, SubmissionError> {
        let module_id = session.module().module_id().clone();
        let module = area
            .module(&module_id)
            .ok_or_else(|| SubmissionError::UnknownModule(module_id.to_string()))?;

        let stored = self.progress.module_progress(learner, &module_id).await?;
        if let Some(stored) = stored {
            if stored.is_completed() {
                session.complete();
                return Ok(stored.score());
            }
        }
        if !session.submittable() {
            return Err(SubmissionError::NotReady);
        }

        let now = self.clock.now();
        let score = session.score();
        let patch = session
            .patch(now)
            .with_completed(true)
            .with_score(score)
            .with_progress(100);
        let outcome = self
            .progress
            .merge_module_progress(learner, &module_id, &patch)
            .await?;
        if outcome == MergeOutcome::Stale {
            tracing::warn!("submission write for {} lost to a newer record", module_id);
        }

        let badge = Badge::new(module_id.clone(), module.title(), learner.clone(), now);
        self.badges.insert_badge(&badge).await?;

        self.rewrite_totals(learner, area).await?;

        let events = response_events(session, learner, now);
        self.events.append_events(&events).await?;

        session.complete();
        Ok(score)
    }

    /// Wipes a module back to untouched and recomputes the learner's totals.
    ///
    /// Badges already issued stay issued.
    ///
    /// # Errors
    ///
    /// Returns `SubmissionError::Storage` if the reset cannot be written.
    pub async fn reset(
        &self,
        learner: &LearnerCode,
        module: &ModuleId,
        area: &LearningArea,
    ) -> Result<(), SubmissionError> {
        self.progress
            .reset_module_progress(learner, module, self.clock.now())
            .await?;
        self.rewrite_totals(learner, area).await?;
        Ok(())
    }

    async fn rewrite_totals(
        &self,
        learner: &LearnerCode,
        area: &LearningArea,
    ) -> Result<(), SubmissionError> {
        let records = self.progress.all_module_progress(learner).await?;
        let (points, percent) = score_totals(area, &records);
        self.learners
            .set_score_totals(learner, points, percent)
            .await?;
        Ok(())
    }
}

/// One event per answered question, carrying the option display texts the
/// learner picked in this session's layout.
fn response_events(
    session: &ModuleSession,
    learner: &LearnerCode,
    at: chrono::DateTime<chrono::Utc>,
) -> Vec<ResponseEvent> {
    let module_id = session.module().module_id();
    let mut events = Vec::new();
    for (&ordinal, value) in session.answers().questions() {
        let Some(question) = session.module().question_by_ordinal(ordinal) else {
            continue;
        };
        events.push(ResponseEvent::record(
            learner.clone(),
            module_id.clone(),
            ordinal,
            question.prompt(),
            selected_texts(question, value),
            at,
        ));
    }
    events
}

fn selected_texts(question: &Question, value: &AnswerValue) -> Vec<String> {
    let text_at = |position: u32| {
        question
            .options()
            .get(position as usize)
            .map(|o| o.text().to_owned())
    };
    match value {
        AnswerValue::SingleIndex(position) => text_at(*position).into_iter().collect(),
        AnswerValue::MultiIndex(positions) => {
            positions.iter().copied().filter_map(text_at).collect()
        }
        AnswerValue::SingleText(text) => vec![text.clone()],
        AnswerValue::MultiText(texts) => texts.clone(),
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
