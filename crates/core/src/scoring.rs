//! Score computation over a module's collected answers.
//!
//! All policies take position-keyed answers (already decoded against this
//! session's shuffle) plus the shuffled module, and return an integer score
//! in `[0, max_points]`. Scoring is a pure recomputation over the full
//! answer set; the submission guard upstream keeps completed modules from
//! being rescored.

use std::collections::BTreeSet;

use crate::model::{
    AccordionItem, AnswerOption, AnswerSet, AnswerValue, ControlQuestion, Question, QuestionKind,
    ShuffledModule,
};

/// Default policy: fraction of knowledge questions answered correctly.
///
/// When control questions exist the module splits into two equal pools,
/// question correctness and control correctness, each worth half of
/// `max_points` and rounded at the pool boundary. Multi-select questions
/// count as correct only when the selected set equals the correct set
/// exactly.
#[must_use]
pub fn correctness_weighted(answers: &AnswerSet, module: &ShuffledModule) -> u32 {
    let questions: Vec<&Question> = module
        .questions()
        .iter()
        .filter(|q| q.kind() == QuestionKind::Knowledge)
        .collect();
    let correct = questions
        .iter()
        .filter(|q| is_question_correct(q, answers.question(q.ordinal())))
        .count();

    let controls = control_pool(module);
    let max = f64::from(module.max_points());
    let score = if controls.is_empty() {
        pool_points(correct, questions.len(), max)
    } else {
        let control_correct = controls
            .iter()
            .filter(|(id, control)| is_control_correct(control, answers.accordion(id)))
            .count();
        pool_points(correct, questions.len(), max / 2.0)
            + pool_points(control_correct, controls.len(), max / 2.0)
    };
    score.min(module.max_points())
}

/// Participation policy: every answered question is worth the same share of
/// the points, whatever was chosen. With control questions present the
/// module splits into halves like the correctness policy, participation on
/// one side and control correctness on the other.
#[must_use]
pub fn participation_weighted(answers: &AnswerSet, module: &ShuffledModule) -> u32 {
    let questions: Vec<&Question> = module
        .questions()
        .iter()
        .filter(|q| q.kind().is_answerable())
        .collect();
    let answered = questions
        .iter()
        .filter(|q| answers.question(q.ordinal()).is_some())
        .count();

    let controls = control_pool(module);
    let max = f64::from(module.max_points());
    let score = if controls.is_empty() {
        pool_points(answered, questions.len(), max)
    } else {
        let control_correct = controls
            .iter()
            .filter(|(id, control)| is_control_correct(control, answers.accordion(id)))
            .count();
        pool_points(answered, questions.len(), max / 2.0)
            + pool_points(control_correct, controls.len(), max / 2.0)
    };
    score.min(module.max_points())
}

/// Composite policy for survey modules: four independent fixed pools summed.
///
/// 10 points per correct control question, 10 per answered knowledge
/// confirmation, 5 per answered results-view checkpoint, and a 20-point
/// feedback pool scaled by participation. Per-item shares may be fractional;
/// rounding happens per pool, never per item.
#[must_use]
pub fn composite_survey(answers: &AnswerSet, module: &ShuffledModule) -> u32 {
    let control_points: u32 = control_pool(module)
        .iter()
        .filter(|(id, control)| is_control_correct(control, answers.accordion(id)))
        .count() as u32
        * 10;

    let mut confirmation_points = 0_u32;
    let mut results_points = 0_u32;
    let mut feedback_total = 0_usize;
    let mut feedback_answered = 0_usize;
    for question in module.questions() {
        let answered = answers.question(question.ordinal()).is_some();
        match question.kind() {
            QuestionKind::Knowledge if answered => confirmation_points += 10,
            QuestionKind::SurveyResults if answered => results_points += 5,
            QuestionKind::Feedback => {
                feedback_total += 1;
                if answered {
                    feedback_answered += 1;
                }
            }
            _ => {}
        }
    }
    let feedback_points = pool_points(feedback_answered, feedback_total, 20.0);

    (control_points + confirmation_points + results_points + feedback_points)
        .min(module.max_points())
}

/// One pool's score: `hits / total` scaled to `pool`, rounded at the pool
/// boundary. An empty pool is worth nothing.
fn pool_points(hits: usize, total: usize, pool: f64) -> u32 {
    if total == 0 {
        return 0;
    }
    let exact = hits as f64 / total as f64 * pool;
    // non-negative and bounded by the pool size, so the cast is lossless
    exact.round() as u32
}

/// The control questions a module is scored against: the sampled knowledge
/// check when one exists, otherwise every accordion control question.
fn control_pool(module: &ShuffledModule) -> Vec<(&str, &ControlQuestion)> {
    let items: Vec<&AccordionItem> = if module.knowledge_check_ids().is_empty() {
        module.accordion().iter().collect()
    } else {
        module
            .knowledge_check_ids()
            .iter()
            .filter_map(|id| module.accordion_item(id))
            .collect()
    };
    items
        .into_iter()
        .filter_map(|item| item.control().map(|c| (item.id(), c)))
        .collect()
}

fn is_question_correct(question: &Question, answer: Option<&AnswerValue>) -> bool {
    let Some(positions) = answer.and_then(AnswerValue::positions) else {
        return false;
    };
    if question.is_multi_select() {
        let chosen: BTreeSet<u32> = positions.into_iter().collect();
        let correct: BTreeSet<u32> = question.correct_indices().into_iter().collect();
        !correct.is_empty() && chosen == correct
    } else {
        positions
            .first()
            .and_then(|&i| question.options().get(i as usize))
            .is_some_and(AnswerOption::is_correct)
    }
}

fn is_control_correct(control: &ControlQuestion, answer: Option<&AnswerValue>) -> bool {
    answer
        .and_then(AnswerValue::positions)
        .and_then(|positions| positions.first().copied())
        .and_then(|i| control.options().get(i as usize))
        .is_some_and(AnswerOption::is_correct)
}
