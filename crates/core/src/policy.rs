//! Per-module-kind behavior: step sequence, advance guards and scoring.
//!
//! One policy object per `ModuleKind`, selected once at module load with
//! [`policy_for`]. The session controller consults the policy instead of
//! branching on module identity.

use crate::model::{AnswerSet, ModuleKind, Question, QuestionKind, ShuffledModule};
use crate::scoring;
use crate::steps::{ModuleStep, StepSequence};

/// The capabilities one module kind plugs into the session controller.
pub trait ModulePolicy: Send + Sync {
    /// The linear step sequence this kind walks, shaped by the module
    /// (an intro step exists only when the module has intro media).
    fn sequence(&self, module: &ShuffledModule) -> StepSequence;

    /// The step a fresh session starts on.
    fn initial_step(&self, module: &ShuffledModule) -> ModuleStep {
        self.sequence(module).first()
    }

    /// Whether the learner may advance out of `step`. Backward navigation is
    /// never guarded.
    fn can_advance(&self, step: ModuleStep, module: &ShuffledModule, answers: &AnswerSet) -> bool;

    /// Computes the module score from the full position-keyed answer set.
    fn score(&self, answers: &AnswerSet, module: &ShuffledModule) -> u32;
}

/// Selects the policy for a module kind.
#[must_use]
pub fn policy_for(kind: ModuleKind) -> &'static dyn ModulePolicy {
    match kind {
        ModuleKind::Knowledge => &KnowledgePolicy,
        ModuleKind::Reflection => &ReflectionPolicy,
        ModuleKind::Survey => &SurveyPolicy,
        ModuleKind::Terminology { .. } => &TerminologyPolicy,
    }
}

fn content_then(module: &ShuffledModule, tail: &[ModuleStep]) -> StepSequence {
    let mut steps = Vec::with_capacity(tail.len() + 2);
    if module.has_intro_video() {
        steps.push(ModuleStep::Intro);
    }
    steps.push(ModuleStep::Interactive);
    steps.extend_from_slice(tail);
    StepSequence::new(steps)
}

fn all_answered<'a>(
    answers: &AnswerSet,
    mut questions: impl Iterator<Item = &'a Question>,
) -> bool {
    questions.all(|q| answers.question(q.ordinal()).is_some())
}

/// Default kind: quiz scored by correctness.
struct KnowledgePolicy;

impl ModulePolicy for KnowledgePolicy {
    fn sequence(&self, module: &ShuffledModule) -> StepSequence {
        content_then(module, &[ModuleStep::Quiz, ModuleStep::Results])
    }

    fn can_advance(&self, step: ModuleStep, module: &ShuffledModule, answers: &AnswerSet) -> bool {
        match step {
            ModuleStep::Quiz => all_answered(
                answers,
                module.questions().iter().filter(|q| q.kind().is_answerable()),
            ),
            _ => true,
        }
    }

    fn score(&self, answers: &AnswerSet, module: &ShuffledModule) -> u32 {
        scoring::correctness_weighted(answers, module)
    }
}

/// Reflection kind: same flow as knowledge, scored by participation.
struct ReflectionPolicy;

impl ModulePolicy for ReflectionPolicy {
    fn sequence(&self, module: &ShuffledModule) -> StepSequence {
        content_then(module, &[ModuleStep::Quiz, ModuleStep::Results])
    }

    fn can_advance(&self, step: ModuleStep, module: &ShuffledModule, answers: &AnswerSet) -> bool {
        match step {
            ModuleStep::Quiz => all_answered(
                answers,
                module.questions().iter().filter(|q| q.kind().is_answerable()),
            ),
            _ => true,
        }
    }

    fn score(&self, answers: &AnswerSet, module: &ShuffledModule) -> u32 {
        scoring::participation_weighted(answers, module)
    }
}

/// Survey kind: external survey embed plus confirmation checkpoints, scored
/// with the composite pools.
struct SurveyPolicy;

impl ModulePolicy for SurveyPolicy {
    fn sequence(&self, module: &ShuffledModule) -> StepSequence {
        content_then(module, &[ModuleStep::Survey, ModuleStep::Results])
    }

    fn can_advance(&self, step: ModuleStep, module: &ShuffledModule, answers: &AnswerSet) -> bool {
        match step {
            ModuleStep::Survey => all_answered(
                answers,
                module
                    .questions()
                    .iter()
                    .filter(|q| q.kind() == QuestionKind::Knowledge),
            ),
            _ => true,
        }
    }

    fn score(&self, answers: &AnswerSet, module: &ShuffledModule) -> u32 {
        scoring::composite_survey(answers, module)
    }
}

/// Terminology kind: a pinned terminology quiz precedes the content, a
/// sampled knowledge check follows it.
struct TerminologyPolicy;

impl TerminologyPolicy {
    fn pinned_prefix(module: &ShuffledModule) -> u32 {
        match module.kind() {
            ModuleKind::Terminology { pinned_prefix, .. } => pinned_prefix,
            _ => 0,
        }
    }
}

impl ModulePolicy for TerminologyPolicy {
    fn sequence(&self, _module: &ShuffledModule) -> StepSequence {
        StepSequence::new(vec![
            ModuleStep::TerminologyQuiz,
            ModuleStep::Interactive,
            ModuleStep::KnowledgeCheck,
            ModuleStep::Quiz,
            ModuleStep::Results,
        ])
    }

    fn can_advance(&self, step: ModuleStep, module: &ShuffledModule, answers: &AnswerSet) -> bool {
        let prefix = Self::pinned_prefix(module);
        match step {
            ModuleStep::TerminologyQuiz => all_answered(
                answers,
                module.questions().iter().filter(|q| q.ordinal() < prefix),
            ),
            ModuleStep::KnowledgeCheck => module
                .knowledge_check_ids()
                .iter()
                .all(|id| answers.accordion(id).is_some()),
            ModuleStep::Quiz => all_answered(
                answers,
                module
                    .questions()
                    .iter()
                    .filter(|q| q.ordinal() >= prefix && q.kind().is_answerable()),
            ),
            _ => true,
        }
    }

    fn score(&self, answers: &AnswerSet, module: &ShuffledModule) -> u32 {
        scoring::correctness_weighted(answers, module)
    }
}
