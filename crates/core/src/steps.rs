//! Steps of the per-module session flow.
//!
//! Each module kind walks a linear subset of the full step set. Steps are
//! session-local and never persisted: a reload restarts at the module's
//! initial step while answers are restored separately.

use std::fmt;

/// One screen of the module flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleStep {
    /// Introductory media before the interactive content.
    Intro,
    /// Pinned terminology questions asked before the content is shown.
    TerminologyQuiz,
    /// The module's interactive content (accordion panels, embeds).
    Interactive,
    /// Sampled control questions over the accordion panels.
    KnowledgeCheck,
    /// Embedded external survey.
    Survey,
    /// The module's main quiz or feedback questionnaire.
    Quiz,
    /// Score and feedback; terminal, reached through submission.
    Results,
}

impl ModuleStep {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleStep::Intro => "intro",
            ModuleStep::TerminologyQuiz => "terminology-quiz",
            ModuleStep::Interactive => "interactive-content",
            ModuleStep::KnowledgeCheck => "knowledge-check",
            ModuleStep::Survey => "survey",
            ModuleStep::Quiz => "quiz",
            ModuleStep::Results => "results",
        }
    }
}

impl fmt::Display for ModuleStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The ordered steps one module session walks through.
///
/// Built once per module load by the module kind's policy; always non-empty
/// and ending in `Results`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepSequence {
    steps: Vec<ModuleStep>,
}

impl StepSequence {
    #[must_use]
    pub fn new(steps: Vec<ModuleStep>) -> Self {
        Self { steps }
    }

    #[must_use]
    pub fn steps(&self) -> &[ModuleStep] {
        &self.steps
    }

    /// The step a fresh session starts on.
    #[must_use]
    pub fn first(&self) -> ModuleStep {
        self.steps.first().copied().unwrap_or(ModuleStep::Results)
    }

    #[must_use]
    pub fn contains(&self, step: ModuleStep) -> bool {
        self.steps.contains(&step)
    }

    /// The step after `step`, or `None` at the end of the flow or for a step
    /// outside this sequence.
    #[must_use]
    pub fn next_after(&self, step: ModuleStep) -> Option<ModuleStep> {
        let at = self.steps.iter().position(|&s| s == step)?;
        self.steps.get(at + 1).copied()
    }

    /// The step before `step`, or `None` at the start of the flow or for a
    /// step outside this sequence.
    #[must_use]
    pub fn prev_before(&self, step: ModuleStep) -> Option<ModuleStep> {
        let at = self.steps.iter().position(|&s| s == step)?;
        at.checked_sub(1).map(|i| self.steps[i])
    }
}
