use thiserror::Error;

use crate::model::{AccordionItem, Module, ModuleId, ModuleKind, Question};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionStateError {
    #[error("shuffled questions are not a permutation of the module's questions")]
    QuestionSetMismatch,

    #[error("shuffled accordion does not match the module's item order")]
    AccordionMismatch,

    #[error("knowledge check references unknown or control-less item: {id}")]
    UnknownKnowledgeCheckId { id: String },

    #[error("knowledge check lists item twice: {id}")]
    DuplicateKnowledgeCheckId { id: String },
}

/// A module as presented in one session: questions in this session's order,
/// options re-ordered within each question, accordion items in catalog order
/// with control options re-ordered, and the sampled knowledge-check ids.
///
/// Built fresh on every module entry and discarded on navigation away, never
/// persisted. Each question still carries its stable catalog ordinal, which
/// is the key persisted answers use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShuffledModule {
    module_id: ModuleId,
    kind: ModuleKind,
    max_points: u32,
    has_intro_video: bool,
    questions: Vec<Question>,
    accordion: Vec<AccordionItem>,
    knowledge_check: Vec<String>,
}

impl ShuffledModule {
    /// Assembles the session state from shuffler output.
    ///
    /// # Errors
    ///
    /// Returns `SessionStateError` if `questions` is not a permutation of the
    /// module's questions, the accordion order deviates from the catalog, or
    /// `knowledge_check` names unknown/duplicate items.
    pub fn from_parts(
        module: &Module,
        questions: Vec<Question>,
        accordion: Vec<AccordionItem>,
        knowledge_check: Vec<String>,
    ) -> Result<Self, SessionStateError> {
        let mut seen_ordinals: Vec<u32> = questions.iter().map(Question::ordinal).collect();
        seen_ordinals.sort_unstable();
        let expected: Vec<u32> = module.questions().iter().map(Question::ordinal).collect();
        if seen_ordinals != expected {
            return Err(SessionStateError::QuestionSetMismatch);
        }

        if accordion.len() != module.accordion().len()
            || accordion
                .iter()
                .zip(module.accordion())
                .any(|(a, b)| a.id() != b.id())
        {
            return Err(SessionStateError::AccordionMismatch);
        }

        for (i, id) in knowledge_check.iter().enumerate() {
            if knowledge_check[..i].contains(id) {
                return Err(SessionStateError::DuplicateKnowledgeCheckId { id: id.clone() });
            }
            let has_control = accordion
                .iter()
                .any(|item| item.id() == id && item.control().is_some());
            if !has_control {
                return Err(SessionStateError::UnknownKnowledgeCheckId { id: id.clone() });
            }
        }

        Ok(Self {
            module_id: module.id().clone(),
            kind: module.kind(),
            max_points: module.max_points(),
            has_intro_video: module.intro_video().is_some(),
            questions,
            accordion,
            knowledge_check,
        })
    }

    /// A presentation state in plain catalog order, nothing shuffled.
    ///
    /// Useful for aggregation display and tests; real sessions go through the
    /// shuffler.
    #[must_use]
    pub fn unshuffled(module: &Module) -> Self {
        Self {
            module_id: module.id().clone(),
            kind: module.kind(),
            max_points: module.max_points(),
            has_intro_video: module.intro_video().is_some(),
            questions: module.questions().to_vec(),
            accordion: module.accordion().to_vec(),
            knowledge_check: Vec::new(),
        }
    }

    #[must_use]
    pub fn module_id(&self) -> &ModuleId {
        &self.module_id
    }

    #[must_use]
    pub fn kind(&self) -> ModuleKind {
        self.kind
    }

    #[must_use]
    pub fn max_points(&self) -> u32 {
        self.max_points
    }

    #[must_use]
    pub fn has_intro_video(&self) -> bool {
        self.has_intro_video
    }

    /// Questions in this session's presentation order.
    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn question_by_ordinal(&self, ordinal: u32) -> Option<&Question> {
        self.questions.iter().find(|q| q.ordinal() == ordinal)
    }

    /// Accordion items, always in catalog order.
    #[must_use]
    pub fn accordion(&self) -> &[AccordionItem] {
        &self.accordion
    }

    #[must_use]
    pub fn accordion_item(&self, id: &str) -> Option<&AccordionItem> {
        self.accordion.iter().find(|item| item.id() == id)
    }

    /// Item ids sampled for this session's knowledge check (empty for kinds
    /// without sampling).
    #[must_use]
    pub fn knowledge_check_ids(&self) -> &[String] {
        &self.knowledge_check
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AnswerOption, ControlQuestion, QuestionKind};

    fn module_with_two_questions() -> Module {
        let q0 = Question::new(
            0,
            "First",
            QuestionKind::Knowledge,
            vec![
                AnswerOption::new("Right", true),
                AnswerOption::new("Wrong", false),
            ],
        )
        .unwrap();
        let q1 = Question::new(
            1,
            "Second",
            QuestionKind::Knowledge,
            vec![
                AnswerOption::new("Yes", true),
                AnswerOption::new("No", false),
            ],
        )
        .unwrap();
        let item = AccordionItem::new("facts-1", "Facts", "Body")
            .unwrap()
            .with_control(
                ControlQuestion::new(
                    "Check",
                    vec![
                        AnswerOption::new("True", true),
                        AnswerOption::new("False", false),
                    ],
                )
                .unwrap(),
            );
        Module::new(
            ModuleId::new("sample").unwrap(),
            "Sample",
            ModuleKind::Knowledge,
            100,
            vec![q0, q1],
            vec![item],
        )
        .unwrap()
    }

    #[test]
    fn accepts_a_permutation_of_questions() {
        let module = module_with_two_questions();
        let reversed: Vec<Question> = module.questions().iter().rev().cloned().collect();
        let state = ShuffledModule::from_parts(
            &module,
            reversed,
            module.accordion().to_vec(),
            Vec::new(),
        )
        .unwrap();
        assert_eq!(state.questions()[0].ordinal(), 1);
        assert_eq!(state.question_by_ordinal(0).unwrap().prompt(), "First");
    }

    #[test]
    fn rejects_missing_question() {
        let module = module_with_two_questions();
        let only_one = vec![module.questions()[0].clone()];
        let err = ShuffledModule::from_parts(
            &module,
            only_one,
            module.accordion().to_vec(),
            Vec::new(),
        )
        .unwrap_err();
        assert_eq!(err, SessionStateError::QuestionSetMismatch);
    }

    #[test]
    fn rejects_knowledge_check_without_control() {
        let module = module_with_two_questions();
        let err = ShuffledModule::from_parts(
            &module,
            module.questions().to_vec(),
            module.accordion().to_vec(),
            vec!["missing".to_owned()],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            SessionStateError::UnknownKnowledgeCheckId { .. }
        ));
    }
}
