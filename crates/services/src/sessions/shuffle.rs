//! Builds the per-session presentation order of a module.
//!
//! The catalog is never mutated; every shuffle works on copies. What gets
//! shuffled depends on the module kind:
//!
//! - `Knowledge` / `Reflection`: question order and option order.
//! - `Terminology`: the first `pinned_prefix` questions keep their position
//!   (only their options are shuffled), the rest are shuffled freely; a
//!   random sample of control-bearing accordion items becomes this session's
//!   knowledge check.
//! - `Survey`: question order is kept; options are shuffled except for
//!   external-embed and results-view questions, whose option lists carry
//!   fixed meaning.
//!
//! Accordion item order is never shuffled. Control question options always
//! are.

use rand::Rng;
use rand::rng;
use rand::seq::SliceRandom;

use assess_core::model::{
    AccordionItem, AnswerOption, Module, ModuleKind, Question, QuestionKind, SessionStateError,
    ShuffledModule,
};

/// Builds this session's presentation state for a module using thread-local
/// randomness.
///
/// # Errors
///
/// Returns `SessionStateError` if the shuffled parts fail session-state
/// validation. With a well-formed `Module` this does not happen.
pub fn shuffle_module(module: &Module) -> Result<ShuffledModule, SessionStateError> {
    let mut rng = rng();
    shuffle_module_with(module, &mut rng)
}

/// Same as [`shuffle_module`] with a caller-provided source of randomness,
/// which makes layouts reproducible.
///
/// # Errors
///
/// Returns `SessionStateError` if the shuffled parts fail session-state
/// validation.
pub fn shuffle_module_with<R: Rng + ?Sized>(
    module: &Module,
    rng: &mut R,
) -> Result<ShuffledModule, SessionStateError> {
    let questions = shuffled_questions(module, rng);
    let accordion = shuffled_accordion(module, rng);
    let knowledge_check = sampled_knowledge_check(module, rng);
    ShuffledModule::from_parts(module, questions, accordion, knowledge_check)
}

fn with_shuffled_options<R: Rng + ?Sized>(question: &Question, rng: &mut R) -> Question {
    match question.kind() {
        QuestionKind::Survey | QuestionKind::SurveyResults => question.clone(),
        QuestionKind::Knowledge | QuestionKind::Feedback => {
            let mut options: Vec<AnswerOption> = question.options().to_vec();
            options.shuffle(rng);
            question.with_option_order(options)
        }
    }
}

fn shuffled_questions<R: Rng + ?Sized>(module: &Module, rng: &mut R) -> Vec<Question> {
    let mut questions: Vec<Question> = module
        .questions()
        .iter()
        .map(|q| with_shuffled_options(q, rng))
        .collect();

    match module.kind() {
        ModuleKind::Knowledge | ModuleKind::Reflection => questions.shuffle(rng),
        ModuleKind::Terminology { pinned_prefix, .. } => {
            // the prefix teaches in order; only the tail moves
            if let Some(tail) = questions.get_mut(pinned_prefix as usize..) {
                tail.shuffle(rng);
            }
        }
        ModuleKind::Survey => {}
    }
    questions
}

fn shuffled_accordion<R: Rng + ?Sized>(module: &Module, rng: &mut R) -> Vec<AccordionItem> {
    module
        .accordion()
        .iter()
        .map(|item| match item.control() {
            Some(control) => {
                let mut options = control.options().to_vec();
                options.shuffle(rng);
                item.with_control_order(control.with_option_order(options))
            }
            None => item.clone(),
        })
        .collect()
}

fn sampled_knowledge_check<R: Rng + ?Sized>(module: &Module, rng: &mut R) -> Vec<String> {
    let ModuleKind::Terminology {
        knowledge_check_size,
        ..
    } = module.kind()
    else {
        return Vec::new();
    };

    let mut candidates: Vec<String> = module
        .accordion()
        .iter()
        .filter(|item| item.control().is_some())
        .map(|item| item.id().to_owned())
        .collect();
    candidates.shuffle(rng);
    candidates.truncate(usize::try_from(knowledge_check_size).unwrap_or(usize::MAX));
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use assess_core::model::{ControlQuestion, ModuleId};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn options(texts: &[&str]) -> Vec<AnswerOption> {
        texts
            .iter()
            .enumerate()
            .map(|(i, text)| AnswerOption::new(*text, i == 0))
            .collect()
    }

    fn knowledge_question(ordinal: u32) -> Question {
        Question::new(
            ordinal,
            format!("Question {ordinal}"),
            QuestionKind::Knowledge,
            options(&["Alpha", "Beta", "Gamma", "Delta"]),
        )
        .unwrap()
    }

    fn item_with_control(id: &str) -> AccordionItem {
        AccordionItem::new(id, format!("Panel {id}"), "Body")
            .unwrap()
            .with_control(
                ControlQuestion::new("Check", options(&["True", "False", "Maybe"])).unwrap(),
            )
    }

    fn knowledge_module(question_count: u32) -> Module {
        let questions = (0..question_count).map(knowledge_question).collect();
        Module::new(
            ModuleId::new("quiz").unwrap(),
            "Quiz",
            ModuleKind::Knowledge,
            100,
            questions,
            vec![item_with_control("panel-a"), item_with_control("panel-b")],
        )
        .unwrap()
    }

    fn terminology_module() -> Module {
        let questions = (0..6).map(knowledge_question).collect();
        Module::new(
            ModuleId::new("terms").unwrap(),
            "Terms",
            ModuleKind::Terminology {
                pinned_prefix: 2,
                knowledge_check_size: 2,
            },
            100,
            questions,
            vec![
                item_with_control("panel-a"),
                item_with_control("panel-b"),
                AccordionItem::new("plain", "No control", "Body").unwrap(),
                item_with_control("panel-c"),
            ],
        )
        .unwrap()
    }

    fn survey_module() -> Module {
        let survey = Question::new(2, "External part", QuestionKind::Survey, Vec::new()).unwrap();
        let results = Question::new(
            3,
            "Results viewed",
            QuestionKind::SurveyResults,
            options(&["Seen"]),
        )
        .unwrap();
        let questions = vec![
            knowledge_question(0),
            Question::new(
                1,
                "How was it?",
                QuestionKind::Feedback,
                options(&["Good", "Fine", "Poor"]),
            )
            .unwrap(),
            survey,
            results,
        ];
        Module::new(
            ModuleId::new("survey").unwrap(),
            "Survey",
            ModuleKind::Survey,
            45,
            questions,
            Vec::new(),
        )
        .unwrap()
    }

    fn sorted_texts(options: &[AnswerOption]) -> Vec<String> {
        let mut texts: Vec<String> = options.iter().map(|o| o.text().to_owned()).collect();
        texts.sort();
        texts
    }

    #[test]
    fn shuffle_is_a_permutation_of_the_catalog() {
        let module = knowledge_module(5);
        let mut rng = StdRng::seed_from_u64(7);
        let shuffled = shuffle_module_with(&module, &mut rng).unwrap();

        assert_eq!(shuffled.questions().len(), 5);
        for original in module.questions() {
            let seen = shuffled
                .question_by_ordinal(original.ordinal())
                .expect("every ordinal survives");
            assert_eq!(sorted_texts(seen.options()), sorted_texts(original.options()));
        }
    }

    #[test]
    fn terminology_pins_the_teaching_prefix() {
        let module = terminology_module();
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let shuffled = shuffle_module_with(&module, &mut rng).unwrap();
            assert_eq!(shuffled.questions()[0].ordinal(), 0);
            assert_eq!(shuffled.questions()[1].ordinal(), 1);
        }
    }

    #[test]
    fn survey_keeps_question_order_and_fixed_option_kinds() {
        let module = survey_module();
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let shuffled = shuffle_module_with(&module, &mut rng).unwrap();

            let ordinals: Vec<u32> =
                shuffled.questions().iter().map(Question::ordinal).collect();
            assert_eq!(ordinals, vec![0, 1, 2, 3]);

            let results = shuffled.question_by_ordinal(3).unwrap();
            assert_eq!(results.options()[0].text(), "Seen");
        }
    }

    #[test]
    fn accordion_order_never_moves() {
        let module = terminology_module();
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let shuffled = shuffle_module_with(&module, &mut rng).unwrap();
            let ids: Vec<&str> = shuffled.accordion().iter().map(AccordionItem::id).collect();
            assert_eq!(ids, vec!["panel-a", "panel-b", "plain", "panel-c"]);

            let control = shuffled.accordion()[0].control().unwrap();
            assert_eq!(
                sorted_texts(control.options()),
                vec!["False", "Maybe", "True"]
            );
        }
    }

    #[test]
    fn knowledge_check_samples_only_control_bearing_items() {
        let module = terminology_module();
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let shuffled = shuffle_module_with(&module, &mut rng).unwrap();
            let ids = shuffled.knowledge_check_ids();
            assert_eq!(ids.len(), 2);
            assert!(!ids.contains(&"plain".to_owned()));
        }
    }

    #[test]
    fn non_terminology_kinds_sample_nothing() {
        let module = knowledge_module(3);
        let mut rng = StdRng::seed_from_u64(3);
        let shuffled = shuffle_module_with(&module, &mut rng).unwrap();
        assert!(shuffled.knowledge_check_ids().is_empty());
    }
}
