//! Response distributions across all learners of a module.
//!
//! Aggregation reads the append-only response events and counts selected
//! option texts against a presentation layout, so the rows line up with
//! whatever order the caller is showing. Texts that no longer match any
//! option stay in the selection total but get no row, which keeps the
//! percentages honest when the catalog has moved on.

use std::sync::Arc;

use assess_core::model::ShuffledModule;
use storage::repository::EventRepository;

use crate::error::AggregateError;

/// One option row of a question's distribution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionDistribution {
    pub text: String,
    pub count: u64,
    /// Integer percent of all selections, rounded down.
    pub percent: u8,
}

/// Aggregated responses for one question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionDistribution {
    pub ordinal: u32,
    pub prompt: String,
    /// Events recorded for this question.
    pub respondents: u64,
    /// Selected texts across all events, matched or not.
    pub total_selections: u64,
    pub options: Vec<OptionDistribution>,
}

/// Computes per-question response distributions for a module.
#[derive(Clone)]
pub struct Aggregator {
    events: Arc<dyn EventRepository>,
}

impl Aggregator {
    #[must_use]
    pub fn new(events: Arc<dyn EventRepository>) -> Self {
        Self { events }
    }

    /// Distributions for every question of `layout`, in layout order.
    ///
    /// Option rows follow the layout's option order. Events whose ordinal no
    /// longer exists in the layout are ignored; a question without events
    /// comes back with all-zero rows.
    ///
    /// # Errors
    ///
    /// Returns `AggregateError::Storage` if the event log cannot be read.
    pub async fn module_distributions(
        &self,
        layout: &ShuffledModule,
    ) -> Result<Vec<QuestionDistribution>, AggregateError> {
        let events = self.events.events_for_module(layout.module_id()).await?;

        let mut distributions = Vec::with_capacity(layout.questions().len());
        for question in layout.questions() {
            let mut respondents = 0_u64;
            let mut total_selections = 0_u64;
            let mut counts = vec![0_u64; question.options().len()];
            for event in events
                .iter()
                .filter(|e| e.question_ordinal() == question.ordinal())
            {
                respondents += 1;
                for text in event.selected() {
                    total_selections += 1;
                    if let Some(i) = question.options().iter().position(|o| o.text() == text) {
                        counts[i] += 1;
                    }
                }
            }

            let options = question
                .options()
                .iter()
                .zip(counts)
                .map(|(option, count)| OptionDistribution {
                    text: option.text().to_owned(),
                    count,
                    percent: percent_of(count, total_selections),
                })
                .collect();
            distributions.push(QuestionDistribution {
                ordinal: question.ordinal(),
                prompt: question.prompt().to_owned(),
                respondents,
                total_selections,
                options,
            });
        }
        Ok(distributions)
    }
}

/// `count * 100 / total`, rounded down. Zero total means zero percent.
fn percent_of(count: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    // count never exceeds total, so the quotient fits in u8
    u8::try_from(count * 100 / total).unwrap_or(100)
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use assess_core::model::{
        AnswerOption, LearnerCode, Module, ModuleId, ModuleKind, Question, QuestionKind,
        ResponseEvent,
    };
    use assess_core::time::fixed_now;
    use storage::repository::InMemoryRepository;

    fn module() -> Module {
        let options = vec![
            AnswerOption::new("Soap", true),
            AnswerOption::new("Sand", false),
            AnswerOption::new("Salt", false),
        ];
        Module::new(
            ModuleId::new("hygiene").unwrap(),
            "Hand Hygiene",
            ModuleKind::Knowledge,
            100,
            vec![Question::new(0, "What cleans?", QuestionKind::Knowledge, options).unwrap()],
            Vec::new(),
        )
        .unwrap()
    }

    fn event(learner: &str, selected: &[&str]) -> ResponseEvent {
        ResponseEvent::record(
            LearnerCode::new(learner).unwrap(),
            ModuleId::new("hygiene").unwrap(),
            0,
            "What cleans?",
            selected.iter().map(|s| (*s).to_owned()).collect(),
            fixed_now(),
        )
    }

    #[tokio::test]
    async fn counts_follow_the_layout_option_order() {
        let repo = Arc::new(InMemoryRepository::new());
        repo.append_events(&[
            event("AAA111", &["Soap"]),
            event("BBB222", &["Sand", "Soap"]),
            event("CCC333", &["Ash"]),
        ])
        .await
        .unwrap();

        let layout = ShuffledModule::unshuffled(&module());
        let distributions = Aggregator::new(repo)
            .module_distributions(&layout)
            .await
            .unwrap();

        assert_eq!(distributions.len(), 1);
        let d = &distributions[0];
        assert_eq!(d.respondents, 3);
        // the retired "Ash" text still counts toward the denominator
        assert_eq!(d.total_selections, 4);
        assert_eq!(d.options[0].text, "Soap");
        assert_eq!(d.options[0].count, 2);
        assert_eq!(d.options[0].percent, 50);
        assert_eq!(d.options[1].count, 1);
        assert_eq!(d.options[1].percent, 25);
        assert_eq!(d.options[2].count, 0);
        assert_eq!(d.options[2].percent, 0);

        let sum: u32 = d.options.iter().map(|o| u32::from(o.percent)).sum();
        assert!(sum <= 100);
    }

    #[tokio::test]
    async fn no_events_means_all_zeros() {
        let repo = Arc::new(InMemoryRepository::new());
        let layout = ShuffledModule::unshuffled(&module());
        let distributions = Aggregator::new(repo)
            .module_distributions(&layout)
            .await
            .unwrap();

        let d = &distributions[0];
        assert_eq!(d.respondents, 0);
        assert_eq!(d.total_selections, 0);
        assert!(d.options.iter().all(|o| o.count == 0 && o.percent == 0));
    }
}
