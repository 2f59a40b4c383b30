use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A learner's answer to one question or control question.
///
/// Index variants are position-keyed: they index into the *current session's*
/// shuffled option order. They are also the legacy persisted format written by
/// an earlier codec version, which stored raw indices. Text variants are the
/// current persisted format, keyed by option content so they survive
/// re-shuffling.
///
/// The untagged serde representation accepts all four shapes on read, with
/// numeric (legacy) shapes tried first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    SingleIndex(u32),
    MultiIndex(Vec<u32>),
    SingleText(String),
    MultiText(Vec<String>),
}

impl AnswerValue {
    /// True for the position-keyed (or legacy persisted) index shapes.
    #[must_use]
    pub fn is_position(&self) -> bool {
        matches!(self, AnswerValue::SingleIndex(_) | AnswerValue::MultiIndex(_))
    }

    /// True for the content-keyed text shapes.
    #[must_use]
    pub fn is_content(&self) -> bool {
        matches!(self, AnswerValue::SingleText(_) | AnswerValue::MultiText(_))
    }

    #[must_use]
    pub fn is_multi(&self) -> bool {
        matches!(self, AnswerValue::MultiIndex(_) | AnswerValue::MultiText(_))
    }

    /// The selected positions, if this is an index shape.
    #[must_use]
    pub fn positions(&self) -> Option<Vec<u32>> {
        match self {
            AnswerValue::SingleIndex(i) => Some(vec![*i]),
            AnswerValue::MultiIndex(is) => Some(is.clone()),
            _ => None,
        }
    }

    /// The selected contents, if this is a text shape.
    #[must_use]
    pub fn texts(&self) -> Option<Vec<String>> {
        match self {
            AnswerValue::SingleText(t) => Some(vec![t.clone()]),
            AnswerValue::MultiText(ts) => Some(ts.clone()),
            _ => None,
        }
    }
}

/// All answers collected for one module: question answers keyed by the
/// question's stable ordinal, accordion control answers keyed by item id.
///
/// The same container holds position-keyed values during a session and
/// content-keyed values in persistence; the codec converts whole sets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerSet {
    questions: BTreeMap<u32, AnswerValue>,
    accordion: BTreeMap<String, AnswerValue>,
}

impl AnswerSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_question(&mut self, ordinal: u32, value: AnswerValue) {
        self.questions.insert(ordinal, value);
    }

    pub fn set_accordion(&mut self, item_id: impl Into<String>, value: AnswerValue) {
        self.accordion.insert(item_id.into(), value);
    }

    #[must_use]
    pub fn question(&self, ordinal: u32) -> Option<&AnswerValue> {
        self.questions.get(&ordinal)
    }

    #[must_use]
    pub fn accordion(&self, item_id: &str) -> Option<&AnswerValue> {
        self.accordion.get(item_id)
    }

    pub fn questions(&self) -> impl Iterator<Item = (&u32, &AnswerValue)> {
        self.questions.iter()
    }

    pub fn accordion_answers(&self) -> impl Iterator<Item = (&String, &AnswerValue)> {
        self.accordion.iter()
    }

    #[must_use]
    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn accordion_count(&self) -> usize {
        self.accordion.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty() && self.accordion.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untagged_deserialization_prefers_legacy_indices() {
        let legacy: AnswerValue = serde_json::from_str("2").unwrap();
        assert_eq!(legacy, AnswerValue::SingleIndex(2));

        let legacy_multi: AnswerValue = serde_json::from_str("[0, 3]").unwrap();
        assert_eq!(legacy_multi, AnswerValue::MultiIndex(vec![0, 3]));

        let current: AnswerValue = serde_json::from_str("\"Option C\"").unwrap();
        assert_eq!(current, AnswerValue::SingleText("Option C".into()));

        let current_multi: AnswerValue = serde_json::from_str("[\"A\", \"B\"]").unwrap();
        assert_eq!(
            current_multi,
            AnswerValue::MultiText(vec!["A".into(), "B".into()])
        );
    }

    #[test]
    fn answer_set_keeps_question_and_accordion_answers_apart() {
        let mut set = AnswerSet::new();
        set.set_question(0, AnswerValue::SingleIndex(1));
        set.set_accordion("item-a", AnswerValue::SingleText("Yes".into()));

        assert_eq!(set.question(0), Some(&AnswerValue::SingleIndex(1)));
        assert_eq!(set.question(1), None);
        assert_eq!(
            set.accordion("item-a"),
            Some(&AnswerValue::SingleText("Yes".into()))
        );
        assert_eq!(set.question_count(), 1);
        assert_eq!(set.accordion_count(), 1);
        assert!(!set.is_empty());
    }
}
