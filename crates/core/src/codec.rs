//! Conversion between position-keyed session answers and content-keyed
//! persisted answers.
//!
//! In memory an answer is an index into this session's shuffled option list;
//! at rest it is the chosen option's display text, so a record written under
//! one shuffle reads back correctly under any other. Records written by the
//! earlier index-based codec are still accepted on read: a numeric value
//! passes through as a position untouched, taking precedence over text
//! lookup.

use crate::model::{AnswerOption, AnswerSet, AnswerValue, ShuffledModule};

/// Resolves a position-keyed answer to its content-keyed form against the
/// options as shuffled this session.
///
/// Indices that fall outside the option list are dropped with a warning
/// rather than persisted. Returns `None` when nothing survives. Values that
/// are already content-keyed pass through unchanged.
#[must_use]
pub fn encode_answer(answer: &AnswerValue, options: &[AnswerOption]) -> Option<AnswerValue> {
    match answer {
        AnswerValue::SingleIndex(index) => match option_text(options, *index) {
            Some(text) => Some(AnswerValue::SingleText(text)),
            None => {
                tracing::warn!("option index {} out of range, dropping answer", index);
                None
            }
        },
        AnswerValue::MultiIndex(indices) => {
            let texts: Vec<String> = indices
                .iter()
                .filter_map(|&index| {
                    let text = option_text(options, index);
                    if text.is_none() {
                        tracing::warn!("option index {} out of range, dropping selection", index);
                    }
                    text
                })
                .collect();
            if texts.is_empty() {
                None
            } else {
                Some(AnswerValue::MultiText(texts))
            }
        }
        AnswerValue::SingleText(_) | AnswerValue::MultiText(_) => Some(answer.clone()),
    }
}

/// Resolves a persisted answer back to a position against the options as
/// shuffled this session.
///
/// Numeric values are the legacy persisted format and pass through as
/// positions without text lookup. Text values resolve by exact comparison;
/// text with no match in the current option set (the catalog changed since
/// the record was written) is dropped and the question reads as unanswered.
#[must_use]
pub fn decode_answer(stored: &AnswerValue, options: &[AnswerOption]) -> Option<AnswerValue> {
    match stored {
        AnswerValue::SingleIndex(index) => {
            if (*index as usize) < options.len() {
                Some(AnswerValue::SingleIndex(*index))
            } else {
                tracing::warn!("legacy answer index {} out of range, dropping", index);
                None
            }
        }
        AnswerValue::MultiIndex(indices) => {
            let kept: Vec<u32> = indices
                .iter()
                .copied()
                .filter(|&index| {
                    let in_range = (index as usize) < options.len();
                    if !in_range {
                        tracing::warn!("legacy answer index {} out of range, dropping", index);
                    }
                    in_range
                })
                .collect();
            if kept.is_empty() {
                None
            } else {
                Some(AnswerValue::MultiIndex(kept))
            }
        }
        AnswerValue::SingleText(text) => match option_position(options, text) {
            Some(position) => Some(AnswerValue::SingleIndex(position)),
            None => {
                tracing::warn!("stored answer {:?} matches no current option, dropping", text);
                None
            }
        },
        AnswerValue::MultiText(texts) => {
            let positions: Vec<u32> = texts
                .iter()
                .filter_map(|text| {
                    let position = option_position(options, text);
                    if position.is_none() {
                        tracing::warn!(
                            "stored answer {:?} matches no current option, dropping",
                            text
                        );
                    }
                    position
                })
                .collect();
            if positions.is_empty() {
                None
            } else {
                Some(AnswerValue::MultiIndex(positions))
            }
        }
    }
}

fn option_text(options: &[AnswerOption], index: u32) -> Option<String> {
    options.get(index as usize).map(|o| o.text().to_owned())
}

fn option_position(options: &[AnswerOption], text: &str) -> Option<u32> {
    options
        .iter()
        .position(|o| o.text() == text)
        .and_then(|i| u32::try_from(i).ok())
}

/// Encodes a session's position-keyed answer set for persistence.
///
/// Question answers key by catalog ordinal, accordion answers by item id;
/// entries that reference nothing in the module are dropped with a warning.
#[must_use]
pub fn encode_set(answers: &AnswerSet, module: &ShuffledModule) -> AnswerSet {
    let mut encoded = AnswerSet::new();
    for (&ordinal, answer) in answers.questions() {
        let Some(question) = module.question_by_ordinal(ordinal) else {
            tracing::warn!("answer for unknown question ordinal {}, dropping", ordinal);
            continue;
        };
        if let Some(value) = encode_answer(answer, question.options()) {
            encoded.set_question(ordinal, value);
        }
    }
    for (id, answer) in answers.accordion_answers() {
        let Some(options) = control_options(module, id) else {
            continue;
        };
        if answer.is_multi() {
            tracing::warn!("multi-select answer for control question {:?}, dropping", id);
            continue;
        }
        if let Some(value) = encode_answer(answer, options) {
            encoded.set_accordion(id.clone(), value);
        }
    }
    encoded
}

/// Decodes a persisted answer set against this session's shuffled layout.
///
/// Whatever cannot be resolved (edited catalog text, out-of-range legacy
/// indices, vanished questions) reads as unanswered; nothing is fatal.
#[must_use]
pub fn decode_set(stored: &AnswerSet, module: &ShuffledModule) -> AnswerSet {
    let mut decoded = AnswerSet::new();
    for (&ordinal, answer) in stored.questions() {
        let Some(question) = module.question_by_ordinal(ordinal) else {
            tracing::warn!("stored answer for unknown question ordinal {}, dropping", ordinal);
            continue;
        };
        if let Some(value) = decode_answer(answer, question.options()) {
            decoded.set_question(ordinal, value);
        }
    }
    for (id, answer) in stored.accordion_answers() {
        let Some(options) = control_options(module, id) else {
            continue;
        };
        if answer.is_multi() {
            tracing::warn!("multi-select answer for control question {:?}, dropping", id);
            continue;
        }
        if let Some(value) = decode_answer(answer, options) {
            decoded.set_accordion(id.clone(), value);
        }
    }
    decoded
}

fn control_options<'a>(module: &'a ShuffledModule, id: &str) -> Option<&'a [AnswerOption]> {
    let Some(item) = module.accordion_item(id) else {
        tracing::warn!("answer for unknown accordion item {:?}, dropping", id);
        return None;
    };
    let Some(control) = item.control() else {
        tracing::warn!("answer for accordion item {:?} without control question, dropping", id);
        return None;
    };
    Some(control.options())
}
