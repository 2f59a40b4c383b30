use thiserror::Error;
use url::Url;

use crate::model::{AreaId, ModuleId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CatalogError {
    #[error("question prompt is empty")]
    EmptyPrompt,

    #[error("option text is empty")]
    EmptyOptionText,

    #[error("duplicate option text within one question: {text}")]
    DuplicateOptionText { text: String },

    #[error("question has no options")]
    NoOptions,

    #[error("knowledge question has no correct option")]
    NoCorrectOption,

    #[error("question ordinals must be contiguous from zero (expected {expected}, found {found})")]
    NonContiguousOrdinals { expected: u32, found: u32 },

    #[error("accordion item id is empty or contains whitespace")]
    InvalidAccordionId,

    #[error("duplicate accordion item id: {id}")]
    DuplicateAccordionId { id: String },

    #[error("pinned prefix {prefix} exceeds question count {len}")]
    PinnedPrefixTooLong { prefix: u32, len: usize },

    #[error("title is empty")]
    EmptyTitle,

    #[error("max points must be positive")]
    ZeroMaxPoints,

    #[error("learning area has no modules")]
    EmptyArea,

    #[error("duplicate module id in area: {id}")]
    DuplicateModuleId { id: String },
}

/// Classification of a question within a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuestionKind {
    /// Scored against correct options.
    Knowledge,
    /// Opinion question; every option counts as valid participation.
    Feedback,
    /// Externally-hosted survey embed; answered outside the engine.
    Survey,
    /// Results-view checkpoint; auto-answered when the results are shown.
    SurveyResults,
}

impl QuestionKind {
    /// Whether answers to this kind are collected by the engine itself.
    #[must_use]
    pub fn is_answerable(&self) -> bool {
        !matches!(self, QuestionKind::Survey)
    }
}

/// One selectable option. Its display text is the content key under which
/// chosen answers are persisted, so texts must be unique within a question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerOption {
    text: String,
    correct: bool,
    feedback: Option<String>,
}

impl AnswerOption {
    #[must_use]
    pub fn new(text: impl Into<String>, correct: bool) -> Self {
        Self {
            text: text.into(),
            correct,
            feedback: None,
        }
    }

    /// Attaches explanatory feedback shown after answering.
    #[must_use]
    pub fn with_feedback(mut self, feedback: impl Into<String>) -> Self {
        self.feedback = Some(feedback.into());
        self
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn is_correct(&self) -> bool {
        self.correct
    }

    #[must_use]
    pub fn feedback(&self) -> Option<&str> {
        self.feedback.as_deref()
    }
}

fn validate_options(options: &[AnswerOption]) -> Result<(), CatalogError> {
    let mut seen: Vec<&str> = Vec::with_capacity(options.len());
    for option in options {
        if option.text().trim().is_empty() {
            return Err(CatalogError::EmptyOptionText);
        }
        if seen.contains(&option.text()) {
            return Err(CatalogError::DuplicateOptionText {
                text: option.text().to_owned(),
            });
        }
        seen.push(option.text());
    }
    Ok(())
}

/// A question as authored in the curriculum catalog.
///
/// The `ordinal` is the question's stable identity within its module: answers
/// and response events are keyed by it, never by presentation position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    ordinal: u32,
    prompt: String,
    kind: QuestionKind,
    multi_select: bool,
    options: Vec<AnswerOption>,
    embed: Option<Url>,
}

impl Question {
    /// Creates a validated question.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if the prompt is empty, option texts are empty
    /// or duplicated, the kind requires options but none are given, or a
    /// knowledge question has no correct option.
    pub fn new(
        ordinal: u32,
        prompt: impl Into<String>,
        kind: QuestionKind,
        options: Vec<AnswerOption>,
    ) -> Result<Self, CatalogError> {
        let prompt = prompt.into();
        if prompt.trim().is_empty() {
            return Err(CatalogError::EmptyPrompt);
        }
        validate_options(&options)?;
        match kind {
            QuestionKind::Knowledge => {
                if options.is_empty() {
                    return Err(CatalogError::NoOptions);
                }
                if !options.iter().any(AnswerOption::is_correct) {
                    return Err(CatalogError::NoCorrectOption);
                }
            }
            QuestionKind::Feedback | QuestionKind::SurveyResults => {
                if options.is_empty() {
                    return Err(CatalogError::NoOptions);
                }
            }
            // Survey embeds are answered on the external platform; they may
            // carry no local options at all.
            QuestionKind::Survey => {}
        }

        Ok(Self {
            ordinal,
            prompt,
            kind,
            multi_select: false,
            options,
            embed: None,
        })
    }

    /// Marks this question as multiple-correct-answer mode.
    #[must_use]
    pub fn with_multi_select(mut self, multi_select: bool) -> Self {
        self.multi_select = multi_select;
        self
    }

    /// Attaches an externally-hosted content reference (survey or results embed).
    #[must_use]
    pub fn with_embed(mut self, embed: Url) -> Self {
        self.embed = Some(embed);
        self
    }

    #[must_use]
    pub fn ordinal(&self) -> u32 {
        self.ordinal
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn kind(&self) -> QuestionKind {
        self.kind
    }

    #[must_use]
    pub fn is_multi_select(&self) -> bool {
        self.multi_select
    }

    #[must_use]
    pub fn options(&self) -> &[AnswerOption] {
        &self.options
    }

    #[must_use]
    pub fn embed(&self) -> Option<&Url> {
        self.embed.as_ref()
    }

    /// Indices of the correct options, in option order.
    #[must_use]
    pub fn correct_indices(&self) -> Vec<u32> {
        self.options
            .iter()
            .enumerate()
            .filter(|(_, o)| o.is_correct())
            .filter_map(|(i, _)| u32::try_from(i).ok())
            .collect()
    }

    /// Returns a copy of this question with its options re-ordered.
    ///
    /// Used by the shuffler; the catalog itself is never mutated.
    #[must_use]
    pub fn with_option_order(&self, options: Vec<AnswerOption>) -> Self {
        let mut q = self.clone();
        q.options = options;
        q
    }
}

/// Control question embedded in an accordion item. Single-select only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlQuestion {
    prompt: String,
    options: Vec<AnswerOption>,
}

impl ControlQuestion {
    /// Creates a validated control question.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if the prompt is empty, options are empty or
    /// duplicated, or no option is correct.
    pub fn new(
        prompt: impl Into<String>,
        options: Vec<AnswerOption>,
    ) -> Result<Self, CatalogError> {
        let prompt = prompt.into();
        if prompt.trim().is_empty() {
            return Err(CatalogError::EmptyPrompt);
        }
        if options.is_empty() {
            return Err(CatalogError::NoOptions);
        }
        validate_options(&options)?;
        if !options.iter().any(AnswerOption::is_correct) {
            return Err(CatalogError::NoCorrectOption);
        }
        Ok(Self { prompt, options })
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn options(&self) -> &[AnswerOption] {
        &self.options
    }

    /// Returns a copy with options re-ordered (shuffler use).
    #[must_use]
    pub fn with_option_order(&self, options: Vec<AnswerOption>) -> Self {
        let mut q = self.clone();
        q.options = options;
        q
    }
}

/// A collapsible fact panel. Item order carries meaning and is never
/// shuffled; only the embedded control question's options are.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccordionItem {
    id: String,
    title: String,
    body: String,
    control: Option<ControlQuestion>,
}

impl AccordionItem {
    /// Creates a validated accordion item.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if the id is empty/contains whitespace or the
    /// title is empty.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> Result<Self, CatalogError> {
        let id = id.into();
        if id.trim().is_empty() || id.chars().any(char::is_whitespace) {
            return Err(CatalogError::InvalidAccordionId);
        }
        let title = title.into();
        if title.trim().is_empty() {
            return Err(CatalogError::EmptyTitle);
        }
        Ok(Self {
            id,
            title,
            body: body.into(),
            control: None,
        })
    }

    /// Attaches an embedded control question.
    #[must_use]
    pub fn with_control(mut self, control: ControlQuestion) -> Self {
        self.control = Some(control);
        self
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    #[must_use]
    pub fn control(&self) -> Option<&ControlQuestion> {
        self.control.as_ref()
    }

    /// Returns a copy with the control question replaced (shuffler use).
    #[must_use]
    pub fn with_control_order(&self, control: ControlQuestion) -> Self {
        let mut item = self.clone();
        item.control = Some(control);
        item
    }
}

/// Behavioral kind of a module; selects its step sequence, shuffle rules and
/// scoring policy in one place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    /// Knowledge quiz scored by correctness.
    Knowledge,
    /// Content tour with feedback questions scored by participation.
    Reflection,
    /// Survey module with external embeds and composite multi-part scoring.
    Survey,
    /// Terminology-led module: the first `pinned_prefix` questions keep their
    /// position (their order teaches), and `knowledge_check_size` accordion
    /// items are sampled for the knowledge check.
    Terminology {
        pinned_prefix: u32,
        knowledge_check_size: u32,
    },
}

/// One self-contained content + assessment unit worth `max_points`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    id: ModuleId,
    title: String,
    kind: ModuleKind,
    max_points: u32,
    intro_video: Option<Url>,
    questions: Vec<Question>,
    accordion: Vec<AccordionItem>,
}

impl Module {
    /// Creates a validated module.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if the title is empty, `max_points` is zero,
    /// question ordinals are not contiguous from zero, accordion ids repeat,
    /// or a terminology pinned prefix exceeds the question count.
    pub fn new(
        id: ModuleId,
        title: impl Into<String>,
        kind: ModuleKind,
        max_points: u32,
        questions: Vec<Question>,
        accordion: Vec<AccordionItem>,
    ) -> Result<Self, CatalogError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(CatalogError::EmptyTitle);
        }
        if max_points == 0 {
            return Err(CatalogError::ZeroMaxPoints);
        }
        for (position, question) in questions.iter().enumerate() {
            let expected = u32::try_from(position).unwrap_or(u32::MAX);
            if question.ordinal() != expected {
                return Err(CatalogError::NonContiguousOrdinals {
                    expected,
                    found: question.ordinal(),
                });
            }
        }
        let mut seen: Vec<&str> = Vec::with_capacity(accordion.len());
        for item in &accordion {
            if seen.contains(&item.id()) {
                return Err(CatalogError::DuplicateAccordionId {
                    id: item.id().to_owned(),
                });
            }
            seen.push(item.id());
        }
        if let ModuleKind::Terminology { pinned_prefix, .. } = kind {
            if pinned_prefix as usize > questions.len() {
                return Err(CatalogError::PinnedPrefixTooLong {
                    prefix: pinned_prefix,
                    len: questions.len(),
                });
            }
        }

        Ok(Self {
            id,
            title,
            kind,
            max_points,
            intro_video: None,
            questions,
            accordion,
        })
    }

    /// Attaches introductory media shown on the intro step.
    #[must_use]
    pub fn with_intro_video(mut self, url: Url) -> Self {
        self.intro_video = Some(url);
        self
    }

    #[must_use]
    pub fn id(&self) -> &ModuleId {
        &self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
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
    pub fn intro_video(&self) -> Option<&Url> {
        self.intro_video.as_ref()
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn accordion(&self) -> &[AccordionItem] {
        &self.accordion
    }

    #[must_use]
    pub fn question(&self, ordinal: u32) -> Option<&Question> {
        self.questions.get(ordinal as usize)
    }

    #[must_use]
    pub fn accordion_item(&self, id: &str) -> Option<&AccordionItem> {
        self.accordion.iter().find(|item| item.id() == id)
    }
}

/// A named group of modules whose points and completion feed one area-level
/// certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LearningArea {
    id: AreaId,
    title: String,
    modules: Vec<Module>,
}

impl LearningArea {
    /// Creates a validated learning area.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if the title is empty, the area has no modules,
    /// or two modules share an id.
    pub fn new(
        id: AreaId,
        title: impl Into<String>,
        modules: Vec<Module>,
    ) -> Result<Self, CatalogError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(CatalogError::EmptyTitle);
        }
        if modules.is_empty() {
            return Err(CatalogError::EmptyArea);
        }
        for (i, module) in modules.iter().enumerate() {
            if modules[..i].iter().any(|m| m.id() == module.id()) {
                return Err(CatalogError::DuplicateModuleId {
                    id: module.id().as_str().to_owned(),
                });
            }
        }
        Ok(Self { id, title, modules })
    }

    #[must_use]
    pub fn id(&self) -> &AreaId {
        &self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    #[must_use]
    pub fn module(&self, id: &ModuleId) -> Option<&Module> {
        self.modules.iter().find(|m| m.id() == id)
    }

    /// Maximum points attainable across all modules of the area.
    #[must_use]
    pub fn max_points(&self) -> u32 {
        self.modules.iter().map(Module::max_points).sum()
    }
}
