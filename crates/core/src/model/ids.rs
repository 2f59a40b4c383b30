use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error type for parsing an identifier from a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    kind: &'static str,
}

impl ParseIdError {
    fn new(kind: &'static str) -> Self {
        Self { kind }
    }
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} must be non-empty and contain no whitespace", self.kind)
    }
}

impl std::error::Error for ParseIdError {}

fn validate_slug(raw: &str, kind: &'static str) -> Result<String, ParseIdError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.chars().any(char::is_whitespace) {
        return Err(ParseIdError::new(kind));
    }
    Ok(trimmed.to_owned())
}

/// Identifier of a content module (a stable catalog slug, e.g. `photo-review`).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModuleId(String);

impl ModuleId {
    /// Creates a `ModuleId` from a slug.
    ///
    /// # Errors
    ///
    /// Returns `ParseIdError` if the slug is empty or contains whitespace.
    pub fn new(slug: impl AsRef<str>) -> Result<Self, ParseIdError> {
        Ok(Self(validate_slug(slug.as_ref(), "module id")?))
    }

    /// Returns the underlying slug.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Identifier of a learning area (a group of modules certified together).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AreaId(String);

impl AreaId {
    /// Creates an `AreaId` from a slug.
    ///
    /// # Errors
    ///
    /// Returns `ParseIdError` if the slug is empty or contains whitespace.
    pub fn new(slug: impl AsRef<str>) -> Result<Self, ParseIdError> {
        Ok(Self(validate_slug(slug.as_ref(), "area id")?))
    }

    /// Returns the underlying slug.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Opaque one-time-issued code identifying a learner record.
///
/// Issued by the (external) access-control surface; the engine only uses it
/// as a storage key and never interprets its contents.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LearnerCode(String);

impl LearnerCode {
    /// Creates a `LearnerCode`.
    ///
    /// # Errors
    ///
    /// Returns `ParseIdError` if the code is empty or contains whitespace.
    pub fn new(code: impl AsRef<str>) -> Result<Self, ParseIdError> {
        Ok(Self(validate_slug(code.as_ref(), "learner code")?))
    }

    /// Returns the underlying code.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModuleId({})", self.0)
    }
}

impl fmt::Debug for AreaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AreaId({})", self.0)
    }
}

impl fmt::Debug for LearnerCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LearnerCode({})", self.0)
    }
}

//
// ─── DISPLAY IMPLEMENTATIONS ───────────────────────────────────────────────────
//

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for AreaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for LearnerCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

//
// ─── FROMSTR IMPLEMENTATIONS ───────────────────────────────────────────────────
//

impl FromStr for ModuleId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl FromStr for AreaId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl FromStr for LearnerCode {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}
