//! The text handed over by the log collaborator.

use crate::error::TimelineError;

/// Collaborators that cannot reach a container report it in-band with
/// a line starting with this marker instead of failing the call.
pub const CONTROL_MARKER: &str = "[control]";

/// A bounded log tail, or the reason it could not be fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTail {
    Text(String),
    Unavailable(String),
}

impl LogTail {
    /// Classify raw collaborator output: `[control] …` text is an error report.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        if raw.trim_start().starts_with(CONTROL_MARKER) {
            Self::Unavailable(raw.trim().to_string())
        } else {
            Self::Text(raw)
        }
    }

    pub fn unavailable(reason: impl std::fmt::Display) -> Self {
        Self::Unavailable(format!("{} {}", CONTROL_MARKER, reason))
    }

    /// The usable text, or the failure every extractor reports for it.
    pub fn text(&self) -> Result<&str, TimelineError> {
        match self {
            Self::Text(t) if t.trim().is_empty() => {
                Err(TimelineError::SourceUnavailable("empty logs".to_string()))
            }
            Self::Text(t) => Ok(t),
            Self::Unavailable(reason) => Err(TimelineError::SourceUnavailable(reason.clone())),
        }
    }

    /// Raw text as served by `/logs`, error reports included.
    pub fn as_raw(&self) -> &str {
        match self {
            Self::Text(t) => t,
            Self::Unavailable(reason) => reason,
        }
    }
}
