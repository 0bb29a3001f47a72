//! Error types surfaced by the multiplexing core.

use thiserror::Error;
use tower_lsp::lsp_types::Position;

use crate::language::Language;

/// Raised when a language identifier in settings cannot be parsed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unsupported language '{0}'")]
pub struct LanguageParseError(String);

impl LanguageParseError {
    pub(crate) fn new(input: impl Into<String>) -> Self {
        Self(input.into())
    }

    /// Returns the input that failed to parse.
    pub fn input(&self) -> &str {
        self.0.as_str()
    }
}

/// Errors raised while building a [`crate::lsp::BackendRegistry`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// A backend for the language is already registered.
    #[error("language '{language}' already has a registered backend")]
    DuplicateLanguage {
        /// Language for which a second backend was offered.
        language: Language,
    },
}

/// Errors raised while applying text edits during format merging.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EditError {
    /// Two edits touch the same text.
    #[error("overlapping edit at {}:{}", .position.line, .position.character)]
    Overlapping {
        /// Start of the edit that overlaps its predecessor.
        position: Position,
    },

    /// An edit ends before it starts.
    #[error("edit range ends before it starts at {}:{}", .position.line, .position.character)]
    InvertedRange {
        /// Start of the offending edit.
        position: Position,
    },

    /// The merged content no longer contains the unchanged trailing text.
    #[error("formatted content is shorter than the unchanged trailing text")]
    TruncatedContent,
}

/// Errors raised while loading a custom vocabulary data source.
#[derive(Debug, Error)]
pub enum CustomDataError {
    /// The source could not be read.
    #[error("failed to read custom data '{location}': {source}")]
    Read {
        /// Source identifier as configured.
        location: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The source content is not valid custom data JSON.
    #[error("failed to parse custom data '{location}': {source}")]
    Parse {
        /// Source identifier as configured.
        location: String,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// A remote source could not be fetched.
    #[error("failed to fetch custom data '{location}': {source}")]
    Fetch {
        /// Source identifier as configured.
        location: String,
        /// Underlying HTTP error.
        #[source]
        source: Box<ureq::Error>,
    },

    /// The source uses a scheme the reader cannot fetch.
    #[error("unsupported custom data location '{location}'")]
    UnsupportedScheme {
        /// Source identifier as configured.
        location: String,
    },
}
