//! Languages that can appear in a host document.

use std::fmt;
use std::str::FromStr;

use crate::errors::LanguageParseError;

/// Languages the multiplexer knows how to route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Language {
    /// The host markup language.
    Html,
    /// Style blocks and `style` attribute values.
    Css,
    /// Script blocks and `on*` event handler attribute values.
    JavaScript,
    /// Script blocks declared with `type="text/typescript"`.
    TypeScript,
}

impl Language {
    /// Returns the identifier used for LSP language ids and settings keys.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Css => "css",
            Self::JavaScript => "javascript",
            Self::TypeScript => "typescript",
        }
    }

    /// Whether this is the host language of the document.
    pub fn is_host(self) -> bool {
        self == Self::Html
    }
}

impl fmt::Display for Language {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = LanguageParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let normalised = input.trim().to_ascii_lowercase();
        match normalised.as_str() {
            "html" | "htm" => Ok(Self::Html),
            "css" => Ok(Self::Css),
            "javascript" | "js" => Ok(Self::JavaScript),
            "typescript" | "ts" => Ok(Self::TypeScript),
            other => Err(LanguageParseError::new(other)),
        }
    }
}
