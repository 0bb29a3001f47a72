//! Embedded-language discovery in host markup.
//!
//! This module provides:
//! - A lexical [`Scanner`] over markup tokens
//! - Region extraction for style/script blocks and attribute values

mod extractor;
mod scanner;

pub use extractor::{extract_regions, ExtractedRegions};
pub use scanner::{Scanner, Token, TokenKind};
