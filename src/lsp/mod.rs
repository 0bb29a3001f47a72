//! LSP protocol feature implementations.
//!
//! This module provides the pieces that route requests on a host document to
//! per-language backends:
//! - The backend contract and the registry of backends
//! - The multiplexer dispatching single- and multi-target requests
//! - Format merging, semantic token unification and folding range limits
//! - The built-in host markup backend

mod backend;
mod folding;
mod formatting;
mod markup;
mod multiplexer;
mod registry;
mod semantic_tokens;
#[cfg(test)]
pub(crate) mod test_support;

pub use backend::LanguageBackend;
pub use folding::limit_folding_ranges;
pub use formatting::{apply_edits, format};
pub use markup::MarkupBackend;
pub use multiplexer::{DocumentView, Multiplexer};
pub use registry::BackendRegistry;
pub use semantic_tokens::{
    create_mapping, encode_tokens, remap_modifiers, LegendMapping, SemanticTokenEntry,
    SemanticTokenUnifier,
};
