//! Per-language analysis contract.
//!
//! A backend answers requests for one language. It receives either the host
//! document (host backend) or the language's projection, and answers in that
//! document's coordinates, which match the host's line for line.

use std::fmt;

use tower_lsp::lsp_types::{
    Color, ColorInformation, ColorPresentation, CompletionList, Diagnostic, DocumentLink,
    FoldingRange, FormattingOptions, Hover, Location, Position, Range, SelectionRange,
    SemanticTokensLegend, SignatureHelp, SymbolInformation, TextEdit, Url, WorkspaceEdit,
};

use crate::document::TextDocument;
use crate::language::Language;

use super::semantic_tokens::SemanticTokenEntry;

/// Capability set of one language.
///
/// Every operation is optional: the default implementation returns `None`,
/// meaning "not supported", and callers skip the backend silently.
pub trait LanguageBackend: Send + Sync {
    /// The language this backend analyses.
    fn language(&self) -> Language;

    fn complete(&self, _document: &TextDocument, _position: Position) -> Option<CompletionList> {
        None
    }

    fn hover(&self, _document: &TextDocument, _position: Position) -> Option<Hover> {
        None
    }

    fn validate(&self, _document: &TextDocument) -> Option<Vec<Diagnostic>> {
        None
    }

    fn definition(&self, _document: &TextDocument, _position: Position) -> Option<Vec<Location>> {
        None
    }

    fn references(&self, _document: &TextDocument, _position: Position) -> Option<Vec<Location>> {
        None
    }

    fn rename(
        &self,
        _document: &TextDocument,
        _position: Position,
        _new_name: &str,
    ) -> Option<WorkspaceEdit> {
        None
    }

    fn document_links(&self, _document: &TextDocument) -> Option<Vec<DocumentLink>> {
        None
    }

    fn document_symbols(&self, _document: &TextDocument) -> Option<Vec<SymbolInformation>> {
        None
    }

    /// Symbols matching `query` across everything the backend knows about.
    fn workspace_symbols(&self, _query: &str) -> Option<Vec<SymbolInformation>> {
        None
    }

    fn folding_ranges(&self, _document: &TextDocument) -> Option<Vec<FoldingRange>> {
        None
    }

    fn selection_range(
        &self,
        _document: &TextDocument,
        _position: Position,
    ) -> Option<SelectionRange> {
        None
    }

    fn document_colors(&self, _document: &TextDocument) -> Option<Vec<ColorInformation>> {
        None
    }

    fn color_presentations(
        &self,
        _document: &TextDocument,
        _color: Color,
        _range: Range,
    ) -> Option<Vec<ColorPresentation>> {
        None
    }

    fn signature_help(&self, _document: &TextDocument, _position: Position) -> Option<SignatureHelp> {
        None
    }

    fn linked_editing_ranges(
        &self,
        _document: &TextDocument,
        _position: Position,
    ) -> Option<Vec<Range>> {
        None
    }

    /// Edits formatting `range` of `document`.
    fn format(
        &self,
        _document: &TextDocument,
        _range: Range,
        _options: &FormattingOptions,
    ) -> Option<Vec<TextEdit>> {
        None
    }

    /// Legend the indices of [`LanguageBackend::semantic_tokens`] refer to.
    fn semantic_token_legend(&self) -> Option<SemanticTokensLegend> {
        None
    }

    fn semantic_tokens(&self, _document: &TextDocument) -> Option<Vec<SemanticTokenEntry>> {
        None
    }

    /// Called when the client closes `uri` so per-document state can be released.
    fn document_removed(&self, _uri: &Url) {}
}

impl fmt::Debug for dyn LanguageBackend {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "LanguageBackend({})", self.language())
    }
}
