//! Recording backend and document helpers shared by the unit tests.

use std::sync::Mutex;

use tower_lsp::lsp_types::{
    CompletionItem, CompletionList, Diagnostic, FoldingRange, FormattingOptions, Hover,
    HoverContents, MarkedString, Position, Range, SemanticTokensLegend, SymbolInformation,
    TextEdit, Url,
};

use crate::document::TextDocument;
use crate::language::Language;

use super::backend::LanguageBackend;
use super::semantic_tokens::SemanticTokenEntry;

pub(crate) type Formatter = Box<dyn Fn(&TextDocument, Range) -> Vec<TextEdit> + Send + Sync>;

/// Scriptable backend recording every call it receives.
pub(crate) struct FakeBackend {
    language: Language,
    diagnostics: Vec<Diagnostic>,
    folding: Vec<FoldingRange>,
    legend: Option<SemanticTokensLegend>,
    tokens: Vec<SemanticTokenEntry>,
    formatter: Option<Formatter>,
    symbols: Vec<SymbolInformation>,
    calls: Mutex<Vec<String>>,
    removed: Mutex<Vec<Url>>,
}

impl FakeBackend {
    pub(crate) fn new(language: Language) -> Self {
        Self {
            language,
            diagnostics: Vec::new(),
            folding: Vec::new(),
            legend: None,
            tokens: Vec::new(),
            formatter: None,
            symbols: Vec::new(),
            calls: Mutex::new(Vec::new()),
            removed: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_diagnostic(mut self, message: &str) -> Self {
        self.diagnostics.push(Diagnostic {
            message: message.to_string(),
            ..Default::default()
        });
        self
    }

    pub(crate) fn with_folding(mut self, ranges: Vec<FoldingRange>) -> Self {
        self.folding = ranges;
        self
    }

    pub(crate) fn with_tokens(
        mut self,
        legend: SemanticTokensLegend,
        tokens: Vec<SemanticTokenEntry>,
    ) -> Self {
        self.legend = Some(legend);
        self.tokens = tokens;
        self
    }

    pub(crate) fn with_formatter(
        mut self,
        formatter: impl Fn(&TextDocument, Range) -> Vec<TextEdit> + Send + Sync + 'static,
    ) -> Self {
        self.formatter = Some(Box::new(formatter));
        self
    }

    #[allow(deprecated)]
    pub(crate) fn with_symbol(mut self, name: &str, uri: &Url) -> Self {
        self.symbols.push(SymbolInformation {
            name: name.to_string(),
            kind: tower_lsp::lsp_types::SymbolKind::FIELD,
            tags: None,
            deprecated: None,
            location: tower_lsp::lsp_types::Location::new(uri.clone(), Range::default()),
            container_name: None,
        });
        self
    }

    /// Calls received so far, formatted as `op:language_id@line:character`.
    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn removed(&self) -> Vec<Url> {
        self.removed.lock().unwrap().clone()
    }

    fn record(&self, op: &str, document: &TextDocument, position: Position) {
        self.calls.lock().unwrap().push(format!(
            "{op}:{}@{}:{}",
            document.language_id(),
            position.line,
            position.character
        ));
    }
}

impl LanguageBackend for FakeBackend {
    fn language(&self) -> Language {
        self.language
    }

    fn complete(&self, document: &TextDocument, position: Position) -> Option<CompletionList> {
        self.record("complete", document, position);
        Some(CompletionList {
            is_incomplete: false,
            items: vec![CompletionItem::new_simple(
                self.language.to_string(),
                String::new(),
            )],
        })
    }

    fn hover(&self, document: &TextDocument, position: Position) -> Option<Hover> {
        self.record("hover", document, position);
        Some(Hover {
            contents: HoverContents::Scalar(MarkedString::String(self.language.to_string())),
            range: None,
        })
    }

    fn validate(&self, document: &TextDocument) -> Option<Vec<Diagnostic>> {
        self.record("validate", document, Position::default());
        Some(self.diagnostics.clone())
    }

    fn document_symbols(&self, _document: &TextDocument) -> Option<Vec<SymbolInformation>> {
        Some(self.symbols.clone())
    }

    fn workspace_symbols(&self, _query: &str) -> Option<Vec<SymbolInformation>> {
        Some(self.symbols.clone())
    }

    fn folding_ranges(&self, _document: &TextDocument) -> Option<Vec<FoldingRange>> {
        Some(self.folding.clone())
    }

    fn linked_editing_ranges(
        &self,
        document: &TextDocument,
        position: Position,
    ) -> Option<Vec<Range>> {
        self.record("linked_editing", document, position);
        Some(vec![Range::new(position, position)])
    }

    fn format(
        &self,
        document: &TextDocument,
        range: Range,
        _options: &FormattingOptions,
    ) -> Option<Vec<TextEdit>> {
        let formatter = self.formatter.as_ref()?;
        self.record("format", document, range.start);
        Some(formatter(document, range))
    }

    fn semantic_token_legend(&self) -> Option<SemanticTokensLegend> {
        self.legend.clone()
    }

    fn semantic_tokens(&self, _document: &TextDocument) -> Option<Vec<SemanticTokenEntry>> {
        self.legend.as_ref()?;
        Some(self.tokens.clone())
    }

    fn document_removed(&self, uri: &Url) {
        self.removed.lock().unwrap().push(uri.clone());
    }
}

pub(crate) fn html_doc(text: &str) -> TextDocument {
    let uri = Url::parse("file:///test.html").unwrap();
    TextDocument::new(uri, "html", 1, text.to_string())
}

pub(crate) fn fold(start_line: u32, end_line: u32) -> FoldingRange {
    FoldingRange {
        start_line,
        end_line,
        ..Default::default()
    }
}
