//! Request routing across language backends.
//!
//! Single-target requests go to the backend of the language at the request
//! position. Multi-target requests go to every active backend of the document
//! and concatenate the answers in registration order. A missing backend or an
//! unsupported operation is never an error; it yields the operation's empty
//! answer.

use std::ops::Deref;
use std::sync::Arc;

use tower_lsp::lsp_types::{
    Color, ColorInformation, ColorPresentation, CompletionList, Diagnostic, DocumentLink,
    FoldingRange, Hover, Location, Position, Range, SelectionRange, SignatureHelp,
    SymbolInformation, Url, WorkspaceEdit,
};

use crate::document::{DocumentCache, DocumentRegions, LanguageRange, TextDocument};
use crate::language::Language;
use crate::settings::Settings;

use super::backend::LanguageBackend;
use super::folding::limit_folding_ranges;
use super::registry::BackendRegistry;

/// The document a backend sees: the host itself or a projection of it.
#[derive(Debug)]
pub enum DocumentView<'a> {
    Host(&'a TextDocument),
    Embedded(Arc<TextDocument>),
}

impl Deref for DocumentView<'_> {
    type Target = TextDocument;

    fn deref(&self) -> &TextDocument {
        match self {
            Self::Host(document) => document,
            Self::Embedded(document) => document,
        }
    }
}

/// Routes requests on host documents to the registered backends.
pub struct Multiplexer {
    registry: BackendRegistry,
    cache: Arc<DocumentCache<DocumentRegions>>,
    settings: Settings,
}

impl Multiplexer {
    pub fn new(registry: BackendRegistry, settings: Settings) -> Self {
        let cache = DocumentCache::new(settings.cache.to_config(), DocumentRegions::new);
        Self {
            registry,
            cache: Arc::new(cache),
            settings,
        }
    }

    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn cache(&self) -> &Arc<DocumentCache<DocumentRegions>> {
        &self.cache
    }

    /// Regions and projections of `document`, parsed on first use per version.
    pub fn regions(&self, document: &TextDocument) -> Arc<DocumentRegions> {
        self.cache.get(document)
    }

    pub fn backend(&self, language: Language) -> Option<&Arc<dyn LanguageBackend>> {
        self.registry.get(language)
    }

    /// Backend of the language governing `position`.
    pub fn backend_at(
        &self,
        document: &TextDocument,
        position: Position,
    ) -> Option<&Arc<dyn LanguageBackend>> {
        let language = self
            .regions(document)
            .index()
            .language_at_position(document, position)?;
        self.registry.get(language)
    }

    /// Language ranges of `range` (or the whole document) paired with their backends.
    pub fn backend_ranges(
        &self,
        document: &TextDocument,
        range: Option<Range>,
    ) -> Vec<(LanguageRange, Option<&Arc<dyn LanguageBackend>>)> {
        self.regions(document)
            .index()
            .language_ranges(document, range)
            .into_iter()
            .map(|lr| {
                let backend = lr.language.and_then(|language| self.registry.get(language));
                (lr, backend)
            })
            .collect()
    }

    /// Registered backends whose language occurs in `document`, in registration order.
    pub fn active_backends(&self, document: &TextDocument) -> Vec<&Arc<dyn LanguageBackend>> {
        let languages = self.regions(document).index().languages_in_document();
        self.registry
            .iter()
            .filter(|backend| languages.contains(&backend.language()))
            .collect()
    }

    /// The document `backend` should analyse for a request on `document`.
    pub fn view<'a>(
        &self,
        document: &'a TextDocument,
        backend: &dyn LanguageBackend,
        ignore_attribute_values: bool,
    ) -> DocumentView<'a> {
        let language = backend.language();
        if language.is_host() {
            return DocumentView::Host(document);
        }
        let projected = self.regions(document).embedded_document(
            document,
            language,
            ignore_attribute_values,
        );
        DocumentView::Embedded(projected)
    }

    fn at_position<R>(
        &self,
        document: &TextDocument,
        position: Position,
        op: impl FnOnce(&dyn LanguageBackend, &TextDocument) -> Option<R>,
    ) -> Option<R> {
        let backend = self.backend_at(document, position)?;
        let view = self.view(document, backend.as_ref(), false);
        tracing::trace!(language = %backend.language(), "dispatching to backend");
        op(backend.as_ref(), &view)
    }

    fn fan_out<R>(
        &self,
        document: &TextDocument,
        mut op: impl FnMut(&dyn LanguageBackend, &TextDocument) -> Option<Vec<R>>,
    ) -> Vec<R> {
        let mut result = Vec::new();
        for backend in self.active_backends(document) {
            let view = self.view(document, backend.as_ref(), false);
            if let Some(items) = op(backend.as_ref(), &view) {
                result.extend(items);
            }
        }
        result
    }

    pub fn complete(&self, document: &TextDocument, position: Position) -> CompletionList {
        self.at_position(document, position, |backend, view| {
            backend.complete(view, position)
        })
        .unwrap_or_default()
    }

    pub fn hover(&self, document: &TextDocument, position: Position) -> Option<Hover> {
        self.at_position(document, position, |backend, view| backend.hover(view, position))
    }

    pub fn definition(&self, document: &TextDocument, position: Position) -> Vec<Location> {
        self.at_position(document, position, |backend, view| {
            backend.definition(view, position)
        })
        .unwrap_or_default()
    }

    pub fn references(&self, document: &TextDocument, position: Position) -> Vec<Location> {
        self.at_position(document, position, |backend, view| {
            backend.references(view, position)
        })
        .unwrap_or_default()
    }

    pub fn rename(
        &self,
        document: &TextDocument,
        position: Position,
        new_name: &str,
    ) -> Option<WorkspaceEdit> {
        self.at_position(document, position, |backend, view| {
            backend.rename(view, position, new_name)
        })
    }

    pub fn signature_help(
        &self,
        document: &TextDocument,
        position: Position,
    ) -> Option<SignatureHelp> {
        self.at_position(document, position, |backend, view| {
            backend.signature_help(view, position)
        })
    }

    /// Presentations of `color`, resolved at the start of `range`.
    pub fn color_presentations(
        &self,
        document: &TextDocument,
        color: Color,
        range: Range,
    ) -> Vec<ColorPresentation> {
        self.at_position(document, range.start, |backend, view| {
            backend.color_presentations(view, color, range)
        })
        .unwrap_or_default()
    }

    /// One selection range per position; an empty range at the position when
    /// no backend answers.
    pub fn selection_ranges(
        &self,
        document: &TextDocument,
        positions: &[Position],
    ) -> Vec<SelectionRange> {
        positions
            .iter()
            .map(|&position| {
                self.at_position(document, position, |backend, view| {
                    backend.selection_range(view, position)
                })
                .unwrap_or(SelectionRange {
                    range: Range::new(position, position),
                    parent: None,
                })
            })
            .collect()
    }

    /// Linked editing ranges, resolved one code unit before `position` so a
    /// cursor right after a tag name still reaches the host backend.
    pub fn linked_editing_ranges(
        &self,
        document: &TextDocument,
        position: Position,
    ) -> Option<Vec<Range>> {
        let character = position.character.checked_sub(1)?;
        let resolve_at = Position::new(position.line, character);
        self.at_position(document, resolve_at, |backend, view| {
            backend.linked_editing_ranges(view, position)
        })
    }

    /// Diagnostics of every active backend whose validation is enabled.
    pub fn diagnostics(&self, document: &TextDocument) -> Vec<Diagnostic> {
        self.fan_out(document, |backend, view| {
            if !self.settings.validation_enabled(backend.language()) {
                tracing::debug!(language = %backend.language(), "validation disabled");
                return None;
            }
            backend.validate(view)
        })
    }

    pub fn document_symbols(&self, document: &TextDocument) -> Vec<SymbolInformation> {
        self.fan_out(document, |backend, view| backend.document_symbols(view))
    }

    pub fn document_links(&self, document: &TextDocument) -> Vec<DocumentLink> {
        self.fan_out(document, |backend, view| backend.document_links(view))
    }

    pub fn document_colors(&self, document: &TextDocument) -> Vec<ColorInformation> {
        self.fan_out(document, |backend, view| backend.document_colors(view))
    }

    /// Folding ranges of every active backend, limited to the configured maximum.
    pub fn folding_ranges(&self, document: &TextDocument) -> Vec<FoldingRange> {
        let ranges = self.fan_out(document, |backend, view| backend.folding_ranges(view));
        limit_folding_ranges(ranges, self.settings.folding.limit)
    }

    /// Symbols matching `query` from every registered backend.
    pub fn workspace_symbols(&self, query: &str) -> Vec<SymbolInformation> {
        self.registry
            .iter()
            .filter_map(|backend| backend.workspace_symbols(query))
            .flatten()
            .collect()
    }

    /// Forget `uri`: drop its cached regions and tell every backend.
    pub fn remove_document(&self, uri: &Url) {
        self.cache.invalidate(uri);
        for backend in self.registry.iter() {
            backend.document_removed(uri);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lsp::test_support::{fold, html_doc, FakeBackend};

    fn mux(backends: Vec<Arc<FakeBackend>>, settings: Settings) -> Multiplexer {
        let mut registry = BackendRegistry::new();
        for backend in backends {
            registry.register(backend).unwrap();
        }
        Multiplexer::new(registry, settings)
    }

    #[test]
    fn routes_to_backend_of_position_with_projection() {
        let html = Arc::new(FakeBackend::new(Language::Html));
        let css = Arc::new(FakeBackend::new(Language::Css));
        let mux = mux(vec![html.clone(), css.clone()], Settings::default());
        let document = html_doc("<p>\n<style>\nh1 {}\n</style>");

        mux.hover(&document, Position::new(2, 1));
        mux.hover(&document, Position::new(0, 1));

        assert_eq!(css.calls(), vec!["hover:css@2:1"]);
        assert_eq!(html.calls(), vec!["hover:html@0:1"]);
    }

    #[test]
    fn missing_backend_yields_empty_answers() {
        let mux = mux(vec![], Settings::default());
        let document = html_doc("<style>a{}</style>");
        let position = Position::new(0, 8);
        assert!(mux.complete(&document, position).items.is_empty());
        assert!(mux.hover(&document, position).is_none());
        assert!(mux.definition(&document, position).is_empty());
        assert!(mux.diagnostics(&document).is_empty());
    }

    #[test]
    fn unknown_dialect_is_not_routed() {
        let js = Arc::new(FakeBackend::new(Language::JavaScript));
        let mux = mux(vec![js.clone()], Settings::default());
        let document = html_doc(r#"<script type="text/plain">x</script>"#);
        assert!(mux.hover(&document, Position::new(0, 26)).is_none());
        assert!(js.calls().is_empty());
    }

    #[test]
    fn diagnostics_concatenate_in_registration_order_and_honor_settings() {
        let css = Arc::new(FakeBackend::new(Language::Css).with_diagnostic("css"));
        let html = Arc::new(FakeBackend::new(Language::Html).with_diagnostic("html"));
        let js = Arc::new(FakeBackend::new(Language::JavaScript).with_diagnostic("js"));
        let document = html_doc("<style>a{}</style><script>b()</script>");

        let all = mux(
            vec![css.clone(), html.clone(), js.clone()],
            Settings::default(),
        );
        let messages: Vec<_> = all
            .diagnostics(&document)
            .into_iter()
            .map(|d| d.message)
            .collect();
        assert_eq!(messages, vec!["css", "html", "js"]);

        let mut settings = Settings::default();
        settings.validate.insert("css".to_string(), false);
        let filtered = mux(vec![css, html, js], settings);
        let messages: Vec<_> = filtered
            .diagnostics(&document)
            .into_iter()
            .map(|d| d.message)
            .collect();
        assert_eq!(messages, vec!["html", "js"]);
    }

    #[test]
    fn inactive_backends_are_skipped() {
        let css = Arc::new(FakeBackend::new(Language::Css).with_diagnostic("css"));
        let mux = mux(vec![css.clone()], Settings::default());
        assert!(mux.diagnostics(&html_doc("<p></p>")).is_empty());
        assert!(css.calls().is_empty());
    }

    #[test]
    fn linked_editing_resolves_one_character_back() {
        let html = Arc::new(FakeBackend::new(Language::Html));
        let css = Arc::new(FakeBackend::new(Language::Css));
        let mux = mux(vec![html.clone(), css.clone()], Settings::default());
        let document = html_doc("<style>a{}</style>");

        let ranges = mux.linked_editing_ranges(&document, Position::new(0, 7));
        assert!(ranges.is_some());
        assert_eq!(html.calls(), vec!["linked_editing:html@0:7"]);
        assert!(css.calls().is_empty());

        assert!(mux
            .linked_editing_ranges(&document, Position::new(0, 0))
            .is_none());
    }

    #[test]
    fn selection_ranges_fall_back_to_empty_range() {
        let mux = mux(vec![], Settings::default());
        let document = html_doc("<p></p>");
        let position = Position::new(0, 2);
        let ranges = mux.selection_ranges(&document, &[position]);
        assert_eq!(ranges.len(), 1);
        assert_eq!(ranges[0].range, Range::new(position, position));
    }

    #[test]
    fn folding_ranges_are_limited() {
        let html = Arc::new(
            FakeBackend::new(Language::Html).with_folding(vec![fold(0, 9), fold(1, 3), fold(5, 7)]),
        );
        let mut settings = Settings::default();
        settings.folding.limit = 1;
        let mux = mux(vec![html], settings);
        let ranges = mux.folding_ranges(&html_doc("<p></p>"));
        assert_eq!(ranges, vec![fold(0, 9)]);
    }

    #[test]
    fn workspace_symbols_query_every_backend() {
        let uri = Url::parse("file:///test.html").unwrap();
        let css = Arc::new(FakeBackend::new(Language::Css).with_symbol("h1", &uri));
        let js = Arc::new(FakeBackend::new(Language::JavaScript).with_symbol("main", &uri));
        let mux = mux(vec![css, js], Settings::default());
        let names: Vec<_> = mux
            .workspace_symbols("")
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["h1", "main"]);
    }

    #[test]
    fn remove_document_invalidates_and_notifies() {
        let html = Arc::new(FakeBackend::new(Language::Html));
        let css = Arc::new(FakeBackend::new(Language::Css));
        let mux = mux(vec![html.clone(), css.clone()], Settings::default());
        let document = html_doc("<p></p>");
        mux.regions(&document);
        assert!(mux.cache().contains(document.uri()));

        mux.remove_document(document.uri());

        assert!(!mux.cache().contains(document.uri()));
        assert_eq!(html.removed(), vec![document.uri().clone()]);
        assert_eq!(css.removed(), vec![document.uri().clone()]);
    }
}
