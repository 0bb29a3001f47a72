//! Built-in backend for the host markup language.
//!
//! Works from the lexical scanner alone: elements are paired up with a stack
//! of open tags, and tag vocabulary comes from the loaded custom data.

use std::ops::Range as Span;

use tower_lsp::lsp_types::{
    CompletionItem, CompletionItemKind, CompletionList, Documentation, FoldingRange,
    FoldingRangeKind, Hover, HoverContents, Location, Position, Range, SymbolInformation,
    SymbolKind,
};

use crate::custom_data::{CustomDataProvider, Description};
use crate::document::TextDocument;
use crate::embedded::{Scanner, TokenKind};
use crate::language::Language;

use super::backend::LanguageBackend;

/// Elements that never have content or an end tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// An element as paired up from start and end tags.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Element {
    tag: String,
    id: Option<String>,
    /// Offset of the `<` opening the start tag.
    start: usize,
    name: Span<usize>,
    end_name: Option<Span<usize>>,
    /// Offset one past the element, once it is closed.
    end: Option<usize>,
    parent: Option<usize>,
}

impl Element {
    fn label(&self) -> String {
        match &self.id {
            Some(id) => format!("{}#{}", self.tag, id),
            None => self.tag.clone(),
        }
    }
}

/// Host backend answering from markup structure and custom tag data.
#[derive(Debug, Clone, Default)]
pub struct MarkupBackend {
    providers: Vec<CustomDataProvider>,
}

impl MarkupBackend {
    pub fn new(providers: Vec<CustomDataProvider>) -> Self {
        Self { providers }
    }

    fn is_void(&self, tag: &str) -> bool {
        VOID_ELEMENTS.contains(&tag)
            || self
                .providers
                .iter()
                .any(|p| p.tag(tag).is_some_and(|t| t.void))
    }

    fn description(&self, tag: &str) -> Option<&Description> {
        self.providers
            .iter()
            .find_map(|p| p.tag(tag).and_then(|t| t.description.as_ref()))
    }

    fn elements(&self, text: &str) -> Vec<Element> {
        let mut elements: Vec<Element> = Vec::new();
        let mut open: Vec<usize> = Vec::new();
        let mut current = None;
        let mut closing = None;
        let mut tag_open = 0;
        let mut end_tag_open = 0;
        let mut attribute = String::new();

        for token in Scanner::new(text) {
            match token.kind {
                TokenKind::StartTagOpen => tag_open = token.start,
                TokenKind::StartTag => {
                    elements.push(Element {
                        tag: token.text(text).to_ascii_lowercase(),
                        id: None,
                        start: tag_open,
                        name: token.start..token.end,
                        end_name: None,
                        end: None,
                        parent: open.last().copied(),
                    });
                    current = Some(elements.len() - 1);
                }
                TokenKind::AttributeName => attribute = token.text(text).to_ascii_lowercase(),
                TokenKind::AttributeValue if attribute == "id" => {
                    if let Some(i) = current {
                        let value = token.text(text).trim_matches(['"', '\'']);
                        elements[i].id = Some(value.to_string());
                    }
                }
                TokenKind::StartTagClose => {
                    if let Some(i) = current.take() {
                        if self.is_void(&elements[i].tag) {
                            elements[i].end = Some(token.end);
                        } else {
                            open.push(i);
                        }
                    }
                }
                TokenKind::StartTagSelfClose => {
                    if let Some(i) = current.take() {
                        elements[i].end = Some(token.end);
                    }
                }
                TokenKind::EndTagOpen => {
                    end_tag_open = token.start;
                    closing = None;
                }
                TokenKind::EndTag => {
                    let tag = token.text(text).to_ascii_lowercase();
                    let Some(depth) = open.iter().rposition(|&i| elements[i].tag == tag) else {
                        continue;
                    };
                    // Elements left open inside the matched one end where it ends.
                    for &i in &open[depth + 1..] {
                        elements[i].end = Some(end_tag_open);
                    }
                    let i = open[depth];
                    open.truncate(depth);
                    elements[i].end_name = Some(token.start..token.end);
                    elements[i].end = Some(token.end);
                    closing = Some(i);
                }
                TokenKind::EndTagClose => {
                    if let Some(i) = closing.take() {
                        elements[i].end = Some(token.end);
                    }
                }
                _ => {}
            }
        }

        elements
    }
}

impl LanguageBackend for MarkupBackend {
    fn language(&self) -> Language {
        Language::Html
    }

    /// Tag names from custom data, offered right after `<`.
    fn complete(&self, document: &TextDocument, position: Position) -> Option<CompletionList> {
        let before = &document.text()[..document.offset_at(position)];
        let partial = before
            .bytes()
            .rev()
            .take_while(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b':'))
            .count();
        if !before[..before.len() - partial].ends_with('<') {
            return None;
        }

        let mut items: Vec<CompletionItem> = Vec::new();
        for tag in self.providers.iter().flat_map(|p| p.tags()) {
            if items.iter().any(|item| item.label == tag.name) {
                continue;
            }
            items.push(CompletionItem {
                label: tag.name.clone(),
                kind: Some(CompletionItemKind::PROPERTY),
                documentation: tag
                    .description
                    .as_ref()
                    .map(|d| Documentation::MarkupContent(d.to_markup())),
                ..Default::default()
            });
        }
        Some(CompletionList {
            is_incomplete: false,
            items,
        })
    }

    fn hover(&self, document: &TextDocument, position: Position) -> Option<Hover> {
        let offset = document.offset_at(position);
        let text = document.text();
        let index = document.line_index();
        self.elements(text).into_iter().find_map(|element| {
            let span = [Some(element.name.clone()), element.end_name.clone()]
                .into_iter()
                .flatten()
                .find(|span| span.start <= offset && offset <= span.end)?;
            let description = self.description(&element.tag)?;
            Some(Hover {
                contents: HoverContents::Markup(description.to_markup()),
                range: Some(index.span_to_range(&span)),
            })
        })
    }

    fn folding_ranges(&self, document: &TextDocument) -> Option<Vec<FoldingRange>> {
        let text = document.text();
        let mut ranges = Vec::new();

        for element in self.elements(text) {
            let Some(end_name) = element.end_name else {
                continue;
            };
            let start_line = document.position_at(element.start).line;
            // The end tag starts two bytes before its name.
            let end_tag_line = document.position_at(end_name.start.saturating_sub(2)).line;
            if end_tag_line > start_line + 1 {
                ranges.push(FoldingRange {
                    start_line,
                    end_line: end_tag_line - 1,
                    ..Default::default()
                });
            }
        }

        for token in Scanner::new(text).filter(|t| t.kind == TokenKind::Comment) {
            let start_line = document.position_at(token.start).line;
            let end_line = document.position_at(token.end).line;
            if end_line > start_line {
                ranges.push(FoldingRange {
                    start_line,
                    end_line,
                    kind: Some(FoldingRangeKind::Comment),
                    ..Default::default()
                });
            }
        }

        Some(ranges)
    }

    /// The start and end tag names of the element under `position`.
    fn linked_editing_ranges(
        &self,
        document: &TextDocument,
        position: Position,
    ) -> Option<Vec<Range>> {
        let offset = document.offset_at(position);
        let index = document.line_index();
        self.elements(document.text())
            .into_iter()
            .find_map(|element| {
                let end_name = element.end_name?;
                let on_name = |span: &Span<usize>| span.start <= offset && offset <= span.end;
                (on_name(&element.name) || on_name(&end_name)).then(|| {
                    vec![
                        index.span_to_range(&element.name),
                        index.span_to_range(&end_name),
                    ]
                })
            })
    }

    #[allow(deprecated)]
    fn document_symbols(&self, document: &TextDocument) -> Option<Vec<SymbolInformation>> {
        let elements = self.elements(document.text());
        let index = document.line_index();
        let symbols = elements
            .iter()
            .map(|element| {
                let end = element.end.unwrap_or(element.name.end);
                SymbolInformation {
                    name: element.label(),
                    kind: SymbolKind::FIELD,
                    tags: None,
                    deprecated: None,
                    location: Location::new(
                        document.uri().clone(),
                        index.span_to_range(&(element.start..end)),
                    ),
                    container_name: element.parent.map(|p| elements[p].label()),
                }
            })
            .collect();
        Some(symbols)
    }
}
