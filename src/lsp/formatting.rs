//! Formatting of mixed-language documents.
//!
//! The host formatter runs first so embedded formatters see the final
//! indentation of their blocks. Their edits are then applied to a scratch copy
//! of the host-formatted text and collapsed into a single replacement edit,
//! which cannot overlap with the host edits it supersedes.

use tower_lsp::lsp_types::{FormattingOptions, Position, Range, TextEdit};

use crate::document::TextDocument;
use crate::errors::EditError;
use crate::language::Language;

use super::backend::LanguageBackend;
use super::multiplexer::Multiplexer;

/// Host-formatted copy of a document whose cached regions are released on drop.
struct ScratchDocument<'a> {
    mux: &'a Multiplexer,
    document: TextDocument,
}

impl<'a> ScratchDocument<'a> {
    fn new(mux: &'a Multiplexer, original: &TextDocument, text: String) -> Self {
        let mut uri = original.uri().clone();
        let path = format!("{}.tmp", uri.path());
        uri.set_path(&path);
        Self {
            mux,
            document: TextDocument::new(uri, original.language_id(), original.version(), text),
        }
    }
}

impl Drop for ScratchDocument<'_> {
    fn drop(&mut self) {
        self.mux.remove_document(self.document.uri());
    }
}

/// Format `range` of `document`.
///
/// Embedded ranges before the first host range are formatted on their own.
/// From there the host formatter runs over the rest of the range, and when
/// embedded formatters change the host-formatted text the whole remainder is
/// replaced by one edit.
pub fn format(
    mux: &Multiplexer,
    document: &TextDocument,
    range: Range,
    options: &FormattingOptions,
) -> Result<Vec<TextEdit>, EditError> {
    let range = trim_trailing_line_break(document, range);
    let mut result = Vec::new();

    let mut start = range.start;
    let mut reached_host = false;
    for (language_range, backend) in mux.backend_ranges(document, Some(range)) {
        if language_range.language.is_some_and(Language::is_host) {
            reached_host = true;
            break;
        }
        if let Some(backend) = backend.filter(|_| !language_range.attribute_value) {
            let prefix = Range::new(start, language_range.end);
            if let Some(edits) = format_embedded(mux, document, backend.as_ref(), prefix, options) {
                result.extend(edits);
            }
        }
        start = language_range.end;
    }
    if !reached_host {
        return Ok(result);
    }

    let range = Range::new(start, range.end);
    let host_edits = mux
        .backend(Language::Html)
        .and_then(|host| host.format(document, range, options))
        .unwrap_or_default();
    let scratch = ScratchDocument::new(mux, document, apply_edits(document, &host_edits)?);
    let formatted = &scratch.document;

    // Length of the unchanged text after the range, identical in both documents.
    let trailing = document.text().len() - document.offset_at(range.end);
    let formatted_end = formatted
        .text()
        .len()
        .checked_sub(trailing)
        .ok_or(EditError::TruncatedContent)?;
    let formatted_range = Range::new(range.start, formatted.position_at(formatted_end));

    let mut embedded_edits = Vec::new();
    for (language_range, backend) in mux.backend_ranges(formatted, Some(formatted_range)) {
        let Some(backend) = backend else {
            continue;
        };
        if language_range.attribute_value || backend.language().is_host() {
            continue;
        }
        if let Some(edits) =
            format_embedded(mux, formatted, backend.as_ref(), language_range.range(), options)
        {
            embedded_edits.extend(edits);
        }
    }

    if embedded_edits.is_empty() {
        result.extend(host_edits);
        return Ok(result);
    }

    let merged = apply_edits(formatted, &embedded_edits)?;
    let replace_start = document.offset_at(range.start);
    let replace_end = merged
        .len()
        .checked_sub(trailing)
        .ok_or(EditError::TruncatedContent)?;
    let new_text = merged
        .get(replace_start..replace_end)
        .ok_or(EditError::TruncatedContent)?;
    tracing::debug!(
        host_edits = host_edits.len(),
        embedded_edits = embedded_edits.len(),
        "merged formatting into one edit"
    );
    result.push(TextEdit::new(range, new_text.to_string()));
    Ok(result)
}

fn format_embedded(
    mux: &Multiplexer,
    document: &TextDocument,
    backend: &dyn LanguageBackend,
    range: Range,
    options: &FormattingOptions,
) -> Option<Vec<TextEdit>> {
    if !mux.settings().format_enabled(backend.language()) {
        return None;
    }
    let view = mux.view(document, backend, true);
    backend.format(&view, range, options)
}

/// Pull a range ending at the start of a line back over the preceding line
/// break, unless it ends the document.
fn trim_trailing_line_break(document: &TextDocument, range: Range) -> Range {
    let end = range.end;
    let text = document.text();
    let mut end_offset = document.offset_at(end);
    if end.character != 0 || end.line == 0 || end_offset == text.len() {
        return range;
    }
    let floor = document
        .offset_at(Position::new(end.line - 1, 0))
        .max(document.offset_at(range.start));
    let bytes = text.as_bytes();
    while end_offset > floor && matches!(bytes[end_offset - 1], b'\n' | b'\r') {
        end_offset -= 1;
    }
    Range::new(range.start, document.position_at(end_offset))
}

/// Apply `edits` to the text of `document`.
///
/// Edits are applied in start order; edits starting at the same position keep
/// their given order.
pub fn apply_edits(document: &TextDocument, edits: &[TextEdit]) -> Result<String, EditError> {
    let mut sorted: Vec<&TextEdit> = edits.iter().collect();
    sorted.sort_by_key(|edit| edit.range.start);

    let text = document.text();
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for edit in sorted {
        let start = document.offset_at(edit.range.start);
        let end = document.offset_at(edit.range.end);
        if end < start {
            return Err(EditError::InvertedRange {
                position: edit.range.start,
            });
        }
        if start < last {
            return Err(EditError::Overlapping {
                position: edit.range.start,
            });
        }
        out.push_str(&text[last..start]);
        out.push_str(&edit.new_text);
        last = end;
    }
    out.push_str(&text[last..]);
    Ok(out)
}
