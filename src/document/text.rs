//! Offset and position arithmetic over document text.
//!
//! Byte offsets are used internally; LSP positions count UTF-16 code units
//! per line. Lines end at `\n`, `\r\n` or a lone `\r`.

use std::ops::Range as Span;

use tower_lsp::lsp_types::{Position, Range, Url};

/// Line table of a text, built once per document version.
#[derive(Debug, Clone)]
pub struct LineIndex {
    /// Byte offset of the first character of every line.
    line_starts: Vec<usize>,
    source: String,
}

impl LineIndex {
    pub fn new(source: String) -> Self {
        let bytes = source.as_bytes();
        let mut line_starts = vec![0];
        let mut i = 0;
        while i < bytes.len() {
            match bytes[i] {
                b'\r' if bytes.get(i + 1) == Some(&b'\n') => {
                    i += 1;
                    line_starts.push(i + 1);
                }
                b'\r' | b'\n' => line_starts.push(i + 1),
                _ => {}
            }
            i += 1;
        }

        Self {
            line_starts,
            source,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Number of lines, counting the (possibly empty) line after a trailing break.
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Byte span of `line` without its line break.
    fn line_content(&self, line: usize) -> Option<Span<usize>> {
        let start = *self.line_starts.get(line)?;
        let end = match self.line_starts.get(line + 1) {
            Some(&next) => {
                let line = &self.source[start..next];
                start + line.trim_end_matches(['\r', '\n']).len()
            }
            None => self.source.len(),
        };
        Some(start..end)
    }

    /// Position of a byte offset; offsets past the end clamp to the end.
    pub fn offset_to_position(&self, offset: usize) -> Position {
        let offset = offset.min(self.source.len());
        let line = self.line_starts.partition_point(|&start| start <= offset) - 1;
        let start = self.line_starts[line];
        let character: usize = self.source[start..]
            .char_indices()
            .take_while(|&(i, _)| start + i < offset)
            .map(|(_, c)| c.len_utf16())
            .sum();
        Position::new(line as u32, character as u32)
    }

    /// Byte offset of `position`, or `None` when its line does not exist.
    ///
    /// A character past the end of the line resolves to the end of the line,
    /// before its line break.
    pub fn position_to_offset(&self, position: Position) -> Option<usize> {
        let content = self.line_content(position.line as usize)?;
        let mut character = 0;
        for (i, c) in self.source[content.clone()].char_indices() {
            if character >= position.character {
                return Some(content.start + i);
            }
            character += c.len_utf16() as u32;
        }
        Some(content.end)
    }

    pub fn span_to_range(&self, span: &Span<usize>) -> Range {
        Range::new(
            self.offset_to_position(span.start),
            self.offset_to_position(span.end),
        )
    }
}

/// Immutable snapshot of a document at one version.
///
/// Host documents, synthetic per-language projections and the scratch documents
/// used while merging formatter output are all `TextDocument`s.
#[derive(Debug, Clone)]
pub struct TextDocument {
    uri: Url,
    language_id: String,
    version: i32,
    index: LineIndex,
}

impl TextDocument {
    pub fn new(uri: Url, language_id: impl Into<String>, version: i32, text: String) -> Self {
        Self {
            uri,
            language_id: language_id.into(),
            version,
            index: LineIndex::new(text),
        }
    }

    pub fn uri(&self) -> &Url {
        &self.uri
    }

    pub fn language_id(&self) -> &str {
        &self.language_id
    }

    pub fn version(&self) -> i32 {
        self.version
    }

    pub fn text(&self) -> &str {
        self.index.source()
    }

    pub fn line_index(&self) -> &LineIndex {
        &self.index
    }

    pub fn line_count(&self) -> usize {
        self.index.line_count()
    }

    /// Length of the text in UTF-16 code units, the unit LSP positions are measured in.
    pub fn utf16_len(&self) -> usize {
        self.text().encode_utf16().count()
    }

    pub fn position_at(&self, offset: usize) -> Position {
        self.index.offset_to_position(offset)
    }

    /// Byte offset of `position`, clamped to the document.
    pub fn offset_at(&self, position: Position) -> usize {
        self.index
            .position_to_offset(position)
            .unwrap_or(self.text().len())
    }

    /// Range covering the whole text.
    pub fn full_range(&self) -> Range {
        Range::new(Position::new(0, 0), self.position_at(self.text().len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(text: &str) -> LineIndex {
        LineIndex::new(text.to_string())
    }

    #[test]
    fn offsets_map_to_lines_and_columns() {
        let idx = index("<p>\n<b>x</b>\n");
        assert_eq!(idx.offset_to_position(0), Position::new(0, 0));
        assert_eq!(idx.offset_to_position(3), Position::new(0, 3));
        assert_eq!(idx.offset_to_position(4), Position::new(1, 0));
        assert_eq!(idx.offset_to_position(7), Position::new(1, 3));
        assert_eq!(idx.offset_to_position(13), Position::new(2, 0));
        assert_eq!(idx.line_count(), 3);
    }

    #[test]
    fn every_line_break_style_starts_a_line() {
        let idx = index("a\r\nb\rc\nd");
        assert_eq!(idx.line_count(), 4);
        assert_eq!(idx.offset_to_position(3), Position::new(1, 0));
        assert_eq!(idx.offset_to_position(5), Position::new(2, 0));
        assert_eq!(idx.offset_to_position(7), Position::new(3, 0));
        assert_eq!(idx.position_to_offset(Position::new(2, 0)), Some(5));
    }

    #[test]
    fn column_past_line_end_stops_before_break() {
        let idx = index("ab\r\ncd");
        assert_eq!(idx.position_to_offset(Position::new(0, 10)), Some(2));
        assert_eq!(idx.position_to_offset(Position::new(1, 1)), Some(5));
        assert_eq!(idx.position_to_offset(Position::new(1, 9)), Some(6));
    }

    #[test]
    fn columns_count_utf16_units() {
        let idx = index("é😀<");
        assert_eq!(idx.offset_to_position(2), Position::new(0, 1));
        assert_eq!(idx.offset_to_position(6), Position::new(0, 3));
        assert_eq!(idx.position_to_offset(Position::new(0, 3)), Some(6));
    }

    #[test]
    fn missing_lines_and_offsets_clamp() {
        let idx = index("hello");
        assert_eq!(idx.position_to_offset(Position::new(5, 0)), None);
        assert_eq!(idx.offset_to_position(99), Position::new(0, 5));
    }

    #[test]
    fn document_offsets_clamp() {
        let uri = Url::parse("file:///a.html").unwrap();
        let doc = TextDocument::new(uri, "html", 1, "ab\ncd\n".to_string());
        assert_eq!(doc.offset_at(Position::new(9, 0)), 6);
        assert_eq!(doc.full_range().end, Position::new(2, 0));
        assert_eq!(doc.utf16_len(), 6);
    }
}
