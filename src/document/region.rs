//! Embedded-language regions and per-language projections of a host document.
//!
//! A host document is partitioned into embedded regions (style/script blocks and
//! language-bearing attribute values) and the host-language gaps between them.
//! [`RegionIndex`] answers which language governs a position or range and builds
//! synthetic single-language documents that keep every LSP position valid.

use std::collections::HashMap;
use std::sync::Arc;

use tower_lsp::lsp_types::{Position, Range};

use crate::embedded::{extract_regions, ExtractedRegions};
use crate::language::Language;

use super::text::TextDocument;

/// Most embedded languages reported by [`RegionIndex::languages_in_document`].
const MAX_EMBEDDED_LANGUAGES: usize = 3;

/// Selector wrapped around `style` attribute values so they parse as a rule.
const CSS_ATTRIBUTE_PREFIX: &str = "__{";
const CSS_ATTRIBUTE_SUFFIX: &str = "}";
const SCRIPT_ATTRIBUTE_SUFFIX: &str = ";";

/// A contiguous span of the host document attributed to one embedded language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    /// `None` for a script block whose dialect could not be determined.
    pub language: Option<Language>,
    /// Byte offset of the first character.
    pub start: usize,
    /// Byte offset one past the last character.
    pub end: usize,
    /// Whether the region is an attribute value rather than a block body.
    pub attribute_value: bool,
}

impl Region {
    pub fn block(language: Option<Language>, start: usize, end: usize) -> Self {
        Self {
            language,
            start,
            end,
            attribute_value: false,
        }
    }

    pub fn attribute(language: Language, start: usize, end: usize) -> Self {
        Self {
            language: Some(language),
            start,
            end,
            attribute_value: true,
        }
    }

    fn prefix(&self) -> &'static str {
        match (self.attribute_value, self.language) {
            (true, Some(Language::Css)) => CSS_ATTRIBUTE_PREFIX,
            _ => "",
        }
    }

    fn suffix(&self) -> &'static str {
        match (self.attribute_value, self.language) {
            (true, Some(Language::Css)) => CSS_ATTRIBUTE_SUFFIX,
            (true, Some(Language::JavaScript)) => SCRIPT_ATTRIBUTE_SUFFIX,
            _ => "",
        }
    }
}

/// A clipped span of a query range governed by a single language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LanguageRange {
    pub start: Position,
    pub end: Position,
    /// `None` for a script block whose dialect could not be determined.
    pub language: Option<Language>,
    pub attribute_value: bool,
}

impl LanguageRange {
    pub fn range(&self) -> Range {
        Range::new(self.start, self.end)
    }
}

/// Immutable region set of one document version.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegionIndex {
    regions: Vec<Region>,
    imported_scripts: Vec<String>,
}

impl RegionIndex {
    /// Scan `text` and index its embedded regions.
    pub fn new(text: &str) -> Self {
        let ExtractedRegions {
            regions,
            imported_scripts,
        } = extract_regions(text);
        Self {
            regions,
            imported_scripts,
        }
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    /// Script URIs referenced through `<script src=...>`.
    pub fn imported_scripts(&self) -> &[String] {
        &self.imported_scripts
    }

    /// Language governing a byte offset.
    ///
    /// Both region ends are inclusive so a cursor sitting right after embedded
    /// content still belongs to it. Returns the host language outside every
    /// region and `None` inside a script block of unknown dialect.
    pub fn language_at_offset(&self, offset: usize) -> Option<Language> {
        for region in &self.regions {
            if region.start > offset {
                break;
            }
            if offset <= region.end {
                return region.language;
            }
        }
        Some(Language::Html)
    }

    pub fn language_at_position(
        &self,
        document: &TextDocument,
        position: Position,
    ) -> Option<Language> {
        self.language_at_offset(document.offset_at(position))
    }

    /// Partition `range` (or the whole document) into language ranges.
    ///
    /// The result tiles the query exactly: consecutive ranges share their
    /// boundary positions and host-language gaps are reported between regions.
    pub fn language_ranges(
        &self,
        document: &TextDocument,
        range: Option<Range>,
    ) -> Vec<LanguageRange> {
        let mut result = Vec::new();
        let (mut current_pos, mut current_offset, end_offset) = match range {
            Some(range) => (
                range.start,
                document.offset_at(range.start),
                document.offset_at(range.end),
            ),
            None => (Position::new(0, 0), 0, document.text().len()),
        };

        for region in &self.regions {
            if region.end <= current_offset || region.start >= end_offset {
                continue;
            }
            let start = region.start.max(current_offset);
            let start_pos = document.position_at(start);
            if current_offset < region.start {
                result.push(LanguageRange {
                    start: current_pos,
                    end: start_pos,
                    language: Some(Language::Html),
                    attribute_value: false,
                });
            }
            let end = region.end.min(end_offset);
            let end_pos = document.position_at(end);
            if end > region.start {
                result.push(LanguageRange {
                    start: start_pos,
                    end: end_pos,
                    language: region.language,
                    attribute_value: region.attribute_value,
                });
            }
            current_offset = end;
            current_pos = end_pos;
        }

        if current_offset < end_offset {
            let end_pos = match range {
                Some(range) => range.end,
                None => document.position_at(end_offset),
            };
            result.push(LanguageRange {
                start: current_pos,
                end: end_pos,
                language: Some(Language::Html),
                attribute_value: false,
            });
        }

        result
    }

    /// Distinct embedded languages in first-seen order, host language last.
    pub fn languages_in_document(&self) -> Vec<Language> {
        let mut result = Vec::new();
        for language in self.regions.iter().filter_map(|r| r.language) {
            if !result.contains(&language) {
                result.push(language);
                if result.len() == MAX_EMBEDDED_LANGUAGES {
                    break;
                }
            }
        }
        result.push(Language::Html);
        result
    }

    /// Build the synthetic single-language document for `language`.
    ///
    /// Content of matching regions is copied verbatim; everything else becomes
    /// whitespace with line breaks preserved, so the result has the host's line
    /// count and UTF-16 length and every LSP position means the same in both.
    pub fn embedded_document(
        &self,
        document: &TextDocument,
        language: Language,
        ignore_attribute_values: bool,
    ) -> TextDocument {
        let text = document.text();
        let mut projected = String::with_capacity(text.len());
        let mut cursor = 0;
        let mut pending_suffix = "";

        for region in &self.regions {
            if region.language != Some(language)
                || (ignore_attribute_values && region.attribute_value)
            {
                continue;
            }
            blank_gap(
                &mut projected,
                &text[cursor..region.start],
                pending_suffix,
                region.prefix(),
            );
            projected.push_str(&text[region.start..region.end]);
            cursor = region.end;
            pending_suffix = region.suffix();
        }
        blank_gap(&mut projected, &text[cursor..], pending_suffix, "");

        TextDocument::new(
            document.uri().clone(),
            language.as_str(),
            document.version(),
            projected,
        )
    }
}

/// Append `gap` with every non-line-break character replaced by spaces (one per
/// UTF-16 code unit), then write `before` over the start of its first line and
/// `after` over the end of its last line. A wrapper that does not fit in the
/// blank run of its line is dropped.
fn blank_gap(out: &mut String, gap: &str, before: &str, after: &str) {
    let mut blanked = String::with_capacity(gap.len());
    for c in gap.chars() {
        match c {
            '\n' | '\r' => blanked.push(c),
            _ => blanked.extend(std::iter::repeat(' ').take(c.len_utf16())),
        }
    }

    let first_line_end = blanked.find(['\n', '\r']).unwrap_or(blanked.len());
    let last_line_start = blanked.rfind(['\n', '\r']).map_or(0, |i| i + 1);

    let mut written = 0;
    if !before.is_empty() && before.len() <= first_line_end {
        blanked.replace_range(..before.len(), before);
        written = before.len();
    }
    if !after.is_empty() {
        let floor = if last_line_start == 0 {
            written
        } else {
            last_line_start
        };
        if let Some(after_start) = blanked.len().checked_sub(after.len()) {
            if after_start >= floor {
                blanked.replace_range(after_start.., after);
            }
        }
    }

    out.push_str(&blanked);
}

/// Cached per-version artifact: the region index plus every projection of the
/// languages it contains, built eagerly so the entry never changes after creation.
#[derive(Debug, Clone)]
pub struct DocumentRegions {
    index: RegionIndex,
    projections: HashMap<(Language, bool), Arc<TextDocument>>,
}

impl DocumentRegions {
    pub fn new(document: &TextDocument) -> Self {
        let index = RegionIndex::new(document.text());
        let mut projections = HashMap::new();
        for language in index.languages_in_document() {
            if language.is_host() {
                continue;
            }
            for ignore_attribute_values in [false, true] {
                let projected =
                    index.embedded_document(document, language, ignore_attribute_values);
                projections.insert((language, ignore_attribute_values), Arc::new(projected));
            }
        }
        Self { index, projections }
    }

    pub fn index(&self) -> &RegionIndex {
        &self.index
    }

    /// Projection of `document` onto `language`, served from the eagerly built
    /// set when available.
    pub fn embedded_document(
        &self,
        document: &TextDocument,
        language: Language,
        ignore_attribute_values: bool,
    ) -> Arc<TextDocument> {
        match self.projections.get(&(language, ignore_attribute_values)) {
            Some(projected) => Arc::clone(projected),
            None => Arc::new(
                self.index
                    .embedded_document(document, language, ignore_attribute_values),
            ),
        }
    }
}
