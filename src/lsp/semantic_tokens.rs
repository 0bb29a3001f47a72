//! Semantic tokens unified across language backends.
//!
//! Each backend reports tokens against its own legend. The unifier merges all
//! legends into one shared legend once, remaps every backend's type indices and
//! modifier bits into it, and delta-encodes the combined token stream.

use std::collections::HashMap;

use tower_lsp::lsp_types::{Position, Range, SemanticToken, SemanticTokensLegend};

use crate::document::TextDocument;
use crate::language::Language;

use super::multiplexer::Multiplexer;
use super::registry::BackendRegistry;

/// A token in the index space of the backend that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SemanticTokenEntry {
    pub start: Position,
    /// Length in UTF-16 code units; tokens never span lines.
    pub length: u32,
    pub token_type: u32,
    pub modifiers: u32,
}

impl SemanticTokenEntry {
    pub fn new(line: u32, character: u32, length: u32, token_type: u32, modifiers: u32) -> Self {
        Self {
            start: Position::new(line, character),
            length,
            token_type,
            modifiers,
        }
    }

    fn end(&self) -> Position {
        Position::new(
            self.start.line,
            self.start.character.saturating_add(self.length),
        )
    }
}

/// Remap from one backend's legend into the shared legend.
///
/// `None` means the backend's indices already match the shared ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LegendMapping {
    pub types: Option<Vec<u32>>,
    pub modifiers: Option<Vec<u32>>,
}

impl LegendMapping {
    fn apply(&self, token: &mut SemanticTokenEntry) {
        if let Some(types) = &self.types {
            if let Some(&mapped) = types.get(token.token_type as usize) {
                token.token_type = mapped;
            }
        }
        if let Some(modifiers) = &self.modifiers {
            token.modifiers = remap_modifiers(token.modifiers, modifiers);
        }
    }
}

/// Merges the semantic tokens of every backend active in a document.
#[derive(Debug, Clone)]
pub struct SemanticTokenUnifier {
    legend: SemanticTokensLegend,
    mappings: HashMap<Language, LegendMapping>,
}

impl SemanticTokenUnifier {
    /// Build the shared legend from every backend exposing one, in registration order.
    pub fn new(registry: &BackendRegistry) -> Self {
        let mut legend = SemanticTokensLegend {
            token_types: Vec::new(),
            token_modifiers: Vec::new(),
        };
        let mut mappings = HashMap::new();
        for backend in registry.iter() {
            let Some(local) = backend.semantic_token_legend() else {
                continue;
            };
            let mapping = LegendMapping {
                types: create_mapping(&local.token_types, &mut legend.token_types),
                modifiers: create_mapping(&local.token_modifiers, &mut legend.token_modifiers),
            };
            mappings.insert(backend.language(), mapping);
        }
        tracing::debug!(
            types = legend.token_types.len(),
            modifiers = legend.token_modifiers.len(),
            "built shared semantic token legend"
        );
        Self { legend, mappings }
    }

    pub fn legend(&self) -> &SemanticTokensLegend {
        &self.legend
    }

    pub fn mapping(&self, language: Language) -> Option<&LegendMapping> {
        self.mappings.get(&language)
    }

    /// Encoded tokens of `document` within `ranges` (the whole document when `None`).
    pub fn semantic_tokens(
        &self,
        mux: &Multiplexer,
        document: &TextDocument,
        ranges: Option<&[Range]>,
    ) -> Vec<SemanticToken> {
        let mut tokens = Vec::new();
        for backend in mux.active_backends(document) {
            let Some(mapping) = self.mappings.get(&backend.language()) else {
                continue;
            };
            let view = mux.view(document, backend.as_ref(), false);
            let Some(mut produced) = backend.semantic_tokens(&view) else {
                continue;
            };
            for token in &mut produced {
                mapping.apply(token);
            }
            tokens.extend(produced);
        }
        let ranges = match ranges {
            Some(ranges) => ranges.to_vec(),
            None => vec![Range::new(
                Position::new(0, 0),
                Position::new(document.line_count() as u32, 0),
            )],
        };
        encode_tokens(tokens, ranges)
    }
}

/// Record the shared index of every local entry, appending entries the shared
/// list lacks. Returns `None` when every entry keeps its index.
pub fn create_mapping<T: PartialEq + Clone>(
    local: &[T],
    shared: &mut Vec<T>,
) -> Option<Vec<u32>> {
    let mut mapping = Vec::with_capacity(local.len());
    let mut needs_mapping = false;
    for (index, entry) in local.iter().enumerate() {
        let shared_index = match shared.iter().position(|e| e == entry) {
            Some(existing) => existing,
            None => {
                shared.push(entry.clone());
                shared.len() - 1
            }
        };
        needs_mapping |= shared_index != index;
        mapping.push(shared_index as u32);
    }
    needs_mapping.then_some(mapping)
}

/// Move every set bit of `bitset` to the position `mapping` assigns it.
///
/// Bits without a mapping, or mapped past the 32 bits of the set, are dropped.
pub fn remap_modifiers(bitset: u32, mapping: &[u32]) -> u32 {
    let mut result = 0;
    let mut remaining = bitset;
    let mut index = 0;
    while remaining > 0 {
        if remaining & 1 != 0 {
            if let Some(&mapped) = mapping.get(index) {
                if mapped < u32::BITS {
                    result |= 1 << mapped;
                }
            }
        }
        index += 1;
        remaining >>= 1;
    }
    result
}

/// Sort `tokens` and delta-encode those lying entirely within one of `ranges`.
///
/// Tokens and ranges are walked together in a single forward pass. A token
/// straddling a range boundary or sitting between ranges is dropped.
pub fn encode_tokens(
    mut tokens: Vec<SemanticTokenEntry>,
    mut ranges: Vec<Range>,
) -> Vec<SemanticToken> {
    tokens.sort_by_key(|t| (t.start.line, t.start.character));
    ranges.sort_by_key(|r| r.start);

    let mut result = Vec::with_capacity(tokens.len());
    let mut ranges = ranges.into_iter().peekable();
    let mut prev_line = 0u32;
    let mut prev_start = 0u32;

    for token in tokens {
        while ranges.next_if(|range| range.end <= token.start).is_some() {}
        let Some(range) = ranges.peek() else {
            break;
        };
        if range.start > token.start || token.end() > range.end {
            continue;
        }

        let pos = token.start;
        let delta_line = pos.line - prev_line;
        let delta_start = if delta_line == 0 {
            pos.character - prev_start
        } else {
            pos.character
        };

        result.push(SemanticToken {
            delta_line,
            delta_start,
            length: token.length,
            token_type: token.token_type,
            token_modifiers_bitset: token.modifiers,
        });

        prev_line = pos.line;
        prev_start = pos.character;
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lsp::test_support::{html_doc, FakeBackend};
    use crate::settings::Settings;
    use std::sync::Arc;
    use tower_lsp::lsp_types::{SemanticTokenModifier, SemanticTokenType};

    fn decode(tokens: &[SemanticToken]) -> Vec<(u32, u32, u32, u32, u32)> {
        let mut line = 0;
        let mut character = 0;
        tokens
            .iter()
            .map(|t| {
                if t.delta_line > 0 {
                    character = 0;
                }
                line += t.delta_line;
                character += t.delta_start;
                (
                    line,
                    character,
                    t.length,
                    t.token_type,
                    t.token_modifiers_bitset,
                )
            })
            .collect()
    }

    fn legend(types: &[&'static str], modifiers: &[&'static str]) -> SemanticTokensLegend {
        SemanticTokensLegend {
            token_types: types.iter().copied().map(SemanticTokenType::new).collect(),
            token_modifiers: modifiers
                .iter()
                .copied()
                .map(SemanticTokenModifier::new)
                .collect(),
        }
    }

    #[test]
    fn identity_mapping_is_none() {
        let mut shared = vec!["a", "b"];
        assert_eq!(create_mapping(&["a", "b"], &mut shared), None);
        assert_eq!(create_mapping(&["b", "c"], &mut shared), Some(vec![1, 2]));
        assert_eq!(shared, vec!["a", "b", "c"]);
    }

    #[test]
    fn modifier_bits_are_relocated() {
        assert_eq!(remap_modifiers(0b101, &[3, 0, 1]), 0b1010);
        assert_eq!(remap_modifiers(0b11, &[40, 2]), 0b100);
        assert_eq!(remap_modifiers(0b1000, &[0]), 0);
        assert_eq!(remap_modifiers(0, &[5]), 0);
    }

    #[test]
    fn encode_filters_by_ranges_and_round_trips() {
        let tokens = vec![
            SemanticTokenEntry::new(2, 4, 3, 1, 0),
            SemanticTokenEntry::new(0, 2, 2, 0, 1),
            SemanticTokenEntry::new(0, 6, 4, 2, 0),
            SemanticTokenEntry::new(5, 0, 5, 0, 0),
            SemanticTokenEntry::new(2, 9, 4, 1, 0),
        ];
        let ranges = vec![
            Range::new(Position::new(2, 0), Position::new(2, 11)),
            Range::new(Position::new(0, 0), Position::new(1, 0)),
        ];
        let encoded = encode_tokens(tokens, ranges);
        assert_eq!(
            decode(&encoded),
            vec![(0, 2, 2, 0, 1), (0, 6, 4, 2, 0), (2, 4, 3, 1, 0)]
        );
        assert_eq!(encoded[1].delta_start, 4);
        assert_eq!(encoded[2].delta_line, 2);
        assert_eq!(encoded[2].delta_start, 4);
    }

    #[test]
    fn token_running_past_the_last_column_is_dropped() {
        let tokens = vec![
            SemanticTokenEntry::new(0, u32::MAX - 1, 10, 0, 0),
            SemanticTokenEntry::new(0, 1, 2, 0, 0),
        ];
        let ranges = vec![Range::new(Position::new(0, 0), Position::new(0, 100))];
        let encoded = encode_tokens(tokens, ranges);
        assert_eq!(decode(&encoded), vec![(0, 1, 2, 0, 0)]);
    }

    #[test]
    fn unifies_backends_into_shared_legend() {
        let css = Arc::new(FakeBackend::new(Language::Css).with_tokens(
            legend(&["property", "string"], &["declaration"]),
            vec![SemanticTokenEntry::new(1, 0, 2, 0, 1)],
        ));
        let js = Arc::new(FakeBackend::new(Language::JavaScript).with_tokens(
            legend(&["function", "property"], &["readonly", "declaration"]),
            vec![SemanticTokenEntry::new(3, 0, 5, 1, 0b10)],
        ));
        let mut registry = BackendRegistry::new();
        registry.register(css).unwrap();
        registry.register(js).unwrap();

        let unifier = SemanticTokenUnifier::new(&registry);
        assert_eq!(
            unifier.legend(),
            &legend(&["property", "string", "function"], &["declaration", "readonly"])
        );
        assert_eq!(unifier.mapping(Language::Css), Some(&LegendMapping::default()));

        let mux = Multiplexer::new(registry, Settings::default());
        let document = html_doc("<style>\nh1{}\n</style><script>\nfoo()\n</script>");
        let encoded = unifier.semantic_tokens(&mux, &document, None);
        assert_eq!(decode(&encoded), vec![(1, 0, 2, 0, 1), (3, 0, 5, 0, 1)]);
    }
}
