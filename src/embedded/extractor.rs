//! Region extraction for style blocks, script blocks and language-bearing attributes.

use regex::Regex;
use std::sync::LazyLock;

use crate::document::Region;
use crate::language::Language;

use super::scanner::{Scanner, TokenKind};

/// Attribute names whose values are embedded code: `style` and `on*` handlers.
static ATTRIBUTE_LANGUAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(style)$|^(on\w+)$").unwrap());

/// Script `type` values that keep the default JavaScript dialect.
static JAVASCRIPT_TYPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"["'](module|(text|application)/(java|ecma)script|text/babel)["']"#).unwrap()
});

static TYPESCRIPT_TYPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"["']text/typescript["']"#).unwrap());

/// Result of scanning a host document once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedRegions {
    /// Embedded regions in ascending, non-overlapping order.
    pub regions: Vec<Region>,
    /// Unquoted `src` values of script tags.
    pub imported_scripts: Vec<String>,
}

/// Extract all embedded-language regions from host markup in a single pass.
pub fn extract_regions(source: &str) -> ExtractedRegions {
    let mut extracted = ExtractedRegions::default();
    let mut last_tag = String::new();
    let mut last_attribute: Option<&str> = None;
    let mut script_language = Some(Language::JavaScript);

    for token in Scanner::new(source) {
        match token.kind {
            TokenKind::StartTag => {
                last_tag = token.text(source).to_ascii_lowercase();
                last_attribute = None;
                script_language = Some(Language::JavaScript);
            }
            TokenKind::Styles => {
                extracted
                    .regions
                    .push(Region::block(Some(Language::Css), token.start, token.end));
            }
            TokenKind::Script => {
                extracted
                    .regions
                    .push(Region::block(script_language, token.start, token.end));
            }
            TokenKind::AttributeName => {
                last_attribute = Some(token.text(source));
            }
            TokenKind::AttributeValue => {
                let value = token.text(source);
                let in_script = last_tag == "script";
                match last_attribute {
                    Some(name) if in_script && name.eq_ignore_ascii_case("src") => {
                        let (start, end) = unquoted_span(source, token.start, token.end);
                        extracted
                            .imported_scripts
                            .push(source[start..end].to_string());
                    }
                    Some(name) if in_script && name.eq_ignore_ascii_case("type") => {
                        script_language = script_dialect(value);
                    }
                    Some(name) => {
                        if let Some(language) = attribute_language(name) {
                            let (start, end) = unquoted_span(source, token.start, token.end);
                            extracted
                                .regions
                                .push(Region::attribute(language, start, end));
                        }
                    }
                    None => {}
                }
                last_attribute = None;
            }
            _ => {}
        }
    }

    extracted
}

/// Language of an attribute value, if the attribute carries embedded code.
fn attribute_language(name: &str) -> Option<Language> {
    let caps = ATTRIBUTE_LANGUAGE.captures(name)?;
    if caps.get(1).is_some() {
        Some(Language::Css)
    } else {
        Some(Language::JavaScript)
    }
}

/// Dialect implied by a script `type` attribute value; `None` when unrecognised.
fn script_dialect(raw_value: &str) -> Option<Language> {
    if JAVASCRIPT_TYPE.is_match(raw_value) {
        Some(Language::JavaScript)
    } else if TYPESCRIPT_TYPE.is_match(raw_value) {
        Some(Language::TypeScript)
    } else {
        None
    }
}

/// Span of an attribute value without its surrounding quotes.
fn unquoted_span(source: &str, start: usize, end: usize) -> (usize, usize) {
    let bytes = source.as_bytes();
    match bytes.get(start) {
        Some(&(quote @ (b'"' | b'\''))) => {
            let closed = end - start >= 2 && bytes[end - 1] == quote;
            (start + 1, if closed { end - 1 } else { end })
        }
        _ => (start, end),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn languages(source: &str) -> Vec<(Option<Language>, &str, bool)> {
        extract_regions(source)
            .regions
            .iter()
            .map(|r| (r.language, &source[r.start..r.end], r.attribute_value))
            .collect()
    }

    #[test]
    fn style_and_script_blocks() {
        let regions = languages("<style>h1{}</style><script>go()</script>");
        assert_eq!(
            regions,
            vec![
                (Some(Language::Css), "h1{}", false),
                (Some(Language::JavaScript), "go()", false),
            ]
        );
    }

    #[test]
    fn attribute_values_strip_quotes() {
        let regions = languages(r#"<a style='color: blue' ONCLICK="noop" title="x"></a>"#);
        assert_eq!(
            regions,
            vec![
                (Some(Language::Css), "color: blue", true),
                (Some(Language::JavaScript), "noop", true),
            ]
        );
    }

    #[test]
    fn unquoted_attribute_value() {
        let regions = languages("<div onload=init()></div>");
        assert_eq!(regions, vec![(Some(Language::JavaScript), "init()", true)]);
    }

    #[test]
    fn typescript_dialect() {
        let regions = languages(r#"<script type="text/typescript">let a: number</script>"#);
        assert_eq!(
            regions,
            vec![(Some(Language::TypeScript), "let a: number", false)]
        );
    }

    #[test]
    fn module_type_stays_javascript() {
        let regions = languages(r#"<script type="module">import x</script>"#);
        assert_eq!(regions, vec![(Some(Language::JavaScript), "import x", false)]);
    }

    #[test]
    fn unknown_dialect_is_unrecognised() {
        let regions = languages(r#"<script type="text/plain">hello</script>"#);
        assert_eq!(regions, vec![(None, "hello", false)]);
    }

    #[test]
    fn dialect_resets_on_next_tag() {
        let source = r#"<script type="text/plain">a</script><script>b</script>"#;
        let regions = languages(source);
        assert_eq!(regions[1], (Some(Language::JavaScript), "b", false));
    }

    #[test]
    fn script_src_is_recorded_not_extracted() {
        let extracted = extract_regions(r#"<script src="lib/app.js"></script>"#);
        assert!(extracted.regions.is_empty());
        assert_eq!(extracted.imported_scripts, vec!["lib/app.js".to_string()]);
    }

    #[test]
    fn regions_are_sorted_and_disjoint() {
        let source = "<p style='a:b'></p><style>x</style><b onclick='f()'></b><script>y</script>";
        let regions = extract_regions(source).regions;
        for pair in regions.windows(2) {
            assert!(pair[0].end <= pair[1].start);
        }
        assert_eq!(regions.len(), 4);
    }
}
