//! Low-level lexical scanner for host markup.
//!
//! The scanner only recognises what region extraction and the built-in markup
//! backend need: tag boundaries, attribute names and values, comments, and the
//! raw bodies of `<script>` and `<style>` elements. It never fails; malformed
//! input degrades to `Content` or `Unknown` tokens.

use regex::Regex;
use std::sync::LazyLock;

/// Kind of a scanned token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    StartTagOpen,
    StartTag,
    StartTagClose,
    StartTagSelfClose,
    EndTagOpen,
    EndTag,
    EndTagClose,
    AttributeName,
    DelimiterAssign,
    AttributeValue,
    Comment,
    Doctype,
    Content,
    Script,
    Styles,
    Unknown,
}

/// A token with its byte span in the scanned source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
}

impl Token {
    /// The source text covered by this token.
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start..self.end]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    WithinContent,
    AfterOpeningStartTag,
    WithinTag,
    AfterAttributeName,
    BeforeAttributeValue,
    AfterOpeningEndTag,
    WithinEndTag,
    WithinScriptContent,
    WithinStyleContent,
}

static SCRIPT_END: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)</script").unwrap());
static STYLE_END: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)</style").unwrap());

/// Iterator over the tokens of a markup document.
#[derive(Debug, Clone)]
pub struct Scanner<'a> {
    source: &'a str,
    pos: usize,
    state: State,
    last_tag: String,
}

impl<'a> Scanner<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            pos: 0,
            state: State::WithinContent,
            last_tag: String::new(),
        }
    }

    fn rest(&self) -> &'a str {
        &self.source[self.pos..]
    }

    fn eat(&mut self, prefix: &str) -> bool {
        if self.rest().starts_with(prefix) {
            self.pos += prefix.len();
            true
        } else {
            false
        }
    }

    fn skip_whitespace(&mut self) -> bool {
        let start = self.pos;
        let bytes = self.source.as_bytes();
        while self.pos < bytes.len() && bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
        self.pos > start
    }

    /// Advance while bytes satisfy `predicate`. Stops only on ASCII bytes, so the
    /// resulting position is always a char boundary.
    fn advance_while(&mut self, predicate: impl Fn(u8) -> bool) -> usize {
        let start = self.pos;
        let bytes = self.source.as_bytes();
        while self.pos < bytes.len() && predicate(bytes[self.pos]) {
            self.pos += 1;
        }
        self.pos - start
    }

    fn advance_until(&mut self, needle: &str) -> bool {
        match self.rest().find(needle) {
            Some(i) => {
                self.pos += i + needle.len();
                true
            }
            None => {
                self.pos = self.source.len();
                false
            }
        }
    }

    fn advance_char(&mut self) {
        let width = self.rest().chars().next().map_or(1, char::len_utf8);
        self.pos += width;
    }

    fn raw_text_end(&self, pattern: &Regex) -> usize {
        pattern
            .find(self.rest())
            .map_or(self.source.len(), |m| self.pos + m.start())
    }

    fn token(&self, kind: TokenKind, start: usize) -> Option<Token> {
        Some(Token {
            kind,
            start,
            end: self.pos,
        })
    }

    /// Scan one step. Returns `None` when the step only consumed whitespace or
    /// switched state.
    fn scan(&mut self) -> Option<Token> {
        let start = self.pos;
        match self.state {
            State::WithinContent => {
                if self.eat("<!--") {
                    self.advance_until("-->");
                    return self.token(TokenKind::Comment, start);
                }
                if self.eat("<!") {
                    self.advance_until(">");
                    return self.token(TokenKind::Doctype, start);
                }
                if self.eat("</") {
                    self.state = State::AfterOpeningEndTag;
                    return self.token(TokenKind::EndTagOpen, start);
                }
                if self.eat("<") {
                    self.state = State::AfterOpeningStartTag;
                    return self.token(TokenKind::StartTagOpen, start);
                }
                self.advance_while(|b| b != b'<');
                self.token(TokenKind::Content, start)
            }
            State::AfterOpeningStartTag => {
                if self.advance_while(is_name_byte) > 0 {
                    self.last_tag = self.source[start..self.pos].to_ascii_lowercase();
                    self.state = State::WithinTag;
                    return self.token(TokenKind::StartTag, start);
                }
                self.state = State::WithinContent;
                None
            }
            State::WithinTag => {
                if self.skip_whitespace() {
                    return None;
                }
                if self.eat("/>") {
                    self.state = State::WithinContent;
                    return self.token(TokenKind::StartTagSelfClose, start);
                }
                if self.eat(">") {
                    self.state = match self.last_tag.as_str() {
                        "script" => State::WithinScriptContent,
                        "style" => State::WithinStyleContent,
                        _ => State::WithinContent,
                    };
                    return self.token(TokenKind::StartTagClose, start);
                }
                if self.rest().starts_with('<') {
                    self.state = State::WithinContent;
                    return None;
                }
                if self.advance_while(is_name_byte) > 0 {
                    self.state = State::AfterAttributeName;
                    return self.token(TokenKind::AttributeName, start);
                }
                self.advance_char();
                self.token(TokenKind::Unknown, start)
            }
            State::AfterAttributeName => {
                if self.skip_whitespace() {
                    return None;
                }
                if self.eat("=") {
                    self.state = State::BeforeAttributeValue;
                    return self.token(TokenKind::DelimiterAssign, start);
                }
                self.state = State::WithinTag;
                None
            }
            State::BeforeAttributeValue => {
                if self.skip_whitespace() {
                    return None;
                }
                self.state = State::WithinTag;
                if let Some(quote) = self.rest().chars().next().filter(|c| *c == '"' || *c == '\'')
                {
                    self.pos += 1;
                    let mut buf = [0u8; 4];
                    self.advance_until(quote.encode_utf8(&mut buf));
                    return self.token(TokenKind::AttributeValue, start);
                }
                if self.advance_while(is_unquoted_value_byte) > 0 {
                    return self.token(TokenKind::AttributeValue, start);
                }
                None
            }
            State::AfterOpeningEndTag => {
                self.state = State::WithinEndTag;
                if self.advance_while(is_name_byte) > 0 {
                    return self.token(TokenKind::EndTag, start);
                }
                None
            }
            State::WithinEndTag => {
                if self.skip_whitespace() {
                    return None;
                }
                if self.eat(">") {
                    self.state = State::WithinContent;
                    return self.token(TokenKind::EndTagClose, start);
                }
                if self.rest().starts_with('<') {
                    self.state = State::WithinContent;
                    return None;
                }
                self.advance_char();
                self.token(TokenKind::Unknown, start)
            }
            State::WithinScriptContent | State::WithinStyleContent => {
                let (pattern, kind) = if self.state == State::WithinScriptContent {
                    (&*SCRIPT_END, TokenKind::Script)
                } else {
                    (&*STYLE_END, TokenKind::Styles)
                };
                self.pos = self.raw_text_end(pattern);
                self.state = State::WithinContent;
                if self.pos > start {
                    return self.token(kind, start);
                }
                None
            }
        }
    }
}

impl Iterator for Scanner<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        while self.pos < self.source.len() {
            if let Some(token) = self.scan() {
                return Some(token);
            }
        }
        None
    }
}

fn is_name_byte(b: u8) -> bool {
    !b.is_ascii_whitespace() && !matches!(b, b'/' | b'>' | b'<' | b'=' | b'"' | b'\'')
}

fn is_unquoted_value_byte(b: u8) -> bool {
    !b.is_ascii_whitespace() && !matches!(b, b'"' | b'\'' | b'`' | b'=' | b'<' | b'>')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<(TokenKind, &str)> {
        Scanner::new(source)
            .map(|t| (t.kind, t.text(source)))
            .collect()
    }

    #[test]
    fn scans_tag_with_attributes() {
        let tokens = kinds(r#"<a href="x" hidden>hi</a>"#);
        assert_eq!(
            tokens,
            vec![
                (TokenKind::StartTagOpen, "<"),
                (TokenKind::StartTag, "a"),
                (TokenKind::AttributeName, "href"),
                (TokenKind::DelimiterAssign, "="),
                (TokenKind::AttributeValue, "\"x\""),
                (TokenKind::AttributeName, "hidden"),
                (TokenKind::StartTagClose, ">"),
                (TokenKind::Content, "hi"),
                (TokenKind::EndTagOpen, "</"),
                (TokenKind::EndTag, "a"),
                (TokenKind::EndTagClose, ">"),
            ]
        );
    }

    #[test]
    fn scans_raw_script_body() {
        let source = "<SCRIPT>if (a < b) {}</Script>";
        let tokens = kinds(source);
        assert!(tokens.contains(&(TokenKind::Script, "if (a < b) {}")));
        assert_eq!(tokens.last(), Some(&(TokenKind::EndTagClose, ">")));
    }

    #[test]
    fn empty_style_body_yields_no_token() {
        let tokens = kinds("<style></style>");
        assert!(!tokens.iter().any(|(kind, _)| *kind == TokenKind::Styles));
    }

    #[test]
    fn unterminated_style_runs_to_end() {
        let tokens = kinds("<style>h1 {}");
        assert_eq!(tokens.last(), Some(&(TokenKind::Styles, "h1 {}")));
    }

    #[test]
    fn comments_and_doctype() {
        let tokens = kinds("<!DOCTYPE html><!-- <style> -->");
        assert_eq!(
            tokens,
            vec![
                (TokenKind::Doctype, "<!DOCTYPE html>"),
                (TokenKind::Comment, "<!-- <style> -->"),
            ]
        );
    }

    #[test]
    fn unquoted_and_self_closing() {
        let tokens = kinds("<img src=a.png/>");
        assert!(tokens.contains(&(TokenKind::AttributeValue, "a.png/")));
        let tokens = kinds("<br/>");
        assert_eq!(tokens.last(), Some(&(TokenKind::StartTagSelfClose, "/>")));
    }

    #[test]
    fn non_ascii_content_keeps_char_boundaries() {
        let tokens = kinds("<p é>ü</p>");
        assert!(tokens.contains(&(TokenKind::AttributeName, "é")));
        assert!(tokens.contains(&(TokenKind::Content, "ü")));
    }
}
