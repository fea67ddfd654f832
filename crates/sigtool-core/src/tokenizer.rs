//! Lexical scanner for signature files.
//!
//! Produces a flat token vector with byte spans into the source. Comments
//! (including the format header and regenerated `// 0x..` constant comments)
//! and whitespace are skipped. Expression text is later recovered by slicing
//! the source between token spans, so spacing inside default values and
//! annotation arguments survives verbatim.

use crate::error::ParseError;

/// Kind of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Identifier or keyword.
    Ident,
    /// Punctuation, including the multi-character `...`, `->` and `::`.
    Punct,
    /// String literal, quotes included.
    Str,
    /// Char literal, quotes included.
    Char,
    /// Numeric literal (sign not included).
    Number,
}

/// A token with its byte span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    pub start: usize,
    pub end: usize,
}

impl Token<'_> {
    pub fn is_punct(&self, p: &str) -> bool {
        self.kind == TokenKind::Punct && self.text == p
    }

    pub fn is_ident(&self, word: &str) -> bool {
        self.kind == TokenKind::Ident && self.text == word
    }
}

const MULTI_PUNCT: &[&str] = &["...", "->", "::", "&&", "||", "<<", "==", "!=", "<=", ">="];

const SINGLE_PUNCT: &str = "{}()[]<>,;=.?!@&-+*/%|^~:";

/// Scan `source` into tokens.
///
/// `file` is only used for error locations.
pub fn tokenize<'a>(file: &str, source: &'a str) -> Result<Vec<Token<'a>>, ParseError> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0usize;

    while pos < source.len() {
        let rest = &source[pos..];
        let Some(ch) = rest.chars().next() else {
            break;
        };

        if ch.is_whitespace() || ch == '\u{feff}' {
            pos += ch.len_utf8();
            continue;
        }

        if rest.starts_with("//") {
            pos += rest.find('\n').unwrap_or(rest.len());
            continue;
        }
        if rest.starts_with("/*") {
            match rest[2..].find("*/") {
                Some(end) => pos += end + 4,
                None => {
                    return Err(ParseError::at_offset(file, source, pos, "unterminated comment"))
                }
            }
            continue;
        }

        let start = pos;
        let kind = if ch == '"' || ch == '\'' {
            pos = scan_quoted(bytes, pos).ok_or_else(|| {
                let what = if ch == '"' { "string" } else { "char" };
                ParseError::at_offset(file, source, start, format!("unterminated {} literal", what))
            })?;
            if ch == '"' {
                TokenKind::Str
            } else {
                TokenKind::Char
            }
        } else if ch.is_ascii_digit()
            || (ch == '.' && rest[1..].starts_with(|c: char| c.is_ascii_digit()))
        {
            pos = scan_number(source, pos);
            TokenKind::Number
        } else if is_ident_start(ch) {
            pos += rest
                .char_indices()
                .find(|&(_, c)| !is_ident_part(c))
                .map(|(i, _)| i)
                .unwrap_or(rest.len());
            TokenKind::Ident
        } else if let Some(p) = MULTI_PUNCT.iter().find(|p| rest.starts_with(**p)) {
            pos += p.len();
            TokenKind::Punct
        } else if SINGLE_PUNCT.contains(ch) {
            pos += ch.len_utf8();
            TokenKind::Punct
        } else {
            return Err(ParseError::at_offset(
                file,
                source,
                pos,
                format!("unexpected character '{}'", ch),
            ));
        };

        tokens.push(Token {
            kind,
            text: &source[start..pos],
            start,
            end: pos,
        });
    }

    Ok(tokens)
}

fn is_ident_start(ch: char) -> bool {
    ch.is_alphabetic() || ch == '_' || ch == '$'
}

fn is_ident_part(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_' || ch == '$'
}

/// End offset (exclusive) of a quoted literal starting at `start`.
fn scan_quoted(bytes: &[u8], start: usize) -> Option<usize> {
    let quote = bytes[start];
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'\n' => return None,
            b if b == quote => return Some(i + 1),
            _ => i += 1,
        }
    }
    None
}

fn scan_number(source: &str, start: usize) -> usize {
    let bytes = source.as_bytes();
    let is_hex = source[start..].starts_with("0x") || source[start..].starts_with("0X");
    let mut i = start;
    while i < bytes.len() {
        let b = bytes[i];
        let exponent_sign = (b == b'+' || b == b'-')
            && i > start
            && if is_hex {
                matches!(bytes[i - 1], b'p' | b'P')
            } else {
                matches!(bytes[i - 1], b'e' | b'E')
            };
        if b.is_ascii_alphanumeric() || b == b'_' || exponent_sign {
            i += 1;
        } else if b == b'.' && !source[i..].starts_with("..") {
            i += 1;
        } else {
            break;
        }
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds_and_texts(source: &str) -> Vec<(TokenKind, &str)> {
        tokenize("t", source)
            .unwrap()
            .into_iter()
            .map(|t| (t.kind, t.text))
            .collect()
    }

    #[test]
    fn comments_and_header_are_skipped() {
        let toks = kinds_and_texts("// Signature format: 2.0\nfield public static final int X = 42; // 0x2a\n/* x */");
        let texts: Vec<&str> = toks.iter().map(|(_, t)| *t).collect();
        assert_eq!(
            texts,
            vec!["field", "public", "static", "final", "int", "X", "=", "42", ";"]
        );
    }

    #[test]
    fn multi_char_punctuation() {
        let texts: Vec<&str> = kinds_and_texts("String... a -> b :: c")
            .into_iter()
            .map(|(_, t)| t)
            .collect();
        assert_eq!(texts, vec!["String", "...", "a", "->", "b", "::", "c"]);
    }

    #[test]
    fn literals_keep_quotes_and_escapes() {
        let toks = kinds_and_texts(r#""a, \"b\"" '\'' 1.0E-5f 0x1F 100L .5"#);
        assert_eq!(
            toks,
            vec![
                (TokenKind::Str, r#""a, \"b\"""#),
                (TokenKind::Char, r"'\''"),
                (TokenKind::Number, "1.0E-5f"),
                (TokenKind::Number, "0x1F"),
                (TokenKind::Number, "100L"),
                (TokenKind::Number, ".5"),
            ]
        );
    }

    #[test]
    fn spans_slice_the_source() {
        let src = "method public int clamp(int);";
        let toks = tokenize("t", src).unwrap();
        let clamp = toks.iter().find(|t| t.text == "clamp").unwrap();
        assert_eq!(&src[clamp.start..clamp.end], "clamp");
    }

    #[test]
    fn unterminated_literal_reports_position() {
        let err = tokenize("api.txt", "package a {\n  field x = \"oops\n}").unwrap_err();
        assert_eq!(err.location.line, 2);
        assert_eq!(err.location.col, 13);
        assert!(err.message.contains("unterminated string"));
    }

    #[test]
    fn unexpected_character_is_an_error() {
        let err = tokenize("api.txt", "package a # {").unwrap_err();
        assert!(err.message.contains('#'));
    }
}
