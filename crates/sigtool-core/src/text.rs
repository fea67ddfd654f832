//! Text utilities: position conversion, newline handling and Java literal escaping.
//!
//! ## Coordinate Conventions
//!
//! - Lines and columns are **1-indexed** (matching editor conventions)
//! - Byte offsets are **0-indexed**
//! - Columns count Unicode scalar values (chars), not bytes

use std::borrow::Cow;

// ============================================================================
// Position Conversions
// ============================================================================

/// Convert a byte offset to 1-indexed line and column (Unicode-aware).
///
/// A `\r\n` pair counts as a single line break, so CRLF and LF inputs with the
/// same content report identical positions.
pub fn byte_offset_to_position(content: &str, offset: usize) -> (u32, u32) {
    let mut line = 1u32;
    let mut col = 1u32;
    let mut current_offset = 0usize;

    for ch in content.chars() {
        if current_offset >= offset {
            break;
        }
        match ch {
            '\n' => {
                line += 1;
                col = 1;
            }
            '\r' => {}
            _ => col += 1,
        }
        current_offset += ch.len_utf8();
    }

    (line, col)
}

// ============================================================================
// Input Normalization
// ============================================================================

/// Strip a leading UTF-8 byte order mark.
pub fn strip_bom(content: &str) -> &str {
    content.strip_prefix('\u{feff}').unwrap_or(content)
}

/// Replace `\r\n` (and lone `\r`) line endings with `\n`.
pub fn normalize_newlines(content: &str) -> Cow<'_, str> {
    if !content.contains('\r') {
        return Cow::Borrowed(content);
    }
    Cow::Owned(content.replace("\r\n", "\n").replace('\r', "\n"))
}

/// Iterate over the non-blank lines of `content`, trimmed, after BOM removal.
pub fn meaningful_lines(content: &str) -> impl Iterator<Item = &str> {
    strip_bom(content)
        .lines()
        .map(|line| line.trim_end_matches('\r').trim())
        .filter(|line| !line.is_empty())
}

// ============================================================================
// Java Literal Escaping
// ============================================================================

/// Escape a string so that it can be written inside a Java string literal.
pub fn escape_java_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    for ch in value.chars() {
        push_escaped_char(&mut out, ch, '"');
    }
    out
}

/// Escape a single char for use inside a Java char literal.
pub fn escape_java_char(ch: char) -> String {
    let mut out = String::new();
    push_escaped_char(&mut out, ch, '\'');
    out
}

fn push_escaped_char(out: &mut String, ch: char, quote: char) {
    match ch {
        '\\' => out.push_str("\\\\"),
        '\n' => out.push_str("\\n"),
        '\t' => out.push_str("\\t"),
        '\r' => out.push_str("\\r"),
        '\u{8}' => out.push_str("\\b"),
        '\u{c}' => out.push_str("\\f"),
        c if c == quote => {
            out.push('\\');
            out.push(c);
        }
        c if (c as u32) < 0x20 || (0x7f..0xa0).contains(&(c as u32)) => {
            out.push_str(&format!("\\u{:04x}", c as u32));
        }
        c => out.push(c),
    }
}

/// Decode the body of a Java string or char literal (without quotes).
///
/// Returns `None` for malformed escape sequences.
pub fn unescape_java(body: &str) -> Option<String> {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next()? {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            's' => out.push(' '),
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            'u' => {
                while chars.peek() == Some(&'u') {
                    chars.next();
                }
                let hex: String = chars.by_ref().take(4).collect();
                if hex.len() != 4 {
                    return None;
                }
                let code = u32::from_str_radix(&hex, 16).ok()?;
                out.push(char::from_u32(code)?);
            }
            d @ '0'..='7' => {
                let mut code = d.to_digit(8)?;
                for _ in 0..2 {
                    match chars.peek().and_then(|c| c.to_digit(8)) {
                        Some(next) if code * 8 + next <= 0o377 => {
                            code = code * 8 + next;
                            chars.next();
                        }
                        _ => break,
                    }
                }
                out.push(char::from_u32(code)?);
            }
            _ => return None,
        }
    }
    Some(out)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_to_position_counts_chars() {
        let content = "ab\ncé\nd";
        assert_eq!(byte_offset_to_position(content, 0), (1, 1));
        assert_eq!(byte_offset_to_position(content, 3), (2, 1));
        // 'é' is two bytes; 'd' line starts after it
        assert_eq!(byte_offset_to_position(content, content.find('d').unwrap()), (3, 1));
    }

    #[test]
    fn crlf_and_lf_positions_match() {
        let lf = "package a {\n  x\n}";
        let crlf = "package a {\r\n  x\r\n}";
        let lf_pos = byte_offset_to_position(lf, lf.find('x').unwrap());
        let crlf_pos = byte_offset_to_position(crlf, crlf.find('x').unwrap());
        assert_eq!(lf_pos, crlf_pos);
        assert_eq!(lf_pos, (2, 3));
    }

    #[test]
    fn meaningful_lines_skip_blank_and_bom() {
        let lines: Vec<_> = meaningful_lines("\u{feff}\n   \r\n// Signature format: 2.0\r\n").collect();
        assert_eq!(lines, vec!["// Signature format: 2.0"]);
    }

    #[test]
    fn normalize_newlines_borrowed_when_clean() {
        assert!(matches!(normalize_newlines("a\nb"), Cow::Borrowed(_)));
        assert_eq!(normalize_newlines("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn java_escaping_round_trips() {
        let raw = "tab\there \"quoted\" back\\slash \u{1}";
        let escaped = escape_java_string(raw);
        assert_eq!(escaped, "tab\\there \\\"quoted\\\" back\\\\slash \\u0001");
        assert_eq!(unescape_java(&escaped).as_deref(), Some(raw));
    }

    #[test]
    fn unescape_octal_and_unicode() {
        assert_eq!(unescape_java("\\101\\u0042").as_deref(), Some("AB"));
        assert_eq!(unescape_java("\\q"), None);
    }

    #[test]
    fn char_escape_uses_single_quote() {
        assert_eq!(escape_java_char('\''), "\\'");
        assert_eq!(escape_java_char('"'), "\"");
    }
}
