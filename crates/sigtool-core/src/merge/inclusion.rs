//! Inclusion marker files.
//!
//! One directive per line, `#` starts a comment:
//!
//! ```text
//! # expose the test hooks
//! show test.pkg.MyTest void reset()
//! hide test.pkg.Internal
//! ```

use crate::error::ParseError;
use crate::model::ElementKey;
use crate::types::Location;

/// Directive of one marker line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    Show,
    Hide,
}

/// A parsed marker line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InclusionMarker {
    pub marker: Marker,
    pub key: ElementKey,
    pub location: Location,
}

/// Parse marker text. `file` is used for locations.
pub fn parse_markers(file: &str, text: &str) -> Result<Vec<InclusionMarker>, ParseError> {
    let content = crate::text::normalize_newlines(crate::text::strip_bom(text));
    let mut markers = Vec::new();
    for (index, line) in content.lines().enumerate() {
        let line_no = u32::try_from(index + 1).unwrap_or(u32::MAX);
        let body = match line.find('#') {
            Some(idx) => &line[..idx],
            None => line,
        };
        let body = body.trim();
        if body.is_empty() {
            continue;
        }
        let col = u32::try_from(line.len() - line.trim_start().len() + 1).unwrap_or(1);
        let location = Location::new(file, line_no, col);
        let (directive, rest) = body.split_once(char::is_whitespace).unwrap_or((body, ""));
        let marker = match directive {
            "show" => Marker::Show,
            "hide" => Marker::Hide,
            other => {
                return Err(ParseError::new(
                    location,
                    format!("expected 'show' or 'hide' but found '{}'", other),
                ))
            }
        };
        let key = ElementKey::parse(rest)
            .ok_or_else(|| ParseError::new(location.clone(), format!("malformed element key '{}'", rest.trim())))?;
        markers.push(InclusionMarker {
            marker,
            key,
            location,
        });
    }
    Ok(markers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_directives_and_comments() {
        let markers = parse_markers(
            "markers.txt",
            "# header\n\nshow test.pkg.MyTest myNumber  # trailing\n  hide test.pkg.Internal\r\n",
        )
        .unwrap();
        assert_eq!(markers.len(), 2);
        assert_eq!(markers[0].marker, Marker::Show);
        assert_eq!(markers[0].key, ElementKey::field("test.pkg.MyTest", "myNumber"));
        assert_eq!(markers[1].marker, Marker::Hide);
        assert_eq!(markers[1].location, Location::new("markers.txt", 4, 3));
    }

    #[test]
    fn unknown_directive_is_an_error() {
        let err = parse_markers("m.txt", "show a.B\nexpose a.C\n").unwrap_err();
        assert_eq!(err.location.line, 2);
        assert!(err.message.contains("expose"));
    }

    #[test]
    fn missing_key_is_an_error() {
        assert!(parse_markers("m.txt", "hide\n").is_err());
    }
}
