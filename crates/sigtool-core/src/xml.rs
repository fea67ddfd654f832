//! Minimal XML reader and escaping helpers.
//!
//! Covers the subset used by JDiff files, "since" files and annotation
//! overlays: elements, attributes, text, comments, CDATA, processing
//! instructions and a DOCTYPE line. Namespaces and DTD validation are not
//! supported.
//!
//! ## Grammar
//!
//! ```text
//! <document> := <misc>* <element> <misc>*
//! <element>  := "<" name (ws attr)* ws? ("/>" | ">" <content>* "</" name ws? ">")
//! <content>  := <element> | text | comment | cdata
//! <attr>     := name ws? "=" ws? ("\"" [^"]* "\"" | "'" [^']* "'")
//! ```

use thiserror::Error;
use winnow::ascii::{multispace0, multispace1};
use winnow::combinator::{alt, delimited, preceded, repeat};
use winnow::error::{ContextError, ErrMode, StrContext};
use winnow::prelude::*;
use winnow::token::{take_till, take_until, take_while};
use winnow::ModalResult;

use crate::types::Location;

/// Malformed XML.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{location}: {message}")]
pub struct XmlError {
    pub location: Location,
    pub message: String,
}

impl XmlError {
    fn at(file: &str, content: &str, offset: usize, message: impl Into<String>) -> Self {
        let (line, col) = crate::text::byte_offset_to_position(content, offset);
        XmlError {
            location: Location::new(file, line, col),
            message: message.into(),
        }
    }
}

/// A parsed element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    pub name: String,
    /// Attributes in document order, values unescaped.
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlElement>,
    /// Concatenated character data directly inside this element.
    pub text: String,
    /// Byte offset of the opening `<`.
    pub offset: usize,
}

impl XmlElement {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Child elements with the given tag name.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }
}

// ============================================================================
// Escaping
// ============================================================================

/// Escape text for use inside a double-quoted attribute value.
pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\n' => out.push_str("&#10;"),
            c => out.push(c),
        }
    }
    out
}

/// Decode entity and character references. Returns `None` for unknown or
/// malformed references.
pub fn unescape(value: &str) -> Option<String> {
    if !value.contains('&') {
        return Some(value.to_string());
    }
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        let semi = after.find(';')?;
        let entity = &after[..semi];
        let decoded = match entity {
            "lt" => '<',
            "gt" => '>',
            "amp" => '&',
            "quot" => '"',
            "apos" => '\'',
            _ => {
                let code = if let Some(hex) = entity.strip_prefix("#x").or_else(|| entity.strip_prefix("#X")) {
                    u32::from_str_radix(hex, 16).ok()?
                } else {
                    entity.strip_prefix('#')?.parse::<u32>().ok()?
                };
                char::from_u32(code)?
            }
        };
        out.push(decoded);
        rest = &after[semi + 1..];
    }
    out.push_str(rest);
    Some(out)
}

// ============================================================================
// Document Parsing
// ============================================================================

/// Parse a complete document and return its root element.
pub fn parse_document(file: &str, text: &str) -> Result<XmlElement, XmlError> {
    let content = crate::text::strip_bom(text);
    let bom = text.len() - content.len();
    let mut input = content;

    let parsed = (skip_misc, element, skip_misc).parse_next(&mut input);
    let offset = bom + content.len() - input.len();
    let (_, raw, _) = parsed.map_err(|e| {
        let message = match e {
            ErrMode::Backtrack(ctx) | ErrMode::Cut(ctx) => ctx.to_string(),
            ErrMode::Incomplete(_) => String::new(),
        };
        let message = if message.trim().is_empty() {
            "malformed XML".to_string()
        } else {
            format!("malformed XML: {}", message.replace('\n', "; "))
        };
        XmlError::at(file, text, offset, message)
    })?;
    if !input.trim().is_empty() {
        return Err(XmlError::at(file, text, offset, "unexpected content after root element"));
    }
    raw.into_element(file, text, bom + content.len())
}

struct RawElement<'s> {
    name: &'s str,
    attributes: Vec<(&'s str, &'s str)>,
    children: Vec<RawElement<'s>>,
    text: Vec<&'s str>,
    close: Option<(&'s str, usize)>,
    rest_len: usize,
}

impl RawElement<'_> {
    fn into_element(self, file: &str, text: &str, total: usize) -> Result<XmlElement, XmlError> {
        let offset = total - self.rest_len;
        if let Some((close, close_rest)) = self.close {
            if close != self.name {
                return Err(XmlError::at(
                    file,
                    text,
                    total - close_rest,
                    format!("closing tag </{}> does not match <{}>", close, self.name),
                ));
            }
        }
        let mut attributes = Vec::with_capacity(self.attributes.len());
        for (key, value) in self.attributes {
            let decoded = unescape(value).ok_or_else(|| {
                XmlError::at(file, text, offset, format!("invalid entity in attribute {}", key))
            })?;
            attributes.push((key.to_string(), decoded));
        }
        let mut body = String::new();
        for piece in self.text {
            let decoded = unescape(piece)
                .ok_or_else(|| XmlError::at(file, text, offset, "invalid entity in text"))?;
            body.push_str(&decoded);
        }
        let children = self
            .children
            .into_iter()
            .map(|c| c.into_element(file, text, total))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(XmlElement {
            name: self.name.to_string(),
            attributes,
            children,
            text: body,
            offset,
        })
    }
}

fn skip_misc(input: &mut &str) -> ModalResult<()> {
    loop {
        multispace0.parse_next(input)?;
        if input.starts_with("<!--") {
            comment.parse_next(input)?;
        } else if input.starts_with("<?") {
            ("<?", take_until(0.., "?>"), "?>").parse_next(input)?;
        } else if input.starts_with("<!DOCTYPE") {
            ("<!DOCTYPE", take_till(0.., |c| c == '>'), '>').parse_next(input)?;
        } else {
            return Ok(());
        }
    }
}

fn comment(input: &mut &str) -> ModalResult<()> {
    ("<!--", take_until(0.., "-->"), "-->")
        .context(StrContext::Label("comment"))
        .void()
        .parse_next(input)
}

fn name<'s>(input: &mut &'s str) -> ModalResult<&'s str> {
    take_while(1.., |c: char| {
        c.is_alphanumeric() || matches!(c, '_' | ':' | '-' | '.')
    })
    .parse_next(input)
}

fn attribute<'s>(input: &mut &'s str) -> ModalResult<(&'s str, &'s str)> {
    let key = name.parse_next(input)?;
    (multispace0, '=', multispace0).parse_next(input)?;
    let value = alt((
        delimited('"', take_till(0.., |c| c == '"'), '"'),
        delimited('\'', take_till(0.., |c| c == '\''), '\''),
    ))
    .context(StrContext::Label("attribute value"))
    .parse_next(input)?;
    Ok((key, value))
}

fn element<'s>(input: &mut &'s str) -> ModalResult<RawElement<'s>> {
    let rest_len = input.len();
    '<'.context(StrContext::Label("element")).parse_next(input)?;
    let tag = name
        .context(StrContext::Label("element name"))
        .parse_next(input)?;
    let attributes: Vec<(&str, &str)> =
        repeat(0.., preceded(multispace1, attribute)).parse_next(input)?;
    multispace0.parse_next(input)?;

    let mut raw = RawElement {
        name: tag,
        attributes,
        children: Vec::new(),
        text: Vec::new(),
        close: None,
        rest_len,
    };

    if input.starts_with("/>") {
        *input = &input[2..];
        return Ok(raw);
    }
    '>'.context(StrContext::Label("end of start tag"))
        .parse_next(input)?;

    loop {
        if input.starts_with("</") {
            break;
        } else if input.starts_with("<!--") {
            comment.parse_next(input)?;
        } else if input.starts_with("<![CDATA[") {
            let data = delimited("<![CDATA[", take_until(0.., "]]>"), "]]>").parse_next(input)?;
            raw.text.push(data);
        } else if input.starts_with('<') {
            raw.children.push(element(input)?);
        } else if input.is_empty() {
            return Err(ErrMode::Cut(ContextError::new()));
        } else {
            let text = take_till(1.., |c| c == '<').parse_next(input)?;
            if !text.trim().is_empty() {
                raw.text.push(text);
            }
        }
    }

    let close_rest = input.len();
    "</".parse_next(input)?;
    let close = name
        .context(StrContext::Label("closing tag"))
        .parse_next(input)?;
    (multispace0, '>').parse_next(input)?;
    raw.close = Some((close, close_rest));
    Ok(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_elements_and_attributes() {
        let doc = parse_document(
            "a.xml",
            "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<!-- header -->\n<root>\n  <item name=\"test.pkg.MyTest myNumber\">\n    <annotation name='android.support.annotation.Nullable'/>\n  </item>\n</root>\n",
        )
        .unwrap();
        assert_eq!(doc.name, "root");
        let item = doc.children_named("item").next().unwrap();
        assert_eq!(item.attr("name"), Some("test.pkg.MyTest myNumber"));
        assert_eq!(
            item.children[0].attr("name"),
            Some("android.support.annotation.Nullable")
        );
    }

    #[test]
    fn entities_are_decoded() {
        let doc = parse_document(
            "a.xml",
            "<val name=\"value\" val=\"{&quot;a&quot;, &lt;b&gt;} &amp; &#65;&#x42;\">x &amp; y</val>",
        )
        .unwrap();
        assert_eq!(doc.attr("val"), Some("{\"a\", <b>} & AB"));
        assert_eq!(doc.text, "x & y");
    }

    #[test]
    fn escape_round_trips() {
        let raw = "java.util.Map<K, \"V\"> & more";
        assert_eq!(unescape(&escape(raw)).as_deref(), Some(raw));
        assert_eq!(unescape("&bogus;"), None);
    }

    #[test]
    fn mismatched_close_tag_reports_location() {
        let err = parse_document("bad.xml", "<api>\n  <package name=\"a\">\n  </pkg>\n</api>").unwrap_err();
        assert_eq!(err.location.line, 3);
        assert!(err.message.contains("</pkg>"));
    }

    #[test]
    fn truncated_document_is_an_error() {
        assert!(parse_document("t.xml", "<api>\n<package name=\"a\">").is_err());
        assert!(parse_document("t.xml", "<api/><api/>").is_err());
        assert!(parse_document("t.xml", "").is_err());
    }

    #[test]
    fn crlf_and_bom_are_accepted() {
        let doc = parse_document("t.xml", "\u{feff}<api>\r\n<package name=\"a\"/>\r\n</api>\r\n").unwrap();
        assert_eq!(doc.children.len(), 1);
    }
}
