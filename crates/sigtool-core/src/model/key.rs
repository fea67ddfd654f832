//! Canonical element keys.
//!
//! Merge sources address model nodes with keys of the form
//!
//! - `test.pkg.MyTest` (a class)
//! - `test.pkg.MyTest myNumber` (a field or enum constant)
//! - `test.pkg.MyTest java.lang.Double convert(java.lang.Float)` (a method)
//! - `test.pkg.MyTest MyTest(int)` (a constructor)
//! - any callable key followed by ` <index>` (a parameter)
//!
//! Parameter types are compared erased: generic arguments and type-use
//! annotations are dropped, `...` is treated as `[]`.

use std::fmt;

use super::types::qualify_type_name;

/// Member part of an [`ElementKey`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MemberRef {
    /// Field or enum constant, by name.
    Field(String),
    /// Method (with return type) or constructor (without).
    Callable {
        return_type: Option<String>,
        name: String,
        parameters: Vec<String>,
    },
}

impl MemberRef {
    pub fn name(&self) -> &str {
        match self {
            MemberRef::Field(name) => name,
            MemberRef::Callable { name, .. } => name,
        }
    }
}

/// A parsed element key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementKey {
    /// Qualified class name.
    pub class: String,
    pub member: Option<MemberRef>,
    /// Zero-based parameter index, for parameter keys.
    pub parameter: Option<usize>,
}

impl ElementKey {
    pub fn class(class: impl Into<String>) -> Self {
        ElementKey {
            class: class.into(),
            member: None,
            parameter: None,
        }
    }

    pub fn field(class: impl Into<String>, name: impl Into<String>) -> Self {
        ElementKey {
            class: class.into(),
            member: Some(MemberRef::Field(name.into())),
            parameter: None,
        }
    }

    pub fn callable(
        class: impl Into<String>,
        return_type: Option<String>,
        name: impl Into<String>,
        parameters: Vec<String>,
    ) -> Self {
        ElementKey {
            class: class.into(),
            member: Some(MemberRef::Callable {
                return_type,
                name: name.into(),
                parameters: parameters.iter().map(|p| normalize_key_type(p)).collect(),
            }),
            parameter: None,
        }
    }

    /// Same key, addressing parameter `index`.
    pub fn with_parameter(mut self, index: usize) -> Self {
        self.parameter = Some(index);
        self
    }

    /// Key without the parameter index.
    pub fn without_parameter(&self) -> ElementKey {
        ElementKey {
            parameter: None,
            ..self.clone()
        }
    }

    /// Parse a key. Returns `None` for malformed keys.
    pub fn parse(text: &str) -> Option<ElementKey> {
        let text = text.trim();
        let (class, rest) = match text.find(' ') {
            Some(idx) => (&text[..idx], text[idx + 1..].trim()),
            None => (text, ""),
        };
        if class.is_empty() {
            return None;
        }
        if rest.is_empty() {
            return Some(ElementKey::class(class));
        }

        let Some(open) = rest.find('(') else {
            if rest.contains(' ') {
                return None;
            }
            return Some(ElementKey::field(class, rest));
        };
        let close = matching_paren(rest, open)?;

        let head = rest[..open].trim_end();
        let (return_type, name) = match split_last_top_level_space(head) {
            Some((ret, name)) => (Some(ret.trim().to_string()), name),
            None => (None, head),
        };
        if name.is_empty() {
            return None;
        }
        let parameters = split_top_level_commas(&rest[open + 1..close]);

        let tail = rest[close + 1..].trim();
        let parameter = if tail.is_empty() {
            None
        } else {
            Some(tail.parse::<usize>().ok()?)
        };

        let mut key = ElementKey::callable(class, return_type, name, parameters);
        key.parameter = parameter;
        Some(key)
    }
}

impl fmt::Display for ElementKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.class)?;
        match &self.member {
            None => {}
            Some(MemberRef::Field(name)) => write!(f, " {}", name)?,
            Some(MemberRef::Callable {
                return_type,
                name,
                parameters,
            }) => {
                f.write_str(" ")?;
                if let Some(ret) = return_type {
                    write!(f, "{} ", ret)?;
                }
                write!(f, "{}({})", name, parameters.join(", "))?;
            }
        }
        if let Some(index) = self.parameter {
            write!(f, " {}", index)?;
        }
        Ok(())
    }
}

// ============================================================================
// Key Type Normalization
// ============================================================================

/// Normalize a type written in a key for erased comparison.
///
/// Generic arguments, type-use annotations and whitespace are removed,
/// `...` becomes `[]`, and known `java.lang` simple names are qualified.
pub fn normalize_key_type(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut depth = 0usize;
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            _ if depth > 0 => {}
            '@' => {
                // skip the annotation name and any argument list
                while matches!(chars.peek(), Some(c) if c.is_alphanumeric() || *c == '.' || *c == '_' || *c == '$') {
                    chars.next();
                }
                if chars.peek() == Some(&'(') {
                    let mut parens = 0usize;
                    for c in chars.by_ref() {
                        match c {
                            '(' => parens += 1,
                            ')' => {
                                parens -= 1;
                                if parens == 0 {
                                    break;
                                }
                            }
                            _ => {}
                        }
                    }
                }
            }
            c if c.is_whitespace() => {}
            c => out.push(c),
        }
    }
    let out = out.replace("...", "[]");
    // a trailing '.' can be left behind by `java.lang.@A String`
    let base_end = out.find('[').unwrap_or(out.len());
    let (base, dims) = out.split_at(base_end);
    let base = base.trim_end_matches('.');
    match qualify_type_name(base) {
        Some(qualified) => format!("{}{}", qualified, dims),
        None => format!("{}{}", base, dims),
    }
}

fn matching_paren(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, ch) in text[open..].char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + i);
                }
            }
            _ => {}
        }
    }
    None
}

fn split_last_top_level_space(text: &str) -> Option<(&str, &str)> {
    let mut depth = 0usize;
    let mut split = None;
    for (i, ch) in text.char_indices() {
        match ch {
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            ' ' if depth == 0 => split = Some(i),
            _ => {}
        }
    }
    split.map(|i| (&text[..i], &text[i + 1..]))
}

/// Split at commas outside `<>`, trimming each part; empty input gives no parts.
pub fn split_top_level_commas(text: &str) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    for (i, ch) in text.char_indices() {
        match ch {
            '<' | '(' => depth += 1,
            '>' | ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(text[start..i].trim().to_string());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(text[start..].trim().to_string());
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_class_and_field_keys() {
        let class = ElementKey::parse("test.pkg.MyTest").unwrap();
        assert_eq!(class, ElementKey::class("test.pkg.MyTest"));

        let field = ElementKey::parse("test.pkg.MyTest myNumber").unwrap();
        assert_eq!(field.member, Some(MemberRef::Field("myNumber".into())));
        assert_eq!(field.to_string(), "test.pkg.MyTest myNumber");
    }

    #[test]
    fn parse_method_key_with_generic_return() {
        let key = ElementKey::parse(
            "test.pkg.A java.util.Map<java.lang.String, java.lang.Integer> get(java.util.List<T>, int...) 1",
        )
        .unwrap();
        match &key.member {
            Some(MemberRef::Callable {
                return_type,
                name,
                parameters,
            }) => {
                assert_eq!(
                    return_type.as_deref(),
                    Some("java.util.Map<java.lang.String, java.lang.Integer>")
                );
                assert_eq!(name, "get");
                assert_eq!(parameters, &vec!["java.util.List".to_string(), "int[]".to_string()]);
            }
            other => panic!("unexpected member {:?}", other),
        }
        assert_eq!(key.parameter, Some(1));
    }

    #[test]
    fn parse_constructor_key() {
        let key = ElementKey::parse("test.pkg.MyTest MyTest(int, String)").unwrap();
        assert_eq!(
            key.member,
            Some(MemberRef::Callable {
                return_type: None,
                name: "MyTest".into(),
                parameters: vec!["int".into(), "java.lang.String".into()],
            })
        );
        assert_eq!(key.to_string(), "test.pkg.MyTest MyTest(int, java.lang.String)");
    }

    #[test]
    fn malformed_keys_are_rejected() {
        assert_eq!(ElementKey::parse(""), None);
        assert_eq!(ElementKey::parse("a.B m(int"), None);
        assert_eq!(ElementKey::parse("a.B void m() x"), None);
        assert_eq!(ElementKey::parse("a.B two words"), None);
    }

    #[test]
    fn normalize_drops_annotations_and_generics() {
        assert_eq!(
            normalize_key_type("java.lang.@NonNull String @Nullable []"),
            "java.lang.String[]"
        );
        assert_eq!(normalize_key_type("java.util.Map<K, V>"), "java.util.Map");
        assert_eq!(normalize_key_type("@IntRange(from=0, to=2) int"), "int");
    }
}
