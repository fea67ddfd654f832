//! Reader for "since" API-level files.
//!
//! ```xml
//! <api version="2">
//!   <class name="android/app/Activity" since="1" deprecated="29">
//!     <method name="finish()V"/>
//!     <method name="setTitle(Ljava/lang/CharSequence;)V" since="3"/>
//!     <field name="RESULT_OK" since="1"/>
//!   </class>
//! </api>
//! ```
//!
//! Class names use internal form (`/` package separator, `$` for nested
//! classes) and are stored in dotted form. Members without a `since`
//! attribute inherit the level of their class; classes without one default
//! to level 1.

use std::collections::BTreeMap;
use std::str::FromStr;

use thiserror::Error;
use tracing::debug;

use crate::error::ParseError;
use crate::types::Location;
use crate::xml::{parse_document, XmlElement, XmlError};

/// API level assumed for classes without a `since` attribute.
pub const FIRST_LEVEL: u32 = 1;

/// Introduction and deprecation levels of one element.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Levels {
    pub since: u32,
    pub deprecated: Option<u32>,
    pub removed: Option<u32>,
}

/// Levels of a class and its members.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassLevels {
    pub levels: Levels,
    /// Method descriptors (`name(args)ret`) to levels.
    pub methods: BTreeMap<String, Levels>,
    pub fields: BTreeMap<String, Levels>,
}

/// Lookup table built from a "since" file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiLevels {
    /// Value of the root `version` attribute.
    pub version: u32,
    classes: BTreeMap<String, ClassLevels>,
}

/// Failure reading a "since" file.
#[derive(Debug, Error)]
pub enum SinceError {
    #[error(transparent)]
    Xml(#[from] XmlError),

    #[error(transparent)]
    Format(#[from] ParseError),
}

impl ApiLevels {
    /// Parse a "since" document.
    pub fn parse(file: &str, text: &str) -> Result<ApiLevels, SinceError> {
        let root = parse_document(file, text)?;
        if root.name != "api" {
            return Err(error_at(file, text, &root, format!("expected <api>, found <{}>", root.name)).into());
        }
        let version = match root.attr("version") {
            Some(v) => parse_level(file, text, &root, "version", v)?,
            None => FIRST_LEVEL,
        };

        let mut classes = BTreeMap::new();
        for class in root.children_named("class") {
            let Some(name) = class.attr("name") else {
                return Err(error_at(file, text, class, "<class> without a name").into());
            };
            let levels = read_levels(file, text, class, FIRST_LEVEL)?;
            let mut entry = ClassLevels {
                levels,
                ..ClassLevels::default()
            };
            for child in &class.children {
                let target = match child.name.as_str() {
                    "method" => &mut entry.methods,
                    "field" => &mut entry.fields,
                    _ => continue,
                };
                let Some(member) = child.attr("name") else {
                    return Err(error_at(file, text, child, format!("<{}> without a name", child.name)).into());
                };
                target.insert(member.to_string(), read_levels(file, text, child, levels.since)?);
            }
            classes.insert(dotted(name), entry);
        }
        debug!(file, version, classes = classes.len(), "read api levels");
        Ok(ApiLevels { version, classes })
    }

    pub fn class(&self, qualified_name: &str) -> Option<&ClassLevels> {
        self.classes.get(qualified_name)
    }

    /// Levels of a method by exact descriptor, or by name alone when the
    /// name has a single overload.
    pub fn method(&self, class: &str, descriptor: &str) -> Option<Levels> {
        let class = self.classes.get(class)?;
        if let Some(levels) = class.methods.get(descriptor) {
            return Some(*levels);
        }
        if descriptor.contains('(') {
            return None;
        }
        let prefix = format!("{}(", descriptor);
        let mut overloads = class
            .methods
            .iter()
            .filter(|(k, _)| k.starts_with(&prefix));
        match (overloads.next(), overloads.next()) {
            (Some((_, levels)), None) => Some(*levels),
            _ => None,
        }
    }

    pub fn field(&self, class: &str, name: &str) -> Option<Levels> {
        self.classes.get(class)?.fields.get(name).copied()
    }

    /// Qualified class names in sorted order.
    pub fn class_names(&self) -> impl Iterator<Item = &str> {
        self.classes.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

fn read_levels(file: &str, text: &str, element: &XmlElement, inherited: u32) -> Result<Levels, ParseError> {
    let since = match element.attr("since") {
        Some(v) => parse_level(file, text, element, "since", v)?,
        None => inherited,
    };
    let deprecated = element
        .attr("deprecated")
        .map(|v| parse_level(file, text, element, "deprecated", v))
        .transpose()?;
    let removed = element
        .attr("removed")
        .map(|v| parse_level(file, text, element, "removed", v))
        .transpose()?;
    Ok(Levels {
        since,
        deprecated,
        removed,
    })
}

fn parse_level(file: &str, text: &str, element: &XmlElement, attr: &str, value: &str) -> Result<u32, ParseError> {
    u32::from_str(value.trim()).map_err(|_| {
        error_at(
            file,
            text,
            element,
            format!("invalid {} level '{}' on <{}>", attr, value, element.name),
        )
    })
}

fn error_at(file: &str, text: &str, element: &XmlElement, message: impl Into<String>) -> ParseError {
    let (line, col) = crate::text::byte_offset_to_position(text, element.offset.min(text.len()));
    ParseError::new(Location::new(file, line, col), message)
}

/// `android/app/Activity$Result` to `android.app.Activity.Result`.
fn dotted(internal: &str) -> String {
    internal.replace(['/', '$'], ".")
}
