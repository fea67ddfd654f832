//! Annotations and annotation-name canonicalization.
//!
//! Attribute values are kept as raw expression text. Only typedef values and
//! range bounds are normalized, and that happens in the merger.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use super::types::Nullness;

/// Package holding the canonical nullness and typedef annotations.
pub const ANDROIDX_ANNOTATION: &str = "androidx.annotation";

/// `java.lang.Deprecated`.
pub const DEPRECATED: &str = "java.lang.Deprecated";

/// Annotation simple names known to live in `androidx.annotation`.
const ANDROIDX_SIMPLE_NAMES: &[&str] = &[
    "AnyThread",
    "CallSuper",
    "CheckResult",
    "ChecksSdkIntAtLeast",
    "ColorInt",
    "Dimension",
    "Discouraged",
    "FloatRange",
    "IntDef",
    "IntRange",
    "Keep",
    "LongDef",
    "MainThread",
    "NonNull",
    "Nullable",
    "Px",
    "RecentlyNonNull",
    "RecentlyNullable",
    "RequiresApi",
    "RequiresFeature",
    "RequiresPermission",
    "RestrictTo",
    "Size",
    "StringDef",
    "UiThread",
    "VisibleForTesting",
    "WorkerThread",
];

/// Annotation simple names known to live in `java.lang`.
const JAVA_LANG_ANNOTATIONS: &[&str] = &["Deprecated", "FunctionalInterface", "Override", "SafeVarargs"];

/// Third-party nullness annotations mapped onto the androidx names.
const NULLNESS_ALIASES: &[(&str, &str)] = &[
    ("android.annotation.Nullable", "androidx.annotation.Nullable"),
    ("android.annotation.NonNull", "androidx.annotation.NonNull"),
    ("libcore.util.Nullable", "androidx.annotation.Nullable"),
    ("libcore.util.NonNull", "androidx.annotation.NonNull"),
    ("org.jetbrains.annotations.Nullable", "androidx.annotation.Nullable"),
    ("org.jetbrains.annotations.NotNull", "androidx.annotation.NonNull"),
    ("javax.annotation.Nullable", "androidx.annotation.Nullable"),
    ("javax.annotation.Nonnull", "androidx.annotation.NonNull"),
    ("javax.annotation.CheckForNull", "androidx.annotation.Nullable"),
    ("org.jspecify.annotations.Nullable", "androidx.annotation.Nullable"),
    ("org.jspecify.annotations.NonNull", "androidx.annotation.NonNull"),
];

/// Map library-specific annotation names onto their canonical androidx names.
///
/// `android.support.annotation.X` becomes `androidx.annotation.X`, and the
/// common third-party nullness annotations become androidx nullness.
pub fn canonical_annotation_name(name: &str) -> Cow<'_, str> {
    if let Some(rest) = name.strip_prefix("android.support.annotation.") {
        return Cow::Owned(format!("{}.{}", ANDROIDX_ANNOTATION, rest));
    }
    if let Some((_, canonical)) = NULLNESS_ALIASES.iter().find(|(alias, _)| *alias == name) {
        return Cow::Borrowed(canonical);
    }
    Cow::Borrowed(name)
}

/// Qualify a simple annotation name written in a short-name dialect.
///
/// Names that are already qualified, or unknown, are returned unchanged.
pub fn qualify_annotation_name(name: &str) -> Cow<'_, str> {
    if name.contains('.') {
        return canonical_annotation_name(name);
    }
    if ANDROIDX_SIMPLE_NAMES.contains(&name) {
        return Cow::Owned(format!("{}.{}", ANDROIDX_ANNOTATION, name));
    }
    if JAVA_LANG_ANNOTATIONS.contains(&name) {
        return Cow::Owned(format!("java.lang.{}", name));
    }
    Cow::Borrowed(name)
}

/// Shorten a qualified annotation name for the short-name dialects.
pub fn shorten_annotation_name(name: &str) -> &str {
    if let Some(rest) = name.strip_prefix("androidx.annotation.") {
        if ANDROIDX_SIMPLE_NAMES.contains(&rest) {
            return rest;
        }
    }
    if let Some(rest) = name.strip_prefix("java.lang.") {
        if JAVA_LANG_ANNOTATIONS.contains(&rest) {
            return rest;
        }
    }
    name
}

/// One `name=value` pair of an annotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationAttribute {
    pub name: String,
    /// Raw expression text.
    pub value: String,
}

/// An annotation with its attribute expressions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    /// Canonical qualified name.
    pub name: String,
    pub attributes: Vec<AnnotationAttribute>,
}

impl Annotation {
    /// Create an annotation; the name is canonicalized.
    pub fn new(name: &str) -> Self {
        Annotation {
            name: canonical_annotation_name(name).into_owned(),
            attributes: Vec::new(),
        }
    }

    /// Builder-style attribute insertion.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(name, value);
        self
    }

    /// Insert or replace an attribute.
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|a| a.name == name) {
            Some(existing) => existing.value = value,
            None => self.attributes.push(AnnotationAttribute { name, value }),
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    /// The last segment of the qualified name.
    pub fn simple_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }

    /// Nullness expressed by this annotation, if it is a nullness annotation.
    pub fn nullness(&self) -> Option<Nullness> {
        Nullness::from_annotation_name(&self.name)
    }

    pub fn is_deprecated(&self) -> bool {
        self.name == DEPRECATED || self.name == "kotlin.Deprecated"
    }

    /// `@IntDef`, `@LongDef` or `@StringDef`.
    pub fn is_typedef(&self) -> bool {
        matches!(
            self.name.as_str(),
            "androidx.annotation.IntDef" | "androidx.annotation.LongDef" | "androidx.annotation.StringDef"
        )
    }

    /// Render as `@Name` or `@Name(args)`.
    ///
    /// A lone `value` attribute is written positionally.
    pub fn render(&self, short_names: bool) -> String {
        let name = if short_names {
            shorten_annotation_name(&self.name)
        } else {
            &self.name
        };
        let mut out = format!("@{}", name);
        match self.attributes.as_slice() {
            [] => {}
            [only] if only.name == "value" => {
                out.push('(');
                out.push_str(&only.value);
                out.push(')');
            }
            attrs => {
                out.push('(');
                let rendered: Vec<String> = attrs
                    .iter()
                    .map(|a| format!("{}={}", a.name, a.value))
                    .collect();
                out.push_str(&rendered.join(", "));
                out.push(')');
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn support_library_names_map_to_androidx() {
        let ann = Annotation::new("android.support.annotation.Nullable");
        assert_eq!(ann.name, "androidx.annotation.Nullable");
        assert_eq!(ann.nullness(), Some(Nullness::Nullable));
    }

    #[test]
    fn jetbrains_not_null_is_non_null() {
        assert_eq!(
            canonical_annotation_name("org.jetbrains.annotations.NotNull"),
            "androidx.annotation.NonNull"
        );
    }

    #[test]
    fn unknown_names_are_unchanged() {
        assert_eq!(canonical_annotation_name("test.pkg.MyAnno"), "test.pkg.MyAnno");
        assert_eq!(qualify_annotation_name("MyAnno"), "MyAnno");
    }

    #[test]
    fn qualify_and_shorten_are_inverse_for_known_names() {
        for simple in ["Nullable", "IntDef", "Deprecated", "RestrictTo"] {
            let qualified = qualify_annotation_name(simple);
            assert_eq!(shorten_annotation_name(&qualified), simple);
        }
        assert_eq!(
            shorten_annotation_name("java.lang.annotation.Retention"),
            "java.lang.annotation.Retention"
        );
    }

    #[test]
    fn render_positional_and_named() {
        let positional = Annotation::new("androidx.annotation.RestrictTo")
            .with_attribute("value", "androidx.annotation.RestrictTo.Scope.LIBRARY_GROUP");
        assert_eq!(
            positional.render(true),
            "@RestrictTo(androidx.annotation.RestrictTo.Scope.LIBRARY_GROUP)"
        );

        let named = Annotation::new("androidx.annotation.IntRange")
            .with_attribute("from", "0")
            .with_attribute("to", "255");
        assert_eq!(
            named.render(false),
            "@androidx.annotation.IntRange(from=0, to=255)"
        );
    }

    #[test]
    fn set_attribute_replaces() {
        let mut ann = Annotation::new("a.B").with_attribute("x", "1");
        ann.set_attribute("x", "2");
        assert_eq!(ann.attributes.len(), 1);
        assert_eq!(ann.attribute("x"), Some("2"));
    }
}
