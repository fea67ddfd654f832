//! Type references, nullness and type parameters.
//!
//! A [`TypeRef`] carries nullness and type-use annotations at every anchor
//! position independently: the base (component) type, each array dimension,
//! and recursively each type argument.
//!
//! Array dimensions are stored in written order. The *value* nullness of a
//! type (what a declaration-level `@Nullable` talks about) lives on the first
//! dimension for array types and on the base otherwise.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::annotation::{shorten_annotation_name, Annotation};

// ============================================================================
// Nullness
// ============================================================================

/// Nullness of one anchor position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Nullness {
    /// Unspecified ("platform") nullness.
    #[default]
    Platform,
    Nullable,
    NonNull,
    /// Nullable, newly declared relative to a previous API.
    RecentlyNullable,
    /// Non-null, newly declared relative to a previous API.
    RecentlyNonNull,
}

impl Nullness {
    pub fn is_nullable(self) -> bool {
        matches!(self, Nullness::Nullable | Nullness::RecentlyNullable)
    }

    pub fn is_non_null(self) -> bool {
        matches!(self, Nullness::NonNull | Nullness::RecentlyNonNull)
    }

    /// Anything other than platform.
    pub fn is_known(self) -> bool {
        self != Nullness::Platform
    }

    /// The "recently changed" variant of a plain nullness.
    pub fn recently(self) -> Nullness {
        match self {
            Nullness::Nullable => Nullness::RecentlyNullable,
            Nullness::NonNull => Nullness::RecentlyNonNull,
            other => other,
        }
    }

    /// The plain variant of a "recently changed" nullness.
    pub fn settled(self) -> Nullness {
        match self {
            Nullness::RecentlyNullable => Nullness::Nullable,
            Nullness::RecentlyNonNull => Nullness::NonNull,
            other => other,
        }
    }

    /// Qualified annotation name expressing this nullness.
    pub fn annotation_name(self) -> Option<&'static str> {
        match self {
            Nullness::Platform => None,
            Nullness::Nullable => Some("androidx.annotation.Nullable"),
            Nullness::NonNull => Some("androidx.annotation.NonNull"),
            Nullness::RecentlyNullable => Some("androidx.annotation.RecentlyNullable"),
            Nullness::RecentlyNonNull => Some("androidx.annotation.RecentlyNonNull"),
        }
    }

    /// Nullness for a canonical annotation name.
    pub fn from_annotation_name(name: &str) -> Option<Nullness> {
        match name {
            "androidx.annotation.Nullable" => Some(Nullness::Nullable),
            "androidx.annotation.NonNull" => Some(Nullness::NonNull),
            "androidx.annotation.RecentlyNullable" => Some(Nullness::RecentlyNullable),
            "androidx.annotation.RecentlyNonNull" => Some(Nullness::RecentlyNonNull),
            _ => None,
        }
    }

    /// Kotlin-style suffix: `?` nullable, `!` non-null, nothing for platform.
    pub fn suffix(self) -> &'static str {
        if self.is_nullable() {
            "?"
        } else if self.is_non_null() {
            "!"
        } else {
            ""
        }
    }

    /// Nullness for a Kotlin-style suffix character.
    pub fn from_suffix(ch: char) -> Option<Nullness> {
        match ch {
            '?' => Some(Nullness::Nullable),
            '!' => Some(Nullness::NonNull),
            _ => None,
        }
    }
}

impl fmt::Display for Nullness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Nullness::Platform => "platform",
            Nullness::Nullable => "nullable",
            Nullness::NonNull => "non-null",
            Nullness::RecentlyNullable => "recently-nullable",
            Nullness::RecentlyNonNull => "recently-non-null",
        };
        f.write_str(s)
    }
}

// ============================================================================
// java.lang Short Names
// ============================================================================

const PRIMITIVES: &[&str] = &[
    "boolean", "byte", "char", "short", "int", "long", "float", "double", "void",
];

/// `java.lang` classes written by simple name in the short-name dialects.
const JAVA_LANG_CLASSES: &[&str] = &[
    "AbstractMethodError",
    "Appendable",
    "ArithmeticException",
    "ArrayIndexOutOfBoundsException",
    "AssertionError",
    "AutoCloseable",
    "Boolean",
    "Byte",
    "CharSequence",
    "Character",
    "Class",
    "ClassCastException",
    "ClassLoader",
    "ClassNotFoundException",
    "CloneNotSupportedException",
    "Cloneable",
    "Comparable",
    "Deprecated",
    "Double",
    "Enum",
    "Error",
    "Exception",
    "Float",
    "FunctionalInterface",
    "IllegalArgumentException",
    "IllegalStateException",
    "IndexOutOfBoundsException",
    "InterruptedException",
    "Integer",
    "Iterable",
    "Long",
    "Math",
    "NoSuchFieldException",
    "NoSuchMethodException",
    "NullPointerException",
    "Number",
    "NumberFormatException",
    "Object",
    "Override",
    "Process",
    "Readable",
    "ReflectiveOperationException",
    "Runnable",
    "Runtime",
    "RuntimeException",
    "SafeVarargs",
    "SecurityException",
    "Short",
    "StackTraceElement",
    "String",
    "StringBuffer",
    "StringBuilder",
    "System",
    "Thread",
    "ThreadLocal",
    "Throwable",
    "UnsupportedOperationException",
    "Void",
];

/// Whether `name` is a primitive type keyword (including `void`).
pub fn is_primitive(name: &str) -> bool {
    PRIMITIVES.contains(&name)
}

/// Short form of a qualified type name, if it is a known `java.lang` class.
///
/// A short name that `is_type_variable` claims stays qualified so it cannot
/// be read back as the type variable.
pub fn shorten_unless_shadowed<'a>(
    name: &'a str,
    is_type_variable: &dyn Fn(&str) -> bool,
) -> &'a str {
    match name.strip_prefix("java.lang.") {
        Some(rest) if JAVA_LANG_CLASSES.contains(&rest) && !is_type_variable(rest) => rest,
        _ => name,
    }
}

/// Qualified form of a simple type name, if it is a known `java.lang` class.
pub fn qualify_type_name(name: &str) -> Option<String> {
    if JAVA_LANG_CLASSES.contains(&name) {
        Some(format!("java.lang.{}", name))
    } else {
        None
    }
}

// ============================================================================
// Rendering Style
// ============================================================================

/// How nullness is expressed when rendering a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullnessStyle {
    /// Nullness is not written.
    Omit,
    /// Java type-use annotations (`java.lang.@NonNull String`).
    Annotations,
    /// Kotlin-style suffixes (`String?`).
    Suffix,
}

/// Options for [`TypeRef::render`].
#[derive(Debug, Clone, Copy)]
pub struct TypeStyle {
    /// Write known `java.lang` classes by simple name.
    pub short_names: bool,
    pub nullness: NullnessStyle,
    /// Write non-nullness type-use annotations.
    pub annotations: bool,
    /// Write the value nullness of the outermost type. Off when the caller
    /// renders it as a declaration annotation instead.
    pub value_nullness: bool,
}

impl TypeStyle {
    /// Fully qualified, no annotations, no nullness.
    pub const PLAIN: TypeStyle = TypeStyle {
        short_names: false,
        nullness: NullnessStyle::Omit,
        annotations: false,
        value_nullness: false,
    };
}

// ============================================================================
// Type References
// ============================================================================

/// One array dimension (`[]` or a trailing `...`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArrayDim {
    pub nullness: Nullness,
    pub annotations: Vec<Annotation>,
}

/// Bound direction of a wildcard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundKind {
    Extends,
    Super,
}

/// A generic type argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeArg {
    Type(TypeRef),
    /// `?`, `? extends T` or `? super T`, with any type-use annotations
    /// written before the `?`.
    Wildcard {
        annotations: Vec<Annotation>,
        bound: Option<(BoundKind, Box<TypeRef>)>,
    },
}

/// A structured type reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeRef {
    /// Base name: primitive, type variable, simple or qualified class name.
    pub name: String,
    pub args: Vec<TypeArg>,
    /// Nullness of the base (component) type.
    pub nullness: Nullness,
    /// Type-use annotations on the base type (nullness excluded).
    pub annotations: Vec<Annotation>,
    /// Array dimensions in written order.
    pub dims: Vec<ArrayDim>,
    /// The last dimension is written as `...`.
    pub varargs: bool,
}

/// One step of a [`TypePath`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PathStep {
    /// Into the n-th type argument.
    Arg(usize),
    /// Into a wildcard bound.
    Bound,
    /// The base type (terminal).
    Base,
    /// The n-th array dimension (terminal).
    Dim(usize),
}

/// Position of one nullness anchor inside a type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypePath(pub Vec<PathStep>);

impl fmt::Display for TypePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|s| match s {
                PathStep::Arg(i) => format!("arg{}", i),
                PathStep::Bound => "bound".to_string(),
                PathStep::Base => "base".to_string(),
                PathStep::Dim(i) => format!("dim{}", i),
            })
            .collect();
        f.write_str(&parts.join("/"))
    }
}

impl TypeRef {
    /// A plain named type with no arguments, dimensions or nullness.
    pub fn named(name: impl Into<String>) -> Self {
        TypeRef {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Parse a type from signature syntax (V3 grammar).
    pub fn parse(text: &str) -> Result<TypeRef, crate::error::ParseError> {
        crate::parser::parse_type(text)
    }

    /// Builder-style nullness of the value anchor.
    pub fn with_nullness(mut self, nullness: Nullness) -> Self {
        self.set_value_nullness(nullness);
        self
    }

    /// Builder-style array dimension.
    pub fn array(mut self) -> Self {
        self.dims.push(ArrayDim::default());
        self
    }

    /// Builder-style type argument.
    pub fn with_arg(mut self, arg: TypeRef) -> Self {
        self.args.push(TypeArg::Type(arg));
        self
    }

    pub fn is_primitive(&self) -> bool {
        self.dims.is_empty() && is_primitive(&self.name)
    }

    pub fn is_array(&self) -> bool {
        !self.dims.is_empty()
    }

    /// Nullness of the value the type describes.
    pub fn value_nullness(&self) -> Nullness {
        match self.dims.first() {
            Some(dim) => dim.nullness,
            None => self.nullness,
        }
    }

    /// Set the nullness of the value the type describes.
    ///
    /// Ignored for primitives, which cannot be null.
    pub fn set_value_nullness(&mut self, nullness: Nullness) {
        match self.dims.first_mut() {
            Some(dim) => dim.nullness = nullness,
            None if is_primitive(&self.name) => {}
            None => self.nullness = nullness,
        }
    }

    /// Anchor of the value nullness: the outermost dimension for arrays,
    /// the base otherwise.
    pub fn value_path(&self) -> TypePath {
        if self.dims.is_empty() {
            TypePath(vec![PathStep::Base])
        } else {
            TypePath(vec![PathStep::Dim(0)])
        }
    }

    /// Every nullness anchor with its current value, in a stable order.
    pub fn nullness_anchors(&self) -> Vec<(TypePath, Nullness)> {
        let mut out = Vec::new();
        self.collect_anchors(&mut Vec::new(), &mut out);
        out
    }

    fn collect_anchors(&self, prefix: &mut Vec<PathStep>, out: &mut Vec<(TypePath, Nullness)>) {
        if !is_primitive(&self.name) || !self.dims.is_empty() {
            if !is_primitive(&self.name) {
                let mut path = prefix.clone();
                path.push(PathStep::Base);
                out.push((TypePath(path), self.nullness));
            }
            for (i, dim) in self.dims.iter().enumerate() {
                let mut path = prefix.clone();
                path.push(PathStep::Dim(i));
                out.push((TypePath(path), dim.nullness));
            }
        }
        for (i, arg) in self.args.iter().enumerate() {
            prefix.push(PathStep::Arg(i));
            match arg {
                TypeArg::Type(t) => t.collect_anchors(prefix, out),
                TypeArg::Wildcard { bound: Some((_, bound)), .. } => {
                    prefix.push(PathStep::Bound);
                    bound.collect_anchors(prefix, out);
                    prefix.pop();
                }
                TypeArg::Wildcard { bound: None, .. } => {}
            }
            prefix.pop();
        }
    }

    /// Mutable access to the nullness at an anchor.
    pub fn nullness_at_mut(&mut self, path: &TypePath) -> Option<&mut Nullness> {
        let mut current = self;
        let mut steps = path.0.iter().peekable();
        while let Some(step) = steps.next() {
            match *step {
                PathStep::Base => {
                    if steps.peek().is_some() || is_primitive(&current.name) {
                        return None;
                    }
                    return Some(&mut current.nullness);
                }
                PathStep::Dim(i) => {
                    if steps.peek().is_some() {
                        return None;
                    }
                    return current.dims.get_mut(i).map(|d| &mut d.nullness);
                }
                PathStep::Arg(i) => {
                    current = match current.args.get_mut(i)? {
                        TypeArg::Type(t) => t,
                        TypeArg::Wildcard { bound: Some((_, bound)), .. } => {
                            if steps.next() != Some(&PathStep::Bound) {
                                return None;
                            }
                            bound
                        }
                        TypeArg::Wildcard { bound: None, .. } => return None,
                    };
                }
                PathStep::Bound => return None,
            }
        }
        None
    }

    /// Qualify known `java.lang` simple names in place.
    ///
    /// `is_type_variable` reports names bound by type parameters in scope;
    /// those are never qualified.
    pub fn qualify_java_lang(&mut self, is_type_variable: &dyn Fn(&str) -> bool) {
        if !self.name.contains('.') && !is_type_variable(&self.name) {
            if let Some(qualified) = qualify_type_name(&self.name) {
                self.name = qualified;
            }
        }
        for arg in &mut self.args {
            match arg {
                TypeArg::Type(t) => t.qualify_java_lang(is_type_variable),
                TypeArg::Wildcard { bound: Some((_, bound)), .. } => {
                    bound.qualify_java_lang(is_type_variable)
                }
                TypeArg::Wildcard { bound: None, .. } => {}
            }
        }
    }

    /// Collect every class name this type mentions (base names and arguments).
    pub fn referenced_names<'a>(&'a self, out: &mut Vec<&'a str>) {
        if !is_primitive(&self.name) {
            out.push(&self.name);
        }
        for arg in &self.args {
            match arg {
                TypeArg::Type(t) => t.referenced_names(out),
                TypeArg::Wildcard { bound: Some((_, bound)), .. } => bound.referenced_names(out),
                TypeArg::Wildcard { bound: None, .. } => {}
            }
        }
    }

    /// Erased form used for signature keys: generics, annotations and
    /// nullness are dropped; type variables become their first bound.
    pub fn erased(&self, type_params: &[&TypeParameter]) -> String {
        let mut out = erase_name(&self.name, type_params, 0);
        for (i, _) in self.dims.iter().enumerate() {
            if self.varargs && i + 1 == self.dims.len() {
                out.push_str("...");
            } else {
                out.push_str("[]");
            }
        }
        out
    }

    /// Render in signature syntax.
    pub fn render(&self, style: &TypeStyle) -> String {
        self.render_scoped(style, &|_| false)
    }

    /// Render with the type variables in scope, which keep same-named
    /// `java.lang` classes qualified.
    pub fn render_scoped(
        &self,
        style: &TypeStyle,
        is_type_variable: &dyn Fn(&str) -> bool,
    ) -> String {
        let mut out = String::new();
        self.render_into(&mut out, style, is_type_variable, true);
        out
    }

    fn render_into(
        &self,
        out: &mut String,
        style: &TypeStyle,
        is_type_variable: &dyn Fn(&str) -> bool,
        outermost: bool,
    ) {
        let value_on_base = self.dims.is_empty();
        let skip_value = outermost && !style.value_nullness;

        let name = if style.short_names {
            shorten_unless_shadowed(&self.name, is_type_variable)
        } else {
            &self.name
        };

        // Base type, with any type-use annotations before its last segment.
        let mut prefix_annotations: Vec<String> = Vec::new();
        if style.nullness == NullnessStyle::Annotations && !(skip_value && value_on_base) {
            if let Some(ann) = self.nullness.annotation_name() {
                prefix_annotations.push(format!("@{}", shorten_annotation_name(ann)));
            }
        }
        if style.annotations {
            prefix_annotations.extend(self.annotations.iter().map(|a| a.render(style.short_names)));
        }
        if prefix_annotations.is_empty() {
            out.push_str(name);
        } else {
            let (qualifier, simple) = match name.rfind('.') {
                Some(idx) => name.split_at(idx + 1),
                None => ("", name),
            };
            out.push_str(qualifier);
            out.push_str(&prefix_annotations.join(" "));
            out.push(' ');
            out.push_str(simple);
        }

        if !self.args.is_empty() {
            out.push('<');
            for (i, arg) in self.args.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                match arg {
                    TypeArg::Type(t) => t.render_into(out, style, is_type_variable, false),
                    TypeArg::Wildcard { annotations, bound } => {
                        if style.annotations {
                            for ann in annotations {
                                out.push_str(&ann.render(style.short_names));
                                out.push(' ');
                            }
                        }
                        out.push('?');
                        if let Some((kind, bound)) = bound {
                            out.push_str(match kind {
                                BoundKind::Extends => " extends ",
                                BoundKind::Super => " super ",
                            });
                            bound.render_into(out, style, is_type_variable, false);
                        }
                    }
                }
            }
            out.push('>');
        }

        if style.nullness == NullnessStyle::Suffix
            && !is_primitive(&self.name)
            && !(skip_value && value_on_base)
        {
            out.push_str(self.nullness.suffix());
        }

        for (i, dim) in self.dims.iter().enumerate() {
            let is_value = i == 0;
            let write_nullness = !(skip_value && is_value);
            let brackets = if self.varargs && i + 1 == self.dims.len() {
                "..."
            } else {
                "[]"
            };
            let mut dim_annotations: Vec<String> = Vec::new();
            if style.nullness == NullnessStyle::Annotations && write_nullness {
                if let Some(ann) = dim.nullness.annotation_name() {
                    dim_annotations.push(format!("@{}", shorten_annotation_name(ann)));
                }
            }
            if style.annotations {
                dim_annotations.extend(dim.annotations.iter().map(|a| a.render(style.short_names)));
            }
            if !dim_annotations.is_empty() {
                out.push(' ');
                out.push_str(&dim_annotations.join(" "));
                out.push(' ');
            }
            out.push_str(brackets);
            if style.nullness == NullnessStyle::Suffix && write_nullness {
                out.push_str(dim.nullness.suffix());
            }
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(&TypeStyle::PLAIN))
    }
}

fn erase_name(name: &str, type_params: &[&TypeParameter], depth: usize) -> String {
    match type_params.iter().find(|p| p.name == name) {
        Some(param) if depth < 8 => match param.bounds.first() {
            Some(bound) => erase_name(&bound.name, type_params, depth + 1),
            None => "java.lang.Object".to_string(),
        },
        Some(_) => "java.lang.Object".to_string(),
        None => name.to_string(),
    }
}

// ============================================================================
// Type Parameters
// ============================================================================

/// A declared type parameter with its bounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeParameter {
    pub name: String,
    pub bounds: Vec<TypeRef>,
}

impl TypeParameter {
    pub fn new(name: impl Into<String>) -> Self {
        TypeParameter {
            name: name.into(),
            bounds: Vec::new(),
        }
    }

    pub fn with_bound(mut self, bound: TypeRef) -> Self {
        self.bounds.push(bound);
        self
    }

    /// Render as `T` or `T extends A & B`.
    pub fn render(&self, style: &TypeStyle, is_type_variable: &dyn Fn(&str) -> bool) -> String {
        if self.bounds.is_empty() {
            return self.name.clone();
        }
        let bounds: Vec<String> = self
            .bounds
            .iter()
            .map(|b| b.render_scoped(style, is_type_variable))
            .collect();
        format!("{} extends {}", self.name, bounds.join(" & "))
    }
}

/// Render a type parameter list (`<T, U extends V>`), empty for no parameters.
pub fn render_type_params(
    params: &[TypeParameter],
    style: &TypeStyle,
    is_type_variable: &dyn Fn(&str) -> bool,
) -> String {
    if params.is_empty() {
        return String::new();
    }
    let inner: Vec<String> = params.iter().map(|p| p.render(style, is_type_variable)).collect();
    format!("<{}>", inner.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn string() -> TypeRef {
        TypeRef::named("java.lang.String")
    }

    const V2: TypeStyle = TypeStyle {
        short_names: true,
        nullness: NullnessStyle::Annotations,
        annotations: true,
        value_nullness: false,
    };

    const V3: TypeStyle = TypeStyle {
        short_names: true,
        nullness: NullnessStyle::Suffix,
        annotations: true,
        value_nullness: true,
    };

    #[test]
    fn value_nullness_moves_to_first_dimension_for_arrays() {
        let mut t = string().array();
        t.set_value_nullness(Nullness::Nullable);
        assert_eq!(t.nullness, Nullness::Platform);
        assert_eq!(t.dims[0].nullness, Nullness::Nullable);
        assert_eq!(t.value_nullness(), Nullness::Nullable);
    }

    #[test]
    fn primitives_ignore_nullness() {
        let t = TypeRef::named("int").with_nullness(Nullness::NonNull);
        assert_eq!(t.value_nullness(), Nullness::Platform);
        assert_eq!(t.render(&V3), "int");
    }

    #[test]
    fn suffix_style_marks_every_anchor() {
        let mut elem = string();
        elem.nullness = Nullness::NonNull;
        let mut t = elem.array();
        t.dims[0].nullness = Nullness::Nullable;
        assert_eq!(t.render(&V3), "String![]?");

        let list = TypeRef::named("java.util.List")
            .with_arg(string().with_nullness(Nullness::Nullable))
            .with_nullness(Nullness::NonNull);
        assert_eq!(list.render(&V3), "java.util.List<String?>!");
    }

    #[test]
    fn annotation_style_binds_to_last_segment() {
        let list = TypeRef::named("java.util.List")
            .with_arg(string().with_nullness(Nullness::NonNull))
            .with_nullness(Nullness::Nullable);
        // value nullness is rendered by the caller as a declaration annotation
        assert_eq!(list.render(&V2), "java.util.List<@NonNull String>");

        let qualified = TypeStyle {
            short_names: false,
            ..V2
        };
        assert_eq!(
            list.render(&qualified),
            "java.util.List<java.lang.@NonNull String>"
        );
    }

    #[test]
    fn annotation_style_on_array_dimensions() {
        let mut t = string().array().array();
        t.dims[1].nullness = Nullness::Nullable;
        assert_eq!(t.render(&V2), "String[] @Nullable []");

        t.dims[0].nullness = Nullness::NonNull;
        let with_value = TypeStyle {
            value_nullness: true,
            ..V2
        };
        assert_eq!(t.render(&with_value), "String @NonNull [] @Nullable []");
    }

    #[test]
    fn varargs_render_as_ellipsis() {
        let mut t = string().array();
        t.varargs = true;
        assert_eq!(t.render(&TypeStyle::PLAIN), "java.lang.String...");
        assert_eq!(t.erased(&[]), "java.lang.String...");
    }

    #[test]
    fn wildcards_render() {
        let t = TypeRef {
            name: "java.util.List".into(),
            args: vec![
                TypeArg::Wildcard {
                    annotations: Vec::new(),
                    bound: None,
                },
                TypeArg::Wildcard {
                    annotations: Vec::new(),
                    bound: Some((BoundKind::Super, Box::new(TypeRef::named("T")))),
                },
            ],
            ..Default::default()
        };
        assert_eq!(t.to_string(), "java.util.List<?, ? super T>");
    }

    #[test]
    fn annotated_wildcards_keep_their_annotations() {
        let t = TypeRef {
            name: "java.util.List".into(),
            args: vec![TypeArg::Wildcard {
                annotations: vec![Annotation::new("test.pkg.Foo")],
                bound: Some((BoundKind::Extends, Box::new(TypeRef::named("java.lang.Number")))),
            }],
            ..Default::default()
        };
        assert_eq!(t.render(&V2), "java.util.List<@test.pkg.Foo ? extends Number>");
        assert_eq!(t.to_string(), "java.util.List<? extends java.lang.Number>");
    }

    #[test]
    fn shadowed_java_lang_names_stay_qualified() {
        let t = TypeRef::named("java.util.Map")
            .with_arg(string())
            .with_arg(TypeRef::named("String"));
        let is_var = |n: &str| n == "String";
        assert_eq!(
            t.render_scoped(&V2, &is_var),
            "java.util.Map<java.lang.String, String>"
        );
        assert_eq!(t.render(&V2), "java.util.Map<String, String>");
    }

    #[test]
    fn erasure_replaces_type_variables() {
        let t_param = TypeParameter::new("T").with_bound(TypeRef::named("java.lang.Number"));
        let u_param = TypeParameter::new("U");
        let params = [&t_param, &u_param];
        let list = TypeRef::named("java.util.List").with_arg(TypeRef::named("T"));
        assert_eq!(list.erased(&params), "java.util.List");
        assert_eq!(TypeRef::named("T").array().erased(&params), "java.lang.Number[]");
        assert_eq!(TypeRef::named("U").erased(&params), "java.lang.Object");
    }

    #[test]
    fn anchors_are_addressable() {
        let mut t = TypeRef::named("java.util.Map")
            .with_arg(string())
            .with_arg(string().array());
        let anchors = t.nullness_anchors();
        let paths: Vec<String> = anchors.iter().map(|(p, _)| p.to_string()).collect();
        assert_eq!(paths, vec!["base", "arg0/base", "arg1/base", "arg1/dim0"]);

        let path = anchors[3].0.clone();
        *t.nullness_at_mut(&path).unwrap() = Nullness::Nullable;
        match &t.args[1] {
            TypeArg::Type(inner) => assert_eq!(inner.dims[0].nullness, Nullness::Nullable),
            _ => panic!("expected type argument"),
        }
        // siblings untouched
        assert_eq!(t.nullness, Nullness::Platform);
    }

    #[test]
    fn java_lang_qualification_skips_type_variables() {
        let mut t = TypeRef::named("Comparable").with_arg(TypeRef::named("String"));
        t.qualify_java_lang(&|n| n == "String");
        assert_eq!(t.to_string(), "java.lang.Comparable<String>");
        assert_eq!(
            shorten_unless_shadowed("java.lang.annotation.Retention", &|_| false),
            "java.lang.annotation.Retention"
        );
    }

    #[test]
    fn type_parameter_rendering() {
        let p = TypeParameter::new("T")
            .with_bound(TypeRef::named("java.lang.Number"))
            .with_bound(TypeRef::named("java.lang.Comparable").with_arg(TypeRef::named("T")));
        assert_eq!(
            render_type_params(&[p, TypeParameter::new("U")], &TypeStyle::PLAIN, &|_| false),
            "<T extends java.lang.Number & java.lang.Comparable<T>, U>"
        );
    }
}
