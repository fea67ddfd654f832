//! JDiff XML output and input.
//!
//! The writer produces the layout consumed by the JDiff visualization tool:
//! one element per package, class, constructor, method and field, with one
//! attribute per line. Types are fully qualified and carry no nullness.
//!
//! Given a base API, [`write_diff`] emits only the classes and members that
//! are new or changed relative to it, and reports [`JdiffOutput::NoChange`]
//! when there are none.
//!
//! [`read`] loads a JDiff document back into a [`Codebase`]. Enum constants
//! written as fields come back as fields.

use std::fmt::Write as _;

use tracing::debug;

use crate::error::{ParseError, SigResult};
use crate::model::{
    class_sort_key, member_sort_key, Callable, ClassItem, ClassKind, Codebase, ConstantValue,
    FieldData, MemberItem, MemberKind, Modifier, ModifierSet, Package, ParameterItem, TypeRef,
    TypeStyle, Visibility,
};
use crate::parser::parse_type;
use crate::types::Location;
use crate::xml::{escape, parse_document, XmlElement};

/// Options for JDiff output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JdiffOptions {
    /// Value of the root `name` attribute.
    pub api_name: Option<String>,
}

/// Result of a diff against a base API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JdiffOutput {
    /// The current API adds or changes nothing relative to the base.
    NoChange,
    Document(String),
}

// ============================================================================
// Writing
// ============================================================================

/// Serialize the visible API of `codebase` as a JDiff document.
pub fn write(codebase: &Codebase, options: &JdiffOptions) -> String {
    let mut out = String::new();
    open_api(&mut out, options);
    for package in codebase.packages() {
        let classes: Vec<(&ClassItem, Vec<&MemberItem>)> = visible_classes(codebase, package)
            .into_iter()
            .map(|c| (c, visible_members(c)))
            .collect();
        write_package(&mut out, &package.name, &classes);
    }
    out.push_str("</api>\n");
    debug!(bytes = out.len(), "wrote jdiff document");
    out
}

/// Serialize only what `current` adds or changes relative to `base`.
pub fn write_diff(current: &Codebase, base: &Codebase, options: &JdiffOptions) -> JdiffOutput {
    let mut out = String::new();
    open_api(&mut out, options);
    let mut changed = 0usize;

    for package in current.packages() {
        let mut classes = Vec::new();
        for class in visible_classes(current, package) {
            let base_class = base
                .find_class(&class.qualified_name)
                .filter(|c| !base.is_class_hidden(&c.qualified_name));
            let members: Vec<&MemberItem> = visible_members(class)
                .into_iter()
                .filter(|m| match base_class {
                    Some(b) => member_changed(class, m, b),
                    None => true,
                })
                .collect();
            let header_changed = match base_class {
                Some(b) => class_open(class) != class_open(b),
                None => true,
            };
            if header_changed || !members.is_empty() {
                changed += usize::from(header_changed) + members.len();
                classes.push((class, members));
            }
        }
        write_package(&mut out, &package.name, &classes);
    }
    out.push_str("</api>\n");

    debug!(changed, "computed jdiff delta");
    if changed == 0 {
        JdiffOutput::NoChange
    } else {
        JdiffOutput::Document(out)
    }
}

fn open_api(out: &mut String, options: &JdiffOptions) {
    out.push_str("<api");
    if let Some(name) = &options.api_name {
        let _ = write!(out, "\n name=\"{}\"", escape(name));
    }
    out.push_str("\n>\n");
}

fn visible_classes<'a>(codebase: &Codebase, package: &'a Package) -> Vec<&'a ClassItem> {
    let mut classes: Vec<&ClassItem> = package
        .classes
        .iter()
        .filter(|c| !codebase.is_class_hidden(&c.qualified_name))
        .collect();
    classes.sort_by_cached_key(|c| class_sort_key(c));
    classes
}

fn visible_members(class: &ClassItem) -> Vec<&MemberItem> {
    let mut members: Vec<&MemberItem> = class.members.iter().filter(|m| !m.hidden).collect();
    members.sort_by_cached_key(|m| member_sort_key(m, false));
    members
}

fn member_changed(class: &ClassItem, member: &MemberItem, base: &ClassItem) -> bool {
    let Some(member_ref) = class.member_key(member).member else {
        return true;
    };
    match base.find_member(&member_ref).map(|i| &base.members[i]) {
        Some(before) if !before.hidden => member_element(class, before) != member_element(class, member),
        _ => true,
    }
}

fn write_package(out: &mut String, name: &str, classes: &[(&ClassItem, Vec<&MemberItem>)]) {
    if classes.is_empty() {
        return;
    }
    let _ = writeln!(out, "<package name=\"{}\"\n>", escape(name));
    for (class, members) in classes {
        out.push_str(&class_open(class));
        for interface in &class.interfaces {
            let _ = writeln!(out, "<implements name=\"{}\">\n</implements>", escape(&plain(interface)));
        }
        for member in members {
            out.push_str(&member_element(class, member));
        }
        let _ = writeln!(out, "</{}>", class_tag(class));
    }
    out.push_str("</package>\n");
}

fn class_tag(class: &ClassItem) -> &'static str {
    if class.kind.is_interface_like() {
        "interface"
    } else {
        "class"
    }
}

fn class_open(class: &ClassItem) -> String {
    let mut attrs = Attributes::new(class_tag(class), &class.name);
    match class.kind {
        ClassKind::Class => attrs.push(
            "extends",
            class
                .superclass
                .as_ref()
                .map(plain)
                .unwrap_or_else(|| "java.lang.Object".to_string()),
        ),
        ClassKind::Enum => attrs.push("extends", format!("java.lang.Enum<{}>", class.qualified_name)),
        ClassKind::Interface | ClassKind::AnnotationType => {}
    }
    let is_abstract = class.kind.is_interface_like() || class.modifiers.is_abstract();
    attrs.flag("abstract", is_abstract);
    attrs.flag("static", class.modifiers.is_static());
    attrs.flag("final", class.modifiers.is_final());
    attrs.deprecation(class.deprecated);
    attrs.push("visibility", class.modifiers.visibility.jdiff_name());
    let mut out = attrs.finish();
    if class.kind == ClassKind::AnnotationType {
        out.push_str("<implements name=\"java.lang.annotation.Annotation\">\n</implements>\n");
    }
    out
}

fn member_element(class: &ClassItem, member: &MemberItem) -> String {
    let modifiers = &member.modifiers;
    match &member.kind {
        MemberKind::Constructor(c) => {
            let mut attrs = Attributes::new("constructor", &member.name);
            attrs.push("type", class.qualified_name.as_str());
            common_flags(&mut attrs, member);
            let mut out = attrs.finish();
            callable_children(&mut out, c);
            out.push_str("</constructor>\n");
            out
        }
        MemberKind::Method(c) => {
            let mut attrs = Attributes::new("method", &member.name);
            if let Some(ret) = &c.return_type {
                attrs.push("return", plain(ret));
            }
            attrs.flag("abstract", modifiers.is_abstract());
            attrs.flag("native", modifiers.has(Modifier::Native));
            attrs.flag("synchronized", modifiers.has(Modifier::Synchronized));
            common_flags(&mut attrs, member);
            let mut out = attrs.finish();
            callable_children(&mut out, c);
            out.push_str("</method>\n");
            out
        }
        MemberKind::Field(f) | MemberKind::EnumConstant(f) => {
            let mut attrs = Attributes::new("field", &member.name);
            attrs.push("type", plain(&f.ty));
            attrs.flag("transient", modifiers.has(Modifier::Transient));
            attrs.flag("volatile", modifiers.has(Modifier::Volatile));
            if let Some(value) = &f.value {
                attrs.push("value", value.literal());
            }
            let is_constant = matches!(member.kind, MemberKind::EnumConstant(_));
            attrs.flag("static", is_constant || modifiers.is_static());
            attrs.flag("final", is_constant || modifiers.is_final());
            attrs.deprecation(member.deprecated);
            attrs.push("visibility", modifiers.visibility.jdiff_name());
            let mut out = attrs.finish();
            out.push_str("</field>\n");
            out
        }
    }
}

fn common_flags(attrs: &mut Attributes, member: &MemberItem) {
    attrs.flag("static", member.modifiers.is_static());
    attrs.flag("final", member.modifiers.is_final());
    attrs.deprecation(member.deprecated);
    attrs.push("visibility", member.modifiers.visibility.jdiff_name());
}

fn callable_children(out: &mut String, callable: &Callable) {
    for param in &callable.parameters {
        let name = param.name.as_deref().unwrap_or("null");
        let _ = writeln!(
            out,
            "<parameter name=\"{}\" type=\"{}\">\n</parameter>",
            escape(name),
            escape(&plain(&param.ty))
        );
    }
    for thrown in &callable.throws {
        let simple = thrown.name.rsplit('.').next().unwrap_or(&thrown.name);
        let _ = writeln!(
            out,
            "<exception name=\"{}\" type=\"{}\">\n</exception>",
            escape(simple),
            escape(&plain(thrown))
        );
    }
}

fn plain(ty: &TypeRef) -> String {
    ty.render(&TypeStyle::PLAIN)
}

/// Opening tag with one attribute per line.
struct Attributes {
    out: String,
}

impl Attributes {
    fn new(tag: &str, name: &str) -> Self {
        Attributes {
            out: format!("<{} name=\"{}\"", tag, escape(name)),
        }
    }

    fn push(&mut self, key: &str, value: impl AsRef<str>) {
        let _ = write!(self.out, "\n {}=\"{}\"", key, escape(value.as_ref()));
    }

    fn flag(&mut self, key: &str, value: bool) {
        self.push(key, if value { "true" } else { "false" });
    }

    fn deprecation(&mut self, deprecated: bool) {
        self.push(
            "deprecated",
            if deprecated { "deprecated" } else { "not deprecated" },
        );
    }

    fn finish(mut self) -> String {
        self.out.push_str("\n>\n");
        self.out
    }
}

// ============================================================================
// Reading
// ============================================================================

/// Load a JDiff document into a codebase.
pub fn read(file: &str, text: &str) -> SigResult<Codebase> {
    let root = parse_document(file, text)?;
    let reader = Reader { file, text };
    if root.name != "api" {
        return Err(reader.error(&root, format!("expected <api>, found <{}>", root.name)).into());
    }
    let mut codebase = Codebase::new();
    for package in root.children_named("package") {
        let name = reader.required(package, "name")?;
        codebase.ensure_package(name);
        for element in &package.children {
            if element.name == "class" || element.name == "interface" {
                codebase.add_class(reader.class(name, element)?)?;
            }
        }
    }
    codebase.canonicalize();
    debug!(
        file,
        classes = codebase.class_count(),
        members = codebase.member_count(),
        "read jdiff document"
    );
    Ok(codebase)
}

struct Reader<'a> {
    file: &'a str,
    text: &'a str,
}

impl Reader<'_> {
    fn class(&self, package: &str, element: &XmlElement) -> Result<ClassItem, ParseError> {
        let name = self.required(element, "name")?;
        let interfaces: Vec<TypeRef> = element
            .children_named("implements")
            .map(|i| self.ty(i, self.required(i, "name")?))
            .collect::<Result<_, _>>()?;
        let extends = element.attr("extends").map(|e| self.ty(element, e)).transpose()?;

        let kind = if element.name == "interface" {
            if interfaces.iter().any(|t| t.name == "java.lang.annotation.Annotation") {
                ClassKind::AnnotationType
            } else {
                ClassKind::Interface
            }
        } else if extends.as_ref().is_some_and(|t| t.name == "java.lang.Enum") {
            ClassKind::Enum
        } else {
            ClassKind::Class
        };

        let mut class = ClassItem::new(package, name, kind).with_modifiers(self.modifiers(element)?);
        if kind.is_interface_like() {
            class.modifiers.remove(Modifier::Abstract);
        }
        class.deprecated = element.attr("deprecated") == Some("deprecated");
        class.superclass = extends;
        class.interfaces = interfaces;
        class.normalize_supertypes();

        for child in &element.children {
            let member = match child.name.as_str() {
                "constructor" => self.callable(child, true)?,
                "method" => self.callable(child, false)?,
                "field" => self.field(child)?,
                _ => continue,
            };
            class
                .add_member(member)
                .map_err(|e| self.error(child, e.to_string()))?;
        }
        Ok(class)
    }

    fn callable(&self, element: &XmlElement, constructor: bool) -> Result<MemberItem, ParseError> {
        let name = self.required(element, "name")?;
        let mut callable = Callable::default();
        if !constructor {
            callable.return_type = Some(self.ty(element, self.required(element, "return")?)?);
        }
        for param in element.children_named("parameter") {
            let mut item = ParameterItem::new(self.ty(param, self.required(param, "type")?)?);
            item.name = param.attr("name").filter(|n| *n != "null").map(str::to_string);
            callable.parameters.push(item);
        }
        for exception in element.children_named("exception") {
            callable
                .throws
                .push(self.ty(exception, self.required(exception, "type")?)?);
        }
        let kind = if constructor {
            MemberKind::Constructor(callable)
        } else {
            MemberKind::Method(callable)
        };
        let mut member = MemberItem::new(name, kind).with_modifiers(self.modifiers(element)?);
        member.deprecated = element.attr("deprecated") == Some("deprecated");
        Ok(member)
    }

    fn field(&self, element: &XmlElement) -> Result<MemberItem, ParseError> {
        let name = self.required(element, "name")?;
        let ty = self.ty(element, self.required(element, "type")?)?;
        let value = match element.attr("value") {
            Some(literal) => Some(ConstantValue::parse(literal, &plain(&ty)).ok_or_else(|| {
                self.error(element, format!("invalid value '{}' for type {}", literal, plain(&ty)))
            })?),
            None => None,
        };
        let mut member = MemberItem::new(name, MemberKind::Field(FieldData { ty, value }))
            .with_modifiers(self.modifiers(element)?);
        member.deprecated = element.attr("deprecated") == Some("deprecated");
        Ok(member)
    }

    fn modifiers(&self, element: &XmlElement) -> Result<ModifierSet, ParseError> {
        let visibility = match element.attr("visibility").unwrap_or("") {
            "" => Visibility::PackagePrivate,
            word => Visibility::from_keyword(word)
                .ok_or_else(|| self.error(element, format!("unknown visibility '{}'", word)))?,
        };
        let mut modifiers = ModifierSet::new(visibility);
        for modifier in [
            Modifier::Static,
            Modifier::Final,
            Modifier::Abstract,
            Modifier::Transient,
            Modifier::Volatile,
            Modifier::Synchronized,
            Modifier::Native,
        ] {
            if element.attr(modifier.keyword()) == Some("true") {
                modifiers.insert(modifier);
            }
        }
        Ok(modifiers)
    }

    fn ty(&self, element: &XmlElement, text: &str) -> Result<TypeRef, ParseError> {
        parse_type(text).map_err(|e| self.error(element, format!("invalid type '{}': {}", text, e.message)))
    }

    fn required<'e>(&self, element: &'e XmlElement, attr: &str) -> Result<&'e str, ParseError> {
        element
            .attr(attr)
            .ok_or_else(|| self.error(element, format!("<{}> is missing '{}'", element.name, attr)))
    }

    fn error(&self, element: &XmlElement, message: impl Into<String>) -> ParseError {
        let (line, col) = crate::text::byte_offset_to_position(self.text, element.offset.min(self.text.len()));
        ParseError::new(Location::new(self.file, line, col), message)
    }
}
