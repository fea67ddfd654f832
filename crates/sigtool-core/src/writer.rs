//! Signature file writer.
//!
//! Output is canonical: packages by name, classes by segment-wise name (so
//! nested classes directly follow their outer class), members grouped as
//! ctor, method, field, enum_constant and sorted by name then parameter
//! types. Hidden classes and members are omitted.

use tracing::debug;

use crate::error::{SigError, SigResult};
use crate::format::{FileFormat, FormatPolicy};
use crate::model::annotation::shorten_annotation_name;
use crate::model::types::render_type_params;
use crate::model::{
    class_sort_key, member_sort_key, Annotation, ClassItem, Codebase, MemberItem, MemberKind,
    Nullness, NullnessStyle, Package, ParameterItem, TypeRef, TypeStyle,
};

/// Caller-controlled switches layered over the dialect policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterOptions {
    /// Write every type fully qualified, even in short-name dialects.
    pub qualified_names: bool,
    /// Write parameter default values in dialects that omit them by default.
    pub include_default_values: bool,
    /// Write `synchronized`/`native`/`strictfp`/`default` in every dialect.
    pub compat_modifiers: bool,
}

/// Serialize `codebase` as a signature file in `format`.
pub fn write(codebase: &Codebase, format: FileFormat, options: &WriterOptions) -> SigResult<String> {
    if !format.is_signature() {
        return Err(SigError::unsupported_format(format, "signature output"));
    }
    let writer = SignatureWriter::new(codebase, format, options);
    let out = writer.write_all();
    debug!(format = %format, bytes = out.len(), "wrote signature file");
    Ok(out)
}

struct SignatureWriter<'a> {
    codebase: &'a Codebase,
    format: FileFormat,
    policy: FormatPolicy,
    style: TypeStyle,
    compat: bool,
    default_values: bool,
    out: String,
}

impl<'a> SignatureWriter<'a> {
    fn new(codebase: &'a Codebase, format: FileFormat, options: &WriterOptions) -> Self {
        let policy = format.policy();
        let style = TypeStyle {
            short_names: policy.short_names && !options.qualified_names,
            nullness: policy.nullness,
            annotations: policy.annotations,
            value_nullness: policy.nullness == NullnessStyle::Suffix,
        };
        SignatureWriter {
            codebase,
            format,
            policy,
            style,
            compat: policy.compat_modifiers || options.compat_modifiers,
            default_values: policy.default_values || options.include_default_values,
            out: String::new(),
        }
    }

    fn write_all(mut self) -> String {
        if let Some(header) = self.format.header() {
            self.out.push_str(header);
            self.out.push('\n');
        }
        for package in self.codebase.packages() {
            self.write_package(package);
        }
        self.out
    }

    fn write_package(&mut self, package: &Package) {
        let mut classes: Vec<&ClassItem> = package
            .classes
            .iter()
            .filter(|c| !self.codebase.is_class_hidden(&c.qualified_name))
            .collect();
        if classes.is_empty() && !package.classes.is_empty() {
            return;
        }
        classes.sort_by_cached_key(|c| class_sort_key(c));

        self.out.push_str("package ");
        if self.policy.annotations {
            for ann in &package.annotations {
                self.out.push_str(&self.annotation(ann));
                self.out.push(' ');
            }
        }
        self.out.push_str(&package.name);
        self.out.push_str(" {\n\n");
        for class in classes {
            self.write_class(class);
        }
        self.out.push_str("}\n\n");
    }

    fn write_class(&mut self, class: &ClassItem) {
        self.out.push_str("  ");
        let prefix = self.prefix(
            class.deprecated,
            Nullness::Platform,
            &class.annotations,
            class.modifiers.keywords(self.compat),
        );
        self.out.push_str(&prefix);
        self.out.push_str(class.kind.keyword());
        self.out.push(' ');
        self.out.push_str(&class.name);
        let class_vars: Vec<&str> = class.type_params.iter().map(|p| p.name.as_str()).collect();
        let is_var = |n: &str| class_vars.contains(&n);
        self.out
            .push_str(&render_type_params(&class.type_params, &self.bare_style(), &is_var));

        if let Some(superclass) = &class.superclass {
            self.out.push_str(" extends ");
            self.out.push_str(&superclass.render_scoped(&self.bare_style(), &is_var));
        }
        if !class.interfaces.is_empty() {
            let keyword = if class.kind.is_interface_like() {
                " extends "
            } else {
                " implements "
            };
            self.out.push_str(keyword);
            let names: Vec<String> = class
                .interfaces
                .iter()
                .map(|t| t.render_scoped(&self.bare_style(), &is_var))
                .collect();
            self.out.push_str(&names.join(" "));
        }
        self.out.push_str(" {\n");

        let mut members: Vec<&MemberItem> = class.members.iter().filter(|m| !m.hidden).collect();
        members.sort_by_cached_key(|m| member_sort_key(m, self.style.short_names));
        for member in members {
            self.write_member(member, &class_vars);
        }
        self.out.push_str("  }\n\n");
    }

    /// `class_vars` are the enclosing class's type variables.
    fn write_member(&mut self, member: &MemberItem, class_vars: &[&str]) {
        let method_vars: Vec<&str> = member
            .callable()
            .map(|c| c.type_params.iter().map(|p| p.name.as_str()).collect())
            .unwrap_or_default();
        let is_var = |n: &str| class_vars.contains(&n) || method_vars.contains(&n);

        self.out.push_str("    ");
        self.out.push_str(member.group().keyword());
        self.out.push(' ');

        let value_nullness = member
            .value_type()
            .map(TypeRef::value_nullness)
            .unwrap_or_default();
        let prefix = self.prefix(
            member.deprecated,
            value_nullness,
            &member.annotations,
            member.modifiers.keywords(self.compat),
        );
        self.out.push_str(&prefix);

        match &member.kind {
            MemberKind::Constructor(c) | MemberKind::Method(c) => {
                let type_params = render_type_params(&c.type_params, &self.bare_style(), &is_var);
                if !type_params.is_empty() {
                    self.out.push_str(&type_params);
                    self.out.push(' ');
                }
                if let Some(ret) = &c.return_type {
                    self.out.push_str(&ret.render_scoped(&self.style, &is_var));
                    self.out.push(' ');
                }
                self.out.push_str(&member.name);
                self.out.push('(');
                let params: Vec<String> =
                    c.parameters.iter().map(|p| self.parameter(p, &is_var)).collect();
                self.out.push_str(&params.join(", "));
                self.out.push(')');
                if !c.throws.is_empty() {
                    let throws: Vec<String> = c
                        .throws
                        .iter()
                        .map(|t| t.render_scoped(&self.bare_style(), &is_var))
                        .collect();
                    self.out.push_str(" throws ");
                    self.out.push_str(&throws.join(", "));
                }
                if let Some(default) = &c.annotation_default {
                    self.out.push_str(" default ");
                    self.out.push_str(default);
                }
                self.out.push_str(";\n");
            }
            MemberKind::Field(f) | MemberKind::EnumConstant(f) => {
                self.out.push_str(&f.ty.render_scoped(&self.style, &is_var));
                self.out.push(' ');
                self.out.push_str(&member.name);
                match &f.value {
                    Some(value) => {
                        self.out.push_str(" = ");
                        self.out.push_str(&value.literal());
                        self.out.push(';');
                        if let Some(comment) = value.comment() {
                            self.out.push_str(" // ");
                            self.out.push_str(&comment);
                        }
                        self.out.push('\n');
                    }
                    None => self.out.push_str(";\n"),
                }
            }
        }
    }

    fn parameter(&self, param: &ParameterItem, is_var: &dyn Fn(&str) -> bool) -> String {
        let mut out = String::new();
        if self.policy.nullness == NullnessStyle::Annotations {
            if let Some(name) = param.ty.value_nullness().annotation_name() {
                out.push('@');
                out.push_str(shorten_annotation_name(name));
                out.push(' ');
            }
        }
        if self.policy.annotations {
            for ann in &param.annotations {
                out.push_str(&self.annotation(ann));
                out.push(' ');
            }
        }
        out.push_str(&param.ty.render_scoped(&self.style, is_var));
        if self.policy.parameter_names {
            if let Some(name) = &param.name {
                out.push(' ');
                out.push_str(name);
            }
        }
        if self.default_values {
            if let Some(default) = &param.default_value {
                out.push_str(" = ");
                out.push_str(default);
            }
        }
        out
    }

    /// Declaration prefix, each part followed by a space.
    ///
    /// V1 writes `deprecated` before the visibility keyword; the annotated
    /// dialects write `@Deprecated`, then nullness, then other annotations,
    /// all before the modifiers.
    fn prefix(
        &self,
        deprecated: bool,
        value_nullness: Nullness,
        annotations: &[Annotation],
        keywords: Vec<&'static str>,
    ) -> String {
        let mut parts: Vec<String> = Vec::new();
        if deprecated {
            if self.policy.deprecated_keyword {
                parts.push("deprecated".to_string());
            } else {
                parts.push("@Deprecated".to_string());
            }
        }
        if self.policy.nullness == NullnessStyle::Annotations {
            if let Some(name) = value_nullness.annotation_name() {
                parts.push(format!("@{}", shorten_annotation_name(name)));
            }
        }
        if self.policy.annotations {
            parts.extend(annotations.iter().map(|a| self.annotation(a)));
        }
        parts.extend(keywords.into_iter().map(str::to_string));

        let mut out = String::new();
        for part in parts {
            out.push_str(&part);
            out.push(' ');
        }
        out
    }

    fn annotation(&self, ann: &Annotation) -> String {
        ann.render(self.policy.short_names)
    }

    /// Style for supertypes, bounds and throws lists: no value nullness.
    fn bare_style(&self) -> TypeStyle {
        TypeStyle {
            value_nullness: false,
            ..self.style
        }
    }
}
