//! In-memory API model.
//!
//! Ownership is strictly top-down: a [`Codebase`] owns its packages, packages
//! own their classes, classes own their members. Back-references (member to
//! class, class to package, nested to outer) are qualified-name keys resolved
//! through the owning codebase.

pub mod annotation;
pub mod constant;
pub mod key;
pub mod modifiers;
pub mod types;

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use thiserror::Error;

pub use annotation::{Annotation, AnnotationAttribute};
pub use constant::ConstantValue;
pub use key::{ElementKey, MemberRef};
pub use modifiers::{Modifier, ModifierSet, Visibility};
pub use types::{
    ArrayDim, BoundKind, Nullness, NullnessStyle, PathStep, TypeArg, TypeParameter, TypePath,
    TypeRef, TypeStyle,
};

use key::normalize_key_type;

// ============================================================================
// Errors
// ============================================================================

/// Structural invariant violations while building a codebase.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// Two classes share a qualified name.
    #[error("duplicate class {name}")]
    DuplicateClass { name: String },

    /// Two members of one class share an erased signature.
    #[error("duplicate member {signature} in {class}")]
    DuplicateMember { class: String, signature: String },

    /// A member was added to a class that does not exist.
    #[error("class {name} not found")]
    ClassNotFound { name: String },
}

// ============================================================================
// Kinds
// ============================================================================

/// Kind of a class-like declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassKind {
    Class,
    Interface,
    Enum,
    AnnotationType,
}

impl ClassKind {
    pub fn keyword(self) -> &'static str {
        match self {
            ClassKind::Class => "class",
            ClassKind::Interface => "interface",
            ClassKind::Enum => "enum",
            ClassKind::AnnotationType => "@interface",
        }
    }

    pub fn from_keyword(word: &str) -> Option<ClassKind> {
        match word {
            "class" => Some(ClassKind::Class),
            "interface" => Some(ClassKind::Interface),
            "enum" => Some(ClassKind::Enum),
            "@interface" => Some(ClassKind::AnnotationType),
            _ => None,
        }
    }

    /// Interfaces and annotation types list their supertypes under `extends`.
    pub fn is_interface_like(self) -> bool {
        matches!(self, ClassKind::Interface | ClassKind::AnnotationType)
    }
}

/// Kind of a member, for grouping on write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MemberGroup {
    Constructor,
    Method,
    Field,
    EnumConstant,
}

impl MemberGroup {
    /// Keyword opening the member line.
    pub fn keyword(self) -> &'static str {
        match self {
            MemberGroup::Constructor => "ctor",
            MemberGroup::Method => "method",
            MemberGroup::Field => "field",
            MemberGroup::EnumConstant => "enum_constant",
        }
    }
}

// ============================================================================
// Members
// ============================================================================

/// A constructor or method parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterItem {
    pub name: Option<String>,
    pub ty: TypeRef,
    /// Declaration annotations other than nullness.
    pub annotations: Vec<Annotation>,
    /// Raw default-value expression text.
    pub default_value: Option<String>,
}

impl ParameterItem {
    pub fn new(ty: TypeRef) -> Self {
        ParameterItem {
            name: None,
            ty,
            annotations: Vec::new(),
            default_value: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn is_varargs(&self) -> bool {
        self.ty.varargs
    }
}

/// Shared data of constructors and methods.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Callable {
    pub type_params: Vec<TypeParameter>,
    /// Absent for constructors.
    pub return_type: Option<TypeRef>,
    pub parameters: Vec<ParameterItem>,
    pub throws: Vec<TypeRef>,
    /// `default` value of an annotation-type method, as raw text.
    pub annotation_default: Option<String>,
}

/// Shared data of fields and enum constants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldData {
    pub ty: TypeRef,
    pub value: Option<ConstantValue>,
}

/// Member-kind specific data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberKind {
    Constructor(Callable),
    Method(Callable),
    Field(FieldData),
    EnumConstant(FieldData),
}

/// A constructor, method, field or enum constant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberItem {
    pub name: String,
    pub modifiers: ModifierSet,
    /// Declaration annotations other than nullness and `@Deprecated`.
    pub annotations: Vec<Annotation>,
    pub deprecated: bool,
    /// Excluded from the API surface.
    pub hidden: bool,
    /// Qualified name of the owning class.
    pub containing_class: String,
    pub kind: MemberKind,
}

impl MemberItem {
    pub fn new(name: impl Into<String>, kind: MemberKind) -> Self {
        MemberItem {
            name: name.into(),
            modifiers: ModifierSet::default(),
            annotations: Vec::new(),
            deprecated: false,
            hidden: false,
            containing_class: String::new(),
            kind,
        }
    }

    pub fn constructor(name: impl Into<String>, parameters: Vec<ParameterItem>) -> Self {
        MemberItem::new(
            name,
            MemberKind::Constructor(Callable {
                parameters,
                ..Default::default()
            }),
        )
    }

    pub fn method(name: impl Into<String>, return_type: TypeRef, parameters: Vec<ParameterItem>) -> Self {
        MemberItem::new(
            name,
            MemberKind::Method(Callable {
                return_type: Some(return_type),
                parameters,
                ..Default::default()
            }),
        )
    }

    pub fn field(name: impl Into<String>, ty: TypeRef) -> Self {
        MemberItem::new(name, MemberKind::Field(FieldData { ty, value: None }))
    }

    pub fn enum_constant(name: impl Into<String>, ty: TypeRef) -> Self {
        MemberItem::new(name, MemberKind::EnumConstant(FieldData { ty, value: None }))
    }

    /// Builder-style modifiers.
    pub fn with_modifiers(mut self, modifiers: ModifierSet) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn group(&self) -> MemberGroup {
        match self.kind {
            MemberKind::Constructor(_) => MemberGroup::Constructor,
            MemberKind::Method(_) => MemberGroup::Method,
            MemberKind::Field(_) => MemberGroup::Field,
            MemberKind::EnumConstant(_) => MemberGroup::EnumConstant,
        }
    }

    pub fn callable(&self) -> Option<&Callable> {
        match &self.kind {
            MemberKind::Constructor(c) | MemberKind::Method(c) => Some(c),
            _ => None,
        }
    }

    pub fn callable_mut(&mut self) -> Option<&mut Callable> {
        match &mut self.kind {
            MemberKind::Constructor(c) | MemberKind::Method(c) => Some(c),
            _ => None,
        }
    }

    pub fn field_data(&self) -> Option<&FieldData> {
        match &self.kind {
            MemberKind::Field(f) | MemberKind::EnumConstant(f) => Some(f),
            _ => None,
        }
    }

    /// Return type of a method or type of a field.
    pub fn value_type(&self) -> Option<&TypeRef> {
        match &self.kind {
            MemberKind::Method(c) => c.return_type.as_ref(),
            MemberKind::Field(f) | MemberKind::EnumConstant(f) => Some(&f.ty),
            MemberKind::Constructor(_) => None,
        }
    }

    pub fn value_type_mut(&mut self) -> Option<&mut TypeRef> {
        match &mut self.kind {
            MemberKind::Method(c) => c.return_type.as_mut(),
            MemberKind::Field(f) | MemberKind::EnumConstant(f) => Some(&mut f.ty),
            MemberKind::Constructor(_) => None,
        }
    }

    pub fn parameters(&self) -> &[ParameterItem] {
        self.callable().map(|c| c.parameters.as_slice()).unwrap_or(&[])
    }

    /// Erased signature used for the per-class uniqueness invariant.
    ///
    /// Fields: `name`; methods: `name(erased params)`; constructors:
    /// `<init>(erased params)`.
    pub fn erased_signature(&self, class_type_params: &[TypeParameter]) -> String {
        match &self.kind {
            MemberKind::Field(_) | MemberKind::EnumConstant(_) => self.name.clone(),
            MemberKind::Constructor(c) | MemberKind::Method(c) => {
                let scope: Vec<&TypeParameter> =
                    c.type_params.iter().chain(class_type_params.iter()).collect();
                let params: Vec<String> = c
                    .parameters
                    .iter()
                    .map(|p| p.ty.erased(&scope).replace("...", "[]"))
                    .collect();
                let name = if matches!(self.kind, MemberKind::Constructor(_)) {
                    "<init>"
                } else {
                    self.name.as_str()
                };
                format!("{}({})", name, params.join(","))
            }
        }
    }

    /// Whether this member is the one a key's member part designates.
    pub fn matches(&self, member: &MemberRef, class_type_params: &[TypeParameter]) -> bool {
        match (member, &self.kind) {
            (MemberRef::Field(name), MemberKind::Field(_) | MemberKind::EnumConstant(_)) => {
                *name == self.name
            }
            (
                MemberRef::Callable {
                    return_type,
                    name,
                    parameters,
                },
                MemberKind::Constructor(c) | MemberKind::Method(c),
            ) => {
                let is_ctor = matches!(self.kind, MemberKind::Constructor(_));
                let name_matches = if is_ctor {
                    return_type.is_none() && last_segment(name) == last_segment(&self.name)
                } else {
                    *name == self.name
                };
                name_matches && parameters_match(c, parameters, class_type_params)
            }
            _ => false,
        }
    }
}

fn last_segment(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}

fn parameters_match(callable: &Callable, wanted: &[String], class_type_params: &[TypeParameter]) -> bool {
    if callable.parameters.len() != wanted.len() {
        return false;
    }
    let scope: Vec<&TypeParameter> = callable
        .type_params
        .iter()
        .chain(class_type_params.iter())
        .collect();
    callable.parameters.iter().zip(wanted).all(|(param, wanted)| {
        let erased = param.ty.erased(&scope).replace("...", "[]");
        erased == *wanted || normalize_key_type(&param.ty.to_string()) == *wanted
    })
}

// ============================================================================
// Classes
// ============================================================================

/// A class, interface, enum or annotation type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassItem {
    /// Name inside the package; nested classes are `Outer.Inner`.
    pub name: String,
    pub qualified_name: String,
    /// Name of the containing package.
    pub package: String,
    /// Qualified name of the enclosing class, for nested classes.
    pub outer: Option<String>,
    pub kind: ClassKind,
    pub modifiers: ModifierSet,
    pub deprecated: bool,
    pub hidden: bool,
    /// Declaration annotations other than `@Deprecated`.
    pub annotations: Vec<Annotation>,
    pub type_params: Vec<TypeParameter>,
    /// Absent for interfaces, `java.lang.Object` and implicit supertypes.
    pub superclass: Option<TypeRef>,
    pub interfaces: Vec<TypeRef>,
    pub members: Vec<MemberItem>,
}

impl ClassItem {
    pub fn new(package: &str, name: &str, kind: ClassKind) -> Self {
        let qualified_name = if package.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", package, name)
        };
        ClassItem {
            name: name.to_string(),
            qualified_name,
            package: package.to_string(),
            outer: None,
            kind,
            modifiers: ModifierSet::default(),
            deprecated: false,
            hidden: false,
            annotations: Vec::new(),
            type_params: Vec::new(),
            superclass: None,
            interfaces: Vec::new(),
            members: Vec::new(),
        }
    }

    /// Builder-style modifiers.
    pub fn with_modifiers(mut self, modifiers: ModifierSet) -> Self {
        self.modifiers = modifiers;
        self
    }

    /// Last segment of the name.
    pub fn simple_name(&self) -> &str {
        last_segment(&self.name)
    }

    /// Add a member, enforcing erased-signature uniqueness.
    pub fn add_member(&mut self, mut member: MemberItem) -> Result<(), ModelError> {
        let signature = member.erased_signature(&self.type_params);
        if self
            .members
            .iter()
            .any(|m| m.erased_signature(&self.type_params) == signature)
        {
            return Err(ModelError::DuplicateMember {
                class: self.qualified_name.clone(),
                signature,
            });
        }
        member.containing_class = self.qualified_name.clone();
        self.members.push(member);
        Ok(())
    }

    /// Builder-style [`ClassItem::add_member`] for tests and fixtures.
    pub fn with_member(mut self, member: MemberItem) -> Result<Self, ModelError> {
        self.add_member(member)?;
        Ok(self)
    }

    pub fn find_member(&self, member: &MemberRef) -> Option<usize> {
        self.members
            .iter()
            .position(|m| m.matches(member, &self.type_params))
    }

    pub fn find_field(&self, name: &str) -> Option<&MemberItem> {
        self.members
            .iter()
            .find(|m| m.field_data().is_some() && m.name == name)
    }

    /// Element key of one of this class's members.
    pub fn member_key(&self, member: &MemberItem) -> ElementKey {
        match &member.kind {
            MemberKind::Field(_) | MemberKind::EnumConstant(_) => {
                ElementKey::field(&self.qualified_name, &member.name)
            }
            MemberKind::Constructor(c) => ElementKey::callable(
                &self.qualified_name,
                None,
                self.simple_name(),
                c.parameters.iter().map(|p| p.ty.to_string()).collect(),
            ),
            MemberKind::Method(c) => ElementKey::callable(
                &self.qualified_name,
                c.return_type.as_ref().map(|t| t.to_string()),
                &member.name,
                c.parameters.iter().map(|p| p.ty.to_string()).collect(),
            ),
        }
    }

    /// Names of the declared supertypes (superclass first).
    pub fn supertype_names(&self) -> Vec<&str> {
        self.superclass
            .iter()
            .chain(self.interfaces.iter())
            .map(|t| t.name.as_str())
            .collect()
    }

    /// Drop supertypes that are implicit for this kind of class.
    pub fn normalize_supertypes(&mut self) {
        let implicit = match self.kind {
            ClassKind::Class => "java.lang.Object",
            ClassKind::Enum => "java.lang.Enum",
            ClassKind::AnnotationType | ClassKind::Interface => "java.lang.annotation.Annotation",
        };
        if self.kind.is_interface_like() {
            if let Some(superclass) = self.superclass.take() {
                self.interfaces.insert(0, superclass);
            }
            if self.kind == ClassKind::AnnotationType {
                self.interfaces.retain(|t| t.name != implicit);
            }
        } else if self
            .superclass
            .as_ref()
            .is_some_and(|t| t.name == implicit || t.name == "java.lang.Object")
        {
            self.superclass = None;
        }
    }

    /// Sort members into canonical write order.
    pub fn sort_members(&mut self, short_names: bool) {
        self.members
            .sort_by_cached_key(|m| member_sort_key(m, short_names));
    }
}

/// Canonical sort key of a member: group, then name, then parameter types.
pub fn member_sort_key(member: &MemberItem, short_names: bool) -> (MemberGroup, String, String) {
    let style = TypeStyle {
        short_names,
        ..TypeStyle::PLAIN
    };
    let params: Vec<String> = member
        .parameters()
        .iter()
        .map(|p| p.ty.render(&style))
        .collect();
    (member.group(), member.name.clone(), params.join(", "))
}

/// Canonical sort key of a class: its name split into segments, so nested
/// classes follow their outer class immediately.
pub fn class_sort_key(class: &ClassItem) -> Vec<String> {
    class.name.split('.').map(str::to_string).collect()
}

// ============================================================================
// Packages
// ============================================================================

/// A package and the classes it declares.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Package {
    pub name: String,
    pub annotations: Vec<Annotation>,
    pub classes: Vec<ClassItem>,
}

impl Package {
    pub fn new(name: impl Into<String>) -> Self {
        Package {
            name: name.into(),
            annotations: Vec::new(),
            classes: Vec::new(),
        }
    }
}

// ============================================================================
// Element References
// ============================================================================

/// A model node a key resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementRef {
    Class { class: String },
    Member { class: String, member: usize },
    Parameter { class: String, member: usize, parameter: usize },
}

impl ElementRef {
    pub fn class(&self) -> &str {
        match self {
            ElementRef::Class { class }
            | ElementRef::Member { class, .. }
            | ElementRef::Parameter { class, .. } => class,
        }
    }
}

// ============================================================================
// Codebase
// ============================================================================

/// Root container of an API surface.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Codebase {
    packages: BTreeMap<String, Package>,
    /// Qualified class name to package name.
    index: BTreeMap<String, String>,
}

impl Codebase {
    pub fn new() -> Self {
        Codebase::default()
    }

    /// Packages in canonical (name) order.
    pub fn packages(&self) -> impl Iterator<Item = &Package> {
        self.packages.values()
    }

    pub fn package(&self, name: &str) -> Option<&Package> {
        self.packages.get(name)
    }

    pub fn package_mut(&mut self, name: &str) -> Option<&mut Package> {
        self.packages.get_mut(name)
    }

    /// Get a package, creating it when absent.
    pub fn ensure_package(&mut self, name: &str) -> &mut Package {
        self.packages
            .entry(name.to_string())
            .or_insert_with(|| Package::new(name))
    }

    /// Add a class to its package, enforcing qualified-name uniqueness.
    pub fn add_class(&mut self, mut class: ClassItem) -> Result<(), ModelError> {
        if self.index.contains_key(&class.qualified_name) {
            return Err(ModelError::DuplicateClass {
                name: class.qualified_name,
            });
        }
        for member in &mut class.members {
            member.containing_class = class.qualified_name.clone();
        }
        self.index
            .insert(class.qualified_name.clone(), class.package.clone());
        let package = class.package.clone();
        self.ensure_package(&package).classes.push(class);
        Ok(())
    }

    /// Add a member to an existing class.
    pub fn add_member(&mut self, class: &str, member: MemberItem) -> Result<(), ModelError> {
        let Some(target) = self.find_class_mut(class) else {
            return Err(ModelError::ClassNotFound {
                name: class.to_string(),
            });
        };
        target.add_member(member)
    }

    pub fn find_class(&self, qualified_name: &str) -> Option<&ClassItem> {
        let package = self.index.get(qualified_name)?;
        self.packages
            .get(package)?
            .classes
            .iter()
            .find(|c| c.qualified_name == qualified_name)
    }

    pub fn find_class_mut(&mut self, qualified_name: &str) -> Option<&mut ClassItem> {
        let package = self.index.get(qualified_name)?;
        self.packages
            .get_mut(package)?
            .classes
            .iter_mut()
            .find(|c| c.qualified_name == qualified_name)
    }

    pub fn contains_class(&self, qualified_name: &str) -> bool {
        self.index.contains_key(qualified_name)
    }

    /// All classes, packages in name order, classes in declaration order.
    pub fn classes(&self) -> impl Iterator<Item = &ClassItem> {
        self.packages.values().flat_map(|p| p.classes.iter())
    }

    pub fn classes_mut(&mut self) -> impl Iterator<Item = &mut ClassItem> {
        self.packages.values_mut().flat_map(|p| p.classes.iter_mut())
    }

    /// Qualified names of all classes, sorted.
    pub fn class_names(&self) -> Vec<String> {
        self.index.keys().cloned().collect()
    }

    pub fn class_count(&self) -> usize {
        self.index.len()
    }

    pub fn member_count(&self) -> usize {
        self.classes().map(|c| c.members.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Whether a class is hidden, directly or through an enclosing class.
    pub fn is_class_hidden(&self, qualified_name: &str) -> bool {
        let mut current = self.find_class(qualified_name);
        while let Some(class) = current {
            if class.hidden {
                return true;
            }
            current = class.outer.as_deref().and_then(|o| self.find_class(o));
        }
        false
    }

    /// Resolve a key to a model node.
    pub fn resolve(&self, key: &ElementKey) -> Option<ElementRef> {
        let class = self.find_class(&key.class)?;
        let Some(member) = &key.member else {
            return Some(ElementRef::Class {
                class: class.qualified_name.clone(),
            });
        };
        let index = class.find_member(member)?;
        match key.parameter {
            None => Some(ElementRef::Member {
                class: class.qualified_name.clone(),
                member: index,
            }),
            Some(parameter) if parameter < class.members[index].parameters().len() => {
                Some(ElementRef::Parameter {
                    class: class.qualified_name.clone(),
                    member: index,
                    parameter,
                })
            }
            Some(_) => None,
        }
    }

    /// Ancestors of a class present in this codebase, nearest first
    /// (breadth-first over superclass then interfaces).
    pub fn ancestors(&self, qualified_name: &str) -> Vec<&ClassItem> {
        let mut seen = BTreeSet::new();
        let mut out = Vec::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        if let Some(class) = self.find_class(qualified_name) {
            queue.extend(class.supertype_names());
        }
        seen.insert(qualified_name.to_string());
        while let Some(name) = queue.pop_front() {
            if !seen.insert(name.to_string()) {
                continue;
            }
            if let Some(class) = self.find_class(name) {
                queue.extend(class.supertype_names());
                out.push(class);
            }
        }
        out
    }

    /// Resolve outer-class links and normalize implicit supertypes.
    pub fn canonicalize(&mut self) {
        let names: BTreeSet<String> = self.index.keys().cloned().collect();
        for class in self.classes_mut() {
            class.outer = class.name.rfind('.').map(|idx| {
                if class.package.is_empty() {
                    class.name[..idx].to_string()
                } else {
                    format!("{}.{}", class.package, &class.name[..idx])
                }
            });
            if let Some(outer) = &class.outer {
                if !names.contains(outer) {
                    class.outer = None;
                }
            }
            class.normalize_supertypes();
        }
    }

    /// Sort classes and members into canonical write order.
    pub fn sort_canonical(&mut self, short_names: bool) {
        for package in self.packages.values_mut() {
            package.classes.sort_by_cached_key(class_sort_key);
            for class in &mut package.classes {
                class.sort_members(short_names);
            }
        }
    }
}
