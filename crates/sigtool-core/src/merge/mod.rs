//! Annotation merging.
//!
//! [`merge`] overlays annotation sources onto a base codebase as a strictly
//! sequential fold over the source list. Each source resolves to
//! `(element key, assignment)` pairs; later sources overwrite earlier ones
//! on the same element and slot (annotation name, nullness anchor, or
//! hide/show state), and every overwrite with a different value raises an
//! [`IssueId::InconsistentMergeAnnotation`] warning.
//!
//! Keys that do not resolve are ignored for overlay sources (stale data is
//! tolerated) and fatal for inclusion sources, which may only reveal or hide
//! existing nodes.

mod inclusion;
mod nullness;
mod signature;
mod typedef;
mod xml;

use std::collections::BTreeMap;
use std::path::PathBuf;

use thiserror::Error;
use tracing::{debug, info};

use crate::error::ParseError;
use crate::issues::{Issue, IssueId};
use crate::model::{Annotation, Codebase, ElementKey, ElementRef, Nullness, TypePath, TypeRef};
use crate::sandbox::{ReadSandbox, SandboxError};
use crate::types::Location;
use crate::xml::XmlError;

pub use inclusion::{parse_markers, InclusionMarker, Marker};
pub use typedef::evaluate;

// ============================================================================
// Errors
// ============================================================================

/// Fatal merge failures.
#[derive(Debug, Error)]
pub enum MergeError {
    /// An inclusion marker names an element that does not exist.
    #[error("{location}: cannot resolve '{key}' for {marker}")]
    UnresolvedKey {
        key: String,
        marker: &'static str,
        location: Location,
    },

    /// A source file is malformed.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// An overlay XML file is malformed.
    #[error(transparent)]
    Xml(#[from] XmlError),

    /// A source file could not be read.
    #[error(transparent)]
    Sandbox(#[from] SandboxError),

    /// A source directory could not be listed.
    #[error("cannot list {}: {message}", path.display())]
    Walk { path: PathBuf, message: String },
}

// ============================================================================
// Sources and Options
// ============================================================================

/// One annotation source, in precedence order within the source list.
#[derive(Debug, Clone)]
pub enum AnnotationSource {
    /// Overlay XML text.
    Xml { name: String, text: String },
    /// Overlay XML file, or a directory of `*.xml` files.
    XmlPath(PathBuf),
    /// A parsed signature file.
    Signature { name: String, codebase: Codebase },
    /// Declarations parsed from stub sources.
    Stubs { name: String, codebase: Codebase },
    /// Inclusion marker text (`show`/`hide` lines).
    Inclusion { name: String, text: String },
    /// Inclusion marker file.
    InclusionPath(PathBuf),
}

impl AnnotationSource {
    pub fn name(&self) -> String {
        match self {
            AnnotationSource::Xml { name, .. }
            | AnnotationSource::Signature { name, .. }
            | AnnotationSource::Stubs { name, .. }
            | AnnotationSource::Inclusion { name, .. } => name.clone(),
            AnnotationSource::XmlPath(path) | AnnotationSource::InclusionPath(path) => {
                path.display().to_string()
            }
        }
    }

    /// Unresolvable keys are fatal for this source.
    fn is_strict(&self) -> bool {
        matches!(
            self,
            AnnotationSource::Inclusion { .. } | AnnotationSource::InclusionPath(_)
        )
    }
}

/// Which source wins when two sources disagree on the same slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConflictPolicy {
    /// The later source overwrites the earlier one.
    #[default]
    LastWins,
    /// The first source to set a slot keeps it.
    FirstWins,
}

impl std::str::FromStr for ConflictPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "last-wins" | "last" => Ok(ConflictPolicy::LastWins),
            "first-wins" | "first" => Ok(ConflictPolicy::FirstWins),
            other => Err(format!("unknown conflict policy '{}'", other)),
        }
    }
}

/// Merge configuration.
#[derive(Debug, Clone, Default)]
pub struct MergeOptions {
    /// Annotation names that hide the annotated element.
    pub hide_annotations: Vec<String>,
    /// Annotation names that show the annotated element.
    pub show_annotations: Vec<String>,
    /// Previous API for nullness migration.
    pub migrate_nulls: Option<Codebase>,
    pub conflict_policy: ConflictPolicy,
}

/// Merged codebase plus the issues found while merging.
#[derive(Debug)]
pub struct MergeResult {
    pub codebase: Codebase,
    pub issues: Vec<Issue>,
}

// ============================================================================
// Assignments
// ============================================================================

/// One change a source asks for.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Assignment {
    /// Add or replace an annotation.
    Annotate { key: ElementKey, annotation: Annotation },
    /// Set the nullness of one anchor; `None` is the value anchor.
    Nullness {
        key: ElementKey,
        path: Option<TypePath>,
        nullness: Nullness,
    },
    /// Show or hide an element.
    Visibility {
        key: ElementKey,
        marker: Marker,
        location: Option<Location>,
    },
}

impl Assignment {
    /// Nullness annotations become value-anchor nullness; everything else
    /// is an annotation.
    pub(crate) fn from_annotation(key: ElementKey, annotation: Annotation) -> Self {
        match annotation.nullness() {
            Some(nullness) => Assignment::Nullness {
                key,
                path: None,
                nullness,
            },
            None => Assignment::Annotate { key, annotation },
        }
    }

    fn key(&self) -> &ElementKey {
        match self {
            Assignment::Annotate { key, .. }
            | Assignment::Nullness { key, .. }
            | Assignment::Visibility { key, .. } => key,
        }
    }
}

/// What a claim is about, per element.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Slot {
    Annotation(String),
    Nullness(TypePath),
    Visibility,
}

/// Resolved element identity used for claim tracking.
type NodeId = (String, Option<usize>, Option<usize>);

fn node_id(node: &ElementRef) -> NodeId {
    match node {
        ElementRef::Class { class } => (class.clone(), None, None),
        ElementRef::Member { class, member } => (class.clone(), Some(*member), None),
        ElementRef::Parameter {
            class,
            member,
            parameter,
        } => (class.clone(), Some(*member), Some(*parameter)),
    }
}

struct Claim {
    source: usize,
    value: String,
}

// ============================================================================
// Merge
// ============================================================================

/// Merge `sources` onto `base`, reading files without a sandbox.
pub fn merge(
    base: Codebase,
    sources: &[AnnotationSource],
    options: &MergeOptions,
) -> Result<MergeResult, MergeError> {
    merge_sandboxed(base, sources, options, &ReadSandbox::unrestricted())
}

/// Merge `sources` onto `base`, reading source files through `sandbox`.
pub fn merge_sandboxed(
    base: Codebase,
    sources: &[AnnotationSource],
    options: &MergeOptions,
    sandbox: &ReadSandbox,
) -> Result<MergeResult, MergeError> {
    let mut merger = Merger {
        codebase: base,
        options,
        names: sources.iter().map(AnnotationSource::name).collect(),
        claims: BTreeMap::new(),
        shown: Vec::new(),
        issues: Vec::new(),
    };
    for (index, source) in sources.iter().enumerate() {
        let assignments = resolve_source(source, sandbox)?;
        info!(
            source = %merger.names[index],
            assignments = assignments.len(),
            "applying merge source"
        );
        for assignment in assignments {
            merger.apply(index, source.is_strict(), assignment)?;
        }
    }
    Ok(merger.finish())
}

fn resolve_source(
    source: &AnnotationSource,
    sandbox: &ReadSandbox,
) -> Result<Vec<Assignment>, MergeError> {
    match source {
        AnnotationSource::Xml { name, text } => xml::read_overlay(name, text),
        AnnotationSource::XmlPath(path) => {
            let mut out = Vec::new();
            for file in xml::overlay_files(path)? {
                let text = sandbox.read_to_string(&file)?;
                out.extend(xml::read_overlay(&file.display().to_string(), &text)?);
            }
            Ok(out)
        }
        AnnotationSource::Signature { codebase, .. } | AnnotationSource::Stubs { codebase, .. } => {
            Ok(signature::assignments_from(codebase))
        }
        AnnotationSource::Inclusion { name, text } => Ok(markers_to_assignments(parse_markers(name, text)?)),
        AnnotationSource::InclusionPath(path) => {
            let text = sandbox.read_to_string(path)?;
            let markers = parse_markers(&path.display().to_string(), &text)?;
            Ok(markers_to_assignments(markers))
        }
    }
}

fn markers_to_assignments(markers: Vec<InclusionMarker>) -> Vec<Assignment> {
    markers
        .into_iter()
        .map(|m| Assignment::Visibility {
            key: m.key,
            marker: m.marker,
            location: Some(m.location),
        })
        .collect()
}

struct Merger<'a> {
    codebase: Codebase,
    options: &'a MergeOptions,
    names: Vec<String>,
    claims: BTreeMap<(NodeId, Slot), Claim>,
    shown: Vec<(ElementRef, ElementKey)>,
    issues: Vec<Issue>,
}

impl Merger<'_> {
    fn apply(&mut self, source: usize, strict: bool, assignment: Assignment) -> Result<(), MergeError> {
        let key = assignment.key().clone();
        let Some(node) = self.codebase.resolve(&key) else {
            if strict {
                let (marker, location) = match &assignment {
                    Assignment::Visibility {
                        marker, location, ..
                    } => (*marker, location.clone()),
                    _ => (Marker::Show, None),
                };
                return Err(MergeError::UnresolvedKey {
                    key: key.to_string(),
                    marker: marker_name(marker),
                    location: location
                        .unwrap_or_else(|| Location::file_start(self.names[source].clone())),
                });
            }
            debug!(key = %key, source = %self.names[source], "ignoring stale merge key");
            return Ok(());
        };

        match assignment {
            Assignment::Annotate { key, annotation } => {
                let marker = if self.options.hide_annotations.contains(&annotation.name) {
                    Some(Marker::Hide)
                } else if self.options.show_annotations.contains(&annotation.name) {
                    Some(Marker::Show)
                } else {
                    None
                };
                let slot = Slot::Annotation(annotation.name.clone());
                if self.claim(&node, &key, slot, annotation.render(false), source) {
                    self.annotate(&node, annotation);
                }
                if let Some(marker) = marker {
                    self.set_visibility(&node, &key, marker, source);
                }
            }
            Assignment::Nullness {
                key,
                path,
                nullness,
            } => {
                let Some(path) = path.or_else(|| self.target_type(&node).map(TypeRef::value_path)) else {
                    return Ok(());
                };
                if self.claim(&node, &key, Slot::Nullness(path.clone()), nullness.to_string(), source) {
                    match self.target_type_mut(&node).and_then(|t| t.nullness_at_mut(&path)) {
                        Some(slot) => *slot = nullness,
                        None => debug!(key = %key, path = %path, "no nullness anchor at path"),
                    }
                }
            }
            Assignment::Visibility { key, marker, .. } => {
                self.set_visibility(&node, &key, marker, source);
            }
        }
        Ok(())
    }

    /// Record a claim; returns whether the assignment should be applied.
    fn claim(&mut self, node: &ElementRef, key: &ElementKey, slot: Slot, value: String, source: usize) -> bool {
        let id = (node_id(node), slot);
        if let Some(previous) = self.claims.get(&id) {
            if previous.source != source && previous.value != value {
                let message = format!(
                    "Conflicting {} for {}: '{}' from {} and '{}' from {}",
                    slot_name(&id.1),
                    key,
                    previous.value,
                    self.names[previous.source],
                    value,
                    self.names[source],
                );
                self.issues.push(
                    Issue::new(IssueId::InconsistentMergeAnnotation, message).with_element(key),
                );
                if self.options.conflict_policy == ConflictPolicy::FirstWins {
                    return false;
                }
            } else if self.options.conflict_policy == ConflictPolicy::FirstWins
                && previous.source != source
            {
                return false;
            }
        }
        self.claims.insert(id, Claim { source, value });
        true
    }

    fn annotate(&mut self, node: &ElementRef, annotation: Annotation) {
        let deprecated = annotation.is_deprecated();
        let (annotations, flag) = match node {
            ElementRef::Class { class } => {
                let Some(class) = self.codebase.find_class_mut(class) else {
                    return;
                };
                (&mut class.annotations, Some(&mut class.deprecated))
            }
            ElementRef::Member { class, member } => {
                let Some(member) = self
                    .codebase
                    .find_class_mut(class)
                    .and_then(|c| c.members.get_mut(*member))
                else {
                    return;
                };
                (&mut member.annotations, Some(&mut member.deprecated))
            }
            ElementRef::Parameter {
                class,
                member,
                parameter,
            } => {
                let Some(param) = self
                    .codebase
                    .find_class_mut(class)
                    .and_then(|c| c.members.get_mut(*member))
                    .and_then(|m| m.callable_mut())
                    .and_then(|c| c.parameters.get_mut(*parameter))
                else {
                    return;
                };
                (&mut param.annotations, None)
            }
        };
        if deprecated {
            if let Some(flag) = flag {
                *flag = true;
                return;
            }
        }
        match annotations.iter_mut().find(|a| a.name == annotation.name) {
            Some(existing) => *existing = annotation,
            None => annotations.push(annotation),
        }
    }

    fn set_visibility(&mut self, node: &ElementRef, key: &ElementKey, marker: Marker, source: usize) {
        if !self.claim(node, key, Slot::Visibility, marker_name(marker).to_string(), source) {
            return;
        }
        let hidden = marker == Marker::Hide;
        match node {
            ElementRef::Class { class } => {
                if let Some(class) = self.codebase.find_class_mut(class) {
                    class.hidden = hidden;
                }
            }
            ElementRef::Member { class, member } => {
                if let Some(member) = self
                    .codebase
                    .find_class_mut(class)
                    .and_then(|c| c.members.get_mut(*member))
                {
                    member.hidden = hidden;
                }
            }
            ElementRef::Parameter { .. } => return,
        }
        self.shown.retain(|(n, _)| n != node);
        if !hidden {
            self.shown.push((node.clone(), key.clone()));
        }
    }

    fn target_type(&self, node: &ElementRef) -> Option<&TypeRef> {
        match node {
            ElementRef::Class { .. } => None,
            ElementRef::Member { class, member } => {
                self.codebase.find_class(class)?.members.get(*member)?.value_type()
            }
            ElementRef::Parameter {
                class,
                member,
                parameter,
            } => self
                .codebase
                .find_class(class)?
                .members
                .get(*member)?
                .parameters()
                .get(*parameter)
                .map(|p| &p.ty),
        }
    }

    fn target_type_mut(&mut self, node: &ElementRef) -> Option<&mut TypeRef> {
        match node {
            ElementRef::Class { .. } => None,
            ElementRef::Member { class, member } => self
                .codebase
                .find_class_mut(class)?
                .members
                .get_mut(*member)?
                .value_type_mut(),
            ElementRef::Parameter {
                class,
                member,
                parameter,
            } => self
                .codebase
                .find_class_mut(class)?
                .members
                .get_mut(*member)?
                .callable_mut()?
                .parameters
                .get_mut(*parameter)
                .map(|p| &mut p.ty),
        }
    }

    fn finish(mut self) -> MergeResult {
        for (node, key) in std::mem::take(&mut self.shown) {
            let enclosing_hidden = match &node {
                ElementRef::Member { class, .. } => self.codebase.is_class_hidden(class),
                ElementRef::Class { class } => self
                    .codebase
                    .find_class(class)
                    .and_then(|c| c.outer.clone())
                    .is_some_and(|outer| self.codebase.is_class_hidden(&outer)),
                ElementRef::Parameter { .. } => false,
            };
            if !enclosing_hidden {
                continue;
            }
            self.issues.push(
                Issue::new(
                    IssueId::ShowingMemberInHiddenClass,
                    format!("{} is shown but its enclosing class is hidden", key),
                )
                .with_element(&key),
            );
            match &node {
                ElementRef::Member { class, member } => {
                    if let Some(member) = self
                        .codebase
                        .find_class_mut(class)
                        .and_then(|c| c.members.get_mut(*member))
                    {
                        member.hidden = true;
                    }
                }
                ElementRef::Class { class } => {
                    if let Some(class) = self.codebase.find_class_mut(class) {
                        class.hidden = true;
                    }
                }
                ElementRef::Parameter { .. } => {}
            }
        }

        typedef::normalize(&mut self.codebase, &mut self.issues);
        if let Some(previous) = &self.options.migrate_nulls {
            nullness::migrate(&mut self.codebase, previous);
        }
        MergeResult {
            codebase: self.codebase,
            issues: self.issues,
        }
    }
}

fn marker_name(marker: Marker) -> &'static str {
    match marker {
        Marker::Show => "show",
        Marker::Hide => "hide",
    }
}

fn slot_name(slot: &Slot) -> String {
    match slot {
        Slot::Annotation(name) => format!("annotation {}", name),
        Slot::Nullness(path) => format!("nullness at {}", path),
        Slot::Visibility => "visibility".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::FileFormat;
    use crate::parser::parse;

    fn base() -> Codebase {
        parse(
            "package test.pkg {\n  public class MyTest {\n    ctor public MyTest();\n    method public Double convert(Float);\n    field public Integer myNumber;\n  }\n}\n",
            FileFormat::V3,
        )
        .unwrap()
    }

    fn xml(name: &str, text: &str) -> AnnotationSource {
        AnnotationSource::Xml {
            name: name.into(),
            text: text.into(),
        }
    }

    fn field_nullness(codebase: &Codebase) -> Nullness {
        codebase
            .find_class("test.pkg.MyTest")
            .unwrap()
            .find_field("myNumber")
            .unwrap()
            .value_type()
            .unwrap()
            .value_nullness()
    }

    #[test]
    fn xml_nullness_is_applied_to_field() {
        let source = xml(
            "a.xml",
            r#"<root><item name="test.pkg.MyTest myNumber"><annotation name="android.support.annotation.Nullable"/></item></root>"#,
        );
        let result = merge(base(), &[source], &MergeOptions::default()).unwrap();
        assert_eq!(field_nullness(&result.codebase), Nullness::Nullable);
        assert!(result.issues.is_empty());
    }

    #[test]
    fn later_source_wins_and_conflict_is_reported() {
        let nullable = xml(
            "a.xml",
            r#"<root><item name="test.pkg.MyTest myNumber"><annotation name="androidx.annotation.Nullable"/></item></root>"#,
        );
        let non_null = xml(
            "b.xml",
            r#"<root><item name="test.pkg.MyTest myNumber"><annotation name="androidx.annotation.NonNull"/></item></root>"#,
        );

        let ab = merge(base(), &[nullable.clone(), non_null.clone()], &MergeOptions::default()).unwrap();
        assert_eq!(field_nullness(&ab.codebase), Nullness::NonNull);
        assert_eq!(ab.issues.len(), 1);
        assert_eq!(ab.issues[0].id, IssueId::InconsistentMergeAnnotation);

        let ba = merge(base(), &[non_null.clone(), nullable.clone()], &MergeOptions::default()).unwrap();
        assert_eq!(field_nullness(&ba.codebase), Nullness::Nullable);

        let first_wins = MergeOptions {
            conflict_policy: ConflictPolicy::FirstWins,
            ..MergeOptions::default()
        };
        let first = merge(base(), &[nullable, non_null], &first_wins).unwrap();
        assert_eq!(field_nullness(&first.codebase), Nullness::Nullable);
    }

    #[test]
    fn stale_overlay_keys_are_ignored() {
        let source = xml(
            "a.xml",
            r#"<root><item name="test.pkg.Gone field"><annotation name="androidx.annotation.Nullable"/></item></root>"#,
        );
        let result = merge(base(), &[source], &MergeOptions::default()).unwrap();
        assert_eq!(result.codebase, base());
    }

    #[test]
    fn unresolved_inclusion_marker_is_fatal() {
        let source = AnnotationSource::Inclusion {
            name: "markers.txt".into(),
            text: "hide test.pkg.MyTest gone\n".into(),
        };
        let err = merge(base(), &[source], &MergeOptions::default()).unwrap_err();
        match err {
            MergeError::UnresolvedKey { key, location, .. } => {
                assert_eq!(key, "test.pkg.MyTest gone");
                assert_eq!(location, Location::new("markers.txt", 1, 1));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn showing_member_in_hidden_class_is_reported() {
        let source = AnnotationSource::Inclusion {
            name: "markers.txt".into(),
            text: "show test.pkg.MyTest myNumber\nhide test.pkg.MyTest\n".into(),
        };
        let result = merge(base(), &[source], &MergeOptions::default()).unwrap();
        assert_eq!(result.issues.len(), 1);
        assert_eq!(result.issues[0].id, IssueId::ShowingMemberInHiddenClass);
        let class = result.codebase.find_class("test.pkg.MyTest").unwrap();
        assert!(class.hidden);
        assert!(class.find_field("myNumber").unwrap().hidden);
    }

    #[test]
    fn hide_annotation_hides_element() {
        let source = xml(
            "a.xml",
            r#"<root><item name="test.pkg.MyTest java.lang.Double convert(java.lang.Float)"><annotation name="test.pkg.Internal"/></item></root>"#,
        );
        let options = MergeOptions {
            hide_annotations: vec!["test.pkg.Internal".into()],
            ..MergeOptions::default()
        };
        let result = merge(base(), &[source], &options).unwrap();
        let class = result.codebase.find_class("test.pkg.MyTest").unwrap();
        let convert = class.members.iter().find(|m| m.name == "convert").unwrap();
        assert!(convert.hidden);
        assert_eq!(convert.annotations[0].name, "test.pkg.Internal");
    }

    #[test]
    fn signature_source_merges_anchors_independently() {
        let overlay = parse(
            "package test.pkg {\n  public class MyTest {\n    method public Double convert(Float!);\n  }\n}\n",
            FileFormat::V3,
        )
        .unwrap();
        let mut start = base();
        if let Some(class) = start.find_class_mut("test.pkg.MyTest") {
            let convert = class.members.iter_mut().find(|m| m.name == "convert").unwrap();
            convert.value_type_mut().unwrap().set_value_nullness(Nullness::Nullable);
        }
        let source = AnnotationSource::Signature {
            name: "overlay.txt".into(),
            codebase: overlay,
        };
        let result = merge(start, &[source], &MergeOptions::default()).unwrap();
        let class = result.codebase.find_class("test.pkg.MyTest").unwrap();
        let convert = class.members.iter().find(|m| m.name == "convert").unwrap();
        assert_eq!(convert.value_type().unwrap().value_nullness(), Nullness::Nullable);
        assert_eq!(convert.parameters()[0].ty.value_nullness(), Nullness::NonNull);
    }

    #[test]
    fn deprecated_annotation_sets_flag() {
        let source = xml(
            "a.xml",
            r#"<root><item name="test.pkg.MyTest"><annotation name="java.lang.Deprecated"/></item></root>"#,
        );
        let result = merge(base(), &[source], &MergeOptions::default()).unwrap();
        let class = result.codebase.find_class("test.pkg.MyTest").unwrap();
        assert!(class.deprecated);
        assert!(class.annotations.is_empty());
    }
}
