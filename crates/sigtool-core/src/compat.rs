//! API compatibility check between a previous and a current codebase.
//!
//! Reports removals and incompatible changes as issues. Additions are
//! compatible, except abstract methods added to a class that existed before
//! (subclasses outside the API would break).

use tracing::debug;

use crate::issues::{Issue, IssueId};
use crate::model::{ClassItem, Codebase, MemberItem, MemberKind, TypeRef, TypeStyle};

/// Compare `previous` against `current` and return every incompatibility.
pub fn check_compatibility(previous: &Codebase, current: &Codebase) -> Vec<Issue> {
    let mut issues = Vec::new();

    for package in previous.packages() {
        let visible = package
            .classes
            .iter()
            .any(|c| !previous.is_class_hidden(&c.qualified_name));
        if visible && current.package(&package.name).is_none() {
            issues.push(
                Issue::new(IssueId::RemovedPackage, format!("Removed package {}", package.name))
                    .with_element(&package.name),
            );
        }
    }

    for old_class in previous.classes() {
        if previous.is_class_hidden(&old_class.qualified_name) {
            continue;
        }
        if current.package(&old_class.package).is_none() {
            continue;
        }
        match current.find_class(&old_class.qualified_name) {
            Some(new_class) if !current.is_class_hidden(&new_class.qualified_name) => {
                compare_class(old_class, new_class, &mut issues);
            }
            _ => issues.push(
                Issue::new(
                    IssueId::RemovedClass,
                    format!("Removed {} {}", old_class.kind.keyword(), old_class.qualified_name),
                )
                .with_element(&old_class.qualified_name),
            ),
        }
    }

    debug!(issues = issues.len(), "compatibility check finished");
    issues
}

fn compare_class(old: &ClassItem, new: &ClassItem, issues: &mut Vec<Issue>) {
    let key = &old.qualified_name;
    flag_change(
        issues,
        IssueId::ChangedStatic,
        key,
        "static",
        old.modifiers.is_static(),
        new.modifiers.is_static(),
        &format!("Class {}", key),
    );
    if !old.modifiers.is_final() && new.modifiers.is_final() {
        issues.push(
            Issue::new(IssueId::ChangedFinal, format!("Class {} added 'final' qualifier", key))
                .with_element(key),
        );
    }
    if !old.modifiers.is_abstract() && new.modifiers.is_abstract() && !new.kind.is_interface_like() {
        issues.push(
            Issue::new(
                IssueId::ChangedAbstract,
                format!("Class {} changed 'abstract' qualifier", key),
            )
            .with_element(key),
        );
    }
    let old_super = old.superclass.as_ref().map(|t| t.name.as_str());
    let new_super = new.superclass.as_ref().map(|t| t.name.as_str());
    if old_super != new_super {
        issues.push(
            Issue::new(
                IssueId::ChangedSuperclass,
                format!(
                    "Class {} superclass changed from {} to {}",
                    key,
                    old_super.unwrap_or("java.lang.Object"),
                    new_super.unwrap_or("java.lang.Object")
                ),
            )
            .with_element(key),
        );
    }

    for old_member in old.members.iter().filter(|m| !m.hidden) {
        let member_ref = old.member_key(old_member).member;
        let found = member_ref
            .as_ref()
            .and_then(|r| new.find_member(r))
            .map(|i| &new.members[i])
            .filter(|m| !m.hidden);
        match found {
            Some(new_member) => compare_member(old, old_member, new_member, issues),
            None => {
                let element = old.member_key(old_member);
                let id = match old_member.kind {
                    MemberKind::Field(_) | MemberKind::EnumConstant(_) => IssueId::RemovedField,
                    MemberKind::Constructor(_) | MemberKind::Method(_) => IssueId::RemovedMethod,
                };
                issues.push(
                    Issue::new(id, format!("Removed {} {}", old_member.group().keyword(), element))
                        .with_element(&element),
                );
            }
        }
    }

    for new_member in new.members.iter().filter(|m| !m.hidden) {
        if !new_member.modifiers.is_abstract() || !matches!(new_member.kind, MemberKind::Method(_)) {
            continue;
        }
        let existed = new
            .member_key(new_member)
            .member
            .as_ref()
            .is_some_and(|r| old.find_member(r).is_some());
        if !existed {
            let element = new.member_key(new_member);
            issues.push(
                Issue::new(
                    IssueId::AddedAbstractMethod,
                    format!("Added abstract method {}", element),
                )
                .with_element(&element),
            );
        }
    }
}

fn compare_member(class: &ClassItem, old: &MemberItem, new: &MemberItem, issues: &mut Vec<Issue>) {
    let element = class.member_key(old);
    let what = format!("{} {}", old.group().keyword(), element);

    if let (Some(old_ty), Some(new_ty)) = (old.value_type(), new.value_type()) {
        let (before, after) = (plain(old_ty), plain(new_ty));
        if before != after {
            issues.push(
                Issue::new(
                    IssueId::ChangedType,
                    format!("{} has changed type from {} to {}", what, before, after),
                )
                .with_element(&element),
            );
        }
        check_nullness(issues, &element, &what, "return value", old_ty, new_ty);
    }
    for (index, (old_param, new_param)) in old.parameters().iter().zip(new.parameters()).enumerate() {
        let label = format!("parameter {}", index);
        check_nullness(issues, &element, &what, &label, &old_param.ty, &new_param.ty);
    }

    if matches!(old.kind, MemberKind::Field(_)) {
        if let (Some(a), Some(b)) = (old.field_data(), new.field_data()) {
            if a.value.is_some() && a.value != b.value {
                issues.push(
                    Issue::new(
                        IssueId::ChangedType,
                        format!("{} has changed value", what),
                    )
                    .with_element(&element),
                );
            }
        }
    }

    flag_change(
        issues,
        IssueId::ChangedStatic,
        &element.to_string(),
        "static",
        old.modifiers.is_static(),
        new.modifiers.is_static(),
        &what,
    );
    if !old.modifiers.is_final() && new.modifiers.is_final() && !class.modifiers.is_final() {
        issues.push(
            Issue::new(IssueId::ChangedFinal, format!("{} added 'final' qualifier", what))
                .with_element(&element),
        );
    }
    if !old.modifiers.is_abstract() && new.modifiers.is_abstract() {
        issues.push(
            Issue::new(IssueId::ChangedAbstract, format!("{} changed 'abstract' qualifier", what))
                .with_element(&element),
        );
    }
}

/// Only narrowing changes break callers: nullable-to-non-null for
/// parameters and non-null-to-nullable for return values.
fn check_nullness(
    issues: &mut Vec<Issue>,
    element: &impl std::fmt::Display,
    what: &str,
    label: &str,
    old: &TypeRef,
    new: &TypeRef,
) {
    let (before, after) = (old.value_nullness(), new.value_nullness());
    let incompatible = if label == "return value" {
        before.is_non_null() && after.is_nullable()
    } else {
        before.is_nullable() && after.is_non_null()
    };
    if incompatible {
        issues.push(
            Issue::new(
                IssueId::ChangedNullness,
                format!("{} changed nullness of {} from {} to {}", what, label, before, after),
            )
            .with_element(element),
        );
    }
}

fn flag_change(
    issues: &mut Vec<Issue>,
    id: IssueId,
    element: &str,
    flag: &str,
    before: bool,
    after: bool,
    what: &str,
) {
    if before != after {
        issues.push(
            Issue::new(id, format!("{} changed '{}' qualifier from {} to {}", what, flag, before, after))
                .with_element(element),
        );
    }
}

fn plain(ty: &TypeRef) -> String {
    ty.render(&TypeStyle::PLAIN)
}
