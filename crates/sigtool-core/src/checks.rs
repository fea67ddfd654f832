//! Post-merge API lint: visible items must not expose hidden classes.

use std::collections::BTreeSet;

use tracing::debug;

use crate::issues::{Issue, IssueId};
use crate::model::{Codebase, ElementKey, MemberKind, TypeRef};

/// Report `ReferencesHidden` for every visible API item whose signature
/// mentions a hidden class of the same codebase.
pub fn check_hidden_references(codebase: &Codebase) -> Vec<Issue> {
    let mut issues = Vec::new();
    for class in codebase.classes() {
        if codebase.is_class_hidden(&class.qualified_name) {
            continue;
        }
        let class_key = ElementKey::class(&class.qualified_name);
        if let Some(superclass) = &class.superclass {
            report(codebase, &mut issues, &class_key, "extends", superclass);
        }
        for interface in &class.interfaces {
            report(codebase, &mut issues, &class_key, "implements", interface);
        }

        for member in class.members.iter().filter(|m| !m.hidden) {
            let key = class.member_key(member);
            match &member.kind {
                MemberKind::Field(data) | MemberKind::EnumConstant(data) => {
                    report(codebase, &mut issues, &key, "field type", &data.ty);
                }
                MemberKind::Constructor(callable) | MemberKind::Method(callable) => {
                    if let Some(ret) = &callable.return_type {
                        report(codebase, &mut issues, &key, "return type", ret);
                    }
                    for param in &callable.parameters {
                        report(codebase, &mut issues, &key, "parameter type", &param.ty);
                    }
                    for thrown in &callable.throws {
                        report(codebase, &mut issues, &key, "throws", thrown);
                    }
                }
            }
        }
    }
    debug!(issues = issues.len(), "hidden reference check finished");
    issues
}

fn report(
    codebase: &Codebase,
    issues: &mut Vec<Issue>,
    key: &ElementKey,
    role: &str,
    ty: &TypeRef,
) {
    let mut names = Vec::new();
    ty.referenced_names(&mut names);
    let hidden: BTreeSet<&str> = names
        .into_iter()
        .filter(|name| codebase.contains_class(name) && codebase.is_class_hidden(name))
        .collect();
    for name in hidden {
        issues.push(
            Issue::new(
                IssueId::ReferencesHidden,
                format!("{} of {} references hidden class {}", role, key, name),
            )
            .with_element(key),
        );
    }
}
