//! Nullness migration against a previous API.
//!
//! A nullness that the previous API did not declare (or declared
//! differently) becomes its "recently" variant. Elements absent from the
//! previous API keep the plain annotation. Each anchor of each element is
//! decided on its own.

use std::collections::BTreeMap;

use tracing::debug;

use crate::model::{Codebase, MemberItem, MemberKind, MemberRef, TypePath, TypeRef};

/// Rewrite newly declared nullness in `codebase` as the recently variants.
pub(crate) fn migrate(codebase: &mut Codebase, previous: &Codebase) {
    let lineage: BTreeMap<String, Vec<String>> = codebase
        .classes()
        .map(|c| {
            let mut names = vec![c.qualified_name.clone()];
            names.extend(
                codebase
                    .ancestors(&c.qualified_name)
                    .iter()
                    .map(|a| a.qualified_name.clone()),
            );
            (c.qualified_name.clone(), names)
        })
        .collect();

    let mut changed = 0usize;
    for class in codebase.classes_mut() {
        let Some(names) = lineage.get(&class.qualified_name) else {
            continue;
        };
        let refs: Vec<Option<MemberRef>> = class
            .members
            .iter()
            .map(|m| class.member_key(m).member)
            .collect();
        for (member, member_ref) in class.members.iter_mut().zip(refs) {
            let Some(member_ref) = member_ref else {
                continue;
            };
            let Some(prior) = previous_declaration(previous, names, member, &member_ref) else {
                continue;
            };
            if let (Some(current), Some(old)) = (member.value_type_mut(), prior.value_type()) {
                changed += migrate_type(current, old);
            }
            let old_params = prior.parameters().to_vec();
            if let Some(callable) = member.callable_mut() {
                for (param, old) in callable.parameters.iter_mut().zip(&old_params) {
                    changed += migrate_type(&mut param.ty, &old.ty);
                }
            }
        }
    }
    debug!(anchors = changed, "migrated nullness annotations");
}

/// The most specific previous declaration of `member`: the class itself,
/// then its ancestors nearest first. Constructors are only looked up in the
/// class itself.
fn previous_declaration<'a>(
    previous: &'a Codebase,
    lineage: &[String],
    member: &MemberItem,
    member_ref: &MemberRef,
) -> Option<&'a MemberItem> {
    let candidates = if matches!(member.kind, MemberKind::Constructor(_)) {
        &lineage[..1]
    } else {
        lineage
    };
    candidates.iter().find_map(|name| {
        let class = previous.find_class(name)?;
        let index = class.find_member(member_ref)?;
        class.members.get(index)
    })
}

fn migrate_type(current: &mut TypeRef, old: &TypeRef) -> usize {
    let old_anchors: BTreeMap<TypePath, _> = old.nullness_anchors().into_iter().collect();
    let mut changed = 0;
    for (path, nullness) in current.nullness_anchors() {
        if !nullness.is_known() || nullness != nullness.settled() {
            continue;
        }
        let before = old_anchors.get(&path).copied().unwrap_or_default();
        if before.settled() != nullness {
            if let Some(slot) = current.nullness_at_mut(&path) {
                *slot = nullness.recently();
                changed += 1;
            }
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::FileFormat;
    use crate::model::Nullness;
    use crate::parser::parse;

    fn method<'a>(codebase: &'a Codebase, class: &str, name: &str) -> &'a MemberItem {
        codebase
            .find_class(class)
            .unwrap()
            .members
            .iter()
            .find(|m| m.name == name)
            .unwrap()
    }

    #[test]
    fn newly_declared_nullness_becomes_recent() {
        let previous = parse(
            "package test.pkg {\n  public class MyTest {\n    method public Double convert1(Float);\n    method public Double convert2(Float);\n  }\n}\n",
            FileFormat::V3,
        )
        .unwrap();
        let mut current = parse(
            "package test.pkg {\n  public class MyTest {\n    method public Double? convert1(Float);\n    method public Double? convert2(Float!);\n    method public Double? fresh();\n  }\n}\n",
            FileFormat::V3,
        )
        .unwrap();
        migrate(&mut current, &previous);

        let convert2 = method(&current, "test.pkg.MyTest", "convert2");
        let callable = convert2.callable().unwrap();
        assert_eq!(
            callable.return_type.as_ref().unwrap().value_nullness(),
            Nullness::RecentlyNullable
        );
        assert_eq!(callable.parameters[0].ty.value_nullness(), Nullness::RecentlyNonNull);

        let fresh = method(&current, "test.pkg.MyTest", "fresh");
        assert_eq!(fresh.value_type().unwrap().value_nullness(), Nullness::Nullable);
    }

    #[test]
    fn unchanged_nullness_stays_plain() {
        let text = "package test.pkg {\n  public class MyTest {\n    method public String? name();\n  }\n}\n";
        let previous = parse(text, FileFormat::V3).unwrap();
        let mut current = parse(text, FileFormat::V3).unwrap();
        migrate(&mut current, &previous);
        let name = method(&current, "test.pkg.MyTest", "name");
        assert_eq!(name.value_type().unwrap().value_nullness(), Nullness::Nullable);
    }

    #[test]
    fn inherited_method_uses_nearest_previous_declaration() {
        let previous = parse(
            "package test.pkg {\n  public class Base {\n    method public String? name();\n  }\n  public class Child extends test.pkg.Base {\n  }\n}\n",
            FileFormat::V3,
        )
        .unwrap();
        let mut current = parse(
            "package test.pkg {\n  public class Base {\n    method public String? name();\n  }\n  public class Child extends test.pkg.Base {\n    method public String? name();\n  }\n}\n",
            FileFormat::V3,
        )
        .unwrap();
        migrate(&mut current, &previous);
        let name = method(&current, "test.pkg.Child", "name");
        assert_eq!(name.value_type().unwrap().value_nullness(), Nullness::Nullable);
    }

    #[test]
    fn type_argument_anchors_migrate_independently() {
        let previous = parse(
            "package a {\n  public class B {\n    method public java.util.List<String!>? names();\n  }\n}\n",
            FileFormat::V3,
        )
        .unwrap();
        let mut current = parse(
            "package a {\n  public class B {\n    method public java.util.List<String?>? names();\n  }\n}\n",
            FileFormat::V3,
        )
        .unwrap();
        migrate(&mut current, &previous);
        let ty = method(&current, "a.B", "names").value_type().unwrap().clone();
        let anchors: BTreeMap<String, Nullness> = ty
            .nullness_anchors()
            .into_iter()
            .map(|(p, n)| (p.to_string(), n))
            .collect();
        assert_eq!(anchors["base"], Nullness::Nullable);
        assert_eq!(anchors["arg0/base"], Nullness::RecentlyNullable);
    }
}
