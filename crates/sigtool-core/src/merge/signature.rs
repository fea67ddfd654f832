//! Assignments carried by a parsed signature file or stub codebase.

use super::Assignment;
use crate::model::annotation::DEPRECATED;
use crate::model::{Annotation, Codebase, ElementKey, TypeRef};

/// Every annotation and known nullness anchor of `source`, keyed by the
/// element it belongs to.
pub(crate) fn assignments_from(source: &Codebase) -> Vec<Assignment> {
    let mut out = Vec::new();
    for class in source.classes() {
        let class_key = ElementKey::class(&class.qualified_name);
        push_annotations(&mut out, &class_key, &class.annotations, class.deprecated);

        for member in &class.members {
            let key = class.member_key(member);
            push_annotations(&mut out, &key, &member.annotations, member.deprecated);
            if let Some(ty) = member.value_type() {
                push_anchors(&mut out, &key, ty);
            }
            for (index, param) in member.parameters().iter().enumerate() {
                let param_key = key.clone().with_parameter(index);
                push_annotations(&mut out, &param_key, &param.annotations, false);
                push_anchors(&mut out, &param_key, &param.ty);
            }
        }
    }
    out
}

fn push_annotations(out: &mut Vec<Assignment>, key: &ElementKey, annotations: &[Annotation], deprecated: bool) {
    if deprecated {
        out.push(Assignment::Annotate {
            key: key.clone(),
            annotation: Annotation::new(DEPRECATED),
        });
    }
    for annotation in annotations {
        out.push(Assignment::from_annotation(key.clone(), annotation.clone()));
    }
}

fn push_anchors(out: &mut Vec<Assignment>, key: &ElementKey, ty: &TypeRef) {
    for (path, nullness) in ty.nullness_anchors() {
        if nullness.is_known() {
            out.push(Assignment::Nullness {
                key: key.clone(),
                path: Some(path),
                nullness,
            });
        }
    }
}
