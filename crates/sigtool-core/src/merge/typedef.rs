//! Typedef and range normalization.
//!
//! `@IntDef`/`@LongDef`/`@StringDef` value lists are rewritten after a merge:
//! constant expressions are evaluated to a canonical literal, duplicate
//! values are collapsed, and references to hidden constants are dropped
//! with a [`IssueId::HiddenTypedefConstant`] warning. `@IntRange` bounds are
//! evaluated the same way.
//!
//! ## Expression Grammar
//!
//! ```text
//! <or>      := <xor> ("|" <xor>)*
//! <xor>     := <and> ("^" <and>)*
//! <and>     := <shift> ("&" <shift>)*
//! <shift>   := <add> (("<<" | ">>>" | ">>") <add>)*
//! <add>     := <mul> (("+" | "-") <mul>)*
//! <mul>     := <unary> (("*" | "/" | "%") <unary>)*
//! <unary>   := ("-" | "~" | "+") <unary> | "(" <or> ")" | <literal>
//! ```

use winnow::ascii::multispace0;
use winnow::combinator::{alt, delimited};
use winnow::error::{ErrMode, ParserError};
use winnow::prelude::*;
use winnow::token::take_while;
use winnow::ModalResult;

use crate::issues::{Issue, IssueId};
use crate::model::constant::parse_integral;
use crate::model::key::split_top_level_commas;
use crate::model::{Annotation, ClassItem, Codebase, ElementKey, MemberKind};

// ============================================================================
// Expression Evaluation
// ============================================================================

/// Evaluate an integer constant expression. Returns `None` for anything
/// that is not a pure literal expression (references, overflowing division,
/// malformed text).
pub fn evaluate(expr: &str) -> Option<i64> {
    let mut input = expr.trim();
    let value = or_expr.parse_next(&mut input).ok()?;
    if input.trim().is_empty() {
        Some(value)
    } else {
        None
    }
}

type Operand = fn(&mut &str) -> ModalResult<i64>;

/// Left-associative chain of `operand (op operand)*`.
fn chain(input: &mut &str, ops: &[&str], operand: Operand) -> ModalResult<i64> {
    let mut acc = operand(input)?;
    loop {
        multispace0.parse_next(input)?;
        let Some(op) = ops.iter().find(|op| starts_with_operator(input, op)) else {
            return Ok(acc);
        };
        *input = &input[op.len()..];
        multispace0.parse_next(input)?;
        let rhs = operand(input)?;
        acc = apply(op, acc, rhs).ok_or_else(|| ErrMode::from_input(input))?;
    }
}

/// `input` starts with `op` and not with a longer operator sharing its
/// first character.
fn starts_with_operator(input: &str, op: &str) -> bool {
    if !input.starts_with(op) {
        return false;
    }
    let rest = &input[op.len()..];
    match op {
        "|" => !rest.starts_with('|') && !rest.starts_with('='),
        "&" => !rest.starts_with('&') && !rest.starts_with('='),
        ">>" => !rest.starts_with('>'),
        _ => !rest.starts_with('='),
    }
}

fn apply(op: &str, lhs: i64, rhs: i64) -> Option<i64> {
    Some(match op {
        "|" => lhs | rhs,
        "^" => lhs ^ rhs,
        "&" => lhs & rhs,
        "<<" => lhs.wrapping_shl((rhs & 63) as u32),
        ">>" => lhs.wrapping_shr((rhs & 63) as u32),
        ">>>" => ((lhs as u64) >> (rhs & 63)) as i64,
        "+" => lhs.wrapping_add(rhs),
        "-" => lhs.wrapping_sub(rhs),
        "*" => lhs.wrapping_mul(rhs),
        "/" => lhs.checked_div(rhs)?,
        "%" => lhs.checked_rem(rhs)?,
        _ => return None,
    })
}

fn or_expr(input: &mut &str) -> ModalResult<i64> {
    chain(input, &["|"], xor_expr)
}

fn xor_expr(input: &mut &str) -> ModalResult<i64> {
    chain(input, &["^"], and_expr)
}

fn and_expr(input: &mut &str) -> ModalResult<i64> {
    chain(input, &["&"], shift_expr)
}

fn shift_expr(input: &mut &str) -> ModalResult<i64> {
    chain(input, &["<<", ">>>", ">>"], add_expr)
}

fn add_expr(input: &mut &str) -> ModalResult<i64> {
    chain(input, &["+", "-"], mul_expr)
}

fn mul_expr(input: &mut &str) -> ModalResult<i64> {
    chain(input, &["*", "/", "%"], unary_expr)
}

fn unary_expr(input: &mut &str) -> ModalResult<i64> {
    multispace0.parse_next(input)?;
    alt((
        ('-', unary_expr).map(|(_, v): (char, i64)| v.wrapping_neg()),
        ('~', unary_expr).map(|(_, v): (char, i64)| !v),
        ('+', unary_expr).map(|(_, v): (char, i64)| v),
        delimited(('(', multispace0), or_expr, (multispace0, ')')),
        literal,
    ))
    .parse_next(input)
}

fn literal(input: &mut &str) -> ModalResult<i64> {
    let text = take_while(1.., |c: char| c.is_ascii_alphanumeric() || c == '_').parse_next(input)?;
    if !text.starts_with(|c: char| c.is_ascii_digit()) {
        return Err(ErrMode::from_input(input));
    }
    let bits = if text.ends_with(['L', 'l']) { 64 } else { 32 };
    parse_integral(text, bits).ok_or_else(|| ErrMode::from_input(input))
}

// ============================================================================
// Typedef Normalization
// ============================================================================

/// A typedef list entry after resolution.
struct Entry {
    text: String,
    value: Option<i64>,
}

/// Normalize every typedef and range annotation in `codebase`.
pub(crate) fn normalize(codebase: &mut Codebase, issues: &mut Vec<Issue>) {
    let snapshot = codebase.clone();
    for class in codebase.classes_mut() {
        let class_key = ElementKey::class(&class.qualified_name);
        let context = ClassContext::of(class);
        normalize_list(&snapshot, &context, &class_key, &mut class.annotations, None, issues);

        let keys: Vec<ElementKey> = class.members.iter().map(|m| class.member_key(m)).collect();
        for (member, key) in class.members.iter_mut().zip(keys) {
            let field_value = member
                .field_data()
                .and_then(|f| f.value.as_ref())
                .and_then(|v| v.as_i64());
            normalize_list(&snapshot, &context, &key, &mut member.annotations, field_value, issues);
            if let MemberKind::Constructor(c) | MemberKind::Method(c) = &mut member.kind {
                for (index, param) in c.parameters.iter_mut().enumerate() {
                    let param_key = key.clone().with_parameter(index);
                    normalize_list(&snapshot, &context, &param_key, &mut param.annotations, None, issues);
                }
            }
        }
    }
}

/// Where relative constant references are resolved from.
struct ClassContext {
    package: String,
    class: String,
}

impl ClassContext {
    fn of(class: &ClassItem) -> Self {
        ClassContext {
            package: class.package.clone(),
            class: class.qualified_name.clone(),
        }
    }
}

fn normalize_list(
    codebase: &Codebase,
    context: &ClassContext,
    key: &ElementKey,
    annotations: &mut [Annotation],
    field_value: Option<i64>,
    issues: &mut Vec<Issue>,
) {
    for annotation in annotations.iter_mut() {
        if annotation.is_typedef() {
            normalize_typedef(codebase, context, key, annotation, field_value, issues);
        } else if annotation.name == "androidx.annotation.IntRange" {
            for bound in ["from", "to"] {
                if let Some(value) = annotation.attribute(bound).and_then(evaluate) {
                    let literal = if value > i64::from(i32::MAX) || value < i64::from(i32::MIN) {
                        format!("{}L", value)
                    } else {
                        value.to_string()
                    };
                    annotation.set_attribute(bound, literal);
                }
            }
        }
    }
}

fn normalize_typedef(
    codebase: &Codebase,
    context: &ClassContext,
    key: &ElementKey,
    annotation: &mut Annotation,
    field_value: Option<i64>,
    issues: &mut Vec<Issue>,
) {
    let Some(raw) = annotation.attribute("value").map(str::to_string) else {
        return;
    };
    let is_long = annotation.simple_name() == "LongDef";
    let is_string = annotation.simple_name() == "StringDef";
    let inner = raw
        .trim()
        .strip_prefix('{')
        .and_then(|s| s.strip_suffix('}'))
        .unwrap_or(raw.trim());

    let mut entries: Vec<Entry> = Vec::new();
    for item in split_top_level_commas(inner) {
        let item = item.trim();
        if item.is_empty() {
            continue;
        }
        let entry = if is_string || item.starts_with('"') {
            Entry {
                text: item.to_string(),
                value: None,
            }
        } else if let Some(value) = evaluate(item) {
            let value = if is_long { value } else { i64::from(value as i32) };
            Entry {
                text: if is_long {
                    format!("{}L", value)
                } else {
                    value.to_string()
                },
                value: Some(value),
            }
        } else {
            match resolve_constant(codebase, context, item) {
                Some(Resolved { hidden: true, .. }) => {
                    issues.push(
                        Issue::new(
                            IssueId::HiddenTypedefConstant,
                            format!(
                                "Typedef references constant {} which is not part of the API",
                                item
                            ),
                        )
                        .with_element(key),
                    );
                    continue;
                }
                Some(Resolved { value, .. }) => Entry {
                    text: item.to_string(),
                    value,
                },
                None => Entry {
                    text: item.to_string(),
                    value: None,
                },
            }
        };
        let duplicate = entries.iter().any(|e| match (e.value, entry.value) {
            (Some(a), Some(b)) => a == b,
            _ => e.text == entry.text,
        });
        if !duplicate {
            entries.push(entry);
        }
    }

    if let Some(value) = field_value {
        let known: Vec<i64> = entries.iter().filter_map(|e| e.value).collect();
        if !known.is_empty() && known.len() == entries.len() && !known.contains(&value) {
            issues.push(
                Issue::new(
                    IssueId::ReturningUnexpectedConstant,
                    format!("Constant value {} is not one of the {} values", value, annotation.simple_name()),
                )
                .with_element(key),
            );
        }
    }

    let texts: Vec<&str> = entries.iter().map(|e| e.text.as_str()).collect();
    annotation.set_attribute("value", format!("{{{}}}", texts.join(", ")));
}

struct Resolved {
    hidden: bool,
    value: Option<i64>,
}

/// Resolve `Class.FIELD`, `pkg.Class.FIELD` or a bare `FIELD` of the
/// context class.
fn resolve_constant(codebase: &Codebase, context: &ClassContext, reference: &str) -> Option<Resolved> {
    let (class_part, field) = match reference.rsplit_once('.') {
        Some((class, field)) => (Some(class), field),
        None => (None, reference),
    };
    let candidates: Vec<String> = match class_part {
        None => vec![context.class.clone()],
        Some(class) => vec![
            class.to_string(),
            format!("{}.{}", context.package, class),
            format!("{}.{}", context.class, class),
        ],
    };
    candidates.iter().find_map(|name| {
        let class = codebase.find_class(name)?;
        let member = class.find_field(field)?;
        Some(Resolved {
            hidden: member.hidden || codebase.is_class_hidden(&class.qualified_name),
            value: member.field_data()?.value.as_ref().and_then(|v| v.as_i64()),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ClassKind, ConstantValue, MemberItem, ModifierSet, TypeRef, Visibility};

    #[test]
    fn evaluates_arithmetic_and_bit_ops() {
        assert_eq!(evaluate("1 << 3"), Some(8));
        assert_eq!(evaluate("(1 << 2) | 1"), Some(5));
        assert_eq!(evaluate("0x10 + 010 - 0b1"), Some(23));
        assert_eq!(evaluate("-5 % 3"), Some(-2));
        assert_eq!(evaluate("~0"), Some(-1));
        assert_eq!(evaluate("-1 >>> 60"), Some(15));
        assert_eq!(evaluate("2 * 3 + 4"), Some(10));
        assert_eq!(evaluate("0xFFFFFFFF"), Some(-1));
        assert_eq!(evaluate("0xFFFFFFFFL"), Some(4294967295));
    }

    #[test]
    fn references_and_garbage_do_not_evaluate() {
        assert_eq!(evaluate("MyTest.FLAG"), None);
        assert_eq!(evaluate("1 / 0"), None);
        assert_eq!(evaluate("1 +"), None);
        assert_eq!(evaluate("1 || 2"), None);
    }

    fn constant(name: &str, value: i32, hidden: bool) -> MemberItem {
        let mut field = MemberItem::field(name, TypeRef::named("int"))
            .with_modifiers(ModifierSet::new(Visibility::Public));
        if let MemberKind::Field(data) = &mut field.kind {
            data.value = Some(ConstantValue::Int(value));
        }
        field.hidden = hidden;
        field
    }

    fn codebase_with(typedef: &str) -> Codebase {
        let mut method = MemberItem::method("setMode", TypeRef::named("void"), vec![]);
        method
            .annotations
            .push(Annotation::new("androidx.annotation.IntDef").with_attribute("value", typedef));
        let class = ClassItem::new("test.pkg", "MyTest", ClassKind::Class)
            .with_member(constant("MODE_A", 1, false))
            .unwrap()
            .with_member(constant("MODE_B", 2, false))
            .unwrap()
            .with_member(constant("MODE_SECRET", 4, true))
            .unwrap()
            .with_member(method)
            .unwrap();
        let mut codebase = Codebase::new();
        codebase.add_class(class).unwrap();
        codebase
    }

    fn typedef_value(codebase: &Codebase) -> String {
        let class = codebase.find_class("test.pkg.MyTest").unwrap();
        let method = class.members.iter().find(|m| m.name == "setMode").unwrap();
        method.annotations[0].attribute("value").unwrap().to_string()
    }

    #[test]
    fn hidden_constants_are_dropped_with_warning() {
        let mut codebase = codebase_with("{MyTest.MODE_A, test.pkg.MyTest.MODE_SECRET, MODE_B}");
        let mut issues = Vec::new();
        normalize(&mut codebase, &mut issues);
        assert_eq!(typedef_value(&codebase), "{MyTest.MODE_A, MODE_B}");
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].id, IssueId::HiddenTypedefConstant);
        assert_eq!(issues[0].element.as_deref(), Some("test.pkg.MyTest void setMode()"));
    }

    #[test]
    fn expressions_evaluate_and_duplicates_collapse() {
        let mut codebase = codebase_with("{1 << 0, MODE_A, 0x2, 2, 1 << 3}");
        let mut issues = Vec::new();
        normalize(&mut codebase, &mut issues);
        assert_eq!(typedef_value(&codebase), "{1, 2, 8}");
        assert!(issues.is_empty());
    }

    #[test]
    fn long_def_values_get_suffix() {
        let mut annotation =
            Annotation::new("androidx.annotation.LongDef").with_attribute("value", "{1L << 40, 3}");
        let mut issues = Vec::new();
        let context = ClassContext {
            package: "a".into(),
            class: "a.B".into(),
        };
        normalize_typedef(&Codebase::new(), &context, &ElementKey::class("a.B"), &mut annotation, None, &mut issues);
        assert_eq!(annotation.attribute("value"), Some("{1099511627776L, 3L}"));
    }

    #[test]
    fn int_range_bounds_are_evaluated() {
        let mut annotations = vec![Annotation::new("androidx.annotation.IntRange")
            .with_attribute("from", "1 << 2")
            .with_attribute("to", "0x7f")];
        let context = ClassContext {
            package: "a".into(),
            class: "a.B".into(),
        };
        normalize_list(&Codebase::new(), &context, &ElementKey::class("a.B"), &mut annotations, None, &mut Vec::new());
        assert_eq!(annotations[0].attribute("from"), Some("4"));
        assert_eq!(annotations[0].attribute("to"), Some("127"));
    }

    #[test]
    fn unexpected_field_constant_is_reported() {
        let mut annotations =
            vec![Annotation::new("androidx.annotation.IntDef").with_attribute("value", "{1, 2}")];
        let context = ClassContext {
            package: "a".into(),
            class: "a.B".into(),
        };
        let mut issues = Vec::new();
        normalize_list(&Codebase::new(), &context, &ElementKey::field("a.B", "X"), &mut annotations, Some(7), &mut issues);
        assert_eq!(issues[0].id, IssueId::ReturningUnexpectedConstant);
    }
}
