//! Typed constant values of fields.
//!
//! The literal is authoritative. Trailing `// 0x..` comments in signature files
//! are regenerated by [`ConstantValue::comment`] and never read back.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::text::{escape_java_char, escape_java_string, unescape_java};

/// A compile-time constant value with its Java type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ConstantValue {
    Boolean(bool),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Char(u16),
    Float(f32),
    Double(f64),
    String(String),
}

impl PartialEq for ConstantValue {
    fn eq(&self, other: &Self) -> bool {
        use ConstantValue::*;
        match (self, other) {
            (Boolean(a), Boolean(b)) => a == b,
            (Byte(a), Byte(b)) => a == b,
            (Short(a), Short(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            (Long(a), Long(b)) => a == b,
            (Char(a), Char(b)) => a == b,
            (Float(a), Float(b)) => a.to_bits() == b.to_bits(),
            (Double(a), Double(b)) => a.to_bits() == b.to_bits(),
            (String(a), String(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for ConstantValue {}

impl ConstantValue {
    /// Parse a literal for a field of type `type_name` (erased, qualified).
    ///
    /// Returns `None` when the literal does not fit the type or the type has
    /// no constant representation.
    pub fn parse(literal: &str, type_name: &str) -> Option<ConstantValue> {
        let literal = literal.trim();
        match type_name {
            "boolean" | "java.lang.Boolean" => match literal {
                "true" => Some(ConstantValue::Boolean(true)),
                "false" => Some(ConstantValue::Boolean(false)),
                _ => None,
            },
            "byte" | "java.lang.Byte" => {
                parse_integral(literal, 8).map(|v| ConstantValue::Byte(v as i8))
            }
            "short" | "java.lang.Short" => {
                parse_integral(literal, 16).map(|v| ConstantValue::Short(v as i16))
            }
            "int" | "java.lang.Integer" => {
                parse_integral(literal, 32).map(|v| ConstantValue::Int(v as i32))
            }
            "long" | "java.lang.Long" => parse_integral(literal, 64).map(ConstantValue::Long),
            "char" | "java.lang.Character" => parse_char(literal).map(ConstantValue::Char),
            "float" | "java.lang.Float" => parse_floating(literal).map(|v| ConstantValue::Float(v as f32)),
            "double" | "java.lang.Double" => parse_floating(literal).map(ConstantValue::Double),
            "java.lang.String" | "String" => parse_string(literal).map(ConstantValue::String),
            _ => None,
        }
    }

    /// Literal text as written after `=` in signature files.
    pub fn literal(&self) -> String {
        match self {
            ConstantValue::Boolean(v) => v.to_string(),
            ConstantValue::Byte(v) => v.to_string(),
            ConstantValue::Short(v) => v.to_string(),
            ConstantValue::Int(v) => v.to_string(),
            ConstantValue::Long(v) => format!("{}L", v),
            ConstantValue::Char(v) => v.to_string(),
            ConstantValue::Float(v) => {
                if v.is_nan() {
                    "(0.0f/0.0f)".to_string()
                } else if v.is_infinite() {
                    if *v > 0.0 {
                        "(1.0f/0.0f)".to_string()
                    } else {
                        "(-1.0f/0.0f)".to_string()
                    }
                } else {
                    format!("{}f", java_float_string(f64::from(*v), format!("{:e}", v), format!("{}", v)))
                }
            }
            ConstantValue::Double(v) => {
                if v.is_nan() {
                    "(0.0/0.0)".to_string()
                } else if v.is_infinite() {
                    if *v > 0.0 {
                        "(1.0/0.0)".to_string()
                    } else {
                        "(-1.0/0.0)".to_string()
                    }
                } else {
                    java_float_string(*v, format!("{:e}", v), format!("{}", v))
                }
            }
            ConstantValue::String(s) => format!("\"{}\"", escape_java_string(s)),
        }
    }

    /// Regenerated trailing comment for integral and char constants.
    pub fn comment(&self) -> Option<String> {
        match self {
            ConstantValue::Byte(v) => Some(format!("0x{:x}", *v as u8)),
            ConstantValue::Short(v) => Some(format!("0x{:x}", *v as u16)),
            ConstantValue::Int(v) => Some(format!("0x{:x}", *v as u32)),
            ConstantValue::Long(v) => Some(format!("0x{:x}L", *v as u64)),
            ConstantValue::Char(v) => {
                let shown = char::from_u32(u32::from(*v))
                    .map(escape_java_char)
                    .unwrap_or_else(|| format!("\\u{:04x}", v));
                Some(format!("0x{:04x} '{}'", v, shown))
            }
            _ => None,
        }
    }

    /// Java type keyword of the value.
    pub fn type_name(&self) -> &'static str {
        match self {
            ConstantValue::Boolean(_) => "boolean",
            ConstantValue::Byte(_) => "byte",
            ConstantValue::Short(_) => "short",
            ConstantValue::Int(_) => "int",
            ConstantValue::Long(_) => "long",
            ConstantValue::Char(_) => "char",
            ConstantValue::Float(_) => "float",
            ConstantValue::Double(_) => "double",
            ConstantValue::String(_) => "java.lang.String",
        }
    }

    /// Integral value, for typedef normalization.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ConstantValue::Byte(v) => Some(i64::from(*v)),
            ConstantValue::Short(v) => Some(i64::from(*v)),
            ConstantValue::Int(v) => Some(i64::from(*v)),
            ConstantValue::Long(v) => Some(*v),
            ConstantValue::Char(v) => Some(i64::from(*v)),
            _ => None,
        }
    }
}

impl fmt::Display for ConstantValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.literal())
    }
}

// ============================================================================
// Literal Parsing
// ============================================================================

/// Parse a decimal, hex, octal or binary integer literal into `bits` width,
/// two's complement for hex/octal/binary forms.
pub fn parse_integral(literal: &str, bits: u32) -> Option<i64> {
    let cleaned: String = literal
        .trim()
        .trim_end_matches(['L', 'l'])
        .chars()
        .filter(|c| *c != '_')
        .collect();
    let (negative, digits) = match cleaned.strip_prefix('-') {
        Some(rest) => (true, rest.trim()),
        None => (false, cleaned.as_str()),
    };
    let (radix, body) = if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        (16, hex)
    } else if let Some(bin) = digits
        .strip_prefix("0b")
        .or_else(|| digits.strip_prefix("0B"))
    {
        (2, bin)
    } else if digits.len() > 1 && digits.starts_with('0') {
        (8, &digits[1..])
    } else {
        (10, digits)
    };
    if body.is_empty() {
        return None;
    }
    let magnitude = u64::from_str_radix(body, radix).ok()?;

    let value: i64 = if radix == 10 {
        let max = 1u64 << (bits - 1);
        if (negative && magnitude > max) || (!negative && magnitude >= max) {
            return None;
        }
        if negative {
            (magnitude as i64).wrapping_neg()
        } else {
            magnitude as i64
        }
    } else {
        if bits < 64 && magnitude >> bits != 0 {
            return None;
        }
        // sign-extend from `bits`
        let shift = 64 - bits;
        let v = ((magnitude << shift) as i64) >> shift;
        if negative {
            v.wrapping_neg()
        } else {
            v
        }
    };
    Some(value)
}

fn parse_char(literal: &str) -> Option<u16> {
    if let Some(body) = literal
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
    {
        let decoded = unescape_java(body)?;
        let mut chars = decoded.chars();
        let ch = chars.next()?;
        if chars.next().is_some() {
            return None;
        }
        let code = u32::from(ch);
        return u16::try_from(code).ok();
    }
    let value = parse_integral(literal, 32)?;
    u16::try_from(value).ok()
}

fn parse_floating(literal: &str) -> Option<f64> {
    let compact: String = literal.chars().filter(|c| !c.is_whitespace()).collect();
    match compact.as_str() {
        "(0.0f/0.0f)" | "(0.0/0.0)" | "NaN" | "java.lang.Float.NaN" | "java.lang.Double.NaN" => {
            return Some(f64::NAN)
        }
        "(1.0f/0.0f)" | "(1.0/0.0)" | "Infinity" => return Some(f64::INFINITY),
        "(-1.0f/0.0f)" | "(-1.0/0.0)" | "-Infinity" => return Some(f64::NEG_INFINITY),
        _ => {}
    }
    let body = compact.trim_end_matches(['f', 'F', 'd', 'D']).replace('_', "");
    body.parse::<f64>().ok()
}

fn parse_string(literal: &str) -> Option<String> {
    let body = literal.strip_prefix('"')?.strip_suffix('"')?;
    unescape_java(body)
}

/// Java `Float.toString`/`Double.toString` rendering from Rust's shortest
/// representations (`{:e}` and `{}`).
fn java_float_string(value: f64, scientific: String, plain: String) -> String {
    let magnitude = value.abs();
    if value == 0.0 {
        return if value.is_sign_negative() { "-0.0" } else { "0.0" }.to_string();
    }
    if (1e-3..1e7).contains(&magnitude) {
        if plain.contains('.') {
            plain
        } else {
            format!("{}.0", plain)
        }
    } else {
        let (mantissa, exponent) = scientific
            .split_once('e')
            .unwrap_or((scientific.as_str(), "0"));
        let mantissa = if mantissa.contains('.') {
            mantissa.to_string()
        } else {
            format!("{}.0", mantissa)
        };
        format!("{}E{}", mantissa, exponent)
    }
}
