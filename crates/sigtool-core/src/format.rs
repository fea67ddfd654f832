//! File format detection and per-dialect serialization policy.
//!
//! Detection is a pure function of the leading meaningful line (plus, for XML
//! inputs, the element structure). CRLF and LF inputs detect identically.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::model::NullnessStyle;
use crate::text::{meaningful_lines, strip_bom};

static SIGNATURE_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^// Signature format: (\d+)\.(\d+)\s*$").unwrap());

static LEGACY_PACKAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^package\s+[A-Za-z_$][\w$]*(\.[A-Za-z_$][\w$]*)*\s*\{").unwrap());

static API_VERSION_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<api\b[^>]*\bversion\s*=\s*["']"#).unwrap());

/// Prefix of the baseline header line.
pub const BASELINE_HEADER_PREFIX: &str = "// Baseline format:";

// ============================================================================
// File Formats
// ============================================================================

/// Dialect (and version) of an input or output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileFormat {
    /// Legacy signature files without a header.
    V1,
    V2,
    V3,
    Baseline,
    Jdiff,
    SinceXml,
    /// Unrecognized input. Signature files with an unknown major version are
    /// still parsed with the V3 grammar.
    Unknown,
}

impl FileFormat {
    /// Stable lowercase name, accepted by [`FromStr`].
    pub fn name(self) -> &'static str {
        match self {
            FileFormat::V1 => "v1",
            FileFormat::V2 => "v2",
            FileFormat::V3 => "v3",
            FileFormat::Baseline => "baseline",
            FileFormat::Jdiff => "jdiff",
            FileFormat::SinceXml => "since-xml",
            FileFormat::Unknown => "unknown",
        }
    }

    /// Signature dialects (and unknown, parsed as the newest grammar).
    pub fn is_signature(self) -> bool {
        matches!(self, FileFormat::V1 | FileFormat::V2 | FileFormat::V3)
    }

    /// Header line written for this dialect, without a newline.
    pub fn header(self) -> Option<&'static str> {
        match self {
            FileFormat::V2 => Some("// Signature format: 2.0"),
            FileFormat::V3 => Some("// Signature format: 3.0"),
            FileFormat::Baseline => Some("// Baseline format: 1.0"),
            _ => None,
        }
    }

    /// Serialization switches for signature dialects.
    pub fn policy(self) -> FormatPolicy {
        match self {
            FileFormat::V1 => FormatPolicy {
                nullness: NullnessStyle::Omit,
                short_names: false,
                annotations: false,
                default_values: false,
                compat_modifiers: true,
                deprecated_keyword: true,
                parameter_names: false,
            },
            FileFormat::V2 => FormatPolicy {
                nullness: NullnessStyle::Annotations,
                short_names: true,
                annotations: true,
                default_values: false,
                compat_modifiers: false,
                deprecated_keyword: false,
                parameter_names: true,
            },
            _ => FormatPolicy {
                nullness: NullnessStyle::Suffix,
                short_names: true,
                annotations: true,
                default_values: true,
                compat_modifiers: false,
                deprecated_keyword: false,
                parameter_names: true,
            },
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FileFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "v1" | "1" | "1.0" => Ok(FileFormat::V1),
            "v2" | "2" | "2.0" => Ok(FileFormat::V2),
            "v3" | "3" | "3.0" => Ok(FileFormat::V3),
            "baseline" => Ok(FileFormat::Baseline),
            "jdiff" => Ok(FileFormat::Jdiff),
            "since-xml" | "since" => Ok(FileFormat::SinceXml),
            "unknown" => Ok(FileFormat::Unknown),
            other => Err(format!("unknown format '{}'", other)),
        }
    }
}

/// Behavioral switches of a signature dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatPolicy {
    pub nullness: NullnessStyle,
    /// Known `java.lang` types and androidx annotations by simple name.
    pub short_names: bool,
    /// Declaration and type-use annotations are written.
    pub annotations: bool,
    /// Parameter default values are written.
    pub default_values: bool,
    /// `synchronized`/`native`/`strictfp`/`default` are written.
    pub compat_modifiers: bool,
    /// Deprecation is a leading `deprecated` keyword rather than `@Deprecated`.
    pub deprecated_keyword: bool,
    /// Parameter names are written when known.
    pub parameter_names: bool,
}

// ============================================================================
// Detection
// ============================================================================

/// Classify a text blob.
pub fn detect(text: &str) -> FileFormat {
    detect_with_version(text).0
}

/// Classify a text blob and extract the `major.minor` version of a signature
/// header, if present.
pub fn detect_with_version(text: &str) -> (FileFormat, Option<(u32, u32)>) {
    let Some(first) = meaningful_lines(text).next() else {
        return (FileFormat::Unknown, None);
    };

    if let Some(caps) = SIGNATURE_HEADER.captures(first) {
        let major = caps[1].parse::<u32>().ok();
        let minor = caps[2].parse::<u32>().ok();
        let version = major.zip(minor);
        let format = match major {
            Some(1) => FileFormat::V1,
            Some(2) => FileFormat::V2,
            Some(3) => FileFormat::V3,
            _ => FileFormat::Unknown,
        };
        return (format, version);
    }

    if first.starts_with(BASELINE_HEADER_PREFIX) {
        return (FileFormat::Baseline, None);
    }

    if first.starts_with("<?xml") || first.starts_with("<api") {
        return (detect_xml(strip_bom(text)), None);
    }

    if LEGACY_PACKAGE.is_match(first) {
        return (FileFormat::V1, Some((1, 0)));
    }

    (FileFormat::Unknown, None)
}

fn detect_xml(text: &str) -> FileFormat {
    if !text.contains("<api") {
        return FileFormat::Unknown;
    }
    if API_VERSION_ATTR.is_match(text) && text.contains("since=") {
        return FileFormat::SinceXml;
    }
    if text.contains("<package") || text.contains("<class") {
        return FileFormat::Jdiff;
    }
    FileFormat::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_select_signature_versions() {
        assert_eq!(detect("// Signature format: 2.0\npackage a {\n}\n"), FileFormat::V2);
        assert_eq!(detect("// Signature format: 3.0\n"), FileFormat::V3);
        assert_eq!(detect("// Signature format: 1.0\n"), FileFormat::V1);
        assert_eq!(
            detect_with_version("// Signature format: 4.1\n"),
            (FileFormat::Unknown, Some((4, 1)))
        );
    }

    #[test]
    fn legacy_files_without_header_are_v1() {
        let text = "package test.pkg { public class MyTest { ctor public MyTest(); method public int clamp(int); } }";
        assert_eq!(detect(text), FileFormat::V1);
        assert_eq!(detect("\n\npackage a.b {\n}\n"), FileFormat::V1);
        assert_eq!(detect("packaged a {"), FileFormat::Unknown);
    }

    #[test]
    fn bom_and_crlf_are_tolerated() {
        let lf = "// Signature format: 3.0\npackage a {\n}\n";
        let crlf = "\u{feff}// Signature format: 3.0\r\npackage a {\r\n}\r\n";
        assert_eq!(detect(lf), detect(crlf));
        assert_eq!(detect("\u{feff}package a {\r\n}"), FileFormat::V1);
    }

    #[test]
    fn baseline_and_xml_formats() {
        assert_eq!(detect("// Baseline format: 1.0\n"), FileFormat::Baseline);
        assert_eq!(
            detect("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<api>\n<package name=\"a\">\n</package>\n</api>\n"),
            FileFormat::Jdiff
        );
        assert_eq!(
            detect("<api version=\"2\">\n<class name=\"a/B\" since=\"1\">\n</class>\n</api>\n"),
            FileFormat::SinceXml
        );
        assert_eq!(detect("<?xml version=\"1.0\"?>\n<root>\n</root>\n"), FileFormat::Unknown);
    }

    #[test]
    fn empty_or_garbage_is_unknown() {
        assert_eq!(detect(""), FileFormat::Unknown);
        assert_eq!(detect("   \n\t\n"), FileFormat::Unknown);
        assert_eq!(detect("hello world"), FileFormat::Unknown);
    }

    #[test]
    fn format_names_parse_back() {
        for format in [
            FileFormat::V1,
            FileFormat::V2,
            FileFormat::V3,
            FileFormat::Baseline,
            FileFormat::Jdiff,
            FileFormat::SinceXml,
        ] {
            assert_eq!(format.name().parse::<FileFormat>(), Ok(format));
        }
        assert!("v9".parse::<FileFormat>().is_err());
    }
}
