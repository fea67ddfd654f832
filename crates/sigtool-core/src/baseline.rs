//! Baseline files of known issues.
//!
//! ```text
//! // Baseline format: 1.0
//! ReferencesHidden: test.pkg.MyTest:
//!     Class test.pkg.MyTest references hidden type test.pkg.Hidden.
//! ```
//!
//! Lines starting with `//` are comments or disabled entries. They never
//! match and are preserved verbatim when the file is rewritten.

use std::collections::BTreeSet;

use crate::error::ParseError;
use crate::format::BASELINE_HEADER_PREFIX;
use crate::issues::{Issue, IssueId};
use crate::types::Location;

/// Header written at the top of new baseline files.
pub const BASELINE_HEADER: &str = "// Baseline format: 1.0";

/// One known issue.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct BaselineEntry {
    pub id: IssueId,
    pub element: String,
    /// Message lines joined with `\n`.
    pub message: String,
}

/// A parsed baseline file.
#[derive(Debug, Clone, Default)]
pub struct Baseline {
    original: String,
    comments: Vec<String>,
    entries: Vec<BaselineEntry>,
    used: BTreeSet<usize>,
}

impl Baseline {
    /// Parse baseline text. `file` is only used for error locations.
    pub fn parse(file: &str, text: &str) -> Result<Baseline, ParseError> {
        let mut baseline = Baseline {
            original: text.to_string(),
            ..Baseline::default()
        };
        let content = crate::text::normalize_newlines(crate::text::strip_bom(text));
        let mut current: Option<BaselineEntry> = None;

        for (index, line) in content.lines().enumerate() {
            let line_no = u32::try_from(index + 1).unwrap_or(u32::MAX);
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if trimmed.starts_with("//") {
                if !trimmed.starts_with(BASELINE_HEADER_PREFIX) {
                    baseline.comments.push(line.to_string());
                }
                continue;
            }
            if line.starts_with(char::is_whitespace) {
                let Some(entry) = current.as_mut() else {
                    return Err(ParseError::new(
                        Location::new(file, line_no, 1),
                        "message line without an issue entry",
                    ));
                };
                if !entry.message.is_empty() {
                    entry.message.push('\n');
                }
                entry.message.push_str(trimmed);
                continue;
            }

            let entry = parse_entry_header(trimmed).map_err(|message| {
                ParseError::new(Location::new(file, line_no, 1), message)
            })?;
            if let Some(done) = current.replace(entry) {
                baseline.entries.push(done);
            }
        }
        if let Some(done) = current {
            baseline.entries.push(done);
        }
        Ok(baseline)
    }

    pub fn entries(&self) -> &[BaselineEntry] {
        &self.entries
    }

    /// Whether an entry for `(id, element)` exists; marks it used.
    pub fn mark_used(&mut self, id: IssueId, element: &str) -> bool {
        let Some(index) = self
            .entries
            .iter()
            .position(|e| e.id == id && e.element == element)
        else {
            return false;
        };
        self.used.insert(index);
        true
    }

    /// Entries never matched by a reported issue.
    pub fn unused(&self) -> Vec<&BaselineEntry> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(i, _)| !self.used.contains(i))
            .map(|(_, e)| e)
            .collect()
    }

    /// Render a baseline holding exactly `issues`.
    ///
    /// Returns the original text unchanged when the set of entries is the
    /// same; otherwise writes the header, the preserved comment lines, and
    /// the entries sorted by element then issue id.
    pub fn rewrite<'a>(&self, issues: impl IntoIterator<Item = &'a Issue>) -> String {
        let wanted: BTreeSet<(String, IssueId, String)> = issues
            .into_iter()
            .filter_map(|i| {
                i.element
                    .as_ref()
                    .map(|e| (e.clone(), i.id, i.message.clone()))
            })
            .collect();
        let existing: BTreeSet<(String, IssueId, String)> = self
            .entries
            .iter()
            .map(|e| (e.element.clone(), e.id, e.message.clone()))
            .collect();
        if wanted == existing && !self.original.is_empty() {
            return self.original.clone();
        }

        let mut out = String::from(BASELINE_HEADER);
        out.push('\n');
        for comment in &self.comments {
            out.push_str(comment);
            out.push('\n');
        }
        for (element, id, message) in wanted {
            out.push_str(&format!("{}: {}:\n", id, element));
            for line in message.lines() {
                out.push_str("    ");
                out.push_str(line);
                out.push('\n');
            }
            out.push('\n');
        }
        out
    }
}

/// Parse `IssueId: elementKey:`.
fn parse_entry_header(line: &str) -> Result<BaselineEntry, String> {
    let Some(body) = line.strip_suffix(':') else {
        return Err(format!("expected 'IssueId: element:' but found '{}'", line));
    };
    let Some((id, element)) = body.split_once(':') else {
        return Err(format!("missing issue id in '{}'", line));
    };
    let id = id.trim().parse::<IssueId>()?;
    let element = element.trim();
    if element.is_empty() {
        return Err(format!("missing element in '{}'", line));
    }
    Ok(BaselineEntry {
        id,
        element: element.to_string(),
        message: String::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = "// Baseline format: 1.0\n\
//ReferencesHidden: test.pkg.Disabled:\n\
ReferencesHidden: test.pkg.MyTest:\n    Class test.pkg.MyTest references hidden type.\n\n\
RemovedMethod: test.pkg.MyTest void gone():\n    Removed method\n    spanning lines\n";

    #[test]
    fn parses_entries_and_skips_comments() {
        let baseline = Baseline::parse("b.txt", SAMPLE).unwrap();
        assert_eq!(baseline.entries().len(), 2);
        assert_eq!(baseline.entries()[0].element, "test.pkg.MyTest");
        assert_eq!(baseline.entries()[1].id, IssueId::RemovedMethod);
        assert_eq!(baseline.entries()[1].element, "test.pkg.MyTest void gone()");
        assert_eq!(baseline.entries()[1].message, "Removed method\nspanning lines");
    }

    #[test]
    fn disabled_entries_never_match() {
        let mut baseline = Baseline::parse("b.txt", SAMPLE).unwrap();
        assert!(!baseline.mark_used(IssueId::ReferencesHidden, "test.pkg.Disabled"));
        assert!(baseline.mark_used(IssueId::ReferencesHidden, "test.pkg.MyTest"));
        let unused: Vec<&str> = baseline.unused().iter().map(|e| e.element.as_str()).collect();
        assert_eq!(unused, vec!["test.pkg.MyTest void gone()"]);
    }

    #[test]
    fn rewrite_unchanged_returns_original_bytes() {
        let baseline = Baseline::parse("b.txt", SAMPLE).unwrap();
        let issues = vec![
            Issue::new(IssueId::ReferencesHidden, "Class test.pkg.MyTest references hidden type.")
                .with_element("test.pkg.MyTest"),
            Issue::new(IssueId::RemovedMethod, "Removed method\nspanning lines")
                .with_element("test.pkg.MyTest void gone()"),
        ];
        assert_eq!(baseline.rewrite(&issues), SAMPLE);
    }

    #[test]
    fn rewrite_changed_keeps_comments() {
        let baseline = Baseline::parse("b.txt", SAMPLE).unwrap();
        let issues = vec![Issue::new(IssueId::ChangedType, "Changed type").with_element("a.B f")];
        assert_eq!(
            baseline.rewrite(&issues),
            "// Baseline format: 1.0\n//ReferencesHidden: test.pkg.Disabled:\nChangedType: a.B f:\n    Changed type\n\n"
        );
    }

    #[test]
    fn malformed_entry_reports_line() {
        let err = Baseline::parse("b.txt", "// Baseline format: 1.0\nnot an entry\n").unwrap_err();
        assert_eq!(err.location.line, 2);
        let err = Baseline::parse("b.txt", "    orphan message\n").unwrap_err();
        assert_eq!(err.location.line, 1);
        assert!(Baseline::parse("b.txt", "Bogus: a.B:\n").is_err());
    }
}
