//! Reported issues.
//!
//! Issues are non-fatal findings (hidden references, merge conflicts,
//! compatibility breaks). They are collected by a [`Reporter`], filtered
//! against an optional [`Baseline`], and surfaced in file-location order.
//! The run fails only when unsuppressed error-severity issues remain.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::baseline::Baseline;
use crate::error::{SigError, SigResult};
use crate::types::Location;

// ============================================================================
// Severity
// ============================================================================

/// Severity of an issue. Ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Not reported at all.
    Hidden,
    Info,
    Warning,
    Error,
}

impl Severity {
    pub fn name(self) -> &'static str {
        match self {
            Severity::Hidden => "hidden",
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hidden" => Ok(Severity::Hidden),
            "info" => Ok(Severity::Info),
            "warning" => Ok(Severity::Warning),
            "error" => Ok(Severity::Error),
            other => Err(format!("unknown severity '{}'", other)),
        }
    }
}

// ============================================================================
// Issue Catalogue
// ============================================================================

macro_rules! issue_ids {
    ($($id:ident => $severity:ident),+ $(,)?) => {
        /// Stable identifier of an issue type.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum IssueId {
            $($id),+
        }

        impl IssueId {
            pub const ALL: &'static [IssueId] = &[$(IssueId::$id),+];

            pub fn name(self) -> &'static str {
                match self {
                    $(IssueId::$id => stringify!($id)),+
                }
            }

            pub fn default_severity(self) -> Severity {
                match self {
                    $(IssueId::$id => Severity::$severity),+
                }
            }
        }
    };
}

issue_ids! {
    ReferencesHidden => Error,
    HiddenTypedefConstant => Warning,
    ReturningUnexpectedConstant => Warning,
    InconsistentMergeAnnotation => Warning,
    ShowingMemberInHiddenClass => Error,
    RemovedPackage => Error,
    RemovedClass => Error,
    RemovedMethod => Error,
    RemovedField => Error,
    ChangedType => Error,
    ChangedStatic => Error,
    ChangedFinal => Error,
    ChangedAbstract => Error,
    ChangedSuperclass => Error,
    ChangedNullness => Error,
    AddedAbstractMethod => Error,
}

impl fmt::Display for IssueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for IssueId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        IssueId::ALL
            .iter()
            .copied()
            .find(|id| id.name() == s)
            .ok_or_else(|| format!("unknown issue id '{}'", s))
    }
}

// ============================================================================
// Issue
// ============================================================================

/// One reported finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub id: IssueId,
    pub severity: Severity,
    pub message: String,
    /// Element key of the API item the issue is about.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

impl Issue {
    /// Create an issue at its default severity.
    pub fn new(id: IssueId, message: impl Into<String>) -> Self {
        Issue {
            id,
            severity: id.default_severity(),
            message: message.into(),
            element: None,
            location: None,
        }
    }

    pub fn with_element(mut self, element: impl fmt::Display) -> Self {
        self.element = Some(element.to_string());
        self
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    /// Ordering used when printing: located issues first, by location.
    fn sort_key(&self) -> (bool, Option<&Location>, Option<&str>, IssueId, &str) {
        (
            self.location.is_none(),
            self.location.as_ref(),
            self.element.as_deref(),
            self.id,
            &self.message,
        )
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(location) = &self.location {
            write!(f, "{}: ", location)?;
        }
        write!(f, "{}: {} [{}]", self.severity, self.message, self.id)
    }
}

// ============================================================================
// Reporter
// ============================================================================

/// Collects issues and applies severity overrides and the baseline.
#[derive(Debug, Default)]
pub struct Reporter {
    reported: Vec<Issue>,
    suppressed: Vec<Issue>,
    overrides: BTreeMap<IssueId, Severity>,
    baseline: Option<Baseline>,
}

impl Reporter {
    pub fn new() -> Self {
        Reporter::default()
    }

    pub fn with_baseline(mut self, baseline: Baseline) -> Self {
        self.baseline = Some(baseline);
        self
    }

    /// Report `id` at `severity` instead of its default.
    pub fn set_severity(&mut self, id: IssueId, severity: Severity) {
        self.overrides.insert(id, severity);
    }

    pub fn report(&mut self, mut issue: Issue) {
        if let Some(severity) = self.overrides.get(&issue.id) {
            issue.severity = *severity;
        }
        if issue.severity == Severity::Hidden {
            return;
        }
        let known = match (&mut self.baseline, &issue.element) {
            (Some(baseline), Some(element)) => baseline.mark_used(issue.id, element),
            _ => false,
        };
        if known {
            debug!(id = %issue.id, element = ?issue.element, "issue suppressed by baseline");
            self.suppressed.push(issue);
        } else {
            self.reported.push(issue);
        }
    }

    pub fn extend(&mut self, issues: impl IntoIterator<Item = Issue>) {
        for issue in issues {
            self.report(issue);
        }
    }

    /// Unsuppressed issues in file-location order.
    pub fn issues(&self) -> Vec<&Issue> {
        let mut out: Vec<&Issue> = self.reported.iter().collect();
        out.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        out
    }

    /// Issues matched by the baseline.
    pub fn suppressed(&self) -> &[Issue] {
        &self.suppressed
    }

    pub fn baseline(&self) -> Option<&Baseline> {
        self.baseline.as_ref()
    }

    pub fn error_count(&self) -> usize {
        self.reported
            .iter()
            .filter(|i| i.severity == Severity::Error)
            .count()
    }

    /// `Err(IssuesReported)` when unsuppressed errors remain.
    pub fn check(&self) -> SigResult<()> {
        match self.error_count() {
            0 => Ok(()),
            count => Err(SigError::IssuesReported { count }),
        }
    }

    /// Render unsuppressed issues, one per line.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for issue in self.issues() {
            out.push_str(&issue.to_string());
            out.push('\n');
        }
        out
    }

    /// Render unsuppressed issues as a JSON array.
    pub fn render_json(&self) -> SigResult<String> {
        serde_json::to_string_pretty(&self.issues())
            .map_err(|e| SigError::internal(format!("cannot serialize issues: {}", e)))
    }
}
