//! Command implementations behind the `sig` binary.
//!
//! Each `run_*` function takes already-parsed arguments plus the resolved
//! configuration and returns the text destined for stdout. Issues found
//! along the way go to the caller's [`Reporter`]; the binary prints them
//! and turns error-severity issues into a non-zero exit.
//!
//! ## Merge sources
//!
//! Merge sources are given as `<kind>=<path>` and applied in command-line
//! order, so later sources override earlier ones:
//!
//! ```bash
//! sig merge api.txt --source xml=annotations/ --source inclusion=markers.txt
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use clap::ValueEnum;
use serde::Serialize;
use tracing::{debug, info, warn};

use sigtool_core::baseline::Baseline;
use sigtool_core::checks::check_hidden_references;
use sigtool_core::compat::check_compatibility;
use sigtool_core::config::ResolvedConfig;
use sigtool_core::error::{SigError, SigResult};
use sigtool_core::format::{detect, FileFormat};
use sigtool_core::issues::Reporter;
use sigtool_core::jdiff::{self, JdiffOptions, JdiffOutput};
use sigtool_core::load::{load_codebase, LoadedApi};
use sigtool_core::merge::{merge_sandboxed, AnnotationSource};
use sigtool_core::model::Codebase;
use sigtool_core::sandbox::ReadSandbox;
use sigtool_core::since::{ApiLevels, Levels};
use sigtool_core::writer::write;

// ============================================================================
// Shared Plumbing
// ============================================================================

/// How reported issues are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum IssuesFormat {
    /// One issue per line (default).
    #[default]
    Text,
    /// A JSON array of issues.
    Json,
}

/// Render the reporter's unsuppressed issues.
pub fn render_issues(reporter: &Reporter, format: IssuesFormat) -> SigResult<String> {
    match format {
        IssuesFormat::Text => Ok(reporter.render_text()),
        IssuesFormat::Json => reporter.render_json(),
    }
}

/// Start a reporter, seeded with the configured baseline if there is one.
pub fn open_reporter(config: &ResolvedConfig, sandbox: &ReadSandbox) -> SigResult<Reporter> {
    let Some(path) = config.baseline.as_ref().map(|b| &b.value) else {
        return Ok(Reporter::new());
    };
    if !path.exists() {
        info!(path = %path.display(), "baseline does not exist yet");
        return Ok(Reporter::new().with_baseline(Baseline::default()));
    }
    let text = sandbox.read_to_string(path)?;
    let baseline = Baseline::parse(&path.display().to_string(), &text)?;
    Ok(Reporter::new().with_baseline(baseline))
}

/// Write the reporter's current issues as the new baseline at `path`.
///
/// Returns whether the file changed.
pub fn update_baseline(reporter: &Reporter, path: &Path) -> SigResult<bool> {
    let baseline = reporter.baseline().cloned().unwrap_or_default();
    let issues = reporter
        .issues()
        .into_iter()
        .chain(reporter.suppressed().iter());
    let text = baseline.rewrite(issues);
    let existing = std::fs::read_to_string(path).ok();
    if existing.as_deref() == Some(text.as_str()) {
        return Ok(false);
    }
    std::fs::write(path, text)?;
    info!(path = %path.display(), "baseline updated");
    Ok(true)
}

fn load(path: &Path, sandbox: &ReadSandbox) -> SigResult<LoadedApi> {
    let _guard = sandbox.activate();
    load_codebase(path, sandbox)
}

/// Serialize `codebase` in `format`, dispatching JDiff to its own writer.
pub fn render(codebase: &Codebase, format: FileFormat, config: &ResolvedConfig) -> SigResult<String> {
    match format {
        FileFormat::Jdiff => Ok(jdiff::write(codebase, &JdiffOptions::default())),
        FileFormat::Unknown => write(codebase, FileFormat::V3, &config.writer_options()),
        other => write(codebase, other, &config.writer_options()),
    }
}

/// Output format: the configured one, else the input's own dialect.
fn output_format(config: &ResolvedConfig, input: FileFormat) -> FileFormat {
    config.format.as_ref().map(|f| f.value).unwrap_or(input)
}

// ============================================================================
// detect
// ============================================================================

/// Detected format of one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetectReport {
    pub file: String,
    pub format: String,
}

/// Detect the format of each file.
pub fn run_detect(paths: &[PathBuf], sandbox: &ReadSandbox) -> SigResult<Vec<DetectReport>> {
    let _guard = sandbox.activate();
    paths
        .iter()
        .map(|path| {
            if !path.exists() {
                return Err(SigError::FileNotFound { path: path.clone() });
            }
            let text = sandbox.read_to_string(path)?;
            Ok(DetectReport {
                file: path.display().to_string(),
                format: detect(&text).name().to_string(),
            })
        })
        .collect()
}

// ============================================================================
// convert
// ============================================================================

/// Re-serialize an API file, by default in its own dialect.
pub fn run_convert(input: &Path, config: &ResolvedConfig, sandbox: &ReadSandbox) -> SigResult<String> {
    let loaded = load(input, sandbox)?;
    let format = output_format(config, loaded.format);
    info!(from = %loaded.format, to = %format, "converting");
    render(&loaded.codebase, format, config)
}

// ============================================================================
// merge
// ============================================================================

/// Kind of a merge source given on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Annotation overlay XML file or directory.
    Xml,
    /// Signature file whose annotations and nullness are merged.
    Signature,
    /// Signature file standing in for parsed stub sources.
    Stubs,
    /// `show`/`hide` marker file.
    Inclusion,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SourceKind::Xml => "xml",
            SourceKind::Signature => "signature",
            SourceKind::Stubs => "stubs",
            SourceKind::Inclusion => "inclusion",
        })
    }
}

/// A `<kind>=<path>` merge source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSpec {
    pub kind: SourceKind,
    pub path: PathBuf,
}

impl FromStr for SourceSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((kind, path)) = s.split_once('=') else {
            return Err(format!(
                "invalid source '{}', expected '<kind>=<path>' (e.g., 'xml=annotations.xml')",
                s
            ));
        };
        let kind = match kind.to_lowercase().as_str() {
            "xml" => SourceKind::Xml,
            "signature" | "sig" => SourceKind::Signature,
            "stubs" => SourceKind::Stubs,
            "inclusion" | "markers" => SourceKind::Inclusion,
            other => return Err(format!("unknown source kind '{}'", other)),
        };
        if path.is_empty() {
            return Err(format!("source '{}' has an empty path", s));
        }
        Ok(SourceSpec {
            kind,
            path: PathBuf::from(path),
        })
    }
}

impl SourceSpec {
    fn into_source(self, sandbox: &ReadSandbox) -> SigResult<AnnotationSource> {
        let name = self.path.display().to_string();
        debug!(kind = %self.kind, path = %name, "merge source");
        Ok(match self.kind {
            SourceKind::Xml => AnnotationSource::XmlPath(self.path),
            SourceKind::Inclusion => AnnotationSource::InclusionPath(self.path),
            SourceKind::Signature => AnnotationSource::Signature {
                name,
                codebase: load(&self.path, sandbox)?.codebase,
            },
            SourceKind::Stubs => AnnotationSource::Stubs {
                name,
                codebase: load(&self.path, sandbox)?.codebase,
            },
        })
    }
}

/// Arguments of the merge command.
#[derive(Debug, Clone, Default)]
pub struct MergeRequest {
    pub base: PathBuf,
    pub sources: Vec<SourceSpec>,
    /// Previous API used to mark newly declared nullness as recent.
    pub migrate_nulls: Option<PathBuf>,
}

/// Merge sources onto the base API and serialize the result.
///
/// Merge issues and hidden-reference issues go to `reporter`.
pub fn run_merge(
    request: &MergeRequest,
    config: &ResolvedConfig,
    sandbox: &ReadSandbox,
    reporter: &mut Reporter,
) -> SigResult<String> {
    let base = load(&request.base, sandbox)?;
    let sources = request
        .sources
        .iter()
        .cloned()
        .map(|spec| spec.into_source(sandbox))
        .collect::<SigResult<Vec<_>>>()?;

    let mut options = config.merge_options();
    if let Some(previous) = &request.migrate_nulls {
        options.migrate_nulls = Some(load(previous, sandbox)?.codebase);
    }

    let result = {
        let _guard = sandbox.activate();
        merge_sandboxed(base.codebase, &sources, &options, sandbox)?
    };
    reporter.extend(result.issues);
    reporter.extend(check_hidden_references(&result.codebase));

    if request.sources.is_empty() {
        info!("no merge sources given; base is written unchanged");
    }
    render(&result.codebase, output_format(config, base.format), config)
}

// ============================================================================
// check-compat
// ============================================================================

/// Compare two API files, reporting incompatible changes.
pub fn run_check_compat(
    previous: &Path,
    current: &Path,
    sandbox: &ReadSandbox,
    reporter: &mut Reporter,
) -> SigResult<()> {
    let previous = load(previous, sandbox)?;
    let current = load(current, sandbox)?;
    let issues = check_compatibility(&previous.codebase, &current.codebase);
    info!(count = issues.len(), "compatibility check finished");
    reporter.extend(issues);
    if let Some(baseline) = reporter.baseline() {
        let stale = baseline.unused();
        if !stale.is_empty() {
            warn!(count = stale.len(), "baseline has entries that no longer match");
        }
    }
    Ok(())
}

// ============================================================================
// jdiff
// ============================================================================

/// Write an API as JDiff XML, or only its changes relative to `base`.
pub fn run_jdiff(
    api: &Path,
    base: Option<&Path>,
    api_name: Option<String>,
    sandbox: &ReadSandbox,
) -> SigResult<JdiffOutput> {
    let current = load(api, sandbox)?;
    let options = JdiffOptions { api_name };
    match base {
        None => Ok(JdiffOutput::Document(jdiff::write(&current.codebase, &options))),
        Some(base) => {
            let base = load(base, sandbox)?;
            Ok(jdiff::write_diff(&current.codebase, &base.codebase, &options))
        }
    }
}

// ============================================================================
// since
// ============================================================================

/// API levels of a class or one of its members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SinceReport {
    pub element: String,
    pub since: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deprecated: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub removed: Option<u32>,
}

impl SinceReport {
    fn new(element: String, levels: Levels) -> Self {
        SinceReport {
            element,
            since: levels.since,
            deprecated: levels.deprecated,
            removed: levels.removed,
        }
    }
}

impl fmt::Display for SinceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: since {}", self.element, self.since)?;
        if let Some(level) = self.deprecated {
            write!(f, ", deprecated {}", level)?;
        }
        if let Some(level) = self.removed {
            write!(f, ", removed {}", level)?;
        }
        Ok(())
    }
}

/// Look up a class, or a member given as a method descriptor or field name.
pub fn run_since(
    file: &Path,
    class: &str,
    member: Option<&str>,
    sandbox: &ReadSandbox,
) -> SigResult<SinceReport> {
    let text = {
        let _guard = sandbox.activate();
        sandbox.read_to_string(file)?
    };
    let levels = ApiLevels::parse(&file.display().to_string(), &text)?;
    let not_found = |element: String| SigError::invalid_args(format!("{} is not in {}", element, file.display()));

    let Some(class_levels) = levels.class(class) else {
        return Err(not_found(class.to_string()));
    };
    let Some(member) = member else {
        return Ok(SinceReport::new(class.to_string(), class_levels.levels));
    };
    let element = format!("{} {}", class, member);
    let found = if member.contains('(') {
        levels.method(class, member)
    } else {
        levels.field(class, member).or_else(|| levels.method(class, member))
    };
    found
        .map(|l| SinceReport::new(element.clone(), l))
        .ok_or_else(|| not_found(element))
}
