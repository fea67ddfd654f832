//! Binary entry point for the sig CLI.
//!
//! ## Usage
//!
//! ```bash
//! # Which dialect is this file?
//! sig detect api/current.txt
//!
//! # Rewrite a V2 file as V3
//! sig --format v3 convert api/current.txt
//!
//! # Merge overlays onto an API, later sources winning
//! sig merge api/current.txt --source xml=annotations/ --source inclusion=markers.txt
//!
//! # Compare against the released API, suppressing known issues
//! sig --baseline api/baseline.txt check-compat api/released.txt api/current.txt
//! ```

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;

use sigtool::cli::{
    open_reporter, render_issues, run_check_compat, run_convert, run_detect, run_jdiff, run_merge,
    run_since, update_baseline, IssuesFormat, MergeRequest, SourceSpec,
};
use sigtool_core::config::{CliOverrides, ResolvedConfig};
use sigtool_core::error::{OutputErrorCode, SigError, SigResult};
use sigtool_core::format::FileFormat;
use sigtool_core::issues::Reporter;
use sigtool_core::jdiff::JdiffOutput;
use sigtool_core::merge::ConflictPolicy;
use sigtool_core::sandbox::ReadSandbox;

// ============================================================================
// CLI Structure
// ============================================================================

/// Read, write, merge and compare Java API signature files.
#[derive(Parser, Debug)]
#[command(name = "sig", version, about = "Read, write, merge and compare Java API signature files")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

/// Global arguments shared by all subcommands.
#[derive(Parser, Debug)]
struct GlobalArgs {
    /// Directory holding `sigtool.json` (default: current directory).
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Output format: v1, v2, v3 or jdiff (default: same as the input).
    #[arg(long, global = true)]
    format: Option<FileFormat>,

    /// Write fully qualified type names.
    #[arg(long, global = true)]
    qualified_names: bool,

    /// Write parameter default values.
    #[arg(long, global = true)]
    include_default_values: bool,

    /// Annotation that hides the element it is applied to (repeatable).
    #[arg(long = "hide-annotation", global = true)]
    hide_annotations: Vec<String>,

    /// Annotation that shows the element it is applied to (repeatable).
    #[arg(long = "show-annotation", global = true)]
    show_annotations: Vec<String>,

    /// Path prefix or glob that may be read (repeatable).
    #[arg(long = "allow-read", global = true)]
    allowed_paths: Vec<String>,

    /// Baseline file of known issues.
    #[arg(long, global = true)]
    baseline: Option<PathBuf>,

    /// Which merge source wins a conflict: last-wins or first-wins.
    #[arg(long, global = true)]
    conflict_policy: Option<ConflictPolicy>,

    /// How issues are printed.
    #[arg(long, global = true, value_enum, default_value = "text")]
    issues_format: IssuesFormat,

    /// Log level for tracing output.
    #[arg(long, global = true, value_enum, default_value = "warn")]
    log_level: LogLevel,

    /// Log line format.
    #[arg(long, global = true, value_enum, default_value = "text")]
    log_format: LogFormat,
}

impl GlobalArgs {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            format: self.format,
            qualified_names: self.qualified_names,
            include_default_values: self.include_default_values,
            hide_annotations: self.hide_annotations.clone(),
            show_annotations: self.show_annotations.clone(),
            allowed_paths: self.allowed_paths.clone(),
            baseline: self.baseline.clone(),
            conflict_policy: self.conflict_policy,
        }
    }
}

/// Log level for tracing output.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn to_tracing_level(self) -> tracing::Level {
        match self {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

/// Log line format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    /// Human-readable lines (default).
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

/// CLI subcommands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Print the detected format of each file.
    Detect {
        /// Files to inspect.
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Print a JSON array instead of text.
        #[arg(long)]
        json: bool,
    },
    /// Re-serialize an API file.
    Convert {
        /// Signature or JDiff file.
        input: PathBuf,
        /// Write here instead of stdout.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Merge annotation sources onto an API and write the result.
    ///
    /// Sources apply in the order given; later sources override earlier ones.
    Merge {
        /// Base API file.
        base: PathBuf,
        /// Merge source as `<kind>=<path>`; kind is xml, signature, stubs or inclusion.
        #[arg(long = "source")]
        sources: Vec<SourceSpec>,
        /// Previous API; nullness new since it is written as "recently" nullness.
        #[arg(long)]
        migrate_nulls: Option<PathBuf>,
        /// Write here instead of stdout.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Report incompatible changes between two APIs.
    CheckCompat {
        /// Previously released API.
        previous: PathBuf,
        /// Current API.
        current: PathBuf,
        /// Rewrite the baseline to hold exactly the issues found.
        #[arg(long)]
        update_baseline: bool,
    },
    /// Write an API as JDiff XML.
    Jdiff {
        /// Signature or JDiff file.
        api: PathBuf,
        /// Only include classes and members that differ from this API.
        #[arg(long)]
        base: Option<PathBuf>,
        /// Value of the root `name` attribute.
        #[arg(long)]
        api_name: Option<String>,
        /// Write here instead of stdout.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Look up the API level that introduced a class or member.
    Since {
        /// "Since" XML file.
        file: PathBuf,
        /// Qualified class name.
        class: String,
        /// Method descriptor (`name(args)ret`) or field name.
        member: Option<String>,
        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_tracing(cli.global.log_level, cli.global.log_format);

    let issues_format = cli.global.issues_format;
    match execute(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let error_code = OutputErrorCode::from(&err);
            emit_error(&err, error_code, issues_format);
            ExitCode::from(error_code.code())
        }
    }
}

/// Initialize tracing subscriber.
fn init_tracing(level: LogLevel, format: LogFormat) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_tracing_level().to_string()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Print a fatal error to stderr.
fn emit_error(err: &SigError, code: OutputErrorCode, format: IssuesFormat) {
    let mut stderr = io::stderr();
    match format {
        IssuesFormat::Text => {
            let _ = writeln!(stderr, "sig: {}", err);
        }
        IssuesFormat::Json => {
            let mut error = serde_json::json!({
                "status": "error",
                "code": code.code(),
                "message": err.to_string(),
            });
            if let Some(location) = err.location() {
                error["location"] = serde_json::json!(location.to_string());
            }
            let _ = writeln!(stderr, "{}", error);
        }
    }
}

/// Execute the CLI command.
fn execute(cli: Cli) -> SigResult<()> {
    let root = match &cli.global.root {
        Some(root) => root.clone(),
        None => std::env::current_dir()?,
    };
    let config = ResolvedConfig::resolve(&root, &cli.global.overrides())?;
    let sandbox = config.sandbox()?;

    match cli.command {
        Command::Detect { files, json } => execute_detect(&files, json, &sandbox),
        Command::Convert { input, output } => {
            let text = run_convert(&input, &config, &sandbox)?;
            emit(output.as_deref(), &text)
        }
        Command::Merge {
            base,
            sources,
            migrate_nulls,
            output,
        } => {
            let request = MergeRequest {
                base,
                sources,
                migrate_nulls,
            };
            let mut reporter = open_reporter(&config, &sandbox)?;
            let text = run_merge(&request, &config, &sandbox, &mut reporter)?;
            emit(output.as_deref(), &text)?;
            finish(&reporter, cli.global.issues_format)
        }
        Command::CheckCompat {
            previous,
            current,
            update_baseline: update,
        } => {
            let mut reporter = open_reporter(&config, &sandbox)?;
            run_check_compat(&previous, &current, &sandbox, &mut reporter)?;
            if update {
                let Some(path) = config.baseline.as_ref().map(|b| &b.value) else {
                    return Err(SigError::invalid_args("--update-baseline needs a baseline file"));
                };
                update_baseline(&reporter, path)?;
                return Ok(());
            }
            finish(&reporter, cli.global.issues_format)
        }
        Command::Jdiff {
            api,
            base,
            api_name,
            output,
        } => match run_jdiff(&api, base.as_deref(), api_name, &sandbox)? {
            JdiffOutput::Document(text) => emit(output.as_deref(), &text),
            JdiffOutput::NoChange => {
                info!("no API change");
                eprintln!("no API change");
                Ok(())
            }
        },
        Command::Since {
            file,
            class,
            member,
            json,
        } => {
            let report = run_since(&file, &class, member.as_deref(), &sandbox)?;
            let text = if json {
                to_json(&report)?
            } else {
                report.to_string()
            };
            emit(None, &format!("{}\n", text))
        }
    }
}

// ============================================================================
// Command Executors
// ============================================================================

fn execute_detect(files: &[PathBuf], json: bool, sandbox: &ReadSandbox) -> SigResult<()> {
    let reports = run_detect(files, sandbox)?;
    let mut text = String::new();
    if json {
        text.push_str(&to_json(&reports)?);
        text.push('\n');
    } else {
        for report in &reports {
            text.push_str(&format!("{}: {}\n", report.file, report.format));
        }
    }
    emit(None, &text)
}

/// Print unsuppressed issues to stderr and fail on error-severity ones.
fn finish(reporter: &Reporter, format: IssuesFormat) -> SigResult<()> {
    let rendered = render_issues(reporter, format)?;
    let has_issues = !reporter.issues().is_empty();
    if has_issues || format == IssuesFormat::Json {
        let mut stderr = io::stderr();
        stderr.write_all(rendered.as_bytes())?;
        if format == IssuesFormat::Json {
            writeln!(stderr)?;
        }
    }
    reporter.check()
}

fn to_json<T: serde::Serialize>(value: &T) -> SigResult<String> {
    serde_json::to_string_pretty(value).map_err(|e| SigError::internal(e.to_string()))
}

/// Write `text` to `path`, or to stdout when no path is given.
fn emit(path: Option<&Path>, text: &str) -> SigResult<()> {
    match path {
        Some(path) => {
            std::fs::write(path, text)?;
            info!(path = %path.display(), bytes = text.len(), "wrote output");
        }
        None => {
            let mut stdout = io::stdout();
            stdout.write_all(text.as_bytes())?;
            stdout.flush()?;
        }
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    mod cli_parsing {
        use super::*;

        #[test]
        fn parse_detect_multiple_files() {
            let cli = Cli::try_parse_from(["sig", "detect", "a.txt", "b.xml"]).unwrap();
            match cli.command {
                Command::Detect { files, json } => {
                    assert_eq!(files, vec![PathBuf::from("a.txt"), PathBuf::from("b.xml")]);
                    assert!(!json);
                }
                _ => panic!("expected Detect command"),
            }
        }

        #[test]
        fn parse_detect_requires_a_file() {
            assert!(Cli::try_parse_from(["sig", "detect"]).is_err());
        }

        #[test]
        fn parse_convert_with_format() {
            let cli = Cli::try_parse_from(["sig", "convert", "api.txt", "--format", "v3", "-o", "out.txt"]).unwrap();
            assert_eq!(cli.global.format, Some(FileFormat::V3));
            match cli.command {
                Command::Convert { input, output } => {
                    assert_eq!(input, PathBuf::from("api.txt"));
                    assert_eq!(output, Some(PathBuf::from("out.txt")));
                }
                _ => panic!("expected Convert command"),
            }
        }

        #[test]
        fn parse_convert_rejects_unknown_format() {
            assert!(Cli::try_parse_from(["sig", "--format", "v9", "convert", "api.txt"]).is_err());
        }

        #[test]
        fn parse_merge_keeps_source_order() {
            let cli = Cli::try_parse_from([
                "sig",
                "merge",
                "api.txt",
                "--source",
                "inclusion=markers.txt",
                "--source",
                "xml=a.xml",
                "--hide-annotation",
                "test.pkg.Hide",
                "--conflict-policy",
                "first-wins",
            ])
            .unwrap();
            assert_eq!(cli.global.hide_annotations, vec!["test.pkg.Hide".to_string()]);
            assert_eq!(cli.global.conflict_policy, Some(ConflictPolicy::FirstWins));
            match cli.command {
                Command::Merge { base, sources, .. } => {
                    assert_eq!(base, PathBuf::from("api.txt"));
                    let paths: Vec<_> = sources.iter().map(|s| s.path.clone()).collect();
                    assert_eq!(paths, vec![PathBuf::from("markers.txt"), PathBuf::from("a.xml")]);
                }
                _ => panic!("expected Merge command"),
            }
        }

        #[test]
        fn parse_merge_rejects_bad_source() {
            assert!(Cli::try_parse_from(["sig", "merge", "api.txt", "--source", "a.xml"]).is_err());
        }

        #[test]
        fn parse_update_baseline() {
            let cli = Cli::try_parse_from([
                "sig",
                "check-compat",
                "old.txt",
                "new.txt",
                "--baseline",
                "baseline.txt",
                "--update-baseline",
            ])
            .unwrap();
            assert_eq!(cli.global.baseline, Some(PathBuf::from("baseline.txt")));
            assert!(matches!(
                cli.command,
                Command::CheckCompat {
                    update_baseline: true,
                    ..
                }
            ));
        }

        #[test]
        fn parse_jdiff_with_base() {
            let cli = Cli::try_parse_from(["sig", "jdiff", "new.txt", "--base", "old.txt", "--api-name", "android"]).unwrap();
            match cli.command {
                Command::Jdiff { base, api_name, .. } => {
                    assert_eq!(base, Some(PathBuf::from("old.txt")));
                    assert_eq!(api_name.as_deref(), Some("android"));
                }
                _ => panic!("expected Jdiff command"),
            }
        }

        #[test]
        fn parse_since_member_is_optional() {
            let cli = Cli::try_parse_from(["sig", "since", "api-versions.xml", "a.B"]).unwrap();
            assert!(matches!(cli.command, Command::Since { member: None, .. }));
        }

        #[test]
        fn parse_global_defaults() {
            let cli = Cli::try_parse_from(["sig", "detect", "a.txt"]).unwrap();
            assert!(matches!(cli.global.log_level, LogLevel::Warn));
            assert_eq!(cli.global.log_format, LogFormat::Text);
            assert_eq!(cli.global.issues_format, IssuesFormat::Text);
            assert!(cli.global.root.is_none());
        }

        #[test]
        fn parse_issues_and_log_format() {
            let cli = Cli::try_parse_from([
                "sig",
                "--issues-format",
                "json",
                "--log-format",
                "json",
                "--log-level",
                "debug",
                "detect",
                "a.txt",
            ])
            .unwrap();
            assert_eq!(cli.global.issues_format, IssuesFormat::Json);
            assert_eq!(cli.global.log_format, LogFormat::Json);
            assert!(matches!(cli.global.log_level, LogLevel::Debug));
        }
    }

    mod overrides {
        use super::*;

        #[test]
        fn global_flags_become_cli_overrides() {
            let cli = Cli::try_parse_from([
                "sig",
                "--qualified-names",
                "--allow-read",
                "api/**",
                "--show-annotation",
                "a.Show",
                "detect",
                "a.txt",
            ])
            .unwrap();
            let overrides = cli.global.overrides();
            assert!(overrides.qualified_names);
            assert!(!overrides.include_default_values);
            assert_eq!(overrides.allowed_paths, vec!["api/**".to_string()]);
            assert_eq!(overrides.show_annotations, vec!["a.Show".to_string()]);
            assert_eq!(overrides.conflict_policy, None);
        }
    }

    mod log_level {
        use super::*;

        #[test]
        fn levels_convert_to_tracing_levels() {
            assert_eq!(LogLevel::Trace.to_tracing_level(), tracing::Level::TRACE);
            assert_eq!(LogLevel::Debug.to_tracing_level(), tracing::Level::DEBUG);
            assert_eq!(LogLevel::Info.to_tracing_level(), tracing::Level::INFO);
            assert_eq!(LogLevel::Warn.to_tracing_level(), tracing::Level::WARN);
            assert_eq!(LogLevel::Error.to_tracing_level(), tracing::Level::ERROR);
        }
    }
}
