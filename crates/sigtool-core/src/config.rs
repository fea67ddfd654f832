//! Layered configuration.
//!
//! Values are resolved from four sources, each overriding the previous:
//! built-in defaults, the project file `sigtool.json`, `SIGTOOL_*`
//! environment variables, and CLI flags. Every resolved value remembers
//! where it came from.
//!
//! ```json
//! {
//!   "format": "v3",
//!   "qualified_names": false,
//!   "include_default_values": false,
//!   "hide_annotations": ["androidx.annotation.RestrictTo"],
//!   "show_annotations": [],
//!   "allowed_paths": ["api/**", "/opt/sdk"],
//!   "baseline": "api/baseline.txt",
//!   "conflict_policy": "last-wins"
//! }
//! ```

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::format::FileFormat;
use crate::merge::{ConflictPolicy, MergeOptions};
use crate::sandbox::{ReadSandbox, SandboxError};
use crate::writer::WriterOptions;

/// Name of the project configuration file.
pub const PROJECT_CONFIG_FILE: &str = "sigtool.json";

pub const ENV_FORMAT: &str = "SIGTOOL_FORMAT";
pub const ENV_HIDE_ANNOTATIONS: &str = "SIGTOOL_HIDE_ANNOTATIONS";
pub const ENV_SHOW_ANNOTATIONS: &str = "SIGTOOL_SHOW_ANNOTATIONS";
pub const ENV_ALLOWED_PATHS: &str = "SIGTOOL_ALLOWED_PATHS";
pub const ENV_BASELINE: &str = "SIGTOOL_BASELINE";
pub const ENV_CONFLICT_POLICY: &str = "SIGTOOL_CONFLICT_POLICY";

// ============================================================================
// Errors
// ============================================================================

/// Configuration could not be loaded or a value is invalid.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid value '{value}' for {key}: {message}")]
    InvalidValue {
        key: String,
        value: String,
        message: String,
    },
}

// ============================================================================
// Configuration Sources
// ============================================================================

/// Configuration value source (for precedence tracking).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfigSource {
    /// Built-in default value.
    Default = 0,
    /// From `sigtool.json`.
    ProjectConfig = 1,
    /// From environment variable.
    EnvVar = 2,
    /// From CLI flag (highest precedence).
    CliFlag = 3,
}

/// A configuration value with its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        ConfigValue { value, source }
    }

    /// Merge with another value, preferring higher precedence.
    pub fn merge(self, other: Self) -> Self {
        if other.source >= self.source {
            other
        } else {
            self
        }
    }
}

// ============================================================================
// Project File
// ============================================================================

/// Contents of `sigtool.json`. Every key is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectConfig {
    pub format: Option<String>,
    pub qualified_names: Option<bool>,
    pub include_default_values: Option<bool>,
    pub hide_annotations: Option<Vec<String>>,
    pub show_annotations: Option<Vec<String>>,
    pub allowed_paths: Option<Vec<String>>,
    pub baseline: Option<PathBuf>,
    pub conflict_policy: Option<String>,
}

impl ProjectConfig {
    pub fn load(path: &Path) -> Result<ProjectConfig, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
    }
}

// ============================================================================
// Configuration Resolution
// ============================================================================

/// Resolved configuration with precedence information.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Output format; unset means "same as the input".
    pub format: Option<ConfigValue<FileFormat>>,
    pub qualified_names: ConfigValue<bool>,
    pub include_default_values: ConfigValue<bool>,
    pub hide_annotations: Vec<ConfigValue<String>>,
    pub show_annotations: Vec<ConfigValue<String>>,
    /// Sandbox allow-list; empty means reads are not restricted.
    pub allowed_paths: Vec<ConfigValue<String>>,
    pub baseline: Option<ConfigValue<PathBuf>>,
    pub conflict_policy: ConfigValue<ConflictPolicy>,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        ResolvedConfig {
            format: None,
            qualified_names: ConfigValue::new(false, ConfigSource::Default),
            include_default_values: ConfigValue::new(false, ConfigSource::Default),
            hide_annotations: Vec::new(),
            show_annotations: Vec::new(),
            allowed_paths: Vec::new(),
            baseline: None,
            conflict_policy: ConfigValue::new(ConflictPolicy::LastWins, ConfigSource::Default),
        }
    }
}

impl ResolvedConfig {
    /// Resolve configuration from all sources.
    ///
    /// Precedence (highest to lowest):
    /// 1. CLI flags
    /// 2. Environment variables
    /// 3. Project config (`sigtool.json` in `root`)
    /// 4. Defaults
    pub fn resolve(root: &Path, cli_overrides: &CliOverrides) -> Result<Self, ConfigError> {
        Self::resolve_with_env(root, cli_overrides, |key| std::env::var(key).ok())
    }

    /// [`ResolvedConfig::resolve`] with an explicit environment lookup.
    pub fn resolve_with_env(
        root: &Path,
        cli_overrides: &CliOverrides,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = ResolvedConfig::default();

        let project_path = root.join(PROJECT_CONFIG_FILE);
        if project_path.is_file() {
            let project = ProjectConfig::load(&project_path)?;
            config.apply_project_config(&project, root)?;
            debug!(path = %project_path.display(), "applied project config");
        }

        config.apply_env_vars(env)?;
        config.apply_cli_overrides(cli_overrides);
        Ok(config)
    }

    fn apply_project_config(&mut self, project: &ProjectConfig, root: &Path) -> Result<(), ConfigError> {
        let source = ConfigSource::ProjectConfig;
        if let Some(format) = &project.format {
            self.format = Some(ConfigValue::new(parse_value("format", format)?, source));
        }
        if let Some(qualified) = project.qualified_names {
            self.qualified_names = self.qualified_names.clone().merge(ConfigValue::new(qualified, source));
        }
        if let Some(defaults) = project.include_default_values {
            self.include_default_values = self
                .include_default_values
                .clone()
                .merge(ConfigValue::new(defaults, source));
        }
        if let Some(names) = &project.hide_annotations {
            self.hide_annotations = tagged(names.iter().cloned(), source);
        }
        if let Some(names) = &project.show_annotations {
            self.show_annotations = tagged(names.iter().cloned(), source);
        }
        if let Some(paths) = &project.allowed_paths {
            self.allowed_paths = tagged(paths.iter().cloned(), source);
        }
        if let Some(baseline) = &project.baseline {
            self.baseline = Some(ConfigValue::new(root.join(baseline), source));
        }
        if let Some(policy) = &project.conflict_policy {
            self.conflict_policy = ConfigValue::new(parse_value("conflict_policy", policy)?, source);
        }
        Ok(())
    }

    fn apply_env_vars(&mut self, env: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        let source = ConfigSource::EnvVar;
        if let Some(format) = env(ENV_FORMAT) {
            self.format = Some(ConfigValue::new(parse_value(ENV_FORMAT, &format)?, source));
        }
        if let Some(names) = env(ENV_HIDE_ANNOTATIONS) {
            self.hide_annotations = tagged(split_list(&names), source);
        }
        if let Some(names) = env(ENV_SHOW_ANNOTATIONS) {
            self.show_annotations = tagged(split_list(&names), source);
        }
        if let Some(paths) = env(ENV_ALLOWED_PATHS) {
            self.allowed_paths = tagged(split_list(&paths), source);
        }
        if let Some(baseline) = env(ENV_BASELINE) {
            self.baseline = Some(ConfigValue::new(PathBuf::from(baseline), source));
        }
        if let Some(policy) = env(ENV_CONFLICT_POLICY) {
            self.conflict_policy = ConfigValue::new(parse_value(ENV_CONFLICT_POLICY, &policy)?, source);
        }
        Ok(())
    }

    fn apply_cli_overrides(&mut self, overrides: &CliOverrides) {
        let source = ConfigSource::CliFlag;
        if let Some(format) = overrides.format {
            self.format = Some(ConfigValue::new(format, source));
        }
        if overrides.qualified_names {
            self.qualified_names = ConfigValue::new(true, source);
        }
        if overrides.include_default_values {
            self.include_default_values = ConfigValue::new(true, source);
        }
        if !overrides.hide_annotations.is_empty() {
            self.hide_annotations = tagged(overrides.hide_annotations.iter().cloned(), source);
        }
        if !overrides.show_annotations.is_empty() {
            self.show_annotations = tagged(overrides.show_annotations.iter().cloned(), source);
        }
        if !overrides.allowed_paths.is_empty() {
            self.allowed_paths = tagged(overrides.allowed_paths.iter().cloned(), source);
        }
        if let Some(baseline) = &overrides.baseline {
            self.baseline = Some(ConfigValue::new(baseline.clone(), source));
        }
        if let Some(policy) = overrides.conflict_policy {
            self.conflict_policy = ConfigValue::new(policy, source);
        }
    }

    /// Writer switches from the resolved values.
    pub fn writer_options(&self) -> WriterOptions {
        WriterOptions {
            qualified_names: self.qualified_names.value,
            include_default_values: self.include_default_values.value,
            ..WriterOptions::default()
        }
    }

    /// Merge options from the resolved values.
    pub fn merge_options(&self) -> MergeOptions {
        MergeOptions {
            hide_annotations: values(&self.hide_annotations),
            show_annotations: values(&self.show_annotations),
            migrate_nulls: None,
            conflict_policy: self.conflict_policy.value,
        }
    }

    /// The read sandbox described by `allowed_paths`.
    pub fn sandbox(&self) -> Result<ReadSandbox, SandboxError> {
        if self.allowed_paths.is_empty() {
            return Ok(ReadSandbox::unrestricted());
        }
        self.allowed_paths
            .iter()
            .fold(ReadSandbox::builder(), |builder, entry| builder.allow(&entry.value))
            .build()
    }
}

/// CLI configuration overrides.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    /// --format flag.
    pub format: Option<FileFormat>,
    /// --qualified-names flag.
    pub qualified_names: bool,
    /// --include-default-values flag.
    pub include_default_values: bool,
    /// --hide-annotation flags.
    pub hide_annotations: Vec<String>,
    /// --show-annotation flags.
    pub show_annotations: Vec<String>,
    /// --allow-read flags.
    pub allowed_paths: Vec<String>,
    /// --baseline flag.
    pub baseline: Option<PathBuf>,
    /// --conflict-policy flag.
    pub conflict_policy: Option<ConflictPolicy>,
}

fn parse_value<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        message: e.to_string(),
    })
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn tagged(values: impl IntoIterator<Item = String>, source: ConfigSource) -> Vec<ConfigValue<String>> {
    values.into_iter().map(|v| ConfigValue::new(v, source)).collect()
}

fn values(list: &[ConfigValue<String>]) -> Vec<String> {
    list.iter().map(|v| v.value.clone()).collect()
}
