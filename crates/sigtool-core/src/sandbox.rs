//! Read sandbox for input files.
//!
//! A [`ReadSandbox`] is an explicit context object passed to every load
//! operation. While activated, reads of paths outside its allow-list are
//! reported to a [`ReadListener`] and then performed anyway: the sandbox is
//! fail-open and exists for observability only.
//!
//! ```
//! use sigtool_core::sandbox::{ReadSandbox, RecordingListener};
//! use std::sync::Arc;
//!
//! let listener = Arc::new(RecordingListener::default());
//! let sandbox = ReadSandbox::builder()
//!     .allow_prefix("api")
//!     .listener(listener.clone())
//!     .build()
//!     .unwrap();
//! let _guard = sandbox.activate();
//! assert!(sandbox.is_allowed("api/current.txt".as_ref()));
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use globset::{Glob, GlobSet, GlobSetBuilder};
use thiserror::Error;
use tracing::{debug, warn};

// ============================================================================
// Errors
// ============================================================================

/// Errors from sandbox construction and sandboxed reads.
#[derive(Debug, Error)]
pub enum SandboxError {
    /// An allow-list glob failed to compile.
    #[error("invalid allow-list pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    /// The underlying read failed.
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

// ============================================================================
// Listener
// ============================================================================

/// Receives reads that fall outside the allow-list.
pub trait ReadListener: Send + Sync {
    fn on_violation(&self, path: &Path);
}

/// Listener that only logs.
#[derive(Debug, Default)]
pub struct LoggingListener;

impl ReadListener for LoggingListener {
    fn on_violation(&self, path: &Path) {
        warn!(path = %path.display(), "read outside allowed paths");
    }
}

/// Listener that keeps every violating path.
#[derive(Debug, Default)]
pub struct RecordingListener {
    paths: Mutex<Vec<PathBuf>>,
}

impl RecordingListener {
    pub fn violations(&self) -> Vec<PathBuf> {
        match self.paths.lock() {
            Ok(paths) => paths.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl ReadListener for RecordingListener {
    fn on_violation(&self, path: &Path) {
        match self.paths.lock() {
            Ok(mut paths) => paths.push(path.to_path_buf()),
            Err(poisoned) => poisoned.into_inner().push(path.to_path_buf()),
        }
    }
}

// ============================================================================
// Sandbox
// ============================================================================

/// Allow-list of readable paths plus a violation listener.
pub struct ReadSandbox {
    prefixes: Vec<PathBuf>,
    globs: GlobSet,
    listener: Arc<dyn ReadListener>,
    depth: AtomicUsize,
}

impl std::fmt::Debug for ReadSandbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadSandbox")
            .field("prefixes", &self.prefixes)
            .field("globs", &self.globs.len())
            .field("active", &self.is_active())
            .finish()
    }
}

impl Default for ReadSandbox {
    fn default() -> Self {
        ReadSandbox::unrestricted()
    }
}

impl ReadSandbox {
    pub fn builder() -> ReadSandboxBuilder {
        ReadSandboxBuilder::default()
    }

    /// A sandbox that is never activated by its users; every read is
    /// allowed.
    pub fn unrestricted() -> Self {
        ReadSandbox {
            prefixes: Vec::new(),
            globs: GlobSet::empty(),
            listener: Arc::new(LoggingListener),
            depth: AtomicUsize::new(0),
        }
    }

    /// Start enforcing the allow-list until the guard is dropped.
    ///
    /// Activation nests; the sandbox stays active until every guard is gone.
    pub fn activate(&self) -> SandboxGuard<'_> {
        let previous = self.depth.fetch_add(1, Ordering::SeqCst);
        debug!(depth = previous + 1, "sandbox activated");
        SandboxGuard { sandbox: self }
    }

    pub fn is_active(&self) -> bool {
        self.depth.load(Ordering::SeqCst) > 0
    }

    /// Whether `path` is on the allow-list. An empty allow-list allows
    /// nothing.
    pub fn is_allowed(&self, path: &Path) -> bool {
        let normalized = normalize(path);
        self.prefixes.iter().any(|p| normalized.starts_with(p)) || self.globs.is_match(&normalized)
    }

    /// Report `path` to the listener if the sandbox is active and the path
    /// is not allowed.
    pub fn check(&self, path: &Path) {
        if self.is_active() && !self.is_allowed(path) {
            self.listener.on_violation(path);
        }
    }

    /// Read a file as UTF-8 text, checking it against the allow-list first.
    pub fn read_to_string(&self, path: &Path) -> Result<String, SandboxError> {
        self.check(path);
        fs::read_to_string(path).map_err(|source| SandboxError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Strip `.` components so `./api/x` and `api/x` compare equal.
fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, std::path::Component::CurDir))
        .collect()
}

/// Deactivates its sandbox on drop.
#[must_use = "the sandbox is deactivated when the guard is dropped"]
pub struct SandboxGuard<'a> {
    sandbox: &'a ReadSandbox,
}

impl Drop for SandboxGuard<'_> {
    fn drop(&mut self) {
        let previous = self.sandbox.depth.fetch_sub(1, Ordering::SeqCst);
        debug!(depth = previous.saturating_sub(1), "sandbox released");
    }
}

/// Builder for [`ReadSandbox`].
#[derive(Default)]
pub struct ReadSandboxBuilder {
    prefixes: Vec<PathBuf>,
    patterns: Vec<String>,
    listener: Option<Arc<dyn ReadListener>>,
}

impl ReadSandboxBuilder {
    pub fn allow_prefix(mut self, prefix: impl Into<PathBuf>) -> Self {
        self.prefixes.push(normalize(&prefix.into()));
        self
    }

    /// Allow paths matching a glob such as `**/*.txt`.
    pub fn allow_glob(mut self, pattern: impl Into<String>) -> Self {
        self.patterns.push(pattern.into());
        self
    }

    /// Add an entry that is a glob if it contains glob metacharacters and a
    /// path prefix otherwise.
    pub fn allow(self, entry: &str) -> Self {
        if entry.contains(['*', '?', '[', '{']) {
            self.allow_glob(entry)
        } else {
            self.allow_prefix(entry)
        }
    }

    pub fn listener(mut self, listener: Arc<dyn ReadListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn build(self) -> Result<ReadSandbox, SandboxError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.patterns {
            let glob = Glob::new(pattern).map_err(|source| SandboxError::InvalidPattern {
                pattern: pattern.clone(),
                source,
            })?;
            builder.add(glob);
        }
        let globs = builder.build().map_err(|source| SandboxError::InvalidPattern {
            pattern: self.patterns.join(","),
            source,
        })?;
        Ok(ReadSandbox {
            prefixes: self.prefixes,
            globs,
            listener: self.listener.unwrap_or_else(|| Arc::new(LoggingListener)),
            depth: AtomicUsize::new(0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn recording(entries: &[&str]) -> (ReadSandbox, Arc<RecordingListener>) {
        let listener = Arc::new(RecordingListener::default());
        let mut builder = ReadSandbox::builder().listener(listener.clone());
        for entry in entries {
            builder = builder.allow(entry);
        }
        (builder.build().unwrap(), listener)
    }

    #[test]
    fn prefixes_and_globs_are_allowed() {
        let (sandbox, _) = recording(&["api", "**/*.xml"]);
        assert!(sandbox.is_allowed(Path::new("./api/current.txt")));
        assert!(sandbox.is_allowed(Path::new("overlays/nullness.xml")));
        assert!(!sandbox.is_allowed(Path::new("secret/keys.txt")));
    }

    #[test]
    fn violations_are_reported_only_while_active() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("api.txt");
        fs::write(&file, "package a {\n}\n").unwrap();
        let (sandbox, listener) = recording(&["nowhere"]);

        sandbox.read_to_string(&file).unwrap();
        assert!(listener.violations().is_empty());

        {
            let _guard = sandbox.activate();
            let text = sandbox.read_to_string(&file).unwrap();
            assert!(text.starts_with("package a"));
        }
        assert_eq!(listener.violations(), vec![file.clone()]);
        assert!(!sandbox.is_active());
    }

    #[test]
    fn activation_nests() {
        let (sandbox, _) = recording(&[]);
        let outer = sandbox.activate();
        {
            let _inner = sandbox.activate();
            assert!(sandbox.is_active());
        }
        assert!(sandbox.is_active());
        drop(outer);
        assert!(!sandbox.is_active());
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let sandbox = ReadSandbox::unrestricted();
        let err = sandbox
            .read_to_string(Path::new("/definitely/not/here.txt"))
            .unwrap_err();
        assert!(matches!(err, SandboxError::Io { .. }));
    }

    #[test]
    fn bad_glob_is_rejected() {
        let err = ReadSandbox::builder().allow_glob("a[").build().unwrap_err();
        assert!(matches!(err, SandboxError::InvalidPattern { .. }));
    }
}
