//! Error types and error code constants for sigtool.
//!
//! This module provides a unified error type (`SigError`) that bridges
//! domain-specific errors from the different subsystems (parsing, merging,
//! sandboxed reads, configuration) into a common format suitable for CLI output.
//!
//! ## Error Code Mapping
//!
//! - `2`: Invalid arguments (bad input from caller)
//! - `3`: Parse/format errors (malformed signature, XML or baseline file)
//! - `4`: Merge errors (unresolvable inclusion markers, malformed sources)
//! - `5`: Issues at error severity were reported
//! - `10`: Internal errors (IO failures, unexpected state)
//!
//! ## Design
//!
//! - **Unified type**: `SigError` is the single error type surfaced by the CLI
//! - **Bridging**: `#[from]` conversions lift subsystem errors into `SigError`
//! - **Code mapping**: `OutputErrorCode` provides stable integer codes

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;
use crate::merge::MergeError;
use crate::model::ModelError;
use crate::sandbox::SandboxError;
use crate::since::SinceError;
use crate::types::Location;
use crate::xml::XmlError;

// ============================================================================
// Output Error Codes
// ============================================================================

/// Error codes used as process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OutputErrorCode {
    /// Invalid arguments from caller (bad input, malformed request).
    InvalidArguments = 2,
    /// Malformed input file.
    ParseError = 3,
    /// Merge could not be completed.
    MergeError = 4,
    /// Unsuppressed error-severity issues were reported.
    IssuesReported = 5,
    /// Internal errors (bugs, unexpected state, IO).
    InternalError = 10,
}

impl OutputErrorCode {
    /// Get the numeric code value.
    pub fn code(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for OutputErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

// ============================================================================
// Parse Errors
// ============================================================================

/// A fatal error while reading a signature, XML, baseline or marker file.
///
/// Parse errors abort the load of the file that triggered them; no partial
/// model is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{location}: {message}")]
pub struct ParseError {
    /// Where the error was detected.
    pub location: Location,
    /// Human-readable description.
    pub message: String,
}

impl ParseError {
    /// Create a parse error at a location.
    pub fn new(location: Location, message: impl Into<String>) -> Self {
        ParseError {
            location,
            message: message.into(),
        }
    }

    /// Create a parse error at a byte offset within `content`.
    pub fn at_offset(
        file: &str,
        content: &str,
        offset: usize,
        message: impl Into<String>,
    ) -> Self {
        let (line, col) = crate::text::byte_offset_to_position(content, offset);
        ParseError::new(Location::new(file, line, col), message)
    }
}

// ============================================================================
// Unified Error Type
// ============================================================================

/// Unified error type for CLI output.
#[derive(Debug, Error)]
pub enum SigError {
    /// Invalid arguments from caller.
    #[error("invalid arguments: {message}")]
    InvalidArguments { message: String },

    /// Malformed signature/baseline/marker file.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// Malformed XML input.
    #[error("xml error: {0}")]
    Xml(#[from] XmlError),

    /// Malformed "since" file.
    #[error("since file error: {0}")]
    Since(#[from] SinceError),

    /// Model invariant violated while building a codebase.
    #[error("model error: {0}")]
    Model(#[from] ModelError),

    /// Merge failed.
    #[error("merge error: {0}")]
    Merge(#[from] MergeError),

    /// Configuration could not be resolved.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Sandboxed read failed.
    #[error("{0}")]
    Sandbox(#[from] SandboxError),

    /// The requested format cannot be produced by this operation.
    #[error("unsupported format '{format}' for {operation}")]
    UnsupportedFormat { format: String, operation: String },

    /// File not found.
    #[error("file not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    /// Error-severity issues were reported.
    #[error("{count} error(s) reported")]
    IssuesReported { count: usize },

    /// IO error outside of sandboxed reads.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// Internal error (bug or unexpected state).
    #[error("internal error: {message}")]
    InternalError { message: String },
}

/// Result alias used throughout the core.
pub type SigResult<T> = Result<T, SigError>;

// ============================================================================
// Error Code Mapping
// ============================================================================

impl From<&SigError> for OutputErrorCode {
    fn from(err: &SigError) -> Self {
        match err {
            SigError::InvalidArguments { .. } => OutputErrorCode::InvalidArguments,
            SigError::UnsupportedFormat { .. } => OutputErrorCode::InvalidArguments,
            SigError::Config(_) => OutputErrorCode::InvalidArguments,
            SigError::FileNotFound { .. } => OutputErrorCode::InvalidArguments,
            SigError::Parse(_) => OutputErrorCode::ParseError,
            SigError::Xml(_) => OutputErrorCode::ParseError,
            SigError::Since(_) => OutputErrorCode::ParseError,
            SigError::Model(_) => OutputErrorCode::ParseError,
            SigError::Merge(_) => OutputErrorCode::MergeError,
            SigError::IssuesReported { .. } => OutputErrorCode::IssuesReported,
            SigError::Sandbox(_) => OutputErrorCode::InternalError,
            SigError::Io(_) => OutputErrorCode::InternalError,
            SigError::InternalError { .. } => OutputErrorCode::InternalError,
        }
    }
}

impl From<SigError> for OutputErrorCode {
    fn from(err: SigError) -> Self {
        OutputErrorCode::from(&err)
    }
}

// ============================================================================
// Convenience Constructors
// ============================================================================

impl SigError {
    /// Create an invalid arguments error.
    pub fn invalid_args(message: impl Into<String>) -> Self {
        SigError::InvalidArguments {
            message: message.into(),
        }
    }

    /// Create an unsupported format error.
    pub fn unsupported_format(format: impl fmt::Display, operation: impl Into<String>) -> Self {
        SigError::UnsupportedFormat {
            format: format.to_string(),
            operation: operation.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        SigError::InternalError {
            message: message.into(),
        }
    }

    /// Location associated with the error, if any.
    pub fn location(&self) -> Option<&Location> {
        match self {
            SigError::Parse(err) => Some(&err.location),
            SigError::Xml(err) => Some(&err.location),
            SigError::Since(SinceError::Xml(err)) => Some(&err.location),
            SigError::Since(SinceError::Format(err)) => Some(&err.location),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_display_includes_location() {
        let err = ParseError::new(Location::new("api.txt", 4, 9), "expected ';'");
        assert_eq!(err.to_string(), "api.txt:4:9: expected ';'");
    }

    #[test]
    fn parse_error_at_offset_computes_position() {
        let content = "package a {\n  class\n}";
        let err = ParseError::at_offset("x.txt", content, content.find("class").unwrap(), "bad");
        assert_eq!(err.location, Location::new("x.txt", 2, 3));
    }

    #[test]
    fn error_codes_map_by_category() {
        let parse: SigError = ParseError::new(Location::file_start("f"), "m").into();
        assert_eq!(OutputErrorCode::from(&parse), OutputErrorCode::ParseError);
        assert_eq!(
            OutputErrorCode::from(&SigError::invalid_args("x")).code(),
            2
        );
        assert_eq!(
            OutputErrorCode::from(SigError::IssuesReported { count: 1 }).code(),
            5
        );
        assert_eq!(
            OutputErrorCode::from(&SigError::internal("boom")),
            OutputErrorCode::InternalError
        );
    }

    #[test]
    fn location_is_exposed_for_parse_errors() {
        let err: SigError = ParseError::new(Location::new("a", 1, 2), "m").into();
        assert_eq!(err.location(), Some(&Location::new("a", 1, 2)));
        assert_eq!(SigError::internal("x").location(), None);
    }
}
