//! sigtool - read, write, merge and compare Java API signature files.
//!
//! This crate provides the `sig` CLI on top of `sigtool-core`.
//!
//! ## Modules
//!
//! - `cli` - command implementations used by the binary

pub mod cli;

// Re-export core types for convenience
pub use sigtool_core::config::{CliOverrides, ResolvedConfig};
pub use sigtool_core::error::{OutputErrorCode, ParseError, SigError, SigResult};
pub use sigtool_core::format::{detect, FileFormat};
pub use sigtool_core::issues::{Issue, IssueId, Reporter, Severity};
pub use sigtool_core::merge::{merge, AnnotationSource, ConflictPolicy, MergeOptions};
pub use sigtool_core::model::Codebase;
pub use sigtool_core::parser::parse;
pub use sigtool_core::writer::{write, WriterOptions};
pub use sigtool_core;
