//! Core infrastructure for sigtool.
//!
//! This crate provides the API-surface toolkit behind the `sig` CLI:
//! - In-memory API model (packages, classes, members, types, annotations)
//! - Format detection and the signature-file tokenizer, parser and writer
//! - Annotation merging from XML overlays, signature files and inclusion markers
//! - JDiff XML output and input, and the "since" API-level reader
//! - Compatibility and hidden-reference checks, issue reporting, baselines
//! - Layered configuration and sandboxed file reads
//! - Error types and error codes

pub mod baseline;
pub mod checks;
pub mod compat;
pub mod config;
pub mod error;
pub mod format;
pub mod issues;
pub mod jdiff;
pub mod load;
pub mod merge;
pub mod model;
pub mod parser;
pub mod sandbox;
pub mod since;
pub mod text;
pub mod tokenizer;
pub mod types;
pub mod writer;
pub mod xml;

pub use error::{OutputErrorCode, ParseError, SigError, SigResult};
pub use format::{detect, FileFormat};
pub use load::{load_codebase, LoadedApi};
pub use model::Codebase;
pub use parser::parse;
pub use writer::{write, WriterOptions};
