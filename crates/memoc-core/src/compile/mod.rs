//! In-memory compilation pipeline.
//!
//! This module provides:
//! - Source units addressed by synthetic `memo:///` URIs
//! - A file manager decorator capturing every output in memory
//! - Diagnostics collection with numbered, human-readable rendering
//! - Class-path merging for dependencies loaded from disk
//! - The driver tying one toolchain invocation to one artifact table
//!
//! # Architecture
//!
//! ```text
//! (name, source) ──► SourceUnit ──┐
//!                                 ├──► Toolchain::compile ──► DiagnosticCollector
//! options + dependency origins ───┘          │
//!                                            └── MemoryFileStore::get_output
//!                                                       │
//!                                                       └──► ArtifactTable ──► UnitLoader
//! ```

mod config;
mod diagnostics;
mod driver;
mod file_store;
mod options;
mod output;
mod source;
mod toolchain;

pub use config::{CompilerConfig, OPTIONS_ENV, parse_options};
pub use diagnostics::{
    Diagnostic, DiagnosticCollector, DiagnosticKind, DiagnosticListener, Position,
};
pub use driver::{CompilationDriver, CompiledUnit, validate_logical_name};
pub use file_store::MemoryFileStore;
pub use options::{
    CLASS_PATH_FLAG, CLASS_PATH_FLAGS, PATH_SEPARATOR, dependency_origins, merge_class_path,
    split_class_path,
};
pub use output::{ArtifactTable, OutputUnit};
pub use source::{MEMORY_SCHEME, SourceUnit, memory_uri};
pub use toolchain::{ArtifactKind, CompilationTask, FileManager, FileObject, Location, Toolchain};
