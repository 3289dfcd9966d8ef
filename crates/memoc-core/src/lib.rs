//! Core engine for memoc in-memory compilation.
//!
//! This crate provides:
//! - The compilation pipeline driving a pluggable [`Toolchain`]
//! - The unit image format and a small constructor interpreter
//! - Isolated per-compilation loaders chained to a host loader

pub mod compile;
pub mod error;
pub mod load;
pub mod runtime;

pub use compile::{
    ArtifactKind, ArtifactTable, CompilationDriver, CompilationTask, CompiledUnit, CompilerConfig,
    Diagnostic, DiagnosticCollector, DiagnosticKind, DiagnosticListener, FileManager, FileObject,
    Location, MemoryFileStore, OutputUnit, SourceUnit, Toolchain,
};
pub use error::{Error, Result};
pub use load::{HostLoader, UnitLoader, UnitResolver};
pub use runtime::{Instance, TypeRef, UnitImage, UnitType, Value};
