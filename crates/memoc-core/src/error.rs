//! Error types for memoc-core.

use thiserror::Error;

/// Result type for memoc-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while compiling, loading or constructing units.
#[derive(Debug, Error)]
pub enum Error {
    /// No toolchain could be located.
    #[error("toolchain unavailable: {0}")]
    ToolchainUnavailable(String),

    /// The toolchain rejected the source.
    ///
    /// `diagnostics` holds every diagnostic of the attempt, numbered and
    /// rendered by [`DiagnosticCollector::format`](crate::compile::DiagnosticCollector::format).
    #[error("compilation of `{unit}` failed:\n{diagnostics}")]
    CompilationFailed { unit: String, diagnostics: String },

    /// A unit could not be resolved by a loader or any of its parents.
    #[error("unit not found: {0}")]
    TypeNotFound(String),

    /// No constructor accepts the supplied argument types.
    #[error("no constructor of `{unit}` matches ({signature})")]
    NoMatchingConstructor { unit: String, signature: String },

    /// More than one constructor accepts the supplied argument types.
    #[error("ambiguous constructor call on `{unit}` for ({signature}): candidates are {}", candidates.join(", "))]
    AmbiguousConstructor {
        unit: String,
        signature: String,
        candidates: Vec<String>,
    },

    /// An argument was rejected before any work was done.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Artifact bytes are not a valid unit image.
    #[error("malformed artifact `{name}`: {reason}")]
    MalformedArtifact { name: String, reason: String },

    /// A constructor body failed while running.
    #[error("execution error: {0}")]
    Execution(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
