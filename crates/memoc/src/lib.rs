//! memoc: compile source text at runtime and load it in-process.
//!
//! memoc provides:
//! - **In-memory compilation**: sources never touch the filesystem and
//!   artifacts are captured in memory
//! - **Structured diagnostics**: every failure carries numbered, positioned
//!   diagnostics
//! - **Isolated loading**: each compilation gets its own loader, falling back
//!   to the host for shared units
//! - **Pluggable toolchains**: anything implementing [`Toolchain`]
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use memoc::prelude::*;
//!
//! let compiler = RuntimeCompiler::new()?;
//! let counter = compiler.compile_to_instance_with_args(
//!     "demo.Counter",
//!     r#"
//!         pub struct Counter { count: i64 }
//!
//!         impl Counter {
//!             pub fn starting_at(count: i64) -> Self {
//!                 Self { count }
//!             }
//!         }
//!     "#,
//!     &[Value::Int(41)],
//! )?;
//! assert_eq!(counter.get("count"), Some(&Value::Int(41)));
//! ```
//!
//! The pipeline, loaders and unit model live in `memoc-core`; the built-in
//! toolchain lives in `memoc-unitc` behind the default `unitc` feature.

mod compiler;

pub use compiler::{RuntimeCompiler, system_toolchain};

pub use memoc_core::{
    CompilationDriver, CompiledUnit, CompilerConfig, Diagnostic, DiagnosticKind, Error, HostLoader,
    Instance, Result, Toolchain, TypeRef, UnitLoader, UnitResolver, UnitType, Value,
};

#[cfg(feature = "unitc")]
pub use memoc_unitc::UnitCompiler;

pub mod prelude {
    //! Common imports for hosts.
    //!
    //! ```rust,ignore
    //! use memoc::prelude::*;
    //! ```

    pub use crate::{
        CompilerConfig, Error, HostLoader, Instance, Result, RuntimeCompiler, UnitType, Value,
    };
}
