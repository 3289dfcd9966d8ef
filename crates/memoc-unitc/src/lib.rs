//! Built-in toolchain for the memoc unit dialect.
//!
//! A unit is a Rust-syntax source file declaring structs and their
//! constructors:
//!
//! ```text
//! use geom::Point;
//!
//! pub struct Marker {
//!     at: Point,
//!     label: String,
//! }
//!
//! impl Marker {
//!     pub fn new(x: i64) -> Self {
//!         let label = "x=".to_string() + &x.to_string();
//!         Self { at: Point::at(x, 0), label }
//!     }
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   syn    ┌─────────────┐        ┌──────────────┐
//! │  SourceUnit  │ ───────► │   collect   │ ─────► │    lower     │
//! │  (unit text) │          │ items, uses │        │ types, IR    │
//! └──────────────┘          └─────────────┘        └──────┬───────┘
//!                                  │                      │ UnitImage
//!                                  ▼                      ▼
//!                           ┌─────────────┐        ┌──────────────┐
//!                           │  class path │        │ FileManager  │
//!                           │  .unit files│        │  get_output  │
//!                           └─────────────┘        └──────────────┘
//! ```
//!
//! Supported: integer, float, `bool` and `String` fields, fields of other
//! unit types, inherent constructors returning `Self`, `impl Default`,
//! `let` bindings, arithmetic, comparisons, casts between numeric types,
//! `to_string`, `len` and calls to other units' constructors. Everything
//! else is rejected with a positioned diagnostic.
//!
//! Options: `-nowarn`, `-Werror`, the class-path flags and
//! [`OUTPUT_DIR_FLAG`].

pub mod codes;
mod collect;
mod compiler;
mod file_manager;
mod lower;
mod session;

pub use compiler::{DENY_WARNINGS_FLAG, NOWARN_FLAG, UnitCompiler};
pub use file_manager::{OUTPUT_DIR_FLAG, StandardFileManager};
