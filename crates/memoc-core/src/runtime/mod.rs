//! Unit runtime: image format, loaded types, values and constructor evaluation.
//!
//! # Architecture
//!
//! ```text
//! UnitImage (bytes in an OutputUnit)
//!     │
//!     └── loader defines ──► Arc<UnitType> ──► construct(args) ──► Instance
//!                                 │                  │
//!                                 │                  └── lowered constructor body runs
//!                                 │                      in a small interpreter
//!                                 └── resolver (defining loader) for units the
//!                                     body constructs
//! ```

mod construct;
mod image;
mod types;
mod value;

pub use construct::{ConstructorMatch, MAX_CONSTRUCT_DEPTH, select_constructor};
pub use image::{
    BinaryOp, ConstructorDecl, Expr, FORMAT_VERSION, FieldDecl, MAGIC, ParamDecl, Stmt, TypeRef,
    UnaryOp, UnitImage,
};
pub use types::UnitType;
pub use value::{Instance, Value};
