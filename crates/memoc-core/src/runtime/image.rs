//! Binary unit image format.
//!
//! A unit image is what a toolchain writes into an output unit and what the
//! loader decodes when it defines a unit:
//!
//! ```text
//! +------+---------+---------------------------+
//! | MEMU | version | bincode(UnitImage)        |
//! | 4 B  | u16 LE  | standard config           |
//! +------+---------+---------------------------+
//! ```

use std::fmt;

use bincode::{Decode, Encode};

use crate::error::{Error, Result};

/// Magic bytes at the start of every unit image.
pub const MAGIC: [u8; 4] = *b"MEMU";

/// Current image format version.
pub const FORMAT_VERSION: u16 = 1;

const HEADER_LEN: usize = MAGIC.len() + 2;

/// Static type of a field, parameter or expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Encode, Decode)]
pub enum TypeRef {
    Int,
    Float,
    Bool,
    Str,
    /// Another unit, by fully qualified dotted name.
    Unit(String),
}

impl TypeRef {
    /// Whether this is one of the primitive types.
    pub fn is_primitive(&self) -> bool {
        !matches!(self, Self::Unit(_))
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int => f.write_str("i64"),
            Self::Float => f.write_str("f64"),
            Self::Bool => f.write_str("bool"),
            Self::Str => f.write_str("String"),
            Self::Unit(name) => f.write_str(name),
        }
    }
}

/// A declared field.
#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct FieldDecl {
    pub name: String,
    pub ty: TypeRef,
}

/// A constructor parameter.
#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct ParamDecl {
    pub name: String,
    pub ty: TypeRef,
}

/// A lowered constructor.
///
/// Parameters occupy local slots `0..params.len()`; `let` bindings follow.
/// `init` holds one expression per field, in field declaration order.
#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct ConstructorDecl {
    pub name: String,
    pub params: Vec<ParamDecl>,
    pub locals: u32,
    pub body: Vec<Stmt>,
    pub init: Vec<Expr>,
}

impl ConstructorDecl {
    /// Parameter types in declaration order.
    pub fn param_types(&self) -> impl Iterator<Item = &TypeRef> {
        self.params.iter().map(|p| &p.ty)
    }

    /// Render as `name(i64, String)`.
    pub fn signature(&self) -> String {
        let params: Vec<String> = self.param_types().map(ToString::to_string).collect();
        format!("{}({})", self.name, params.join(", "))
    }
}

#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub enum Stmt {
    Let { slot: u32, value: Expr },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Concat,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

/// Lowered expression tree.
#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub enum Expr {
    Null,
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Local(u32),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Cast(Box<Expr>, TypeRef),
    ToString(Box<Expr>),
    Len(Box<Expr>),
    Construct {
        unit: String,
        constructor: String,
        args: Vec<Expr>,
    },
}

/// Everything the loader needs to define one unit.
#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct UnitImage {
    /// Fully qualified dotted name.
    pub name: String,
    /// URI of the source the image was compiled from.
    pub source: String,
    pub fields: Vec<FieldDecl>,
    pub constructors: Vec<ConstructorDecl>,
}

impl UnitImage {
    /// Encode with header.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let payload = bincode::encode_to_vec(self, bincode::config::standard()).map_err(|e| {
            Error::MalformedArtifact {
                name: self.name.clone(),
                reason: e.to_string(),
            }
        })?;

        let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
        bytes.extend_from_slice(&MAGIC);
        bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        bytes.extend_from_slice(&payload);
        Ok(bytes)
    }

    /// Decode an image, checking header and that the embedded name is `name`.
    pub fn decode(name: &str, bytes: &[u8]) -> Result<Self> {
        let malformed = |reason: String| Error::MalformedArtifact {
            name: name.to_string(),
            reason,
        };

        if bytes.len() < HEADER_LEN || bytes[..MAGIC.len()] != MAGIC {
            return Err(malformed("missing unit image header".to_string()));
        }

        let version = u16::from_le_bytes([bytes[4], bytes[5]]);
        if version != FORMAT_VERSION {
            return Err(malformed(format!(
                "unsupported format version {version} (expected {FORMAT_VERSION})"
            )));
        }

        let (image, read): (UnitImage, usize) =
            bincode::decode_from_slice(&bytes[HEADER_LEN..], bincode::config::standard())
                .map_err(|e| malformed(e.to_string()))?;

        if read != bytes.len() - HEADER_LEN {
            return Err(malformed(format!(
                "{} trailing bytes after image",
                bytes.len() - HEADER_LEN - read
            )));
        }
        if image.name != name {
            return Err(malformed(format!("image declares unit `{}`", image.name)));
        }

        Ok(image)
    }
}
