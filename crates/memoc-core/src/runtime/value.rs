//! Runtime values and unit instances.

use std::fmt;
use std::sync::Arc;

use super::image::TypeRef;
use super::types::UnitType;

/// A runtime value held by a field, local or argument.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Object(Arc<Instance>),
}

impl Value {
    /// Runtime type of the value; `None` for [`Value::Null`].
    pub fn runtime_type(&self) -> Option<TypeRef> {
        match self {
            Self::Null => None,
            Self::Int(_) => Some(TypeRef::Int),
            Self::Float(_) => Some(TypeRef::Float),
            Self::Bool(_) => Some(TypeRef::Bool),
            Self::Str(_) => Some(TypeRef::Str),
            Self::Object(instance) => Some(TypeRef::Unit(instance.type_name().to_string())),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Arc<Instance>> {
        match self {
            Self::Object(v) => Some(v),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Str(v) => f.write_str(v),
            Self::Object(instance) => write!(f, "{instance}"),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<Instance> for Value {
    fn from(v: Instance) -> Self {
        Self::Object(Arc::new(v))
    }
}

impl From<Arc<Instance>> for Value {
    fn from(v: Arc<Instance>) -> Self {
        Self::Object(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// A constructed unit: its type plus one value per declared field.
#[derive(Debug, Clone)]
pub struct Instance {
    unit: Arc<UnitType>,
    fields: Vec<Value>,
}

impl Instance {
    pub(crate) fn new(unit: Arc<UnitType>, fields: Vec<Value>) -> Self {
        Self { unit, fields }
    }

    /// The unit this instance was constructed from.
    pub fn unit_type(&self) -> &Arc<UnitType> {
        &self.unit
    }

    pub fn type_name(&self) -> &str {
        self.unit.name()
    }

    /// Value of a field by name.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.unit.field_index(field).map(|i| &self.fields[i])
    }

    /// Field names paired with their values, in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.unit
            .fields()
            .iter()
            .map(|f| f.name.as_str())
            .zip(self.fields.iter())
    }
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {{", self.unit.simple_name())?;
        for (i, (name, value)) in self.fields().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            match value {
                Value::Str(s) => write!(f, " {name}: {s:?}")?,
                other => write!(f, " {name}: {other}")?,
            }
        }
        if self.fields.is_empty() {
            f.write_str("}")
        } else {
            f.write_str(" }")
        }
    }
}
