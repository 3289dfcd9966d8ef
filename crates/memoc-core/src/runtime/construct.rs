//! Constructor selection and evaluation of lowered constructor bodies.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::error::{Error, Result};

use super::image::{BinaryOp, ConstructorDecl, Expr, Stmt, TypeRef, UnaryOp};
use super::types::UnitType;
use super::value::{Instance, Value};

/// Maximum nesting of constructor calls inside constructor bodies.
pub const MAX_CONSTRUCT_DEPTH: usize = 64;

/// Outcome of matching argument types against a unit's constructors.
#[derive(Debug)]
pub enum ConstructorMatch<'a> {
    Unique(&'a ConstructorDecl),
    NoMatch,
    Ambiguous(Vec<&'a ConstructorDecl>),
}

/// Find the constructors whose parameters accept `args` positionally.
///
/// Primitive parameters match the argument's runtime type. A unit-typed
/// parameter matches only an instance of the very unit its name resolves to
/// through `unit`'s loader; a same-named unit defined by another loader is a
/// different type.
pub fn select_constructor<'a>(unit: &'a Arc<UnitType>, args: &[Value]) -> Result<ConstructorMatch<'a>> {
    let mut matches: Vec<&ConstructorDecl> = Vec::new();
    for ctor in unit.constructors() {
        if ctor.params.len() == args.len() && accepts_all(unit, ctor, args, false)? {
            matches.push(ctor);
        }
    }

    Ok(match matches.len() {
        0 => ConstructorMatch::NoMatch,
        1 => ConstructorMatch::Unique(matches.remove(0)),
        _ => ConstructorMatch::Ambiguous(matches),
    })
}

fn accepts_all(unit: &Arc<UnitType>, ctor: &ConstructorDecl, args: &[Value], nullable: bool) -> Result<bool> {
    for (param, arg) in ctor.params.iter().zip(args) {
        if !accepts(unit, &param.ty, arg, nullable)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn accepts(unit: &Arc<UnitType>, param: &TypeRef, arg: &Value, nullable: bool) -> Result<bool> {
    match (param, arg) {
        (TypeRef::Unit(name), Value::Object(instance)) => {
            if instance.type_name() != name {
                return Ok(false);
            }
            let expected = if name == unit.name() {
                Arc::clone(unit)
            } else {
                match unit.resolver().resolve(name) {
                    Ok(expected) => expected,
                    Err(Error::TypeNotFound(_)) => return Ok(false),
                    Err(e) => return Err(e),
                }
            };
            Ok(Arc::ptr_eq(&expected, instance.unit_type()))
        }
        (_, Value::Null) => Ok(nullable && !param.is_primitive()),
        _ => Ok(arg.runtime_type().as_ref() == Some(param)),
    }
}

/// Render argument types as `i64, String`.
fn render_signature(types: &[TypeRef]) -> String {
    types
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Runtime types of `args`, rejecting nulls.
fn argument_types(args: &[Value]) -> Result<Vec<TypeRef>> {
    args.iter()
        .enumerate()
        .map(|(i, arg)| {
            arg.runtime_type().ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "argument {} is null; a constructor cannot be selected from a null value",
                    i + 1
                ))
            })
        })
        .collect()
}

pub(crate) fn construct(unit: &Arc<UnitType>, args: &[Value]) -> Result<Instance> {
    let arg_types = argument_types(args)?;

    match select_constructor(unit, args)? {
        ConstructorMatch::Unique(ctor) => {
            tracing::debug!("Constructing {} via {}", unit.name(), ctor.signature());
            run(unit, ctor, args.to_vec(), 0)
        }
        ConstructorMatch::NoMatch => Err(Error::NoMatchingConstructor {
            unit: unit.name().to_string(),
            signature: render_signature(&arg_types),
        }),
        ConstructorMatch::Ambiguous(candidates) => Err(Error::AmbiguousConstructor {
            unit: unit.name().to_string(),
            signature: render_signature(&arg_types),
            candidates: candidates.iter().map(|c| c.signature()).collect(),
        }),
    }
}

pub(crate) fn construct_named(unit: &Arc<UnitType>, name: &str, args: &[Value]) -> Result<Instance> {
    let ctor = unit
        .constructor(name)
        .ok_or_else(|| Error::NoMatchingConstructor {
            unit: unit.name().to_string(),
            signature: format!("{name}(..)"),
        })?;

    let accepted = ctor.params.len() == args.len() && accepts_all(unit, ctor, args, true)?;
    if !accepted {
        let types: Vec<String> = args
            .iter()
            .map(|a| a.runtime_type().map_or_else(|| "null".to_string(), |t| t.to_string()))
            .collect();
        return Err(Error::NoMatchingConstructor {
            unit: unit.name().to_string(),
            signature: format!("{name}({})", types.join(", ")),
        });
    }

    run(unit, ctor, args.to_vec(), 0)
}

/// Run a constructor body and build the instance.
fn run(unit: &Arc<UnitType>, ctor: &ConstructorDecl, args: Vec<Value>, depth: usize) -> Result<Instance> {
    if depth > MAX_CONSTRUCT_DEPTH {
        return Err(Error::Execution(format!(
            "constructor nesting exceeded {MAX_CONSTRUCT_DEPTH} levels in {}::{}",
            unit.simple_name(),
            ctor.name
        )));
    }
    if ctor.init.len() != unit.fields().len() {
        return Err(Error::MalformedArtifact {
            name: unit.name().to_string(),
            reason: format!(
                "constructor `{}` initialises {} of {} fields",
                ctor.name,
                ctor.init.len(),
                unit.fields().len()
            ),
        });
    }

    let mut frame = Frame {
        unit,
        slots: args,
        depth,
    };
    frame.slots.resize(ctor.locals.max(ctor.params.len() as u32) as usize, Value::Null);

    for stmt in &ctor.body {
        match stmt {
            Stmt::Let { slot, value } => {
                let value = frame.eval(value)?;
                *frame.slot_mut(*slot)? = value;
            }
        }
    }

    let fields = ctor
        .init
        .iter()
        .map(|expr| frame.eval(expr))
        .collect::<Result<Vec<_>>>()?;

    Ok(Instance::new(Arc::clone(unit), fields))
}

struct Frame<'u> {
    unit: &'u Arc<UnitType>,
    slots: Vec<Value>,
    depth: usize,
}

impl Frame<'_> {
    fn slot_mut(&mut self, slot: u32) -> Result<&mut Value> {
        self.slots
            .get_mut(slot as usize)
            .ok_or_else(|| Error::Execution(format!("local slot {slot} out of range")))
    }

    fn eval(&self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Null => Ok(Value::Null),
            Expr::Int(v) => Ok(Value::Int(*v)),
            Expr::Float(v) => Ok(Value::Float(*v)),
            Expr::Bool(v) => Ok(Value::Bool(*v)),
            Expr::Str(v) => Ok(Value::Str(v.clone())),
            Expr::Local(slot) => self
                .slots
                .get(*slot as usize)
                .cloned()
                .ok_or_else(|| Error::Execution(format!("local slot {slot} out of range"))),
            Expr::Unary(op, operand) => unary(*op, self.eval(operand)?),
            Expr::Binary(BinaryOp::And, lhs, rhs) => match self.eval(lhs)? {
                Value::Bool(false) => Ok(Value::Bool(false)),
                Value::Bool(true) => self.eval(rhs),
                other => Err(type_mismatch("&&", &other)),
            },
            Expr::Binary(BinaryOp::Or, lhs, rhs) => match self.eval(lhs)? {
                Value::Bool(true) => Ok(Value::Bool(true)),
                Value::Bool(false) => self.eval(rhs),
                other => Err(type_mismatch("||", &other)),
            },
            Expr::Binary(op, lhs, rhs) => binary(*op, self.eval(lhs)?, self.eval(rhs)?),
            Expr::Cast(operand, ty) => cast(self.eval(operand)?, ty),
            Expr::ToString(operand) => match self.eval(operand)? {
                Value::Null => Err(Error::Execution("cannot convert null to a string".to_string())),
                value => Ok(Value::Str(value.to_string())),
            },
            Expr::Len(operand) => match self.eval(operand)? {
                Value::Str(s) => Ok(Value::Int(s.len() as i64)),
                other => Err(type_mismatch("len", &other)),
            },
            Expr::Construct {
                unit,
                constructor,
                args,
            } => self.construct(unit, constructor, args),
        }
    }

    fn construct(&self, name: &str, constructor: &str, args: &[Expr]) -> Result<Value> {
        let target = if name == self.unit.name() {
            Arc::clone(self.unit)
        } else {
            self.unit.resolver().resolve(name)?
        };

        let ctor = target.constructor(constructor).ok_or_else(|| {
            Error::Execution(format!("`{name}` has no constructor `{constructor}`"))
        })?;
        if ctor.params.len() != args.len() {
            return Err(Error::Execution(format!(
                "`{name}::{constructor}` takes {} arguments but {} were supplied",
                ctor.params.len(),
                args.len()
            )));
        }

        let args = args.iter().map(|a| self.eval(a)).collect::<Result<Vec<_>>>()?;
        let instance = run(&target, ctor, args, self.depth + 1)?;
        Ok(Value::Object(Arc::new(instance)))
    }
}

fn type_mismatch(op: &str, value: &Value) -> Error {
    let ty = value
        .runtime_type()
        .map_or_else(|| "null".to_string(), |t| t.to_string());
    Error::Execution(format!("`{op}` cannot be applied to a value of type {ty}"))
}

fn overflow(verb: &str) -> Error {
    Error::Execution(format!("attempt to {verb} with overflow"))
}

fn unary(op: UnaryOp, value: Value) -> Result<Value> {
    match (op, value) {
        (UnaryOp::Neg, Value::Int(v)) => v.checked_neg().map(Value::Int).ok_or_else(|| overflow("negate")),
        (UnaryOp::Neg, Value::Float(v)) => Ok(Value::Float(-v)),
        (UnaryOp::Not, Value::Bool(v)) => Ok(Value::Bool(!v)),
        (UnaryOp::Not, Value::Int(v)) => Ok(Value::Int(!v)),
        (UnaryOp::Neg, other) => Err(type_mismatch("-", &other)),
        (UnaryOp::Not, other) => Err(type_mismatch("!", &other)),
    }
}

fn binary(op: BinaryOp, lhs: Value, rhs: Value) -> Result<Value> {
    use BinaryOp::*;

    match (op, lhs, rhs) {
        (Add, Value::Int(a), Value::Int(b)) => a.checked_add(b).map(Value::Int).ok_or_else(|| overflow("add")),
        (Sub, Value::Int(a), Value::Int(b)) => a.checked_sub(b).map(Value::Int).ok_or_else(|| overflow("subtract")),
        (Mul, Value::Int(a), Value::Int(b)) => a.checked_mul(b).map(Value::Int).ok_or_else(|| overflow("multiply")),
        (Div, Value::Int(_), Value::Int(0)) => {
            Err(Error::Execution("attempt to divide by zero".to_string()))
        }
        (Div, Value::Int(a), Value::Int(b)) => a.checked_div(b).map(Value::Int).ok_or_else(|| overflow("divide")),
        (Rem, Value::Int(_), Value::Int(0)) => Err(Error::Execution(
            "attempt to calculate the remainder with a divisor of zero".to_string(),
        )),
        (Rem, Value::Int(a), Value::Int(b)) => a
            .checked_rem(b)
            .map(Value::Int)
            .ok_or_else(|| overflow("calculate the remainder")),
        (Add, Value::Float(a), Value::Float(b)) => Ok(Value::Float(a + b)),
        (Sub, Value::Float(a), Value::Float(b)) => Ok(Value::Float(a - b)),
        (Mul, Value::Float(a), Value::Float(b)) => Ok(Value::Float(a * b)),
        (Div, Value::Float(a), Value::Float(b)) => Ok(Value::Float(a / b)),
        (Rem, Value::Float(a), Value::Float(b)) => Ok(Value::Float(a % b)),
        (Concat | Add, Value::Str(mut a), Value::Str(b)) => {
            a.push_str(&b);
            Ok(Value::Str(a))
        }
        (Eq, a, b) => Ok(Value::Bool(a == b)),
        (Ne, a, b) => Ok(Value::Bool(a != b)),
        (op @ (Lt | Le | Gt | Ge), a, b) => {
            let ordering = match (&a, &b) {
                (Value::Int(x), Value::Int(y)) => Some(x.cmp(y)),
                (Value::Float(x), Value::Float(y)) => x.partial_cmp(y),
                (Value::Str(x), Value::Str(y)) => Some(x.cmp(y)),
                (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
                _ => return Err(type_mismatch(comparison_symbol(op), &a)),
            };
            let result = match (op, ordering) {
                (_, None) => false,
                (Lt, Some(o)) => o == Ordering::Less,
                (Le, Some(o)) => o != Ordering::Greater,
                (Gt, Some(o)) => o == Ordering::Greater,
                (_, Some(o)) => o != Ordering::Less,
            };
            Ok(Value::Bool(result))
        }
        (op, a, _) => Err(type_mismatch(&format!("{op:?}"), &a)),
    }
}

fn comparison_symbol(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Lt => "<",
        BinaryOp::Le => "<=",
        BinaryOp::Gt => ">",
        _ => ">=",
    }
}

fn cast(value: Value, ty: &TypeRef) -> Result<Value> {
    match (value, ty) {
        (Value::Int(v), TypeRef::Int) => Ok(Value::Int(v)),
        (Value::Int(v), TypeRef::Float) => Ok(Value::Float(v as f64)),
        (Value::Float(v), TypeRef::Int) => Ok(Value::Int(v as i64)),
        (Value::Float(v), TypeRef::Float) => Ok(Value::Float(v)),
        (Value::Bool(v), TypeRef::Int) => Ok(Value::Int(i64::from(v))),
        (value, ty) => Err(Error::Execution(format!(
            "cannot cast {} as {ty}",
            value
                .runtime_type()
                .map_or_else(|| "null".to_string(), |t| t.to_string())
        ))),
    }
}
