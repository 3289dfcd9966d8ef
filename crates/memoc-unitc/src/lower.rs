//! Type checking and lowering of constructors into unit images.
//!
//! Types are tracked as `Option<TypeRef>`; `None` marks an expression whose
//! type is unknown because an error was already reported for it, and
//! silences follow-up errors.

use memoc_core::runtime::{
    BinaryOp, ConstructorDecl, Expr, FieldDecl, ParamDecl, Stmt, TypeRef, UnaryOp, UnitImage,
};
use proc_macro2::Span;
use syn::ext::IdentExt;
use syn::spanned::Spanned;
use syn::{FnArg, ImplItemFn, Lit, Member, Pat, ReturnType, Type};

use crate::codes;
use crate::collect::{Module, StructItem, path_segments, primitive_type};
use crate::session::Session;

type Ty = Option<TypeRef>;

/// Deepest expression nesting lowered. Emitted images must stay shallow
/// enough for the runtime to evaluate, encode and drop them recursively.
const MAX_EXPR_DEPTH: usize = 256;

struct FieldSig {
    name: String,
    ty: Ty,
}

struct ParamSig {
    name: String,
    ty: Ty,
    span: Span,
}

struct CtorSig<'f> {
    name: String,
    params: Vec<ParamSig>,
    item: Option<&'f ImplItemFn>,
}

/// Checked signatures of one struct declared in the unit.
pub(crate) struct UnitSig<'f> {
    name: String,
    full_name: String,
    fields: Vec<FieldSig>,
    constructors: Vec<CtorSig<'f>>,
}

/// Build the signatures of every struct in the module.
pub(crate) fn signatures<'f>(module: &Module<'f>, session: &mut Session<'_>) -> Vec<UnitSig<'f>> {
    module
        .structs
        .iter()
        .map(|s| signature(module, s, session))
        .collect()
}

fn signature<'f>(module: &Module<'f>, s: &StructItem<'f>, session: &mut Session<'_>) -> UnitSig<'f> {
    let mut fields: Vec<FieldSig> = Vec::new();
    for field in &s.item.fields {
        let Some(ident) = &field.ident else {
            continue;
        };
        let name = ident.unraw().to_string();
        if fields.iter().any(|f| f.name == name) {
            session.error_at(
                &module.uri,
                ident.span(),
                codes::DUPLICATE_FIELD,
                format!("field `{name}` is already declared"),
            );
            continue;
        }
        let ty = module.resolve_type(&field.ty, &s.name, session);
        fields.push(FieldSig { name, ty });
    }

    let mut constructors: Vec<CtorSig<'f>> = s
        .constructors
        .iter()
        .filter_map(|item| constructor_signature(module, s, item, session))
        .collect();

    if s.constructors.is_empty() {
        constructors.push(CtorSig {
            name: "new".to_string(),
            params: Vec::new(),
            item: None,
        });
    }

    for (i, later) in constructors.iter().enumerate() {
        let Some(earlier) = constructors[..i]
            .iter()
            .find(|c| same_parameter_types(c, later))
        else {
            continue;
        };
        if let Some(item) = later.item {
            session.warn_at(
                &module.uri,
                item.sig.ident.span(),
                codes::IDENTICAL_CONSTRUCTORS,
                format!(
                    "constructors `{}` and `{}` take the same parameter types; \
                     selecting one by argument types will be ambiguous",
                    earlier.name, later.name
                ),
            );
        }
    }

    UnitSig {
        name: s.name.clone(),
        full_name: s.full_name.clone(),
        fields,
        constructors,
    }
}

fn same_parameter_types(a: &CtorSig<'_>, b: &CtorSig<'_>) -> bool {
    a.params.len() == b.params.len()
        && a.params.iter().zip(&b.params).all(|(x, y)| {
            matches!((&x.ty, &y.ty), (Some(x), Some(y)) if x == y)
        })
}

fn constructor_signature<'f>(
    module: &Module<'f>,
    s: &StructItem<'f>,
    item: &'f ImplItemFn,
    session: &mut Session<'_>,
) -> Option<CtorSig<'f>> {
    let sig = &item.sig;
    let name = sig.ident.unraw().to_string();
    let uri = &module.uri;

    if sig.constness.is_some()
        || sig.asyncness.is_some()
        || sig.unsafety.is_some()
        || sig.abi.is_some()
        || sig.variadic.is_some()
        || !sig.generics.params.is_empty()
    {
        session.error_at(
            uri,
            sig.span(),
            codes::UNSUPPORTED,
            format!("constructor `{name}` must be a plain, non-generic function"),
        );
        return None;
    }

    if let Some(receiver) = sig.receiver() {
        session.error_at(
            uri,
            receiver.span(),
            codes::UNSUPPORTED,
            format!("`{name}` takes `self`; only constructors are supported"),
        );
        return None;
    }

    let returns_self = match &sig.output {
        ReturnType::Type(_, ty) => match &**ty {
            Type::Path(p) if p.qself.is_none() => p
                .path
                .get_ident()
                .is_some_and(|i| i == "Self" || i.unraw() == s.name),
            _ => false,
        },
        ReturnType::Default => false,
    };
    if !returns_self {
        session.error_at(
            uri,
            sig.ident.span(),
            codes::UNSUPPORTED,
            format!("associated function `{name}` must return `Self`"),
        );
        return None;
    }

    let mut params: Vec<ParamSig> = Vec::new();
    for input in &sig.inputs {
        let FnArg::Typed(typed) = input else {
            continue;
        };
        let Pat::Ident(pat) = &*typed.pat else {
            session.error_at(
                uri,
                typed.pat.span(),
                codes::UNSUPPORTED,
                "parameters must be plain identifiers",
            );
            return None;
        };
        if pat.by_ref.is_some() || pat.subpat.is_some() {
            session.error_at(
                uri,
                pat.span(),
                codes::UNSUPPORTED,
                "parameters must be plain identifiers",
            );
            return None;
        }

        let param = pat.ident.unraw().to_string();
        if params.iter().any(|p| p.name == param) {
            session.error_at(
                uri,
                pat.ident.span(),
                codes::DUPLICATE_PARAM,
                format!("identifier `{param}` is bound more than once in this parameter list"),
            );
            continue;
        }
        params.push(ParamSig {
            name: param,
            ty: module.resolve_type(&typed.ty, &s.name, session),
            span: pat.ident.span(),
        });
    }

    Some(CtorSig {
        name,
        params,
        item: Some(item),
    })
}

/// Constructor parameter types of a unit, local or on the class path.
fn callee_constructors(
    sigs: &[UnitSig<'_>],
    full_name: &str,
    session: &mut Session<'_>,
) -> Option<Vec<(String, Vec<Ty>)>> {
    if let Some(local) = sigs.iter().find(|s| s.full_name == full_name) {
        return Some(
            local
                .constructors
                .iter()
                .map(|c| (c.name.clone(), c.params.iter().map(|p| p.ty.clone()).collect()))
                .collect(),
        );
    }
    let image = session.class_path_unit(full_name)?;
    Some(
        image
            .constructors
            .iter()
            .map(|c| (c.name.clone(), c.params.iter().map(|p| Some(p.ty.clone())).collect()))
            .collect(),
    )
}

/// Lower every struct of the module. Returns `None` if any type is unknown;
/// errors have been reported in that case.
pub(crate) fn lower_module(
    module: &Module<'_>,
    sigs: &[UnitSig<'_>],
    session: &mut Session<'_>,
) -> Option<Vec<UnitImage>> {
    let mut images = Vec::with_capacity(sigs.len());
    let mut complete = true;

    for sig in sigs {
        let mut constructors = Vec::with_capacity(sig.constructors.len());
        for ctor in &sig.constructors {
            let lowered = match ctor.item {
                Some(item) => Lowerer::new(module, sigs, sig, session).constructor(ctor, item),
                None => implicit_constructor(sig),
            };
            match lowered {
                Some(lowered) => constructors.push(lowered),
                None => complete = false,
            }
        }

        let fields: Option<Vec<FieldDecl>> = sig
            .fields
            .iter()
            .map(|f| {
                Some(FieldDecl {
                    name: f.name.clone(),
                    ty: f.ty.clone()?,
                })
            })
            .collect();

        match fields {
            Some(fields) if complete => images.push(UnitImage {
                name: sig.full_name.clone(),
                source: module.uri.clone(),
                fields,
                constructors,
            }),
            _ => complete = false,
        }
    }

    complete.then_some(images)
}

/// Zero-argument `new` with every field at its default.
fn implicit_constructor(sig: &UnitSig<'_>) -> Option<ConstructorDecl> {
    let init = sig
        .fields
        .iter()
        .map(|f| {
            Some(match f.ty.as_ref()? {
                TypeRef::Int => Expr::Int(0),
                TypeRef::Float => Expr::Float(0.0),
                TypeRef::Bool => Expr::Bool(false),
                TypeRef::Str => Expr::Str(String::new()),
                TypeRef::Unit(_) => Expr::Null,
            })
        })
        .collect::<Option<Vec<_>>>()?;

    Some(ConstructorDecl {
        name: "new".to_string(),
        params: Vec::new(),
        locals: 0,
        body: Vec::new(),
        init,
    })
}

struct Binding {
    name: String,
    slot: u32,
    ty: Ty,
    span: Span,
    used: bool,
}

/// Lowers one constructor body.
struct Lowerer<'a, 't> {
    module: &'a Module<'a>,
    sigs: &'a [UnitSig<'a>],
    owner: &'a UnitSig<'a>,
    session: &'a mut Session<'t>,
    scope: Vec<Binding>,
    depth: usize,
    too_deep: bool,
    complete: bool,
}

impl<'a, 't> Lowerer<'a, 't> {
    fn new(
        module: &'a Module<'a>,
        sigs: &'a [UnitSig<'a>],
        owner: &'a UnitSig<'a>,
        session: &'a mut Session<'t>,
    ) -> Self {
        Self {
            module,
            sigs,
            owner,
            session,
            scope: Vec::new(),
            depth: 0,
            too_deep: false,
            complete: true,
        }
    }

    fn error(&mut self, span: Span, code: &str, message: impl Into<String>) -> (Expr, Ty) {
        self.session.error_at(&self.module.uri, span, code, message);
        self.complete = false;
        (Expr::Null, None)
    }

    fn mismatch(&mut self, span: Span, expected: &TypeRef, found: &TypeRef) {
        self.error(
            span,
            codes::MISMATCHED_TYPES,
            format!("mismatched types: expected `{expected}`, found `{found}`"),
        );
    }

    fn bind(&mut self, name: String, ty: Ty, span: Span) -> u32 {
        let slot = self.scope.len() as u32;
        self.scope.push(Binding {
            name,
            slot,
            ty,
            span,
            used: false,
        });
        slot
    }

    fn constructor(mut self, sig: &CtorSig<'_>, item: &ImplItemFn) -> Option<ConstructorDecl> {
        for param in &sig.params {
            self.bind(param.name.clone(), param.ty.clone(), param.span);
        }

        let stmts = &item.block.stmts;
        let (tail, lets) = match stmts.split_last() {
            Some((syn::Stmt::Expr(tail, None), lets)) => (Some(tail), lets),
            _ => (None, stmts.as_slice()),
        };

        let mut body = Vec::new();
        for stmt in lets {
            if let Some(lowered) = self.statement(stmt) {
                body.push(lowered);
            }
        }

        let init = match tail {
            Some(tail) => self.tail(tail),
            None => {
                self.error(
                    item.block.brace_token.span.close(),
                    codes::MISMATCHED_TYPES,
                    format!(
                        "mismatched types: expected `{}`, found `()`",
                        self.owner.name
                    ),
                );
                Vec::new()
            }
        };

        for binding in &self.scope {
            if !binding.used && !binding.name.starts_with('_') {
                self.session.warn_at(
                    &self.module.uri,
                    binding.span,
                    codes::UNUSED_VARIABLES,
                    format!("unused variable: `{}`", binding.name),
                );
            }
        }

        if !self.complete {
            return None;
        }

        let params = sig
            .params
            .iter()
            .map(|p| {
                Some(ParamDecl {
                    name: p.name.clone(),
                    ty: p.ty.clone()?,
                })
            })
            .collect::<Option<Vec<_>>>()?;

        Some(ConstructorDecl {
            name: sig.name.clone(),
            params,
            locals: self.scope.len() as u32,
            body,
            init,
        })
    }

    fn statement(&mut self, stmt: &syn::Stmt) -> Option<Stmt> {
        let local = match stmt {
            syn::Stmt::Local(local) => local,
            syn::Stmt::Item(item) => {
                self.error(item.span(), codes::UNSUPPORTED, "nested items are not supported");
                return None;
            }
            syn::Stmt::Macro(mac) => {
                self.error(mac.span(), codes::UNSUPPORTED, "macros are not supported");
                return None;
            }
            syn::Stmt::Expr(expr, _) => {
                self.error(
                    expr.span(),
                    codes::UNSUPPORTED,
                    "only `let` statements may precede the struct literal",
                );
                return None;
            }
        };

        let (pat, annotation) = match &local.pat {
            Pat::Type(typed) => (&*typed.pat, Some(&*typed.ty)),
            other => (other, None),
        };
        let Pat::Ident(ident) = pat else {
            self.error(pat.span(), codes::UNSUPPORTED, "`let` patterns must be plain identifiers");
            return None;
        };
        if ident.by_ref.is_some() || ident.subpat.is_some() {
            self.error(pat.span(), codes::UNSUPPORTED, "`let` patterns must be plain identifiers");
            return None;
        }

        let Some(init) = &local.init else {
            self.error(local.span(), codes::UNSUPPORTED, "`let` without an initializer is not supported");
            return None;
        };
        if let Some((_, diverge)) = &init.diverge {
            self.error(diverge.span(), codes::UNSUPPORTED, "`let ... else` is not supported");
            return None;
        }

        let (value, mut ty) = self.expr(&init.expr);
        if let Some(annotation) = annotation {
            let declared = self
                .module
                .resolve_type(annotation, &self.owner.name, self.session);
            match (&declared, &ty) {
                (Some(declared), Some(found)) if declared != found => {
                    self.mismatch(init.expr.span(), declared, found);
                }
                (None, _) => self.complete = false,
                _ => {}
            }
            ty = declared;
        }

        let slot = self.bind(ident.ident.unraw().to_string(), ty, ident.ident.span());
        Some(Stmt::Let { slot, value })
    }

    /// Lower the final `Self { .. }` literal into one expression per field.
    fn tail(&mut self, tail: &syn::Expr) -> Vec<Expr> {
        let owner = self.owner;
        if let syn::Expr::Path(path) = tail
            && path.qself.is_none()
            && let Some(ident) = path.path.get_ident()
            && (ident == "Self"
                || (ident.unraw() == owner.name
                    && !self.scope.iter().any(|b| ident.unraw() == b.name)))
        {
            // A bare `Self` builds a struct without fields.
            let missing: Vec<String> =
                owner.fields.iter().map(|f| format!("`{}`", f.name)).collect();
            if !missing.is_empty() {
                self.missing_fields(ident.span(), &missing);
            }
            return Vec::new();
        }
        let syn::Expr::Struct(literal) = tail else {
            let (_, ty) = self.expr(tail);
            let expected = TypeRef::Unit(owner.full_name.clone());
            match ty {
                Some(ty) if ty == expected => {
                    self.error(
                        tail.span(),
                        codes::UNSUPPORTED,
                        "constructors must end in a `Self { .. }` literal",
                    );
                }
                Some(ty) => self.mismatch(tail.span(), &expected, &ty),
                None => {}
            }
            return Vec::new();
        };

        let names_owner = literal.qself.is_none()
            && literal
                .path
                .get_ident()
                .is_some_and(|i| i == "Self" || i.unraw() == owner.name);
        if !names_owner {
            self.error(
                literal.path.span(),
                codes::MISMATCHED_TYPES,
                format!("mismatched types: expected `{}`", owner.name),
            );
            return Vec::new();
        }
        if let Some(rest) = &literal.rest {
            self.error(rest.span(), codes::UNSUPPORTED, "functional update syntax is not supported");
        }

        let mut init: Vec<Option<Expr>> = vec![None; owner.fields.len()];
        for field in &literal.fields {
            let name = match &field.member {
                Member::Named(ident) => ident.unraw().to_string(),
                Member::Unnamed(index) => index.index.to_string(),
            };
            let Some(index) = owner.fields.iter().position(|f| f.name == name) else {
                self.error(
                    field.member.span(),
                    codes::UNKNOWN_FIELD,
                    format!("struct `{}` has no field named `{name}`", owner.name),
                );
                continue;
            };
            if init[index].is_some() {
                self.error(
                    field.member.span(),
                    codes::FIELD_SPECIFIED_TWICE,
                    format!("field `{name}` specified more than once"),
                );
                continue;
            }

            let (value, ty) = self.expr(&field.expr);
            if let (Some(expected), Some(found)) = (&owner.fields[index].ty, &ty)
                && expected != found
            {
                self.mismatch(field.expr.span(), expected, found);
            }
            init[index] = Some(value);
        }

        let missing: Vec<String> = self
            .owner
            .fields
            .iter()
            .zip(&init)
            .filter(|(_, value)| value.is_none())
            .map(|(f, _)| format!("`{}`", f.name))
            .collect();
        if !missing.is_empty() {
            self.missing_fields(literal.path.span(), &missing);
        }

        init.into_iter().map(|e| e.unwrap_or(Expr::Null)).collect()
    }

    fn missing_fields(&mut self, span: Span, missing: &[String]) {
        let noun = if missing.len() == 1 { "field" } else { "fields" };
        self.error(
            span,
            codes::MISSING_FIELDS,
            format!(
                "missing {noun} {} in initializer of `{}`",
                missing.join(", "),
                self.owner.name
            ),
        );
    }

    fn expr(&mut self, expr: &syn::Expr) -> (Expr, Ty) {
        if self.depth == MAX_EXPR_DEPTH {
            if std::mem::replace(&mut self.too_deep, true) {
                self.complete = false;
                return (Expr::Null, None);
            }
            return self.error(
                head_span(expr),
                codes::UNSUPPORTED,
                format!("expression nests too deeply; at most {MAX_EXPR_DEPTH} levels are supported"),
            );
        }
        self.depth += 1;
        let lowered = self.nested(expr);
        self.depth -= 1;
        lowered
    }

    fn nested(&mut self, expr: &syn::Expr) -> (Expr, Ty) {
        match expr {
            syn::Expr::Lit(lit) => self.literal(&lit.lit, false),
            syn::Expr::Paren(inner) => self.expr(&inner.expr),
            syn::Expr::Group(inner) => self.expr(&inner.expr),
            syn::Expr::Path(path) => self.variable(path),
            syn::Expr::Unary(unary) => self.unary(unary),
            syn::Expr::Binary(binary) => self.binary(binary),
            syn::Expr::Cast(cast) => self.cast(cast),
            syn::Expr::MethodCall(call) => self.method_call(call),
            syn::Expr::Call(call) => self.call(call),
            syn::Expr::Reference(reference) if reference.mutability.is_none() => {
                let (value, ty) = self.expr(&reference.expr);
                match ty {
                    Some(TypeRef::Str) | None => (value, ty),
                    Some(_) => self.error(
                        reference.span(),
                        codes::UNSUPPORTED,
                        "references are only supported to `String` values",
                    ),
                }
            }
            syn::Expr::Struct(literal) => self.error(
                literal.span(),
                codes::UNSUPPORTED,
                "struct literals are only supported as the final expression of a constructor",
            ),
            other => self.error(
                other.span(),
                codes::UNSUPPORTED,
                "unsupported expression in constructor body",
            ),
        }
    }

    fn literal(&mut self, lit: &Lit, negated: bool) -> (Expr, Ty) {
        match lit {
            Lit::Int(int) if matches!(int.suffix(), "f32" | "f64") => {
                match int.base10_parse::<f64>() {
                    Ok(v) => (Expr::Float(if negated { -v } else { v }), Some(TypeRef::Float)),
                    Err(e) => self.error(lit.span(), codes::LITERAL_OUT_OF_RANGE, e.to_string()),
                }
            }
            Lit::Int(int) => {
                let parsed = int
                    .base10_parse::<i128>()
                    .ok()
                    .map(|v| if negated { -v } else { v })
                    .and_then(|v| i64::try_from(v).ok());
                match parsed {
                    Some(v) => (Expr::Int(v), Some(TypeRef::Int)),
                    None => self.error(
                        lit.span(),
                        codes::LITERAL_OUT_OF_RANGE,
                        format!("literal out of range for `i64`: {}", int.base10_digits()),
                    ),
                }
            }
            Lit::Float(float) => match float.base10_parse::<f64>() {
                Ok(v) if v.is_finite() => {
                    (Expr::Float(if negated { -v } else { v }), Some(TypeRef::Float))
                }
                _ => self.error(
                    lit.span(),
                    codes::LITERAL_OUT_OF_RANGE,
                    format!("literal out of range for `f64`: {}", float.base10_digits()),
                ),
            },
            Lit::Bool(b) if !negated => (Expr::Bool(b.value), Some(TypeRef::Bool)),
            Lit::Str(s) if !negated => (Expr::Str(s.value()), Some(TypeRef::Str)),
            Lit::Bool(_) => self.unary_mismatch("-", &TypeRef::Bool, lit.span()),
            Lit::Str(_) => self.unary_mismatch("-", &TypeRef::Str, lit.span()),
            other => self.error(
                other.span(),
                codes::UNSUPPORTED,
                "only integer, float, bool and string literals are supported",
            ),
        }
    }

    fn variable(&mut self, path: &syn::ExprPath) -> (Expr, Ty) {
        let ident = if path.qself.is_none() {
            path.path.get_ident()
        } else {
            None
        };
        let Some(ident) = ident else {
            return self.error(
                path.span(),
                codes::UNKNOWN_VALUE,
                "cannot find value in this scope; only parameters and locals can be referenced",
            );
        };

        let name = ident.unraw().to_string();
        match self.scope.iter_mut().rev().find(|b| b.name == name) {
            Some(binding) => {
                binding.used = true;
                (Expr::Local(binding.slot), binding.ty.clone())
            }
            None => self.error(
                ident.span(),
                codes::UNKNOWN_VALUE,
                format!("cannot find value `{name}` in this scope"),
            ),
        }
    }

    fn unary_mismatch(&mut self, op: &str, ty: &TypeRef, span: Span) -> (Expr, Ty) {
        self.error(
            span,
            codes::UNARY_OP,
            format!("cannot apply unary operator `{op}` to type `{ty}`"),
        )
    }

    fn unary(&mut self, unary: &syn::ExprUnary) -> (Expr, Ty) {
        match unary.op {
            syn::UnOp::Neg(_) => {
                if let syn::Expr::Lit(lit) = &*unary.expr {
                    return self.literal(&lit.lit, true);
                }
                let (operand, ty) = self.expr(&unary.expr);
                match ty {
                    Some(TypeRef::Int | TypeRef::Float) | None => {
                        (Expr::Unary(UnaryOp::Neg, Box::new(operand)), ty)
                    }
                    Some(other) => self.unary_mismatch("-", &other, unary.span()),
                }
            }
            syn::UnOp::Not(_) => {
                let (operand, ty) = self.expr(&unary.expr);
                match ty {
                    Some(TypeRef::Bool | TypeRef::Int) | None => {
                        (Expr::Unary(UnaryOp::Not, Box::new(operand)), ty)
                    }
                    Some(other) => self.unary_mismatch("!", &other, unary.span()),
                }
            }
            _ => self.error(
                unary.span(),
                codes::UNSUPPORTED,
                "dereferencing is not supported",
            ),
        }
    }

    fn binary(&mut self, binary: &syn::ExprBinary) -> (Expr, Ty) {
        use syn::BinOp as B;

        let (op, symbol) = match binary.op {
            B::Add(_) => (BinaryOp::Add, "+"),
            B::Sub(_) => (BinaryOp::Sub, "-"),
            B::Mul(_) => (BinaryOp::Mul, "*"),
            B::Div(_) => (BinaryOp::Div, "/"),
            B::Rem(_) => (BinaryOp::Rem, "%"),
            B::And(_) => (BinaryOp::And, "&&"),
            B::Or(_) => (BinaryOp::Or, "||"),
            B::Eq(_) => (BinaryOp::Eq, "=="),
            B::Ne(_) => (BinaryOp::Ne, "!="),
            B::Lt(_) => (BinaryOp::Lt, "<"),
            B::Le(_) => (BinaryOp::Le, "<="),
            B::Gt(_) => (BinaryOp::Gt, ">"),
            B::Ge(_) => (BinaryOp::Ge, ">="),
            _ => {
                return self.error(
                    binary.op.span(),
                    codes::UNSUPPORTED,
                    "bitwise, shift and assignment operators are not supported",
                );
            }
        };

        let (lhs, lhs_ty) = self.expr(&binary.left);
        let (rhs, rhs_ty) = self.expr(&binary.right);
        let build = |op| Expr::Binary(op, Box::new(lhs), Box::new(rhs));

        match op {
            BinaryOp::And | BinaryOp::Or => {
                for (ty, side) in [(&lhs_ty, &binary.left), (&rhs_ty, &binary.right)] {
                    if let Some(ty) = ty
                        && *ty != TypeRef::Bool
                    {
                        self.mismatch(side.span(), &TypeRef::Bool, ty);
                    }
                }
                (build(op), Some(TypeRef::Bool))
            }
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                if let (Some(l), Some(r)) = (&lhs_ty, &rhs_ty) {
                    if l != r {
                        self.mismatch(binary.right.span(), l, r);
                    } else if !l.is_primitive() {
                        self.error(
                            binary.op.span(),
                            codes::BINARY_OP,
                            format!("binary operation `{symbol}` cannot be applied to type `{l}`"),
                        );
                    }
                }
                (build(op), Some(TypeRef::Bool))
            }
            _ => match (&lhs_ty, &rhs_ty) {
                (Some(TypeRef::Str), Some(TypeRef::Str) | None)
                | (None, Some(TypeRef::Str))
                    if op == BinaryOp::Add =>
                {
                    (build(BinaryOp::Concat), Some(TypeRef::Str))
                }
                (Some(l), Some(r)) if l != r => {
                    self.mismatch(binary.right.span(), l, r);
                    (Expr::Null, None)
                }
                (Some(l @ (TypeRef::Int | TypeRef::Float)), _) => {
                    let ty = Some(l.clone());
                    (build(op), ty)
                }
                (Some(l), _) => {
                    self.error(
                        binary.op.span(),
                        codes::BINARY_OP,
                        format!("binary operation `{symbol}` cannot be applied to type `{l}`"),
                    )
                }
                (None, r) => {
                    let ty = r.clone().filter(|r| matches!(r, TypeRef::Int | TypeRef::Float));
                    (build(op), ty)
                }
            },
        }
    }

    fn cast(&mut self, cast: &syn::ExprCast) -> (Expr, Ty) {
        let (operand, from) = self.expr(&cast.expr);

        let target = match &*cast.ty {
            Type::Path(p) if p.qself.is_none() => p
                .path
                .get_ident()
                .and_then(|i| primitive_type(&i.to_string())),
            _ => None,
        };
        let target = match target {
            Some(target @ (TypeRef::Int | TypeRef::Float)) => target,
            Some(other) => {
                let from = from.map_or_else(|| "_".to_string(), |f| f.to_string());
                return self.error(
                    cast.span(),
                    codes::INVALID_CAST,
                    format!("cannot cast `{from}` as `{other}`"),
                );
            }
            None => {
                return self.error(
                    cast.ty.span(),
                    codes::INVALID_CAST,
                    "casts are only supported to integer and float types",
                );
            }
        };

        match (&from, &target) {
            (None, _)
            | (Some(TypeRef::Int | TypeRef::Float), _)
            | (Some(TypeRef::Bool), TypeRef::Int) => {
                (Expr::Cast(Box::new(operand), target.clone()), Some(target))
            }
            (Some(from @ TypeRef::Bool), _) => {
                let from = from.clone();
                self.error(
                    cast.span(),
                    codes::INVALID_CAST,
                    format!("casting `{from}` as `{target}` is invalid"),
                )
            }
            (Some(from), _) => {
                let from = from.clone();
                self.error(
                    cast.span(),
                    codes::INVALID_CAST,
                    format!("non-primitive cast: `{from}` as `{target}`"),
                )
            }
        }
    }

    fn method_call(&mut self, call: &syn::ExprMethodCall) -> (Expr, Ty) {
        let method = call.method.unraw().to_string();
        if call.turbofish.is_some() {
            return self.error(
                call.span(),
                codes::UNSUPPORTED,
                "generic arguments are not supported",
            );
        }

        let (receiver, ty) = self.expr(&call.receiver);
        if !call.args.is_empty() {
            return self.error(
                call.args.span(),
                codes::WRONG_ARG_COUNT,
                format!(
                    "this method takes 0 arguments but {} {} supplied",
                    call.args.len(),
                    if call.args.len() == 1 { "argument was" } else { "arguments were" }
                ),
            );
        }

        let Some(ty) = ty else {
            return (Expr::Null, None);
        };
        match (method.as_str(), &ty) {
            ("to_string", t) if t.is_primitive() => {
                (Expr::ToString(Box::new(receiver)), Some(TypeRef::Str))
            }
            ("to_owned" | "clone", t) if t.is_primitive() => (receiver, Some(ty.clone())),
            ("into", TypeRef::Str) => (receiver, Some(TypeRef::Str)),
            ("len", TypeRef::Str) => (Expr::Len(Box::new(receiver)), Some(TypeRef::Int)),
            _ => {
                let kind = if ty.is_primitive() { "type" } else { "struct" };
                self.error(
                    call.method.span(),
                    codes::NO_METHOD,
                    format!("no method named `{method}` found for {kind} `{ty}` in the current scope"),
                )
            }
        }
    }

    fn call(&mut self, call: &syn::ExprCall) -> (Expr, Ty) {
        let syn::Expr::Path(func) = &*call.func else {
            return self.error(
                call.func.span(),
                codes::UNSUPPORTED,
                "only constructor calls are supported",
            );
        };
        if func.qself.is_some() {
            return self.error(func.span(), codes::UNSUPPORTED, "qualified paths are not supported");
        }
        let Some(segments) = path_segments(&func.path, &self.module.uri, self.session) else {
            self.complete = false;
            return (Expr::Null, None);
        };

        let args: Vec<(Expr, Ty, &syn::Expr)> = call
            .args
            .iter()
            .map(|a| {
                let (e, t) = self.expr(a);
                (e, t, a)
            })
            .collect();

        let Some((function, type_path)) = segments.split_last() else {
            return (Expr::Null, None);
        };
        if type_path.is_empty() {
            return self.error(
                func.span(),
                codes::UNKNOWN_VALUE,
                format!("cannot find function `{function}` in this scope"),
            );
        }

        if type_path == ["String"] {
            return self.string_call(function, args, call);
        }

        let Some(unit) =
            self.module
                .resolve_unit(type_path, &self.owner.name, func.span(), self.session)
        else {
            self.complete = false;
            return (Expr::Null, None);
        };
        let constructors = callee_constructors(self.sigs, &unit, self.session).unwrap_or_default();
        let Some((_, params)) = constructors.iter().find(|(name, _)| name == function) else {
            return self.error(
                func.span(),
                codes::NO_METHOD,
                format!(
                    "no function or associated item named `{function}` found for struct `{unit}` in the current scope"
                ),
            );
        };

        if params.len() != args.len() {
            return self.error(
                call.span(),
                codes::WRONG_ARG_COUNT,
                format!(
                    "this function takes {} {} but {} {} supplied",
                    params.len(),
                    if params.len() == 1 { "argument" } else { "arguments" },
                    args.len(),
                    if args.len() == 1 { "argument was" } else { "arguments were" }
                ),
            );
        }

        let mut lowered = Vec::with_capacity(args.len());
        for ((arg, found, source), expected) in args.into_iter().zip(params) {
            if let (Some(expected), Some(found)) = (expected, &found)
                && expected != found
            {
                self.mismatch(source.span(), expected, found);
            }
            lowered.push(arg);
        }

        (
            Expr::Construct {
                unit: unit.clone(),
                constructor: function.clone(),
                args: lowered,
            },
            Some(TypeRef::Unit(unit)),
        )
    }

    /// `String::new()` and `String::from(s)`.
    fn string_call(
        &mut self,
        function: &str,
        mut args: Vec<(Expr, Ty, &syn::Expr)>,
        call: &syn::ExprCall,
    ) -> (Expr, Ty) {
        let expected = match function {
            "new" => 0,
            "from" => 1,
            _ => {
                return self.error(
                    call.span(),
                    codes::NO_METHOD,
                    format!("no function or associated item named `{function}` found for struct `String`"),
                );
            }
        };
        if args.len() != expected {
            return self.error(
                call.span(),
                codes::WRONG_ARG_COUNT,
                format!(
                    "this function takes {expected} {} but {} {} supplied",
                    if expected == 1 { "argument" } else { "arguments" },
                    args.len(),
                    if args.len() == 1 { "argument was" } else { "arguments were" }
                ),
            );
        }

        match args.pop() {
            None => (Expr::Str(String::new()), Some(TypeRef::Str)),
            Some((arg, Some(TypeRef::Str) | None, _)) => (arg, Some(TypeRef::Str)),
            Some((_, Some(found), source)) => {
                self.mismatch(source.span(), &TypeRef::Str, &found);
                (Expr::Null, None)
            }
        }
    }
}

/// Span of the token that introduces `expr`, without walking its operands.
fn head_span(expr: &syn::Expr) -> Span {
    match expr {
        syn::Expr::Binary(binary) => binary.op.span(),
        syn::Expr::Unary(unary) => unary.op.span(),
        syn::Expr::Cast(cast) => cast.as_token.span,
        syn::Expr::Paren(paren) => paren.paren_token.span.open(),
        syn::Expr::MethodCall(call) => call.method.span(),
        syn::Expr::Call(call) => call.paren_token.span.open(),
        syn::Expr::Reference(reference) => reference.and_token.spans[0],
        other => other.span(),
    }
}
