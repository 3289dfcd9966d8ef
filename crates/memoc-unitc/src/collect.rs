//! Item collection and name resolution for one source unit.

use memoc_core::SourceUnit;
use memoc_core::runtime::TypeRef;
use proc_macro2::Span;
use rustc_hash::FxHashMap;
use syn::ext::IdentExt;
use syn::spanned::Spanned;
use syn::{Fields, ImplItem, ImplItemFn, Item, ItemImpl, ItemStruct, ItemUse, Type, UseTree, Visibility};

use crate::codes;
use crate::session::{Session, qualify};

/// A struct declared in the unit, with the constructor functions found in
/// its impl blocks.
pub(crate) struct StructItem<'f> {
    pub item: &'f ItemStruct,
    pub name: String,
    pub full_name: String,
    pub constructors: Vec<&'f ImplItemFn>,
}

struct Import {
    full_name: String,
    span: Span,
    resolved: bool,
}

/// Declarations of one parsed source unit.
pub(crate) struct Module<'f> {
    pub package: String,
    pub uri: String,
    pub structs: Vec<StructItem<'f>>,
    imports: FxHashMap<String, Import>,
}

impl<'f> Module<'f> {
    /// Collect structs, imports and impls, reporting anything outside the dialect.
    pub fn collect(file: &'f syn::File, unit: &SourceUnit, session: &mut Session<'_>) -> Self {
        let mut module = Self {
            package: unit.package().to_string(),
            uri: unit.uri().to_string(),
            structs: Vec::new(),
            imports: FxHashMap::default(),
        };

        for item in &file.items {
            match item {
                Item::Struct(item) => module.add_struct(item, session),
                Item::Use(item) => module.add_use(item, session),
                Item::Impl(_) => {}
                other => session.error_at(
                    &module.uri,
                    other.span(),
                    codes::UNSUPPORTED,
                    "only structs, impl blocks and `use` declarations are supported in a unit",
                ),
            }
        }

        module.resolve_imports(session);
        module.check_public_name(unit, session);

        for item in &file.items {
            if let Item::Impl(item) = item {
                module.add_impl(item, session);
            }
        }

        module
    }

    pub fn find_struct(&self, name: &str) -> Option<&StructItem<'f>> {
        self.structs.iter().find(|s| s.name == name)
    }

    fn add_struct(&mut self, item: &'f ItemStruct, session: &mut Session<'_>) {
        let name = item.ident.unraw().to_string();

        if !item.generics.params.is_empty() {
            session.error_at(
                &self.uri,
                item.generics.span(),
                codes::UNSUPPORTED,
                "generic structs are not supported",
            );
        }
        if let Fields::Unnamed(fields) = &item.fields {
            session.error_at(
                &self.uri,
                fields.span(),
                codes::UNSUPPORTED,
                "tuple structs are not supported; use named fields",
            );
        }
        if self.find_struct(&name).is_some() || self.imports.contains_key(&name) {
            session.error_at(
                &self.uri,
                item.ident.span(),
                codes::DUPLICATE_ITEM,
                format!("the name `{name}` is defined multiple times"),
            );
            return;
        }

        self.structs.push(StructItem {
            item,
            full_name: qualify(&self.package, &name),
            name,
            constructors: Vec::new(),
        });
    }

    fn add_use(&mut self, item: &ItemUse, session: &mut Session<'_>) {
        let mut flattened = Vec::new();
        if let Err((span, message)) = flatten_use(&item.tree, &mut Vec::new(), &mut flattened) {
            session.error_at(&self.uri, span, codes::UNSUPPORTED, message);
        }

        for (alias, segments, span) in flattened {
            if self.imports.contains_key(&alias) || self.find_struct(&alias).is_some() {
                session.error_at(
                    &self.uri,
                    span,
                    codes::DUPLICATE_ITEM,
                    format!("the name `{alias}` is defined multiple times"),
                );
                continue;
            }
            self.imports.insert(
                alias,
                Import {
                    full_name: segments.join("."),
                    span,
                    resolved: false,
                },
            );
        }
    }

    fn resolve_imports(&mut self, session: &mut Session<'_>) {
        let mut imports: Vec<_> = self.imports.iter_mut().collect();
        imports.sort_by_key(|(_, import)| position_key(import.span));

        for (_, import) in imports {
            let local = self.structs.iter().any(|s| s.full_name == import.full_name);
            import.resolved = local || session.class_path_unit(&import.full_name).is_some();
            if !import.resolved {
                session.error_at(
                    &self.uri,
                    import.span,
                    codes::UNRESOLVED_IMPORT,
                    format!("unresolved import `{}`", import.full_name.replace('.', "::")),
                );
            }
        }
    }

    fn check_public_name(&self, unit: &SourceUnit, session: &mut Session<'_>) {
        for s in &self.structs {
            if matches!(s.item.vis, Visibility::Public(_)) && s.name != unit.simple_name() {
                session.error_at(
                    &self.uri,
                    s.item.ident.span(),
                    codes::UNIT_NAME_MISMATCH,
                    format!(
                        "public struct `{}` must be declared in a unit named `{}`",
                        s.name, s.full_name
                    ),
                );
            }
        }
    }

    fn add_impl(&mut self, item: &'f ItemImpl, session: &mut Session<'_>) {
        if !item.generics.params.is_empty() || item.unsafety.is_some() {
            session.error_at(
                &self.uri,
                item.impl_token.span,
                codes::UNSUPPORTED,
                "generic and unsafe impl blocks are not supported",
            );
            return;
        }

        let is_default = match &item.trait_ {
            None => false,
            Some((None, path, _)) if path.segments.last().is_some_and(|s| s.ident == "Default") => {
                true
            }
            Some((_, path, _)) => {
                session.error_at(
                    &self.uri,
                    path.span(),
                    codes::UNSUPPORTED,
                    "only inherent impls and `impl Default` are supported",
                );
                return;
            }
        };

        let target = match &*item.self_ty {
            Type::Path(p) if p.qself.is_none() => p.path.get_ident().map(|i| i.unraw().to_string()),
            _ => None,
        };
        let Some(index) = target
            .as_deref()
            .and_then(|name| self.structs.iter().position(|s| s.name == name))
        else {
            session.error_at(
                &self.uri,
                item.self_ty.span(),
                codes::UNSUPPORTED,
                "impl blocks must target a struct declared in this unit",
            );
            return;
        };

        for impl_item in &item.items {
            let ImplItem::Fn(function) = impl_item else {
                session.error_at(
                    &self.uri,
                    impl_item.span(),
                    codes::UNSUPPORTED,
                    "only associated functions are supported in impl blocks",
                );
                continue;
            };

            let name = function.sig.ident.unraw().to_string();
            if is_default && name != "default" {
                session.error_at(
                    &self.uri,
                    function.sig.ident.span(),
                    codes::NOT_A_TRAIT_MEMBER,
                    format!("method `{name}` is not a member of trait `Default`"),
                );
                continue;
            }

            let owner = &mut self.structs[index];
            if owner
                .constructors
                .iter()
                .any(|c| c.sig.ident.unraw() == function.sig.ident.unraw())
            {
                session.error_at(
                    &self.uri,
                    function.sig.ident.span(),
                    codes::DUPLICATE_DEFINITION,
                    format!("duplicate definitions with name `{name}`"),
                );
                continue;
            }
            owner.constructors.push(function);
        }
    }

    /// Resolve a field or parameter type. Reports and returns `None` on failure.
    pub fn resolve_type(
        &self,
        ty: &Type,
        owner: &str,
        session: &mut Session<'_>,
    ) -> Option<TypeRef> {
        match ty {
            Type::Paren(inner) => self.resolve_type(&inner.elem, owner, session),
            Type::Group(inner) => self.resolve_type(&inner.elem, owner, session),
            Type::Path(p) if p.qself.is_none() => {
                let segments = path_segments(&p.path, &self.uri, session)?;
                if let [single] = segments.as_slice()
                    && let Some(primitive) = primitive_type(single)
                {
                    return Some(primitive);
                }
                self.resolve_unit(&segments, owner, p.span(), session)
                    .map(TypeRef::Unit)
            }
            other => {
                session.error_at(
                    &self.uri,
                    other.span(),
                    codes::UNSUPPORTED,
                    "unsupported type; expected an integer, float, `bool`, `String` or a unit type",
                );
                None
            }
        }
    }

    /// Fully qualified name of the unit a type path refers to.
    ///
    /// Single names are looked up in this unit, then the imports, then the
    /// unit's own package on the class path. Reports and returns `None` on
    /// failure.
    pub fn resolve_unit(
        &self,
        segments: &[String],
        owner: &str,
        span: Span,
        session: &mut Session<'_>,
    ) -> Option<String> {
        if let [name] = segments {
            let name = if name == "Self" { owner } else { name.as_str() };
            if let Some(local) = self.find_struct(name) {
                return Some(local.full_name.clone());
            }
            if let Some(import) = self.imports.get(name) {
                // Unresolved imports were reported where they were declared.
                return import.resolved.then(|| import.full_name.clone());
            }
            if session.package_contains(&self.package, name) {
                return Some(qualify(&self.package, name));
            }
            session.error_at(
                &self.uri,
                span,
                codes::UNKNOWN_TYPE,
                format!("cannot find type `{name}` in this scope"),
            );
            return None;
        }

        let full_name = segments.join(".");
        if self.structs.iter().any(|s| s.full_name == full_name)
            || session.class_path_unit(&full_name).is_some()
        {
            return Some(full_name);
        }

        let (module, name) = segments.split_at(segments.len() - 1);
        session.error_at(
            &self.uri,
            span,
            codes::UNKNOWN_TYPE,
            format!(
                "cannot find type `{}` in module `{}`",
                name.join(""),
                module.join("::")
            ),
        );
        None
    }
}

/// Map a primitive type name to its runtime type.
pub(crate) fn primitive_type(name: &str) -> Option<TypeRef> {
    match name {
        "i8" | "i16" | "i32" | "i64" | "i128" | "isize" | "u8" | "u16" | "u32" | "u64"
        | "u128" | "usize" => Some(TypeRef::Int),
        "f32" | "f64" => Some(TypeRef::Float),
        "bool" => Some(TypeRef::Bool),
        "String" => Some(TypeRef::Str),
        _ => None,
    }
}

/// Identifiers of a path without generic arguments.
pub(crate) fn path_segments(
    path: &syn::Path,
    uri: &str,
    session: &mut Session<'_>,
) -> Option<Vec<String>> {
    if let Some(segment) = path.segments.iter().find(|s| !s.arguments.is_none()) {
        session.error_at(
            uri,
            segment.arguments.span(),
            codes::UNSUPPORTED,
            "generic arguments are not supported",
        );
        return None;
    }
    Some(
        path.segments
            .iter()
            .map(|s| s.ident.unraw().to_string())
            .collect(),
    )
}

fn flatten_use(
    tree: &UseTree,
    prefix: &mut Vec<String>,
    out: &mut Vec<(String, Vec<String>, Span)>,
) -> Result<(), (Span, &'static str)> {
    match tree {
        UseTree::Path(path) => {
            let ident = path.ident.unraw().to_string();
            if prefix.is_empty() && matches!(ident.as_str(), "crate" | "self" | "super") {
                return Err((path.ident.span(), "relative imports are not supported"));
            }
            prefix.push(ident);
            let result = flatten_use(&path.tree, prefix, out);
            prefix.pop();
            result
        }
        UseTree::Name(name) => {
            let ident = name.ident.unraw().to_string();
            let mut segments = prefix.clone();
            segments.push(ident.clone());
            out.push((ident, segments, name.ident.span()));
            Ok(())
        }
        UseTree::Rename(rename) => {
            let mut segments = prefix.clone();
            segments.push(rename.ident.unraw().to_string());
            out.push((rename.rename.unraw().to_string(), segments, rename.span()));
            Ok(())
        }
        UseTree::Glob(glob) => Err((glob.span(), "glob imports are not supported")),
        UseTree::Group(group) => {
            for tree in &group.items {
                flatten_use(tree, prefix, out)?;
            }
            Ok(())
        }
    }
}

fn position_key(span: Span) -> (usize, usize) {
    let start = span.start();
    (start.line, start.column)
}
