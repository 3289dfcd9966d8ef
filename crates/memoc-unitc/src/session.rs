//! Per-compilation state: diagnostics reporting and class-path lookups.

use std::sync::Arc;

use memoc_core::compile::Position;
use memoc_core::runtime::UnitImage;
use memoc_core::{ArtifactKind, Diagnostic, DiagnosticKind, DiagnosticListener, FileManager, Location};
use proc_macro2::Span;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::codes;

/// Flags controlling how warnings are treated.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct WarningPolicy {
    /// Drop warnings (`-nowarn`)
    pub suppress: bool,

    /// Report warnings as errors (`-Werror`)
    pub deny: bool,
}

pub(crate) struct Session<'t> {
    file_manager: &'t mut dyn FileManager,
    listener: &'t mut dyn DiagnosticListener,
    policy: WarningPolicy,
    errors: usize,
    warnings: usize,
    units: FxHashMap<String, Option<Arc<UnitImage>>>,
    packages: FxHashMap<String, FxHashSet<String>>,
}

impl<'t> Session<'t> {
    pub fn new(
        file_manager: &'t mut dyn FileManager,
        listener: &'t mut dyn DiagnosticListener,
    ) -> Self {
        Self {
            file_manager,
            listener,
            policy: WarningPolicy::default(),
            errors: 0,
            warnings: 0,
            units: FxHashMap::default(),
            packages: FxHashMap::default(),
        }
    }

    pub fn policy_mut(&mut self) -> &mut WarningPolicy {
        &mut self.policy
    }

    pub fn file_manager(&mut self) -> &mut dyn FileManager {
        &mut *self.file_manager
    }

    pub fn error_count(&self) -> usize {
        self.errors
    }

    pub fn warning_count(&self) -> usize {
        self.warnings
    }

    pub fn report(&mut self, mut diagnostic: Diagnostic) {
        if diagnostic.kind == DiagnosticKind::Warning {
            if self.policy.suppress {
                return;
            }
            if self.policy.deny {
                diagnostic.kind = DiagnosticKind::Error;
            }
        }

        match diagnostic.kind {
            DiagnosticKind::Error => self.errors += 1,
            DiagnosticKind::Warning => self.warnings += 1,
            DiagnosticKind::Note => {}
        }
        self.listener.report(diagnostic);
    }

    /// Image of a unit on the class path, read and decoded once per session.
    pub fn class_path_unit(&mut self, name: &str) -> Option<Arc<UnitImage>> {
        if let Some(cached) = self.units.get(name) {
            return cached.clone();
        }

        let image = self.read_class_path_unit(name);
        self.units.insert(name.to_string(), image.clone());
        image
    }

    fn read_class_path_unit(&mut self, name: &str) -> Option<Arc<UnitImage>> {
        let file = match self
            .file_manager
            .get_input(Location::ClassPath, name, ArtifactKind::Unit)
        {
            Ok(Some(file)) => file,
            Ok(None) => return None,
            Err(e) => {
                tracing::debug!("Class path lookup of {} failed: {}", name, e);
                return None;
            }
        };

        let decoded = file
            .read_bytes()
            .map_err(memoc_core::Error::from)
            .and_then(|bytes| UnitImage::decode(name, &bytes));
        match decoded {
            Ok(image) => {
                tracing::debug!("Resolved {} from {}", name, file.uri());
                Some(Arc::new(image))
            }
            Err(e) => {
                self.report(
                    Diagnostic::error(
                        codes::INVALID_UNIT_FILE,
                        format!("found invalid unit file for `{name}`: {e}"),
                    )
                    .with_source(file.uri()),
                );
                None
            }
        }
    }

    /// Whether `package` on the class path holds a unit named `simple`.
    pub fn package_contains(&mut self, package: &str, simple: &str) -> bool {
        if !self.packages.contains_key(package) {
            let names = self.list_package(package);
            self.packages.insert(package.to_string(), names);
        }

        let full = qualify(package, simple);
        self.packages
            .get(package)
            .is_some_and(|names| names.contains(&full))
    }

    pub fn error_at(&mut self, uri: &str, span: Span, code: &str, message: impl Into<String>) {
        self.report(located(Diagnostic::error(code, message), uri, span));
    }

    pub fn warn_at(&mut self, uri: &str, span: Span, code: &str, message: impl Into<String>) {
        self.report(located(Diagnostic::warning(code, message), uri, span));
    }

    fn list_package(&self, package: &str) -> FxHashSet<String> {
        let files = match self
            .file_manager
            .list(Location::ClassPath, package, &[ArtifactKind::Unit], false)
        {
            Ok(files) => files,
            Err(e) => {
                tracing::debug!("Listing package {} failed: {}", package, e);
                return FxHashSet::default();
            }
        };

        files
            .iter()
            .filter_map(|file| self.file_manager.infer_binary_name(Location::ClassPath, file))
            .collect()
    }
}

/// `package.simple`, or just `simple` for the top-level package.
pub(crate) fn qualify(package: &str, simple: &str) -> String {
    if package.is_empty() {
        simple.to_string()
    } else {
        format!("{package}.{simple}")
    }
}

/// Diagnostic position of a span (1-indexed line and column).
pub(crate) fn position(span: Span) -> Position {
    let start = span.start();
    Position {
        line: start.line,
        column: start.column + 1,
    }
}

fn located(diagnostic: Diagnostic, uri: &str, span: Span) -> Diagnostic {
    let pos = position(span);
    diagnostic.with_source(uri).at(pos.line, pos.column)
}
