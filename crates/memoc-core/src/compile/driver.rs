//! Compilation driver: one in-memory compilation per call.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};
use crate::load::{UnitLoader, UnitResolver};
use crate::runtime::UnitType;

use super::config::CompilerConfig;
use super::diagnostics::{Diagnostic, DiagnosticCollector};
use super::file_store::MemoryFileStore;
use super::options::{dependency_origins, merge_class_path};
use super::output::ArtifactTable;
use super::source::SourceUnit;
use super::toolchain::{CompilationTask, Toolchain};

/// Result of a successful compilation.
#[derive(Debug, Clone)]
pub struct CompiledUnit {
    /// Logical name that was compiled
    pub name: String,

    /// Snapshot of every artifact the toolchain wrote
    pub artifacts: ArtifactTable,

    /// Warnings and notes reported along the way
    pub diagnostics: Vec<Diagnostic>,

    /// Time spent in the toolchain
    pub elapsed: Duration,
}

impl CompiledUnit {
    /// Hand the artifacts to a new loader under `parent`.
    pub fn into_loader(self, parent: Arc<dyn UnitResolver>) -> Arc<UnitLoader> {
        UnitLoader::new(parent, self.artifacts)
    }

    /// Define the compiled unit and return it.
    pub fn load(self, parent: Arc<dyn UnitResolver>) -> Result<Arc<UnitType>> {
        let name = self.name.clone();
        let loader = self.into_loader(parent);
        let unit = loader.resolve(&name)?;
        tracing::debug!("Loaded {}", unit.name());
        Ok(unit)
    }
}

/// Drives a toolchain through one compilation per [`compile`](Self::compile) call.
///
/// The driver only holds static configuration. Every call builds its own
/// file store and diagnostics collector, so one driver can serve concurrent
/// callers.
#[derive(Clone)]
pub struct CompilationDriver {
    toolchain: Arc<dyn Toolchain>,
    config: CompilerConfig,
}

impl CompilationDriver {
    pub fn new(toolchain: Arc<dyn Toolchain>, config: CompilerConfig) -> Self {
        Self { toolchain, config }
    }

    pub fn toolchain(&self) -> &Arc<dyn Toolchain> {
        &self.toolchain
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Options for a call, with the origins of `dependencies` merged into the class path.
    pub fn options_for(&self, dependencies: &[Arc<UnitType>]) -> Result<Vec<String>> {
        if dependencies.is_empty() {
            return Ok(self.config.options.clone());
        }
        let origins = dependency_origins(dependencies)?;
        Ok(merge_class_path(&self.config.options, &origins))
    }

    /// Compile `source` as the unit `name`.
    pub fn compile(
        &self,
        name: &str,
        source: &str,
        dependencies: &[Arc<UnitType>],
    ) -> Result<CompiledUnit> {
        validate_logical_name(name)?;
        let options = self.options_for(dependencies)?;

        let unit = SourceUnit::new(name, source);
        let mut store = MemoryFileStore::new(self.toolchain.standard_file_manager());
        let mut diagnostics = DiagnosticCollector::new();

        tracing::debug!(
            "Compiling {} with {} ({} options)",
            unit.uri(),
            self.toolchain.name(),
            options.len()
        );

        let start = Instant::now();
        let success = self.toolchain.compile(CompilationTask {
            options: &options,
            file_manager: &mut store,
            diagnostics: &mut diagnostics,
            units: std::slice::from_ref(&unit),
        });
        let elapsed = start.elapsed();

        if !success {
            drop(store);
            tracing::debug!(
                "Compilation of {} failed with {} errors",
                name,
                diagnostics.error_count()
            );
            return Err(Error::CompilationFailed {
                unit: name.to_string(),
                diagnostics: diagnostics.format(),
            });
        }

        let artifacts = store.artifacts();
        drop(store);

        if self.config.log_diagnostics {
            for diagnostic in diagnostics.diagnostics() {
                tracing::warn!("{}", diagnostic);
            }
        }
        tracing::info!(
            "Compiled {} into {} artifacts ({} bytes) in {:?}",
            name,
            artifacts.len(),
            artifacts.total_bytes(),
            elapsed
        );

        Ok(CompiledUnit {
            name: name.to_string(),
            artifacts,
            diagnostics: diagnostics.into_diagnostics(),
            elapsed,
        })
    }
}

/// Check that `name` is a dotted sequence of identifiers.
pub fn validate_logical_name(name: &str) -> Result<()> {
    let valid_segment = |segment: &str| {
        let mut chars = segment.chars();
        chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
            && segment != "_"
    };

    if name.split('.').all(valid_segment) {
        Ok(())
    } else {
        Err(Error::InvalidArgument(format!(
            "`{name}` is not a dotted identifier"
        )))
    }
}
