//! The runtime compiler façade.

use std::sync::Arc;

use memoc_core::{
    CompilationDriver, CompiledUnit, CompilerConfig, Error, HostLoader, Instance, Result,
    Toolchain, UnitResolver, UnitType, Value,
};

/// The toolchain compiled into this build.
///
/// Fails with [`Error::ToolchainUnavailable`] when memoc was built without
/// the `unitc` feature.
#[cfg(feature = "unitc")]
pub fn system_toolchain() -> Result<Arc<dyn Toolchain>> {
    Ok(Arc::new(memoc_unitc::UnitCompiler::new()))
}

#[cfg(not(feature = "unitc"))]
pub fn system_toolchain() -> Result<Arc<dyn Toolchain>> {
    Err(Error::ToolchainUnavailable(
        "memoc was built without the `unitc` feature; pass a toolchain to RuntimeCompiler::with_toolchain".into(),
    ))
}

/// Compiles source text and loads the result into the running process.
///
/// Every call is an independent, synchronous, in-memory compilation: a
/// fresh file store and diagnostics collector, a fresh loader for the
/// artifacts, nothing cached between calls. One compiler can be shared
/// across threads.
///
/// Loaders created by this compiler delegate names they do not define to
/// the parent resolver, [`HostLoader::system`] unless replaced with
/// [`with_parent`](Self::with_parent).
#[derive(Clone)]
pub struct RuntimeCompiler {
    driver: CompilationDriver,
    parent: Arc<dyn UnitResolver>,
}

impl RuntimeCompiler {
    /// Compiler over the system toolchain with options from `MEMOC_OPTIONS`.
    pub fn new() -> Result<Self> {
        Self::with_config(CompilerConfig::from_env())
    }

    /// Compiler over the system toolchain with fixed base options.
    pub fn with_options<I, S>(options: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_config(CompilerConfig::with_options(options))
    }

    pub fn with_config(config: CompilerConfig) -> Result<Self> {
        let toolchain = system_toolchain()?;
        Ok(Self::with_toolchain(toolchain, config))
    }

    pub fn with_toolchain(toolchain: Arc<dyn Toolchain>, config: CompilerConfig) -> Self {
        tracing::debug!(
            "Using toolchain {} {}",
            toolchain.name(),
            toolchain.version()
        );
        Self {
            driver: CompilationDriver::new(toolchain, config),
            parent: HostLoader::system(),
        }
    }

    /// Replace the resolver loaders fall back to.
    pub fn with_parent(mut self, parent: Arc<dyn UnitResolver>) -> Self {
        self.parent = parent;
        self
    }

    pub fn driver(&self) -> &CompilationDriver {
        &self.driver
    }

    pub fn parent(&self) -> &Arc<dyn UnitResolver> {
        &self.parent
    }

    /// Compile without loading, returning the raw artifacts.
    pub fn compile(
        &self,
        name: &str,
        source: &str,
        dependencies: &[Arc<UnitType>],
    ) -> Result<CompiledUnit> {
        self.driver.compile(name, source, dependencies)
    }

    pub fn compile_to_type(&self, name: &str, source: &str) -> Result<Arc<UnitType>> {
        self.compile_to_type_with_dependencies(name, source, &[])
    }

    /// Compile with the origins of `dependencies` on the class path, then
    /// load the unit named `name`.
    pub fn compile_to_type_with_dependencies(
        &self,
        name: &str,
        source: &str,
        dependencies: &[Arc<UnitType>],
    ) -> Result<Arc<UnitType>> {
        let compiled = self.compile(name, source, dependencies)?;
        compiled.load(Arc::clone(&self.parent))
    }

    /// Compile, load and construct with the zero-argument constructor.
    pub fn compile_to_instance(&self, name: &str, source: &str) -> Result<Instance> {
        self.compile_to_instance_with_dependencies_and_args(name, source, &[], &[])
    }

    pub fn compile_to_instance_with_args(
        &self,
        name: &str,
        source: &str,
        args: &[Value],
    ) -> Result<Instance> {
        self.compile_to_instance_with_dependencies_and_args(name, source, &[], args)
    }

    pub fn compile_to_instance_with_dependencies(
        &self,
        name: &str,
        source: &str,
        dependencies: &[Arc<UnitType>],
    ) -> Result<Instance> {
        self.compile_to_instance_with_dependencies_and_args(name, source, dependencies, &[])
    }

    /// Compile, load and construct with the constructor whose parameter
    /// types match `args`.
    pub fn compile_to_instance_with_dependencies_and_args(
        &self,
        name: &str,
        source: &str,
        dependencies: &[Arc<UnitType>],
        args: &[Value],
    ) -> Result<Instance> {
        if let Some(i) = args.iter().position(Value::is_null) {
            return Err(Error::InvalidArgument(format!(
                "argument {} is null; a constructor cannot be selected from a null value",
                i + 1
            )));
        }

        let unit = self.compile_to_type_with_dependencies(name, source, dependencies)?;
        unit.construct(args)
    }
}

impl std::fmt::Debug for RuntimeCompiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeCompiler")
            .field("toolchain", &self.driver.toolchain().name())
            .field("config", self.driver.config())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(feature = "unitc")]
    #[test]
    fn test_system_toolchain() {
        let toolchain = system_toolchain().unwrap();
        assert_eq!(toolchain.name(), "unitc");
        assert_eq!(toolchain.is_supported_option("-Werror"), Some(0));
    }

    #[cfg(not(feature = "unitc"))]
    #[test]
    fn test_system_toolchain_unavailable() {
        assert!(matches!(system_toolchain(), Err(Error::ToolchainUnavailable(_))));
        assert!(matches!(
            RuntimeCompiler::new(),
            Err(Error::ToolchainUnavailable(_))
        ));
    }

    #[cfg(feature = "unitc")]
    #[test]
    fn test_null_argument_fails_before_compiling() {
        let compiler = RuntimeCompiler::with_options(Vec::<String>::new()).unwrap();
        // The source is invalid, so reaching the toolchain would fail differently.
        let err = compiler
            .compile_to_instance_with_args("demo.Broken", "pub struct", &[Value::Null])
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[cfg(feature = "unitc")]
    #[test]
    fn test_with_parent() {
        let host = HostLoader::new();
        let compiler = RuntimeCompiler::with_options(Vec::<String>::new())
            .unwrap()
            .with_parent(host.clone());
        let unit = compiler.compile_to_type("demo.Leaf", "pub struct Leaf;").unwrap();

        let parent: Arc<dyn UnitResolver> = host;
        assert!(Arc::ptr_eq(compiler.parent(), &parent));
        assert_eq!(unit.name(), "demo.Leaf");
        assert!(format!("{compiler:?}").contains("unitc"));
    }
}
