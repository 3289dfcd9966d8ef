//! Loader over the artifacts of one compilation.

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use rustc_hash::FxHashMap;

use crate::compile::{ArtifactKind, ArtifactTable};
use crate::error::{Error, Result};
use crate::runtime::{UnitImage, UnitType};

use super::UnitResolver;

/// Defines units from one compilation's artifacts, delegating unknown names
/// to its parent.
///
/// Artifacts are consumed when defined. The loader keeps the decoded image
/// but only a weak handle to the unit, so units do not keep themselves
/// alive through their loader. A name whose unit has been dropped is defined
/// again from the retained image.
pub struct UnitLoader {
    this: Weak<UnitLoader>,
    parent: Arc<dyn UnitResolver>,
    artifacts: Mutex<ArtifactTable>,
    defined: Mutex<FxHashMap<String, Definition>>,
}

struct Definition {
    image: UnitImage,
    unit: Weak<UnitType>,
}

impl UnitLoader {
    pub fn new(parent: Arc<dyn UnitResolver>, artifacts: ArtifactTable) -> Arc<Self> {
        tracing::debug!("New unit loader over {} artifacts", artifacts.len());
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            parent,
            artifacts: Mutex::new(artifacts),
            defined: Mutex::new(FxHashMap::default()),
        })
    }

    pub fn parent(&self) -> &Arc<dyn UnitResolver> {
        &self.parent
    }

    /// Names of artifacts not yet defined, sorted.
    pub fn pending(&self) -> Vec<String> {
        lock(&self.artifacts)
            .names()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// Define `name` from this loader's own artifacts.
    ///
    /// Removes the artifact. A second call for the same name fails with
    /// [`Error::TypeNotFound`]; use [`resolve`](UnitResolver::resolve) to get
    /// the existing definition.
    pub fn find_local(&self, name: &str) -> Result<Arc<UnitType>> {
        self.take_local(&mut lock(&self.defined), name)
    }

    /// Unit already defined here under `name`.
    pub fn find_defined(&self, name: &str) -> Result<Option<Arc<UnitType>>> {
        self.lookup(&mut lock(&self.defined), name)
    }

    fn take_local(
        &self,
        defined: &mut FxHashMap<String, Definition>,
        name: &str,
    ) -> Result<Arc<UnitType>> {
        let output = lock(&self.artifacts)
            .take(name)
            .ok_or_else(|| Error::TypeNotFound(name.to_string()))?;

        if output.kind() != ArtifactKind::Unit {
            return Err(Error::MalformedArtifact {
                name: name.to_string(),
                reason: format!("artifact of kind {:?} cannot be defined", output.kind()),
            });
        }

        let image = UnitImage::decode(name, output.bytes())?;
        let unit = self.define(image.clone())?;
        defined.insert(
            name.to_string(),
            Definition {
                image,
                unit: Arc::downgrade(&unit),
            },
        );
        tracing::debug!("Defined {} ({} bytes)", name, output.len());
        Ok(unit)
    }

    fn lookup(
        &self,
        defined: &mut FxHashMap<String, Definition>,
        name: &str,
    ) -> Result<Option<Arc<UnitType>>> {
        let Some(definition) = defined.get_mut(name) else {
            return Ok(None);
        };
        if let Some(unit) = definition.unit.upgrade() {
            return Ok(Some(unit));
        }

        tracing::debug!("Redefining {} after its last handle was dropped", name);
        let unit = self.define(definition.image.clone())?;
        definition.unit = Arc::downgrade(&unit);
        Ok(Some(unit))
    }

    fn define(&self, image: UnitImage) -> Result<Arc<UnitType>> {
        let resolver: Arc<dyn UnitResolver> = self
            .this
            .upgrade()
            .ok_or_else(|| Error::Execution("unit loader dropped during definition".into()))?;
        Ok(Arc::new(UnitType::define(image, None, resolver)))
    }
}

impl UnitResolver for UnitLoader {
    fn resolve(&self, name: &str) -> Result<Arc<UnitType>> {
        {
            // Held across lookup and definition so a name is defined once.
            let mut defined = lock(&self.defined);
            if let Some(unit) = self.lookup(&mut defined, name)? {
                return Ok(unit);
            }
            match self.take_local(&mut defined, name) {
                Err(Error::TypeNotFound(_)) => {}
                other => return other,
            }
        }

        tracing::debug!("{} not local, delegating to parent", name);
        self.parent.resolve(name)
    }
}

impl std::fmt::Debug for UnitLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitLoader")
            .field("pending", &self.pending())
            .finish_non_exhaustive()
    }
}

/// Lock a mutex, recovering the data if a previous holder panicked.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::compile::OutputUnit;
    use crate::load::HostLoader;
    use crate::runtime::{ConstructorDecl, Expr, FieldDecl, TypeRef, Value};

    fn image(name: &str) -> UnitImage {
        UnitImage {
            name: name.to_string(),
            source: String::new(),
            fields: vec![FieldDecl {
                name: "n".to_string(),
                ty: TypeRef::Int,
            }],
            constructors: vec![ConstructorDecl {
                name: "new".to_string(),
                params: Vec::new(),
                locals: 0,
                body: Vec::new(),
                init: vec![Expr::Int(7)],
            }],
        }
    }

    fn table(names: &[&str]) -> ArtifactTable {
        let mut table = ArtifactTable::new();
        for name in names {
            let mut unit = OutputUnit::new(*name, ArtifactKind::Unit);
            unit.write_all(&image(name).encode().unwrap()).unwrap();
            table.insert(unit);
        }
        table
    }

    #[test]
    fn test_find_local_consumes() {
        let loader = UnitLoader::new(HostLoader::new(), table(&["demo.A"]));
        let unit = loader.find_local("demo.A").unwrap();
        assert_eq!(unit.name(), "demo.A");
        assert!(matches!(
            loader.find_local("demo.A"),
            Err(Error::TypeNotFound(_))
        ));
        assert!(loader.pending().is_empty());
    }

    #[test]
    fn test_resolve_returns_same_definition() {
        let loader = UnitLoader::new(HostLoader::new(), table(&["demo.A"]));
        let first = loader.resolve("demo.A").unwrap();
        let second = loader.resolve("demo.A").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_resolve_delegates_to_parent() {
        let host = HostLoader::new();
        let shared = host.define_image(image("demo.Shared"), None).unwrap();
        let loader = UnitLoader::new(host, table(&["demo.A"]));

        let resolved = loader.resolve("demo.Shared").unwrap();
        assert!(Arc::ptr_eq(&resolved, &shared));
        assert!(matches!(
            loader.resolve("demo.Missing"),
            Err(Error::TypeNotFound(name)) if name == "demo.Missing"
        ));
    }

    #[test]
    fn test_local_artifact_shadows_parent() {
        let host = HostLoader::new();
        let hosted = host.define_image(image("demo.A"), None).unwrap();
        let loader = UnitLoader::new(host, table(&["demo.A"]));

        let local = loader.resolve("demo.A").unwrap();
        assert!(!Arc::ptr_eq(&local, &hosted));
    }

    #[test]
    fn test_sibling_loaders_are_isolated() {
        let host = HostLoader::new();
        let a = UnitLoader::new(host.clone(), table(&["demo.A"]));
        let b = UnitLoader::new(host, table(&["demo.A"]));

        let from_a = a.resolve("demo.A").unwrap();
        let from_b = b.resolve("demo.A").unwrap();
        assert_eq!(from_a.name(), from_b.name());
        assert!(!Arc::ptr_eq(&from_a, &from_b));
    }

    #[test]
    fn test_unit_keeps_loader_alive() {
        let unit = UnitLoader::new(HostLoader::new(), table(&["demo.A"]))
            .resolve("demo.A")
            .unwrap();
        let instance = unit.new_instance().unwrap();
        assert_eq!(instance.get("n"), Some(&Value::Int(7)));
    }

    #[test]
    fn test_dropped_unit_is_redefined() {
        let loader = UnitLoader::new(HostLoader::new(), table(&["demo.A"]));
        drop(loader.resolve("demo.A").unwrap());
        assert!(loader.pending().is_empty());

        let again = loader.resolve("demo.A").unwrap();
        assert_eq!(again.new_instance().unwrap().get("n"), Some(&Value::Int(7)));
        let cached = loader.find_defined("demo.A").unwrap().unwrap();
        assert!(Arc::ptr_eq(&again, &cached));
        assert!(loader.find_defined("demo.B").unwrap().is_none());
    }

    #[test]
    fn test_malformed_artifact() {
        let mut artifacts = ArtifactTable::new();
        let mut bad = OutputUnit::new("demo.Bad", ArtifactKind::Unit);
        bad.write_all(b"nope").unwrap();
        artifacts.insert(bad);
        artifacts.insert(OutputUnit::new("demo.Note", ArtifactKind::Other));

        let loader = UnitLoader::new(HostLoader::new(), artifacts);
        assert!(matches!(
            loader.resolve("demo.Bad"),
            Err(Error::MalformedArtifact { .. })
        ));
        assert!(matches!(
            loader.resolve("demo.Note"),
            Err(Error::MalformedArtifact { .. })
        ));
    }
}
