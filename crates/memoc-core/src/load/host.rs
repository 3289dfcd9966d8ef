//! The root loader: units known to the host process.

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock, RwLock, Weak};

use rustc_hash::FxHashMap;

use crate::compile::ArtifactKind;
use crate::error::{Error, Result};
use crate::runtime::{UnitImage, UnitType};

use super::UnitResolver;

static SYSTEM: OnceLock<Arc<HostLoader>> = OnceLock::new();

/// Registry of units available to every loader chain rooted here.
///
/// Units defined by a host keep it alive, and the host keeps them
/// registered, so a host lives until the process ends. Use one host per
/// independent context rather than one per compilation.
pub struct HostLoader {
    this: Weak<HostLoader>,
    units: RwLock<FxHashMap<String, Arc<UnitType>>>,
}

impl HostLoader {
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            units: RwLock::new(FxHashMap::default()),
        })
    }

    /// Process-wide host used when no parent is given.
    pub fn system() -> Arc<Self> {
        Arc::clone(SYSTEM.get_or_init(Self::new))
    }

    /// Make an already defined unit resolvable by name.
    ///
    /// Returns the unit previously registered under the same name.
    pub fn register(&self, unit: Arc<UnitType>) -> Option<Arc<UnitType>> {
        tracing::debug!("Registering {} with host", unit.name());
        self.write().insert(unit.name().to_string(), unit)
    }

    /// Define a unit from an image and register it.
    pub fn define_image(&self, image: UnitImage, origin: Option<PathBuf>) -> Result<Arc<UnitType>> {
        let resolver: Arc<dyn UnitResolver> = self
            .this
            .upgrade()
            .ok_or_else(|| Error::Execution("host loader dropped during definition".into()))?;
        let unit = Arc::new(UnitType::define(image, origin, resolver));
        self.register(Arc::clone(&unit));
        Ok(unit)
    }

    /// Define `name` from `<origin>/<package dirs>/<Name>.unit` and register it.
    ///
    /// The resulting unit records `origin`, so it can be passed as a
    /// compilation dependency.
    pub fn define_from_origin(&self, origin: impl AsRef<Path>, name: &str) -> Result<Arc<UnitType>> {
        let origin = origin.as_ref();
        let path = origin.join(format!(
            "{}{}",
            name.replace('.', "/"),
            ArtifactKind::Unit.extension()
        ));

        let bytes = std::fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::TypeNotFound(name.to_string())
            } else {
                Error::Io(e)
            }
        })?;

        let image = UnitImage::decode(name, &bytes)?;
        tracing::debug!("Defining {} from {}", name, path.display());
        self.define_image(image, Some(origin.to_path_buf()))
    }

    pub fn get(&self, name: &str) -> Option<Arc<UnitType>> {
        self.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort_unstable();
        names
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, FxHashMap<String, Arc<UnitType>>> {
        self.units.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, FxHashMap<String, Arc<UnitType>>> {
        self.units.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl UnitResolver for HostLoader {
    fn resolve(&self, name: &str) -> Result<Arc<UnitType>> {
        self.get(name)
            .ok_or_else(|| Error::TypeNotFound(name.to_string()))
    }
}

impl std::fmt::Debug for HostLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostLoader")
            .field("units", &self.names())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{ConstructorDecl, Expr, FieldDecl, TypeRef, Value};

    fn point() -> UnitImage {
        UnitImage {
            name: "geom.Point".to_string(),
            source: "memo:///geom/Point.rs".to_string(),
            fields: vec![FieldDecl {
                name: "x".to_string(),
                ty: TypeRef::Int,
            }],
            constructors: vec![ConstructorDecl {
                name: "new".to_string(),
                params: Vec::new(),
                locals: 0,
                body: Vec::new(),
                init: vec![Expr::Int(3)],
            }],
        }
    }

    #[test]
    fn test_define_and_resolve() {
        let host = HostLoader::new();
        let unit = host.define_image(point(), None).unwrap();
        assert!(host.contains("geom.Point"));
        assert!(Arc::ptr_eq(&host.resolve("geom.Point").unwrap(), &unit));
        assert!(matches!(
            host.resolve("geom.Line"),
            Err(Error::TypeNotFound(_))
        ));
    }

    #[test]
    fn test_define_from_origin() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("geom")).unwrap();
        std::fs::write(dir.path().join("geom/Point.unit"), point().encode().unwrap()).unwrap();

        let host = HostLoader::new();
        let unit = host.define_from_origin(dir.path(), "geom.Point").unwrap();
        assert_eq!(unit.origin(), Some(dir.path()));
        assert_eq!(unit.new_instance().unwrap().get("x"), Some(&Value::Int(3)));

        assert!(matches!(
            host.define_from_origin(dir.path(), "geom.Line"),
            Err(Error::TypeNotFound(_))
        ));
    }

    #[test]
    fn test_register_replaces() {
        let host = HostLoader::new();
        let first = host.define_image(point(), None).unwrap();
        let other = HostLoader::new().define_image(point(), None).unwrap();
        let replaced = host.register(Arc::clone(&other)).unwrap();
        assert!(Arc::ptr_eq(&replaced, &first));
        assert_eq!(host.names(), vec!["geom.Point".to_string()]);
    }

    #[test]
    fn test_system_is_shared() {
        assert!(Arc::ptr_eq(&HostLoader::system(), &HostLoader::system()));
    }
}
