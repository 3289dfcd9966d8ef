//! Unit loaders.
//!
//! Every successful compilation gets its own [`UnitLoader`], which defines
//! units from that compilation's artifacts and delegates everything else to
//! a parent. The root of every chain is usually a [`HostLoader`] holding the
//! units the host process already knows about.
//!
//! ```text
//! HostLoader (registered + on-disk units)
//!     ├── UnitLoader #1 ── demo.Counter
//!     └── UnitLoader #2 ── demo.Counter   (distinct type, same name)
//! ```

mod host;
mod unit_loader;

use std::sync::Arc;

use crate::error::Result;
use crate::runtime::UnitType;

pub use host::HostLoader;
pub use unit_loader::UnitLoader;

/// Resolves a dotted unit name to a defined unit.
pub trait UnitResolver: Send + Sync {
    /// Fails with [`Error::TypeNotFound`](crate::error::Error::TypeNotFound)
    /// when neither this resolver nor its parents know the name.
    fn resolve(&self, name: &str) -> Result<Arc<UnitType>>;
}
