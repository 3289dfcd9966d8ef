//! File manager decorator that keeps every output in memory.

use std::io::{self, Write};

use super::output::{ArtifactTable, OutputUnit};
use super::source::SourceUnit;
use super::toolchain::{ArtifactKind, FileManager, FileObject, Location};

/// Wraps a toolchain's standard file manager, capturing outputs in memory.
///
/// Only [`FileManager::get_output`] is overridden; lookups of existing units
/// still go to the wrapped manager so the toolchain can resolve the class
/// path. The wrapped manager is closed exactly once, by [`FileManager::close`]
/// or when the store is dropped.
pub struct MemoryFileStore {
    inner: Box<dyn FileManager>,
    outputs: ArtifactTable,
    closed: bool,
}

impl MemoryFileStore {
    pub fn new(inner: Box<dyn FileManager>) -> Self {
        Self {
            inner,
            outputs: ArtifactTable::new(),
            closed: false,
        }
    }

    /// Copy of the artifacts written so far.
    pub fn artifacts(&self) -> ArtifactTable {
        self.outputs.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl FileManager for MemoryFileStore {
    fn is_supported_option(&self, option: &str) -> Option<usize> {
        self.inner.is_supported_option(option)
    }

    fn handle_option(&mut self, option: &str, values: &[String]) -> io::Result<bool> {
        self.inner.handle_option(option, values)
    }

    fn has_location(&self, location: Location) -> bool {
        location == Location::ClassOutput || self.inner.has_location(location)
    }

    fn list(
        &self,
        location: Location,
        package: &str,
        kinds: &[ArtifactKind],
        recurse: bool,
    ) -> io::Result<Vec<FileObject>> {
        self.inner.list(location, package, kinds, recurse)
    }

    fn infer_binary_name(&self, location: Location, file: &FileObject) -> Option<String> {
        self.inner.infer_binary_name(location, file)
    }

    fn is_same_file(&self, a: &FileObject, b: &FileObject) -> bool {
        self.inner.is_same_file(a, b)
    }

    fn get_input(
        &self,
        location: Location,
        name: &str,
        kind: ArtifactKind,
    ) -> io::Result<Option<FileObject>> {
        self.inner.get_input(location, name, kind)
    }

    fn get_output(
        &mut self,
        location: Location,
        name: &str,
        kind: ArtifactKind,
        sibling: Option<&SourceUnit>,
    ) -> io::Result<Box<dyn Write + '_>> {
        tracing::debug!(
            "Capturing {:?} output {} ({}) from {}",
            kind,
            name,
            location,
            sibling.map_or("<none>", SourceUnit::uri)
        );

        if self.outputs.insert(OutputUnit::new(name, kind)).is_some() {
            tracing::debug!("Output {} requested again, discarding earlier bytes", name);
        }

        let unit = self
            .outputs
            .get_mut(name)
            .ok_or_else(|| io::Error::other(format!("output {name} vanished")))?;
        Ok(Box::new(unit))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }

    fn close(&mut self) -> io::Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.inner.close()
    }
}

impl Drop for MemoryFileStore {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            // Artifacts are already captured; nothing depends on the release.
            tracing::warn!("Failed to release file manager resources: {}", e);
        }
    }
}
