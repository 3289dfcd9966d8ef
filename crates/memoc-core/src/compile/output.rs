//! In-memory output units and the artifact table.

use std::io::{self, Write};

use rustc_hash::FxHashMap;

use super::source::memory_uri;
use super::toolchain::ArtifactKind;

/// Byte sink for one artifact written by the toolchain.
#[derive(Debug, Clone)]
pub struct OutputUnit {
    name: String,
    kind: ArtifactKind,
    uri: String,
    bytes: Vec<u8>,
}

impl OutputUnit {
    pub fn new(name: impl Into<String>, kind: ArtifactKind) -> Self {
        let name = name.into();
        let uri = memory_uri(&name, kind);
        Self {
            name,
            kind,
            uri,
            bytes: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Bytes written so far.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl Write for OutputUnit {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Artifacts of one compilation attempt, keyed by logical name.
#[derive(Debug, Clone, Default)]
pub struct ArtifactTable {
    units: FxHashMap<String, OutputUnit>,
}

impl ArtifactTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an output unit, returning the one it replaced.
    pub fn insert(&mut self, unit: OutputUnit) -> Option<OutputUnit> {
        self.units.insert(unit.name.clone(), unit)
    }

    pub fn get(&self, name: &str) -> Option<&OutputUnit> {
        self.units.get(name)
    }

    pub(crate) fn get_mut(&mut self, name: &str) -> Option<&mut OutputUnit> {
        self.units.get_mut(name)
    }

    /// Remove and return an artifact.
    pub fn take(&mut self, name: &str) -> Option<OutputUnit> {
        self.units.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.units.contains_key(name)
    }

    /// Artifact names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.units.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn iter(&self) -> impl Iterator<Item = &OutputUnit> {
        self.units.values()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Total bytes across all artifacts.
    pub fn total_bytes(&self) -> usize {
        self.units.values().map(OutputUnit::len).sum()
    }
}
