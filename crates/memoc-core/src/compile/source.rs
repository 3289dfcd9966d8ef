//! In-memory source units.

use super::toolchain::ArtifactKind;

/// URI scheme for units that only exist in memory.
pub const MEMORY_SCHEME: &str = "memo";

/// Build the synthetic URI for a logical name, e.g.
/// `demo.Counter` + `.rs` → `memo:///demo/Counter.rs`.
pub fn memory_uri(name: &str, kind: ArtifactKind) -> String {
    format!(
        "{MEMORY_SCHEME}:///{}{}",
        name.replace('.', "/"),
        kind.extension()
    )
}

/// Source text presented to the toolchain as if it were a file.
#[derive(Debug, Clone)]
pub struct SourceUnit {
    name: String,
    uri: String,
    text: String,
}

impl SourceUnit {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        let name = name.into();
        let uri = memory_uri(&name, ArtifactKind::Source);
        Self {
            name,
            uri,
            text: text.into(),
        }
    }

    /// Logical dotted name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Full source text.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn kind(&self) -> ArtifactKind {
        ArtifactKind::Source
    }

    /// Package part of the logical name (empty for top-level names).
    pub fn package(&self) -> &str {
        self.name.rsplit_once('.').map_or("", |(pkg, _)| pkg)
    }

    /// Last segment of the logical name.
    pub fn simple_name(&self) -> &str {
        self.name
            .rsplit_once('.')
            .map_or(self.name.as_str(), |(_, simple)| simple)
    }
}
