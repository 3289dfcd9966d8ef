//! The boundary between the pipeline and the compiler it drives.
//!
//! A [`Toolchain`] translates source units into artifacts. It finds
//! existing units and writes new ones only through a [`FileManager`], and
//! reports problems only through a [`DiagnosticListener`]. The pipeline
//! relies on both to keep a compilation entirely in memory.

use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use super::diagnostics::DiagnosticListener;
use super::source::SourceUnit;

/// What a file object holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    /// Source text.
    Source,
    /// A compiled unit image.
    Unit,
    /// Any other generated artifact.
    Other,
}

impl ArtifactKind {
    /// File extension including the leading dot (empty for [`ArtifactKind::Other`]).
    pub fn extension(self) -> &'static str {
        match self {
            Self::Source => ".rs",
            Self::Unit => ".unit",
            Self::Other => "",
        }
    }

    /// Kind implied by a file name's extension.
    pub fn from_file_name(name: &str) -> Self {
        if name.ends_with(Self::Source.extension()) {
            Self::Source
        } else if name.ends_with(Self::Unit.extension()) {
            Self::Unit
        } else {
            Self::Other
        }
    }
}

/// Where a file manager looks for, or puts, file objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Location {
    /// Additional sources.
    SourcePath,
    /// Compiled units the source may reference.
    ClassPath,
    /// Where new artifacts are written.
    ClassOutput,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SourcePath => f.write_str("source path"),
            Self::ClassPath => f.write_str("class path"),
            Self::ClassOutput => f.write_str("class output"),
        }
    }
}

/// An existing file object found by a file manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileObject {
    kind: ArtifactKind,
    path: PathBuf,
    root: PathBuf,
}

impl FileObject {
    /// `path` must lie under `root`, the location entry it was found in.
    pub fn new(kind: ArtifactKind, path: PathBuf, root: PathBuf) -> Self {
        Self { kind, path, root }
    }

    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The location entry (directory) this object was found under.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn uri(&self) -> String {
        format!("file://{}", self.path.display())
    }

    /// Whether the object is `simple_name` + the extension of `kind`.
    pub fn is_name_compatible(&self, simple_name: &str, kind: ArtifactKind) -> bool {
        kind == self.kind
            && self
                .path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.strip_suffix(kind.extension()) == Some(simple_name))
    }

    pub fn read_bytes(&self) -> io::Result<Vec<u8>> {
        fs::read(&self.path)
    }
}

/// File access used by a toolchain during one compilation.
///
/// This is the complete contract a toolchain may rely on; decorators must
/// forward every method they do not override.
pub trait FileManager: Send {
    /// Number of values the option takes, or `None` if unsupported.
    fn is_supported_option(&self, option: &str) -> Option<usize>;

    /// Apply an option with its values. Returns `false` if not recognised.
    fn handle_option(&mut self, option: &str, values: &[String]) -> io::Result<bool>;

    fn has_location(&self, location: Location) -> bool;

    /// File objects of the given kinds in a dotted package.
    fn list(
        &self,
        location: Location,
        package: &str,
        kinds: &[ArtifactKind],
        recurse: bool,
    ) -> io::Result<Vec<FileObject>>;

    /// Dotted name of a file object relative to its location entry.
    fn infer_binary_name(&self, location: Location, file: &FileObject) -> Option<String>;

    fn is_same_file(&self, a: &FileObject, b: &FileObject) -> bool;

    /// Look up an existing file object by dotted name.
    fn get_input(
        &self,
        location: Location,
        name: &str,
        kind: ArtifactKind,
    ) -> io::Result<Option<FileObject>>;

    /// Open a byte sink for a new artifact.
    fn get_output(
        &mut self,
        location: Location,
        name: &str,
        kind: ArtifactKind,
        sibling: Option<&SourceUnit>,
    ) -> io::Result<Box<dyn Write + '_>>;

    fn flush(&mut self) -> io::Result<()>;

    /// Release held resources. Further use is unspecified.
    fn close(&mut self) -> io::Result<()>;
}

/// Everything a toolchain gets for one compilation.
pub struct CompilationTask<'a> {
    pub options: &'a [String],
    pub file_manager: &'a mut dyn FileManager,
    pub diagnostics: &'a mut dyn DiagnosticListener,
    pub units: &'a [SourceUnit],
}

/// A compiler the pipeline delegates translation to.
pub trait Toolchain: Send + Sync {
    fn name(&self) -> &str;

    fn version(&self) -> &str;

    /// A fresh file manager resolving existing units from disk.
    fn standard_file_manager(&self) -> Box<dyn FileManager>;

    /// Number of values a toolchain option takes, or `None` if unsupported.
    fn is_supported_option(&self, option: &str) -> Option<usize>;

    /// Run the compilation. Returns `true` on success.
    fn compile(&self, task: CompilationTask<'_>) -> bool;
}
