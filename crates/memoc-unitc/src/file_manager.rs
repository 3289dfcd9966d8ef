//! File manager over class-path directories on disk.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use memoc_core::compile::{CLASS_PATH_FLAGS, split_class_path};
use memoc_core::{ArtifactKind, FileManager, FileObject, Location, SourceUnit};

/// Option setting the class output directory.
pub const OUTPUT_DIR_FLAG: &str = "-d";

/// Resolves existing units from class-path directories.
///
/// Read-only on the class path. Outputs go to the `-d` directory when one
/// is configured; without it `get_output` fails.
#[derive(Debug, Clone, Default)]
pub struct StandardFileManager {
    class_path: Vec<PathBuf>,
    output_dir: Option<PathBuf>,
}

impl StandardFileManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn class_path(&self) -> &[PathBuf] {
        &self.class_path
    }

    pub fn output_dir(&self) -> Option<&Path> {
        self.output_dir.as_deref()
    }

    fn roots(&self, location: Location) -> &[PathBuf] {
        match location {
            Location::ClassPath => &self.class_path,
            Location::ClassOutput => self.output_dir.as_slice(),
            Location::SourcePath => &[],
        }
    }

    fn relative_path(name: &str, kind: ArtifactKind) -> PathBuf {
        PathBuf::from(format!("{}{}", name.replace('.', "/"), kind.extension()))
    }
}

impl FileManager for StandardFileManager {
    fn is_supported_option(&self, option: &str) -> Option<usize> {
        (CLASS_PATH_FLAGS.contains(&option) || option == OUTPUT_DIR_FLAG).then_some(1)
    }

    fn handle_option(&mut self, option: &str, values: &[String]) -> io::Result<bool> {
        let Some(value) = values.first() else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("option `{option}` requires a value"),
            ));
        };

        if CLASS_PATH_FLAGS.contains(&option) {
            for entry in split_class_path(value) {
                let entry = PathBuf::from(entry);
                if !self.class_path.contains(&entry) {
                    self.class_path.push(entry);
                }
            }
            Ok(true)
        } else if option == OUTPUT_DIR_FLAG {
            self.output_dir = Some(PathBuf::from(value));
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn has_location(&self, location: Location) -> bool {
        !self.roots(location).is_empty()
    }

    fn list(
        &self,
        location: Location,
        package: &str,
        kinds: &[ArtifactKind],
        recurse: bool,
    ) -> io::Result<Vec<FileObject>> {
        let mut found = Vec::new();
        for root in self.roots(location) {
            let dir = if package.is_empty() {
                root.clone()
            } else {
                root.join(package.replace('.', "/"))
            };
            if dir.is_dir() {
                collect_files(&dir, root, kinds, recurse, &mut found)?;
            }
        }
        found.sort_by(|a, b| a.path().cmp(b.path()));
        Ok(found)
    }

    fn infer_binary_name(&self, location: Location, file: &FileObject) -> Option<String> {
        if !self.roots(location).iter().any(|r| r == file.root()) {
            return None;
        }
        let relative = file.path().strip_prefix(file.root()).ok()?;
        let relative = relative.to_str()?;
        let stem = relative.strip_suffix(file.kind().extension())?;
        Some(stem.replace(['/', '\\'], "."))
    }

    fn is_same_file(&self, a: &FileObject, b: &FileObject) -> bool {
        match (fs::canonicalize(a.path()), fs::canonicalize(b.path())) {
            (Ok(a), Ok(b)) => a == b,
            _ => a.path() == b.path(),
        }
    }

    fn get_input(
        &self,
        location: Location,
        name: &str,
        kind: ArtifactKind,
    ) -> io::Result<Option<FileObject>> {
        let relative = Self::relative_path(name, kind);
        Ok(self.roots(location).iter().find_map(|root| {
            let path = root.join(&relative);
            path.is_file()
                .then(|| FileObject::new(kind, path, root.clone()))
        }))
    }

    fn get_output(
        &mut self,
        location: Location,
        name: &str,
        kind: ArtifactKind,
        _sibling: Option<&SourceUnit>,
    ) -> io::Result<Box<dyn Write + '_>> {
        let dir = match (location, &self.output_dir) {
            (Location::ClassOutput, Some(dir)) => dir,
            _ => {
                return Err(io::Error::new(
                    io::ErrorKind::Unsupported,
                    format!("no {location} configured for `{name}`; pass {OUTPUT_DIR_FLAG} <dir>"),
                ));
            }
        };

        let path = dir.join(Self::relative_path(name, kind));
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        tracing::debug!("Writing {}", path.display());
        Ok(Box::new(fs::File::create(path)?))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn collect_files(
    dir: &Path,
    root: &Path,
    kinds: &[ArtifactKind],
    recurse: bool,
    found: &mut Vec<FileObject>,
) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            if recurse {
                collect_files(&path, root, kinds, recurse, found)?;
            }
            continue;
        }

        let kind = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(ArtifactKind::from_file_name);
        if let Some(kind) = kind
            && kinds.contains(&kind)
        {
            found.push(FileObject::new(kind, path, root.to_path_buf()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use memoc_core::compile::PATH_SEPARATOR;

    fn layout() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("geom/solid")).unwrap();
        fs::write(dir.path().join("geom/Point.unit"), b"p").unwrap();
        fs::write(dir.path().join("geom/Line.unit"), b"l").unwrap();
        fs::write(dir.path().join("geom/notes.txt"), b"n").unwrap();
        fs::write(dir.path().join("geom/solid/Cube.unit"), b"c").unwrap();
        dir
    }

    fn with_class_path(dirs: &[&Path]) -> StandardFileManager {
        let value = dirs
            .iter()
            .map(|d| d.display().to_string())
            .collect::<Vec<_>>()
            .join(&PATH_SEPARATOR.to_string());
        let mut fm = StandardFileManager::new();
        assert!(fm.handle_option("-cp", &[value]).unwrap());
        fm
    }

    #[test]
    fn test_options() {
        let mut fm = StandardFileManager::new();
        assert_eq!(fm.is_supported_option("-classpath"), Some(1));
        assert_eq!(fm.is_supported_option("-d"), Some(1));
        assert_eq!(fm.is_supported_option("-x"), None);
        assert!(!fm.has_location(Location::ClassPath));
        assert!(fm.handle_option("-cp", &[]).is_err());

        let value = format!("/a{PATH_SEPARATOR}/b{PATH_SEPARATOR}/a");
        assert!(fm.handle_option("--class-path", &[value]).unwrap());
        assert_eq!(fm.class_path(), &[PathBuf::from("/a"), PathBuf::from("/b")]);
        assert!(fm.has_location(Location::ClassPath));
        assert!(!fm.handle_option("-x", &["v".to_string()]).unwrap());
    }

    #[test]
    fn test_list_and_infer() {
        let dir = layout();
        let fm = with_class_path(&[dir.path()]);

        let flat = fm
            .list(Location::ClassPath, "geom", &[ArtifactKind::Unit], false)
            .unwrap();
        let names: Vec<String> = flat
            .iter()
            .filter_map(|f| fm.infer_binary_name(Location::ClassPath, f))
            .collect();
        assert_eq!(names, vec!["geom.Line", "geom.Point"]);

        let deep = fm
            .list(Location::ClassPath, "geom", &[ArtifactKind::Unit], true)
            .unwrap();
        assert_eq!(deep.len(), 3);
        assert!(
            deep.iter()
                .any(|f| fm.infer_binary_name(Location::ClassPath, f).as_deref()
                    == Some("geom.solid.Cube"))
        );
        assert!(
            fm.list(Location::ClassPath, "missing", &[ArtifactKind::Unit], true)
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn test_get_input() {
        let dir = layout();
        let empty = tempfile::tempdir().unwrap();
        let fm = with_class_path(&[empty.path(), dir.path()]);

        let point = fm
            .get_input(Location::ClassPath, "geom.Point", ArtifactKind::Unit)
            .unwrap()
            .unwrap();
        assert_eq!(point.root(), dir.path());
        assert_eq!(point.read_bytes().unwrap(), b"p");
        assert!(fm.is_same_file(&point, &point.clone()));
        assert!(
            fm.get_input(Location::ClassPath, "geom.Circle", ArtifactKind::Unit)
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_output_requires_directory() {
        let mut fm = StandardFileManager::new();
        assert!(
            fm.get_output(Location::ClassOutput, "geom.Point", ArtifactKind::Unit, None)
                .is_err()
        );

        let out = tempfile::tempdir().unwrap();
        fm.handle_option("-d", &[out.path().display().to_string()])
            .unwrap();
        fm.get_output(Location::ClassOutput, "geom.Point", ArtifactKind::Unit, None)
            .unwrap()
            .write_all(b"xyz")
            .unwrap();
        assert_eq!(fs::read(out.path().join("geom/Point.unit")).unwrap(), b"xyz");
    }
}
