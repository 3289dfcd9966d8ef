//! Compilation option handling.

use std::sync::Arc;

use rustc_hash::FxHashSet;

use crate::error::{Error, Result};
use crate::runtime::UnitType;

/// Flag appended when options carry no class path yet.
pub const CLASS_PATH_FLAG: &str = "-cp";

/// Every spelling of the class-path flag, in lookup priority order.
pub const CLASS_PATH_FLAGS: [&str; 3] = ["-cp", "-classpath", "--class-path"];

/// Separator between class-path entries on this platform.
#[cfg(windows)]
pub const PATH_SEPARATOR: char = ';';

/// Separator between class-path entries on this platform.
#[cfg(not(windows))]
pub const PATH_SEPARATOR: char = ':';

/// Origins of `dependencies`, each physical location once, first occurrence first.
///
/// Fails if a dependency was not loaded from disk and so has no origin.
pub fn dependency_origins(dependencies: &[Arc<UnitType>]) -> Result<Vec<String>> {
    let mut seen = FxHashSet::default();
    let mut origins = Vec::new();

    for dependency in dependencies {
        let origin = dependency.origin().ok_or_else(|| {
            Error::InvalidArgument(format!(
                "dependency `{}` has no origin; only units loaded from a directory can extend the class path",
                dependency.name()
            ))
        })?;

        let origin = origin.display().to_string();
        if seen.insert(origin.clone()) {
            origins.push(origin);
        }
    }

    Ok(origins)
}

/// Merge class-path entries into an option list.
///
/// An existing class-path flag with a value keeps its position and has the
/// new entries appended to its value. A trailing flag without a value, or
/// no flag at all, gets a new `-cp <paths>` pair at the end. Entries already
/// on the class path are not repeated.
pub fn merge_class_path(options: &[String], paths: &[String]) -> Vec<String> {
    let mut merged = options.to_vec();
    if paths.is_empty() {
        return merged;
    }

    let existing = CLASS_PATH_FLAGS
        .iter()
        .find_map(|flag| options.iter().position(|o| o == flag))
        .filter(|&idx| idx + 1 < options.len());

    match existing {
        Some(idx) => {
            merged[idx + 1] = join_class_path(&options[idx + 1], paths);
        }
        None => {
            merged.push(CLASS_PATH_FLAG.to_string());
            merged.push(join_class_path("", paths));
        }
    }

    merged
}

fn join_class_path(original: &str, paths: &[String]) -> String {
    let mut entries: Vec<&str> = original
        .split(PATH_SEPARATOR)
        .filter(|e| !e.is_empty())
        .collect();

    for path in paths {
        if !entries.contains(&path.as_str()) {
            entries.push(path);
        }
    }

    entries.join(&PATH_SEPARATOR.to_string())
}

/// Split a class-path value into its entries.
pub fn split_class_path(value: &str) -> impl Iterator<Item = &str> {
    value.split(PATH_SEPARATOR).filter(|e| !e.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn sep(items: &[&str]) -> String {
        items.join(&PATH_SEPARATOR.to_string())
    }

    #[test]
    fn test_extends_existing_flag_in_place() {
        let merged = merge_class_path(&opts(&["-nowarn", "-cp", "/a", "-Werror"]), &opts(&["/b"]));
        assert_eq!(merged, vec!["-nowarn".to_string(), "-cp".into(), sep(&["/a", "/b"]), "-Werror".into()]);
        assert_eq!(merged.iter().filter(|o| *o == "-cp").count(), 1);
    }

    #[test]
    fn test_long_flag_spelling() {
        let merged = merge_class_path(&opts(&["-classpath", "/a"]), &opts(&["/b", "/c"]));
        assert_eq!(merged, vec!["-classpath".to_string(), sep(&["/a", "/b", "/c"])]);
    }

    #[test]
    fn test_appends_when_absent() {
        let merged = merge_class_path(&opts(&["-nowarn"]), &opts(&["/b"]));
        assert_eq!(merged, opts(&["-nowarn", "-cp", "/b"]));
    }

    #[test]
    fn test_trailing_flag_without_value() {
        let merged = merge_class_path(&opts(&["-cp"]), &opts(&["/b"]));
        assert_eq!(merged, opts(&["-cp", "-cp", "/b"]));
    }

    #[test]
    fn test_no_paths_leaves_options() {
        let options = opts(&["-cp", "/a"]);
        assert_eq!(merge_class_path(&options, &[]), options);
    }

    #[test]
    fn test_skips_entries_already_present() {
        let merged = merge_class_path(&opts(&["-cp", "/a"]), &opts(&["/a", "/b"]));
        assert_eq!(merged, vec!["-cp".to_string(), sep(&["/a", "/b"])]);
    }

    #[test]
    fn test_split_class_path() {
        let value = sep(&["/a", "", "/b"]);
        assert_eq!(split_class_path(&value).collect::<Vec<_>>(), vec!["/a", "/b"]);
    }
}
