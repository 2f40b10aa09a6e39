//! Locating profile files under a scan base.

use crate::errors::{Error, Result};
use log::debug;
use std::path::{Path, PathBuf};

/// Candidate file names for the default profile, in priority order; the
/// first that exists wins.
const DEFAULT_CANDIDATES: &[&str] = &[
    ".copytree.yml",
    ".copytree.yaml",
    ".copytree.json",
    ".copytree",
];

/// Finds the default profile file for `base`, if any.
pub fn discover_profile(base: &Path) -> Option<PathBuf> {
    for candidate in DEFAULT_CANDIDATES {
        let path = base.join(candidate);
        if path.is_file() {
            debug!("Discovered profile file {}", path.display());
            return Some(path);
        }
    }
    None
}

/// Finds the file for an explicitly requested named profile
/// (`.copytree-<name>.<ext>` across the same extensions, same priority).
///
/// # Errors
/// [`Error::ProfileNotFound`] when no candidate exists; an explicit request
/// must not fall back silently.
pub fn find_named_profile(base: &Path, name: &str) -> Result<PathBuf> {
    let candidates = [
        format!(".copytree-{name}.yml"),
        format!(".copytree-{name}.yaml"),
        format!(".copytree-{name}.json"),
        format!(".copytree-{name}"),
    ];
    for candidate in &candidates {
        let path = base.join(candidate);
        if path.is_file() {
            debug!("Discovered named profile file {}", path.display());
            return Ok(path);
        }
    }
    Err(Error::ProfileNotFound(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn yml_beats_yaml_beats_json_beats_ini() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join(".copytree"), "").unwrap();
        fs::write(temp.path().join(".copytree.json"), "{}").unwrap();
        fs::write(temp.path().join(".copytree.yaml"), "").unwrap();
        assert!(discover_profile(temp.path())
            .unwrap()
            .ends_with(".copytree.yaml"));
        fs::write(temp.path().join(".copytree.yml"), "").unwrap();
        assert!(discover_profile(temp.path())
            .unwrap()
            .ends_with(".copytree.yml"));
    }

    #[test]
    fn no_profile_is_none() {
        let temp = tempdir().unwrap();
        assert!(discover_profile(temp.path()).is_none());
    }

    #[test]
    fn missing_named_profile_is_an_error() {
        let temp = tempdir().unwrap();
        match find_named_profile(temp.path(), "docs") {
            Err(Error::ProfileNotFound(name)) => assert_eq!(name, "docs"),
            other => panic!("expected ProfileNotFound, got {other:?}"),
        }
    }

    #[test]
    fn named_profile_found_by_extension_priority() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join(".copytree-docs.json"), "{}").unwrap();
        let found = find_named_profile(temp.path(), "docs").unwrap();
        assert!(found.ends_with(".copytree-docs.json"));
    }
}
