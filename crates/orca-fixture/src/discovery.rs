//! Module discovery from Drupal `.info.yml` files.
//!
//! A module is not enabled when its info file sits under a `tests/`
//! directory, belongs to the `Testing` package, or is marked hidden.

use serde::Deserialize;
use std::collections::HashSet;
use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

const INFO_SUFFIX: &str = ".info.yml";

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("glob pattern error: {0}")]
    Glob(#[from] glob::PatternError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid info file {path}: {source}")]
    InvalidInfo {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Why a module is left disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exclusion {
    TestsPath,
    TestingPackage,
    Hidden,
}

/// A discovered module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleInfo {
    /// Machine name, i.e. the info file name without `.info.yml`.
    pub name: String,
    pub path: PathBuf,
    pub exclusion: Option<Exclusion>,
}

impl ModuleInfo {
    #[must_use]
    pub fn is_enablable(&self) -> bool {
        self.exclusion.is_none()
    }
}

#[derive(Deserialize)]
struct InfoFile {
    #[serde(default)]
    package: Option<String>,
    #[serde(default)]
    hidden: Option<serde_yaml::Value>,
}

/// Find every module info file below `root`, sorted by path.
pub fn discover_modules(root: &Path) -> Result<Vec<ModuleInfo>, DiscoveryError> {
    let pattern = format!(
        "{}/**/*{INFO_SUFFIX}",
        glob::Pattern::escape(&root.to_string_lossy())
    );

    let mut modules = Vec::new();
    for entry in glob::glob(&pattern)? {
        let path = entry.map_err(|e| DiscoveryError::Io(e.into_error()))?;
        let Some(name) = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_suffix(INFO_SUFFIX))
            .map(ToString::to_string)
        else {
            continue;
        };

        let relative = path.strip_prefix(root).unwrap_or(&path);
        let exclusion = if under_tests(relative) {
            Some(Exclusion::TestsPath)
        } else {
            classify(&path)?
        };

        modules.push(ModuleInfo {
            name,
            path,
            exclusion,
        });
    }

    Ok(modules)
}

/// Names of modules below `root` that must not be enabled.
///
/// A name is only excluded if none of its info files is enablable, so a
/// test fixture that shares a real module's name does not hide it.
pub fn excluded_modules(root: &Path) -> Result<HashSet<String>, DiscoveryError> {
    let (enablable, excluded): (Vec<_>, Vec<_>) = discover_modules(root)?
        .into_iter()
        .partition(ModuleInfo::is_enablable);
    let enablable: HashSet<String> = enablable.into_iter().map(|m| m.name).collect();

    Ok(excluded
        .into_iter()
        .map(|m| m.name)
        .filter(|name| !enablable.contains(name))
        .collect())
}

fn under_tests(relative: &Path) -> bool {
    relative
        .parent()
        .is_some_and(|dir| dir.components().any(|c| c == Component::Normal(OsStr::new("tests"))))
}

fn classify(path: &Path) -> Result<Option<Exclusion>, DiscoveryError> {
    let content = std::fs::read_to_string(path)?;
    let info: InfoFile = serde_yaml::from_str(&content).map_err(|source| DiscoveryError::InvalidInfo {
        path: path.to_path_buf(),
        source,
    })?;

    if info
        .package
        .as_deref()
        .is_some_and(|p| p.trim().eq_ignore_ascii_case("testing"))
    {
        return Ok(Some(Exclusion::TestingPackage));
    }

    let hidden = match info.hidden {
        Some(serde_yaml::Value::Bool(b)) => b,
        Some(serde_yaml::Value::String(s)) => s.eq_ignore_ascii_case("true"),
        _ => false,
    };
    Ok(hidden.then_some(Exclusion::Hidden))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn classifies_synthetic_info_files() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write(root, "foo/foo.info.yml", "name: Foo\ntype: module\npackage: Acquia\n");
        write(root, "foo/modules/foo_ui/foo_ui.info.yml", "name: Foo UI\ntype: module\n");
        write(root, "foo/tests/modules/foo_test/foo_test.info.yml", "name: Foo test\ntype: module\n");
        write(root, "bar/bar_testing.info.yml", "name: Bar testing\npackage: Testing\n");
        write(root, "bar/bar_hidden.info.yml", "name: Bar hidden\nhidden: TRUE\n");
        write(root, "bar/bar.info.yml", "name: Bar\nhidden: false\n");
        write(root, "bar/README.md", "not a module\n");

        let modules = discover_modules(root).unwrap();
        let lookup = |name: &str| modules.iter().find(|m| m.name == name).unwrap().exclusion;

        assert_eq!(modules.len(), 6);
        assert_eq!(lookup("foo"), None);
        assert_eq!(lookup("foo_ui"), None);
        assert_eq!(lookup("bar"), None);
        assert_eq!(lookup("foo_test"), Some(Exclusion::TestsPath));
        assert_eq!(lookup("bar_testing"), Some(Exclusion::TestingPackage));
        assert_eq!(lookup("bar_hidden"), Some(Exclusion::Hidden));

        let excluded = excluded_modules(root).unwrap();
        let mut excluded: Vec<_> = excluded.into_iter().collect();
        excluded.sort();
        assert_eq!(excluded, vec!["bar_hidden", "bar_testing", "foo_test"]);
    }

    #[test]
    fn test_module_sharing_a_real_name_does_not_exclude_it() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write(root, "foo/foo.info.yml", "name: Foo\ntype: module\n");
        write(root, "foo/tests/modules/foo/foo.info.yml", "name: Foo stub\ntype: module\n");
        write(root, "foo/tests/modules/foo_test/foo_test.info.yml", "name: Foo test\ntype: module\n");

        let excluded = excluded_modules(root).unwrap();
        assert!(!excluded.contains("foo"));
        assert!(excluded.contains("foo_test"));
    }

    #[test]
    fn missing_root_finds_nothing() {
        let tmp = TempDir::new().unwrap();
        assert!(discover_modules(&tmp.path().join("absent")).unwrap().is_empty());
    }

    #[test]
    fn invalid_info_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "x/x.info.yml", "name: [unclosed\n");
        assert!(matches!(
            discover_modules(tmp.path()),
            Err(DiscoveryError::InvalidInfo { .. })
        ));
    }
}
