//! The fixture's Composer manifest (`composer.json`) and the session used to
//! patch it.
//!
//! Only a few sub-trees are edited: `extra.installer-paths`, `repositories`,
//! `config` and the `extra.orca` metadata block. Everything else is carried
//! through untouched, in its original order.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// The manifest filename.
pub const MANIFEST_FILE: &str = "composer.json";

/// The lock filename.
pub const LOCK_FILE: &str = "composer.lock";

/// Key under `extra` that records how the fixture was built.
pub const METADATA_KEY: &str = "orca";

/// Errors that can occur when working with manifests.
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("failed to access manifest file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse manifest: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid manifest: `{path}` must be {expected}")]
    Shape {
        path: String,
        expected: &'static str,
    },

    #[error("invalid property path `{0}`")]
    InvalidPath(String),
}

/// A repository declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Repository {
    /// A switch such as `"packagist.org": false`.
    Toggle(bool),

    /// A full repository definition.
    Definition(RepositoryDefinition),
}

impl Repository {
    /// A path repository that symlinks the package from `url`.
    #[must_use]
    pub fn path(url: impl Into<String>) -> Self {
        let mut options = Map::new();
        options.insert("symlink".to_string(), Value::Bool(true));
        Self::Definition(RepositoryDefinition {
            kind: "path".to_string(),
            url: Some(url.into()),
            options: Some(options),
            other: Map::new(),
        })
    }

    /// The repository type, if this is a definition.
    #[must_use]
    pub fn kind(&self) -> Option<&str> {
        match self {
            Self::Toggle(_) => None,
            Self::Definition(d) => Some(&d.kind),
        }
    }

    /// The repository URL, if any.
    #[must_use]
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Toggle(_) => None,
            Self::Definition(d) => d.url.as_deref(),
        }
    }
}

/// A repository definition, e.g. `{"type": "composer", "url": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryDefinition {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Map<String, Value>>,

    /// Any other keys, kept as loaded.
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// How the fixture was built, recorded under `extra.orca`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureMetadata {
    /// Package name of the system under test.
    #[serde(default)]
    pub sut: Option<String>,

    /// Whether only the SUT was added.
    #[serde(default, rename = "sut-only")]
    pub sut_only: bool,
}

/// Typed view of the parts of a manifest this crate reads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Manifest {
    /// `require`: package name to version constraint.
    pub require: IndexMap<String, String>,

    /// `require-dev`: package name to version constraint.
    pub require_dev: IndexMap<String, String>,

    /// `extra.installer-paths`: path template to package names.
    pub installer_paths: IndexMap<String, Vec<String>>,

    /// `repositories`: name to declaration.
    pub repositories: IndexMap<String, Repository>,

    /// `extra.orca`, if the fixture has been built.
    pub metadata: Option<FixtureMetadata>,
}

impl Manifest {
    /// Load a manifest from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid JSON, or
    /// has an unexpected shape in one of the sub-trees read here.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse a manifest from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is invalid or has an unexpected shape.
    pub fn parse(content: &str) -> Result<Self, ManifestError> {
        let document = parse_document(content)?;
        Self::from_document(&document)
    }

    /// Returns true if `package` is required in either section.
    #[must_use]
    pub fn requires(&self, package: &str) -> bool {
        self.require.contains_key(package) || self.require_dev.contains_key(package)
    }

    fn from_document(document: &Map<String, Value>) -> Result<Self, ManifestError> {
        let extra = match document.get("extra") {
            None => None,
            Some(Value::Object(extra)) => Some(extra),
            Some(_) => return Err(shape("extra", "an object")),
        };

        if matches!(document.get("repositories"), Some(Value::Array(_))) {
            return Err(shape("repositories", "an object keyed by repository name"));
        }

        Ok(Self {
            require: typed(document.get("require"), "require", "an object of version constraints")?,
            require_dev: typed(
                document.get("require-dev"),
                "require-dev",
                "an object of version constraints",
            )?,
            installer_paths: typed(
                extra.and_then(|e| e.get("installer-paths")),
                "extra.installer-paths",
                "an object of package name lists",
            )?,
            repositories: typed(
                document.get("repositories"),
                "repositories",
                "an object of repository definitions",
            )?,
            metadata: typed(
                extra.and_then(|e| e.get(METADATA_KEY)),
                "extra.orca",
                "an object with `sut` and `sut-only`",
            )?,
        })
    }
}

/// Place `overrides` ahead of `originals`.
///
/// An original whose key is already taken by an override is dropped, so the
/// override keeps both its position and its value.
pub fn merge_ahead<K: Into<String>, V: Clone>(
    overrides: impl IntoIterator<Item = (K, V)>,
    originals: &IndexMap<String, V>,
) -> IndexMap<String, V> {
    let mut merged: IndexMap<String, V> = overrides
        .into_iter()
        .map(|(key, value)| (key.into(), value))
        .collect();
    for (key, value) in originals {
        merged.entry(key.clone()).or_insert_with(|| value.clone());
    }
    merged
}

/// A load-patch-save session over one manifest file.
///
/// Created by [`ManifestSession::load`] and consumed by
/// [`ManifestSession::save`]. The snapshot taken at load time is what
/// [`prepend_installer_paths`](Self::prepend_installer_paths) and
/// [`prepend_repositories`](Self::prepend_repositories) re-append behind
/// their overrides, byte for byte as loaded.
#[derive(Debug)]
pub struct ManifestSession {
    path: PathBuf,
    document: Map<String, Value>,
    original: Map<String, Value>,
    backup: Manifest,
}

impl ManifestSession {
    /// Open a session on the manifest at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is malformed.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ManifestError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)?;
        let document = parse_document(&content)?;
        let backup = Manifest::from_document(&document)?;
        Ok(Self {
            path,
            original: document.clone(),
            document,
            backup,
        })
    }

    /// The manifest as it was when the session was opened.
    #[must_use]
    pub fn backup(&self) -> &Manifest {
        &self.backup
    }

    /// The manifest as currently patched.
    ///
    /// # Errors
    ///
    /// Returns an error if a patch produced an unexpected shape.
    pub fn current(&self) -> Result<Manifest, ManifestError> {
        Manifest::from_document(&self.document)
    }

    /// Set the value at a dotted property path, creating parent objects.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is empty or crosses a non-object value.
    pub fn add_property(&mut self, path: &str, value: impl Into<Value>) -> Result<(), ManifestError> {
        let segments = split_path(path)?;
        self.set_at(&segments, value.into())
    }

    /// Remove the value at a dotted property path. Absent paths are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is empty.
    pub fn remove_property(&mut self, path: &str) -> Result<(), ManifestError> {
        let segments = split_path(path)?;
        self.remove_at(&segments);
        Ok(())
    }

    /// Set a `config` setting.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` is not an object.
    pub fn add_config_setting(&mut self, name: &str, value: impl Into<Value>) -> Result<(), ManifestError> {
        self.set_at(&["config", name], value.into())
    }

    /// Add or replace a repository. Repository names may contain dots, so
    /// this does not go through a dotted path.
    ///
    /// # Errors
    ///
    /// Returns an error if `repositories` is not an object.
    pub fn add_repository(&mut self, name: &str, repository: &Repository) -> Result<(), ManifestError> {
        self.set_at(&["repositories", name], serde_json::to_value(repository)?)
    }

    /// Rewrite `extra.installer-paths` with `overrides` ahead of the original
    /// entries.
    ///
    /// # Errors
    ///
    /// Returns an error if `extra` is not an object.
    pub fn prepend_installer_paths<K: Into<String>>(
        &mut self,
        overrides: impl IntoIterator<Item = (K, Vec<String>)>,
    ) -> Result<(), ManifestError> {
        let overrides = overrides
            .into_iter()
            .map(|(template, packages)| (template, Value::from(packages)));
        let merged = merge_ahead(overrides, &self.original_section(&["extra", "installer-paths"]));
        self.remove_at(&["extra", "installer-paths"]);
        self.set_at(&["extra", "installer-paths"], Value::Object(merged.into_iter().collect()))
    }

    /// Rewrite `repositories` with `overrides` ahead of the original entries.
    ///
    /// # Errors
    ///
    /// Returns an error if a repository cannot be encoded.
    pub fn prepend_repositories<K: Into<String>>(
        &mut self,
        overrides: impl IntoIterator<Item = (K, Repository)>,
    ) -> Result<(), ManifestError> {
        let overrides = overrides
            .into_iter()
            .map(|(name, repository)| serde_json::to_value(repository).map(|value| (name, value)))
            .collect::<Result<Vec<_>, _>>()?;
        let merged = merge_ahead(overrides, &self.original_section(&["repositories"]));
        self.remove_at(&["repositories"]);
        self.set_at(&["repositories"], Value::Object(merged.into_iter().collect()))
    }

    /// Record how the fixture was built.
    ///
    /// # Errors
    ///
    /// Returns an error if `extra` is not an object.
    pub fn set_metadata(&mut self, metadata: &FixtureMetadata) -> Result<(), ManifestError> {
        self.set_at(&["extra", METADATA_KEY], serde_json::to_value(metadata)?)
    }

    /// Encode the patched document the way it will be written.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_string(&self) -> Result<String, ManifestError> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.document.serialize(&mut serializer)?;
        buf.push(b'\n');
        // serde_json only emits valid UTF-8.
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Write the patched document back to the manifest file.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(self) -> Result<(), ManifestError> {
        let content = self.to_json_string()?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }

    /// The object at `segments` in the document as loaded, or an empty map.
    fn original_section(&self, segments: &[&str]) -> IndexMap<String, Value> {
        let mut current = &self.original;
        let Some((last, parents)) = segments.split_last() else {
            return IndexMap::new();
        };
        for segment in parents {
            match current.get(*segment) {
                Some(Value::Object(map)) => current = map,
                _ => return IndexMap::new(),
            }
        }
        match current.get(*last) {
            Some(Value::Object(map)) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            _ => IndexMap::new(),
        }
    }

    fn set_at(&mut self, segments: &[&str], value: Value) -> Result<(), ManifestError> {
        let Some((last, parents)) = segments.split_last() else {
            return Err(ManifestError::InvalidPath(String::new()));
        };

        let mut current = &mut self.document;
        for (depth, segment) in parents.iter().enumerate() {
            let entry = current
                .entry((*segment).to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            current = match entry {
                Value::Object(map) => map,
                _ => return Err(shape(&segments[..=depth].join("."), "an object")),
            };
        }
        current.insert((*last).to_string(), value);
        Ok(())
    }

    fn remove_at(&mut self, segments: &[&str]) {
        let Some((last, parents)) = segments.split_last() else {
            return;
        };

        let mut current = &mut self.document;
        for segment in parents {
            match current.get_mut(*segment) {
                Some(Value::Object(map)) => current = map,
                _ => return,
            }
        }
        current.shift_remove(*last);
    }
}

fn parse_document(content: &str) -> Result<Map<String, Value>, ManifestError> {
    match serde_json::from_str(content)? {
        Value::Object(map) => Ok(map),
        _ => Err(shape("<root>", "an object")),
    }
}

fn split_path(path: &str) -> Result<Vec<&str>, ManifestError> {
    let segments: Vec<&str> = path.split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(ManifestError::InvalidPath(path.to_string()));
    }
    Ok(segments)
}

fn typed<T: serde::de::DeserializeOwned + Default>(
    value: Option<&Value>,
    path: &str,
    expected: &'static str,
) -> Result<T, ManifestError> {
    match value {
        None => Ok(T::default()),
        Some(value) => serde_json::from_value(value.clone()).map_err(|_| shape(path, expected)),
    }
}

fn shape(path: &str, expected: &'static str) -> ManifestError {
    ManifestError::Shape {
        path: path.to_string(),
        expected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const SCAFFOLD: &str = r#"{
    "name": "acquia/blt-project",
    "repositories": {
        "drupal": {
            "type": "composer",
            "url": "https://packages.drupal.org/8"
        },
        "asset-packagist": {
            "type": "composer",
            "url": "https://asset-packagist.org"
        }
    },
    "require": {
        "acquia/lightning": "^3.1",
        "drupal/acquia_connector": "^1.5"
    },
    "extra": {
        "installer-paths": {
            "docroot/core": [
                "type:drupal-core"
            ],
            "docroot/modules/contrib/{$name}": [
                "type:drupal-module"
            ],
            "drush/Commands/{$name}": [
                "type:drupal-drush"
            ]
        },
        "enable-patching": true
    }
}
"#;

    fn session(dir: &TempDir, content: &str) -> ManifestSession {
        let path = dir.path().join(MANIFEST_FILE);
        fs::write(&path, content).unwrap();
        ManifestSession::load(path).unwrap()
    }

    #[test]
    fn parse_typed_view() {
        let manifest = Manifest::parse(SCAFFOLD).unwrap();
        assert!(manifest.requires("acquia/lightning"));
        assert!(!manifest.requires("drupal/acquia_purge"));
        assert_eq!(
            manifest.installer_paths.keys().map(String::as_str).collect::<Vec<_>>(),
            vec![
                "docroot/core",
                "docroot/modules/contrib/{$name}",
                "drush/Commands/{$name}"
            ]
        );
        assert_eq!(manifest.repositories.get("drupal").and_then(Repository::kind), Some("composer"));
        assert_eq!(manifest.metadata, None);
    }

    #[test]
    fn rejects_malformed_content() {
        assert!(matches!(Manifest::parse("{not json"), Err(ManifestError::Parse(_))));
        assert!(matches!(Manifest::parse("[]"), Err(ManifestError::Shape { .. })));
        assert!(matches!(
            Manifest::parse(r#"{"extra": {"installer-paths": {"a": "not-a-list"}}}"#),
            Err(ManifestError::Shape { path, .. }) if path == "extra.installer-paths"
        ));
        assert!(matches!(
            Manifest::parse(r#"{"repositories": [{"type": "vcs", "url": "x"}]}"#),
            Err(ManifestError::Shape { path, .. }) if path == "repositories"
        ));
    }

    #[test]
    fn accepts_repository_toggles() {
        let manifest = Manifest::parse(r#"{"repositories": {"packagist.org": false}}"#).unwrap();
        assert_eq!(manifest.repositories.get("packagist.org"), Some(&Repository::Toggle(false)));
    }

    #[test]
    fn prepend_installer_paths_wins_and_keeps_originals() {
        let dir = TempDir::new().unwrap();
        let mut session = session(&dir, SCAFFOLD);
        session
            .prepend_installer_paths([(
                "docroot/modules/contrib/acquia/{$name}",
                vec!["acme/foo".to_string()],
            )])
            .unwrap();

        let current = session.current().unwrap();
        assert_eq!(
            current.installer_paths.keys().map(String::as_str).collect::<Vec<_>>(),
            vec![
                "docroot/modules/contrib/acquia/{$name}",
                "docroot/core",
                "docroot/modules/contrib/{$name}",
                "drush/Commands/{$name}"
            ]
        );
        assert_eq!(
            current.installer_paths.get("docroot/modules/contrib/acquia/{$name}"),
            Some(&vec!["acme/foo".to_string()])
        );
    }

    #[test]
    fn prepend_repositories_puts_override_first() {
        let dir = TempDir::new().unwrap();
        let mut session = session(&dir, SCAFFOLD);
        session
            .prepend_repositories([("acme/bar", Repository::path("../bar"))])
            .unwrap();

        let current = session.current().unwrap();
        assert_eq!(
            current.repositories.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["acme/bar", "drupal", "asset-packagist"]
        );
        let bar = current.repositories.get("acme/bar").unwrap();
        assert_eq!(bar.kind(), Some("path"));
        assert_eq!(bar.url(), Some("../bar"));
    }

    #[test]
    fn override_replaces_colliding_original() {
        let dir = TempDir::new().unwrap();
        let mut session = session(&dir, SCAFFOLD);
        session
            .prepend_repositories([("asset-packagist", Repository::path("../local"))])
            .unwrap();

        let current = session.current().unwrap();
        assert_eq!(
            current.repositories.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["asset-packagist", "drupal"]
        );
        assert_eq!(current.repositories.get("asset-packagist").and_then(Repository::url), Some("../local"));
    }

    #[test]
    fn original_repositories_keep_their_key_order() {
        let dir = TempDir::new().unwrap();
        let mut session = session(
            &dir,
            r#"{"repositories": {"legacy": {"url": "../legacy", "options": {"symlink": false}, "type": "path"}}}"#,
        );
        session
            .prepend_repositories([("acme/bar", Repository::path("../bar"))])
            .unwrap();
        session.save().unwrap();

        let content = fs::read_to_string(dir.path().join(MANIFEST_FILE)).unwrap();
        let value: Value = serde_json::from_str(&content).unwrap();
        let legacy: Vec<_> = value["repositories"]["legacy"]
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(legacy, vec!["url", "options", "type"]);
    }

    #[test]
    fn merge_ahead_drops_colliding_originals() {
        let originals: IndexMap<String, u32> =
            [("a".to_string(), 1), ("b".to_string(), 2), ("c".to_string(), 3)]
                .into_iter()
                .collect();
        let merged = merge_ahead([("c", 30), ("x", 0)], &originals);
        assert_eq!(
            merged.into_iter().collect::<Vec<_>>(),
            vec![
                ("c".to_string(), 30),
                ("x".to_string(), 0),
                ("a".to_string(), 1),
                ("b".to_string(), 2)
            ]
        );
    }

    #[test]
    fn patches_compose_within_a_session() {
        let dir = TempDir::new().unwrap();
        let mut session = session(&dir, SCAFFOLD);
        session.add_config_setting("discard-changes", true).unwrap();
        session.add_property("extra.foo.bar", "baz").unwrap();
        session.remove_property("extra.enable-patching").unwrap();
        session.remove_property("does.not.exist").unwrap();
        session
            .set_metadata(&FixtureMetadata {
                sut: Some("acme/bar".to_string()),
                sut_only: true,
            })
            .unwrap();
        session.save().unwrap();

        let content = fs::read_to_string(dir.path().join(MANIFEST_FILE)).unwrap();
        let value: Value = serde_json::from_str(&content).unwrap();
        assert_eq!(value["config"]["discard-changes"], Value::Bool(true));
        assert_eq!(value["extra"]["foo"]["bar"], "baz");
        assert!(value["extra"].get("enable-patching").is_none());
        assert_eq!(value["extra"]["orca"]["sut-only"], Value::Bool(true));

        let manifest = Manifest::parse(&content).unwrap();
        assert_eq!(manifest.metadata.unwrap().sut.as_deref(), Some("acme/bar"));
    }

    #[test]
    fn add_property_refuses_to_cross_scalars() {
        let dir = TempDir::new().unwrap();
        let mut session = session(&dir, SCAFFOLD);
        let err = session.add_property("name.nested", 1).unwrap_err();
        assert!(matches!(err, ManifestError::Shape { path, .. } if path == "name"));
        assert!(matches!(
            session.add_property("extra..x", 1),
            Err(ManifestError::InvalidPath(_))
        ));
    }

    #[test]
    fn save_is_stable_and_slash_unescaped() {
        let dir = TempDir::new().unwrap();
        let session = session(&dir, SCAFFOLD);
        let first = session.to_json_string().unwrap();
        session.save().unwrap();
        let second = ManifestSession::load(dir.path().join(MANIFEST_FILE))
            .unwrap()
            .to_json_string()
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(first, SCAFFOLD);
        assert!(first.contains("https://packages.drupal.org/8"));
    }

    #[test]
    fn metadata_serializes_null_sut() {
        let value = serde_json::to_value(FixtureMetadata::default()).unwrap();
        assert_eq!(value, serde_json::json!({"sut": null, "sut-only": false}));
    }
}
