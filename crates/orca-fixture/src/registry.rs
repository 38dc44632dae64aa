//! Project and submodule registries.
//!
//! Registries are loaded once from `projects.yml` and are read-only while a
//! fixture is built. Load order is kept because it decides the order of
//! entries written to the manifest.
//!
//! ```yaml
//! projects:
//!   - name: drupal/acquia_connector
//!     version: ~1.0
//!   - name: drupal/lightning_core
//!     url: ../lightning-core
//! submodules:
//!   - parent: drupal/lightning_core
//!     name: drupal/lightning_contact_form
//!     url: ../lightning-core/modules/lightning_contact_form
//! ```

use crate::project::{Project, ProjectError, ProjectRecord, ProjectType};
use indexmap::IndexMap;
use serde::Deserialize;
use std::path::{Component, Path};
use thiserror::Error;

/// Errors that can occur while loading registries.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("failed to read projects file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse projects file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid project at index {index}: {source}")]
    InvalidProject {
        index: usize,
        #[source]
        source: ProjectError,
    },

    #[error("duplicate project `{0}`")]
    Duplicate(String),

    #[error("submodule `{name}` refers to unknown parent `{parent}`")]
    UnknownParent { name: String, parent: String },

    #[error("glob pattern error: {0}")]
    Glob(#[from] glob::PatternError),

    #[error("invalid package file {path}: {message}")]
    InvalidPackageFile { path: String, message: String },
}

/// The on-disk layout of `projects.yml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectsFile {
    #[serde(default)]
    pub projects: Vec<ProjectRecord>,

    #[serde(default)]
    pub submodules: Vec<SubmoduleRecord>,
}

/// A submodule record: a project record plus its parent package name.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubmoduleRecord {
    pub parent: String,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default, rename = "type")]
    pub kind: Option<String>,

    #[serde(default)]
    pub version: Option<String>,

    #[serde(default)]
    pub url: Option<String>,

    #[serde(default)]
    pub install_path: Option<String>,
}

impl SubmoduleRecord {
    fn project_record(&self) -> ProjectRecord {
        ProjectRecord {
            name: self.name.clone(),
            kind: self.kind.clone(),
            version: self.version.clone(),
            url: self.url.clone(),
            install_path: self.install_path.clone(),
        }
    }
}

impl ProjectsFile {
    /// Parse a projects file from YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse(content: &str) -> Result<Self, RegistryError> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Read and parse a projects file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Validate every record and build both registries.
    ///
    /// # Errors
    ///
    /// Returns an error for the first invalid or duplicate record, or a
    /// submodule whose parent is not a registered project.
    pub fn into_registries(self) -> Result<(ProjectRegistry, SubmoduleRegistry), RegistryError> {
        let mut projects = ProjectRegistry::new();
        for (index, record) in self.projects.iter().enumerate() {
            let project = Project::from_record(record)
                .map_err(|source| RegistryError::InvalidProject { index, source })?;
            projects.insert(project)?;
        }

        let mut submodules = SubmoduleRegistry::new();
        for (index, record) in self.submodules.iter().enumerate() {
            let project = Project::from_record(&record.project_record())
                .map_err(|source| RegistryError::InvalidProject { index, source })?;
            if projects.get(&record.parent).is_none() {
                return Err(RegistryError::UnknownParent {
                    name: project.package_name().to_string(),
                    parent: record.parent.clone(),
                });
            }
            submodules.insert(&record.parent, project)?;
        }

        Ok((projects, submodules))
    }
}

/// Ordered collection of top-level projects, keyed by package name.
#[derive(Debug, Clone, Default)]
pub struct ProjectRegistry {
    projects: IndexMap<String, Project>,
}

impl ProjectRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a project at the end of the registry.
    ///
    /// # Errors
    ///
    /// Returns an error if a project with the same package name exists.
    pub fn insert(&mut self, project: Project) -> Result<(), RegistryError> {
        if self.projects.contains_key(project.package_name()) {
            return Err(RegistryError::Duplicate(project.package_name().to_string()));
        }
        self.projects.insert(project.package_name().to_string(), project);
        Ok(())
    }

    /// Look up a project by package name.
    #[must_use]
    pub fn get(&self, package_name: &str) -> Option<&Project> {
        self.projects.get(package_name)
    }

    /// All projects in load order.
    pub fn all(&self) -> impl Iterator<Item = &Project> {
        self.projects.values()
    }

    /// Projects of the given type, in load order.
    pub fn by_type<'a>(&'a self, project_type: &'a ProjectType) -> impl Iterator<Item = &'a Project> {
        self.projects
            .values()
            .filter(move |p| p.project_type() == project_type)
    }

    /// Map each matching project's package name to `accessor(project)`.
    ///
    /// With no type filter every project is included.
    pub fn multiple<T>(
        &self,
        project_type: Option<&ProjectType>,
        accessor: impl Fn(&Project) -> T,
    ) -> IndexMap<String, T> {
        self.projects
            .iter()
            .filter(|(_, p)| project_type.map_or(true, |t| p.project_type() == t))
            .map(|(name, p)| (name.clone(), accessor(p)))
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.projects.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }
}

/// A project installed alongside a parent project.
#[derive(Debug, Clone)]
struct Submodule {
    parent: String,
    project: Project,
}

/// Ordered collection of submodules, keyed by package name.
#[derive(Debug, Clone, Default)]
pub struct SubmoduleRegistry {
    submodules: IndexMap<String, Submodule>,
}

impl SubmoduleRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a submodule of `parent`.
    ///
    /// # Errors
    ///
    /// Returns an error if a submodule with the same package name exists.
    pub fn insert(&mut self, parent: &str, project: Project) -> Result<(), RegistryError> {
        if self.contains(project.package_name()) {
            return Err(RegistryError::Duplicate(project.package_name().to_string()));
        }
        self.submodules.insert(
            project.package_name().to_string(),
            Submodule {
                parent: parent.to_string(),
                project,
            },
        );
        Ok(())
    }

    #[must_use]
    pub fn contains(&self, package_name: &str) -> bool {
        self.submodules.contains_key(package_name)
    }

    /// Every submodule across all parents, in load order.
    pub fn all(&self) -> impl Iterator<Item = &Project> {
        self.submodules.values().map(|s| &s.project)
    }

    /// The submodules of `parent`, in load order.
    pub fn by_parent<'a>(&'a self, parent: &'a Project) -> impl Iterator<Item = &'a Project> {
        self.submodules
            .values()
            .filter(move |s| s.parent == parent.package_name())
            .map(|s| &s.project)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.submodules.is_empty()
    }

    /// Find module packages nested inside `parent`'s local checkout at `dir`
    /// and register the ones not configured already.
    ///
    /// Every `composer.json` below `dir` whose type is `drupal-module` and
    /// whose name has a vendor prefix becomes a submodule, with its directory
    /// as the path repository URL. Files under `vendor/` or `tests/` are
    /// ignored, as is the parent's own `composer.json`.
    ///
    /// Returns the number of submodules added.
    ///
    /// # Errors
    ///
    /// Returns an error if a package file cannot be read or parsed.
    pub fn discover(&mut self, parent: &Project, dir: &Path) -> Result<usize, RegistryError> {
        #[derive(Deserialize)]
        struct PackageFile {
            #[serde(default)]
            name: Option<String>,
            #[serde(default, rename = "type")]
            kind: Option<String>,
        }

        let pattern = format!(
            "{}/**/composer.json",
            glob::Pattern::escape(&dir.to_string_lossy())
        );

        let mut added = 0;
        for entry in glob::glob(&pattern)? {
            let path = entry.map_err(|e| RegistryError::Io(e.into_error()))?;
            let relative = path.strip_prefix(dir).unwrap_or(&path);
            if is_ignored_package_path(relative) {
                continue;
            }

            let content = std::fs::read_to_string(&path)?;
            let package: PackageFile =
                serde_json::from_str(&content).map_err(|e| RegistryError::InvalidPackageFile {
                    path: path.display().to_string(),
                    message: e.to_string(),
                })?;

            let (Some(name), Some(kind)) = (package.name, package.kind) else {
                continue;
            };
            if ProjectType::from(kind.as_str()) != ProjectType::Module || self.contains(&name) {
                continue;
            }
            let Ok(project) = Project::new(name) else {
                continue;
            };

            let url = path
                .parent()
                .map(|p| p.display().to_string())
                .unwrap_or_default();
            self.insert(parent.package_name(), project.with_repository_url(url))?;
            added += 1;
        }

        Ok(added)
    }
}

/// Returns true for the root package file and anything under `vendor/` or
/// `tests/`.
fn is_ignored_package_path(relative: &Path) -> bool {
    let mut components = relative.components().peekable();
    let mut depth = 0;
    while let Some(component) = components.next() {
        if components.peek().is_none() {
            break;
        }
        depth += 1;
        if let Component::Normal(name) = component {
            if name == "vendor" || name == "tests" {
                return true;
            }
        }
    }
    depth == 0
}
