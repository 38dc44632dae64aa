//! Project descriptors.
//!
//! A [`Project`] is one package that can be placed into a fixture: its
//! Composer package name, where it installs relative to the fixture root,
//! where its local checkout lives and which version constraint to require.

use serde::Deserialize;
use std::fmt;
use std::path::{Component, Path};
use thiserror::Error;

/// Directory shared by all first-party modules, relative to the fixture root.
pub const FIRST_PARTY_MODULE_PATH: &str = "docroot/modules/contrib/acquia";

/// Version constraint used when none is configured.
pub const DEFAULT_VERSION: &str = "*";

/// Version constraint that lets Composer resolve a package from a local path
/// repository instead of a released version.
pub const DEV_VERSION: &str = "@dev";

/// Errors raised while constructing a project descriptor.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProjectError {
    #[error("missing required property: \"name\"")]
    MissingName,

    #[error("invalid value for \"name\" property: {0:?}")]
    InvalidName(String),

    #[error("invalid value for \"install_path\" property: {0:?} must be relative to the fixture root")]
    InvalidInstallPath(String),
}

/// The Composer package type, which decides the default install location.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum ProjectType {
    /// `drupal-module`
    #[default]
    Module,
    /// `drupal-theme`
    Theme,
    /// `drupal-profile`
    Profile,
    /// `drupal-library`
    Library,
    /// `bower-asset`
    BowerAsset,
    /// `npm-asset`
    NpmAsset,
    /// `drupal-drush`
    DrushCommand,
    /// Anything else. Installed under `vendor/`.
    Other(String),
}

impl ProjectType {
    /// Returns the Composer type string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Module => "drupal-module",
            Self::Theme => "drupal-theme",
            Self::Profile => "drupal-profile",
            Self::Library => "drupal-library",
            Self::BowerAsset => "bower-asset",
            Self::NpmAsset => "npm-asset",
            Self::DrushCommand => "drupal-drush",
            Self::Other(s) => s,
        }
    }
}

impl From<&str> for ProjectType {
    fn from(s: &str) -> Self {
        match s {
            "drupal-module" => Self::Module,
            "drupal-theme" => Self::Theme,
            "drupal-profile" => Self::Profile,
            "drupal-library" => Self::Library,
            "bower-asset" => Self::BowerAsset,
            "npm-asset" => Self::NpmAsset,
            "drupal-drush" => Self::DrushCommand,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ProjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A project record as written in `projects.yml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectRecord {
    /// Package name, e.g. `drupal/example`.
    #[serde(default)]
    pub name: Option<String>,

    /// Composer package type.
    #[serde(default, rename = "type")]
    pub kind: Option<String>,

    /// Version constraint, e.g. `~1.0`.
    #[serde(default)]
    pub version: Option<String>,

    /// Path repository URL, relative to the fixture root or absolute.
    #[serde(default)]
    pub url: Option<String>,

    /// Install path override, relative to the fixture root.
    #[serde(default)]
    pub install_path: Option<String>,
}

/// A package that can be installed into the fixture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    package_name: String,
    project_name: String,
    project_type: ProjectType,
    version: String,
    install_path: Option<String>,
    repository_url: String,
}

impl Project {
    /// Create a project with default settings.
    ///
    /// # Errors
    ///
    /// Returns an error unless `package_name` is `vendor/project` with both
    /// segments non-empty.
    pub fn new(package_name: impl Into<String>) -> Result<Self, ProjectError> {
        let package_name = package_name.into();
        let project_name = match package_name.split_once('/') {
            Some((vendor, rest)) if !vendor.is_empty() => rest.rsplit('/').next().unwrap_or_default(),
            _ => "",
        };
        if project_name.is_empty() {
            return Err(ProjectError::InvalidName(package_name));
        }

        let project_name = project_name.to_string();
        let repository_url = format!("../{project_name}");

        Ok(Self {
            package_name,
            project_name,
            project_type: ProjectType::default(),
            version: DEFAULT_VERSION.to_string(),
            install_path: None,
            repository_url,
        })
    }

    /// Build a project from a configuration record. Empty optional fields
    /// fall back to their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the record's name is missing or invalid, or its
    /// install path leaves the fixture.
    pub fn from_record(record: &ProjectRecord) -> Result<Self, ProjectError> {
        let name = record.name.as_deref().ok_or(ProjectError::MissingName)?;
        let mut project = Self::new(name)?;

        if let Some(kind) = non_empty(record.kind.as_deref()) {
            project = project.with_type(kind);
        }
        if let Some(version) = non_empty(record.version.as_deref()) {
            project = project.with_version(version);
        }
        if let Some(url) = non_empty(record.url.as_deref()) {
            project = project.with_repository_url(url);
        }
        if let Some(path) = non_empty(record.install_path.as_deref()) {
            project = project.with_install_path(path)?;
        }

        Ok(project)
    }

    /// Set the package type.
    #[must_use]
    pub fn with_type(mut self, project_type: impl Into<ProjectType>) -> Self {
        self.project_type = project_type.into();
        self
    }

    /// Set the version constraint.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Override the install path.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` is empty, absolute, or contains `..`.
    pub fn with_install_path(mut self, path: impl Into<String>) -> Result<Self, ProjectError> {
        let path = path.into();
        if !is_contained(Path::new(&path)) {
            return Err(ProjectError::InvalidInstallPath(path));
        }
        self.install_path = Some(path);
        Ok(self)
    }

    /// Set the path repository URL.
    #[must_use]
    pub fn with_repository_url(mut self, url: impl Into<String>) -> Self {
        self.repository_url = url.into();
        self
    }

    /// The package name, e.g. `drupal/example`.
    #[must_use]
    pub fn package_name(&self) -> &str {
        &self.package_name
    }

    /// The last segment of the package name, e.g. `example`.
    #[must_use]
    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    #[must_use]
    pub fn project_type(&self) -> &ProjectType {
        &self.project_type
    }

    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    #[must_use]
    pub fn repository_url(&self) -> &str {
        &self.repository_url
    }

    /// Returns true for `drupal-module` packages.
    #[must_use]
    pub fn is_module(&self) -> bool {
        self.project_type == ProjectType::Module
    }

    /// The path the project installs at, relative to the fixture root.
    #[must_use]
    pub fn install_path(&self) -> String {
        if let Some(path) = &self.install_path {
            return path.clone();
        }

        let name = &self.project_name;
        match self.project_type {
            ProjectType::DrushCommand => format!("drush/Commands/{name}"),
            ProjectType::Library | ProjectType::BowerAsset | ProjectType::NpmAsset => {
                format!("docroot/libraries/{name}")
            }
            ProjectType::Module => format!("{FIRST_PARTY_MODULE_PATH}/{name}"),
            ProjectType::Profile => format!("docroot/profiles/contrib/acquia/{name}"),
            ProjectType::Theme => format!("docroot/themes/contrib/acquia/{name}"),
            ProjectType::Other(_) => format!("vendor/{}", self.package_name),
        }
    }

    /// The requirement passed to `composer require`, e.g. `drupal/example:~1.0`.
    #[must_use]
    pub fn package_string(&self) -> String {
        format!("{}:{}", self.package_name, self.version)
    }

    /// The requirement used to pull the project from its path repository.
    #[must_use]
    pub fn dev_package_string(&self) -> String {
        format!("{}:{DEV_VERSION}", self.package_name)
    }
}

impl fmt::Display for Project {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.package_name)
    }
}

/// Returns true if `path` names something strictly below the directory it
/// is joined to.
pub(crate) fn is_contained(path: &Path) -> bool {
    let mut named = false;
    for component in path.components() {
        match component {
            Component::Normal(_) => named = true,
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return false,
        }
    }
    named
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}
