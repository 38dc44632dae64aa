//! The `orca.toml` configuration file.

use anyhow::{Context, Result};
use orca_fixture::{
    BuildOptions, ProjectRegistry, ProjectsFile, SiteInstall, SubmoduleRegistry, ToolPaths,
    BASE_PROJECT,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// The default configuration filename.
pub const CONFIG_FILE: &str = "orca.toml";

/// CLI configuration. Every field has a default, so an absent file is valid.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Where the fixture is built.
    pub fixture_root: PathBuf,

    /// The project registry file.
    pub projects_file: PathBuf,

    /// Composer project the fixture is scaffolded from.
    pub base_project: String,

    pub tools: ToolsConfig,

    pub site: SiteConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fixture_root: PathBuf::from("../orca-build"),
            projects_file: PathBuf::from("config/projects.yml"),
            base_project: BASE_PROJECT.to_string(),
            tools: ToolsConfig::default(),
            site: SiteConfig::default(),
        }
    }
}

/// Explicit executable paths. Anything unset is looked up on `PATH`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolsConfig {
    pub composer: Option<PathBuf>,
    pub git: Option<PathBuf>,
    /// Unset means the fixture's own `vendor/bin/drush`.
    pub drush: Option<PathBuf>,
}

/// Drupal site install settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    pub name: String,
    pub profile: String,
    pub account_name: String,
    pub account_pass: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        let site = SiteInstall::default();
        Self {
            name: site.site_name,
            profile: site.profile,
            account_name: site.account_name,
            account_pass: site.account_pass,
        }
    }
}

impl Config {
    /// Load configuration from `path`, or the defaults if it does not exist.
    ///
    /// Relative paths are resolved against the directory holding the file,
    /// or the current directory when there is no file.
    pub fn load(path: &Path) -> Result<Self> {
        let (config, base) = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let config = Self::parse(&content)
                .with_context(|| format!("Failed to parse {}", path.display()))?;
            let base = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map_or_else(std::env::current_dir, |p| Ok(p.to_path_buf()))?;
            (config, base)
        } else {
            debug!(path = %path.display(), "no configuration file, using defaults");
            (Self::default(), std::env::current_dir()?)
        };

        Ok(config.resolved_against(&base))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    fn resolved_against(mut self, base: &Path) -> Self {
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };
        resolve(&mut self.fixture_root);
        resolve(&mut self.projects_file);
        for tool in [&mut self.tools.composer, &mut self.tools.git, &mut self.tools.drush]
            .into_iter()
            .flatten()
        {
            // Bare names are looked up on PATH, not joined onto the base.
            if tool.components().count() > 1 {
                resolve(tool);
            }
        }
        self
    }

    /// Resolve executables once for the lifetime of the process.
    pub fn tool_paths(&self) -> Result<ToolPaths> {
        let locate = |configured: &Option<PathBuf>, name: &str| -> Result<PathBuf> {
            let candidate = configured.clone().unwrap_or_else(|| PathBuf::from(name));
            which::which(&candidate)
                .with_context(|| format!("Could not find `{}`", candidate.display()))
        };

        Ok(ToolPaths {
            composer: locate(&self.tools.composer, "composer")?,
            git: locate(&self.tools.git, "git")?,
            drush: self.tools.drush.clone(),
        })
    }

    /// Load the project and submodule registries.
    pub fn registries(&self) -> Result<(ProjectRegistry, SubmoduleRegistry)> {
        let file = ProjectsFile::from_path(&self.projects_file)
            .with_context(|| format!("Failed to load {}", self.projects_file.display()))?;
        file.into_registries()
            .with_context(|| format!("Invalid projects in {}", self.projects_file.display()))
    }

    pub fn build_options(&self, sut: Option<String>, sut_only: bool) -> BuildOptions {
        BuildOptions {
            sut,
            sut_only,
            base_project: self.base_project.clone(),
            site: SiteInstall {
                profile: self.site.profile.clone(),
                site_name: self.site.name.clone(),
                account_name: self.site.account_name.clone(),
                account_pass: self.site.account_pass.clone(),
            },
            ..BuildOptions::default()
        }
    }
}
