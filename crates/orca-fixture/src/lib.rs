//! Fixture orchestration for testing first-party Drupal packages.
//!
//! This crate provides:
//! - The registry of first-party projects and their submodules
//! - Order-preserving edits to the fixture's `composer.json`
//! - The fixture build pipeline, with Git checkpoints along the way
//! - Module discovery for deciding what to enable after install

mod build;
mod checkpoint;
pub mod commands;
mod discovery;
mod error;
mod fixture;
mod manifest;
mod project;
mod registry;
mod settings;
mod tool;

pub use build::{
    BuildContext, BuildOptions, BuildReport, FixtureOrchestrator, Step, BASE_PROJECT,
    SUBMODULE_INSTALL_PATH, UNNEEDED_PACKAGES,
};
pub use checkpoint::Checkpoint;
pub use commands::{SiteInstall, CHECKPOINT_AUTHOR};
pub use discovery::{discover_modules, excluded_modules, DiscoveryError, Exclusion, ModuleInfo};
pub use error::{BuildError, ErrorKind};
pub use fixture::{Fixture, BASE_FIXTURE_BRANCH};
pub use manifest::{
    merge_ahead, FixtureMetadata, Manifest, ManifestError, ManifestSession, Repository,
    RepositoryDefinition, LOCK_FILE, MANIFEST_FILE, METADATA_KEY,
};
pub use project::{
    Project, ProjectError, ProjectRecord, ProjectType, DEFAULT_VERSION, DEV_VERSION,
    FIRST_PARTY_MODULE_PATH,
};
pub use registry::{
    ProjectRegistry, ProjectsFile, RegistryError, SubmoduleRecord, SubmoduleRegistry,
};
pub use settings::{ensure_settings, SettingsError, SettingsOutcome, SETTINGS_FILE, SETTINGS_SENTINEL};
pub use tool::{Invocation, ProcessRunner, Tool, ToolError, ToolOutput, ToolPaths, ToolRunner};
