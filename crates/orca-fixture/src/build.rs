//! The fixture build pipeline.
//!
//! A build is an ordered list of [`Step`]s run one after another by
//! [`FixtureOrchestrator::create`]. Each step either completes or aborts the
//! whole build; nothing is retried or rolled back. Checkpoint commits made
//! along the way are the recovery points.

use crate::checkpoint::Checkpoint;
use crate::commands::{self, SiteInstall};
use crate::discovery;
use crate::error::BuildError;
use crate::fixture::{Fixture, BASE_FIXTURE_BRANCH};
use crate::manifest::{FixtureMetadata, Manifest, ManifestSession, Repository};
use crate::project::{Project, ProjectType, FIRST_PARTY_MODULE_PATH};
use crate::registry::{ProjectRegistry, SubmoduleRegistry};
use crate::settings::{self, SettingsOutcome, SETTINGS_FILE};
use crate::tool::ToolRunner;
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Composer project the fixture is scaffolded from.
pub const BASE_PROJECT: &str = "acquia/blt-project";

/// Packages removed from the scaffold before first-party packages are added.
///
/// `acquia/lightning` pins its submodules and so prevents them from being
/// symlinked from a path repository. The others are only ever required
/// conditionally.
pub const UNNEEDED_PACKAGES: &[&str] = &[
    "acquia/lightning",
    "drupal/acquia_connector",
    "drupal/acquia_purge",
];

/// Installer path for SUT submodules.
///
/// Submodules are installed with their parent already, and Composer will not
/// place two packages in the same directory. The private files directory is
/// ignored by Git, so the duplicate copies end up there.
pub const SUBMODULE_INSTALL_PATH: &str = "files-private/{$name}";

/// Options for one fixture build.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Package name of the system under test.
    pub sut: Option<String>,

    /// Add only the SUT and its submodules.
    pub sut_only: bool,

    /// Composer project to scaffold from.
    pub base_project: String,

    /// Packages to strip from the scaffold when present.
    pub unneeded_packages: Vec<String>,

    pub site: SiteInstall,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            sut: None,
            sut_only: false,
            base_project: BASE_PROJECT.to_string(),
            unneeded_packages: UNNEEDED_PACKAGES.iter().map(ToString::to_string).collect(),
            site: SiteInstall::default(),
        }
    }
}

/// One stage of the build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    Scaffold,
    RemoveUnneededPackages,
    ConfigureTopLevelPackages,
    RequireTopLevelPackages,
    ForceSutSymlinkInstall,
    VerifySutPlacement,
    AddSutSubmodules,
    RecordMetadata,
    CommitPackages,
    InstallApplication,
    EnableModules,
    CreateBackupBranch,
}

impl Step {
    /// Every step, in execution order.
    pub const ALL: [Step; 12] = [
        Step::Scaffold,
        Step::RemoveUnneededPackages,
        Step::ConfigureTopLevelPackages,
        Step::RequireTopLevelPackages,
        Step::ForceSutSymlinkInstall,
        Step::VerifySutPlacement,
        Step::AddSutSubmodules,
        Step::RecordMetadata,
        Step::CommitPackages,
        Step::InstallApplication,
        Step::EnableModules,
        Step::CreateBackupBranch,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Scaffold => "scaffold",
            Self::RemoveUnneededPackages => "remove-unneeded-packages",
            Self::ConfigureTopLevelPackages => "configure-top-level-packages",
            Self::RequireTopLevelPackages => "require-top-level-packages",
            Self::ForceSutSymlinkInstall => "force-sut-symlink-install",
            Self::VerifySutPlacement => "verify-sut-placement",
            Self::AddSutSubmodules => "add-sut-submodules",
            Self::RecordMetadata => "record-metadata",
            Self::CommitPackages => "commit-packages",
            Self::InstallApplication => "install-application",
            Self::EnableModules => "enable-modules",
            Self::CreateBackupBranch => "create-backup-branch",
        }
    }

    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::Scaffold => "Creating BLT project",
            Self::RemoveUnneededPackages => "Removing unneeded projects",
            Self::ConfigureTopLevelPackages => "Configuring Composer for Acquia projects",
            Self::RequireTopLevelPackages => "Requiring Acquia projects",
            Self::ForceSutSymlinkInstall => "Forcing symlinked SUT install",
            Self::VerifySutPlacement => "Verifying SUT placement",
            Self::AddSutSubmodules => "Adding SUT submodules",
            Self::RecordMetadata => "Recording fixture metadata",
            Self::CommitPackages => "Committing added projects",
            Self::InstallApplication => "Installing Drupal",
            Self::EnableModules => "Installing Acquia product modules",
            Self::CreateBackupBranch => "Creating backup branch",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// State threaded through the steps of one build.
#[derive(Debug)]
pub struct BuildContext<'a> {
    sut: Option<&'a Project>,
    sut_only: bool,
    sut_submodules: Vec<&'a Project>,
    completed: Vec<Step>,
    enabled_modules: Vec<String>,
}

impl<'a> BuildContext<'a> {
    #[must_use]
    pub fn sut(&self) -> Option<&'a Project> {
        self.sut
    }

    #[must_use]
    pub fn sut_only(&self) -> bool {
        self.sut_only
    }

    /// Submodules registered for the SUT.
    #[must_use]
    pub fn sut_submodules(&self) -> &[&'a Project] {
        &self.sut_submodules
    }

    /// Steps finished so far.
    #[must_use]
    pub fn completed(&self) -> &[Step] {
        &self.completed
    }

    /// The steps this build runs. SUT steps are dropped without a SUT, and
    /// the submodule step without SUT submodules.
    #[must_use]
    pub fn plan(&self) -> Vec<Step> {
        Step::ALL
            .into_iter()
            .filter(|step| match step {
                Step::ForceSutSymlinkInstall | Step::VerifySutPlacement => self.sut.is_some(),
                Step::AddSutSubmodules => self.sut.is_some() && !self.sut_submodules.is_empty(),
                _ => true,
            })
            .collect()
    }
}

/// Summary of a finished build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub steps: Vec<Step>,
    pub enabled_modules: Vec<String>,
}

/// Drives a fixture build.
pub struct FixtureOrchestrator<R> {
    fixture: Fixture,
    projects: ProjectRegistry,
    submodules: SubmoduleRegistry,
    runner: R,
    options: BuildOptions,
}

impl<R: ToolRunner> FixtureOrchestrator<R> {
    pub fn new(
        fixture: Fixture,
        projects: ProjectRegistry,
        submodules: SubmoduleRegistry,
        runner: R,
        options: BuildOptions,
    ) -> Self {
        Self {
            fixture,
            projects,
            submodules,
            runner,
            options,
        }
    }

    #[must_use]
    pub fn fixture(&self) -> &Fixture {
        &self.fixture
    }

    #[must_use]
    pub fn projects(&self) -> &ProjectRegistry {
        &self.projects
    }

    #[must_use]
    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Resolve the SUT and start a build context.
    ///
    /// # Errors
    ///
    /// Returns an error if the SUT is not a registered project, or SUT-only
    /// mode was requested without a SUT.
    pub fn context(&self) -> Result<BuildContext<'_>, BuildError> {
        let sut = match &self.options.sut {
            Some(name) => Some(
                self.projects
                    .get(name)
                    .ok_or_else(|| BuildError::UnknownProject(name.clone()))?,
            ),
            None => None,
        };
        if self.options.sut_only && sut.is_none() {
            return Err(BuildError::SutOnlyWithoutSut);
        }

        let sut_submodules = sut
            .map(|s| self.submodules.by_parent(s).collect())
            .unwrap_or_default();

        Ok(BuildContext {
            sut,
            sut_only: self.options.sut_only,
            sut_submodules,
            completed: Vec::new(),
            enabled_modules: Vec::new(),
        })
    }

    /// The steps [`create`](Self::create) would run, without running them.
    ///
    /// # Errors
    ///
    /// Returns the same validation errors as [`context`](Self::context).
    pub fn plan(&self) -> Result<Vec<Step>, BuildError> {
        Ok(self.context()?.plan())
    }

    /// Build the fixture from scratch.
    ///
    /// # Errors
    ///
    /// Returns an error if the fixture already exists, the options are
    /// invalid, or any step fails.
    pub fn create(&self) -> Result<BuildReport, BuildError> {
        if self.fixture.exists() {
            return Err(BuildError::FixtureExists(self.fixture.root().to_path_buf()));
        }

        let mut context = self.context()?;
        for step in context.plan() {
            self.run_step(step, &mut context)?;
        }

        info!(root = %self.fixture.root().display(), "fixture created");
        Ok(BuildReport {
            steps: context.completed,
            enabled_modules: context.enabled_modules,
        })
    }

    /// Run a single step and record it as completed.
    ///
    /// # Errors
    ///
    /// Returns the step's failure unchanged.
    pub fn run_step(&self, step: Step, context: &mut BuildContext<'_>) -> Result<(), BuildError> {
        info!(step = %step, "{}", step.description());

        match step {
            Step::Scaffold => self.scaffold()?,
            Step::RemoveUnneededPackages => self.remove_unneeded_packages()?,
            Step::ConfigureTopLevelPackages => self.configure_top_level_packages(context)?,
            Step::RequireTopLevelPackages => self.require_top_level_packages(context)?,
            Step::ForceSutSymlinkInstall => {
                if let Some(sut) = context.sut {
                    self.force_sut_symlink_install(sut)?;
                }
            }
            Step::VerifySutPlacement => {
                if let Some(sut) = context.sut {
                    self.verify_sut_placement(sut)?;
                }
            }
            Step::AddSutSubmodules => self.add_sut_submodules(context)?,
            Step::RecordMetadata => self.record_metadata(context)?,
            Step::CommitPackages => self.checkpoint().commit("Added Acquia projects.")?,
            Step::InstallApplication => self.install_application()?,
            Step::EnableModules => context.enabled_modules = self.enable_modules(context)?,
            Step::CreateBackupBranch => self.checkpoint().branch(BASE_FIXTURE_BRANCH)?,
        }

        context.completed.push(step);
        Ok(())
    }

    /// Return an existing fixture to its backup branch.
    ///
    /// # Errors
    ///
    /// Returns an error if the fixture does not exist or Git fails.
    pub fn reset(&self) -> Result<(), BuildError> {
        if !self.fixture.exists() {
            return Err(BuildError::FixtureMissing(self.fixture.root().to_path_buf()));
        }
        self.checkpoint().restore(BASE_FIXTURE_BRANCH)?;
        Ok(())
    }

    /// Requirements for `composer require`, in registry order.
    ///
    /// The SUT is required at the dev version so that it resolves from its
    /// path repository. In SUT-only mode nothing else is required.
    #[must_use]
    pub fn top_level_requirements(&self, context: &BuildContext<'_>) -> Vec<String> {
        let mut requirements = self.projects.multiple(None, Project::package_string);
        match context.sut {
            None => requirements.into_values().collect(),
            Some(sut) if context.sut_only => vec![sut.dev_package_string()],
            Some(sut) => {
                requirements.insert(sut.package_name().to_string(), sut.dev_package_string());
                requirements.into_values().collect()
            }
        }
    }

    /// Machine names of the modules to enable.
    ///
    /// # Errors
    ///
    /// Returns an error if an installed info file cannot be read.
    pub fn module_list(&self, context: &BuildContext<'_>) -> Result<Vec<String>, BuildError> {
        let candidates: Vec<&str> = match context.sut {
            Some(sut) if context.sut_only => sut
                .is_module()
                .then_some(sut.project_name())
                .into_iter()
                .chain(context.sut_submodules.iter().map(|p| p.project_name()))
                .collect(),
            _ => self
                .projects
                .by_type(&ProjectType::Module)
                .chain(self.submodules.all())
                .map(Project::project_name)
                .collect(),
        };

        let excluded = discovery::excluded_modules(&self.fixture.path(FIRST_PARTY_MODULE_PATH)?)?;
        let mut seen = HashSet::new();
        Ok(candidates
            .into_iter()
            .filter(|name| !excluded.contains(*name))
            .filter(|name| seen.insert(*name))
            .map(ToString::to_string)
            .collect())
    }

    fn checkpoint(&self) -> Checkpoint<'_, R> {
        Checkpoint::new(&self.runner, self.fixture.root())
    }

    fn scaffold(&self) -> Result<(), BuildError> {
        let root = self.fixture.root();
        let parent = root
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let target = root
            .file_name()
            .map_or_else(|| root.to_path_buf(), PathBuf::from);

        fs::create_dir_all(parent).map_err(BuildError::io(parent))?;
        self.runner
            .run(&commands::create_project(&self.options.base_project, &target), parent)?;

        // A later step replaces a vendored package in place.
        let mut session = ManifestSession::load(self.fixture.manifest_path())?;
        session.add_config_setting("discard-changes", true)?;
        session.save()?;
        Ok(())
    }

    fn remove_unneeded_packages(&self) -> Result<(), BuildError> {
        let manifest = Manifest::from_path(self.fixture.manifest_path())?;
        let present: Vec<&str> = self
            .options
            .unneeded_packages
            .iter()
            .map(String::as_str)
            .filter(|p| manifest.requires(p))
            .collect();

        if present.is_empty() {
            debug!("no unneeded packages present");
            return Ok(());
        }
        self.runner
            .run(&commands::remove(&present), self.fixture.root())?;
        Ok(())
    }

    fn configure_top_level_packages(&self, context: &BuildContext<'_>) -> Result<(), BuildError> {
        let mut session = ManifestSession::load(self.fixture.manifest_path())?;

        let modules: Vec<String> = self
            .projects
            .by_type(&ProjectType::Module)
            .map(|p| p.package_name().to_string())
            .collect();
        session.prepend_installer_paths([(format!("{FIRST_PARTY_MODULE_PATH}/{{$name}}"), modules)])?;

        if let Some(sut) = context.sut {
            session.prepend_repositories([(
                sut.package_name(),
                Repository::path(sut.repository_url()),
            )])?;
        }

        session.save()?;
        Ok(())
    }

    fn require_top_level_packages(&self, context: &BuildContext<'_>) -> Result<(), BuildError> {
        let packages = self.top_level_requirements(context);
        if packages.is_empty() {
            debug!("no top-level packages to require");
            return Ok(());
        }
        self.runner
            .run(&commands::require(&packages), self.fixture.root())?;
        Ok(())
    }

    /// Drop the lock file and the installed SUT so Composer has to resolve
    /// the SUT from its path repository again.
    fn force_sut_symlink_install(&self, sut: &Project) -> Result<(), BuildError> {
        remove_path(&self.fixture.lock_path())?;
        remove_path(&self.fixture.path(sut.install_path())?)?;
        self.runner.run(&commands::install(), self.fixture.root())?;
        Ok(())
    }

    fn verify_sut_placement(&self, sut: &Project) -> Result<(), BuildError> {
        let path = self.fixture.path(sut.install_path())?;

        let message = if !path.exists() {
            "Failed to place SUT at correct path."
        } else if !path.is_symlink() {
            "Failed to symlink SUT via local path repository."
        } else {
            debug!(path = %path.display(), "SUT is symlinked");
            return Ok(());
        };

        warn!(sut = %sut, path = %path.display(), "{message}");
        Err(BuildError::Verification { message, path })
    }

    fn add_sut_submodules(&self, context: &BuildContext<'_>) -> Result<(), BuildError> {
        let submodules = &context.sut_submodules;
        if submodules.is_empty() {
            return Ok(());
        }

        let mut session = ManifestSession::load(self.fixture.manifest_path())?;
        session.prepend_repositories(
            submodules
                .iter()
                .map(|p| (p.package_name(), Repository::path(p.repository_url()))),
        )?;
        session.prepend_installer_paths([(
            SUBMODULE_INSTALL_PATH,
            submodules.iter().map(|p| p.package_name().to_string()).collect(),
        )])?;
        session.save()?;

        let packages: Vec<String> = submodules.iter().map(|p| p.dev_package_string()).collect();
        self.runner
            .run(&commands::require(&packages), self.fixture.root())?;
        Ok(())
    }

    fn record_metadata(&self, context: &BuildContext<'_>) -> Result<(), BuildError> {
        let mut session = ManifestSession::load(self.fixture.manifest_path())?;
        session.set_metadata(&FixtureMetadata {
            sut: context.sut.map(|p| p.package_name().to_string()),
            sut_only: context.sut_only,
        })?;
        session.save()?;
        Ok(())
    }

    fn install_application(&self) -> Result<(), BuildError> {
        let settings_path = self.fixture.path(SETTINGS_FILE)?;
        match settings::ensure_settings(&settings_path)? {
            SettingsOutcome::AlreadyPresent => debug!("local settings already present"),
            SettingsOutcome::Appended => debug!(path = %settings_path.display(), "local settings added"),
        }

        self.runner
            .run(&commands::site_install(&self.options.site), self.fixture.root())?;
        self.checkpoint().commit("Installed Drupal.")?;
        Ok(())
    }

    fn enable_modules(&self, context: &BuildContext<'_>) -> Result<Vec<String>, BuildError> {
        let modules = self.module_list(context)?;
        if modules.is_empty() {
            info!("no modules to enable");
            return Ok(modules);
        }
        self.runner
            .run(&commands::enable_modules(&modules), self.fixture.root())?;
        Ok(modules)
    }
}

/// Remove a file, symlink or directory. A symlink is removed without touching
/// its target. Missing paths are ignored.
fn remove_path(path: &Path) -> Result<(), BuildError> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(BuildError::io(path)(e)),
    };

    if metadata.is_dir() {
        fs::remove_dir_all(path).map_err(BuildError::io(path))
    } else {
        fs::remove_file(path).map_err(BuildError::io(path))
    }
}
