//! Implementation of the `orca fixture create` and `orca fixture steps`
//! commands.

use anyhow::{Context, Result};
use orca_fixture::{
    Fixture, FixtureOrchestrator, ProcessRunner, ProjectRegistry, SubmoduleRegistry, ToolPaths,
};
use tracing::{debug, info};

use crate::config::Config;

/// Options for creating a fixture.
#[derive(Debug, Default)]
pub struct CreateOptions {
    /// Package name of the system under test.
    pub sut: Option<String>,
    /// Add only the SUT and its submodules.
    pub sut_only: bool,
    /// Destroy an existing fixture first.
    pub force: bool,
}

/// Build the fixture described by `config`.
pub fn create(config: &Config, options: CreateOptions) -> Result<()> {
    let (projects, mut submodules) = config.registries()?;
    discover_sut_submodules(config, &projects, &mut submodules, options.sut.as_deref())?;

    let fixture = Fixture::new(&config.fixture_root);
    if options.force && fixture.exists() {
        info!(root = %fixture.root().display(), "destroying existing fixture");
        fixture.destroy().context("Failed to destroy existing fixture")?;
    }

    let runner = ProcessRunner::new(config.tool_paths()?);
    let orca = FixtureOrchestrator::new(
        fixture,
        projects,
        submodules,
        runner,
        config.build_options(options.sut, options.sut_only),
    );
    let report = orca.create().context("Failed to create fixture")?;

    println!(
        "Created fixture at {} ({} steps)",
        orca.fixture().root().display(),
        report.steps.len()
    );
    if !report.enabled_modules.is_empty() {
        println!("Enabled modules: {}", report.enabled_modules.join(", "));
    }
    Ok(())
}

/// Print the steps a build with these options would run.
pub fn steps(config: &Config, sut: Option<String>, sut_only: bool) -> Result<()> {
    let (projects, mut submodules) = config.registries()?;
    discover_sut_submodules(config, &projects, &mut submodules, sut.as_deref())?;

    let orca = FixtureOrchestrator::new(
        Fixture::new(&config.fixture_root),
        projects,
        submodules,
        ProcessRunner::new(ToolPaths::default()),
        config.build_options(sut, sut_only),
    );
    for (number, step) in orca.plan()?.into_iter().enumerate() {
        println!("{:>2}. {:<30} {}", number + 1, step.name(), step.description());
    }
    Ok(())
}

/// Pick up submodules from the SUT's local checkout, if there is one.
///
/// The SUT's repository URL is relative to the fixture root, the same way
/// Composer reads a path repository from the fixture's manifest.
fn discover_sut_submodules(
    config: &Config,
    projects: &ProjectRegistry,
    submodules: &mut SubmoduleRegistry,
    sut: Option<&str>,
) -> Result<()> {
    let Some(sut) = sut.and_then(|name| projects.get(name)) else {
        return Ok(());
    };

    let checkout = config.fixture_root.join(sut.repository_url());
    if !checkout.is_dir() {
        debug!(path = %checkout.display(), "no local SUT checkout");
        return Ok(());
    }

    let added = submodules
        .discover(sut, &checkout)
        .with_context(|| format!("Failed to scan {} for submodules", checkout.display()))?;
    if added > 0 {
        info!(sut = %sut, added, "discovered SUT submodules");
    }
    Ok(())
}
