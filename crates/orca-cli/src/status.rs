//! Implementation of the `orca fixture status`, `destroy` and `reset`
//! commands.

use anyhow::{Context, Result};
use orca_fixture::{
    Fixture, FixtureOrchestrator, ProcessRunner, ProjectRegistry, SubmoduleRegistry,
};

use crate::config::Config;

/// Print what is known about the fixture.
pub fn status(config: &Config) -> Result<()> {
    let fixture = Fixture::new(&config.fixture_root);
    if !fixture.exists() {
        println!("No fixture at {}", fixture.root().display());
        return Ok(());
    }

    let metadata = fixture.metadata().context("Failed to read fixture metadata")?;
    let (projects, _) = config.registries()?;
    let tests_path = fixture
        .tests_path(&projects)
        .context("Failed to resolve tests path")?;

    println!("Fixture:    {}", fixture.root().display());
    println!("SUT:        {}", metadata.sut.as_deref().unwrap_or("none"));
    println!("SUT-only:   {}", if metadata.sut_only { "yes" } else { "no" });
    println!("Tests path: {}", tests_path.display());
    Ok(())
}

pub fn destroy(config: &Config) -> Result<()> {
    let fixture = Fixture::new(&config.fixture_root);
    if !fixture.exists() {
        println!("No fixture at {}", fixture.root().display());
        return Ok(());
    }
    fixture.destroy().context("Failed to destroy fixture")?;
    println!("Destroyed fixture at {}", fixture.root().display());
    Ok(())
}

/// Return the fixture to its backup branch.
pub fn reset(config: &Config) -> Result<()> {
    let orca = FixtureOrchestrator::new(
        Fixture::new(&config.fixture_root),
        ProjectRegistry::new(),
        SubmoduleRegistry::new(),
        ProcessRunner::new(config.tool_paths()?),
        config.build_options(None, false),
    );
    orca.reset().context("Failed to reset fixture")?;
    println!("Reset fixture at {}", orca.fixture().root().display());
    Ok(())
}
