//! ORCA CLI - build and manage test fixtures for first-party Drupal packages

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod config;
mod create;
mod status;

use config::{Config, CONFIG_FILE};
use create::CreateOptions;

#[derive(Parser)]
#[command(name = "orca")]
#[command(version)]
#[command(about = "Build test fixtures for Acquia Drupal projects", long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(long, global = true, default_value = CONFIG_FILE)]
    config: PathBuf,

    /// Show debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the test fixture
    #[command(subcommand)]
    Fixture(FixtureCommand),
}

#[derive(Subcommand)]
enum FixtureCommand {
    /// Create the test fixture
    Create {
        /// The system under test, e.g. "drupal/acquia_lift"
        #[arg(long)]
        sut: Option<String>,

        /// Add only the system under test
        #[arg(long, requires = "sut")]
        sut_only: bool,

        /// Destroy any existing fixture first
        #[arg(short, long)]
        force: bool,
    },

    /// Destroy the test fixture
    Destroy,

    /// Reset the test fixture to its freshly built state
    Reset,

    /// Show the state of the test fixture
    Status,

    /// List the steps `create` would run
    Steps {
        /// The system under test
        #[arg(long)]
        sut: Option<String>,

        /// Add only the system under test
        #[arg(long, requires = "sut")]
        sut_only: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_tracing(cli.verbose);

    let config = Config::load(&cli.config)?;

    match cli.command {
        Commands::Fixture(FixtureCommand::Create {
            sut,
            sut_only,
            force,
        }) => create::create(
            &config,
            CreateOptions {
                sut,
                sut_only,
                force,
            },
        ),
        Commands::Fixture(FixtureCommand::Destroy) => status::destroy(&config),
        Commands::Fixture(FixtureCommand::Reset) => status::reset(&config),
        Commands::Fixture(FixtureCommand::Status) => status::status(&config),
        Commands::Fixture(FixtureCommand::Steps { sut, sut_only }) => {
            create::steps(&config, sut, sut_only)
        }
    }
}

fn setup_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_env("ORCA_LOG").unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("orca=debug,orca_fixture=debug,info")
        } else {
            EnvFilter::new("info")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbose)
        .with_writer(std::io::stderr)
        .init();
}
