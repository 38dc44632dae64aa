//! Running external tools (Composer, Git, Drush).
//!
//! The orchestrator only ever talks to a [`ToolRunner`]. [`ProcessRunner`]
//! runs real processes; tests substitute a scripted runner.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;
use tracing::debug;

/// Errors that can occur when running an external tool.
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("failed to launch `{command}`: {source}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` failed with {status}\n{stderr}")]
    Failed {
        command: String,
        status: String,
        stderr: String,
    },
}

/// The external tools the fixture build drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    Composer,
    Git,
    Drush,
}

impl Tool {
    /// The executable name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Composer => "composer",
            Self::Git => "git",
            Self::Drush => "drush",
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One command line for a tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub tool: Tool,
    pub args: Vec<String>,
}

impl Invocation {
    pub fn new<S: Into<String>>(tool: Tool, args: impl IntoIterator<Item = S>) -> Self {
        Self {
            tool,
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// The first argument, i.e. the subcommand.
    #[must_use]
    pub fn subcommand(&self) -> Option<&str> {
        self.args.first().map(String::as_str)
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tool)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Captured output of a successful invocation.
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Runs an invocation to completion in a working directory.
///
/// A non-zero exit is an error; there are no retries.
pub trait ToolRunner {
    fn run(&self, invocation: &Invocation, cwd: &Path) -> Result<ToolOutput, ToolError>;
}

impl<R: ToolRunner + ?Sized> ToolRunner for &R {
    fn run(&self, invocation: &Invocation, cwd: &Path) -> Result<ToolOutput, ToolError> {
        (**self).run(invocation, cwd)
    }
}

/// Resolved executable locations.
#[derive(Debug, Clone)]
pub struct ToolPaths {
    pub composer: PathBuf,
    pub git: PathBuf,
    /// Drush executable. When unset, the fixture's own `vendor/bin/drush`
    /// relative to the working directory is used.
    pub drush: Option<PathBuf>,
}

impl Default for ToolPaths {
    /// Bare executable names, looked up on `PATH` when spawned.
    fn default() -> Self {
        Self {
            composer: PathBuf::from(Tool::Composer.name()),
            git: PathBuf::from(Tool::Git.name()),
            drush: None,
        }
    }
}

/// Runs tools as child processes.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    paths: ToolPaths,
}

impl ProcessRunner {
    #[must_use]
    pub fn new(paths: ToolPaths) -> Self {
        Self { paths }
    }

    fn executable(&self, tool: Tool, cwd: &Path) -> PathBuf {
        match tool {
            Tool::Composer => self.paths.composer.clone(),
            Tool::Git => self.paths.git.clone(),
            Tool::Drush => self
                .paths
                .drush
                .clone()
                .unwrap_or_else(|| cwd.join("vendor/bin/drush")),
        }
    }
}

impl ToolRunner for ProcessRunner {
    fn run(&self, invocation: &Invocation, cwd: &Path) -> Result<ToolOutput, ToolError> {
        let command = invocation.to_string();
        debug!(%command, cwd = %cwd.display(), "running");

        let output = Command::new(self.executable(invocation.tool, cwd))
            .args(&invocation.args)
            .current_dir(cwd)
            .output()
            .map_err(|source| ToolError::Launch {
                command: command.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            return Err(ToolError::Failed {
                command,
                status: output.status.to_string(),
                stderr,
            });
        }

        Ok(ToolOutput { stdout, stderr })
    }
}
