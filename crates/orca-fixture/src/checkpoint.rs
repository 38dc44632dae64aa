//! Version-control checkpoints in the fixture's Git repository.

use crate::commands;
use crate::tool::{ToolError, ToolRunner};
use std::path::Path;
use tracing::info;

/// Commits and branches in one working tree.
pub struct Checkpoint<'a, R: ToolRunner + ?Sized> {
    runner: &'a R,
    dir: &'a Path,
}

impl<'a, R: ToolRunner + ?Sized> Checkpoint<'a, R> {
    pub fn new(runner: &'a R, dir: &'a Path) -> Self {
        Self { runner, dir }
    }

    /// Stage everything and commit, even if nothing changed.
    pub fn commit(&self, message: &str) -> Result<(), ToolError> {
        self.runner.run(&commands::git_add_all(), self.dir)?;
        self.runner.run(&commands::git_commit(message), self.dir)?;
        info!(commit = message, "checkpoint recorded");
        Ok(())
    }

    /// Point `name` at the current commit.
    pub fn branch(&self, name: &str) -> Result<(), ToolError> {
        self.runner.run(&commands::git_branch_force(name), self.dir)?;
        Ok(())
    }

    /// Discard all changes since `name`, including untracked files.
    pub fn restore(&self, name: &str) -> Result<(), ToolError> {
        self.runner.run(&commands::git_reset_hard(name), self.dir)?;
        self.runner.run(&commands::git_clean(), self.dir)?;
        Ok(())
    }
}
