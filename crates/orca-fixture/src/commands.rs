//! The command lines the fixture build issues.

use crate::tool::{Invocation, Tool};
use std::path::Path;

/// Author recorded on checkpoint commits.
pub const CHECKPOINT_AUTHOR: &str = "ORCA <no-reply@acquia.com>";

/// Options for the Drupal site install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteInstall {
    pub profile: String,
    pub site_name: String,
    pub account_name: String,
    pub account_pass: String,
}

impl Default for SiteInstall {
    fn default() -> Self {
        Self {
            profile: String::from("minimal"),
            site_name: String::from("ORCA"),
            account_name: String::from("admin"),
            account_pass: String::from("admin"),
        }
    }
}

/// `composer create-project` without installing dependencies or running
/// scripts.
pub fn create_project(source: &str, target: &Path) -> Invocation {
    Invocation::new(
        Tool::Composer,
        [
            "create-project".to_string(),
            "--stability=dev".to_string(),
            "--no-interaction".to_string(),
            "--no-install".to_string(),
            "--no-scripts".to_string(),
            source.to_string(),
            target.display().to_string(),
        ],
    )
}

pub fn remove<S: AsRef<str>>(packages: &[S]) -> Invocation {
    let mut args = vec!["remove".to_string(), "--no-update".to_string()];
    args.extend(packages.iter().map(|p| p.as_ref().to_string()));
    Invocation::new(Tool::Composer, args)
}

pub fn require<S: AsRef<str>>(packages: &[S]) -> Invocation {
    let mut args = vec!["require".to_string(), "-n".to_string()];
    args.extend(packages.iter().map(|p| p.as_ref().to_string()));
    Invocation::new(Tool::Composer, args)
}

pub fn install() -> Invocation {
    Invocation::new(Tool::Composer, ["install", "--no-interaction"])
}

pub fn git_add_all() -> Invocation {
    Invocation::new(Tool::Git, ["add", "-A"])
}

/// An empty-allowed commit so that a step with no changes still leaves a
/// checkpoint.
pub fn git_commit(message: &str) -> Invocation {
    Invocation::new(
        Tool::Git,
        [
            "commit",
            "-m",
            message,
            "--author",
            CHECKPOINT_AUTHOR,
            "--allow-empty",
        ],
    )
}

pub fn git_branch_force(name: &str) -> Invocation {
    Invocation::new(Tool::Git, ["branch", "--force", name])
}

pub fn git_reset_hard(target: &str) -> Invocation {
    Invocation::new(Tool::Git, ["reset", "--hard", target])
}

pub fn git_clean() -> Invocation {
    Invocation::new(Tool::Git, ["clean", "--force", "-d"])
}

pub fn site_install(site: &SiteInstall) -> Invocation {
    Invocation::new(
        Tool::Drush,
        [
            "site-install".to_string(),
            site.profile.clone(),
            "install_configure_form.update_status_module='[FALSE,FALSE]'".to_string(),
            "install_configure_form.enable_update_status_module=NULL".to_string(),
            format!("--site-name={}", site.site_name),
            format!("--account-name={}", site.account_name),
            format!("--account-pass={}", site.account_pass),
            "--no-interaction".to_string(),
        ],
    )
}

pub fn enable_modules<S: AsRef<str>>(modules: &[S]) -> Invocation {
    let mut args = vec!["pm-enable".to_string(), "-y".to_string()];
    args.extend(modules.iter().map(|m| m.as_ref().to_string()));
    Invocation::new(Tool::Drush, args)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_and_remove_lists() {
        assert_eq!(
            require(&["a/b:*", "c/d:@dev"]).to_string(),
            "composer require -n a/b:* c/d:@dev"
        );
        assert_eq!(
            remove(&["acquia/lightning"]).to_string(),
            "composer remove --no-update acquia/lightning"
        );
    }

    #[test]
    fn create_project_defers_install() {
        let invocation = create_project("acquia/blt-project", Path::new("/tmp/build"));
        assert!(invocation.args.contains(&"--no-install".to_string()));
        assert!(invocation.args.contains(&"--no-scripts".to_string()));
        assert_eq!(invocation.args.last().map(String::as_str), Some("/tmp/build"));
    }

    #[test]
    fn commit_allows_empty_and_sets_author() {
        let invocation = git_commit("Installed Drupal.");
        assert_eq!(
            invocation.args,
            vec![
                "commit",
                "-m",
                "Installed Drupal.",
                "--author",
                CHECKPOINT_AUTHOR,
                "--allow-empty"
            ]
        );
    }

    #[test]
    fn site_install_uses_site_options() {
        let site = SiteInstall {
            site_name: "Fixture".to_string(),
            ..SiteInstall::default()
        };
        let invocation = site_install(&site);
        assert_eq!(invocation.tool, Tool::Drush);
        assert_eq!(invocation.args[1], "minimal");
        assert!(invocation.args.contains(&"--site-name=Fixture".to_string()));
    }

    #[test]
    fn enable_is_space_separated_list() {
        assert_eq!(
            enable_modules(&["foo", "bar"]).to_string(),
            "drush pm-enable -y foo bar"
        );
    }
}
