//! The fixture: a Drupal codebase under one root directory.

use crate::error::BuildError;
use crate::manifest::{FixtureMetadata, Manifest, LOCK_FILE, MANIFEST_FILE};
use crate::project::{is_contained, FIRST_PARTY_MODULE_PATH};
use crate::registry::ProjectRegistry;
use std::path::{Path, PathBuf};

/// Branch pointing at the fully built fixture.
pub const BASE_FIXTURE_BRANCH: &str = "base-fixture";

/// The fixture root directory.
#[derive(Debug, Clone)]
pub struct Fixture {
    root: PathBuf,
}

impl Fixture {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a path relative to the fixture root.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::PathOutsideFixture`] if `relative` is absolute,
    /// empty, or contains `..`.
    pub fn path(&self, relative: impl AsRef<Path>) -> Result<PathBuf, BuildError> {
        let relative = relative.as_ref();
        if !is_contained(relative) {
            return Err(BuildError::PathOutsideFixture(relative.to_path_buf()));
        }
        Ok(self.root.join(relative))
    }

    #[must_use]
    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    #[must_use]
    pub fn lock_path(&self) -> PathBuf {
        self.root.join(LOCK_FILE)
    }

    /// Checks the filesystem on every call.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.root.exists()
    }

    /// How the fixture was built. A manifest without metadata reads as no
    /// SUT, not SUT-only.
    pub fn metadata(&self) -> Result<FixtureMetadata, BuildError> {
        let manifest = Manifest::from_path(self.manifest_path())?;
        Ok(manifest.metadata.unwrap_or_default())
    }

    /// Where test suites should be discovered.
    ///
    /// A SUT-only fixture is tested from the SUT's install path; anything
    /// else from the shared first-party module directory.
    pub fn tests_path(&self, projects: &ProjectRegistry) -> Result<PathBuf, BuildError> {
        let metadata = self.metadata()?;
        match metadata.sut {
            Some(sut) if metadata.sut_only => {
                let project = projects
                    .get(&sut)
                    .ok_or(BuildError::UnknownProject(sut))?;
                self.path(project.install_path())
            }
            _ => self.path(FIRST_PARTY_MODULE_PATH),
        }
    }

    /// Delete the fixture directory.
    pub fn destroy(&self) -> Result<(), BuildError> {
        if !self.exists() {
            return Ok(());
        }
        std::fs::remove_dir_all(&self.root).map_err(BuildError::io(&self.root))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::project::Project;
    use std::fs;
    use tempfile::TempDir;

    fn registry() -> ProjectRegistry {
        let mut projects = ProjectRegistry::new();
        projects.insert(Project::new("drupal/example").unwrap()).unwrap();
        projects
    }

    fn fixture_with_manifest(content: &str) -> (TempDir, Fixture) {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(MANIFEST_FILE), content).unwrap();
        let fixture = Fixture::new(tmp.path());
        (tmp, fixture)
    }

    #[test]
    fn resolves_paths() {
        let fixture = Fixture::new("/var/www/orca-build");
        assert_eq!(fixture.root(), Path::new("/var/www/orca-build"));
        assert_eq!(
            fixture.path("some/sub-path").unwrap(),
            PathBuf::from("/var/www/orca-build/some/sub-path")
        );
        assert_eq!(
            fixture.manifest_path(),
            PathBuf::from("/var/www/orca-build/composer.json")
        );
    }

    #[test]
    fn refuses_paths_outside_the_root() {
        let fixture = Fixture::new("/var/www/orca-build");
        for relative in ["/var/www/precious", "../precious", "docroot/../../precious", ""] {
            let err = fixture.path(relative).unwrap_err();
            assert!(matches!(err, BuildError::PathOutsideFixture(_)), "{relative:?}");
            assert_eq!(err.kind(), ErrorKind::Validation);
        }
    }

    #[test]
    fn existence_is_rechecked() {
        let tmp = TempDir::new().unwrap();
        let fixture = Fixture::new(tmp.path().join("build"));
        assert!(!fixture.exists());
        fs::create_dir(tmp.path().join("build")).unwrap();
        assert!(fixture.exists());
        fixture.destroy().unwrap();
        assert!(!fixture.exists());
    }

    #[test]
    fn tests_path_without_metadata_is_shared_root() {
        let (_tmp, fixture) = fixture_with_manifest("{}");
        assert_eq!(
            fixture.tests_path(&registry()).unwrap(),
            fixture.path("docroot/modules/contrib/acquia").unwrap()
        );
    }

    #[test]
    fn tests_path_with_sut_is_shared_root() {
        let (_tmp, fixture) =
            fixture_with_manifest(r#"{"extra": {"orca": {"sut": "drupal/example"}}}"#);
        assert_eq!(
            fixture.tests_path(&registry()).unwrap(),
            fixture.path("docroot/modules/contrib/acquia").unwrap()
        );
    }

    #[test]
    fn tests_path_sut_only_is_sut_install_path() {
        let (_tmp, fixture) = fixture_with_manifest(
            r#"{"extra": {"orca": {"sut": "drupal/example", "sut-only": true}}}"#,
        );
        assert_eq!(
            fixture.tests_path(&registry()).unwrap(),
            fixture.path("docroot/modules/contrib/acquia/example").unwrap()
        );
    }

    #[test]
    fn tests_path_sut_only_without_sut_is_shared_root() {
        let (_tmp, fixture) =
            fixture_with_manifest(r#"{"extra": {"orca": {"sut": null, "sut-only": true}}}"#);
        assert_eq!(
            fixture.tests_path(&registry()).unwrap(),
            fixture.path("docroot/modules/contrib/acquia").unwrap()
        );
    }

    #[test]
    fn tests_path_rejects_unregistered_sut() {
        let (_tmp, fixture) = fixture_with_manifest(
            r#"{"extra": {"orca": {"sut": "drupal/other", "sut-only": true}}}"#,
        );
        let err = fixture.tests_path(&registry()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn malformed_metadata_is_a_validation_error() {
        let (_tmp, fixture) = fixture_with_manifest(r#"{"extra": {"orca": "yes"}}"#);
        assert_eq!(fixture.metadata().unwrap_err().kind(), ErrorKind::Validation);
    }
}
