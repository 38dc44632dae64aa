//! Errors raised while building or inspecting a fixture.

use crate::discovery::DiscoveryError;
use crate::manifest::ManifestError;
use crate::project::ProjectError;
use crate::registry::RegistryError;
use crate::settings::SettingsError;
use crate::tool::ToolError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a fixture build.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error(transparent)]
    Project(#[from] ProjectError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error("unknown project `{0}`")]
    UnknownProject(String),

    #[error("SUT-only mode requires a SUT")]
    SutOnlyWithoutSut,

    #[error("the fixture already exists at {0}; destroy it first")]
    FixtureExists(PathBuf),

    #[error("no fixture exists at {0}")]
    FixtureMissing(PathBuf),

    #[error("path {0} is outside the fixture")]
    PathOutsideFixture(PathBuf),

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("{message} ({path})")]
    Verification { message: &'static str, path: PathBuf },

    #[error("failed to update {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Broad classification of a [`BuildError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed project configuration or manifest content.
    Validation,
    /// The fixture is not in a state the operation can start from.
    Precondition,
    /// An external command exited non-zero or could not be launched.
    ExternalTool,
    /// The SUT was not installed as a symlink.
    Verification,
    /// A direct filesystem operation failed.
    Filesystem,
}

impl BuildError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Registry(RegistryError::Io(_))
            | Self::Manifest(ManifestError::Io(_))
            | Self::Discovery(DiscoveryError::Io(_))
            | Self::Settings(_) => ErrorKind::Filesystem,
            Self::Project(_)
            | Self::Registry(_)
            | Self::Manifest(_)
            | Self::Discovery(_)
            | Self::UnknownProject(_)
            | Self::SutOnlyWithoutSut
            | Self::PathOutsideFixture(_) => ErrorKind::Validation,
            Self::FixtureExists(_) | Self::FixtureMissing(_) => ErrorKind::Precondition,
            Self::Tool(_) => ErrorKind::ExternalTool,
            Self::Verification { .. } => ErrorKind::Verification,
            Self::Io { .. } => ErrorKind::Filesystem,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    fn io_error() -> io::Error {
        io::Error::new(io::ErrorKind::PermissionDenied, "read-only")
    }

    #[test]
    fn io_failures_are_filesystem_errors() {
        let errors = [
            BuildError::from(SettingsError::Io {
                path: "docroot/sites/default/settings/local.settings.php".to_string(),
                source: io_error(),
            }),
            BuildError::from(DiscoveryError::Io(io_error())),
            BuildError::from(RegistryError::Io(io_error())),
            BuildError::from(ManifestError::Io(io_error())),
            BuildError::io("composer.lock")(io_error()),
        ];
        for err in errors {
            assert_eq!(err.kind(), ErrorKind::Filesystem, "{err}");
        }
    }

    #[test]
    fn content_problems_are_validation_errors() {
        let errors = [
            BuildError::from(ProjectError::InvalidName("acme/".to_string())),
            BuildError::from(RegistryError::Duplicate("acme/foo".to_string())),
            BuildError::from(ManifestError::InvalidPath(String::new())),
            BuildError::UnknownProject("acme/nope".to_string()),
            BuildError::PathOutsideFixture(PathBuf::from("../precious")),
        ];
        for err in errors {
            assert_eq!(err.kind(), ErrorKind::Validation, "{err}");
        }
    }
}
