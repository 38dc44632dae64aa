//! Local Drupal settings required before the site install.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use thiserror::Error;

/// Settings file, relative to the fixture root.
pub const SETTINGS_FILE: &str = "docroot/sites/default/settings/local.settings.php";

/// Marks the block below as already written.
pub const SETTINGS_SENTINEL: &str = "# ORCA settings.";

const SETTINGS_BLOCK: &str = r"$databases['default']['default']['database'] = dirname(DRUPAL_ROOT) . '/docroot/sites/default/files/.ht.sqlite';
$databases['default']['default']['driver'] = 'sqlite';
unset($databases['default']['default']['namespace']);

// Use a minimal bootstrap container so that database dumps can be imported
// into an empty database without a cache_container table being created first.
$settings['bootstrap_container_definition'] = [
  'parameters' => [],
  'services' => [
    'database' => [
      'class' => 'Drupal\Core\Database\Connection',
      'factory' => 'Drupal\Core\Database\Database::getConnection',
      'arguments' => ['default'],
    ],
    'cache.container' => [
      'class' => 'Drupal\Core\Cache\MemoryBackend',
    ],
    'cache_tags_provider.container' => [
      'class' => 'Drupal\Core\Cache\DatabaseCacheTagsChecksum',
      'arguments' => ['@database'],
    ],
  ],
];
";

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("failed to update settings file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// What [`ensure_settings`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsOutcome {
    AlreadyPresent,
    Appended,
}

/// Append the local settings block to `path` unless the sentinel is already
/// there. A missing file is created.
pub fn ensure_settings(path: &Path) -> Result<SettingsOutcome, SettingsError> {
    let io_err = |source| SettingsError::Io {
        path: path.display().to_string(),
        source,
    };

    let existing = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(io_err(e)),
    };
    if existing.contains(SETTINGS_SENTINEL) {
        return Ok(SettingsOutcome::AlreadyPresent);
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(io_err)?;
    write!(file, "\n{SETTINGS_SENTINEL}\n{SETTINGS_BLOCK}").map_err(io_err)?;

    Ok(SettingsOutcome::Appended)
}
