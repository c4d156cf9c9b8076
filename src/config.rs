//! Configuration for the update subsystem.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level updater configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdaterConfig {
    /// Application name, used for scratch directory naming and log lines.
    pub app_name: String,
    /// Manifest URL. Falls back to `update_url` in the version record.
    pub manifest_url: Option<String>,
    /// Location of the persisted version record.
    pub version_file: PathBuf,
    /// Parent of the per-instance scratch directory (`None` = system temp).
    pub scratch_root: Option<PathBuf>,
    /// Deadline for a manifest request, in seconds.
    pub manifest_timeout_secs: u64,
    /// Connect/read timeout for artifact downloads, in seconds.
    pub download_timeout_secs: u64,
    /// Refuse to apply artifacts whose manifest carries no signature.
    pub require_signature: bool,
    /// Force packaged-install detection on or off (`None` = detect).
    pub packaged: Option<bool>,
    /// Application the update script relaunches (`None` = this executable).
    pub app_executable: Option<PathBuf>,
    /// How the update script waits for this process to exit.
    pub exit_wait: ExitWaitConfig,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            app_name: "kiosk".to_owned(),
            manifest_url: None,
            version_file: crate::kiosk_dirs::version_file(),
            scratch_root: None,
            manifest_timeout_secs: 10,
            download_timeout_secs: 60,
            require_signature: true,
            packaged: None,
            app_executable: None,
            exit_wait: ExitWaitConfig::default(),
        }
    }
}

/// Exit synchronization for the detached update script.
///
/// The script sleeps `grace_secs`, then polls the parent pid once per second
/// until it is gone or `max_wait_secs` have passed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExitWaitConfig {
    pub grace_secs: u64,
    pub max_wait_secs: u64,
}

impl Default for ExitWaitConfig {
    fn default() -> Self {
        Self {
            grace_secs: 2,
            max_wait_secs: 30,
        }
    }
}

impl UpdaterConfig {
    pub fn manifest_timeout(&self) -> Duration {
        Duration::from_secs(self.manifest_timeout_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::error::UpdateError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::UpdateError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path (`kiosk_dirs::config_file()`).
    pub fn default_config_path() -> PathBuf {
        crate::kiosk_dirs::config_file()
    }
}
