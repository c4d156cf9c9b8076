//! Centralized application directory paths for the kiosk updater.
//!
//! Uses the [`dirs`] crate for platform-appropriate directory resolution.
//!
//! | Purpose | Windows | Linux |
//! |---------|---------|-------|
//! | Data | `%APPDATA%\kiosk\` | `~/.local/share/kiosk/` |
//! | Config | `%APPDATA%\kiosk\` | `~/.config/kiosk/` |
//!
//! # Environment Overrides
//!
//! - `KIOSK_DATA_DIR`: overrides [`data_dir`]
//! - `KIOSK_CONFIG_DIR`: overrides [`config_dir`]

use std::path::PathBuf;

/// Application data root directory.
///
/// Resolves to `dirs::data_dir()/kiosk/` by default. Override with
/// the `KIOSK_DATA_DIR` environment variable.
#[must_use]
pub fn data_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("KIOSK_DATA_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::data_dir()
        .map(|d| d.join("kiosk"))
        .unwrap_or_else(|| std::env::temp_dir().join("kiosk-data"))
}

/// Application config directory.
///
/// Resolves to `dirs::config_dir()/kiosk/` by default. Override with
/// the `KIOSK_CONFIG_DIR` environment variable.
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("KIOSK_CONFIG_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::config_dir()
        .map(|d| d.join("kiosk"))
        .unwrap_or_else(|| std::env::temp_dir().join("kiosk-config"))
}

/// Updater config file path (`config_dir()/updater.toml`).
#[must_use]
pub fn config_file() -> PathBuf {
    config_dir().join("updater.toml")
}

/// Version record path (`config_dir()/version.json`).
#[must_use]
pub fn version_file() -> PathBuf {
    config_dir().join("version.json")
}

/// Log file directory (`data_dir()/logs/`).
#[must_use]
pub fn logs_dir() -> PathBuf {
    data_dir().join("logs")
}
