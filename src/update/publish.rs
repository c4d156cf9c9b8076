//! Publishing side: write `update_manifest.json` for a new release.
//!
//! Fields the request leaves unset keep their value from the existing
//! manifest, or fall back to a default, so repeated publishes only change
//! what the release actually changes.

use super::integrity;
use super::manifest::{DEFAULT_MESSAGE, UpdateManifest};
use super::version::VersionTag;
use crate::error::{Result, UpdateError};
use chrono::NaiveDate;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Placeholder replaced by the release version in download URL templates.
pub const VERSION_PLACEHOLDER: &str = "{version}";

/// One release to publish.
#[derive(Debug, Clone)]
pub struct PublishRequest {
    pub version: VersionTag,
    /// Installer to hash. It is not uploaded anywhere.
    pub installer: PathBuf,
    /// Download URL, with [`VERSION_PLACEHOLDER`] substituted.
    pub download_url_template: String,
    pub min_compatible_version: Option<VersionTag>,
    pub mandatory: bool,
    pub message: Option<String>,
    /// Empty keeps the existing changelog.
    pub changelog: Vec<String>,
    pub release_date: NaiveDate,
}

/// Whatever an existing manifest file already holds.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ExistingManifest {
    min_compatible_version: Option<VersionTag>,
    message: Option<String>,
    changelog: Option<Vec<String>>,
}

/// Update (or create) the manifest at `manifest_path` for `request`.
///
/// # Errors
///
/// [`UpdateError::Filesystem`] when the installer is missing or the manifest
/// cannot be written, [`UpdateError::Parse`] when an existing manifest is not
/// valid JSON (it is left untouched).
pub fn publish(manifest_path: &Path, request: &PublishRequest) -> Result<UpdateManifest> {
    if !request.installer.is_file() {
        return Err(UpdateError::Filesystem(format!(
            "installer not found: {}",
            request.installer.display()
        )));
    }

    let existing = load_existing(manifest_path)?;
    let digest = integrity::sha256_file(&request.installer)?;
    let version = request.version.to_string();

    let manifest = UpdateManifest {
        latest_version: request.version.clone(),
        min_compatible_version: request
            .min_compatible_version
            .clone()
            .or(existing.min_compatible_version)
            .unwrap_or_else(|| request.version.clone()),
        download_url: request
            .download_url_template
            .replace(VERSION_PLACEHOLDER, &version),
        signature: Some(integrity::signature_for(&digest)),
        changelog: if request.changelog.is_empty() {
            existing
                .changelog
                .unwrap_or_else(|| vec![format!("Version {version} released")])
        } else {
            request.changelog.clone()
        },
        is_mandatory: request.mandatory,
        message: request
            .message
            .clone()
            .or(existing.message)
            .unwrap_or_else(|| DEFAULT_MESSAGE.to_owned()),
        release_date: Some(request.release_date),
    };

    if let Some(parent) = manifest_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(&manifest)
        .map_err(|e| UpdateError::Parse(format!("cannot serialize manifest: {e}")))?;
    std::fs::write(manifest_path, json).map_err(|e| {
        UpdateError::Filesystem(format!(
            "cannot write manifest {}: {e}",
            manifest_path.display()
        ))
    })?;

    tracing::info!(
        version = %manifest.latest_version,
        url = %manifest.download_url,
        digest = %digest,
        "manifest published"
    );
    Ok(manifest)
}

fn load_existing(path: &Path) -> Result<ExistingManifest> {
    match std::fs::read(path) {
        Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
            UpdateError::Parse(format!("existing manifest {} is invalid: {e}", path.display()))
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ExistingManifest::default()),
        Err(e) => Err(UpdateError::Filesystem(format!(
            "cannot read manifest {}: {e}",
            path.display()
        ))),
    }
}
