//! Update decision logic.

use super::manifest::UpdateManifest;
use super::version::VersionTag;
use serde::Serialize;

/// Outcome of an update check.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UpdateDecision {
    /// The installed version is current (or newer than the manifest).
    NoUpdate,
    /// A newer version can be installed over the current one.
    UpdateAvailable {
        target: VersionTag,
        /// Whether the publisher marked the update non-optional. Enforcing it
        /// is up to the caller.
        mandatory: bool,
        download_url: String,
        changelog: Vec<String>,
        message: String,
        signature: Option<String>,
    },
    /// A newer version exists but the installed one is below the
    /// compatibility floor; a manual reinstall is required.
    Incompatible { reason: String },
    /// The check itself failed (network, parse, missing URL).
    CheckFailed { reason: String },
}

impl UpdateDecision {
    pub fn has_update(&self) -> bool {
        matches!(self, Self::UpdateAvailable { .. })
    }
}

/// Decides what to do given the installed version and a fetched manifest.
///
/// Compatibility is only considered once a newer version exists, so an
/// up-to-date install is never reported as incompatible.
pub fn plan(current: &VersionTag, manifest: &UpdateManifest) -> UpdateDecision {
    if manifest.latest_version <= *current {
        return UpdateDecision::NoUpdate;
    }

    if *current < manifest.min_compatible_version {
        return UpdateDecision::Incompatible {
            reason: format!(
                "installed version {current} is older than {}, the minimum that can \
                 update in place to {}; download and install the new version manually",
                manifest.min_compatible_version, manifest.latest_version
            ),
        };
    }

    UpdateDecision::UpdateAvailable {
        target: manifest.latest_version.clone(),
        mandatory: manifest.is_mandatory,
        download_url: manifest.download_url.clone(),
        changelog: manifest.changelog.clone(),
        message: manifest.message.clone(),
        signature: manifest.signature.clone(),
    }
}
