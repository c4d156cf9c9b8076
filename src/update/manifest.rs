//! Remote update manifest: wire format and the client that fetches it.
//!
//! The manifest is a small JSON document published next to each release:
//!
//! ```json
//! { "latest_version": "1.2.0", "min_compatible_version": "1.0.0",
//!   "download_url": "https://example.com/kiosk_1.2.0.exe",
//!   "signature": "sha256:9f86d0...", "changelog": ["Faster gallery"],
//!   "is_mandatory": false, "message": "New version available!",
//!   "release_date": "2026-10-01" }
//! ```

use super::http;
use super::version::VersionTag;
use crate::error::{Result, UpdateError};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Message shown when the publisher did not provide one.
pub const DEFAULT_MESSAGE: &str = "New version available!";

/// Descriptor of the latest published update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateManifest {
    pub latest_version: VersionTag,
    /// Oldest installed version the artifact can update in place.
    #[serde(default)]
    pub min_compatible_version: VersionTag,
    pub download_url: String,
    /// Artifact digest in `sha256:<hex>` form.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default)]
    pub changelog: Vec<String>,
    #[serde(default)]
    pub is_mandatory: bool,
    #[serde(default = "default_message")]
    pub message: String,
    /// Informational only. A value that is not a `YYYY-MM-DD` date reads as
    /// `None` instead of rejecting the manifest.
    #[serde(
        default,
        deserialize_with = "lenient_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub release_date: Option<NaiveDate>,
}

fn default_message() -> String {
    DEFAULT_MESSAGE.to_owned()
}

fn lenient_date<'de, D>(deserializer: D) -> std::result::Result<Option<NaiveDate>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = serde_json::Value::deserialize(deserializer)?;
    let date = match &raw {
        serde_json::Value::String(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d").ok(),
        _ => None,
    };
    if date.is_none() && !raw.is_null() {
        tracing::debug!("ignoring unparseable manifest release_date {raw}");
    }
    Ok(date)
}

/// Parses a manifest body, mapping any JSON or version error to
/// [`UpdateError::Parse`].
pub fn parse_manifest(body: &str) -> Result<UpdateManifest> {
    serde_json::from_str(body).map_err(|e| UpdateError::Parse(format!("invalid manifest: {e}")))
}

/// Fetches update manifests over HTTP(S).
pub struct ManifestClient {
    agent: ureq::Agent,
}

impl ManifestClient {
    /// Creates a client whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self {
            agent: http::bounded_agent(timeout),
        }
    }

    /// Fetches and parses the manifest at `url`.
    ///
    /// # Errors
    ///
    /// [`UpdateError::Network`] on timeout, connection failure, or a non-200
    /// status; [`UpdateError::Parse`] on a malformed body.
    pub fn fetch(&self, url: &str) -> Result<UpdateManifest> {
        tracing::info!("fetching update manifest from {url}");
        let resp = http::get_ok(&self.agent, url)?;
        let body = resp
            .into_string()
            .map_err(|e| UpdateError::Network(format!("cannot read manifest body: {e}")))?;
        let manifest = parse_manifest(&body)?;
        tracing::debug!(
            latest = %manifest.latest_version,
            min_compatible = %manifest.min_compatible_version,
            mandatory = manifest.is_mandatory,
            "manifest parsed"
        );
        Ok(manifest)
    }
}
