//! Version record persistence.
//!
//! Tracks the installed version, build metadata, and the last update check.
//! Stored as pretty JSON (default `kiosk_dirs::version_file()`); every
//! mutation rewrites the whole file.

use super::version::VersionTag;
use crate::error::{Result, UpdateError};
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};

/// Persistent version metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VersionRecord {
    /// Installed version.
    pub version: VersionTag,
    #[serde(deserialize_with = "de_timestamp")]
    pub build_date: DateTime<Utc>,
    pub build_number: i64,
    /// When the manifest was last fetched successfully.
    #[serde(deserialize_with = "de_opt_timestamp")]
    pub last_update_check: Option<DateTime<Utc>>,
    /// Manifest URL used when the config does not set one.
    pub update_url: Option<String>,
    /// User preference; acting on it is up to the caller.
    pub auto_update: bool,
}

impl Default for VersionRecord {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            version: package_version(),
            build_date: now,
            build_number: now.timestamp(),
            last_update_check: None,
            update_url: None,
            auto_update: false,
        }
    }
}

/// This crate's own version, used for first-run records.
pub fn package_version() -> VersionTag {
    env!("CARGO_PKG_VERSION").parse().unwrap_or_default()
}

/// Status summary for the web layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateInfo {
    pub current_version: String,
    pub last_check: Option<DateTime<Utc>>,
    pub auto_update: bool,
    pub update_url: Option<String>,
}

impl VersionRecord {
    pub fn update_info(&self) -> UpdateInfo {
        UpdateInfo {
            current_version: self.version.to_string(),
            last_check: self.last_update_check,
            auto_update: self.auto_update,
            update_url: self.update_url.clone(),
        }
    }

    /// Returns `true` if the last check was at least `hours` hours before
    /// `now` (or if no check has been recorded yet).
    pub fn check_is_stale(&self, hours: u64, now: DateTime<Utc>) -> bool {
        let Some(last) = self.last_update_check else {
            return true;
        };
        let elapsed_hours = (now - last).num_hours().max(0) as u64;
        elapsed_hours >= hours
    }
}

/// Reads and writes the version record file.
#[derive(Debug, Clone)]
pub struct VersionStore {
    path: PathBuf,
}

impl VersionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the record, creating the file with defaults if it does not exist.
    ///
    /// A file that exists but cannot be parsed is logged and replaced by
    /// defaults in memory only; it is not overwritten.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read, or if the
    /// default record cannot be written.
    pub fn load(&self) -> Result<VersionRecord> {
        let bytes = match std::fs::read(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let record = VersionRecord::default();
                tracing::info!(
                    "no version record at {}, creating one for {}",
                    self.path.display(),
                    record.version
                );
                self.save(&record)?;
                return Ok(record);
            }
            Err(e) => {
                return Err(UpdateError::Filesystem(format!(
                    "cannot read version record {}: {e}",
                    self.path.display()
                )));
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(record) => Ok(record),
            Err(e) => {
                tracing::warn!(
                    "version record {} unreadable, using defaults: {e}",
                    self.path.display()
                );
                Ok(VersionRecord::default())
            }
        }
    }

    /// Persist `record`, replacing the whole file.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be created or the file
    /// cannot be written.
    pub fn save(&self, record: &VersionRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                UpdateError::Filesystem(format!(
                    "cannot create state directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let json = serde_json::to_string_pretty(record)
            .map_err(|e| UpdateError::Parse(format!("cannot serialize version record: {e}")))?;

        std::fs::write(&self.path, json).map_err(|e| {
            UpdateError::Filesystem(format!(
                "cannot write version record to {}: {e}",
                self.path.display()
            ))
        })
    }

    /// Record a newly installed version and stamp the build date.
    pub fn update_version(&self, record: &mut VersionRecord, version: VersionTag) -> Result<()> {
        tracing::info!("recording new version {} -> {version}", record.version);
        record.version = version;
        record.build_date = Utc::now();
        self.save(record)
    }

    /// Stamp `last_update_check` with `at` and persist.
    pub fn mark_checked(&self, record: &mut VersionRecord, at: DateTime<Utc>) -> Result<()> {
        record.last_update_check = Some(at);
        self.save(record)
    }
}

/// Accepts RFC 3339 as well as the naive local formats
/// (`2024-05-01T12:00:00.123456`, `2024-05-01 12:00:00`) older kiosk builds
/// wrote.
fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .and_then(|naive| Local.from_local_datetime(&naive).earliest())
        .map(|local| local.with_timezone(&Utc))
}

fn de_timestamp<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<DateTime<Utc>, D::Error> {
    let s = String::deserialize(d)?;
    parse_timestamp(&s)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp {s:?}")))
}

fn de_opt_timestamp<'de, D: Deserializer<'de>>(
    d: D,
) -> std::result::Result<Option<DateTime<Utc>>, D::Error> {
    match Option::<String>::deserialize(d)? {
        None => Ok(None),
        Some(s) => parse_timestamp(&s)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp {s:?}"))),
    }
}
