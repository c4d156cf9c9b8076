//! The update pipeline as a single caller-owned context object.

use super::applier::{self, ApplyOutcome, RuntimeContext, UpdateApplier};
use super::downloader::{DownloadedArtifact, Downloader};
use super::integrity;
use super::manifest::ManifestClient;
use super::planner::{self, UpdateDecision};
use super::scratch::ScratchDir;
use super::state::{UpdateInfo, VersionRecord, VersionStore};
use super::version::VersionTag;
use crate::config::UpdaterConfig;
use crate::error::{Result, UpdateError};
use chrono::Utc;
use std::path::Path;

/// Checks for, downloads, and applies updates for one installation.
///
/// Each instance owns its own scratch directory, removed on
/// [`cleanup`](Self::cleanup) or drop unless an update script took it over.
/// Running two instances against the same install at the same time is not
/// supported; nothing guards against it.
pub struct Updater {
    config: UpdaterConfig,
    store: VersionStore,
    record: VersionRecord,
    manifests: ManifestClient,
    downloader: Downloader,
    applier: UpdateApplier,
    scratch: ScratchDir,
}

impl Updater {
    /// Build an updater for `config.app_executable`, or for the running
    /// executable when that is unset. The update script waits for this
    /// process to exit.
    ///
    /// # Errors
    ///
    /// Fails if the executable path cannot be determined, the version record
    /// cannot be created, or the scratch directory cannot be made.
    pub fn new(config: UpdaterConfig) -> Result<Self> {
        Self::waiting_on(config, std::process::id())
    }

    /// Like [`new`](Self::new), but the update script waits for `pid`
    /// instead. Used when a separate process drives the update of a running
    /// application.
    pub fn waiting_on(config: UpdaterConfig, pid: u32) -> Result<Self> {
        let runtime = match &config.app_executable {
            Some(exe) => RuntimeContext::for_executable(exe, config.packaged, pid)?,
            None => RuntimeContext::for_executable(
                &applier::current_exe_path()?,
                config.packaged,
                pid,
            )?,
        };
        let applier = UpdateApplier::new(runtime, config.exit_wait.clone());
        Self::with_applier(config, applier)
    }

    pub fn runtime(&self) -> &RuntimeContext {
        self.applier.runtime()
    }

    /// Build an updater around a caller-supplied applier.
    pub fn with_applier(config: UpdaterConfig, applier: UpdateApplier) -> Result<Self> {
        let store = VersionStore::new(&config.version_file);
        let record = store.load()?;
        let scratch = match &config.scratch_root {
            Some(root) => {
                std::fs::create_dir_all(root).map_err(|e| {
                    UpdateError::Filesystem(format!("cannot create {}: {e}", root.display()))
                })?;
                ScratchDir::create_in(root, &config.app_name)?
            }
            None => ScratchDir::create(&config.app_name)?,
        };

        tracing::info!(
            "{} {} updater ready (scratch {}, packaged: {})",
            config.app_name,
            record.version,
            scratch.path().display(),
            applier.runtime().packaged
        );

        Ok(Self {
            manifests: ManifestClient::new(config.manifest_timeout()),
            downloader: Downloader::new(config.download_timeout(), scratch.path()),
            config,
            store,
            record,
            applier,
            scratch,
        })
    }

    pub fn current_version(&self) -> String {
        self.record.version.to_string()
    }

    pub fn record(&self) -> &VersionRecord {
        &self.record
    }

    pub fn update_info(&self) -> UpdateInfo {
        self.record.update_info()
    }

    pub fn scratch_dir(&self) -> &Path {
        self.scratch.path()
    }

    /// Manifest URL from the config, else from the version record.
    pub fn manifest_url(&self) -> Option<&str> {
        self.config
            .manifest_url
            .as_deref()
            .or(self.record.update_url.as_deref())
    }

    /// Fetch the manifest and decide whether an update applies.
    ///
    /// Never fails: any error becomes [`UpdateDecision::CheckFailed`]. A
    /// successful fetch stamps `last_update_check` in the version record.
    pub fn check_for_updates(&mut self) -> UpdateDecision {
        let Some(url) = self.manifest_url().map(str::to_owned) else {
            return UpdateDecision::CheckFailed {
                reason: "no update URL configured".to_owned(),
            };
        };

        let manifest = match self.manifests.fetch(&url) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!("update check against {url} failed: {e}");
                return UpdateDecision::CheckFailed {
                    reason: e.to_string(),
                };
            }
        };

        if let Err(e) = self.store.mark_checked(&mut self.record, Utc::now()) {
            tracing::warn!("cannot persist last update check: {e}");
        }

        let decision = planner::plan(&self.record.version, &manifest);
        match &decision {
            UpdateDecision::UpdateAvailable {
                target, mandatory, ..
            } => tracing::info!(
                "update available: {} -> {target} (mandatory: {mandatory})",
                self.record.version
            ),
            UpdateDecision::Incompatible { reason } => {
                tracing::warn!("update incompatible: {reason}")
            }
            _ => tracing::info!("no update available for {}", self.record.version),
        }
        decision
    }

    /// Download `url` into the scratch directory without applying it.
    pub fn download(&self, url: &str) -> Result<DownloadedArtifact> {
        self.downloader.download(url)
    }

    /// Download, verify, and hand the artifact to the update script.
    ///
    /// `signature` is the manifest's `sha256:<hex>` digest. On success the
    /// scratch directory belongs to the script and the caller should exit.
    ///
    /// # Errors
    ///
    /// - [`UpdateError::Precondition`] outside a packaged install (checked
    ///   before anything is downloaded).
    /// - [`UpdateError::Integrity`] when no signature is given and
    ///   `require_signature` is set, or when the digest does not match.
    /// - Network, filesystem, and launch errors from the individual stages.
    pub fn download_and_apply(&mut self, url: &str, signature: Option<&str>) -> Result<ApplyOutcome> {
        if !self.applier.runtime().packaged {
            return Err(UpdateError::Precondition(
                "automatic updates only work from an installed executable".to_owned(),
            ));
        }
        if signature.is_none() && self.config.require_signature {
            return Err(UpdateError::Integrity(
                "manifest has no signature and unsigned updates are not allowed".to_owned(),
            ));
        }

        let artifact = self.downloader.download(url)?;
        match signature {
            Some(sig) => integrity::verify(&artifact.path, sig)?,
            None => tracing::warn!(
                "applying unsigned update artifact {}",
                artifact.path.display()
            ),
        }

        let outcome = self.applier.apply(&artifact.path, self.scratch.path())?;
        let handed_over = self.scratch.release();
        tracing::info!("scratch dir {} handed to update script", handed_over.display());
        Ok(outcome)
    }

    /// Record `version` as installed (e.g. after a manual reinstall).
    pub fn set_version(&mut self, version: VersionTag) -> Result<()> {
        self.store.update_version(&mut self.record, version)
    }

    /// Remove the scratch directory and everything downloaded into it.
    pub fn cleanup(&mut self) -> Result<()> {
        self.scratch.cleanup()
    }
}
