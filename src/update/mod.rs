//! Self-update system for the kiosk.
//!
//! Fetches a JSON manifest, decides whether the running version should move
//! to the advertised one, downloads and verifies the installer, and hands it
//! to a detached platform script that waits for this process to exit before
//! installing and relaunching. The publishing side writes that manifest.

pub mod applier;
pub mod downloader;
mod http;
pub mod integrity;
pub mod manifest;
pub mod planner;
pub mod publish;
pub mod scratch;
pub mod state;
pub mod updater;
pub mod version;

pub use applier::{ApplyOutcome, RuntimeContext, UpdateApplier};
pub use downloader::{DownloadedArtifact, Downloader};
pub use manifest::{ManifestClient, UpdateManifest};
pub use planner::{UpdateDecision, plan};
pub use publish::{PublishRequest, publish};
pub use state::{UpdateInfo, VersionRecord, VersionStore};
pub use updater::Updater;
pub use version::{VersionTag, compare};
