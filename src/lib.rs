//! Kiosk updater: self-update subsystem for the photo kiosk application.
//!
//! # Architecture
//!
//! One update pass runs through independent stages owned by [`Updater`]:
//! - **Version compare**: [`update::version`] orders dotted numeric versions
//! - **Manifest**: [`update::manifest`] fetches and parses `update_manifest.json`
//! - **Planning**: [`update::planner`] turns current version + manifest into a decision
//! - **Download**: [`update::downloader`] streams the installer into a scratch dir
//! - **Integrity**: [`update::integrity`] checks the manifest's SHA-256 signature
//! - **Apply**: [`update::applier`] writes and launches a detached script via [`platform`]
//! - **State**: [`update::state`] persists the installed version and last check

pub mod config;
pub mod error;
pub mod kiosk_dirs;
pub mod platform;
pub mod update;

pub use config::UpdaterConfig;
pub use error::{ErrorKind, Result, UpdateError};
pub use update::{UpdateDecision, Updater, VersionTag};
