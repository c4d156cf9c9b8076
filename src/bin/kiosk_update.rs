//! Command-line front end for the kiosk updater.
//!
//! Diagnostics go to stderr and to a daily log file; command results go to
//! stdout.

use anyhow::Context;
use chrono::{Local, Utc};
use clap::{Parser, Subcommand};
use kiosk_updater::update::{PublishRequest, UpdateDecision, Updater, integrity, publish};
use kiosk_updater::{UpdateError, UpdaterConfig, VersionTag, kiosk_dirs};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

/// Check for, download, and apply kiosk updates.
#[derive(Parser)]
#[command(name = "kiosk-update", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the installed version and update status.
    Version,

    /// Fetch the manifest and report whether an update applies.
    Check {
        /// Skip the fetch if the last successful check is newer than this.
        #[arg(long)]
        max_age_hours: Option<u64>,
    },

    /// Download, verify, and install an artifact, then exit.
    Apply {
        #[arg(long)]
        url: String,
        /// Expected digest, `sha256:<hex>`.
        #[arg(long)]
        signature: Option<String>,
        /// Pid of the running kiosk app the update script waits for.
        #[arg(long)]
        wait_pid: Option<u32>,
    },

    /// Check, and apply the update if one is available.
    Update {
        /// Pid of the running kiosk app the update script waits for.
        #[arg(long)]
        wait_pid: Option<u32>,
    },

    /// Record the installed version.
    SetVersion { version: VersionTag },

    /// Print the `sha256:` signature of a file.
    Hash { file: PathBuf },

    /// Write `update_manifest.json` for a new release.
    Publish {
        version: VersionTag,
        installer: PathBuf,
        /// Download URL; `{version}` is replaced with the release version.
        #[arg(long)]
        download_url: String,
        #[arg(long)]
        min_version: Option<VersionTag>,
        #[arg(long)]
        mandatory: bool,
        #[arg(long)]
        message: Option<String>,
        /// Changelog entry (repeatable).
        #[arg(long = "changelog")]
        changelog: Vec<String>,
        #[arg(long, default_value = "update_manifest.json")]
        manifest: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_tracing();

    match cli.command {
        Command::Version => show_version(load_config(cli.config)?),
        Command::Check { max_age_hours } => check(load_config(cli.config)?, max_age_hours),
        Command::Apply {
            url,
            signature,
            wait_pid,
        } => {
            let mut updater = app_updater(load_config(cli.config)?, wait_pid)?;
            launch(&mut updater, &url, signature.as_deref())
        }
        Command::Update { wait_pid } => update(app_updater(load_config(cli.config)?, wait_pid)?),
        Command::SetVersion { version } => {
            let mut updater = Updater::new(load_config(cli.config)?)?;
            updater.set_version(version)?;
            println!("version set to {}", updater.current_version());
            updater.cleanup()?;
            Ok(())
        }
        Command::Hash { file } => {
            let digest = integrity::sha256_file(&file)?;
            println!("{}  {}", integrity::signature_for(&digest), file.display());
            Ok(())
        }
        Command::Publish {
            version,
            installer,
            download_url,
            min_version,
            mandatory,
            message,
            changelog,
            manifest,
        } => {
            let request = PublishRequest {
                version,
                installer,
                download_url_template: download_url,
                min_compatible_version: min_version,
                mandatory,
                message,
                changelog,
                release_date: Local::now().date_naive(),
            };
            let published = publish(&manifest, &request)?;
            println!("{}", serde_json::to_string_pretty(&published)?);
            Ok(())
        }
    }
}

/// Stderr plus a daily-rolling file under the logs dir. The returned guard
/// flushes the file writer on drop.
fn init_tracing() -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("kiosk_updater=info,kiosk_update=info"));

    let (file_layer, guard) = match RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("kiosk-update")
        .filename_suffix("log")
        .build(kiosk_dirs::logs_dir())
    {
        Ok(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        Err(e) => {
            eprintln!("file logging disabled: {e}");
            (None, None)
        }
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();
    guard
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<UpdaterConfig> {
    let path = match path {
        Some(p) => p,
        None => {
            let default = UpdaterConfig::default_config_path();
            if !default.exists() {
                return Ok(UpdaterConfig::default());
            }
            default
        }
    };
    UpdaterConfig::from_file(&path)
        .with_context(|| format!("cannot load config {}", path.display()))
}

/// Updater that replaces and relaunches the configured kiosk app rather
/// than this binary.
fn app_updater(config: UpdaterConfig, wait_pid: Option<u32>) -> anyhow::Result<Updater> {
    if config.app_executable.is_none() {
        return Err(UpdateError::Precondition(
            "app_executable must be set in the config to apply updates".to_owned(),
        )
        .into());
    }
    let pid = wait_pid.unwrap_or_else(std::process::id);
    Ok(Updater::waiting_on(config, pid)?)
}

fn show_version(config: UpdaterConfig) -> anyhow::Result<()> {
    let mut updater = Updater::new(config)?;
    println!("{}", serde_json::to_string_pretty(&updater.update_info())?);
    updater.cleanup()?;
    Ok(())
}

fn check(config: UpdaterConfig, max_age_hours: Option<u64>) -> anyhow::Result<()> {
    let mut updater = Updater::new(config)?;
    if let Some(hours) = max_age_hours {
        if !updater.record().check_is_stale(hours, Utc::now()) {
            tracing::info!(hours, "last check is recent, skipping");
            println!("{}", serde_json::to_string_pretty(&updater.update_info())?);
            updater.cleanup()?;
            return Ok(());
        }
    }

    let decision = updater.check_for_updates();
    println!("{}", serde_json::to_string_pretty(&decision)?);
    updater.cleanup()?;
    Ok(())
}

fn update(mut updater: Updater) -> anyhow::Result<()> {
    match updater.check_for_updates() {
        UpdateDecision::UpdateAvailable {
            target,
            download_url,
            signature,
            message,
            changelog,
            ..
        } => {
            println!("{message} ({} -> {target})", updater.current_version());
            for line in &changelog {
                println!("  - {line}");
            }
            launch(&mut updater, &download_url, signature.as_deref())
        }
        UpdateDecision::NoUpdate => {
            println!("{} is up to date", updater.current_version());
            updater.cleanup()?;
            Ok(())
        }
        UpdateDecision::Incompatible { reason } => {
            updater.cleanup()?;
            Err(UpdateError::IncompatibleVersion(reason).into())
        }
        UpdateDecision::CheckFailed { reason } => {
            updater.cleanup()?;
            anyhow::bail!("update check failed: {reason}")
        }
    }
}

fn launch(updater: &mut Updater, url: &str, signature: Option<&str>) -> anyhow::Result<()> {
    match updater.download_and_apply(url, signature) {
        Ok(outcome) => {
            println!(
                "update script {} running as pid {}; exiting",
                outcome.script_path.display(),
                outcome.pid
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, kind = ?e.kind(), "update not applied");
            updater.cleanup()?;
            Err(e.into())
        }
    }
}
