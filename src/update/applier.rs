//! Platform-specific update application.
//!
//! The running executable cannot overwrite itself, so applying an update is a
//! handoff: a helper script is written next to the scratch directory and
//! launched detached. The script waits for this process to exit, runs the
//! downloaded installer, removes the scratch directory, relaunches the app,
//! and deletes itself. Once [`UpdateApplier::apply`] returns the caller should
//! exit promptly.

use crate::config::ExitWaitConfig;
use crate::error::{Result, UpdateError};
use crate::platform::{self, PlatformUpdateLauncher, ScriptParams};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Where and how the current process is running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeContext {
    /// Directory containing the application executable.
    pub install_dir: PathBuf,
    /// File name of the application executable.
    pub exe_name: String,
    /// Whether this is an installed build that can be replaced in place.
    pub packaged: bool,
    /// Pid the update script waits on.
    pub pid: u32,
}

impl RuntimeContext {
    /// Inspect the current executable.
    ///
    /// A binary inside a cargo `target/{debug,release}` tree is treated as
    /// a development run and not packaged, unless `packaged_override` says
    /// otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the executable path cannot be determined.
    pub fn detect(packaged_override: Option<bool>) -> Result<Self> {
        Self::for_executable(&current_exe_path()?, packaged_override, std::process::id())
    }

    /// Context for the application at `exe`, whose process `pid` the update
    /// script waits on. Used when the updater runs as a separate binary
    /// from the application it replaces.
    ///
    /// # Errors
    ///
    /// Returns an error if `exe` has no parent directory or file name.
    pub fn for_executable(exe: &Path, packaged_override: Option<bool>, pid: u32) -> Result<Self> {
        let install_dir = exe
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| UpdateError::Precondition(format!("{} has no parent", exe.display())))?;
        let exe_name = exe
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                UpdateError::Precondition(format!("{} has no file name", exe.display()))
            })?;
        let packaged = packaged_override.unwrap_or_else(|| !is_cargo_build_path(exe));

        Ok(Self {
            install_dir,
            exe_name,
            packaged,
            pid,
        })
    }
}

/// Returns the path to the currently running executable.
///
/// # Errors
///
/// Returns an error if the path cannot be determined.
pub fn current_exe_path() -> Result<PathBuf> {
    std::env::current_exe().map_err(|e| {
        UpdateError::Precondition(format!("cannot determine current executable path: {e}"))
    })
}

fn is_cargo_build_path(exe: &Path) -> bool {
    let parts: Vec<_> = exe.components().map(|c| c.as_os_str()).collect();
    parts.iter().enumerate().any(|(i, part)| {
        *part == "target"
            && parts[i + 1..]
                .iter()
                .take(2)
                .any(|p| *p == "debug" || *p == "release")
    })
}

/// Starts a command with no lifetime coupling to this process.
pub trait ProcessSpawner: Send + Sync {
    /// Spawn `cmd` and return its pid without waiting on it.
    fn spawn_detached(&self, cmd: Command) -> std::io::Result<u32>;
}

/// Spawns real OS processes.
pub struct SystemSpawner;

impl ProcessSpawner for SystemSpawner {
    fn spawn_detached(&self, mut cmd: Command) -> std::io::Result<u32> {
        // Dropping the Child neither waits for nor kills the process.
        cmd.spawn().map(|child| child.id())
    }
}

/// Progress of a single apply attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplierState {
    Idle,
    ScriptGenerated { script: PathBuf },
    Launched { script: PathBuf, pid: u32 },
}

/// A launched update handoff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyOutcome {
    /// Helper script that finishes the update. It deletes itself.
    pub script_path: PathBuf,
    /// Pid of the detached script process.
    pub pid: u32,
}

/// Generates and launches the post-exit update script.
pub struct UpdateApplier {
    runtime: RuntimeContext,
    launcher: Box<dyn PlatformUpdateLauncher>,
    spawner: Box<dyn ProcessSpawner>,
    exit_wait: ExitWaitConfig,
    state: ApplierState,
}

impl UpdateApplier {
    /// Applier for the running platform that spawns real processes.
    pub fn new(runtime: RuntimeContext, exit_wait: ExitWaitConfig) -> Self {
        Self::with_parts(runtime, platform::launcher(), Box::new(SystemSpawner), exit_wait)
    }

    pub fn with_parts(
        runtime: RuntimeContext,
        launcher: Box<dyn PlatformUpdateLauncher>,
        spawner: Box<dyn ProcessSpawner>,
        exit_wait: ExitWaitConfig,
    ) -> Self {
        Self {
            runtime,
            launcher,
            spawner,
            exit_wait,
            state: ApplierState::Idle,
        }
    }

    pub fn state(&self) -> &ApplierState {
        &self.state
    }

    pub fn runtime(&self) -> &RuntimeContext {
        &self.runtime
    }

    /// Write the helper script for `artifact` and launch it detached.
    ///
    /// `scratch_dir` is embedded in the script, which removes it after the
    /// installer returns. Returns as soon as the script is running.
    ///
    /// # Errors
    ///
    /// - [`UpdateError::Precondition`] when not running from a packaged
    ///   install, or when an update was already launched. Nothing is written
    ///   or spawned in this case.
    /// - [`UpdateError::Filesystem`] when the artifact is missing or the
    ///   script cannot be written.
    /// - [`UpdateError::Launch`] when the script process cannot be spawned.
    pub fn apply(&mut self, artifact: &Path, scratch_dir: &Path) -> Result<ApplyOutcome> {
        if !self.runtime.packaged {
            return Err(UpdateError::Precondition(
                "automatic updates only work from an installed executable".to_owned(),
            ));
        }
        if self.state != ApplierState::Idle {
            return Err(UpdateError::Precondition(
                "an update has already been launched".to_owned(),
            ));
        }
        if !artifact.is_file() {
            return Err(UpdateError::Filesystem(format!(
                "update artifact not found: {}",
                artifact.display()
            )));
        }

        let script = self.launcher.build_launcher_script(&ScriptParams {
            artifact,
            scratch_dir,
            install_dir: &self.runtime.install_dir,
            exe_name: &self.runtime.exe_name,
            parent_pid: self.runtime.pid,
            exit_wait: &self.exit_wait,
        });
        let script_path = script_path_for(scratch_dir, self.launcher.script_extension())?;

        std::fs::write(&script_path, script).map_err(|e| {
            UpdateError::Filesystem(format!(
                "cannot write update script to {}: {e}",
                script_path.display()
            ))
        })?;
        if let Err(e) = set_executable(&script_path) {
            let _ = std::fs::remove_file(&script_path);
            return Err(e);
        }
        tracing::info!("update script written to {}", script_path.display());
        self.state = ApplierState::ScriptGenerated {
            script: script_path.clone(),
        };

        let cmd = self.launcher.command(&script_path);
        let pid = match self.spawner.spawn_detached(cmd) {
            Ok(pid) => pid,
            Err(e) => {
                // Nothing was launched; a later attempt may start over.
                let _ = std::fs::remove_file(&script_path);
                self.state = ApplierState::Idle;
                return Err(UpdateError::Launch(format!(
                    "cannot launch update script {}: {e}",
                    script_path.display()
                )));
            }
        };

        tracing::info!(pid, "update script {} launched", script_path.display());
        self.state = ApplierState::Launched {
            script: script_path.clone(),
            pid,
        };
        Ok(ApplyOutcome { script_path, pid })
    }
}

/// `<parent>/<scratch name>.<ext>`: beside the scratch dir, not inside it,
/// so removing the directory cannot pull the script out from under itself.
fn script_path_for(scratch_dir: &Path, extension: &str) -> Result<PathBuf> {
    let (Some(parent), Some(name)) = (scratch_dir.parent(), scratch_dir.file_name()) else {
        return Err(UpdateError::Filesystem(format!(
            "invalid scratch dir {}",
            scratch_dir.display()
        )));
    };
    let mut file_name = OsString::from(name);
    file_name.push(".");
    file_name.push(extension);
    Ok(parent.join(file_name))
}

/// Set executable permission on Unix platforms.
fn set_executable(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).map_err(|e| {
            UpdateError::Filesystem(format!(
                "cannot set executable permission on {}: {e}",
                path.display()
            ))
        })?;
    }
    let _ = path; // Suppress unused warning on Windows.
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct RecordingSpawner {
        launched: Arc<Mutex<Vec<Vec<String>>>>,
        fail: bool,
        /// Fails the next spawn only.
        fail_first: Arc<AtomicBool>,
    }

    impl ProcessSpawner for RecordingSpawner {
        fn spawn_detached(&self, cmd: Command) -> std::io::Result<u32> {
            if self.fail || self.fail_first.swap(false, Ordering::SeqCst) {
                return Err(std::io::Error::other("spawn refused"));
            }
            let mut argv = vec![cmd.get_program().to_string_lossy().into_owned()];
            argv.extend(cmd.get_args().map(|a| a.to_string_lossy().into_owned()));
            self.launched.lock().unwrap().push(argv);
            Ok(4242)
        }
    }

    fn runtime(packaged: bool) -> RuntimeContext {
        RuntimeContext {
            install_dir: PathBuf::from("/opt/kiosk"),
            exe_name: "kiosk".to_owned(),
            packaged,
            pid: 1000,
        }
    }

    fn applier(packaged: bool, spawner: RecordingSpawner) -> UpdateApplier {
        UpdateApplier::with_parts(
            runtime(packaged),
            Box::new(platform::PosixLauncher),
            Box::new(spawner),
            ExitWaitConfig::default(),
        )
    }

    fn scratch_with_artifact(root: &Path) -> (PathBuf, PathBuf) {
        let scratch = root.join("kiosk-update-test");
        std::fs::create_dir_all(&scratch).unwrap();
        let artifact = scratch.join("kiosk_1.1.0.run");
        std::fs::write(&artifact, b"installer").unwrap();
        (scratch, artifact)
    }

    fn entries(dir: &Path) -> Vec<PathBuf> {
        let mut all: Vec<_> = std::fs::read_dir(dir).unwrap().map(|e| e.unwrap().path()).collect();
        all.sort();
        all
    }

    #[test]
    fn unpackaged_apply_is_precondition_error_without_side_effects() {
        let root = tempfile::tempdir().unwrap();
        let (scratch, artifact) = scratch_with_artifact(root.path());
        let before_root = entries(root.path());
        let before_scratch = entries(&scratch);

        let spawner = RecordingSpawner::default();
        let mut applier = applier(false, spawner.clone());
        let err = applier.apply(&artifact, &scratch).unwrap_err();

        assert!(matches!(err, UpdateError::Precondition(_)));
        assert_eq!(applier.state(), &ApplierState::Idle);
        assert_eq!(entries(root.path()), before_root);
        assert_eq!(entries(&scratch), before_scratch);
        assert!(spawner.launched.lock().unwrap().is_empty());
    }

    #[test]
    fn packaged_apply_writes_script_beside_scratch_and_launches() {
        let root = tempfile::tempdir().unwrap();
        let (scratch, artifact) = scratch_with_artifact(root.path());

        let spawner = RecordingSpawner::default();
        let mut applier = applier(true, spawner.clone());
        let outcome = applier.apply(&artifact, &scratch).unwrap();

        assert_eq!(outcome.pid, 4242);
        assert_eq!(outcome.script_path, root.path().join("kiosk-update-test.sh"));
        let script = std::fs::read_to_string(&outcome.script_path).unwrap();
        assert!(script.contains(&artifact.display().to_string()));
        assert!(script.contains("kill -0 1000"));
        assert!(script.contains("/opt/kiosk/kiosk"));

        let launched = spawner.launched.lock().unwrap();
        assert_eq!(launched.len(), 1);
        assert_eq!(
            launched[0],
            vec!["/bin/sh".to_owned(), outcome.script_path.display().to_string()]
        );
        assert_eq!(
            applier.state(),
            &ApplierState::Launched {
                script: outcome.script_path.clone(),
                pid: 4242
            }
        );
    }

    #[cfg(unix)]
    #[test]
    fn script_is_executable() {
        use std::os::unix::fs::PermissionsExt;

        let root = tempfile::tempdir().unwrap();
        let (scratch, artifact) = scratch_with_artifact(root.path());
        let mut applier = applier(true, RecordingSpawner::default());
        let outcome = applier.apply(&artifact, &scratch).unwrap();
        let mode = std::fs::metadata(&outcome.script_path).unwrap().permissions().mode();
        assert_eq!(mode & 0o111, 0o111);
    }

    #[test]
    fn second_apply_is_rejected() {
        let root = tempfile::tempdir().unwrap();
        let (scratch, artifact) = scratch_with_artifact(root.path());
        let mut applier = applier(true, RecordingSpawner::default());
        applier.apply(&artifact, &scratch).unwrap();
        let err = applier.apply(&artifact, &scratch).unwrap_err();
        assert!(matches!(err, UpdateError::Precondition(_)));
    }

    #[test]
    fn missing_artifact_is_filesystem_error() {
        let root = tempfile::tempdir().unwrap();
        let scratch = root.path().join("kiosk-update-test");
        std::fs::create_dir_all(&scratch).unwrap();
        let mut applier = applier(true, RecordingSpawner::default());
        let err = applier.apply(&scratch.join("missing.run"), &scratch).unwrap_err();
        assert!(matches!(err, UpdateError::Filesystem(_)));
        assert_eq!(applier.state(), &ApplierState::Idle);
    }

    #[test]
    fn spawn_failure_is_launch_error_and_removes_script() {
        let root = tempfile::tempdir().unwrap();
        let (scratch, artifact) = scratch_with_artifact(root.path());
        let spawner = RecordingSpawner {
            fail: true,
            ..Default::default()
        };
        let mut applier = applier(true, spawner);
        let err = applier.apply(&artifact, &scratch).unwrap_err();
        assert!(matches!(err, UpdateError::Launch(_)));
        assert!(!root.path().join("kiosk-update-test.sh").exists());
        assert_eq!(applier.state(), &ApplierState::Idle);
    }

    #[test]
    fn apply_can_be_retried_after_spawn_failure() {
        let root = tempfile::tempdir().unwrap();
        let (scratch, artifact) = scratch_with_artifact(root.path());
        let spawner = RecordingSpawner {
            fail_first: Arc::new(AtomicBool::new(true)),
            ..Default::default()
        };
        let mut applier = applier(true, spawner.clone());

        let err = applier.apply(&artifact, &scratch).unwrap_err();
        assert!(matches!(err, UpdateError::Launch(_)));
        assert_eq!(applier.state(), &ApplierState::Idle);

        let outcome = applier.apply(&artifact, &scratch).unwrap();
        assert!(outcome.script_path.is_file());
        assert_eq!(spawner.launched.lock().unwrap().len(), 1);
        assert!(matches!(applier.state(), ApplierState::Launched { .. }));
    }

    #[test]
    fn cargo_build_paths_are_not_packaged() {
        assert!(is_cargo_build_path(Path::new("/home/dev/kiosk/target/debug/kiosk")));
        assert!(is_cargo_build_path(Path::new(
            "/home/dev/kiosk/target/x86_64-unknown-linux-gnu/release/kiosk"
        )));
        assert!(!is_cargo_build_path(Path::new("/opt/kiosk/kiosk")));
        assert!(!is_cargo_build_path(Path::new("/srv/target/kiosk")));
    }

    #[test]
    fn for_executable_takes_target_and_pid_from_arguments() {
        let ctx =
            RuntimeContext::for_executable(Path::new("/opt/kiosk/kiosk-app"), None, 777).unwrap();
        assert_eq!(ctx.install_dir, PathBuf::from("/opt/kiosk"));
        assert_eq!(ctx.exe_name, "kiosk-app");
        assert_eq!(ctx.pid, 777);
        assert!(ctx.packaged);
    }

    #[test]
    fn script_relaunches_configured_app() {
        let root = tempfile::tempdir().unwrap();
        let (scratch, artifact) = scratch_with_artifact(root.path());
        let runtime =
            RuntimeContext::for_executable(Path::new("/opt/kiosk/kiosk-app"), Some(true), 777)
                .unwrap();
        let mut applier = UpdateApplier::with_parts(
            runtime,
            Box::new(platform::PosixLauncher),
            Box::new(RecordingSpawner::default()),
            ExitWaitConfig::default(),
        );
        let outcome = applier.apply(&artifact, &scratch).unwrap();
        let script = std::fs::read_to_string(&outcome.script_path).unwrap();
        assert!(script.contains("nohup '/opt/kiosk/kiosk-app'"));
        assert!(script.contains("kill -0 777"));
    }

    #[test]
    fn detect_honours_override() {
        let ctx = RuntimeContext::detect(Some(false)).unwrap();
        assert!(!ctx.packaged);
        assert_eq!(ctx.pid, std::process::id());
        assert!(ctx.install_dir.join(&ctx.exe_name).exists());
    }
}
