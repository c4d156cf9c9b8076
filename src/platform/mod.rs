//! Platform-specific update launchers.
//!
//! A [`PlatformUpdateLauncher`] renders the helper script that finishes an
//! update after this process exits, and builds the command that runs it
//! detached. Both variants are always compiled so their scripts can be
//! inspected on any host; [`launcher`] picks the one for the running OS.

use crate::config::ExitWaitConfig;
use std::path::Path;
use std::process::Command;

mod posix;
mod windows;

pub use posix::PosixLauncher;
pub use windows::WindowsLauncher;

/// Literal values embedded into a launcher script.
#[derive(Debug, Clone)]
pub struct ScriptParams<'a> {
    /// Downloaded installer/executable to run.
    pub artifact: &'a Path,
    /// Scratch directory to delete once the installer returns.
    pub scratch_dir: &'a Path,
    /// Directory containing the application executable.
    pub install_dir: &'a Path,
    /// Executable file name inside `install_dir`.
    pub exe_name: &'a str,
    /// Pid of the process being replaced.
    pub parent_pid: u32,
    pub exit_wait: &'a ExitWaitConfig,
}

/// Generates and launches the post-exit update script for one OS family.
pub trait PlatformUpdateLauncher: Send + Sync {
    /// File extension for the script, without the dot.
    fn script_extension(&self) -> &'static str;

    /// Render the script text.
    ///
    /// The script waits for `parent_pid` to exit (bounded), runs the artifact
    /// and blocks on it, removes the scratch directory, relaunches the
    /// application, and deletes itself last.
    fn build_launcher_script(&self, params: &ScriptParams<'_>) -> String;

    /// Command that runs `script` with no lifetime coupling to this process.
    fn command(&self, script: &Path) -> Command;
}

/// Create the launcher for the running platform.
pub fn launcher() -> Box<dyn PlatformUpdateLauncher> {
    if cfg!(target_os = "windows") {
        Box::new(WindowsLauncher)
    } else {
        Box::new(PosixLauncher)
    }
}
