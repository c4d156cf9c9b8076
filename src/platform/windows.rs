//! Windows batch launcher.

use super::{PlatformUpdateLauncher, ScriptParams};
use std::path::Path;
use std::process::{Command, Stdio};

pub struct WindowsLauncher;

impl PlatformUpdateLauncher for WindowsLauncher {
    fn script_extension(&self) -> &'static str {
        "bat"
    }

    fn build_launcher_script(&self, p: &ScriptParams<'_>) -> String {
        let artifact = escape(&p.artifact.display().to_string());
        let scratch = escape(&p.scratch_dir.display().to_string());
        let app = escape(&p.install_dir.join(p.exe_name).display().to_string());
        let pid = p.parent_pid;
        let max_wait = p.exit_wait.max_wait_secs;
        // `timeout` refuses to run with redirected stdin; ping waits ~1s per echo.
        let grace_pings = p.exit_wait.grace_secs + 1;

        let lines = [
            "@echo off".to_owned(),
            "echo Waiting for the application to exit...".to_owned(),
            format!("ping -n {grace_pings} 127.0.0.1 > nul"),
            "set waited=0".to_owned(),
            ":wait_for_exit".to_owned(),
            format!("tasklist /FI \"PID eq {pid}\" /NH 2>nul | find \" {pid} \" > nul"),
            "if errorlevel 1 goto apply_update".to_owned(),
            format!("if %waited% geq {max_wait} goto apply_update"),
            "ping -n 2 127.0.0.1 > nul".to_owned(),
            "set /a waited+=1".to_owned(),
            "goto wait_for_exit".to_owned(),
            String::new(),
            ":apply_update".to_owned(),
            "echo Applying update...".to_owned(),
            format!("start \"\" /wait \"{artifact}\""),
            String::new(),
            "echo Removing temporary files...".to_owned(),
            format!("rd /s /q \"{scratch}\""),
            String::new(),
            "echo Update complete, restarting...".to_owned(),
            format!("start \"\" \"{app}\""),
            String::new(),
            "(goto) 2>nul & del \"%~f0\"".to_owned(),
        ];

        let mut script = lines.join("\r\n");
        script.push_str("\r\n");
        script
    }

    fn command(&self, script: &Path) -> Command {
        let mut cmd = Command::new("cmd");
        cmd.arg("/C")
            .arg(script)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            const DETACHED_PROCESS: u32 = 0x0000_0008;
            const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
            cmd.creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP);
        }
        cmd
    }
}

/// `%` starts variable expansion in batch files, even inside quotes.
fn escape(s: &str) -> String {
    s.replace('%', "%%")
}
