//! POSIX shell launcher (Linux, macOS, BSD).

use super::{PlatformUpdateLauncher, ScriptParams};
use std::path::Path;
use std::process::{Command, Stdio};

pub struct PosixLauncher;

impl PlatformUpdateLauncher for PosixLauncher {
    fn script_extension(&self) -> &'static str {
        "sh"
    }

    fn build_launcher_script(&self, p: &ScriptParams<'_>) -> String {
        let artifact = quote(&p.artifact.display().to_string());
        let scratch = quote(&p.scratch_dir.display().to_string());
        let app = quote(&p.install_dir.join(p.exe_name).display().to_string());
        let pid = p.parent_pid;
        let grace = p.exit_wait.grace_secs;
        let max_wait = p.exit_wait.max_wait_secs;

        format!(
            r#"#!/bin/sh
echo "Waiting for the application to exit..."
sleep {grace}
waited=0
while kill -0 {pid} 2>/dev/null; do
    if [ "$waited" -ge {max_wait} ]; then
        echo "Process {pid} still running after {max_wait}s, continuing"
        break
    fi
    sleep 1
    waited=$((waited + 1))
done

echo "Applying update..."
chmod +x {artifact}
{artifact}

echo "Removing temporary files..."
rm -rf {scratch}

echo "Update complete, restarting..."
nohup {app} >/dev/null 2>&1 &

rm -f "$0"
"#
        )
    }

    fn command(&self, script: &Path) -> Command {
        let mut cmd = Command::new("/bin/sh");
        cmd.arg(script)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        // Own process group, so terminal signals aimed at us don't reach it.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }
        cmd
    }
}

/// Single-quote `s` for `/bin/sh`.
fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}
