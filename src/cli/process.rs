use std::{env, path::Path, process::Stdio};

use anyhow::{anyhow, Result};
use sysinfo::{get_current_pid, Signal, System};
use tracing::info;

use super::daemon_path::to_daemon_path;

/// Terminates every process running the executable at `name`, except this one and its children.
pub fn kill_previous_servers(name: &Path) -> Result<()> {
    let system = System::new_all();
    let current_id = get_current_pid().map_err(|e| anyhow!("Can't determine own pid: {e}"))?;
    for (pid, process) in system.processes().iter() {
        if *pid == current_id {
            continue;
        }
        if matches!(process.parent(), Some(p) if p == current_id) {
            continue;
        }

        if process
            .exe()
            .filter(|v| v.exists())
            .filter(|v| name == *v)
            .is_some()
        {
            info!("Stopping daemon {pid}");
            if process.kill_with(Signal::Term).is_none() {
                process.kill();
            }
            process.wait();
        }
    }
    Ok(())
}

/// Shuts down a running daemon and spawns a new one for `dir`. The daemon binary is expected to
/// lie next to the cli executable.
pub fn restart_server(dir: &Path) -> Result<()> {
    let daemon_path = to_daemon_path(env::current_exe()?);
    kill_previous_servers(&daemon_path)?;

    let mut command = std::process::Command::new(&daemon_path);
    command.arg("--dir").arg(dir);

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
        command.stdin(Stdio::null());
        command.stdout(Stdio::null());
    }

    println!("Spawning {daemon_path:?}");
    let mut child = command.spawn()?;
    // The daemon forks itself into the background, the spawned parent exits right after.
    let status = child.wait()?;
    if !status.success() {
        return Err(anyhow!("Daemon failed to start: {status}"));
    }
    println!("Success");
    Ok(())
}
