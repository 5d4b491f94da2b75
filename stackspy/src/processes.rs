use std::path::PathBuf;
use std::process::{Child, Command};

use anyhow::{bail, Context, Result};
use nix::sys::signal::{kill, Signal};
use nix::unistd;
use procfs::process::Process;
use stackspy_common::Pid;
use tracing::{info, warn};

/// Whether `pid` names a live, non-zombie process.
pub fn is_running(pid: Pid) -> bool {
    Process::new(pid.as_raw())
        .and_then(|p| p.stat())
        .map(|stat| stat.state != 'Z' && stat.state != 'X')
        .unwrap_or(false)
}

/// The target's command name, for logs
pub fn describe(pid: Pid) -> Option<String> {
    Process::new(pid.as_raw()).and_then(|p| p.stat()).map(|stat| stat.comm).ok()
}

/// Launch `command` (shell-style quoting) as a child to be sampled.
pub fn launch(command: &str) -> Result<Child> {
    info!("Launching child process: `{}`", command);
    let Some(mut cmd_split) = shlex::split(command).map(Vec::into_iter) else {
        bail!("unable to parse command `{command}`");
    };
    let Some(program) = cmd_split.next() else {
        bail!("empty command");
    };

    Command::new(PathBuf::from(program))
        .args(cmd_split)
        .spawn()
        .with_context(|| format!("failed to launch `{command}`"))
}

/// Ask a launched child to exit, then reap it.
pub fn terminate(mut child: Child) -> Result<()> {
    let pid = unistd::Pid::from_raw(child.id() as i32);
    if child.try_wait()?.is_none() {
        if let Err(e) = kill(pid, Signal::SIGTERM) {
            warn!(%pid, error = %e, "unable to signal child");
            child.kill()?;
        }
    }
    let status = child.wait()?;
    info!(%pid, %status, "child exited");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_self_is_running() {
        let me = Pid::try_from(std::process::id()).unwrap();
        assert!(is_running(me));
        assert!(describe(me).is_some());
        assert!(!is_running(Pid(999_999_999)));
        assert_eq!(describe(Pid(999_999_999)), None);
    }

    #[test]
    fn test_launch_and_terminate() {
        let child = launch("sleep 30").unwrap();
        let pid = Pid::try_from(child.id()).unwrap();
        assert!(is_running(pid));
        assert_eq!(describe(pid).as_deref(), Some("sleep"));
        terminate(child).unwrap();
        assert!(!is_running(pid));
    }

    #[test]
    fn test_launch_rejects_bad_commands() {
        assert!(launch("").is_err());
        assert!(launch("\"unterminated").is_err());
        assert!(launch("/definitely/not/a/binary").is_err());
    }
}
