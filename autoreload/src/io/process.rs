//! Helpers for spawning, polling and stopping child processes.

use std::process::{Child, Command, ExitStatus};
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

use crate::cancel::CancelToken;
use crate::exit_codes;

/// How often a cancellable wait re-checks its token.
pub const POLL_SLICE: Duration = Duration::from_millis(100);

/// Time a cancelled command gets between SIGTERM and SIGKILL.
pub const TERM_GRACE: Duration = Duration::from_secs(2);

/// Signal used to ask a child to exit on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopSignal {
    /// SIGINT, as if the user pressed Ctrl-C.
    Interrupt,
    /// SIGTERM.
    Terminate,
}

#[cfg(unix)]
impl StopSignal {
    fn raw(self) -> libc::c_int {
        match self {
            Self::Interrupt => libc::SIGINT,
            Self::Terminate => libc::SIGTERM,
        }
    }
}

/// Spawn `cmd`, logging the failure before returning it.
pub fn spawn(cmd: &mut Command) -> Result<Child> {
    let program = cmd.get_program().to_string_lossy().to_string();
    debug!(program, "spawning child process");
    match cmd.spawn() {
        Ok(child) => Ok(child),
        Err(e) => {
            error!(err = %e, program, "failed to spawn command");
            Err(e).with_context(|| format!("spawn {program}"))
        }
    }
}

/// Flatten an exit status into a single code.
///
/// A child killed by a signal reports `128 + signal`, the way shells do.
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return exit_codes::SIGNAL_BASE + signal;
        }
    }
    exit_codes::FAILURE
}

/// Start `cmd` as the leader of a new process group.
///
/// Everything the child spawns joins that group, so [`kill_group`] reaches
/// processes the child left behind when it exits or is killed.
pub fn isolate(cmd: &mut Command) {
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }
    #[cfg(not(unix))]
    let _ = cmd;
}

/// Send `signal` to `child` without waiting for it.
///
/// Returns `false` when the signal could not be delivered.
pub fn request_stop(child: &Child, signal: StopSignal) -> bool {
    #[cfg(unix)]
    {
        match send_signal(child.id(), signal.raw(), false) {
            Ok(()) => true,
            Err(e) => {
                debug!(pid = child.id(), ?signal, err = %e, "failed to signal child");
                false
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = (child, signal);
        false
    }
}

/// SIGKILL every process still in the group led by `leader`.
///
/// Returns `true` if anything was left to kill.
pub fn kill_group(leader: u32) -> bool {
    #[cfg(unix)]
    {
        match send_signal(leader, libc::SIGKILL, true) {
            Ok(()) => true,
            Err(e) if e.raw_os_error() == Some(libc::ESRCH) => false,
            Err(e) => {
                warn!(pgid = leader, err = %e, "failed to kill process group");
                false
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = leader;
        false
    }
}

#[cfg(unix)]
#[allow(unsafe_code)]
fn send_signal(pid: u32, signal: libc::c_int, group: bool) -> std::io::Result<()> {
    let pid = libc::pid_t::try_from(pid)
        .map_err(|_| std::io::Error::from(std::io::ErrorKind::InvalidInput))?;
    let target = if group { -pid } else { pid };
    // SAFETY: kill(2) takes no pointers; a stale target only yields ESRCH.
    if unsafe { libc::kill(target, signal) } == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

/// Ask `child` to exit with `signal`, give it up to `grace`, then kill it.
pub fn stop_child(child: &mut Child, signal: StopSignal, grace: Duration) -> Result<ExitStatus> {
    request_stop(child, signal);
    if let Some(status) = child.wait_timeout(grace).context("wait for child")? {
        return Ok(status);
    }
    warn!(pid = child.id(), ?signal, "child ignored stop request, killing");
    match child.kill() {
        Ok(()) => {}
        // Exited between the wait and the kill.
        Err(e) if e.kind() == std::io::ErrorKind::InvalidInput => {}
        Err(e) => return Err(e).context("kill child"),
    }
    child.wait().context("wait for child after kill")
}

/// Run `cmd` until it exits or `token` is cancelled, whichever comes first.
///
/// On cancellation the child gets SIGTERM and [`TERM_GRACE`] to exit before it
/// is killed. Returns the child's exit code either way.
#[instrument(skip_all, fields(program = %cmd.get_program().to_string_lossy()))]
pub fn run_until_cancelled(mut cmd: Command, token: &CancelToken) -> Result<i32> {
    let mut child = spawn(&mut cmd)?;
    loop {
        if let Some(status) = child.wait_timeout(POLL_SLICE).context("wait for command")? {
            let code = exit_code(status);
            debug!(code, "command finished");
            return Ok(code);
        }
        if token.is_cancelled() {
            debug!(pid = child.id(), "cancelled, stopping command");
            let status = stop_child(&mut child, StopSignal::Terminate, TERM_GRACE)?;
            return Ok(exit_code(status));
        }
    }
}
