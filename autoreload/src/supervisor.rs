//! Supervisor role: the restart loop.
//!
//! Spawns a worker, pulses the heartbeat while it runs, and respawns it
//! whenever it exits with [`exit_codes::RELOAD`]. Any other exit code stops
//! the loop and becomes the supervisor's own.
//!
//! Each worker leads its own process group. Whatever is left in that group
//! after the worker exits is killed, so a crashed worker cannot leave the
//! code it was running behind.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};
use wait_timeout::ChildExt;

use crate::core::status::{ExitDecision, decide};
use crate::exit_codes;
use crate::io::env::WorkerEnv;
use crate::io::heartbeat::Heartbeat;
use crate::io::process::{
    POLL_SLICE, StopSignal, TERM_GRACE, exit_code, isolate, kill_group, spawn, stop_child,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorConfig {
    /// Heartbeat pulse interval.
    pub interval: Duration,
    /// Directory for the heartbeat file; system temp dir when `None`.
    pub heartbeat_dir: Option<PathBuf>,
}

/// Why the restart loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorStop {
    /// A worker exited with a non-reload code.
    Exited(i32),
    /// The stop flag was raised (Ctrl-C).
    Interrupted,
    /// Someone deleted the heartbeat file between workers.
    HeartbeatRemoved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorExit {
    pub stop: SupervisorStop,
    /// Number of workers spawned over the whole run.
    pub spawns: u32,
}

impl SupervisorExit {
    /// Code for the supervisor process itself.
    pub fn exit_code(&self) -> i32 {
        match self.stop {
            SupervisorStop::Exited(code) => code,
            SupervisorStop::Interrupted | SupervisorStop::HeartbeatRemoved => exit_codes::OK,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Supervisor {
    program: PathBuf,
    args: Vec<OsString>,
    config: SupervisorConfig,
}

impl Supervisor {
    pub fn new(
        program: impl Into<PathBuf>,
        args: impl IntoIterator<Item = impl Into<OsString>>,
        config: SupervisorConfig,
    ) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            config,
        }
    }

    /// Run the restart loop until a worker exits with a non-reload code or `stop` is raised.
    ///
    /// The heartbeat file is removed on every return path, including errors.
    /// A worker that cannot be spawned is a fatal error; it is never retried.
    pub fn run(&self, stop: &AtomicBool) -> Result<SupervisorExit> {
        let heartbeat = Heartbeat::create(self.config.heartbeat_dir.as_deref())?;
        let env = WorkerEnv::new(heartbeat.path());
        info!(
            program = %self.program.display(),
            interval = ?self.config.interval,
            "autoreload supervisor started"
        );

        let mut spawns = 0u32;
        let stop_reason = loop {
            if stop.load(Ordering::SeqCst) {
                break SupervisorStop::Interrupted;
            }
            if !heartbeat.exists() {
                warn!(heartbeat = %heartbeat.path().display(), "heartbeat removed, not respawning");
                break SupervisorStop::HeartbeatRemoved;
            }

            pulse(&heartbeat);
            let mut cmd = Command::new(&self.program);
            cmd.args(&self.args);
            env.apply(&mut cmd);
            isolate(&mut cmd);
            let mut child = spawn(&mut cmd).context("start worker")?;
            let leader = child.id();
            spawns += 1;
            debug!(pid = leader, spawns, "worker spawned");

            let waited = self.wait_pulsing(&mut child, &heartbeat, stop);
            let status = match waited {
                Ok(Some(status)) => status,
                Ok(None) => {
                    info!("user exit, stopping worker");
                    let stopped =
                        stop_child(&mut child, StopSignal::Interrupt, self.shutdown_grace());
                    sweep(leader);
                    debug!(code = exit_code(stopped?), "worker stopped after interrupt");
                    break SupervisorStop::Interrupted;
                }
                Err(err) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    sweep(leader);
                    return Err(err);
                }
            };
            sweep(leader);

            let code = exit_code(status);
            match decide(code) {
                ExitDecision::Respawn if stop.load(Ordering::SeqCst) => {
                    break SupervisorStop::Interrupted;
                }
                ExitDecision::Respawn => {
                    info!(spawns, "change detected, restarting worker");
                }
                ExitDecision::Propagate(code) => {
                    info!(code, spawns, "worker exited, stopping");
                    break SupervisorStop::Exited(code);
                }
            }
        };

        if let Err(err) = heartbeat.remove() {
            warn!(err = format!("{err:#}"), "failed to remove heartbeat");
        }
        Ok(SupervisorExit {
            stop: stop_reason,
            spawns,
        })
    }

    /// How long an interrupted worker gets to stop its own main flow: one
    /// watcher interval, one poll of the flow, and the command's own grace.
    fn shutdown_grace(&self) -> Duration {
        self.config.interval + POLL_SLICE + TERM_GRACE
    }

    /// Wait for `child`, refreshing the heartbeat every interval.
    ///
    /// Returns `None` when `stop` is raised while the child is still running.
    fn wait_pulsing(
        &self,
        child: &mut Child,
        heartbeat: &Heartbeat,
        stop: &AtomicBool,
    ) -> Result<Option<ExitStatus>> {
        let slice = self.config.interval.min(POLL_SLICE);
        let mut last_pulse = Instant::now();
        loop {
            if let Some(status) = child.wait_timeout(slice).context("wait for worker")? {
                return Ok(Some(status));
            }
            if stop.load(Ordering::SeqCst) {
                return Ok(None);
            }
            if last_pulse.elapsed() >= self.config.interval {
                pulse(heartbeat);
                last_pulse = Instant::now();
            }
        }
    }
}

fn sweep(leader: u32) {
    if kill_group(leader) {
        warn!(pgid = leader, "killed processes left behind by the worker");
    }
}

/// Refresh the heartbeat. A single failed write is tolerated; the worker only
/// gives up after the grace window.
fn pulse(heartbeat: &Heartbeat) {
    if let Err(err) = heartbeat.touch() {
        debug!(err = format!("{err:#}"), "heartbeat refresh failed");
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh_supervisor(script: &str, dir: &std::path::Path) -> Supervisor {
        Supervisor::new(
            "sh",
            ["-c", script],
            SupervisorConfig {
                interval: Duration::from_millis(50),
                heartbeat_dir: Some(dir.to_path_buf()),
            },
        )
    }

    #[test]
    fn exit_code_follows_the_stop_reason() {
        let exit = |stop| SupervisorExit { stop, spawns: 1 };
        assert_eq!(exit(SupervisorStop::Exited(9)).exit_code(), 9);
        assert_eq!(exit(SupervisorStop::Interrupted).exit_code(), 0);
        assert_eq!(exit(SupervisorStop::HeartbeatRemoved).exit_code(), 0);
    }

    #[test]
    fn raised_stop_flag_spawns_nothing() {
        let temp = tempfile::tempdir().expect("tempdir");
        let supervisor = sh_supervisor("exit 0", temp.path());
        let stop = AtomicBool::new(true);

        let exit = supervisor.run(&stop).expect("run");
        assert_eq!(exit.stop, SupervisorStop::Interrupted);
        assert_eq!(exit.spawns, 0);
    }

    #[test]
    fn worker_sees_heartbeat_in_its_environment() {
        let temp = tempfile::tempdir().expect("tempdir");
        let script = r#"[ "$AUTORELOAD_WORKER" = 1 ] && [ -f "$AUTORELOAD_HEARTBEAT" ] && exit 0; exit 9"#;
        let supervisor = sh_supervisor(script, temp.path());

        let exit = supervisor.run(&AtomicBool::new(false)).expect("run");
        assert_eq!(exit.stop, SupervisorStop::Exited(0));
    }

    #[test]
    fn worker_deleting_the_heartbeat_ends_the_loop() {
        let temp = tempfile::tempdir().expect("tempdir");
        let supervisor = sh_supervisor(r#"rm -f "$AUTORELOAD_HEARTBEAT"; exit 3"#, temp.path());

        let exit = supervisor.run(&AtomicBool::new(false)).expect("run");
        assert_eq!(exit.stop, SupervisorStop::HeartbeatRemoved);
        assert_eq!(exit.spawns, 1);
    }

    #[test]
    fn processes_left_by_a_worker_are_killed() {
        let temp = tempfile::tempdir().expect("tempdir");
        let pid_file = temp.path().join("bg.pid");
        let script = format!(r#"sleep 30 & echo $! > "{}"; exit 7"#, pid_file.display());
        let supervisor = sh_supervisor(&script, temp.path());

        let exit = supervisor.run(&AtomicBool::new(false)).expect("run");
        assert_eq!(exit.stop, SupervisorStop::Exited(7));

        let bg = std::fs::read_to_string(&pid_file).expect("read pid");
        let gone = crate::test_support::wait_until(Duration::from_secs(5), || {
            !Command::new("kill")
                .args(["-0", bg.trim()])
                .stderr(std::process::Stdio::null())
                .status()
                .expect("kill -0")
                .success()
        });
        assert!(gone, "background process {} survived the worker", bg.trim());
    }
}
