//! Environment contract between a supervisor and the worker it spawns.
//!
//! The supervisor places both variables on the child's `Command` explicitly;
//! the worker parses them once at startup into a [`WorkerEnv`].

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Result, bail};

/// Presence marks the process as a worker.
pub const WORKER_VAR: &str = "AUTORELOAD_WORKER";
/// Absolute path of the heartbeat file the worker's watcher monitors.
pub const HEARTBEAT_VAR: &str = "AUTORELOAD_HEARTBEAT";

/// Context handed from the supervisor to a worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerEnv {
    pub heartbeat: PathBuf,
}

impl WorkerEnv {
    pub fn new(heartbeat: impl Into<PathBuf>) -> Self {
        Self {
            heartbeat: heartbeat.into(),
        }
    }

    /// Read the contract from this process's environment.
    ///
    /// Returns `Ok(None)` when the worker marker is absent (supervisor role).
    pub fn from_env() -> Result<Option<Self>> {
        Self::from_vars(std::env::vars_os())
    }

    /// Parse the contract from an explicit variable list.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Option<Self>>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<OsStr>,
        V: Into<OsString>,
    {
        let mut marker = None;
        let mut heartbeat = None;
        for (key, value) in vars {
            let key = key.as_ref();
            if key == WORKER_VAR {
                marker = Some(value.into());
            } else if key == HEARTBEAT_VAR {
                heartbeat = Some(value.into());
            }
        }

        match marker {
            Some(marker) if !marker.is_empty() => {}
            _ => return Ok(None),
        }
        match heartbeat {
            Some(path) if !path.is_empty() => Ok(Some(Self::new(path))),
            _ => bail!("{WORKER_VAR} is set but {HEARTBEAT_VAR} is missing"),
        }
    }

    /// Mark `cmd` as a worker bound to this heartbeat.
    pub fn apply(&self, cmd: &mut Command) {
        cmd.env(WORKER_VAR, "1").env(HEARTBEAT_VAR, &self.heartbeat);
    }

    pub fn heartbeat(&self) -> &Path {
        &self.heartbeat
    }
}

/// Strip the contract from `cmd` so a supervised command is not mistaken for a worker.
pub fn scrub(cmd: &mut Command) {
    cmd.env_remove(WORKER_VAR).env_remove(HEARTBEAT_VAR);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_marker_means_supervisor() {
        let vars = [("PATH", "/usr/bin"), (HEARTBEAT_VAR, "/tmp/hb")];
        assert_eq!(WorkerEnv::from_vars(vars).expect("parse"), None);
    }

    #[test]
    fn empty_marker_means_supervisor() {
        let vars = [(WORKER_VAR, ""), (HEARTBEAT_VAR, "/tmp/hb")];
        assert_eq!(WorkerEnv::from_vars(vars).expect("parse"), None);
    }

    #[test]
    fn marker_with_heartbeat_means_worker() {
        let vars = [(WORKER_VAR, "1"), (HEARTBEAT_VAR, "/tmp/hb")];
        let env = WorkerEnv::from_vars(vars).expect("parse").expect("worker");
        assert_eq!(env.heartbeat(), Path::new("/tmp/hb"));
    }

    #[test]
    fn marker_without_heartbeat_is_an_error() {
        let err = WorkerEnv::from_vars([(WORKER_VAR, "1")]).expect_err("missing heartbeat");
        assert!(err.to_string().contains(HEARTBEAT_VAR));
    }

    #[test]
    fn apply_and_scrub_edit_the_command_env() {
        let mut cmd = Command::new("true");
        WorkerEnv::new("/tmp/hb").apply(&mut cmd);
        let envs: Vec<_> = cmd.get_envs().collect();
        assert!(envs.contains(&(OsStr::new(WORKER_VAR), Some(OsStr::new("1")))));
        assert!(envs.contains(&(OsStr::new(HEARTBEAT_VAR), Some(OsStr::new("/tmp/hb")))));

        scrub(&mut cmd);
        let envs: Vec<_> = cmd.get_envs().collect();
        assert!(envs.contains(&(OsStr::new(WORKER_VAR), None)));
        assert!(envs.contains(&(OsStr::new(HEARTBEAT_VAR), None)));
    }
}
