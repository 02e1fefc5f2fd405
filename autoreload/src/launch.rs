//! Single entry point for both roles.
//!
//! The supervisor re-runs the current executable with the same arguments and
//! the worker variables set; the same call in that child takes the worker
//! branch. A program opts in by wrapping its `main`:
//!
//! ```no_run
//! use autoreload::io::config::AutoreloadConfig;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = AutoreloadConfig {
//!         watch: vec!["assets".to_string()],
//!         ..AutoreloadConfig::default()
//!     };
//!     let code = autoreload::launch(&config, |token| {
//!         while !token.wait_timeout(std::time::Duration::from_secs(1)) {
//!             println!("serving");
//!         }
//!         Ok(0)
//!     })?;
//!     std::process::exit(code);
//! }
//! ```

use std::ffi::{OsStr, OsString};
use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use tracing::debug;

use crate::cancel::CancelToken;
use crate::io::config::AutoreloadConfig;
use crate::io::env::{WorkerEnv, scrub};
use crate::io::process::run_until_cancelled;
use crate::io::watch_set::WatchSet;
use crate::supervisor::{Supervisor, SupervisorConfig};
use crate::watcher::WatcherConfig;
use crate::worker::Worker;

impl From<&AutoreloadConfig> for SupervisorConfig {
    fn from(config: &AutoreloadConfig) -> Self {
        Self {
            interval: config.interval(),
            heartbeat_dir: config.heartbeat_dir.clone(),
        }
    }
}

impl From<&AutoreloadConfig> for WatcherConfig {
    fn from(config: &AutoreloadConfig) -> Self {
        Self {
            interval: config.interval(),
            grace: config.grace(),
        }
    }
}

/// Run `flow` under autoreload and return the code this process should exit with.
///
/// In the supervisor role `flow` is never called. In the worker role the
/// running executable joins the watch set when `watch_executable` is set, so
/// a rebuild triggers a reload.
pub fn launch<F>(config: &AutoreloadConfig, flow: F) -> Result<i32>
where
    F: FnOnce(&CancelToken) -> Result<i32>,
{
    launch_with(config, || std::env::current_exe().ok(), flow)
}

/// Supervise an external command.
///
/// The worker's main flow runs `program args…` as a child with the worker
/// variables removed from its environment, and kills it on cancellation.
/// With `watch_executable` the command's resolved path is watched too.
pub fn launch_command(
    config: &AutoreloadConfig,
    program: &OsStr,
    args: &[OsString],
) -> Result<i32> {
    launch_with(
        config,
        || which::which(program).ok(),
        |token| {
            let mut cmd = Command::new(program);
            cmd.args(args);
            scrub(&mut cmd);
            run_until_cancelled(cmd, token)
        },
    )
}

fn launch_with<E, F>(config: &AutoreloadConfig, executable: E, flow: F) -> Result<i32>
where
    E: FnOnce() -> Option<PathBuf>,
    F: FnOnce(&CancelToken) -> Result<i32>,
{
    config.validate()?;
    match WorkerEnv::from_env()? {
        None => run_supervisor(config),
        Some(env) => run_worker(config, env, executable, flow),
    }
}

fn run_supervisor(config: &AutoreloadConfig) -> Result<i32> {
    let program = std::env::current_exe().context("locate current executable")?;
    let args: Vec<OsString> = std::env::args_os().skip(1).collect();

    // SIGINT, SIGTERM and SIGHUP all raise the stop flag.
    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&stop);
        ctrlc::set_handler(move || stop.store(true, Ordering::SeqCst))
            .context("install signal handler")?;
    }

    let exit = Supervisor::new(program, args, SupervisorConfig::from(config)).run(&stop)?;
    Ok(exit.exit_code())
}

fn run_worker<E, F>(
    config: &AutoreloadConfig,
    env: WorkerEnv,
    executable: E,
    flow: F,
) -> Result<i32>
where
    E: FnOnce() -> Option<PathBuf>,
    F: FnOnce(&CancelToken) -> Result<i32>,
{
    let mut files = WatchSet::resolve(&config.watch)?;
    if config.watch_executable {
        match executable() {
            Some(path) => files.insert_file(&path)?,
            None => debug!("executable not resolvable, not watching it"),
        }
    }

    let token = CancelToken::new();
    {
        let token = token.clone();
        ctrlc::set_handler(move || token.cancel()).context("install signal handler")?;
    }

    let exit = Worker::new(env, WatcherConfig::from(config), files).run(token, flow)?;
    Ok(exit.code)
}
