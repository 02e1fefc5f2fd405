//! Worker role: run the main flow under a watcher and map the outcome to an exit code.

use std::sync::mpsc;

use anyhow::Result;
use tracing::{debug, error, info, warn};

use crate::cancel::CancelToken;
use crate::core::status::WatchStatus;
use crate::exit_codes;
use crate::io::env::WorkerEnv;
use crate::io::watch_set::WatchSet;
use crate::watcher::{Watcher, WatcherConfig};

/// How a worker run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerExit {
    /// Watcher verdict, or `Running` if the main flow finished by itself.
    pub status: WatchStatus,
    /// Code to exit the worker process with.
    pub code: i32,
}

#[derive(Debug)]
pub struct Worker {
    env: WorkerEnv,
    config: WatcherConfig,
    files: WatchSet,
}

impl Worker {
    pub fn new(env: WorkerEnv, config: WatcherConfig, files: WatchSet) -> Self {
        Self { env, config, files }
    }

    /// Run `flow` on the calling thread while the watcher polls in the background.
    ///
    /// `flow` must observe `token` at its checkpoints; it is never preempted.
    /// Once the token is cancelled (by the watcher or by a user interrupt) the
    /// flow's own result is discarded and the watcher's verdict decides the
    /// exit code. Without a verdict the run counts as a plain `Exit`.
    pub fn run<F>(self, token: CancelToken, flow: F) -> Result<WorkerExit>
    where
        F: FnOnce(&CancelToken) -> Result<i32>,
    {
        info!(
            pid = std::process::id(),
            files = self.files.len(),
            heartbeat = %self.env.heartbeat().display(),
            "worker started"
        );
        let (verdict_tx, verdict_rx) = mpsc::channel();
        let watcher = Watcher::new(self.env.heartbeat(), self.files, self.config)
            .spawn(token.clone(), verdict_tx)?;

        let outcome = flow(&token);
        let interrupted = token.is_cancelled();

        // Stops the watcher when the flow finished on its own.
        token.cancel();
        if watcher.join().is_err() {
            warn!("watcher thread panicked");
        }

        if interrupted {
            if let Err(err) = &outcome {
                debug!(err = format!("{err:#}"), "main flow error after cancellation");
            }
            let status = verdict_rx.try_recv().unwrap_or(WatchStatus::Exit);
            info!(%status, "main flow interrupted");
            return Ok(WorkerExit {
                status,
                code: status.exit_code(),
            });
        }

        let code = match outcome {
            Ok(code) => code,
            Err(err) => {
                error!(err = format!("{err:#}"), "main flow failed");
                exit_codes::FAILURE
            }
        };
        debug!(code, "main flow finished");
        Ok(WorkerExit {
            status: WatchStatus::Running,
            code,
        })
    }
}
