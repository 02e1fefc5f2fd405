//! Background watcher inside a worker.
//!
//! Every interval the watcher checks the heartbeat first and the watched
//! files second. The first terminal verdict is sent to the worker exactly
//! once, then the main flow's token is cancelled.

use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::core::staleness::heartbeat_is_stale;
use crate::core::status::WatchStatus;
use crate::io::modified;
use crate::io::watch_set::WatchSet;

/// Poll cadence and staleness slack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatcherConfig {
    pub interval: Duration,
    pub grace: Duration,
}

#[derive(Debug)]
pub struct Watcher {
    heartbeat: PathBuf,
    files: WatchSet,
    config: WatcherConfig,
}

impl Watcher {
    pub fn new(heartbeat: impl Into<PathBuf>, files: WatchSet, config: WatcherConfig) -> Self {
        Self {
            heartbeat: heartbeat.into(),
            files,
            config,
        }
    }

    pub fn heartbeat(&self) -> &Path {
        &self.heartbeat
    }

    /// One poll at time `now`.
    ///
    /// A stale heartbeat wins over a file change seen in the same poll.
    pub fn check(&self, now: SystemTime) -> WatchStatus {
        let heartbeat_mtime = modified(&self.heartbeat);
        if heartbeat_is_stale(
            heartbeat_mtime,
            now,
            self.config.interval,
            self.config.grace,
        ) {
            warn!(
                heartbeat = %self.heartbeat.display(),
                missing = heartbeat_mtime.is_none(),
                "supervisor heartbeat is stale"
            );
            return WatchStatus::Error;
        }
        if let Some(path) = self.files.first_change() {
            info!(path = %path.display(), "watched file changed");
            return WatchStatus::Reload;
        }
        WatchStatus::Running
    }

    /// Poll until a terminal verdict or until `token` is cancelled by someone else.
    pub fn run(self, token: CancelToken, verdict: Sender<WatchStatus>) {
        debug!(files = self.files.len(), "watcher started");
        while !token.is_cancelled() {
            let status = self.check(SystemTime::now());
            if status.is_terminal() {
                // The worker may already be gone; nothing left to tell it then.
                let _ = verdict.send(status);
                token.cancel();
                return;
            }
            if token.wait_timeout(self.config.interval) {
                break;
            }
        }
        debug!("watcher stopped");
    }

    /// Run the watcher on its own thread.
    pub fn spawn(
        self,
        token: CancelToken,
        verdict: Sender<WatchStatus>,
    ) -> Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("autoreload-watcher".to_string())
            .spawn(move || self.run(token, verdict))
            .context("spawn watcher thread")
    }
}
