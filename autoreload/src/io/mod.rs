//! Side-effecting helpers: config file, environment contract, heartbeat file,
//! watched-file snapshots and child processes.

use std::fs;
use std::path::Path;
use std::time::SystemTime;

pub mod config;
pub mod env;
pub mod heartbeat;
pub mod process;
pub mod watch_set;

/// Modification time of `path`, or `None` if it is missing or unreadable.
pub fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|meta| meta.modified()).ok()
}
