//! Test-only helpers for scripted workers and file timestamps.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant, SystemTime};

use crate::io::heartbeat::set_mtime;

/// Move a file's mtime two seconds into the future.
///
/// Keeps "strictly newer" true even on filesystems with coarse timestamps.
pub fn bump_mtime(path: &Path) {
    set_mtime(path, SystemTime::now() + Duration::from_secs(2)).expect("bump mtime");
}

/// Poll `condition` every 20ms until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(20));
    }
    condition()
}

/// Number of lines in `path`, or 0 if it does not exist yet.
pub fn line_count(path: &Path) -> usize {
    fs::read_to_string(path)
        .map(|text| text.lines().count())
        .unwrap_or(0)
}

/// Files ending in `.heartbeat` directly under `dir`.
pub fn heartbeats_in(dir: &Path) -> Vec<PathBuf> {
    fs::read_dir(dir)
        .expect("read dir")
        .map(|entry| entry.expect("dir entry").path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "heartbeat"))
        .collect()
}

/// Write an executable `sh` script.
#[cfg(unix)]
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write script");
    let mut perms = fs::metadata(&path).expect("script metadata").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).expect("chmod script");
    path
}
