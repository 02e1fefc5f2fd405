//! Staleness and change predicates over observed modification times.
//!
//! `None` stands for "the file is gone or its metadata could not be read".

use std::time::{Duration, SystemTime};

/// Default slack added to the pulse interval before a heartbeat counts as stale.
pub const DEFAULT_GRACE: Duration = Duration::from_secs(5);

/// A heartbeat is stale when it is missing or older than `now - interval - grace`.
pub fn heartbeat_is_stale(
    heartbeat_mtime: Option<SystemTime>,
    now: SystemTime,
    interval: Duration,
    grace: Duration,
) -> bool {
    let Some(mtime) = heartbeat_mtime else {
        return true;
    };
    match now.checked_sub(interval + grace) {
        Some(cutoff) => mtime < cutoff,
        None => false,
    }
}

/// A watched file changed when it disappeared or its mtime moved past the recorded one.
///
/// An mtime moving backwards (e.g. restored from a backup) does not count.
pub fn file_changed(recorded: SystemTime, current: Option<SystemTime>) -> bool {
    match current {
        None => true,
        Some(current) => current > recorded,
    }
}
