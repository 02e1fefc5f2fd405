//! Pure logic: watcher status, exit-code mapping and staleness predicates.
//!
//! Nothing in here touches the filesystem or spawns processes; callers pass
//! in the timestamps they observed.

pub mod staleness;
pub mod status;
