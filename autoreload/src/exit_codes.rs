//! Stable exit codes shared by the supervisor and its workers.

/// The main flow finished cleanly or was interrupted by the user.
pub const OK: i32 = 0;
/// Fatal error: bad config, spawn failure, stale heartbeat, or a failed main flow.
pub const FAILURE: i32 = 1;
/// A watched file changed; the supervisor must spawn a fresh worker.
pub const RELOAD: i32 = 3;
/// Offset added to a signal number when a child was killed by that signal.
pub const SIGNAL_BASE: i32 = 128;
