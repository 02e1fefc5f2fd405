//! Watcher status and its exit-code mapping.

use std::fmt;

use crate::exit_codes;

/// Lifecycle of a worker's watcher.
///
/// Starts as `Running` and moves to exactly one terminal value. No transition
/// leaves a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchStatus {
    /// Still polling.
    Running,
    /// A watched file changed or disappeared.
    Reload,
    /// The main flow was interrupted without a watcher verdict (e.g. Ctrl-C).
    Exit,
    /// The heartbeat went stale: the supervisor is gone or stopped pulsing.
    Error,
}

impl WatchStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, WatchStatus::Running)
    }

    /// Exit code the worker reports to its supervisor for this status.
    ///
    /// Only `Reload` maps to the respawn sentinel.
    pub fn exit_code(self) -> i32 {
        match self {
            WatchStatus::Reload => exit_codes::RELOAD,
            WatchStatus::Running | WatchStatus::Exit => exit_codes::OK,
            WatchStatus::Error => exit_codes::FAILURE,
        }
    }
}

impl fmt::Display for WatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            WatchStatus::Running => "running",
            WatchStatus::Reload => "reload",
            WatchStatus::Exit => "exit",
            WatchStatus::Error => "error",
        };
        f.write_str(label)
    }
}

/// What the supervisor should do with a finished worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitDecision {
    Respawn,
    Propagate(i32),
}

/// Interpret a worker's exit code.
pub fn decide(code: i32) -> ExitDecision {
    if code == exit_codes::RELOAD {
        ExitDecision::Respawn
    } else {
        ExitDecision::Propagate(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_reload_maps_to_sentinel() {
        assert_eq!(WatchStatus::Reload.exit_code(), 3);
        assert_ne!(WatchStatus::Exit.exit_code(), 3);
        assert_ne!(WatchStatus::Error.exit_code(), 3);
        assert_ne!(WatchStatus::Running.exit_code(), 3);
    }

    #[test]
    fn stale_heartbeat_exits_non_zero() {
        assert_eq!(WatchStatus::Error.exit_code(), exit_codes::FAILURE);
    }

    #[test]
    fn running_is_the_only_non_terminal_status() {
        assert!(!WatchStatus::Running.is_terminal());
        assert!(WatchStatus::Reload.is_terminal());
        assert!(WatchStatus::Exit.is_terminal());
        assert!(WatchStatus::Error.is_terminal());
    }

    #[test]
    fn sentinel_respawns_everything_else_propagates() {
        assert_eq!(decide(3), ExitDecision::Respawn);
        assert_eq!(decide(0), ExitDecision::Propagate(0));
        assert_eq!(decide(1), ExitDecision::Propagate(1));
        assert_eq!(decide(137), ExitDecision::Propagate(137));
    }
}
