//! Development-time process supervisor with file-change-triggered restart.
//!
//! A supervisor process spawns a worker that runs the user's program. A
//! watcher thread inside the worker polls the mtimes of a fixed set of files
//! plus a heartbeat file the supervisor keeps fresh. On a change the worker
//! exits with [`exit_codes::RELOAD`] and the supervisor spawns a new one; on a
//! stale heartbeat the worker gives up on its own.
//!
//! - **[`core`]**: pure logic (status, exit-code decisions, staleness).
//! - **[`io`]**: config, environment contract, heartbeat, watched files, child processes.
//!
//! [`supervisor`], [`worker`] and [`watcher`] implement the two roles;
//! [`launch`](mod@launch) picks the role for the current process.

pub mod cancel;
pub mod core;
pub mod exit_codes;
pub mod instrument;
pub mod io;
pub mod launch;
pub mod logging;
pub mod supervisor;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod watcher;
pub mod worker;

pub use launch::{launch, launch_command};
