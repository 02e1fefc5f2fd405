//! Call instrumentation for the programs being supervised.
//!
//! Each wrapper runs the wrapped call unchanged and emits one `tracing` event
//! per call. None of them touch the supervisor or the watcher.

use std::backtrace::Backtrace;
use std::fmt::Debug;
use std::panic::Location;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use tracing::{debug, info};

/// Run `f`, logging the call site and the returned value.
#[track_caller]
pub fn trace<T: Debug>(name: &str, f: impl FnOnce() -> T) -> T {
    let caller = Location::caller();
    let result = f();
    info!(
        function = name,
        file = caller.file(),
        line = caller.line(),
        result = ?result,
        "traced call"
    );
    result
}

/// Like [`trace`], but also logs the full stack of the call.
#[track_caller]
pub fn trace_with_stack<T: Debug>(name: &str, f: impl FnOnce() -> T) -> T {
    let caller = Location::caller();
    let result = f();
    let stack = Backtrace::force_capture();
    info!(
        function = name,
        file = caller.file(),
        line = caller.line(),
        result = ?result,
        stack = %stack,
        "traced call"
    );
    result
}

/// Run `f`, logging how long it took.
///
/// Wall-clock time; other processes on the machine skew it.
pub fn timeit<T>(label: &str, f: impl FnOnce() -> T) -> T {
    let start = Instant::now();
    let result = f();
    info!(label, elapsed = ?start.elapsed(), "timed call");
    result
}

/// A callable that counts its invocations.
///
/// Arguments are passed as one value; use a tuple for several.
#[derive(Debug)]
pub struct Counted<F> {
    name: &'static str,
    f: F,
    calls: AtomicU64,
}

impl<F> Counted<F> {
    pub fn new(name: &'static str, f: F) -> Self {
        Self {
            name,
            f,
            calls: AtomicU64::new(0),
        }
    }

    /// Invocations so far.
    pub fn count(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    pub fn call<A, R>(&self, args: A) -> R
    where
        F: Fn(A) -> R,
    {
        let calls = self.calls.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(function = self.name, calls, "counted call");
        (self.f)(args)
    }
}
