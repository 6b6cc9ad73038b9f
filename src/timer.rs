use std::time::{Duration, Instant};

use crate::error::LaunchError;
use crate::types::ExecutionOutcome;

/// Wall-clock timing around a child process run
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecutionTimer;

impl ExecutionTimer {
    pub fn new() -> Self {
        Self
    }

    /// Run `op` and return its value with the monotonic time it took
    pub fn time<T, F: FnOnce() -> T>(&self, op: F) -> (T, Duration) {
        let start = Instant::now();
        let value = op();
        (value, start.elapsed())
    }

    /// Run `op` and stamp the elapsed seconds onto its outcome.
    /// Failures that happened after the child started carry the duration too.
    pub fn measure<F>(&self, op: F) -> Result<ExecutionOutcome, LaunchError>
    where
        F: FnOnce() -> Result<ExecutionOutcome, LaunchError>,
    {
        let (result, elapsed) = self.time(op);
        let elapsed = elapsed.as_secs_f64();
        match result {
            Ok(outcome) => Ok(outcome.with_elapsed(elapsed)),
            Err(err) => Err(err.with_elapsed(elapsed)),
        }
    }
}

/// Seconds with one decimal place, as shown in reports
pub fn format_seconds(seconds: f64) -> String {
    format!("{seconds:.1}")
}
