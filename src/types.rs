use serde::Deserialize;

/// Result of a benchmark child process that ran to termination
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionOutcome {
    /// Exit code reported by the child (128 + signal number when killed by a signal)
    pub exit_code: i32,
    /// Wall-clock time the child ran for
    pub elapsed_seconds: f64,
    /// Captured standard error, only kept when the child failed
    pub stderr_text: Option<String>,
}

impl ExecutionOutcome {
    pub fn new(exit_code: i32, stderr_text: Option<String>) -> Self {
        Self {
            exit_code,
            elapsed_seconds: 0.0,
            stderr_text,
        }
    }

    pub fn with_elapsed(mut self, elapsed_seconds: f64) -> Self {
        self.elapsed_seconds = elapsed_seconds;
        self
    }
}

/// Whether cosmetic countdowns actually wait
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DelayMode {
    #[default]
    Enabled,
    Disabled,
}

impl DelayMode {
    pub fn is_enabled(&self) -> bool {
        matches!(self, DelayMode::Enabled)
    }
}
