use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::types::ExecutionOutcome;

/// A single failed precondition found by the environment probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvironmentIssue {
    /// The runtime executable could not be located or launched at all
    RuntimeMissing { runtime: String },
    /// The runtime launched but its version query exited non-zero
    RuntimeUnhealthy { runtime: String, exit_code: i32 },
    /// A required file is absent from the working directory
    MissingRequiredFile { path: PathBuf },
}

impl EnvironmentIssue {
    /// What the user should do about this issue
    pub fn remediation(&self) -> String {
        match self {
            EnvironmentIssue::RuntimeMissing { runtime } => {
                format!("Install '{runtime}' and make sure it is on your PATH")
            }
            EnvironmentIssue::RuntimeUnhealthy { runtime, .. } => {
                format!("Reinstall '{runtime}'; its version check does not succeed")
            }
            EnvironmentIssue::MissingRequiredFile { path } => {
                format!(
                    "Run from the directory that contains '{}' (and install its dependencies)",
                    path.display()
                )
            }
        }
    }
}

impl fmt::Display for EnvironmentIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvironmentIssue::RuntimeMissing { runtime } => {
                write!(f, "runtime '{runtime}' is not installed or not in PATH")
            }
            EnvironmentIssue::RuntimeUnhealthy { runtime, exit_code } => {
                write!(f, "runtime '{runtime}' version check exited with code {exit_code}")
            }
            EnvironmentIssue::MissingRequiredFile { path } => {
                write!(f, "required file '{}' not found", path.display())
            }
        }
    }
}

/// Why a launch did not reach `Completed`
#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("Environment check failed:\n{}", format_issues(.issues))]
    EnvironmentCheckFailed { issues: Vec<EnvironmentIssue> },

    #[error("Failed to spawn command '{command}': {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Benchmark exited with code {}", .outcome.exit_code)]
    ChildProcessFailed { outcome: ExecutionOutcome },

    #[error("Failed to supervise child process: {source}")]
    Wait {
        #[source]
        source: std::io::Error,
    },

    #[error("Benchmark exceeded its {limit_secs}s time limit")]
    TimedOut { limit_secs: u64, elapsed_seconds: f64 },

    #[error("Cancelled by user")]
    Cancelled { elapsed_seconds: Option<f64> },
}

fn format_issues(issues: &[EnvironmentIssue]) -> String {
    issues
        .iter()
        .map(|issue| format!("  - {issue}"))
        .collect::<Vec<_>>()
        .join("\n")
}

impl LaunchError {
    /// Launcher process exit code for this outcome
    pub fn exit_code(&self) -> i32 {
        match self {
            LaunchError::ChildProcessFailed { .. } => 1,
            LaunchError::EnvironmentCheckFailed { .. } => 2,
            LaunchError::SpawnFailed { .. } => 3,
            LaunchError::Wait { .. } => 4,
            LaunchError::TimedOut { .. } => 124,
            LaunchError::Cancelled { .. } => 130,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, LaunchError::Cancelled { .. })
    }

    /// How long the child ran before this error, if it ever started
    pub fn elapsed_seconds(&self) -> Option<f64> {
        match self {
            LaunchError::ChildProcessFailed { outcome } => Some(outcome.elapsed_seconds),
            LaunchError::TimedOut {
                elapsed_seconds, ..
            } => Some(*elapsed_seconds),
            LaunchError::Cancelled { elapsed_seconds } => *elapsed_seconds,
            _ => None,
        }
    }

    /// Attach a measured run duration to the variants that carry one
    pub fn with_elapsed(self, elapsed: f64) -> Self {
        match self {
            LaunchError::ChildProcessFailed { outcome } => LaunchError::ChildProcessFailed {
                outcome: outcome.with_elapsed(elapsed),
            },
            LaunchError::TimedOut { limit_secs, .. } => LaunchError::TimedOut {
                limit_secs,
                elapsed_seconds: elapsed,
            },
            LaunchError::Cancelled { .. } => LaunchError::Cancelled {
                elapsed_seconds: Some(elapsed),
            },
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_error_lists_every_issue() {
        let err = LaunchError::EnvironmentCheckFailed {
            issues: vec![
                EnvironmentIssue::RuntimeMissing {
                    runtime: "node".to_string(),
                },
                EnvironmentIssue::MissingRequiredFile {
                    path: PathBuf::from("package.json"),
                },
            ],
        };

        let message = err.to_string();
        assert!(message.contains("runtime 'node' is not installed"));
        assert!(message.contains("'package.json' not found"));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_with_elapsed_only_touches_timed_variants() {
        let failed = LaunchError::ChildProcessFailed {
            outcome: ExecutionOutcome::new(7, Some("boom".to_string())),
        }
        .with_elapsed(1.5);
        assert_eq!(failed.elapsed_seconds(), Some(1.5));

        let spawn = LaunchError::SpawnFailed {
            command: "node".to_string(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        }
        .with_elapsed(1.5);
        assert_eq!(spawn.elapsed_seconds(), None);

        let cancelled = LaunchError::Cancelled {
            elapsed_seconds: None,
        }
        .with_elapsed(0.2);
        assert!(cancelled.is_cancelled());
        assert_eq!(cancelled.elapsed_seconds(), Some(0.2));
    }

    #[test]
    fn test_exit_codes_are_distinct_and_nonzero() {
        let codes = [
            LaunchError::ChildProcessFailed {
                outcome: ExecutionOutcome::new(7, None),
            }
            .exit_code(),
            LaunchError::EnvironmentCheckFailed { issues: vec![] }.exit_code(),
            LaunchError::SpawnFailed {
                command: "x".to_string(),
                source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
            }
            .exit_code(),
            LaunchError::Cancelled {
                elapsed_seconds: None,
            }
            .exit_code(),
        ];
        assert!(codes.iter().all(|c| *c != 0));
        assert_eq!(codes, [1, 2, 3, 130]);
    }
}
