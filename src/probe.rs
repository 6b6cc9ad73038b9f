use log::{debug, info};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::command::CommandExecutor;
use crate::error::{EnvironmentIssue, LaunchError};

/// What the runtime version query found
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeStatus {
    /// Version query exited 0
    Present { version: String },
    /// Executable could not be located or launched
    Missing,
    /// Executable launched but the version query exited non-zero
    Unhealthy { exit_code: i32 },
}

/// Snapshot of every precondition, built once per launch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentCheckResult {
    pub runtime: String,
    pub runtime_status: RuntimeStatus,
    /// Required filename -> whether it exists in the working directory
    pub required_files_present: BTreeMap<String, bool>,
}

impl EnvironmentCheckResult {
    pub fn runtime_present(&self) -> bool {
        matches!(self.runtime_status, RuntimeStatus::Present { .. })
    }

    pub fn runtime_version(&self) -> Option<&str> {
        match &self.runtime_status {
            RuntimeStatus::Present { version } => Some(version),
            _ => None,
        }
    }

    pub fn missing_files(&self) -> Vec<&str> {
        self.required_files_present
            .iter()
            .filter(|(_, present)| !**present)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Every failing check, runtime first, then files in name order
    pub fn issues(&self) -> Vec<EnvironmentIssue> {
        let mut issues = Vec::new();
        match &self.runtime_status {
            RuntimeStatus::Present { .. } => {}
            RuntimeStatus::Missing => issues.push(EnvironmentIssue::RuntimeMissing {
                runtime: self.runtime.clone(),
            }),
            RuntimeStatus::Unhealthy { exit_code } => {
                issues.push(EnvironmentIssue::RuntimeUnhealthy {
                    runtime: self.runtime.clone(),
                    exit_code: *exit_code,
                })
            }
        }
        issues.extend(
            self.missing_files()
                .into_iter()
                .map(|name| EnvironmentIssue::MissingRequiredFile {
                    path: PathBuf::from(name),
                }),
        );
        issues
    }

    pub fn is_ready(&self) -> bool {
        self.runtime_present() && self.missing_files().is_empty()
    }

    /// Convert into an error carrying every failing check, if any
    pub fn into_result(self) -> Result<Self, LaunchError> {
        let issues = self.issues();
        if issues.is_empty() {
            Ok(self)
        } else {
            Err(LaunchError::EnvironmentCheckFailed { issues })
        }
    }
}

/// Verifies the runtime and required files before anything is spawned
#[derive(Debug, Clone)]
pub struct EnvironmentProbe {
    runtime: String,
    version_args: Vec<String>,
    working_dir: PathBuf,
    required_files: Vec<String>,
}

impl EnvironmentProbe {
    pub fn new(
        runtime: impl Into<String>,
        version_args: Vec<String>,
        working_dir: impl AsRef<Path>,
        required_files: Vec<String>,
    ) -> Self {
        Self {
            runtime: runtime.into(),
            version_args,
            working_dir: working_dir.as_ref().to_path_buf(),
            required_files,
        }
    }

    /// Run every check. Never fails: problems are recorded in the result.
    pub fn check(&self) -> EnvironmentCheckResult {
        let runtime_status = self.check_runtime();
        let required_files_present = self
            .required_files
            .iter()
            .map(|name| {
                let present = self.working_dir.join(name).is_file();
                debug!("Required file {name}: present={present}");
                (name.clone(), present)
            })
            .collect();

        EnvironmentCheckResult {
            runtime: self.runtime.clone(),
            runtime_status,
            required_files_present,
        }
    }

    fn check_runtime(&self) -> RuntimeStatus {
        let executor = CommandExecutor::builder()
            .capture_output(true)
            .working_dir(Some(&self.working_dir))
            .build();
        let args: Vec<&str> = self.version_args.iter().map(String::as_str).collect();

        match executor.execute_command_with_args(&self.runtime, &args) {
            Ok(output) if output.status.success() => {
                let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
                info!("Found runtime {} ({})", self.runtime, version);
                RuntimeStatus::Present { version }
            }
            Ok(output) => {
                let exit_code = output.status.code().unwrap_or(-1);
                debug!("{} version query exited with {exit_code}", self.runtime);
                RuntimeStatus::Unhealthy { exit_code }
            }
            Err(err) => {
                debug!("Runtime {} unavailable: {err}", self.runtime);
                RuntimeStatus::Missing
            }
        }
    }
}
