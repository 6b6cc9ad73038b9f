use anyhow::{Context, Result};
use log::debug;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::traits::{Configuration, MergeableConfiguration};
use crate::types::DelayMode;

/// File name looked up in the working directory when no config is given
pub const DEFAULT_CONFIG_FILE: &str = "launcher.yml";

/// Launcher configuration, loaded from launcher.yml or built from defaults
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct LauncherConfig {
    /// Interpreter used to run the entry point
    #[serde(default = "default_runtime")]
    pub runtime: String,
    /// Arguments that make the runtime print its version
    #[serde(default = "default_version_args")]
    pub version_args: Vec<String>,
    /// Dependency manifest that must exist in the working directory
    #[serde(default = "default_manifest")]
    pub manifest: String,
    /// Benchmark program handed to the runtime as its only argument
    #[serde(default = "default_entry_point")]
    pub entry_point: String,
    /// Results artifact the benchmark writes into the working directory
    #[serde(default = "default_results_file")]
    pub results_file: String,
    /// Whether cosmetic countdowns actually wait
    #[serde(default)]
    pub delays: DelayMode,
    /// Seconds counted down before the benchmark starts
    #[serde(default = "default_countdown_secs")]
    pub countdown_secs: u64,
    /// Seconds counted down before the launcher exits
    #[serde(default = "default_shutdown_secs")]
    pub shutdown_secs: u64,
    /// How often the relay re-checks liveness and cancellation when idle
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Time between SIGTERM and SIGKILL when stopping the benchmark
    #[serde(default = "default_terminate_grace_ms")]
    pub terminate_grace_ms: u64,
    /// Optional upper bound on the benchmark's run time
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Path to the config file (set during loading)
    #[serde(skip)]
    pub path: PathBuf,
}

fn default_runtime() -> String {
    "node".to_string()
}

fn default_version_args() -> Vec<String> {
    vec!["--version".to_string()]
}

fn default_manifest() -> String {
    "package.json".to_string()
}

fn default_entry_point() -> String {
    "ai-monitor.js".to_string()
}

fn default_results_file() -> String {
    "benchmark_results.csv".to_string()
}

fn default_countdown_secs() -> u64 {
    3
}

fn default_shutdown_secs() -> u64 {
    3
}

fn default_poll_interval_ms() -> u64 {
    50
}

fn default_terminate_grace_ms() -> u64 {
    2000
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            runtime: default_runtime(),
            version_args: default_version_args(),
            manifest: default_manifest(),
            entry_point: default_entry_point(),
            results_file: default_results_file(),
            delays: DelayMode::default(),
            countdown_secs: default_countdown_secs(),
            shutdown_secs: default_shutdown_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            terminate_grace_ms: default_terminate_grace_ms(),
            timeout_secs: None,
            path: PathBuf::new(),
        }
    }
}

impl LauncherConfig {
    /// Files that must exist before anything is spawned
    pub fn required_files(&self) -> Vec<String> {
        vec![self.manifest.clone(), self.entry_point.clone()]
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn terminate_grace(&self) -> Duration {
        Duration::from_millis(self.terminate_grace_ms)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl Configuration for LauncherConfig {
    fn config_path(&self) -> &PathBuf {
        &self.path
    }

    fn config_type(&self) -> &str {
        "launcher"
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.runtime.trim().is_empty() {
            anyhow::bail!("runtime cannot be empty");
        }
        if self.entry_point.trim().is_empty() {
            anyhow::bail!("entry_point cannot be empty");
        }
        if self.manifest.trim().is_empty() {
            anyhow::bail!("manifest cannot be empty");
        }
        if self.poll_interval_ms == 0 {
            anyhow::bail!("poll_interval_ms cannot be zero");
        }
        if self.timeout_secs == Some(0) {
            anyhow::bail!("timeout_secs cannot be zero");
        }
        Ok(())
    }
}

/// Values given on the command line, taking precedence over the file
#[derive(Debug, Clone, Default)]
pub struct LauncherOverrides {
    pub runtime: Option<String>,
    pub entry_point: Option<String>,
    pub timeout_secs: Option<u64>,
    pub no_delays: bool,
}

impl MergeableConfiguration<LauncherOverrides> for LauncherConfig {
    fn merge_with(&self, other: &LauncherOverrides) -> anyhow::Result<Self> {
        let mut merged = self.clone();
        if let Some(runtime) = &other.runtime {
            merged.runtime = runtime.clone();
        }
        if let Some(entry_point) = &other.entry_point {
            merged.entry_point = entry_point.clone();
        }
        if other.timeout_secs.is_some() {
            merged.timeout_secs = other.timeout_secs;
        }
        if other.no_delays {
            merged.delays = DelayMode::Disabled;
        }
        merged.validate()?;
        Ok(merged)
    }
}

/// Load launcher configuration from a YAML file
pub fn load_launcher_config(config_path: &Path) -> Result<LauncherConfig> {
    if !config_path.exists() {
        anyhow::bail!("Launcher config file not found: {:?}", config_path);
    }

    let contents = std::fs::read_to_string(config_path)
        .with_context(|| format!("Failed to read launcher config file: {:?}", config_path))?;

    let mut config: LauncherConfig = serde_yaml::from_str(&contents)
        .with_context(|| format!("Failed to parse YAML from file: {:?}", config_path))?;

    config.path = config_path.to_path_buf();
    config.validate()?;

    debug!("Using {} configuration\n{:?}", config.config_type(), config);
    Ok(config)
}

/// Pick the configuration for a launch: an explicit file, else launcher.yml in
/// the working directory, else the built-in defaults
pub fn resolve_launcher_config(
    explicit: Option<&Path>,
    working_dir: &Path,
) -> Result<LauncherConfig> {
    if let Some(path) = explicit {
        return load_launcher_config(path);
    }

    let discovered = working_dir.join(DEFAULT_CONFIG_FILE);
    if discovered.is_file() {
        return load_launcher_config(&discovered);
    }

    debug!("No {DEFAULT_CONFIG_FILE} found, using defaults");
    Ok(LauncherConfig::default())
}
