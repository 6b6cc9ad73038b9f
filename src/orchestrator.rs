use log::{debug, info};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cancel::{CancelWatch, CancellationToken};
use crate::config::LauncherConfig;
use crate::error::LaunchError;
use crate::output::OutputSink;
use crate::probe::EnvironmentProbe;
use crate::report;
use crate::runner::ProcessRunner;
use crate::timer::ExecutionTimer;
use crate::types::ExecutionOutcome;

const COUNTDOWN_TICK: Duration = Duration::from_secs(1);

/// Where a launch is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchState {
    Idle,
    CheckingEnvironment,
    Ready,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl LaunchState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LaunchState::Completed | LaunchState::Failed | LaunchState::Cancelled
        )
    }
}

/// How a launch ended
#[derive(Debug)]
pub enum LaunchReport {
    Completed(ExecutionOutcome),
    Failed(LaunchError),
    /// `elapsed_seconds` is set when the benchmark had already started
    Cancelled { elapsed_seconds: Option<f64> },
}

impl LaunchReport {
    pub fn state(&self) -> LaunchState {
        match self {
            LaunchReport::Completed(_) => LaunchState::Completed,
            LaunchReport::Failed(_) => LaunchState::Failed,
            LaunchReport::Cancelled { .. } => LaunchState::Cancelled,
        }
    }

    /// Exit code for the launcher process: 0 only when the benchmark completed
    pub fn exit_code(&self) -> i32 {
        match self {
            LaunchReport::Completed(_) => 0,
            LaunchReport::Failed(err) => err.exit_code(),
            LaunchReport::Cancelled { .. } => LaunchError::Cancelled {
                elapsed_seconds: None,
            }
            .exit_code(),
        }
    }

    fn from_run(result: Result<ExecutionOutcome, LaunchError>) -> Self {
        match result {
            Ok(outcome) => LaunchReport::Completed(outcome),
            Err(LaunchError::Cancelled { elapsed_seconds }) => {
                LaunchReport::Cancelled { elapsed_seconds }
            }
            Err(err) => LaunchReport::Failed(err),
        }
    }
}

/// Sequences environment check, benchmark run and reporting.
///
/// All ambient inputs are explicit: the working directory, the sink that
/// receives every line of output, and the token used to cancel.
pub struct Orchestrator<S: OutputSink> {
    config: LauncherConfig,
    working_dir: PathBuf,
    sink: S,
    cancel: CancellationToken,
    state: LaunchState,
    history: Vec<LaunchState>,
}

impl<S: OutputSink> Orchestrator<S> {
    pub fn new(
        config: LauncherConfig,
        working_dir: impl AsRef<Path>,
        sink: S,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            working_dir: working_dir.as_ref().to_path_buf(),
            sink,
            cancel,
            state: LaunchState::Idle,
            history: vec![LaunchState::Idle],
        }
    }

    pub fn state(&self) -> LaunchState {
        self.state
    }

    /// Every state the most recent launch passed through, starting at `Idle`
    pub fn history(&self) -> &[LaunchState] {
        &self.history
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Run one full launch, including the summary and the shutdown delay.
    /// Every outcome, failures included, is folded into the report.
    pub fn run(&mut self) -> LaunchReport {
        self.state = LaunchState::Idle;
        self.history = vec![LaunchState::Idle];

        report::banner(&mut self.sink, &self.config);
        let outcome = self.launch();
        report::summary(&mut self.sink, &outcome, &self.config, &self.working_dir);
        self.shutdown_delay();

        outcome
    }

    fn transition(&mut self, next: LaunchState) {
        debug!("Launch state {:?} -> {:?}", self.state, next);
        self.state = next;
        self.history.push(next);
    }

    fn finish(&mut self, report: LaunchReport) -> LaunchReport {
        self.transition(report.state());
        report
    }

    fn launch(&mut self) -> LaunchReport {
        // One watch spans the whole launch so no request falls between phases
        let watch = self.cancel.watch();
        self.transition(LaunchState::CheckingEnvironment);

        let probe = EnvironmentProbe::new(
            self.config.runtime.clone(),
            self.config.version_args.clone(),
            &self.working_dir,
            self.config.required_files(),
        );
        let check = probe.check();
        report::environment(&mut self.sink, &check);
        if let Err(err) = check.into_result() {
            info!("Environment check failed, not starting benchmark");
            return self.finish(LaunchReport::Failed(err));
        }

        self.transition(LaunchState::Ready);

        let countdown_secs = self.countdown_secs();
        report::ready(&mut self.sink, countdown_secs);
        if !self.countdown(&watch) {
            info!("Cancelled before the benchmark started");
            return self.finish(LaunchReport::Cancelled {
                elapsed_seconds: None,
            });
        }

        self.transition(LaunchState::Running);
        report::starting(&mut self.sink);

        let runner = ProcessRunner::new()
            .working_dir(&self.working_dir)
            .poll_interval(self.config.poll_interval())
            .terminate_grace(self.config.terminate_grace())
            .timeout(self.config.timeout())
            .cancel_on(watch);

        let sink = &mut self.sink;
        let runtime = self.config.runtime.as_str();
        let entry_point = self.config.entry_point.as_str();
        let result = ExecutionTimer::new().measure(|| {
            runner.run(runtime, &[entry_point], |line| sink.write_line(line))
        });

        self.finish(LaunchReport::from_run(result))
    }

    fn countdown_secs(&self) -> u64 {
        if self.config.delays.is_enabled() {
            self.config.countdown_secs
        } else {
            0
        }
    }

    /// Returns false if cancelled before the countdown finished
    fn countdown(&mut self, watch: &CancelWatch) -> bool {
        for remaining in (1..=self.countdown_secs()).rev() {
            report::starting_in(&mut self.sink, remaining);
            if !watch.sleep(COUNTDOWN_TICK) {
                return false;
            }
        }
        !watch.is_cancelled()
    }

    /// Fixed, interruptible pause before exit, identical for every outcome
    fn shutdown_delay(&mut self) {
        if self.config.delays.is_enabled() {
            let watch = self.cancel.watch();
            for remaining in (1..=self.config.shutdown_secs).rev() {
                report::closing_in(&mut self.sink, remaining);
                if !watch.sleep(COUNTDOWN_TICK) {
                    debug!("Shutdown delay interrupted");
                    break;
                }
            }
        }
        report::goodbye(&mut self.sink);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DelayMode;
    use std::fs;
    use std::time::Instant;

    fn sh_config(entry_point: &str) -> LauncherConfig {
        LauncherConfig {
            runtime: "sh".to_string(),
            version_args: vec!["-c".to_string(), "echo sh-test".to_string()],
            manifest: "package.json".to_string(),
            entry_point: entry_point.to_string(),
            delays: DelayMode::Disabled,
            poll_interval_ms: 10,
            terminate_grace_ms: 500,
            ..LauncherConfig::default()
        }
    }

    fn workspace(script: &str) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("package.json"), "{}").unwrap();
        fs::write(dir.path().join("bench.sh"), script).unwrap();
        dir
    }

    #[test]
    fn test_completed_run_walks_every_state() {
        let dir = workspace("echo one\necho two\n");
        let mut orchestrator = Orchestrator::new(
            sh_config("bench.sh"),
            dir.path(),
            Vec::<String>::new(),
            CancellationToken::new(),
        );

        let report = orchestrator.run();
        assert_eq!(report.exit_code(), 0);
        assert_eq!(
            orchestrator.history(),
            &[
                LaunchState::Idle,
                LaunchState::CheckingEnvironment,
                LaunchState::Ready,
                LaunchState::Running,
                LaunchState::Completed,
            ]
        );
        assert!(orchestrator.state().is_terminal());

        let lines = orchestrator.sink();
        let one = lines.iter().position(|l| l == "one").unwrap();
        let two = lines.iter().position(|l| l == "two").unwrap();
        let done = lines
            .iter()
            .position(|l| l.contains("BENCHMARK COMPLETED"))
            .unwrap();
        assert!(one < two && two < done);
        assert_eq!(lines.last().unwrap(), "👋 Goodbye!");
    }

    #[test]
    fn test_missing_entry_point_never_reaches_ready() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("package.json"), "{}").unwrap();

        let mut orchestrator = Orchestrator::new(
            sh_config("bench.sh"),
            dir.path(),
            Vec::<String>::new(),
            CancellationToken::new(),
        );
        let report = orchestrator.run();

        assert_eq!(report.state(), LaunchState::Failed);
        assert_ne!(report.exit_code(), 0);
        assert!(!orchestrator.history().contains(&LaunchState::Ready));
        assert!(orchestrator
            .sink()
            .iter()
            .any(|l| l.contains("'bench.sh' not found")));
    }

    #[test]
    fn test_cancel_before_run_skips_spawn() {
        let dir = workspace("touch spawned\n");
        let token = CancellationToken::new();
        let mut config = sh_config("bench.sh");
        config.delays = DelayMode::Enabled;
        config.countdown_secs = 5;
        config.shutdown_secs = 0;

        let canceller = token.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(300));
            canceller.cancel();
        });

        let start = Instant::now();
        let mut orchestrator = Orchestrator::new(config, dir.path(), Vec::<String>::new(), token);
        let report = orchestrator.run();
        handle.join().unwrap();

        assert_eq!(report.state(), LaunchState::Cancelled);
        assert!(start.elapsed() < Duration::from_secs(4));
        assert!(!orchestrator.history().contains(&LaunchState::Running));
        assert!(!dir.path().join("spawned").exists());
    }

    #[test]
    fn test_cancel_during_environment_check_skips_spawn() {
        let dir = workspace("touch spawned\n");
        let mut config = sh_config("bench.sh");
        config.version_args = vec!["-c".to_string(), "sleep 0.5; echo sh-test".to_string()];

        let token = CancellationToken::new();
        let canceller = token.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(100));
            canceller.cancel();
        });

        let mut orchestrator = Orchestrator::new(config, dir.path(), Vec::<String>::new(), token);
        let report = orchestrator.run();
        handle.join().unwrap();

        assert_eq!(report.state(), LaunchState::Cancelled);
        assert!(!orchestrator.history().contains(&LaunchState::Running));
        assert!(!dir.path().join("spawned").exists());
    }

    #[test]
    fn test_shutdown_delay_runs_after_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = sh_config("bench.sh");
        config.delays = DelayMode::Enabled;
        config.shutdown_secs = 1;

        let start = Instant::now();
        let mut orchestrator = Orchestrator::new(
            config,
            dir.path(),
            Vec::<String>::new(),
            CancellationToken::new(),
        );
        let report = orchestrator.run();

        assert_eq!(report.state(), LaunchState::Failed);
        assert!(start.elapsed() >= Duration::from_secs(1));
        assert!(orchestrator.sink().iter().any(|l| l == "🔄 Closing in 1..."));
    }

    #[test]
    fn test_report_exit_codes() {
        assert_eq!(
            LaunchReport::Completed(ExecutionOutcome::new(0, None)).exit_code(),
            0
        );
        assert_eq!(
            LaunchReport::Cancelled {
                elapsed_seconds: None
            }
            .exit_code(),
            130
        );
        assert_eq!(
            LaunchReport::from_run(Err(LaunchError::ChildProcessFailed {
                outcome: ExecutionOutcome::new(7, None)
            }))
            .exit_code(),
            1
        );
    }
}
