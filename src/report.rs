//! Human-readable progress lines. Everything here is presentation; the
//! orchestrator decides what happens and calls in here to say so.

use log::warn;
use std::path::Path;

use crate::config::LauncherConfig;
use crate::error::LaunchError;
use crate::orchestrator::LaunchReport;
use crate::output::OutputSink;
use crate::probe::EnvironmentCheckResult;
use crate::timer::format_seconds;

const RULE_WIDTH: usize = 50;

fn rule() -> String {
    "=".repeat(RULE_WIDTH)
}

pub fn banner(sink: &mut impl OutputSink, config: &LauncherConfig) {
    sink.write_line(&rule());
    sink.write_line("🚀 BENCHMARK LAUNCHER");
    sink.write_line(&rule());
    sink.write_line(&format!("📦 {} {}", config.runtime, config.entry_point));
    sink.write_line(&format!("💾 Results saved to {}", config.results_file));
    sink.write_line(&rule());
}

pub fn environment(sink: &mut impl OutputSink, check: &EnvironmentCheckResult) {
    if let Some(version) = check.runtime_version() {
        sink.write_line(&format!("✅ {} version: {}", check.runtime, version));
    }

    let issues = check.issues();
    for issue in &issues {
        sink.write_line(&format!("❌ {issue}"));
        sink.write_line(&format!("   → {}", issue.remediation()));
    }

    if issues.is_empty() {
        sink.write_line("✅ All dependencies found");
    }
}

pub fn ready(sink: &mut impl OutputSink, countdown_secs: u64) {
    sink.write_line("🎯 Ready to run the benchmark!");
    if countdown_secs > 0 {
        sink.write_line(&format!(
            "💡 The benchmark will start in {countdown_secs} seconds..."
        ));
    }
}

pub fn starting_in(sink: &mut impl OutputSink, remaining: u64) {
    sink.write_line(&format!("⏳ Starting in {remaining}..."));
}

pub fn starting(sink: &mut impl OutputSink) {
    sink.write_line("🚀 Starting benchmark now!");
}

pub fn summary(
    sink: &mut impl OutputSink,
    report: &LaunchReport,
    config: &LauncherConfig,
    working_dir: &Path,
) {
    match report {
        LaunchReport::Completed(outcome) => {
            sink.write_line(&rule());
            sink.write_line("✅ BENCHMARK COMPLETED!");
            sink.write_line(&format!(
                "⏱️  Total execution time: {} seconds",
                format_seconds(outcome.elapsed_seconds)
            ));
            if working_dir.join(&config.results_file).is_file() {
                sink.write_line(&format!(
                    "📊 Check {} for detailed results",
                    config.results_file
                ));
            } else {
                warn!(
                    "Results file {} not found in {}",
                    config.results_file,
                    working_dir.display()
                );
                sink.write_line(&format!(
                    "⚠️  Expected results file {} was not found",
                    config.results_file
                ));
            }
            sink.write_line(&rule());
        }
        LaunchReport::Failed(err) => failure(sink, err),
        LaunchReport::Cancelled { elapsed_seconds } => match elapsed_seconds {
            Some(elapsed) => sink.write_line(&format!(
                "❌ Benchmark cancelled by user after {} seconds",
                format_seconds(*elapsed)
            )),
            None => sink.write_line("❌ Benchmark cancelled by user"),
        },
    }
}

fn failure(sink: &mut impl OutputSink, err: &LaunchError) {
    match err {
        LaunchError::EnvironmentCheckFailed { issues } => {
            sink.write_line(&format!(
                "❌ Environment check failed with {} problem(s); benchmark not started",
                issues.len()
            ));
        }
        LaunchError::ChildProcessFailed { outcome } => {
            sink.write_line(&format!(
                "❌ Benchmark failed with exit code {} after {} seconds:",
                outcome.exit_code,
                format_seconds(outcome.elapsed_seconds)
            ));
            if let Some(stderr) = &outcome.stderr_text {
                for line in stderr.lines() {
                    sink.write_line(line);
                }
            }
        }
        LaunchError::TimedOut {
            limit_secs,
            elapsed_seconds,
        } => {
            sink.write_line(&format!(
                "❌ Benchmark stopped after {} seconds: time limit is {limit_secs}s",
                format_seconds(*elapsed_seconds)
            ));
        }
        other => sink.write_line(&format!("❌ Error running benchmark: {other}")),
    }
}

pub fn closing_in(sink: &mut impl OutputSink, remaining: u64) {
    sink.write_line(&format!("🔄 Closing in {remaining}..."));
}

pub fn goodbye(sink: &mut impl OutputSink) {
    sink.write_line("👋 Goodbye!");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ExecutionOutcome;

    #[test]
    fn test_failed_summary_includes_stderr() {
        let mut lines: Vec<String> = Vec::new();
        let report = LaunchReport::Failed(LaunchError::ChildProcessFailed {
            outcome: ExecutionOutcome::new(7, Some("first\nsecond\n".to_string()))
                .with_elapsed(2.31),
        });

        summary(
            &mut lines,
            &report,
            &LauncherConfig::default(),
            Path::new("/nonexistent"),
        );
        assert_eq!(
            lines,
            vec![
                "❌ Benchmark failed with exit code 7 after 2.3 seconds:",
                "first",
                "second",
            ]
        );
    }

    #[test]
    fn test_completed_summary_mentions_results_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = LauncherConfig::default();
        let report = LaunchReport::Completed(ExecutionOutcome::new(0, None).with_elapsed(4.0));

        let mut lines: Vec<String> = Vec::new();
        summary(&mut lines, &report, &config, dir.path());
        assert!(lines.iter().any(|l| l.contains("4.0 seconds")));
        assert!(lines.iter().any(|l| l.contains("was not found")));

        std::fs::write(dir.path().join(&config.results_file), "q,score\n").unwrap();
        let mut lines: Vec<String> = Vec::new();
        summary(&mut lines, &report, &config, dir.path());
        assert!(lines
            .iter()
            .any(|l| l.contains("Check benchmark_results.csv")));
    }
}
