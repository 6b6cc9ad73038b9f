use log::{debug, info, warn};
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::{Child, ExitStatus};
use std::sync::mpsc::RecvTimeoutError;
use std::thread;
use std::time::{Duration, Instant};

use crate::cancel::{CancelWatch, CancellationToken};
use crate::command::CommandExecutor;
use crate::error::LaunchError;
use crate::types::ExecutionOutcome;

mod relay;
pub use relay::{OutputRelay, RelayEvent};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);
const DEFAULT_TERMINATE_GRACE: Duration = Duration::from_secs(2);
const TERMINATE_CHECK_INTERVAL: Duration = Duration::from_millis(20);

/// Runs the benchmark child and relays its output while it runs.
///
/// The child gets its own process group; on cancellation or timeout the whole
/// group receives SIGTERM, and SIGKILL once the grace period runs out.
pub struct ProcessRunner {
    working_dir: Option<PathBuf>,
    poll_interval: Duration,
    terminate_grace: Duration,
    timeout: Option<Duration>,
    cancel: CancelWatch,
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self {
            working_dir: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            terminate_grace: DEFAULT_TERMINATE_GRACE,
            timeout: None,
            cancel: CancellationToken::new().watch(),
        }
    }

    pub fn working_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.working_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// How long to wait for output before re-checking liveness and cancellation
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Time between SIGTERM and SIGKILL when stopping the child. Also how long
    /// the child's pipes may stay open after it exits before its process group
    /// is stopped.
    pub fn terminate_grace(mut self, grace: Duration) -> Self {
        self.terminate_grace = grace;
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Stop the child when this watch fires
    pub fn cancel_on(mut self, watch: CancelWatch) -> Self {
        self.cancel = watch;
        self
    }

    /// Spawn `command args`, calling `on_output_line` for each stdout line as it
    /// arrives. Returns once both pipes are closed and the child has exited.
    ///
    /// Cancellation and the timeout are honoured until then, including while
    /// a process the child left behind keeps a pipe open. Such a process gets
    /// `terminate_grace` after the child exits before its group is stopped.
    pub fn run<F>(
        &self,
        command: &str,
        args: &[&str],
        mut on_output_line: F,
    ) -> Result<ExecutionOutcome, LaunchError>
    where
        F: FnMut(&str),
    {
        let executor = CommandExecutor::builder()
            .capture_output(true)
            .process_group(true)
            .working_dir(self.working_dir.as_ref())
            .build();

        let mut child = executor.launch_command(command, args)?;
        info!("Benchmark started with pid {}", child.id());

        let relay = OutputRelay::start(&mut child);
        let started = Instant::now();
        let mut stdout_open = true;
        let mut stderr_text: Option<String> = None;
        let mut status: Option<ExitStatus> = None;
        let mut exited_at: Option<Instant> = None;

        let (status, stderr) = loop {
            if self.cancel.is_cancelled() {
                info!("Cancellation requested, stopping pid {}", child.id());
                self.terminate(&mut child)?;
                return Err(LaunchError::Cancelled {
                    elapsed_seconds: Some(started.elapsed().as_secs_f64()),
                });
            }

            if let Some(limit) = self.timeout {
                if started.elapsed() >= limit {
                    warn!(
                        "Benchmark exceeded {}s, stopping pid {}",
                        limit.as_secs(),
                        child.id()
                    );
                    self.terminate(&mut child)?;
                    return Err(LaunchError::TimedOut {
                        limit_secs: limit.as_secs(),
                        elapsed_seconds: started.elapsed().as_secs_f64(),
                    });
                }
            }

            if stdout_open {
                match relay.recv_timeout(self.poll_interval) {
                    Ok(RelayEvent::Line(line)) => on_output_line(&line),
                    Ok(RelayEvent::Closed) | Err(RecvTimeoutError::Disconnected) => {
                        debug!("Benchmark stdout closed");
                        stdout_open = false;
                    }
                    Err(RecvTimeoutError::Timeout) => {}
                }
            } else {
                self.cancel.sleep(self.poll_interval);
            }

            if stderr_text.is_none() {
                stderr_text = relay.try_stderr();
            }

            if status.is_none() {
                status = child
                    .try_wait()
                    .map_err(|source| LaunchError::Wait { source })?;
                if status.is_some() {
                    exited_at = Some(Instant::now());
                }
            }

            let Some(exit_status) = status else {
                continue;
            };
            if !stdout_open {
                if let Some(text) = stderr_text.take() {
                    break (exit_status, text);
                }
            }

            // The benchmark is gone but something it started still holds a pipe
            if exited_at.is_some_and(|at| at.elapsed() >= self.terminate_grace) {
                warn!(
                    "pid {} exited but its output pipes are still open, stopping its process group",
                    child.id()
                );
                self.terminate(&mut child)?;
                for line in relay.pending_lines() {
                    on_output_line(&line);
                }
                let text = stderr_text
                    .take()
                    .or_else(|| relay.stderr_timeout(self.poll_interval))
                    .unwrap_or_default();
                break (exit_status, text);
            }
        };

        let exit_code = exit_code_of(status);
        info!("Benchmark exited with code {exit_code}");

        if exit_code == 0 {
            debug!(
                "Discarding {} bytes of stderr from successful run",
                stderr.len()
            );
            Ok(ExecutionOutcome::new(0, None))
        } else {
            Err(LaunchError::ChildProcessFailed {
                outcome: ExecutionOutcome::new(exit_code, Some(stderr)),
            })
        }
    }

    /// SIGTERM the child's process group, escalate to SIGKILL after the grace
    /// period, and reap the child. Works whether or not the child itself has
    /// already been reaped: the rest of its group is signalled either way.
    fn terminate(&self, child: &mut Child) -> Result<ExitStatus, LaunchError> {
        let pgid = child.id() as libc::pid_t;

        if let Err(e) = signal_group(pgid, libc::SIGTERM) {
            debug!("SIGTERM to process group {pgid} failed: {e}");
        }

        let deadline = Instant::now() + self.terminate_grace;
        loop {
            let reaped = child
                .try_wait()
                .map_err(|source| LaunchError::Wait { source })?;
            if let Some(status) = reaped {
                if !group_alive(pgid) {
                    debug!("Process group {pgid} exited after SIGTERM");
                    return Ok(status);
                }
            }
            if Instant::now() >= deadline {
                break;
            }
            thread::sleep(TERMINATE_CHECK_INTERVAL);
        }

        warn!("Process group {pgid} did not exit after SIGTERM, sending SIGKILL");
        if let Err(e) = signal_group(pgid, libc::SIGKILL) {
            debug!("SIGKILL to process group {pgid} failed: {e}");
        }
        // Ignore the error: the child may have exited between the checks
        let _ = child.kill();
        child.wait().map_err(|source| LaunchError::Wait { source })
    }
}

/// Send `signal` to every process in the group led by `pgid`
fn signal_group(pgid: libc::pid_t, signal: libc::c_int) -> std::io::Result<()> {
    let ret = unsafe { libc::kill(-pgid, signal) };
    if ret == -1 {
        Err(std::io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// Whether any process is left in the group (zombies included)
fn group_alive(pgid: libc::pid_t) -> bool {
    unsafe { libc::kill(-pgid, 0) == 0 }
}

/// Exit code, or 128 + signal number for signal deaths (shell convention)
fn exit_code_of(status: ExitStatus) -> i32 {
    status
        .code()
        .or_else(|| status.signal().map(|signal| 128 + signal))
        .unwrap_or(-1)
}
