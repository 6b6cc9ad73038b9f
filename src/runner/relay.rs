use log::{debug, trace};
use std::io::{BufRead, BufReader, Read};
use std::process::Child;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread;
use std::time::Duration;

/// Something observed on the child's standard output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEvent {
    /// One complete line, without its terminator
    Line(String),
    /// The stream reached end of file
    Closed,
}

/// Reader threads draining a child's stdout (streamed) and stderr (captured).
///
/// Neither thread is ever joined: both report over channels, so the caller can
/// stop waiting on a pipe that some other process keeps open.
pub struct OutputRelay {
    events: Receiver<RelayEvent>,
    stderr: Receiver<String>,
}

impl OutputRelay {
    /// Take the child's piped streams and start reading them
    pub fn start(child: &mut Child) -> Self {
        let (tx, events) = mpsc::channel();
        match child.stdout.take() {
            Some(stdout) => {
                thread::spawn(move || relay_lines(stdout, tx));
            }
            None => {
                let _ = tx.send(RelayEvent::Closed);
            }
        }

        let (stderr_tx, stderr) = mpsc::channel();
        match child.stderr.take() {
            Some(stream) => {
                thread::spawn(move || {
                    let _ = stderr_tx.send(capture_stream(stream));
                });
            }
            None => {
                let _ = stderr_tx.send(String::new());
            }
        }

        Self { events, stderr }
    }

    /// Wait up to `timeout` for the next stdout event
    pub fn recv_timeout(&self, timeout: Duration) -> Result<RelayEvent, RecvTimeoutError> {
        self.events.recv_timeout(timeout)
    }

    /// Lines already read from stdout that nobody has received yet
    pub fn pending_lines(&self) -> Vec<String> {
        self.events
            .try_iter()
            .filter_map(|event| match event {
                RelayEvent::Line(line) => Some(line),
                RelayEvent::Closed => None,
            })
            .collect()
    }

    /// Everything the child wrote to stderr, once the stream has closed.
    /// Waits at most `timeout`; `None` means stderr is still open.
    pub fn stderr_timeout(&self, timeout: Duration) -> Option<String> {
        match self.stderr.recv_timeout(timeout) {
            Ok(text) => Some(text),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => {
                debug!("stderr reader thread exited without a result");
                Some(String::new())
            }
        }
    }

    /// Non-blocking form of [`OutputRelay::stderr_timeout`]
    pub fn try_stderr(&self) -> Option<String> {
        match self.stderr.try_recv() {
            Ok(text) => Some(text),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                debug!("stderr reader thread exited without a result");
                Some(String::new())
            }
        }
    }
}

/// Forward stdout line by line until EOF
fn relay_lines<R: Read>(stream: R, tx: Sender<RelayEvent>) {
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    let mut line_count = 0usize;

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {
                line_count += 1;
                let line = String::from_utf8_lossy(trim_line_ending(&buf)).into_owned();
                trace!("stdout:{line_count} - {line}");
                if tx.send(RelayEvent::Line(line)).is_err() {
                    // Receiver gone, nobody is listening anymore
                    return;
                }
            }
            Err(e) => {
                debug!("Error reading stdout after {line_count} lines: {e}");
                break;
            }
        }
    }

    debug!("Finished relaying stdout after {line_count} lines");
    let _ = tx.send(RelayEvent::Closed);
}

fn capture_stream<R: Read>(mut stream: R) -> String {
    let mut bytes = Vec::new();
    if let Err(e) = stream.read_to_end(&mut bytes) {
        debug!("Error reading stderr: {e}");
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

fn trim_line_ending(buf: &[u8]) -> &[u8] {
    let buf = buf.strip_suffix(b"\n").unwrap_or(buf);
    buf.strip_suffix(b"\r").unwrap_or(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::{Command, Stdio};

    #[test]
    fn test_trim_line_ending() {
        assert_eq!(trim_line_ending(b"abc\n"), b"abc");
        assert_eq!(trim_line_ending(b"abc\r\n"), b"abc");
        assert_eq!(trim_line_ending(b"abc"), b"abc");
        assert_eq!(trim_line_ending(b"\n"), b"");
    }

    #[test]
    fn test_relay_keeps_unterminated_last_line() {
        let (tx, rx) = mpsc::channel();
        relay_lines(&b"one\ntwo\nthree"[..], tx);

        let events: Vec<RelayEvent> = rx.iter().collect();
        assert_eq!(
            events,
            vec![
                RelayEvent::Line("one".to_string()),
                RelayEvent::Line("two".to_string()),
                RelayEvent::Line("three".to_string()),
                RelayEvent::Closed,
            ]
        );
    }

    #[test]
    fn test_relay_child_streams() {
        let mut child = Command::new("sh")
            .args(["-c", "echo out; echo err >&2"])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .unwrap();

        let relay = OutputRelay::start(&mut child);
        let timeout = Duration::from_secs(5);
        assert_eq!(
            relay.recv_timeout(timeout).unwrap(),
            RelayEvent::Line("out".to_string())
        );
        assert_eq!(relay.recv_timeout(timeout).unwrap(), RelayEvent::Closed);

        child.wait().unwrap();
        assert_eq!(relay.stderr_timeout(timeout).as_deref(), Some("err\n"));
    }

    #[test]
    fn test_stderr_held_open_is_reported_as_pending() {
        let mut child = Command::new("sh")
            .args(["-c", "echo held >&2; sleep 1"])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .unwrap();

        let relay = OutputRelay::start(&mut child);
        assert_eq!(relay.stderr_timeout(Duration::from_millis(100)), None);
        assert_eq!(relay.try_stderr(), None);

        child.wait().unwrap();
        assert_eq!(
            relay.stderr_timeout(Duration::from_secs(5)).as_deref(),
            Some("held\n")
        );
    }
}
