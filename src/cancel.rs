//! User-initiated cancellation.
//!
//! Cancellation requests are counted rather than latched: every request bumps
//! a counter, and each phase of a launch takes a [`CancelWatch`] that only
//! fires for requests made after it was created. A single Ctrl-C therefore
//! cancels the running benchmark, and the shutdown delay that follows can be
//! cut short by another one.

use log::debug;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Interrupts delivered to this process, bumped from the signal handler.
static SIGNAL_REQUESTS: AtomicUsize = AtomicUsize::new(0);

/// Granularity used when sleeping so a request is noticed promptly.
const SLEEP_SLICE: Duration = Duration::from_millis(20);

/// Install SIGINT and SIGTERM handlers that request cancellation.
/// The handler is async-signal-safe (only bumps an atomic).
#[cfg(unix)]
pub fn install_interrupt_handler() {
    unsafe {
        let mut sa: libc::sigaction = std::mem::zeroed();
        sa.sa_sigaction = interrupt_handler as *const () as usize;
        sa.sa_flags = libc::SA_RESTART;
        libc::sigemptyset(&mut sa.sa_mask);
        libc::sigaction(libc::SIGINT, &sa, std::ptr::null_mut());
        libc::sigaction(libc::SIGTERM, &sa, std::ptr::null_mut());
    }
    debug!("Installed interrupt handler");
}

#[cfg(unix)]
extern "C" fn interrupt_handler(_sig: libc::c_int) {
    SIGNAL_REQUESTS.fetch_add(1, Ordering::SeqCst);
}

#[cfg(not(unix))]
pub fn install_interrupt_handler() {}

/// Shared handle used to request and observe cancellation
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    requests: Arc<AtomicUsize>,
    follow_signals: bool,
}

impl CancellationToken {
    /// A token that only responds to [`CancellationToken::cancel`]
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that also responds to process interrupts.
    /// Call [`install_interrupt_handler`] for signals to actually arrive.
    pub fn with_signals() -> Self {
        Self {
            requests: Arc::new(AtomicUsize::new(0)),
            follow_signals: true,
        }
    }

    /// Request cancellation of whatever phase is currently watching
    pub fn cancel(&self) {
        self.requests.fetch_add(1, Ordering::SeqCst);
    }

    fn request_count(&self) -> usize {
        let local = self.requests.load(Ordering::SeqCst);
        if self.follow_signals {
            local + SIGNAL_REQUESTS.load(Ordering::SeqCst)
        } else {
            local
        }
    }

    /// Start observing requests made from now on
    pub fn watch(&self) -> CancelWatch {
        CancelWatch {
            token: self.clone(),
            baseline: self.request_count(),
        }
    }
}

/// Observes cancellation requests made after its creation
#[derive(Debug, Clone)]
pub struct CancelWatch {
    token: CancellationToken,
    baseline: usize,
}

impl CancelWatch {
    pub fn is_cancelled(&self) -> bool {
        self.token.request_count() > self.baseline
    }

    /// Sleep for `duration`, waking early on cancellation.
    /// Returns false if the sleep was cut short.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.is_cancelled() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep(SLEEP_SLICE.min(deadline - now));
        }
    }
}
