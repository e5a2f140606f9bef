//! Handle to a spawned server process.

use std::path::PathBuf;
use std::process::Child;
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};

use super::error::StopError;
use crate::{log_info, log_warn};

const STOP_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Lifecycle of a spawned server.
///
/// `Starting -> Running -> {Exited, Killed}`. There is no way back into
/// `Starting`; a failed start never produces a handle in the first place.
/// `Running -> Exited` is the server terminating on its own,
/// `Running -> Killed` is [`ServerProcess::stop`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProcessState {
    Starting,
    Running,
    /// The server exited on its own. `None` means it was terminated by a
    /// signal rather than returning an exit code.
    Exited(Option<i32>),
    /// Terminated by `stop`.
    Killed,
    /// The OS process query failed; the handle may be stale.
    Unknown,
}

/// Where the child's output streams end up. The launcher only routes these
/// to files; a caller that wants live tailing opens them independently.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputPaths {
    pub stdout: PathBuf,
    pub stderr: PathBuf,
    /// The server's own structured log, if one was configured.
    pub log_file: Option<PathBuf>,
}

/// Owned handle to the spawned server. Dropping it does NOT kill the child:
/// the server is detached from the caller's lifecycle by design, and only an
/// explicit [`ServerProcess::stop`] terminates it.
#[derive(Debug)]
pub struct ServerProcess {
    child: Child,
    pid: u32,
    started_at: DateTime<Local>,
    state: ProcessState,
    outputs: OutputPaths,
}

impl ServerProcess {
    pub(crate) fn new(child: Child, outputs: OutputPaths) -> Self {
        let pid = child.id();
        Self {
            child,
            pid,
            started_at: Local::now(),
            state: ProcessState::Starting,
            outputs,
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    pub fn outputs(&self) -> &OutputPaths {
        &self.outputs
    }

    /// Non-blocking state query. A child exiting non-zero is reported here,
    /// never as an error.
    pub fn status(&mut self) -> ProcessState {
        if matches!(self.state, ProcessState::Exited(_) | ProcessState::Killed) {
            return self.state;
        }
        match self.child.try_wait() {
            Ok(None) => {
                self.state = ProcessState::Running;
                self.state
            }
            Ok(Some(status)) => {
                self.state = ProcessState::Exited(status.code());
                self.state
            }
            // Don't latch Unknown: a later query may succeed.
            Err(_) => ProcessState::Unknown,
        }
    }

    /// Graceful-then-forceful shutdown.
    ///
    /// Requests termination (SIGTERM on Unix, so the server can flush its
    /// log file), waits up to `grace`, then escalates to a forceful kill and
    /// reaps the child. Blocks the calling thread for at most `grace` plus
    /// the reap. Idempotent: stopping an already-exited process succeeds
    /// without issuing any signal.
    pub fn stop(&mut self, grace: Duration) -> Result<(), StopError> {
        if matches!(
            self.status(),
            ProcessState::Exited(_) | ProcessState::Killed
        ) {
            return Ok(());
        }

        self.request_termination();

        let deadline = Instant::now() + grace;
        loop {
            match self.child.try_wait() {
                Ok(Some(_)) => {
                    log_info!("Server process {} stopped within grace period", self.pid);
                    self.state = ProcessState::Killed;
                    return Ok(());
                }
                Ok(None) => {}
                Err(source) => return Err(StopError::WaitFailed(source)),
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            thread::sleep(STOP_POLL_INTERVAL.min(remaining));
        }

        log_warn!(
            "Server process {} ignored termination request for {:?}, killing",
            self.pid,
            grace
        );
        self.child.kill().map_err(StopError::KillFailed)?;
        self.child.wait().map_err(StopError::WaitFailed)?;
        self.state = ProcessState::Killed;
        Ok(())
    }

    #[cfg(unix)]
    fn request_termination(&self) {
        // Best effort: if the signal cannot be delivered the kill below
        // settles it.
        unsafe {
            libc::kill(self.pid as libc::pid_t, libc::SIGTERM);
        }
    }

    /// Windows has no SIGTERM equivalent; `stop` escalates straight to the
    /// forceful kill once the grace period elapses.
    #[cfg(not(unix))]
    fn request_termination(&self) {}
}
