//! Process-creation seam.
//!
//! [`OsSpawner`] is the only spawner used outside tests; the trait exists so
//! tests can prove that a rejected configuration never reaches the OS.

use std::fs::File;
use std::io;
use std::path::Path;
use std::process::{Child, Command, Stdio};

pub trait ProcessSpawner {
    /// Create the server process with its stdout/stderr redirected to the
    /// given (already opened) destinations. Stdin is closed: the server is
    /// driven over HTTP, never over its stdin.
    fn spawn(
        &self,
        binary: &Path,
        argv: &[String],
        stdout: File,
        stderr: File,
    ) -> io::Result<Child>;
}

impl<S: ProcessSpawner + ?Sized> ProcessSpawner for &S {
    fn spawn(
        &self,
        binary: &Path,
        argv: &[String],
        stdout: File,
        stderr: File,
    ) -> io::Result<Child> {
        (**self).spawn(binary, argv, stdout, stderr)
    }
}

/// Spawns the real server via `std::process`.
#[derive(Clone, Copy, Debug, Default)]
pub struct OsSpawner;

impl ProcessSpawner for OsSpawner {
    fn spawn(
        &self,
        binary: &Path,
        argv: &[String],
        stdout: File,
        stderr: File,
    ) -> io::Result<Child> {
        Command::new(binary)
            .args(argv)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .spawn()
    }
}

/// Records spawn attempts and refuses to create a process.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct SpySpawner {
    pub calls: std::cell::Cell<usize>,
}

#[cfg(test)]
impl ProcessSpawner for SpySpawner {
    fn spawn(
        &self,
        _binary: &Path,
        _argv: &[String],
        _stdout: File,
        _stderr: File,
    ) -> io::Result<Child> {
        self.calls.set(self.calls.get() + 1);
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "spy spawner never creates processes",
        ))
    }
}
