//! Launch and shutdown error taxonomy.
//!
//! Configuration mistakes surface as [`super::config::ConfigError`];
//! everything here is an OS/environment failure. All of it is returned to
//! the caller, never logged-and-swallowed, and none of it is retried
//! automatically — retry policy belongs to the caller.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use super::config::ConfigError;

#[derive(Debug, Error)]
pub enum LaunchError {
    /// A `LaunchConfig` invariant was violated. Reported synchronously,
    /// before any process is spawned.
    #[error("invalid launch configuration")]
    Config(#[from] ConfigError),

    /// A stdout/stderr destination could not be opened.
    #[error("cannot open output destination {path}")]
    OutputFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The OS could not create the process: missing binary, permission
    /// denied, resource exhaustion.
    #[error("failed to spawn server binary {binary}")]
    SpawnFailed {
        binary: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// `stop` only fails when even the forceful kill cannot be issued or the
/// child cannot be reaped. A graceful-shutdown timeout is not an error: it
/// escalates.
#[derive(Debug, Error)]
pub enum StopError {
    #[error("failed to kill server process")]
    KillFailed(#[source] io::Error),
    #[error("failed to reap server process")]
    WaitFailed(#[source] io::Error),
}
