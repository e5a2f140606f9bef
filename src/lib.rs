//! Typed launcher for the external `llama-server` inference binary.
//!
//! Replaces ad-hoc launch shell scripts with an explicit, validated
//! [`LaunchConfig`], a deterministic argument-vector rendering, and a
//! supervisable [`ServerProcess`] handle. The inference engine itself is an
//! opaque collaborator reached only through argv and its output streams.

pub mod launcher;
pub mod logger;

// Re-export the caller-facing surface at the crate root
pub use launcher::args::render;
pub use launcher::config::{ConfigError, KvCacheType, LaunchConfig};
pub use launcher::error::{LaunchError, StopError};
pub use launcher::presets;
pub use launcher::process::{OutputPaths, ProcessState, ServerProcess};
pub use launcher::spawn::{OsSpawner, ProcessSpawner};
pub use launcher::Launcher;
