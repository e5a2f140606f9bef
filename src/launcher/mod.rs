//! Launcher for the out-of-process inference server.
//!
//! The server runs as a separate child process for the usual reasons:
//! - Memory reclaim: kill the process to free all VRAM/RAM
//! - Crash isolation: a server crash doesn't take the caller down
//!
//! This module validates a [`LaunchConfig`], renders it into the server's
//! argument vector, spawns the binary detached from the caller's foreground
//! lifecycle and hands back a [`ServerProcess`] handle for supervision.

pub mod args;
pub mod config;
pub mod error;
pub mod presets;
pub mod process;
pub mod spawn;

use std::fs::{self, File};
use std::path::Path;

use crate::log_info;

use args::render;
use config::LaunchConfig;
use error::LaunchError;
use process::{OutputPaths, ServerProcess};
use spawn::{OsSpawner, ProcessSpawner};

/// Starts and hands out server processes. Stateless apart from the spawner;
/// each `start` call produces an independent handle, there is no registry.
#[derive(Debug)]
pub struct Launcher<S = OsSpawner> {
    spawner: S,
}

impl Launcher<OsSpawner> {
    pub fn new() -> Self {
        Self { spawner: OsSpawner }
    }
}

impl Default for Launcher<OsSpawner> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: ProcessSpawner> Launcher<S> {
    /// Use a custom process spawner (tests use a recording spy here).
    pub fn with_spawner(spawner: S) -> Self {
        Self { spawner }
    }

    /// Validate `config`, render it into argv and spawn `binary`.
    ///
    /// Returns as soon as the OS confirms process creation; the server's own
    /// readiness (its HTTP endpoint accepting connections) is deliberately
    /// not polled here and belongs to an external supervisor.
    ///
    /// The model-file existence check inside `validate` races against the
    /// spawn. The gap is accepted: if the file vanishes in between, the
    /// server binary fails on its own and that shows up via `status`.
    ///
    /// # Errors
    ///
    /// - [`LaunchError::Config`] for any invariant violation, before any
    ///   side effect occurs
    /// - [`LaunchError::OutputFile`] when a stdout/stderr destination cannot
    ///   be opened
    /// - [`LaunchError::SpawnFailed`] when the OS cannot create the process
    ///   (missing binary, permission denied, resource exhaustion)
    pub fn start(
        &self,
        config: &LaunchConfig,
        binary: &Path,
    ) -> Result<ServerProcess, LaunchError> {
        config.validate()?;
        let argv = render(config);

        let stdout = open_output(&config.stdout_path)?;
        let stderr = open_output(&config.stderr_path)?;

        log_info!("Starting {} {}", binary.display(), argv.join(" "));

        let child = self
            .spawner
            .spawn(binary, &argv, stdout, stderr)
            .map_err(|source| LaunchError::SpawnFailed {
                binary: binary.to_path_buf(),
                source,
            })?;

        log_info!("Server process started (pid {})", child.id());

        Ok(ServerProcess::new(
            child,
            OutputPaths {
                stdout: config.stdout_path.clone(),
                stderr: config.stderr_path.clone(),
                log_file: config.log_file.clone(),
            },
        ))
    }
}

/// Open a child output destination, truncating any previous contents so
/// repeated restarts don't grow old logs without bound.
fn open_output(path: &Path) -> Result<File, LaunchError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|source| LaunchError::OutputFile {
                path: path.to_path_buf(),
                source,
            })?;
        }
    }
    File::create(path).map_err(|source| LaunchError::OutputFile {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{ConfigError, LaunchConfig};
    use spawn::SpySpawner;
    use std::path::PathBuf;

    fn temp_path(suffix: &str) -> PathBuf {
        std::env::temp_dir().join(format!("llama-launch-{}{suffix}", uuid::Uuid::new_v4()))
    }

    fn valid_config() -> (LaunchConfig, PathBuf) {
        let model = temp_path(".gguf");
        std::fs::write(&model, b"stub model").unwrap();
        let config = LaunchConfig {
            model_path: model.clone(),
            host: "127.0.0.1".to_string(),
            port: 8080,
            gpu_layers: 0,
            tensor_split: vec![1.0],
            context_size: 4096,
            ubatch_size: None,
            parallel_sequences: 1,
            cache_type_k: None,
            cache_type_v: None,
            flash_attention: false,
            no_kv_offload: false,
            continuous_batching: false,
            threads: None,
            priority: None,
            log_file: None,
            stdout_path: temp_path(".stdout.log"),
            stderr_path: temp_path(".stderr.log"),
        };
        (config, model)
    }

    #[test]
    fn test_invalid_config_never_spawns() {
        let (mut config, model) = valid_config();
        config.tensor_split = vec![0.0, 0.0];

        let spy = SpySpawner::default();
        let launcher = Launcher::with_spawner(&spy);
        let result = launcher.start(&config, Path::new("llama-server"));

        assert!(matches!(
            result,
            Err(LaunchError::Config(ConfigError::TensorSplitAllZero))
        ));
        assert_eq!(spy.calls.get(), 0);
        let _ = std::fs::remove_file(model);
    }

    #[test]
    fn test_missing_model_never_spawns() {
        let (mut config, model) = valid_config();
        std::fs::remove_file(&model).unwrap();
        config.model_path = model;

        let spy = SpySpawner::default();
        let launcher = Launcher::with_spawner(&spy);
        let result = launcher.start(&config, Path::new("llama-server"));

        assert!(matches!(
            result,
            Err(LaunchError::Config(ConfigError::ModelFileNotFound(_)))
        ));
        assert_eq!(spy.calls.get(), 0);
    }

    #[test]
    fn test_missing_binary_is_spawn_failed() {
        let (config, model) = valid_config();
        let binary = temp_path("-no-such-binary");

        let launcher = Launcher::new();
        let result = launcher.start(&config, &binary);

        assert!(matches!(result, Err(LaunchError::SpawnFailed { .. })));
        let _ = std::fs::remove_file(model);
    }

    #[test]
    fn test_output_files_are_truncated() {
        let (config, model) = valid_config();
        std::fs::write(&config.stdout_path, b"stale output from a previous run").unwrap();

        let spy = SpySpawner::default();
        let launcher = Launcher::with_spawner(&spy);
        // The spy refuses to spawn, but the outputs are opened first.
        let _ = launcher.start(&config, Path::new("llama-server"));

        assert_eq!(spy.calls.get(), 1);
        assert!(std::fs::read(&config.stdout_path).unwrap().is_empty());
        let _ = std::fs::remove_file(model);
        let _ = std::fs::remove_file(&config.stdout_path);
        let _ = std::fs::remove_file(&config.stderr_path);
    }

    #[cfg(unix)]
    #[test]
    fn test_start_returns_before_child_finishes() {
        let (config, model) = valid_config();

        // /bin/sleep rejects the rendered flags and exits quickly, which is
        // enough to prove that spawn success is reported immediately and the
        // exit surfaces through status, not through start.
        let launcher = Launcher::new();
        let mut server = launcher
            .start(&config, Path::new("/bin/sleep"))
            .expect("spawn should succeed");
        assert!(server.pid() > 0);

        let mut state = server.status();
        for _ in 0..100 {
            if matches!(state, process::ProcessState::Exited(_)) {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(20));
            state = server.status();
        }
        assert!(matches!(state, process::ProcessState::Exited(_)));

        let _ = std::fs::remove_file(model);
        let _ = std::fs::remove_file(&config.stdout_path);
        let _ = std::fs::remove_file(&config.stderr_path);
    }
}
