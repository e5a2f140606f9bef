//! Launch configuration and validation.
//!
//! A [`LaunchConfig`] is built once by the caller (explicitly, never scraped
//! from the environment), validated, consumed by [`super::Launcher::start`]
//! and then discarded. It is plain immutable data.

use std::fmt;
use std::fs::File;
use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// KV cache storage types accepted by llama-server's `-ctk`/`-ctv` flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum KvCacheType {
    #[serde(rename = "f32")]
    F32,
    #[serde(rename = "f16")]
    F16,
    #[serde(rename = "bf16")]
    Bf16,
    #[serde(rename = "q8_0")]
    Q8_0,
    #[serde(rename = "q5_1")]
    Q5_1,
    #[serde(rename = "q5_0")]
    Q5_0,
    #[serde(rename = "q4_1")]
    Q4_1,
    #[serde(rename = "q4_0")]
    Q4_0,
}

impl KvCacheType {
    /// Wire name as the server binary expects it.
    pub fn as_str(self) -> &'static str {
        match self {
            KvCacheType::F32 => "f32",
            KvCacheType::F16 => "f16",
            KvCacheType::Bf16 => "bf16",
            KvCacheType::Q8_0 => "q8_0",
            KvCacheType::Q5_1 => "q5_1",
            KvCacheType::Q5_0 => "q5_0",
            KvCacheType::Q4_1 => "q4_1",
            KvCacheType::Q4_0 => "q4_0",
        }
    }
}

impl fmt::Display for KvCacheType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the server binary is started with.
///
/// `cache_type_k`/`cache_type_v` must be set together or not at all: the
/// server applies the quantization scheme independently to keys and values
/// and a half-configured cache is almost certainly operator error.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LaunchConfig {
    /// Path to the GGUF model artifact. Must exist at validation time.
    pub model_path: PathBuf,
    /// Bind address (hostname or IP literal).
    pub host: String,
    /// TCP port. Kept as `u32` so out-of-range values (e.g. 65536) survive
    /// deserialization long enough for `validate` to reject them.
    pub port: u32,
    /// Model layers offloaded to accelerator(s) (`-ngl`).
    pub gpu_layers: u32,
    /// Relative shard weights across accelerator devices (`-ts`). Length is
    /// the operator's business; entries must be non-negative, sum positive.
    pub tensor_split: Vec<f32>,
    /// Token context window (`--ctx-size`).
    pub context_size: u32,
    /// Micro-batch size for prompt processing (`-ub`).
    #[serde(default)]
    pub ubatch_size: Option<u32>,
    /// Max concurrent decode sequences (`-np`).
    pub parallel_sequences: u32,
    /// KV cache key quantization (`-ctk`).
    #[serde(default)]
    pub cache_type_k: Option<KvCacheType>,
    /// KV cache value quantization (`-ctv`).
    #[serde(default)]
    pub cache_type_v: Option<KvCacheType>,
    /// Fused-attention kernel path (`-fa`).
    #[serde(default)]
    pub flash_attention: bool,
    /// Keep the KV cache off accelerator memory (`-nkvo`).
    #[serde(default)]
    pub no_kv_offload: bool,
    /// Merge in-flight requests into shared batches (`-cb`).
    #[serde(default)]
    pub continuous_batching: bool,
    /// CPU worker thread count (`--threads`).
    #[serde(default)]
    pub threads: Option<u32>,
    /// Scheduling priority hint, 0 (normal) to 3 (realtime) (`--prio`).
    #[serde(default)]
    pub priority: Option<u8>,
    /// The server's own structured log (`--log-file`). Independent of the
    /// stdout/stderr redirection below.
    #[serde(default)]
    pub log_file: Option<PathBuf>,
    /// Child stdout destination. Truncated on every start.
    pub stdout_path: PathBuf,
    /// Child stderr destination. Truncated on every start.
    pub stderr_path: PathBuf,
}

/// Caller mistakes. Never retried automatically: retrying a misconfiguration
/// is meaningless.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("port {0} is outside the valid range 1-65535")]
    InvalidPort(u32),
    #[error("model file not found: {0}")]
    ModelFileNotFound(PathBuf),
    #[error("model file {path} is not readable")]
    ModelFileUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("tensor split must contain at least one positive entry")]
    TensorSplitAllZero,
    #[error("tensor split entry {0} is negative")]
    TensorSplitNegative(f32),
    #[error("tensor split entry {0} is not a finite number")]
    TensorSplitNotFinite(f32),
    #[error("context size must be positive")]
    InvalidContextSize,
    #[error("micro-batch size must be positive")]
    InvalidUbatchSize,
    #[error("cache_type_k and cache_type_v must be set together or omitted together")]
    IncompleteKvCacheQuant,
    #[error("parallel sequence count must be at least 1, got {0}")]
    InvalidParallelCount(u32),
    #[error("thread count must be positive")]
    InvalidThreadCount,
    #[error("scheduling priority {0} is outside the valid range 0-3")]
    InvalidPriority(u8),
}

impl LaunchConfig {
    /// Check every invariant, failing fast with the first violation. Has no
    /// side effects beyond reading model-file metadata.
    ///
    /// The model-file check here and the actual spawn are separated by a
    /// benign time-of-check/time-of-use gap; the spawn reports its own
    /// failure if the file vanishes in between.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 || self.port > 65535 {
            return Err(ConfigError::InvalidPort(self.port));
        }

        if !self.model_path.is_file() {
            return Err(ConfigError::ModelFileNotFound(self.model_path.clone()));
        }
        if let Err(source) = File::open(&self.model_path) {
            return Err(ConfigError::ModelFileUnreadable {
                path: self.model_path.clone(),
                source,
            });
        }

        for entry in &self.tensor_split {
            // NaN/inf would sail through the sign and sum checks below and
            // end up as a malformed -ts value on the command line.
            if !entry.is_finite() {
                return Err(ConfigError::TensorSplitNotFinite(*entry));
            }
            if *entry < 0.0 {
                return Err(ConfigError::TensorSplitNegative(*entry));
            }
        }
        // Also catches the empty split: an empty sum is not positive.
        if self.tensor_split.iter().sum::<f32>() <= 0.0 {
            return Err(ConfigError::TensorSplitAllZero);
        }

        if self.context_size == 0 {
            return Err(ConfigError::InvalidContextSize);
        }
        if self.ubatch_size == Some(0) {
            return Err(ConfigError::InvalidUbatchSize);
        }
        if self.cache_type_k.is_some() != self.cache_type_v.is_some() {
            return Err(ConfigError::IncompleteKvCacheQuant);
        }
        if self.parallel_sequences == 0 {
            return Err(ConfigError::InvalidParallelCount(self.parallel_sequences));
        }
        if self.threads == Some(0) {
            return Err(ConfigError::InvalidThreadCount);
        }
        if let Some(prio) = self.priority {
            if prio > 3 {
                return Err(ConfigError::InvalidPriority(prio));
            }
        }

        Ok(())
    }
}
