//! Named launch presets and config-file loading.
//!
//! Operational setups that tend to accumulate as commented-out alternatives
//! in launch scripts live here as named constructors instead; anything else
//! loads from a JSON file.

use std::fs;
use std::path::Path;

use anyhow::Context;

use super::config::{KvCacheType, LaunchConfig};

/// Preset names accepted by [`by_name`].
pub const PRESET_NAMES: &[&str] = &["deepseek-r1-qwen14b"];

/// DeepSeek-R1-Distill-Qwen-14B (Q8_0) spread over three accelerators, full
/// 128K context, quantized KV cache.
pub fn deepseek_r1_qwen14b() -> LaunchConfig {
    LaunchConfig {
        model_path: "./models/deepseek/DeepSeek-R1-Distill-Qwen-14B-Q8_0.gguf".into(),
        host: "127.0.0.1".to_string(),
        port: 8080,
        gpu_layers: 60,
        tensor_split: vec![110.0, 445.0, 445.0],
        context_size: 131_072,
        ubatch_size: Some(1048),
        parallel_sequences: 2,
        cache_type_k: Some(KvCacheType::Q8_0),
        cache_type_v: Some(KvCacheType::Q8_0),
        flash_attention: true,
        no_kv_offload: true,
        continuous_batching: true,
        threads: None,
        priority: None,
        log_file: Some("logs/llama-server.log".into()),
        stdout_path: "logs/llama-server.stdout.log".into(),
        stderr_path: "logs/llama-server.stderr.log".into(),
    }
}

pub fn by_name(name: &str) -> Option<LaunchConfig> {
    match name {
        "deepseek-r1-qwen14b" => Some(deepseek_r1_qwen14b()),
        _ => None,
    }
}

/// Load a `LaunchConfig` from a JSON file.
pub fn load_file(path: &Path) -> anyhow::Result<LaunchConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("failed to parse config file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_preset_name_resolves() {
        for name in PRESET_NAMES {
            assert!(by_name(name).is_some(), "preset {name} should resolve");
        }
        assert!(by_name("no-such-preset").is_none());
    }

    #[test]
    fn test_config_file_round_trip() {
        let preset = deepseek_r1_qwen14b();
        let path = std::env::temp_dir()
            .join(format!("llama-launch-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, serde_json::to_string_pretty(&preset).unwrap()).unwrap();

        let loaded = load_file(&path).unwrap();
        assert_eq!(loaded, preset);

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_config_file_defaults_optionals() {
        let path = std::env::temp_dir()
            .join(format!("llama-launch-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(
            &path,
            r#"{
                "model_path": "model.gguf",
                "host": "0.0.0.0",
                "port": 9090,
                "gpu_layers": 0,
                "tensor_split": [1.0],
                "context_size": 8192,
                "parallel_sequences": 1,
                "stdout_path": "out.log",
                "stderr_path": "err.log"
            }"#,
        )
        .unwrap();

        let loaded = load_file(&path).unwrap();
        assert_eq!(loaded.ubatch_size, None);
        assert_eq!(loaded.cache_type_k, None);
        assert!(!loaded.flash_attention);
        assert_eq!(loaded.log_file, None);

        let _ = std::fs::remove_file(path);
    }
}
