//! Deterministic rendering of a [`LaunchConfig`] into the server's argv.

use super::config::LaunchConfig;

/// Render `config` into the argument vector for the server binary.
///
/// Pure function: no filesystem access, no process creation. The flag order
/// is fixed so that two renders of equal configs are identical and launch
/// command lines stay diffable across restarts:
///
/// `--model`, `--port`, `--host`, `-ngl`, `--ctx-size`, [`-ctk` `-ctv`],
/// [`-ub`], `-ts`, [`-fa`], [`-nkvo`], [`-cb`], `-np`, [`--threads`],
/// [`--prio`], and when a log file is configured the trailing group
/// `--log-file <path> --log-timestamps --log-verbose --log-colors --verbose`.
///
/// Unset optional fields are omitted entirely.
pub fn render(config: &LaunchConfig) -> Vec<String> {
    let mut argv: Vec<String> = Vec::new();

    argv.push("--model".to_string());
    argv.push(config.model_path.display().to_string());
    argv.push("--port".to_string());
    argv.push(config.port.to_string());
    argv.push("--host".to_string());
    argv.push(config.host.clone());
    argv.push("-ngl".to_string());
    argv.push(config.gpu_layers.to_string());
    argv.push("--ctx-size".to_string());
    argv.push(config.context_size.to_string());

    // validate() guarantees both-or-neither; render stays total regardless.
    if let (Some(k), Some(v)) = (config.cache_type_k, config.cache_type_v) {
        argv.push("-ctk".to_string());
        argv.push(k.to_string());
        argv.push("-ctv".to_string());
        argv.push(v.to_string());
    }

    if let Some(ubatch) = config.ubatch_size {
        argv.push("-ub".to_string());
        argv.push(ubatch.to_string());
    }

    argv.push("-ts".to_string());
    argv.push(
        config
            .tensor_split
            .iter()
            .map(|weight| format_split_weight(*weight))
            .collect::<Vec<_>>()
            .join(","),
    );

    if config.flash_attention {
        argv.push("-fa".to_string());
    }
    if config.no_kv_offload {
        argv.push("-nkvo".to_string());
    }
    if config.continuous_batching {
        argv.push("-cb".to_string());
    }

    argv.push("-np".to_string());
    argv.push(config.parallel_sequences.to_string());

    if let Some(threads) = config.threads {
        argv.push("--threads".to_string());
        argv.push(threads.to_string());
    }
    if let Some(priority) = config.priority {
        argv.push("--prio".to_string());
        argv.push(priority.to_string());
    }

    // The log decorations only matter when the structured log exists, so
    // they ride along with --log-file.
    if let Some(ref log_file) = config.log_file {
        argv.push("--log-file".to_string());
        argv.push(log_file.display().to_string());
        argv.push("--log-timestamps".to_string());
        argv.push("--log-verbose".to_string());
        argv.push("--log-colors".to_string());
        argv.push("--verbose".to_string());
    }

    argv
}

/// Integral weights print without a fractional part (`110`, not `110.0`),
/// matching how operators write `-ts` by hand.
fn format_split_weight(weight: f32) -> String {
    if weight.fract() == 0.0 {
        format!("{weight:.0}")
    } else {
        weight.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::super::config::{KvCacheType, LaunchConfig};
    use super::*;
    use std::path::PathBuf;

    fn deepseek_config() -> LaunchConfig {
        LaunchConfig {
            model_path: PathBuf::from("./models/deepseek/DeepSeek-R1-Distill-Qwen-14B-Q8_0.gguf"),
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
            log_file: None,
            stdout_path: PathBuf::from("logs/server.stdout.log"),
            stderr_path: PathBuf::from("logs/server.stderr.log"),
        }
    }

    #[test]
    fn test_render_full_flag_order() {
        let argv = render(&deepseek_config());
        let expected: Vec<String> = [
            "--model",
            "./models/deepseek/DeepSeek-R1-Distill-Qwen-14B-Q8_0.gguf",
            "--port",
            "8080",
            "--host",
            "127.0.0.1",
            "-ngl",
            "60",
            "--ctx-size",
            "131072",
            "-ctk",
            "q8_0",
            "-ctv",
            "q8_0",
            "-ub",
            "1048",
            "-ts",
            "110,445,445",
            "-fa",
            "-nkvo",
            "-cb",
            "-np",
            "2",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        assert_eq!(argv, expected);
    }

    #[test]
    fn test_render_is_deterministic() {
        let config = deepseek_config();
        assert_eq!(render(&config), render(&config));
    }

    #[test]
    fn test_unset_optionals_are_omitted() {
        let mut config = deepseek_config();
        config.ubatch_size = None;
        config.cache_type_k = None;
        config.cache_type_v = None;
        config.flash_attention = false;
        config.no_kv_offload = false;
        config.continuous_batching = false;

        let argv = render(&config);
        for flag in ["-ub", "-ctk", "-ctv", "-fa", "-nkvo", "-cb"] {
            assert!(!argv.contains(&flag.to_string()), "{flag} should be absent");
        }
    }

    #[test]
    fn test_log_file_brings_log_decorations() {
        let mut config = deepseek_config();
        config.log_file = Some(PathBuf::from("logs/llama-server.log"));
        config.threads = Some(12);
        config.priority = Some(2);

        let argv = render(&config);
        let expected = [
            "--threads",
            "12",
            "--prio",
            "2",
            "--log-file",
            "logs/llama-server.log",
            "--log-timestamps",
            "--log-verbose",
            "--log-colors",
            "--verbose",
        ];
        let tail: Vec<&str> = argv[argv.len() - expected.len()..]
            .iter()
            .map(String::as_str)
            .collect();
        assert_eq!(tail, expected);
    }

    #[test]
    fn test_fractional_split_weights_keep_fraction() {
        let mut config = deepseek_config();
        config.tensor_split = vec![0.5, 1.5];
        let argv = render(&config);
        let ts_pos = argv.iter().position(|a| a == "-ts").unwrap();
        assert_eq!(argv[ts_pos + 1], "0.5,1.5");
    }
}
