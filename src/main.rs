use std::env;
use std::error::Error;
use std::net::TcpStream;
use std::path::PathBuf;
use std::process::{self, Command};
use std::time::Duration;

use llama_server_launcher::{presets, Launcher, ProcessState, ServerProcess};
use sysinfo::System;

fn main() {
    let args: Vec<String> = env::args().skip(1).collect();
    let help = args.iter().any(|a| a == "--help" || a == "-h");
    let kill_existing = args.iter().any(|a| a == "--kill-existing" || a == "-k");
    let wait_ready = wait_ready_secs(&args);
    let foreground = args.iter().any(|a| a == "--foreground" || a == "-f");

    let config_path = args
        .windows(2)
        .find(|w| w[0] == "--config" || w[0] == "-c")
        .map(|w| PathBuf::from(&w[1]));
    let preset_name = args
        .windows(2)
        .find(|w| w[0] == "--preset" || w[0] == "-p")
        .map(|w| w[1].clone());
    let binary = args
        .windows(2)
        .find(|w| w[0] == "--binary" || w[0] == "-b")
        .map(|w| PathBuf::from(&w[1]))
        .unwrap_or_else(|| PathBuf::from("llama-server"));

    if help {
        print_help();
        return;
    }

    let config = match (config_path, preset_name) {
        (Some(path), _) => match presets::load_file(&path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("\x1b[31mFailed to load {}: {e:#}\x1b[0m", path.display());
                process::exit(1);
            }
        },
        (None, Some(name)) => match presets::by_name(&name) {
            Some(config) => config,
            None => {
                eprintln!("\x1b[31mUnknown preset: {name}\x1b[0m");
                eprintln!("Valid presets: {}", presets::PRESET_NAMES.join(", "));
                process::exit(1);
            }
        },
        (None, None) => {
            eprintln!("\x1b[31mNeed --config <file.json> or --preset <name>\x1b[0m");
            eprintln!("Run with --help for usage.");
            process::exit(1);
        }
    };

    // 1. Optionally free the port
    if kill_existing {
        println!("\x1b[36m[1/3] Freeing port {}...\x1b[0m", config.port);
        if let Ok(port) = u16::try_from(config.port) {
            kill_port_holders(port);
            std::thread::sleep(Duration::from_secs(1));
        }
    } else {
        println!("\x1b[33m[1/3] Skipping port cleanup (use --kill-existing)\x1b[0m");
    }

    // 2. Start the server
    println!(
        "\x1b[36m[2/3] Starting {} on {}:{}...\x1b[0m",
        binary.display(),
        config.host,
        config.port
    );
    let launcher = Launcher::new();
    let mut server = match launcher.start(&config, &binary) {
        Ok(server) => server,
        Err(e) => {
            eprintln!("\x1b[31mFailed to start server: {e}\x1b[0m");
            let mut source = e.source();
            while let Some(cause) = source {
                eprintln!("  caused by: {cause}");
                source = cause.source();
            }
            process::exit(1);
        }
    };
    println!(
        "  PID {}  (stdout -> {}, stderr -> {})",
        server.pid(),
        server.outputs().stdout.display(),
        server.outputs().stderr.display()
    );

    // 3. Optionally wait for the HTTP endpoint
    if let Some(secs) = wait_ready {
        if let Ok(port) = u16::try_from(config.port) {
            println!(
                "\x1b[36m[3/3] Waiting up to {secs}s for {}:{port} to accept connections...\x1b[0m",
                config.host
            );
            wait_for_port(&config.host, port, secs);
        }
    } else {
        println!("\x1b[33m[3/3] Not waiting for readiness (use --wait-ready)\x1b[0m");
    }

    println!();
    println!(
        "\x1b[32mServer launched:\x1b[0m http://{}:{}",
        config.host, config.port
    );

    if foreground {
        println!("\x1b[90mSupervising in foreground. Exit code will be mirrored.\x1b[0m");
        supervise(&mut server);
    }
    // Detached by default: dropping the handle leaves the server running.
}

fn print_help() {
    println!("llama_launch: start and supervise a llama-server instance");
    println!();
    println!("Usage: llama_launch [OPTIONS]");
    println!();
    println!("Options:");
    println!("  -c, --config <FILE>   Load launch config from a JSON file");
    println!("  -p, --preset <NAME>   Use a named preset ({})", presets::PRESET_NAMES.join(", "));
    println!("  -b, --binary <PATH>   Server binary (default: llama-server from PATH)");
    println!("  -k, --kill-existing   Kill whatever currently holds the target port");
    println!("  -w, --wait-ready [SECS]");
    println!("                        Block until the server port accepts TCP connections,");
    println!("                        giving up after SECS seconds (default: {DEFAULT_READY_SECS})");
    println!("  -f, --foreground      Keep supervising; mirror the server's exit code");
    println!("  -h, --help            Show this help");
    println!();
    println!("Examples:");
    println!("  llama_launch --preset deepseek-r1-qwen14b --kill-existing --wait-ready");
    println!("  llama_launch --config server.json --binary ./bin/llama-server -f");
}

const DEFAULT_READY_SECS: u64 = 60;

/// `None` when `--wait-ready`/`-w` is absent; otherwise the timeout in
/// seconds. The value is optional: a following token that parses as a number
/// is taken as the timeout, anything else leaves the default in place.
fn wait_ready_secs(args: &[String]) -> Option<u64> {
    let at = args
        .iter()
        .position(|a| a == "--wait-ready" || a == "-w")?;
    Some(
        args.get(at + 1)
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_READY_SECS),
    )
}

/// Poll the handle until the server exits, then exit with its code.
fn supervise(server: &mut ServerProcess) -> ! {
    loop {
        match server.status() {
            ProcessState::Exited(code) => {
                println!("\x1b[33mServer exited (code {code:?})\x1b[0m");
                process::exit(code.unwrap_or(1));
            }
            ProcessState::Unknown => {
                eprintln!("\x1b[31mLost track of server process\x1b[0m");
                process::exit(1);
            }
            _ => std::thread::sleep(Duration::from_millis(500)),
        }
    }
}

/// Kill whatever is holding a TCP port by asking the OS.
fn kill_port_holders(port: u16) {
    let mut sys = System::new();
    sys.refresh_processes(sysinfo::ProcessesToUpdate::All, true);

    let pids = find_pids_on_port(port);
    if pids.is_empty() {
        println!("  Port {port} is free");
        return;
    }

    for pid in pids {
        let spid = sysinfo::Pid::from_u32(pid);
        if let Some(proc_) = sys.process(spid) {
            if proc_.kill() {
                println!(
                    "  Killed {} (PID {pid}) on port {port}",
                    proc_.name().to_string_lossy()
                );
            }
        }
    }
}

/// Ask the OS which processes hold a TCP port: `lsof` on Unix, `netstat` on
/// Windows, reduced to a deduplicated PID list.
fn find_pids_on_port(port: u16) -> Vec<u32> {
    let (shell, flag, script) = if cfg!(windows) {
        ("cmd", "/C", format!("netstat -ano -p TCP | findstr :{port}"))
    } else {
        ("sh", "-c", format!("lsof -t -i TCP:{port}"))
    };
    let Ok(output) = Command::new(shell).arg(flag).arg(&script).output() else {
        return vec![];
    };

    let text = String::from_utf8_lossy(&output.stdout);
    let mut pids: Vec<u32> = text.lines().filter_map(pid_on_line).collect();
    pids.sort_unstable();
    pids.dedup();
    pids
}

/// lsof prints a bare PID per line; netstat lines end in `... LISTENING <pid>`
/// and only listeners count as holding the port.
fn pid_on_line(line: &str) -> Option<u32> {
    if cfg!(windows) {
        let mut fields = line.split_whitespace().rev();
        let pid = fields.next()?.parse().ok()?;
        (fields.next()? == "LISTENING").then_some(pid)
    } else {
        line.trim().parse().ok()
    }
}

fn wait_for_port(host: &str, port: u16, timeout_secs: u64) {
    let start = std::time::Instant::now();
    let timeout = Duration::from_secs(timeout_secs);

    while start.elapsed() < timeout {
        if TcpStream::connect(format!("{host}:{port}")).is_ok() {
            return;
        }
        std::thread::sleep(Duration::from_millis(500));
    }
    eprintln!("\x1b[33mWarning: port {port} not ready after {timeout_secs}s\x1b[0m");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_wait_ready_absent() {
        assert_eq!(wait_ready_secs(&argv(&["--preset", "x"])), None);
    }

    #[test]
    fn test_wait_ready_defaults_without_value() {
        assert_eq!(
            wait_ready_secs(&argv(&["--wait-ready"])),
            Some(DEFAULT_READY_SECS)
        );
        // A following flag is not a timeout value.
        assert_eq!(
            wait_ready_secs(&argv(&["-w", "--foreground"])),
            Some(DEFAULT_READY_SECS)
        );
    }

    #[test]
    fn test_wait_ready_takes_explicit_seconds() {
        assert_eq!(wait_ready_secs(&argv(&["--wait-ready", "15"])), Some(15));
        assert_eq!(wait_ready_secs(&argv(&["-w", "120", "-f"])), Some(120));
    }

    #[cfg(not(windows))]
    #[test]
    fn test_pid_lines_parse_and_reject_noise() {
        assert_eq!(pid_on_line("12345"), Some(12345));
        assert_eq!(pid_on_line("  678 "), Some(678));
        assert_eq!(pid_on_line("not-a-pid"), None);
    }
}
