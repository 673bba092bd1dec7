//! Logging setup
//!
//! Level comes from SHELF_LOG (default "warn"); `--verbose` raises it to
//! debug. Logs go to stderr unless `log_file` is configured.

use std::fs::OpenOptions;
use std::sync::Mutex;

use tracing::debug;
use tracing_subscriber::EnvFilter;

use shelf_core::Config;

const DEFAULT_LEVEL: &str = "warn";

/// Initialize the global subscriber (ignores repeated initialization)
pub fn init(config: &Config, verbose: bool) {
    let level = log_level(std::env::var("SHELF_LOG").ok(), verbose);
    let env_filter = EnvFilter::new(format!("shelf_core={},shelf_cli={}", level, level));

    if let Some(ref log_path) = config.log_file {
        let file = OpenOptions::new().create(true).append(true).open(log_path);
        match file {
            Ok(file) => {
                let _ = tracing_subscriber::fmt()
                    .with_env_filter(env_filter)
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .try_init();
                debug!("Logging to {:?}", log_path);
                return;
            }
            Err(e) => {
                eprintln!("Warning: Could not open log file {:?}: {}", log_path, e);
            }
        }
    }

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn log_level(from_env: Option<String>, verbose: bool) -> String {
    if verbose {
        return "debug".to_string();
    }
    from_env
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .unwrap_or_else(|| DEFAULT_LEVEL.to_string())
}
