//! Config command handlers

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use shelf_core::Config;

use crate::output::{Output, OutputFormat};

const VALID_KEYS: &str = "data_dir, sync_url, sync_enabled, remote_selector, \
                          request_timeout_secs, push_batch_size, tag_collision, log_file";

/// Show current configuration
pub fn show(config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "data_dir": config.data_dir,
                    "sync_url": config.sync_url,
                    "sync_enabled": config.sync_enabled,
                    "remote_selector": config.remote_selector,
                    "request_timeout_secs": config.request_timeout_secs,
                    "push_batch_size": config.push_batch_size,
                    "tag_collision": config.tag_collision,
                    "log_file": config.log_file
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", config.data_dir.display());
        }
        OutputFormat::Human => {
            let effective_path = config_path
                .cloned()
                .unwrap_or_else(Config::config_file_path);
            println!("Configuration:");
            println!("  data_dir:             {}", config.data_dir.display());
            println!(
                "  sync_url:             {}",
                config.sync_url.as_deref().unwrap_or("(not set)")
            );
            println!("  sync_enabled:         {}", config.sync_enabled);
            println!(
                "  remote_selector:      {}",
                config.remote_selector.as_deref().unwrap_or("(not set)")
            );
            println!("  request_timeout_secs: {}", config.request_timeout_secs);
            println!("  push_batch_size:      {}", config.push_batch_size);
            println!("  tag_collision:        {}", config.tag_collision);
            println!(
                "  log_file:             {}",
                config
                    .log_file
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "(not set)".to_string())
            );
            println!();
            println!("Config file: {}", effective_path.display());
        }
    }

    Ok(())
}

/// Set a configuration value
pub fn set(
    key: String,
    value: String,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    let mut config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    apply(&mut config, &key, &value)?;

    // Save to the CLI-specified path or default
    let save_path = config_path
        .cloned()
        .unwrap_or_else(Config::config_file_path);
    config
        .save_to_path(&save_path)
        .context("Failed to save configuration")?;

    output.success(&format!("Set {} = {}", key, value));

    Ok(())
}

fn apply(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        "data_dir" => {
            config.data_dir = value.into();
        }
        "sync_url" => {
            config.sync_url = optional(value);
        }
        "sync_enabled" => {
            config.sync_enabled = value
                .parse()
                .context("Invalid value for sync_enabled. Use 'true' or 'false'.")?;
        }
        "remote_selector" => {
            config.remote_selector = optional(value);
        }
        "request_timeout_secs" => {
            let secs: u64 = value
                .parse()
                .context("Invalid value for request_timeout_secs. Use a number of seconds.")?;
            if secs == 0 {
                bail!("request_timeout_secs must be at least 1");
            }
            config.request_timeout_secs = secs;
        }
        "push_batch_size" => {
            let size: usize = value
                .parse()
                .context("Invalid value for push_batch_size. Use a positive number.")?;
            if size == 0 {
                bail!("push_batch_size must be at least 1");
            }
            config.push_batch_size = size;
        }
        "tag_collision" => {
            config.tag_collision = value.parse().map_err(|e| anyhow::anyhow!("{}", e))?;
        }
        "log_file" => {
            config.log_file = optional(value).map(PathBuf::from);
        }
        _ => {
            bail!(
                "Unknown configuration key: '{}'\nValid keys: {}",
                key,
                VALID_KEYS
            );
        }
    }
    Ok(())
}

/// Empty or "none" clears an optional setting
fn optional(value: &str) -> Option<String> {
    if value.is_empty() || value == "none" {
        None
    } else {
        Some(value.to_string())
    }
}
