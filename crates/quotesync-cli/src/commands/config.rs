//! Config command handlers

use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};

use quotesync_core::Config;

use crate::output::{Output, OutputFormat};

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
                    "server_url": config.server_url,
                    "sync_enabled": config.sync_enabled,
                    "sync_interval_ms": config.sync_interval_ms,
                    "request_timeout_secs": config.request_timeout_secs,
                    "conflict_policy": config.conflict_policy,
                    "remote_mapping": config.remote_mapping,
                    "category_prefix_len": config.category_prefix_len,
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
            println!("  server_url:           {}", config.server_url);
            println!("  sync_enabled:         {}", config.sync_enabled);
            println!("  sync_interval_ms:     {}", config.sync_interval_ms);
            println!("  request_timeout_secs: {}", config.request_timeout_secs);
            println!("  conflict_policy:      {}", config.conflict_policy);
            println!("  remote_mapping:       {}", config.remote_mapping);
            println!("  category_prefix_len:  {}", config.category_prefix_len);
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
    match config_path {
        Some(path) => config.save_to_path(path),
        None => config.save(),
    }
    .context("Failed to save configuration")?;

    output.success(&format!("Set {} = {}", key, value));

    Ok(())
}

fn apply(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        "data_dir" => {
            config.data_dir = value.into();
        }
        "server_url" => {
            if value.is_empty() {
                bail!("server_url cannot be empty");
            }
            config.server_url = value.to_string();
        }
        "sync_enabled" => {
            config.sync_enabled = value
                .parse()
                .context("Invalid value for sync_enabled. Use 'true' or 'false'.")?;
        }
        "sync_interval_ms" => {
            config.sync_interval_ms = value
                .parse()
                .context("Invalid value for sync_interval_ms. Use milliseconds.")?;
        }
        "request_timeout_secs" => {
            config.request_timeout_secs = value
                .parse()
                .context("Invalid value for request_timeout_secs. Use seconds.")?;
        }
        "conflict_policy" => {
            config.conflict_policy = value.parse().map_err(|e: String| anyhow!(e))?;
        }
        "remote_mapping" => {
            config.remote_mapping = value.parse().map_err(|e: String| anyhow!(e))?;
        }
        "category_prefix_len" => {
            config.category_prefix_len = value
                .parse()
                .context("Invalid value for category_prefix_len.")?;
        }
        "log_file" => {
            config.log_file = if value.is_empty() || value == "none" {
                None
            } else {
                Some(value.into())
            };
        }
        _ => {
            bail!(
                "Unknown configuration key: '{}'\n\
                 Valid keys: data_dir, server_url, sync_enabled, sync_interval_ms, \
                 request_timeout_secs, conflict_policy, remote_mapping, \
                 category_prefix_len, log_file",
                key
            );
        }
    }
    Ok(())
}
