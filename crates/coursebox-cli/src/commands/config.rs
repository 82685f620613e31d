//! Config command handlers
//!
//! Operates on the sync configuration side file next to the store image.

use anyhow::{bail, Context, Result};

use coursebox_core::sync::SyncConfig;
use coursebox_core::Config;

use crate::output::{Output, OutputFormat};

/// Show current sync configuration
pub fn show(config: &Config, output: &Output) -> Result<()> {
    let path = config.sync_config_path();
    let sync_config = SyncConfig::load(&path)?;

    match output.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&sync_config)?);
        }
        OutputFormat::Quiet => {
            println!("{}", sync_config.endpoint.as_deref().unwrap_or(""));
        }
        OutputFormat::Human => {
            println!("Configuration:");
            println!("  data_dir:         {}", config.data_dir.display());
            println!(
                "  endpoint:         {}",
                sync_config.endpoint.as_deref().unwrap_or("(not set)")
            );
            println!(
                "  credential:       {}",
                if sync_config.credential.is_some() {
                    "(set)"
                } else {
                    "(not set)"
                }
            );
            println!("  auto_sync:        {}", sync_config.auto_sync);
            println!("  interval_minutes: {}", sync_config.interval_minutes);
            println!("  timeout_secs:     {}", sync_config.timeout_secs);
            println!();
            println!("Sync config file: {}", path.display());
        }
    }

    Ok(())
}

/// Set a sync configuration value
pub fn set(config: &Config, key: String, value: String, output: &Output) -> Result<()> {
    let path = config.sync_config_path();
    let mut sync_config = SyncConfig::load(&path)?;

    match key.as_str() {
        "endpoint" => {
            sync_config.endpoint = none_if_empty(&value);
        }
        "credential" => {
            sync_config.credential = none_if_empty(&value);
        }
        "auto_sync" => {
            sync_config.auto_sync = value
                .parse()
                .context("Invalid value for auto_sync. Use 'true' or 'false'.")?;
        }
        "interval_minutes" => {
            sync_config.interval_minutes = value
                .parse()
                .context("Invalid value for interval_minutes. Use a number of minutes.")?;
        }
        "timeout_secs" => {
            sync_config.timeout_secs = value
                .parse()
                .context("Invalid value for timeout_secs. Use a number of seconds.")?;
        }
        _ => {
            bail!(
                "Unknown configuration key: '{}'\n\
                 Valid keys: endpoint, credential, auto_sync, interval_minutes, timeout_secs",
                key
            );
        }
    }

    sync_config.save(&path)?;
    output.success(&format!("Set {} = {}", key, value));
    Ok(())
}

fn none_if_empty(value: &str) -> Option<String> {
    if value.is_empty() || value == "none" {
        None
    } else {
        Some(value.to_string())
    }
}
