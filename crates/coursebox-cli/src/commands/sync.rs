//! Sync command handlers

use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};

use coursebox_core::sync::SyncConfig;
use coursebox_core::{ChangeLog, Config, HttpRemote, Store, SyncDirection, SyncEngine};

use crate::output::Output;

fn build_engine<'a>(
    store: &'a Store,
    config: &Config,
) -> Result<SyncEngine<'a, HttpRemote>> {
    let sync_config = SyncConfig::load(&config.sync_config_path())?;

    let Some(ref endpoint) = sync_config.endpoint else {
        bail!(
            "Sync endpoint not configured. Set it with:\n  \
             coursebox config set endpoint https://your-server/api"
        );
    };

    let remote = HttpRemote::new(
        endpoint,
        sync_config.credential.clone(),
        Duration::from_secs(sync_config.timeout_secs),
    )?;
    Ok(SyncEngine::new(
        store,
        remote,
        sync_config,
        config.sync_config_path(),
    ))
}

/// Run one sync pass against the remote endpoint
pub fn sync(
    store: &Store,
    config: &Config,
    direction: SyncDirection,
    output: &Output,
) -> Result<()> {
    let engine = build_engine(store, config)?;

    output.message("Syncing...");
    let result = engine.sync(direction);
    output.print_sync_result(&result);

    if !result.success {
        bail!("sync finished with {} error(s)", result.errors.len());
    }
    Ok(())
}

/// Reset failed changes to pending and re-upload them
pub fn retry(store: &Store, config: &Config, output: &Output) -> Result<()> {
    let engine = build_engine(store, config)?;

    let result = engine.retry_failed();
    output.print_sync_result(&result);

    if !result.success {
        bail!("retry finished with {} error(s)", result.errors.len());
    }
    Ok(())
}

/// Purge synced change-log records
pub fn clean(store: &Store, before: Option<String>, output: &Output) -> Result<()> {
    let cutoff: Option<DateTime<Utc>> = before
        .map(|raw| {
            DateTime::parse_from_rfc3339(&raw)
                .map(|dt| dt.with_timezone(&Utc))
                .with_context(|| format!("Invalid --before timestamp: '{}' (expected RFC 3339)", raw))
        })
        .transpose()?;

    let removed = ChangeLog::new(store).clean_synced(cutoff)?;
    output.success(&format!("Removed {} synced record(s)", removed));
    Ok(())
}
