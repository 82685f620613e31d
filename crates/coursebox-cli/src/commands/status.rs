//! Status command handler

use anyhow::Result;

use coursebox_core::sync::SyncConfig;
use coursebox_core::{ChangeLog, Config, CoursewareRepo, QuestionRepo, Store};

use crate::output::{Output, OutputFormat};

/// Show store, entity and change-log status
pub fn show(store: &Store, config: &Config, output: &Output) -> Result<()> {
    let coursewares = CoursewareRepo::new(store).count()?;
    let questions = QuestionRepo::new(store).count()?;
    let stats = ChangeLog::new(store).stats()?;
    let sync_config = SyncConfig::load(&config.sync_config_path())?;

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "store_path": store.path(),
                    "coursewares": coursewares,
                    "questions": questions,
                    "changes": {
                        "pending": stats.pending,
                        "synced": stats.synced,
                        "failed": stats.failed
                    },
                    "endpoint": sync_config.endpoint,
                    "auto_sync": sync_config.auto_sync
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", stats.pending);
        }
        OutputFormat::Human => {
            println!("Store:       {}", store.path().display());
            println!("Coursewares: {}", coursewares);
            println!("Questions:   {}", questions);
            println!(
                "Endpoint:    {}",
                sync_config.endpoint.as_deref().unwrap_or("(not set)")
            );
            println!(
                "Auto-sync:   {}",
                if sync_config.auto_sync {
                    format!("every {} minute(s)", sync_config.interval_minutes)
                } else {
                    "off".to_string()
                }
            );
            println!();
            output.print_change_stats(&stats);
        }
    }

    Ok(())
}
