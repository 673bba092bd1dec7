//! Status command handler

use anyhow::Result;

use shelf_core::sync::OutcomeKind;
use shelf_core::Store;

use crate::output::{Output, OutputFormat};

/// Show status information
pub async fn show(store: &Store, output: &Output) -> Result<()> {
    let counts = store.counts().await?;
    let config = store.config();
    let sync_state = store.load_sync_state();
    let db_size = std::fs::metadata(config.sqlite_path())
        .map(|m| m.len())
        .unwrap_or(0);

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "data_dir": config.data_dir,
                    "sync_enabled": config.sync_enabled,
                    "sync_url": config.sync_url,
                    "remote_selector": config.remote_selector,
                    "database_size": db_size,
                    "counts": counts,
                    "sync": sync_state
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", counts.books);
        }
        OutputFormat::Human => {
            println!("Shelf Status");
            println!("============");
            println!();
            println!("Sync:");
            println!(
                "  Status:    {}",
                if config.sync_enabled {
                    "enabled"
                } else {
                    "disabled"
                }
            );
            if let Some(ref url) = config.sync_url {
                println!("  Server:    {}", url);
            }
            if let Some(ref selector) = config.remote_selector {
                println!("  Selector:  {}", selector);
            }
            match sync_state.last_sync {
                Some(at) => {
                    let kind = match sync_state.last_outcome {
                        Some(OutcomeKind::Bootstrapped) => " (initial upload)",
                        _ => "",
                    };
                    println!("  Last sync: {}{}", at.format("%Y-%m-%d %H:%M:%S UTC"), kind);
                    println!("  Runs:      {}", sync_state.successful_runs);
                }
                None => println!("  Last sync: never"),
            }
            println!();
            println!("Storage:");
            println!("  Location: {}", config.data_dir.display());
            println!("  Database: {} KB", db_size / 1024);
            println!();
            println!("Contents:");
            println!("  Books:       {}", counts.books);
            println!("  Tags:        {}", counts.tags);
            println!("  Annotations: {}", counts.annotations);
            println!("  Sessions:    {}", counts.reading_sessions);
        }
    }

    Ok(())
}
