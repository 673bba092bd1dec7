//! Sync command handler

use anyhow::{bail, Result};
use tracing::debug;

use shelf_core::{Store, SyncError};

use crate::output::Output;

/// Sync with the remote metadata service
pub async fn sync(store: &Store, output: &Output) -> Result<()> {
    let config = store.config();

    let Some(ref sync_url) = config.sync_url else {
        bail!(
            "Sync URL not configured. Set it with:\n  \
             shelf config set sync_url https://your-server/api/library"
        );
    };

    if !config.sync_enabled {
        output.message("Note: automatic sync is disabled; syncing once on request.");
    }

    output.message(&format!("Syncing with {}...", sync_url));

    let engine = store.sync_engine()?;
    match engine.run_sync().await {
        Ok(outcome) => {
            output.print_sync_outcome(&outcome);
            let counts = store.counts().await?;
            output.message(&format!(
                "  Library: {} books, {} tags, {} annotations, {} sessions",
                counts.books, counts.tags, counts.annotations, counts.reading_sessions
            ));
            Ok(())
        }
        Err(e) => {
            if e.is_transient() {
                output.message("The remote could not be reached; local changes are kept.");
            }
            Err(e.into())
        }
    }
}

/// Sync quietly (for auto-sync) - no output on success
pub async fn sync_quiet(store: &Store) -> Result<(), SyncError> {
    let engine = store.sync_engine()?;
    let outcome = engine.run_sync().await?;
    debug!(
        "Auto-sync finished: bootstrap={}, pushed {} books",
        outcome.is_bootstrap(),
        outcome.push_report().books
    );
    Ok(())
}
