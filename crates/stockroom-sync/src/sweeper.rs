//! # Tombstone Retention Sweep
//!
//! Background task that purges tombstones older than the retention window.
//!
//! ```text
//!   every sweep_interval:
//!     cutoff = now - tombstone_retention_days
//!     DELETE FROM deleted_products WHERE deleted_at < cutoff
//! ```
//!
//! A client whose cursor is older than the window can no longer learn about
//! deletions from delta sync and has to resync from cursor 0.

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use stockroom_db::Database;

use crate::config::RetentionSettings;
use crate::error::SyncResult;

/// Runs one sweep. Returns the number of tombstones purged.
pub async fn sweep_once(db: &Database, settings: &RetentionSettings) -> SyncResult<u64> {
    let cutoff = Utc::now() - settings.retention();
    let purged = db.tombstones().purge_older_than(cutoff).await?;
    debug!(purged, cutoff = %cutoff, "Retention sweep finished");
    Ok(purged)
}

/// Spawns the periodic sweep. The first sweep runs right away.
pub fn spawn_sweeper(
    db: Database,
    settings: RetentionSettings,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            retention_days = settings.tombstone_retention_days,
            interval_secs = settings.sweep_interval_secs,
            "Tombstone sweeper started"
        );
        let mut ticker = tokio::time::interval(settings.sweep_interval());

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = sweep_once(&db, &settings).await {
                        warn!(error = %e, retryable = e.is_retryable(), "Retention sweep failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Tombstone sweeper stopped");
    })
}
