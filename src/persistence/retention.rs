//! Retention service for time-based data purge.
//!
//! Runs as a background task deleting notifications that are both read and
//! delivered, and activity rows, once they are older than `retention_days`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::db::{encode_ts, Database};
use crate::Result;

const PURGE_INTERVAL: Duration = Duration::from_secs(3600);

/// Row counts removed by one purge pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeReport {
    /// Notifications deleted.
    pub notifications: u64,
    /// Activities deleted.
    pub activities: u64,
}

/// Spawn the retention purge background task.
///
/// The task runs hourly until `cancel` fires.
#[must_use]
pub fn spawn_retention_task(
    db: Arc<Database>,
    retention_days: u32,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(PURGE_INTERVAL);
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!("retention task shutting down");
                    break;
                }
                _ = interval.tick() => {
                    if let Err(err) = purge(&db, retention_days).await {
                        error!(?err, "retention purge failed");
                    }
                }
            }
        }
    })
}

/// Delete expired rows once.
///
/// Unread or undelivered notifications are kept regardless of age.
///
/// # Errors
///
/// Returns `AppError::Db` if a delete fails.
pub async fn purge(db: &Database, retention_days: u32) -> Result<PurgeReport> {
    let cutoff = Utc::now() - chrono::Duration::days(i64::from(retention_days));
    let cutoff_str = encode_ts(&cutoff);

    let notifications = sqlx::query(
        "DELETE FROM notification WHERE read = 1 AND delivered = 1 AND created_at < ?1",
    )
    .bind(&cutoff_str)
    .execute(db)
    .await?
    .rows_affected();

    let activities = sqlx::query("DELETE FROM activity WHERE created_at < ?1")
        .bind(&cutoff_str)
        .execute(db)
        .await?
        .rows_affected();

    info!(
        retention_days,
        notifications, activities, "retention purge completed"
    );
    Ok(PurgeReport {
        notifications,
        activities,
    })
}
