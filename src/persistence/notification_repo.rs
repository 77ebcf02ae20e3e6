//! Notification repository for `SQLite` persistence.

use std::sync::Arc;

use tracing::warn;

use crate::models::agent::AgentRole;
use crate::models::notification::{Notification, NotificationType, PendingDelivery};
use crate::{AppError, Result};

use super::agent_repo::parse_role;
use super::db::{decode_ts, encode_ts, Database};

/// Repository for notification records.
#[derive(Clone)]
pub struct NotificationRepo {
    db: Arc<Database>,
}

/// Internal row struct for `SQLite` deserialization.
#[derive(sqlx::FromRow)]
struct NotificationRow {
    id: String,
    recipient_id: String,
    author_id: Option<String>,
    author_name: String,
    kind: String,
    message: String,
    source_task_id: Option<String>,
    read: i64,
    delivered: i64,
    created_at: String,
}

impl NotificationRow {
    fn into_notification(self) -> Result<Notification> {
        Ok(Notification {
            kind: parse_kind(&self.kind)?,
            created_at: decode_ts("created_at", &self.created_at)?,
            id: self.id,
            recipient_id: self.recipient_id,
            author_id: self.author_id,
            author_name: self.author_name,
            message: self.message,
            source_task_id: self.source_task_id,
            read: self.read != 0,
            delivered: self.delivered != 0,
        })
    }
}

/// Undelivered notification joined with recipient columns.
#[derive(sqlx::FromRow)]
struct PendingRow {
    #[sqlx(flatten)]
    notification: NotificationRow,
    recipient_name: Option<String>,
    session_key: Option<String>,
    recipient_role: Option<String>,
}

impl PendingRow {
    fn into_pending(self) -> Result<PendingDelivery> {
        let recipient_role = match self.recipient_role.as_deref() {
            Some(role) => parse_role(role)?,
            None => AgentRole::Generalist,
        };
        Ok(PendingDelivery {
            notification: self.notification.into_notification()?,
            recipient_name: self.recipient_name.unwrap_or_else(|| "Unknown".into()),
            session_key: self.session_key,
            recipient_role,
        })
    }
}

fn parse_kind(s: &str) -> Result<NotificationType> {
    match s {
        "mention" => Ok(NotificationType::Mention),
        "comment" => Ok(NotificationType::Comment),
        other => Err(AppError::Db(format!("invalid notification type: {other}"))),
    }
}

fn kind_str(kind: NotificationType) -> &'static str {
    match kind {
        NotificationType::Mention => "mention",
        NotificationType::Comment => "comment",
    }
}

impl NotificationRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert a new notification.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the insert fails.
    pub async fn insert(&self, notification: &Notification) -> Result<Notification> {
        sqlx::query(
            "INSERT INTO notification (id, recipient_id, author_id, author_name, kind, message,
                                       source_task_id, read, delivered, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )
        .bind(&notification.id)
        .bind(&notification.recipient_id)
        .bind(&notification.author_id)
        .bind(&notification.author_name)
        .bind(kind_str(notification.kind))
        .bind(&notification.message)
        .bind(&notification.source_task_id)
        .bind(i64::from(notification.read))
        .bind(i64::from(notification.delivered))
        .bind(encode_ts(&notification.created_at))
        .execute(self.db.as_ref())
        .await?;

        Ok(notification.clone())
    }

    /// Retrieve a notification by identifier.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn get(&self, id: &str) -> Result<Option<Notification>> {
        let row: Option<NotificationRow> = sqlx::query_as(
            "SELECT id, recipient_id, author_id, author_name, kind, message, source_task_id,
                    read, delivered, created_at
             FROM notification WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(self.db.as_ref())
        .await?;
        row.map(NotificationRow::into_notification).transpose()
    }

    /// Oldest undelivered notifications with recipient addressing data.
    ///
    /// Rows that fail to decode are logged and skipped so the rest of the
    /// page still goes out.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_undelivered(&self, limit: u32) -> Result<Vec<PendingDelivery>> {
        let rows: Vec<PendingRow> = sqlx::query_as(
            "SELECT n.id, n.recipient_id, n.author_id, n.author_name, n.kind, n.message,
                    n.source_task_id, n.read, n.delivered, n.created_at,
                    a.name AS recipient_name, a.session_key AS session_key,
                    a.role AS recipient_role
             FROM notification n LEFT JOIN agent a ON a.id = n.recipient_id
             WHERE n.delivered = 0
             ORDER BY n.created_at ASC, n.rowid ASC
             LIMIT ?1",
        )
        .bind(i64::from(limit))
        .fetch_all(self.db.as_ref())
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let notification_id = row.notification.id.clone();
                row.into_pending()
                    .map_err(|err| {
                        warn!(%notification_id, %err, "skipping undecodable notification");
                    })
                    .ok()
            })
            .collect())
    }

    /// Flag a notification as delivered. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the notification does not exist, or
    /// `AppError::Db` if the update fails.
    pub async fn mark_delivered(&self, id: &str) -> Result<()> {
        let result = sqlx::query("UPDATE notification SET delivered = 1 WHERE id = ?1")
            .bind(id)
            .execute(self.db.as_ref())
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("notification {id} not found")));
        }
        Ok(())
    }

    /// Notifications addressed to an agent, newest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_for_recipient(
        &self,
        recipient_id: &str,
        unread_only: bool,
        limit: u32,
    ) -> Result<Vec<Notification>> {
        let rows: Vec<NotificationRow> = sqlx::query_as(
            "SELECT id, recipient_id, author_id, author_name, kind, message, source_task_id,
                    read, delivered, created_at
             FROM notification
             WHERE recipient_id = ?1 AND (?2 = 0 OR read = 0)
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?3",
        )
        .bind(recipient_id)
        .bind(i64::from(unread_only))
        .bind(i64::from(limit))
        .fetch_all(self.db.as_ref())
        .await?;

        rows.into_iter()
            .map(NotificationRow::into_notification)
            .collect()
    }

    /// Mark one notification read. Independent of the delivered flag.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the notification does not exist, or
    /// `AppError::Db` if the update fails.
    pub async fn mark_read(&self, id: &str) -> Result<()> {
        let result = sqlx::query("UPDATE notification SET read = 1 WHERE id = ?1")
            .bind(id)
            .execute(self.db.as_ref())
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("notification {id} not found")));
        }
        Ok(())
    }

    /// Mark every notification of a recipient read. Returns the number changed.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the update fails.
    pub async fn mark_all_read(&self, recipient_id: &str) -> Result<u64> {
        let result =
            sqlx::query("UPDATE notification SET read = 1 WHERE recipient_id = ?1 AND read = 0")
                .bind(recipient_id)
                .execute(self.db.as_ref())
                .await?;
        Ok(result.rows_affected())
    }

    /// Fetch a recipient's unread notifications, newest first, and mark
    /// exactly those read.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if a query fails.
    pub async fn take_unread(&self, recipient_id: &str, limit: u32) -> Result<Vec<Notification>> {
        let unread = self.list_for_recipient(recipient_id, true, limit).await?;
        let mut tx = self.db.begin().await?;
        for notification in &unread {
            sqlx::query("UPDATE notification SET read = 1 WHERE id = ?1")
                .bind(&notification.id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(unread)
    }

    /// Count unread notifications of a recipient.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn count_unread(&self, recipient_id: &str) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM notification WHERE recipient_id = ?1 AND read = 0",
        )
        .bind(recipient_id)
        .fetch_one(self.db.as_ref())
        .await?;
        Ok(count)
    }
}
