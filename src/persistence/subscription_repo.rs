//! Subscription directory backed by `SQLite`.
//!
//! Tracks which agents follow which task. The `(agent_id, task_id)` pair is
//! unique, so subscribing twice is a no-op that returns the original record.

use std::sync::Arc;

use crate::models::subscription::Subscription;
use crate::{AppError, Result};

use super::db::{decode_ts, encode_ts, Database};

/// Repository for subscription records.
#[derive(Clone)]
pub struct SubscriptionRepo {
    db: Arc<Database>,
}

/// Internal row struct for `SQLite` deserialization.
#[derive(sqlx::FromRow)]
struct SubscriptionRow {
    id: String,
    agent_id: String,
    task_id: String,
    subscribed_at: String,
}

impl SubscriptionRow {
    fn into_subscription(self) -> Result<Subscription> {
        Ok(Subscription {
            subscribed_at: decode_ts("subscribed_at", &self.subscribed_at)?,
            id: self.id,
            agent_id: self.agent_id,
            task_id: self.task_id,
        })
    }
}

impl SubscriptionRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Ensure `agent_id` follows `task_id`, returning the existing subscription
    /// when one is already present.
    ///
    /// Concurrent callers converge on a single row through the unique index.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if a query fails.
    pub async fn subscribe(&self, agent_id: &str, task_id: &str) -> Result<Subscription> {
        if let Some(existing) = self.find(agent_id, task_id).await? {
            return Ok(existing);
        }

        let fresh = Subscription::new(agent_id, task_id);
        sqlx::query(
            "INSERT INTO subscription (id, agent_id, task_id, subscribed_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(agent_id, task_id) DO NOTHING",
        )
        .bind(&fresh.id)
        .bind(&fresh.agent_id)
        .bind(&fresh.task_id)
        .bind(encode_ts(&fresh.subscribed_at))
        .execute(self.db.as_ref())
        .await?;

        self.find(agent_id, task_id).await?.ok_or_else(|| {
            AppError::Db(format!("subscription {agent_id}/{task_id} missing after insert"))
        })
    }

    /// Look up the subscription for a pair.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn find(&self, agent_id: &str, task_id: &str) -> Result<Option<Subscription>> {
        let row: Option<SubscriptionRow> = sqlx::query_as(
            "SELECT id, agent_id, task_id, subscribed_at FROM subscription
             WHERE agent_id = ?1 AND task_id = ?2",
        )
        .bind(agent_id)
        .bind(task_id)
        .fetch_optional(self.db.as_ref())
        .await?;
        row.map(SubscriptionRow::into_subscription).transpose()
    }

    /// Whether `agent_id` follows `task_id`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn is_subscribed(&self, agent_id: &str, task_id: &str) -> Result<bool> {
        Ok(self.find(agent_id, task_id).await?.is_some())
    }

    /// Agent ids following a task, in subscription order.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn subscribers(&self, task_id: &str) -> Result<Vec<String>> {
        let ids: Vec<(String,)> = sqlx::query_as(
            "SELECT agent_id FROM subscription WHERE task_id = ?1
             ORDER BY subscribed_at ASC, rowid ASC",
        )
        .bind(task_id)
        .fetch_all(self.db.as_ref())
        .await?;
        Ok(ids.into_iter().map(|(id,)| id).collect())
    }

    /// Subscriptions on a task, in subscription order.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_by_task(&self, task_id: &str) -> Result<Vec<Subscription>> {
        let rows: Vec<SubscriptionRow> = sqlx::query_as(
            "SELECT id, agent_id, task_id, subscribed_at FROM subscription
             WHERE task_id = ?1 ORDER BY subscribed_at ASC, rowid ASC",
        )
        .bind(task_id)
        .fetch_all(self.db.as_ref())
        .await?;
        rows.into_iter()
            .map(SubscriptionRow::into_subscription)
            .collect()
    }

    /// Subscriptions held by an agent, in subscription order.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_by_agent(&self, agent_id: &str) -> Result<Vec<Subscription>> {
        let rows: Vec<SubscriptionRow> = sqlx::query_as(
            "SELECT id, agent_id, task_id, subscribed_at FROM subscription
             WHERE agent_id = ?1 ORDER BY subscribed_at ASC, rowid ASC",
        )
        .bind(agent_id)
        .fetch_all(self.db.as_ref())
        .await?;
        rows.into_iter()
            .map(SubscriptionRow::into_subscription)
            .collect()
    }

    /// Stop following a task. Returns whether a subscription was removed.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the delete fails.
    pub async fn unsubscribe(&self, agent_id: &str, task_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM subscription WHERE agent_id = ?1 AND task_id = ?2")
            .bind(agent_id)
            .bind(task_id)
            .execute(self.db.as_ref())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Drop every subscription on a task. Returns the number removed.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the delete fails.
    pub async fn delete_for_task(&self, task_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM subscription WHERE task_id = ?1")
            .bind(task_id)
            .execute(self.db.as_ref())
            .await?;
        Ok(result.rows_affected())
    }
}
