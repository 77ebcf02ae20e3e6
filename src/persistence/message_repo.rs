//! Task comment repository for `SQLite` persistence.

use std::sync::Arc;

use crate::models::message::{Message, MessageView};
use crate::Result;

use super::db::{decode_ts, encode_ts, Database};

/// Repository for task comments.
#[derive(Clone)]
pub struct MessageRepo {
    db: Arc<Database>,
}

/// Internal row struct for `SQLite` deserialization.
#[derive(sqlx::FromRow)]
struct MessageRow {
    id: String,
    task_id: String,
    from_agent_id: String,
    content: String,
    created_at: String,
    agent_name: Option<String>,
}

impl MessageRow {
    fn into_view(self) -> Result<MessageView> {
        Ok(MessageView {
            message: Message {
                created_at: decode_ts("created_at", &self.created_at)?,
                id: self.id,
                task_id: self.task_id,
                from_agent_id: self.from_agent_id,
                content: self.content,
            },
            agent_name: self.agent_name.unwrap_or_else(|| "Unknown".into()),
        })
    }
}

impl MessageRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert a new comment.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the insert fails.
    pub async fn insert(&self, message: &Message) -> Result<Message> {
        sqlx::query(
            "INSERT INTO message (id, task_id, from_agent_id, content, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&message.id)
        .bind(&message.task_id)
        .bind(&message.from_agent_id)
        .bind(&message.content)
        .bind(encode_ts(&message.created_at))
        .execute(self.db.as_ref())
        .await?;

        Ok(message.clone())
    }

    /// Comments on a task in posting order, with author names.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_by_task(&self, task_id: &str) -> Result<Vec<MessageView>> {
        let rows: Vec<MessageRow> = sqlx::query_as(
            "SELECT m.id, m.task_id, m.from_agent_id, m.content, m.created_at,
                    a.name AS agent_name
             FROM message m LEFT JOIN agent a ON a.id = m.from_agent_id
             WHERE m.task_id = ?1
             ORDER BY m.created_at ASC, m.rowid ASC",
        )
        .bind(task_id)
        .fetch_all(self.db.as_ref())
        .await?;

        rows.into_iter().map(MessageRow::into_view).collect()
    }

    /// Delete one comment. Returns whether a row was removed.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the delete fails.
    pub async fn remove(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM message WHERE id = ?1")
            .bind(id)
            .execute(self.db.as_ref())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete every comment on a task. Returns the number removed.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the delete fails.
    pub async fn delete_for_task(&self, task_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM message WHERE task_id = ?1")
            .bind(task_id)
            .execute(self.db.as_ref())
            .await?;
        Ok(result.rows_affected())
    }
}
