//! Task repository for `SQLite` persistence.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::models::task::{Task, TaskPriority, TaskStatus};
use crate::{AppError, Result};

use super::db::{decode_list, decode_ts, encode_list, encode_ts, Database};

const SELECT_TASK: &str = "SELECT id, title, description, status, priority, tags, assignee_ids, \
                           creator_id, created_at, updated_at FROM task";

/// Repository for task records.
#[derive(Clone)]
pub struct TaskRepo {
    db: Arc<Database>,
}

/// Internal row struct for `SQLite` deserialization.
#[derive(sqlx::FromRow)]
struct TaskRow {
    id: String,
    title: String,
    description: Option<String>,
    status: String,
    priority: String,
    tags: String,
    assignee_ids: String,
    creator_id: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TaskRow {
    fn into_task(self) -> Result<Task> {
        Ok(Task {
            status: parse_status(&self.status)?,
            priority: parse_priority(&self.priority)?,
            tags: decode_list("tags", &self.tags)?,
            assignee_ids: decode_list("assignee_ids", &self.assignee_ids)?,
            created_at: decode_ts("created_at", &self.created_at)?,
            updated_at: decode_ts("updated_at", &self.updated_at)?,
            id: self.id,
            title: self.title,
            description: self.description,
            creator_id: self.creator_id,
        })
    }
}

fn parse_status(s: &str) -> Result<TaskStatus> {
    match s {
        "inbox" => Ok(TaskStatus::Inbox),
        "assigned" => Ok(TaskStatus::Assigned),
        "in_progress" => Ok(TaskStatus::InProgress),
        "review" => Ok(TaskStatus::Review),
        "done" => Ok(TaskStatus::Done),
        other => Err(AppError::Db(format!("invalid task status: {other}"))),
    }
}

fn parse_priority(s: &str) -> Result<TaskPriority> {
    match s {
        "low" => Ok(TaskPriority::Low),
        "medium" => Ok(TaskPriority::Medium),
        "high" => Ok(TaskPriority::High),
        "urgent" => Ok(TaskPriority::Urgent),
        other => Err(AppError::Db(format!("invalid task priority: {other}"))),
    }
}

fn priority_str(priority: TaskPriority) -> &'static str {
    match priority {
        TaskPriority::Low => "low",
        TaskPriority::Medium => "medium",
        TaskPriority::High => "high",
        TaskPriority::Urgent => "urgent",
    }
}

impl TaskRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert a new task.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the insert fails.
    pub async fn insert(&self, task: &Task) -> Result<Task> {
        sqlx::query(
            "INSERT INTO task (id, title, description, status, priority, tags, assignee_ids,
                               creator_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )
        .bind(&task.id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.status.as_str())
        .bind(priority_str(task.priority))
        .bind(encode_list(&task.tags)?)
        .bind(encode_list(&task.assignee_ids)?)
        .bind(&task.creator_id)
        .bind(encode_ts(&task.created_at))
        .bind(encode_ts(&task.updated_at))
        .execute(self.db.as_ref())
        .await?;

        Ok(task.clone())
    }

    /// Retrieve a task by identifier.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn get(&self, id: &str) -> Result<Option<Task>> {
        let row: Option<TaskRow> = sqlx::query_as(&format!("{SELECT_TASK} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(self.db.as_ref())
            .await?;
        row.map(TaskRow::into_task).transpose()
    }

    /// Persist every mutable field of `task` and stamp `updated_at`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the task does not exist, or
    /// `AppError::Db` if the update fails.
    pub async fn save(&self, task: &Task) -> Result<Task> {
        let mut saved = task.clone();
        saved.updated_at = Utc::now();

        let result = sqlx::query(
            "UPDATE task SET title = ?1, description = ?2, status = ?3, priority = ?4,
                             tags = ?5, assignee_ids = ?6, updated_at = ?7
             WHERE id = ?8",
        )
        .bind(&saved.title)
        .bind(&saved.description)
        .bind(saved.status.as_str())
        .bind(priority_str(saved.priority))
        .bind(encode_list(&saved.tags)?)
        .bind(encode_list(&saved.assignee_ids)?)
        .bind(encode_ts(&saved.updated_at))
        .bind(&saved.id)
        .execute(self.db.as_ref())
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("task {} not found", task.id)));
        }
        Ok(saved)
    }

    /// Delete a task row. Returns whether a row was removed.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the delete fails.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM task WHERE id = ?1")
            .bind(id)
            .execute(self.db.as_ref())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// List tasks, newest first, optionally filtered by stored status.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list(&self, status: Option<TaskStatus>) -> Result<Vec<Task>> {
        let rows: Vec<TaskRow> = if let Some(status) = status {
            sqlx::query_as(&format!(
                "{SELECT_TASK} WHERE status = ?1 ORDER BY created_at DESC, rowid DESC"
            ))
            .bind(status.as_str())
            .fetch_all(self.db.as_ref())
            .await?
        } else {
            sqlx::query_as(&format!("{SELECT_TASK} ORDER BY created_at DESC, rowid DESC"))
                .fetch_all(self.db.as_ref())
                .await?
        };
        rows.into_iter().map(TaskRow::into_task).collect()
    }

    /// Tasks whose assignee list contains `agent_id`, newest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_for_assignee(&self, agent_id: &str) -> Result<Vec<Task>> {
        let rows: Vec<TaskRow> = sqlx::query_as(&format!(
            "{SELECT_TASK} WHERE EXISTS (SELECT 1 FROM json_each(task.assignee_ids) WHERE value = ?1)
             ORDER BY created_at DESC, rowid DESC"
        ))
        .bind(agent_id)
        .fetch_all(self.db.as_ref())
        .await?;
        rows.into_iter().map(TaskRow::into_task).collect()
    }

    /// Tasks last updated at or after `since`, newest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_updated_since(&self, since: DateTime<Utc>) -> Result<Vec<Task>> {
        let rows: Vec<TaskRow> = sqlx::query_as(&format!(
            "{SELECT_TASK} WHERE updated_at >= ?1 ORDER BY updated_at DESC, rowid DESC"
        ))
        .bind(encode_ts(&since))
        .fetch_all(self.db.as_ref())
        .await?;
        rows.into_iter().map(TaskRow::into_task).collect()
    }
}
