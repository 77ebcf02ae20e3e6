//! Append-only preflight audit log.

use std::sync::Arc;

use crate::models::preflight::PreflightLogEntry;
use crate::Result;

use super::db::{decode_ts, encode_ts, Database};

/// Repository for preflight log entries.
#[derive(Clone)]
pub struct PreflightRepo {
    db: Arc<Database>,
}

/// Internal row struct for `SQLite` deserialization.
#[derive(sqlx::FromRow)]
struct PreflightRow {
    id: String,
    agent_id: String,
    task_id: Option<String>,
    check_type: String,
    passed: i64,
    details: Option<String>,
    content: Option<String>,
    created_at: String,
}

impl PreflightRow {
    fn into_entry(self) -> Result<PreflightLogEntry> {
        Ok(PreflightLogEntry {
            created_at: decode_ts("created_at", &self.created_at)?,
            id: self.id,
            agent_id: self.agent_id,
            task_id: self.task_id,
            check_type: self.check_type,
            passed: self.passed != 0,
            details: self.details,
            content: self.content,
        })
    }
}

impl PreflightRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Append one log entry.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the insert fails.
    pub async fn insert(&self, entry: &PreflightLogEntry) -> Result<()> {
        sqlx::query(
            "INSERT INTO preflight_log (id, agent_id, task_id, check_type, passed, details,
                                        content, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .bind(&entry.id)
        .bind(&entry.agent_id)
        .bind(&entry.task_id)
        .bind(&entry.check_type)
        .bind(i64::from(entry.passed))
        .bind(&entry.details)
        .bind(&entry.content)
        .bind(encode_ts(&entry.created_at))
        .execute(self.db.as_ref())
        .await?;
        Ok(())
    }

    /// Recent entries, newest first, optionally filtered by agent and outcome.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_recent(
        &self,
        agent_id: Option<&str>,
        passed: Option<bool>,
        limit: u32,
    ) -> Result<Vec<PreflightLogEntry>> {
        let rows: Vec<PreflightRow> = sqlx::query_as(
            "SELECT id, agent_id, task_id, check_type, passed, details, content, created_at
             FROM preflight_log
             WHERE (?1 IS NULL OR agent_id = ?1) AND (?2 IS NULL OR passed = ?2)
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?3",
        )
        .bind(agent_id)
        .bind(passed.map(i64::from))
        .bind(i64::from(limit))
        .fetch_all(self.db.as_ref())
        .await?;
        rows.into_iter().map(PreflightRow::into_entry).collect()
    }

    /// Most recent failed checks for an agent.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn failures_for_agent(
        &self,
        agent_id: &str,
        limit: u32,
    ) -> Result<Vec<PreflightLogEntry>> {
        self.list_recent(Some(agent_id), Some(false), limit).await
    }
}
