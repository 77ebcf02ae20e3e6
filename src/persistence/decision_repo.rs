//! Decision request repository for `SQLite` persistence.

use std::sync::Arc;

use chrono::Utc;

use crate::models::decision::{Decision, DecisionComment, DecisionStatus, DecisionView};
use crate::{AppError, Result};

use super::db::{decode_list, decode_ts, encode_list, encode_ts, Database};

const SELECT_VIEW: &str = "SELECT d.id, d.agent_id, d.title, d.description, d.options, d.status, \
                           d.resolution, d.resolved_at, d.task_id, d.comments, d.created_at, \
                           a.name AS agent_name \
                           FROM decision d LEFT JOIN agent a ON a.id = d.agent_id";

/// Repository for decision records.
#[derive(Clone)]
pub struct DecisionRepo {
    db: Arc<Database>,
}

/// Internal row struct for `SQLite` deserialization.
#[derive(sqlx::FromRow)]
struct DecisionRow {
    id: String,
    agent_id: String,
    title: String,
    description: String,
    options: Option<String>,
    status: String,
    resolution: Option<String>,
    resolved_at: Option<String>,
    task_id: Option<String>,
    comments: String,
    created_at: String,
    agent_name: Option<String>,
}

impl DecisionRow {
    fn into_view(self) -> Result<DecisionView> {
        let decision = Decision {
            options: self
                .options
                .as_deref()
                .map(|raw| decode_list("options", raw))
                .transpose()?,
            status: parse_status(&self.status)?,
            resolved_at: self
                .resolved_at
                .as_deref()
                .map(|raw| decode_ts("resolved_at", raw))
                .transpose()?,
            comments: decode_comments(&self.comments)?,
            created_at: decode_ts("created_at", &self.created_at)?,
            id: self.id,
            agent_id: self.agent_id,
            title: self.title,
            description: self.description,
            resolution: self.resolution,
            task_id: self.task_id,
        };
        Ok(DecisionView {
            decision,
            agent_name: self.agent_name.unwrap_or_else(|| "Unknown".into()),
        })
    }
}

fn parse_status(s: &str) -> Result<DecisionStatus> {
    match s {
        "pending" => Ok(DecisionStatus::Pending),
        "approved" => Ok(DecisionStatus::Approved),
        "rejected" => Ok(DecisionStatus::Rejected),
        "resolved" => Ok(DecisionStatus::Resolved),
        other => Err(AppError::Db(format!("invalid decision status: {other}"))),
    }
}

fn status_str(status: DecisionStatus) -> &'static str {
    match status {
        DecisionStatus::Pending => "pending",
        DecisionStatus::Approved => "approved",
        DecisionStatus::Rejected => "rejected",
        DecisionStatus::Resolved => "resolved",
    }
}

fn encode_comments(comments: &[DecisionComment]) -> Result<String> {
    serde_json::to_string(comments).map_err(|err| AppError::Db(format!("invalid comments: {err}")))
}

fn decode_comments(raw: &str) -> Result<Vec<DecisionComment>> {
    serde_json::from_str(raw).map_err(|err| AppError::Db(format!("invalid comments: {err}")))
}

impl DecisionRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert a new decision.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the insert fails.
    pub async fn insert(&self, decision: &Decision) -> Result<Decision> {
        let options = decision.options.as_deref().map(encode_list).transpose()?;
        sqlx::query(
            "INSERT INTO decision (id, agent_id, title, description, options, status, resolution,
                                   resolved_at, task_id, comments, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        )
        .bind(&decision.id)
        .bind(&decision.agent_id)
        .bind(&decision.title)
        .bind(&decision.description)
        .bind(options)
        .bind(status_str(decision.status))
        .bind(&decision.resolution)
        .bind(decision.resolved_at.as_ref().map(encode_ts))
        .bind(&decision.task_id)
        .bind(encode_comments(&decision.comments)?)
        .bind(encode_ts(&decision.created_at))
        .execute(self.db.as_ref())
        .await?;

        Ok(decision.clone())
    }

    /// Retrieve a decision by identifier.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn get(&self, id: &str) -> Result<Option<DecisionView>> {
        let row: Option<DecisionRow> = sqlx::query_as(&format!("{SELECT_VIEW} WHERE d.id = ?1"))
            .bind(id)
            .fetch_optional(self.db.as_ref())
            .await?;
        row.map(DecisionRow::into_view).transpose()
    }

    /// Decisions with the requesting agent's name, newest first, optionally
    /// in one status.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list(&self, status: Option<DecisionStatus>) -> Result<Vec<DecisionView>> {
        let rows: Vec<DecisionRow> = sqlx::query_as(&format!(
            "{SELECT_VIEW}
             WHERE ?1 IS NULL OR d.status = ?1
             ORDER BY d.created_at DESC, d.rowid DESC"
        ))
        .bind(status.map(status_str))
        .fetch_all(self.db.as_ref())
        .await?;
        rows.into_iter().map(DecisionRow::into_view).collect()
    }

    /// Decisions still waiting for an answer, newest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_pending(&self) -> Result<Vec<DecisionView>> {
        self.list(Some(DecisionStatus::Pending)).await
    }

    /// Record an answer and stamp `resolved_at`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the decision does not exist, or
    /// `AppError::Db` if the update fails.
    pub async fn resolve(
        &self,
        id: &str,
        status: DecisionStatus,
        resolution: Option<&str>,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE decision SET status = ?1, resolution = ?2, resolved_at = ?3 WHERE id = ?4",
        )
        .bind(status_str(status))
        .bind(resolution)
        .bind(encode_ts(&Utc::now()))
        .bind(id)
        .execute(self.db.as_ref())
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("decision {id} not found")));
        }
        Ok(())
    }

    /// Append a note to the decision thread. Returns `false` when the
    /// decision does not exist.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if a query fails.
    pub async fn add_comment(&self, id: &str, text: &str) -> Result<bool> {
        let Some(view) = self.get(id).await? else {
            return Ok(false);
        };
        let mut comments = view.decision.comments;
        comments.push(DecisionComment {
            text: text.to_owned(),
            created_at: Utc::now(),
        });

        sqlx::query("UPDATE decision SET comments = ?1 WHERE id = ?2")
            .bind(encode_comments(&comments)?)
            .bind(id)
            .execute(self.db.as_ref())
            .await?;
        Ok(true)
    }
}
