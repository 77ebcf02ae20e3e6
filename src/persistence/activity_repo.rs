//! Activity feed repository for `SQLite` persistence.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::models::activity::{Activity, ActivityAction, ActivityTarget, ActivityView};
use crate::{AppError, Result};

use super::db::{decode_ts, encode_ts, Database};

/// Repository for activity records.
#[derive(Clone)]
pub struct ActivityRepo {
    db: Arc<Database>,
}

/// Internal row struct for `SQLite` deserialization.
#[derive(sqlx::FromRow)]
struct ActivityRow {
    id: String,
    agent_id: Option<String>,
    action: String,
    target_type: String,
    target_id: String,
    description: String,
    created_at: String,
    agent_name: Option<String>,
}

impl ActivityRow {
    fn into_view(self) -> Result<ActivityView> {
        Ok(ActivityView {
            activity: Activity {
                action: parse_action(&self.action)?,
                target_type: parse_target(&self.target_type)?,
                created_at: decode_ts("created_at", &self.created_at)?,
                id: self.id,
                agent_id: self.agent_id,
                target_id: self.target_id,
                description: self.description,
            },
            agent_name: self.agent_name.unwrap_or_else(|| "System".into()),
        })
    }
}

fn parse_action(s: &str) -> Result<ActivityAction> {
    match s {
        "create" => Ok(ActivityAction::Create),
        "status" => Ok(ActivityAction::Status),
        "assign" => Ok(ActivityAction::Assign),
        "comment" => Ok(ActivityAction::Comment),
        "document" => Ok(ActivityAction::Document),
        other => Err(AppError::Db(format!("invalid activity action: {other}"))),
    }
}

fn action_str(action: ActivityAction) -> &'static str {
    match action {
        ActivityAction::Create => "create",
        ActivityAction::Status => "status",
        ActivityAction::Assign => "assign",
        ActivityAction::Comment => "comment",
        ActivityAction::Document => "document",
    }
}

fn parse_target(s: &str) -> Result<ActivityTarget> {
    match s {
        "task" => Ok(ActivityTarget::Task),
        "comment" => Ok(ActivityTarget::Comment),
        "document" => Ok(ActivityTarget::Document),
        "agent" => Ok(ActivityTarget::Agent),
        "decision" => Ok(ActivityTarget::Decision),
        other => Err(AppError::Db(format!("invalid activity target: {other}"))),
    }
}

fn target_str(target: ActivityTarget) -> &'static str {
    match target {
        ActivityTarget::Task => "task",
        ActivityTarget::Comment => "comment",
        ActivityTarget::Document => "document",
        ActivityTarget::Agent => "agent",
        ActivityTarget::Decision => "decision",
    }
}

impl ActivityRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Append an activity to the feed.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the insert fails.
    pub async fn insert(&self, activity: &Activity) -> Result<Activity> {
        sqlx::query(
            "INSERT INTO activity (id, agent_id, action, target_type, target_id, description,
                                   created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(&activity.id)
        .bind(&activity.agent_id)
        .bind(action_str(activity.action))
        .bind(target_str(activity.target_type))
        .bind(&activity.target_id)
        .bind(&activity.description)
        .bind(encode_ts(&activity.created_at))
        .execute(self.db.as_ref())
        .await?;

        Ok(activity.clone())
    }

    /// Most recent activities, newest first, optionally for one target type.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_recent(
        &self,
        target_type: Option<ActivityTarget>,
        limit: u32,
    ) -> Result<Vec<ActivityView>> {
        let rows: Vec<ActivityRow> = sqlx::query_as(
            "SELECT v.id, v.agent_id, v.action, v.target_type, v.target_id, v.description,
                    v.created_at, a.name AS agent_name
             FROM activity v LEFT JOIN agent a ON a.id = v.agent_id
             WHERE ?1 IS NULL OR v.target_type = ?1
             ORDER BY v.created_at DESC, v.rowid DESC
             LIMIT ?2",
        )
        .bind(target_type.map(target_str))
        .bind(i64::from(limit))
        .fetch_all(self.db.as_ref())
        .await?;

        rows.into_iter().map(ActivityRow::into_view).collect()
    }

    /// Activities at or after `since`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_since(&self, since: DateTime<Utc>) -> Result<Vec<ActivityView>> {
        let rows: Vec<ActivityRow> = sqlx::query_as(
            "SELECT v.id, v.agent_id, v.action, v.target_type, v.target_id, v.description,
                    v.created_at, a.name AS agent_name
             FROM activity v LEFT JOIN agent a ON a.id = v.agent_id
             WHERE v.created_at >= ?1
             ORDER BY v.created_at ASC, v.rowid ASC",
        )
        .bind(encode_ts(&since))
        .fetch_all(self.db.as_ref())
        .await?;

        rows.into_iter().map(ActivityRow::into_view).collect()
    }
}
