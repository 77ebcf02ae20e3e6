//! Agent repository for `SQLite` persistence.

use std::sync::Arc;

use chrono::Utc;

use crate::config::AgentSeed;
use crate::models::agent::{Agent, AgentLevel, AgentRole, AgentStatus};
use crate::{AppError, Result};

use super::db::{decode_ts, encode_ts, Database};

const SELECT_AGENT: &str = "SELECT id, name, role, status, current_task, session_key, level, \
                            last_active, avatar_emoji FROM agent";

/// Repository for agent records.
#[derive(Clone)]
pub struct AgentRepo {
    db: Arc<Database>,
}

/// Internal row struct for `SQLite` deserialization.
#[derive(sqlx::FromRow)]
struct AgentRow {
    id: String,
    name: String,
    role: String,
    status: String,
    current_task: Option<String>,
    session_key: Option<String>,
    level: String,
    last_active: String,
    avatar_emoji: String,
}

impl AgentRow {
    fn into_agent(self) -> Result<Agent> {
        Ok(Agent {
            role: parse_role(&self.role)?,
            status: parse_status(&self.status)?,
            level: parse_level(&self.level)?,
            last_active: decode_ts("last_active", &self.last_active)?,
            id: self.id,
            name: self.name,
            current_task: self.current_task,
            session_key: self.session_key,
            avatar_emoji: self.avatar_emoji,
        })
    }
}

/// Parse a stored role column.
///
/// # Errors
///
/// Returns `AppError::Db` for an unknown role.
pub(crate) fn parse_role(s: &str) -> Result<AgentRole> {
    match s {
        "coordinator" => Ok(AgentRole::Coordinator),
        "social" => Ok(AgentRole::Social),
        "trading" => Ok(AgentRole::Trading),
        "security" => Ok(AgentRole::Security),
        "jobs" => Ok(AgentRole::Jobs),
        "builder" => Ok(AgentRole::Builder),
        "generalist" => Ok(AgentRole::Generalist),
        other => Err(AppError::Db(format!("invalid agent role: {other}"))),
    }
}

fn role_str(role: AgentRole) -> &'static str {
    match role {
        AgentRole::Coordinator => "coordinator",
        AgentRole::Social => "social",
        AgentRole::Trading => "trading",
        AgentRole::Security => "security",
        AgentRole::Jobs => "jobs",
        AgentRole::Builder => "builder",
        AgentRole::Generalist => "generalist",
    }
}

fn parse_status(s: &str) -> Result<AgentStatus> {
    match s {
        "idle" => Ok(AgentStatus::Idle),
        "working" => Ok(AgentStatus::Working),
        "blocked" => Ok(AgentStatus::Blocked),
        other => Err(AppError::Db(format!("invalid agent status: {other}"))),
    }
}

fn parse_level(s: &str) -> Result<AgentLevel> {
    match s {
        "lead" => Ok(AgentLevel::Lead),
        "specialist" => Ok(AgentLevel::Specialist),
        "intern" => Ok(AgentLevel::Intern),
        other => Err(AppError::Db(format!("invalid agent level: {other}"))),
    }
}

fn level_str(level: AgentLevel) -> &'static str {
    match level {
        AgentLevel::Lead => "lead",
        AgentLevel::Specialist => "specialist",
        AgentLevel::Intern => "intern",
    }
}

fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

impl AgentRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert a new agent.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the insert fails, including when another
    /// agent already uses the same name (case-insensitively).
    pub async fn insert(&self, agent: &Agent) -> Result<Agent> {
        sqlx::query(
            "INSERT INTO agent (id, name, name_key, role, status, current_task, session_key,
                                level, last_active, avatar_emoji)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )
        .bind(&agent.id)
        .bind(&agent.name)
        .bind(name_key(&agent.name))
        .bind(role_str(agent.role))
        .bind(agent.status.as_str())
        .bind(&agent.current_task)
        .bind(&agent.session_key)
        .bind(level_str(agent.level))
        .bind(encode_ts(&agent.last_active))
        .bind(&agent.avatar_emoji)
        .execute(self.db.as_ref())
        .await?;

        Ok(agent.clone())
    }

    /// Retrieve an agent by identifier.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn get(&self, id: &str) -> Result<Option<Agent>> {
        let row: Option<AgentRow> = sqlx::query_as(&format!("{SELECT_AGENT} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(self.db.as_ref())
            .await?;
        row.map(AgentRow::into_agent).transpose()
    }

    /// Resolve an agent by display name, ignoring case.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn find_by_name(&self, name: &str) -> Result<Option<Agent>> {
        let row: Option<AgentRow> =
            sqlx::query_as(&format!("{SELECT_AGENT} WHERE name_key = ?1"))
                .bind(name_key(name))
                .fetch_optional(self.db.as_ref())
                .await?;
        row.map(AgentRow::into_agent).transpose()
    }

    /// Resolve an agent by its stored session key.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn find_by_session_key(&self, session_key: &str) -> Result<Option<Agent>> {
        let row: Option<AgentRow> =
            sqlx::query_as(&format!("{SELECT_AGENT} WHERE session_key = ?1 LIMIT 1"))
                .bind(session_key)
                .fetch_optional(self.db.as_ref())
                .await?;
        row.map(AgentRow::into_agent).transpose()
    }

    /// Resolve a list of names, silently dropping the ones with no agent.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if a query fails.
    pub async fn resolve_names(&self, names: &[String]) -> Result<Vec<Agent>> {
        let mut agents = Vec::with_capacity(names.len());
        for name in names {
            if let Some(agent) = self.find_by_name(name).await? {
                if !agents.iter().any(|a: &Agent| a.id == agent.id) {
                    agents.push(agent);
                }
            }
        }
        Ok(agents)
    }

    /// List every agent ordered by name.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_all(&self) -> Result<Vec<Agent>> {
        let rows: Vec<AgentRow> = sqlx::query_as(&format!("{SELECT_AGENT} ORDER BY name_key"))
            .fetch_all(self.db.as_ref())
            .await?;
        rows.into_iter().map(AgentRow::into_agent).collect()
    }

    /// List agents currently reporting `blocked`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_blocked(&self) -> Result<Vec<Agent>> {
        let rows: Vec<AgentRow> =
            sqlx::query_as(&format!("{SELECT_AGENT} WHERE status = 'blocked' ORDER BY name_key"))
                .fetch_all(self.db.as_ref())
                .await?;
        rows.into_iter().map(AgentRow::into_agent).collect()
    }

    /// First coordinator that has a session key, by name.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn find_supervisor(&self) -> Result<Option<Agent>> {
        let row: Option<AgentRow> = sqlx::query_as(&format!(
            "{SELECT_AGENT} WHERE role = 'coordinator'
               AND session_key IS NOT NULL AND session_key != ''
             ORDER BY name_key LIMIT 1"
        ))
        .fetch_optional(self.db.as_ref())
        .await?;
        row.map(AgentRow::into_agent).transpose()
    }

    /// Record a status report and bump `last_active`.
    ///
    /// `current_task` is only overwritten when `Some`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if no agent has `id`, or `AppError::Db`
    /// if the update fails.
    pub async fn update_status(
        &self,
        id: &str,
        status: AgentStatus,
        current_task: Option<&str>,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE agent SET status = ?1, current_task = COALESCE(?2, current_task),
                              last_active = ?3
             WHERE id = ?4",
        )
        .bind(status.as_str())
        .bind(current_task)
        .bind(encode_ts(&Utc::now()))
        .bind(id)
        .execute(self.db.as_ref())
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("agent {id} not found")));
        }
        Ok(())
    }

    /// Set or clear an agent's session key.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if no agent has `id`, or `AppError::Db`
    /// if the update fails.
    pub async fn set_session_key(&self, id: &str, session_key: Option<&str>) -> Result<()> {
        let result = sqlx::query("UPDATE agent SET session_key = ?1 WHERE id = ?2")
            .bind(session_key)
            .bind(id)
            .execute(self.db.as_ref())
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("agent {id} not found")));
        }
        Ok(())
    }

    /// Insert a roster entry, or refresh role, level, avatar and session key
    /// of the agent already holding that name.
    ///
    /// Presence fields of an existing agent are left untouched.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if a query fails.
    pub async fn upsert_seed(&self, seed: &AgentSeed) -> Result<Agent> {
        if let Some(existing) = self.find_by_name(&seed.name).await? {
            sqlx::query(
                "UPDATE agent SET role = ?1, level = ?2, avatar_emoji = ?3,
                                  session_key = COALESCE(?4, session_key)
                 WHERE id = ?5",
            )
            .bind(role_str(seed.role))
            .bind(level_str(seed.level))
            .bind(&seed.avatar_emoji)
            .bind(&seed.session_key)
            .bind(&existing.id)
            .execute(self.db.as_ref())
            .await?;

            return self
                .get(&existing.id)
                .await?
                .ok_or_else(|| AppError::Db(format!("agent {} vanished", existing.id)));
        }

        let mut agent = Agent::new(seed.name.trim(), seed.role, seed.level);
        agent.session_key.clone_from(&seed.session_key);
        agent.avatar_emoji.clone_from(&seed.avatar_emoji);
        self.insert(&agent).await
    }
}
