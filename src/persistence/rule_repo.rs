//! Operating rule repository for `SQLite` persistence.

use std::sync::Arc;

use chrono::Utc;

use crate::models::agent::AgentRole;
use crate::models::rule::{Rule, RuleFilter, RulePatch, RuleScope, RuleTier};
use crate::{AppError, Result};

use super::db::{decode_ts, encode_ts, Database};

const SELECT_RULE: &str = "SELECT id, text, rationale, scope, tier, checkable, check_pattern, \
                           active, created_at, updated_at FROM rule";

/// Repository for rule records.
#[derive(Clone)]
pub struct RuleRepo {
    db: Arc<Database>,
}

/// Internal row struct for `SQLite` deserialization.
#[derive(sqlx::FromRow)]
struct RuleRow {
    id: String,
    text: String,
    rationale: String,
    scope: String,
    tier: String,
    checkable: i64,
    check_pattern: Option<String>,
    active: i64,
    created_at: String,
    updated_at: String,
}

impl RuleRow {
    fn into_rule(self) -> Result<Rule> {
        Ok(Rule {
            scope: parse_scope(&self.scope)?,
            tier: parse_tier(&self.tier)?,
            created_at: decode_ts("created_at", &self.created_at)?,
            updated_at: decode_ts("updated_at", &self.updated_at)?,
            id: self.id,
            text: self.text,
            rationale: self.rationale,
            checkable: self.checkable != 0,
            check_pattern: self.check_pattern,
            active: self.active != 0,
        })
    }
}

fn parse_scope(s: &str) -> Result<RuleScope> {
    match s {
        "global" => Ok(RuleScope::Global),
        "social" => Ok(RuleScope::Social),
        "trading" => Ok(RuleScope::Trading),
        "security" => Ok(RuleScope::Security),
        "jobs" => Ok(RuleScope::Jobs),
        "building" => Ok(RuleScope::Building),
        "coordination" => Ok(RuleScope::Coordination),
        other => Err(AppError::Db(format!("invalid rule scope: {other}"))),
    }
}

fn scope_str(scope: RuleScope) -> &'static str {
    match scope {
        RuleScope::Global => "global",
        RuleScope::Social => "social",
        RuleScope::Trading => "trading",
        RuleScope::Security => "security",
        RuleScope::Jobs => "jobs",
        RuleScope::Building => "building",
        RuleScope::Coordination => "coordination",
    }
}

fn parse_tier(s: &str) -> Result<RuleTier> {
    match s {
        "critical" => Ok(RuleTier::Critical),
        "standard" => Ok(RuleTier::Standard),
        other => Err(AppError::Db(format!("invalid rule tier: {other}"))),
    }
}

fn tier_str(tier: RuleTier) -> &'static str {
    match tier {
        RuleTier::Critical => "critical",
        RuleTier::Standard => "standard",
    }
}

impl RuleRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert a new rule.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the insert fails.
    pub async fn insert(&self, rule: &Rule) -> Result<Rule> {
        sqlx::query(
            "INSERT INTO rule (id, text, rationale, scope, tier, checkable, check_pattern, active,
                               created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )
        .bind(&rule.id)
        .bind(&rule.text)
        .bind(&rule.rationale)
        .bind(scope_str(rule.scope))
        .bind(tier_str(rule.tier))
        .bind(i64::from(rule.checkable))
        .bind(&rule.check_pattern)
        .bind(i64::from(rule.active))
        .bind(encode_ts(&rule.created_at))
        .bind(encode_ts(&rule.updated_at))
        .execute(self.db.as_ref())
        .await?;

        Ok(rule.clone())
    }

    /// Retrieve a rule by identifier.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn get(&self, id: &str) -> Result<Option<Rule>> {
        let row: Option<RuleRow> = sqlx::query_as(&format!("{SELECT_RULE} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(self.db.as_ref())
            .await?;
        row.map(RuleRow::into_rule).transpose()
    }

    /// Apply a partial edit.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the rule does not exist, or
    /// `AppError::Db` if a query fails.
    pub async fn update(&self, id: &str, patch: &RulePatch) -> Result<Rule> {
        let mut rule = self
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("rule {id} not found")))?;

        if let Some(text) = &patch.text {
            rule.text.clone_from(text);
        }
        if let Some(rationale) = &patch.rationale {
            rule.rationale.clone_from(rationale);
        }
        if let Some(scope) = patch.scope {
            rule.scope = scope;
        }
        if let Some(tier) = patch.tier {
            rule.tier = tier;
        }
        if let Some(checkable) = patch.checkable {
            rule.checkable = checkable;
        }
        if let Some(pattern) = &patch.check_pattern {
            rule.check_pattern = Some(pattern.clone());
        }
        if let Some(active) = patch.active {
            rule.active = active;
        }
        rule.updated_at = Utc::now();

        sqlx::query(
            "UPDATE rule SET text = ?1, rationale = ?2, scope = ?3, tier = ?4, checkable = ?5,
                             check_pattern = ?6, active = ?7, updated_at = ?8
             WHERE id = ?9",
        )
        .bind(&rule.text)
        .bind(&rule.rationale)
        .bind(scope_str(rule.scope))
        .bind(tier_str(rule.tier))
        .bind(i64::from(rule.checkable))
        .bind(&rule.check_pattern)
        .bind(i64::from(rule.active))
        .bind(encode_ts(&rule.updated_at))
        .bind(&rule.id)
        .execute(self.db.as_ref())
        .await?;

        Ok(rule)
    }

    /// Delete a rule. Returns whether a row was removed.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the delete fails.
    pub async fn remove(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM rule WHERE id = ?1")
            .bind(id)
            .execute(self.db.as_ref())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// List rules matching `filter`, newest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list(&self, filter: RuleFilter) -> Result<Vec<Rule>> {
        let rows: Vec<RuleRow> = sqlx::query_as(&format!(
            "{SELECT_RULE}
             WHERE (?1 IS NULL OR scope = ?1)
               AND (?2 IS NULL OR tier = ?2)
               AND (?3 IS NULL OR active = ?3)
             ORDER BY created_at DESC, rowid DESC"
        ))
        .bind(filter.scope.map(scope_str))
        .bind(filter.tier.map(tier_str))
        .bind(filter.active.map(i64::from))
        .fetch_all(self.db.as_ref())
        .await?;
        rows.into_iter().map(RuleRow::into_rule).collect()
    }

    /// Active rules in the global scope or in `scope`, oldest first so that
    /// preflight results come back in a stable order.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_for_scope(&self, scope: Option<RuleScope>) -> Result<Vec<Rule>> {
        let rows: Vec<RuleRow> = sqlx::query_as(&format!(
            "{SELECT_RULE}
             WHERE active = 1 AND (scope = 'global' OR scope = ?1)
             ORDER BY created_at ASC, rowid ASC"
        ))
        .bind(scope.map(scope_str))
        .fetch_all(self.db.as_ref())
        .await?;
        rows.into_iter().map(RuleRow::into_rule).collect()
    }

    /// Active rules that reach an agent with `role`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_for_role(&self, role: AgentRole) -> Result<Vec<Rule>> {
        self.list_for_scope(role.scope()).await
    }
}
