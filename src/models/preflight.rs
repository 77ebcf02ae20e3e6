//! Preflight check results and the audit log entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::rule::RuleTier;

/// Outcome of evaluating one rule against a piece of content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CheckResult {
    /// Evaluated rule.
    pub rule_id: String,
    /// Rule text.
    pub rule_text: String,
    /// Rule severity.
    pub tier: RuleTier,
    /// Whether the content satisfied the rule.
    pub passed: bool,
    /// Why the check failed, if it did.
    pub details: Option<String>,
}

/// Aggregate outcome of a preflight run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PreflightReport {
    /// True iff no rule failed.
    pub passed: bool,
    /// Number of rules evaluated.
    pub total_checks: usize,
    /// Number of failing rules.
    pub failures: usize,
    /// Per-rule outcomes in evaluation order.
    pub results: Vec<CheckResult>,
}

impl PreflightReport {
    /// Aggregate per-rule results.
    #[must_use]
    pub fn from_results(results: Vec<CheckResult>) -> Self {
        let failures = results.iter().filter(|result| !result.passed).count();
        Self {
            passed: failures == 0,
            total_checks: results.len(),
            failures,
            results,
        }
    }
}

/// Persisted record of one rule evaluation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PreflightLogEntry {
    /// Unique record identifier.
    pub id: String,
    /// Agent whose content was checked.
    pub agent_id: String,
    /// Task the content relates to.
    pub task_id: Option<String>,
    /// Always `rule:<rule id>`.
    pub check_type: String,
    /// Whether the check passed.
    pub passed: bool,
    /// Failure details.
    pub details: Option<String>,
    /// Checked content, truncated.
    pub content: Option<String>,
    /// Evaluation timestamp.
    pub created_at: DateTime<Utc>,
}

impl PreflightLogEntry {
    /// Build a log entry for a check result.
    #[must_use]
    pub fn for_result(
        agent_id: &str,
        task_id: Option<&str>,
        result: &CheckResult,
        content: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            agent_id: agent_id.to_owned(),
            task_id: task_id.map(str::to_owned),
            check_type: format!("rule:{}", result.rule_id),
            passed: result.passed,
            details: result.details.clone(),
            content,
            created_at: Utc::now(),
        }
    }
}
