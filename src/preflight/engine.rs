//! Preflight rule engine.
//!
//! Selects the rules that apply to an agent's role, evaluates each against
//! the staged content, and appends one audit row per rule. The engine only
//! reports; callers decide whether a failure blocks their write.

use tracing::{info, info_span, warn, Instrument};

use crate::models::agent::AgentRole;
use crate::models::preflight::{CheckResult, PreflightLogEntry, PreflightReport};
use crate::persistence::Repositories;
use crate::Result;

use super::pattern::run_pattern_check;

/// Maximum number of characters of checked content kept in the audit log.
pub const MAX_CONTENT_LENGTH: usize = 500;

/// Evaluates operating rules against agent content.
#[derive(Clone)]
pub struct PreflightEngine {
    repos: Repositories,
}

impl PreflightEngine {
    /// Create an engine over `repos`.
    #[must_use]
    pub fn new(repos: Repositories) -> Self {
        Self { repos }
    }

    /// Run every applicable rule against `content`.
    ///
    /// An unknown agent is checked against global rules only.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if loading rules or writing the audit log fails.
    pub async fn run_checks(
        &self,
        agent_id: &str,
        content: &str,
        task_id: Option<&str>,
    ) -> Result<PreflightReport> {
        let span = info_span!("preflight", agent_id, task_id);
        async {
            let role = match self.repos.agents.get(agent_id).await? {
                Some(agent) => agent.role,
                None => {
                    warn!("preflight for unknown agent, global rules only");
                    AgentRole::Generalist
                }
            };
            let scope = role.scope();

            let rules = self.repos.rules.list_for_role(role).await?;
            let snippet = truncate_chars(content, MAX_CONTENT_LENGTH);

            let mut results = Vec::new();
            for rule in rules.into_iter().filter(|rule| rule.applies_to(scope)) {
                let pattern = rule.check_pattern.as_deref().unwrap_or_default();
                let outcome = run_pattern_check(content, pattern);
                let result = CheckResult {
                    rule_id: rule.id,
                    rule_text: rule.text,
                    tier: rule.tier,
                    passed: outcome.passed,
                    details: outcome.details,
                };
                self.repos
                    .preflight
                    .insert(&PreflightLogEntry::for_result(
                        agent_id,
                        task_id,
                        &result,
                        Some(snippet.clone()),
                    ))
                    .await?;
                results.push(result);
            }

            let report = PreflightReport::from_results(results);
            info!(
                total = report.total_checks,
                failures = report.failures,
                "preflight complete"
            );
            Ok(report)
        }
        .instrument(span)
        .await
    }
}

/// Keep at most `max` characters of `text`.
#[must_use]
pub fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
