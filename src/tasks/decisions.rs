//! Decision requests: an agent asks, a human or the coordinator answers.

use tracing::info;

use crate::models::activity::{Activity, ActivityAction, ActivityTarget};
use crate::models::decision::{Decision, DecisionStatus, DecisionView, NewDecision};
use crate::persistence::Repositories;
use crate::{AppError, Result};

/// Raise a pending decision and log a `requested decision` activity.
///
/// # Errors
///
/// Returns `AppError::Db` if a write fails.
pub async fn request(repos: &Repositories, input: &NewDecision) -> Result<Decision> {
    let mut decision = Decision::new(&input.agent_id, &input.title);
    decision.description = input.description.clone().unwrap_or_default();
    decision.options.clone_from(&input.options);
    decision.task_id.clone_from(&input.task_id);
    let decision = repos.decisions.insert(&decision).await?;

    repos
        .activities
        .insert(&Activity::new(
            Some(decision.agent_id.as_str()),
            ActivityAction::Create,
            ActivityTarget::Decision,
            decision.id.clone(),
            format!("requested decision: {}", decision.title),
        ))
        .await?;
    info!(decision_id = %decision.id, agent_id = %decision.agent_id, "decision requested");
    Ok(decision)
}

/// Close a decision with `status` and an optional answer.
///
/// # Errors
///
/// Returns `AppError::Validation` when `status` is `pending`,
/// `AppError::NotFound` when the decision does not exist, or `AppError::Db`
/// if a query fails.
pub async fn resolve(
    repos: &Repositories,
    id: &str,
    status: DecisionStatus,
    resolution: Option<&str>,
) -> Result<DecisionView> {
    if !status.is_final() {
        return Err(AppError::Validation(
            "status must be approved, rejected, or resolved".into(),
        ));
    }
    repos.decisions.resolve(id, status, resolution).await?;
    info!(decision_id = id, ?status, "decision resolved");
    repos
        .decisions
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("decision {id} not found")))
}
