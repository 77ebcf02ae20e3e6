//! Agent presence: heartbeats, status reports, and roster seeding.

use tracing::{debug, info, warn};

use crate::config::AgentSeed;
use crate::models::activity::{Activity, ActivityAction, ActivityTarget};
use crate::models::agent::{Agent, AgentStatus};
use crate::persistence::Repositories;
use crate::Result;

/// Record a heartbeat from the agent owning `session_key`.
///
/// Updates status, current task, and last-active time. One `status` activity
/// is written only when the status actually changed. An unknown session key
/// is a soft no-op returning `None`.
///
/// # Errors
///
/// Returns `AppError::Db` if a query fails.
pub async fn heartbeat(
    repos: &Repositories,
    session_key: &str,
    status: AgentStatus,
    current_task: Option<&str>,
) -> Result<Option<Agent>> {
    let Some(agent) = repos.agents.find_by_session_key(session_key).await? else {
        debug!(session_key, "heartbeat for unknown session key ignored");
        return Ok(None);
    };
    report_status(repos, &agent, status, current_task).await.map(Some)
}

/// Apply a status report for a known agent.
///
/// # Errors
///
/// Returns `AppError::Db` if a query fails.
pub async fn report_status(
    repos: &Repositories,
    agent: &Agent,
    status: AgentStatus,
    current_task: Option<&str>,
) -> Result<Agent> {
    repos
        .agents
        .update_status(&agent.id, status, current_task)
        .await?;

    if agent.status != status {
        repos
            .activities
            .insert(&Activity::new(
                Some(agent.id.as_str()),
                ActivityAction::Status,
                ActivityTarget::Agent,
                agent.id.clone(),
                format!(
                    "updated status: {} → {}",
                    agent.status.as_str(),
                    status.as_str()
                ),
            ))
            .await?;
        info!(agent = %agent.name, from = agent.status.as_str(), to = status.as_str(), "agent status changed");
    }

    Ok(repos.agents.get(&agent.id).await?.unwrap_or_else(|| {
        warn!(agent_id = %agent.id, "agent vanished during status update");
        agent.clone()
    }))
}

/// Insert missing roster agents and refresh existing ones.
///
/// # Errors
///
/// Returns `AppError::Db` if a query fails.
pub async fn seed_roster(repos: &Repositories, seeds: &[AgentSeed]) -> Result<Vec<Agent>> {
    let mut agents = Vec::with_capacity(seeds.len());
    for seed in seeds {
        agents.push(repos.agents.upsert_seed(seed).await?);
    }
    if !agents.is_empty() {
        info!(count = agents.len(), "agent roster seeded");
    }
    Ok(agents)
}
