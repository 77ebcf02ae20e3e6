//! Daily standup digest.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use crate::models::activity::{ActivityAction, ActivityTarget, ActivityView};
use crate::models::task::{Task, TaskStatus};
use crate::persistence::Repositories;
use crate::Result;

/// Window covered by one standup.
pub const STANDUP_WINDOW_HOURS: i64 = 24;

/// Render the standup markdown.
///
/// `tasks` are the tasks touched in the window, `activities` the feed
/// entries of the window in chronological order, and `agent_names` maps
/// agent ids to display names for the assignee lists.
#[must_use]
pub fn build_standup(
    tasks: &[Task],
    activities: &[ActivityView],
    agent_names: &HashMap<String, String>,
) -> String {
    let by_status = |status: TaskStatus| -> Vec<&Task> {
        tasks.iter().filter(|task| task.display_status() == status).collect()
    };

    let mut lines = vec![
        "**Daily Standup**".to_owned(),
        "Last 24 hours".to_owned(),
        String::new(),
        "**Completed Today**".to_owned(),
    ];
    lines.extend(task_lines(&by_status(TaskStatus::Done), agent_names));
    lines.push(String::new());
    lines.push("**In Progress**".to_owned());
    lines.extend(task_lines(&by_status(TaskStatus::InProgress), agent_names));
    lines.push(String::new());
    lines.push("**Needs Review**".to_owned());
    lines.extend(task_lines(&by_status(TaskStatus::Review), agent_names));
    lines.push(String::new());
    lines.push("**Key Activity**".to_owned());
    lines.extend(activity_lines(activities));

    lines.join("\n")
}

fn task_lines(tasks: &[&Task], agent_names: &HashMap<String, String>) -> Vec<String> {
    if tasks.is_empty() {
        return vec!["- None".to_owned()];
    }
    tasks
        .iter()
        .map(|task| {
            let names: Vec<&str> = task
                .assignee_ids
                .iter()
                .filter_map(|id| agent_names.get(id).map(String::as_str))
                .collect();
            if names.is_empty() {
                format!("- {}", task.title)
            } else {
                format!("- {} ({})", task.title, names.join(", "))
            }
        })
        .collect()
}

fn activity_lines(activities: &[ActivityView]) -> Vec<String> {
    // insertion order of first appearance per agent
    let mut order: Vec<&str> = Vec::new();
    let mut grouped: HashMap<&str, Vec<&str>> = HashMap::new();

    for view in activities.iter().filter(|view| is_key_activity(view)) {
        let name = view.agent_name.as_str();
        grouped
            .entry(name)
            .or_insert_with(|| {
                order.push(name);
                Vec::new()
            })
            .push(view.activity.description.as_str());
    }

    if order.is_empty() {
        return vec!["- None".to_owned()];
    }
    order
        .into_iter()
        .map(|name| {
            let descriptions = grouped.get(name).map(|d| d.join("; ")).unwrap_or_default();
            format!("- {name}: {descriptions}")
        })
        .collect()
}

fn is_key_activity(view: &ActivityView) -> bool {
    matches!(
        view.activity.action,
        ActivityAction::Create | ActivityAction::Status | ActivityAction::Comment
    ) || view.activity.target_type == ActivityTarget::Comment
}

/// Build the standup for the window ending at `now`.
///
/// # Errors
///
/// Returns `AppError::Db` if a query fails.
pub async fn generate(repos: &Repositories, now: DateTime<Utc>) -> Result<String> {
    let since = now - Duration::hours(STANDUP_WINDOW_HOURS);
    let tasks = repos.tasks.list_updated_since(since).await?;
    let activities = repos.activities.list_since(since).await?;
    let agent_names = repos
        .agents
        .list_all()
        .await?
        .into_iter()
        .map(|agent| (agent.id, agent.name))
        .collect();
    Ok(build_standup(&tasks, &activities, &agent_names))
}
