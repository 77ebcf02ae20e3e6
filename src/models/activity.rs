//! Activity feed entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of event recorded in the activity feed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActivityAction {
    /// A task was created.
    Create,
    /// A task or agent status changed.
    Status,
    /// An agent was assigned to a task.
    Assign,
    /// A comment was posted.
    Comment,
    /// A document was stored.
    Document,
}

/// Kind of record an activity points at.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActivityTarget {
    /// A task.
    Task,
    /// A comment.
    Comment,
    /// A document.
    Document,
    /// An agent.
    Agent,
    /// A decision request.
    Decision,
}

/// One line of the human-readable activity feed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    /// Unique record identifier.
    pub id: String,
    /// Acting agent, if known.
    pub agent_id: Option<String>,
    /// Event kind.
    pub action: ActivityAction,
    /// Kind of target record.
    pub target_type: ActivityTarget,
    /// Target record id.
    pub target_id: String,
    /// Feed text.
    pub description: String,
    /// Event timestamp.
    pub created_at: DateTime<Utc>,
}

impl Activity {
    /// Construct a new activity with a generated identifier.
    #[must_use]
    pub fn new(
        agent_id: Option<&str>,
        action: ActivityAction,
        target_type: ActivityTarget,
        target_id: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            agent_id: agent_id.map(str::to_owned),
            action,
            target_type,
            target_id: target_id.into(),
            description: description.into(),
            created_at: Utc::now(),
        }
    }
}

/// An activity joined with the acting agent's display name.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ActivityView {
    /// The activity.
    #[serde(flatten)]
    pub activity: Activity,
    /// Acting agent name, `System` when absent.
    pub agent_name: String,
}
