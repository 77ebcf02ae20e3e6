//! Decision requests raised by agents for a human or the coordinator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of a decision request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DecisionStatus {
    /// Waiting for an answer.
    Pending,
    /// Answered yes.
    Approved,
    /// Answered no.
    Rejected,
    /// Closed some other way.
    Resolved,
}

impl DecisionStatus {
    /// Whether this status closes a decision.
    #[must_use]
    pub fn is_final(self) -> bool {
        self != Self::Pending
    }
}

/// A note appended to a decision thread.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DecisionComment {
    /// Note text.
    pub text: String,
    /// When the note was added.
    pub created_at: DateTime<Utc>,
}

/// A question an agent cannot settle alone.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    /// Unique record identifier.
    pub id: String,
    /// Requesting agent.
    pub agent_id: String,
    /// Short question.
    pub title: String,
    /// Background, empty when not given.
    pub description: String,
    /// Proposed answers, if the agent offered any.
    pub options: Option<Vec<String>>,
    /// Current status.
    pub status: DecisionStatus,
    /// Answer text recorded on resolution.
    pub resolution: Option<String>,
    /// When the decision left `pending`.
    pub resolved_at: Option<DateTime<Utc>>,
    /// Related task, if any.
    pub task_id: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Discussion thread, oldest first.
    pub comments: Vec<DecisionComment>,
}

impl Decision {
    /// Construct a pending decision with a generated identifier.
    #[must_use]
    pub fn new(agent_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            agent_id: agent_id.into(),
            title: title.into(),
            description: String::new(),
            options: None,
            status: DecisionStatus::Pending,
            resolution: None,
            resolved_at: None,
            task_id: None,
            created_at: Utc::now(),
            comments: Vec::new(),
        }
    }
}

/// A decision joined with the requesting agent's display name.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DecisionView {
    /// The decision.
    #[serde(flatten)]
    pub decision: Decision,
    /// Requesting agent name, `Unknown` when the agent is gone.
    pub agent_name: String,
}

/// Input for raising a decision.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewDecision {
    /// Requesting agent.
    pub agent_id: String,
    /// Short question.
    pub title: String,
    /// Background.
    pub description: Option<String>,
    /// Proposed answers.
    pub options: Option<Vec<String>>,
    /// Related task.
    pub task_id: Option<String>,
}
