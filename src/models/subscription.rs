//! Agent-follows-task relation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Marks that an agent follows a task's conversation.
///
/// At most one subscription exists per `(agent_id, task_id)` pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    /// Unique record identifier.
    pub id: String,
    /// Following agent.
    pub agent_id: String,
    /// Followed task.
    pub task_id: String,
    /// Subscription timestamp.
    pub subscribed_at: DateTime<Utc>,
}

impl Subscription {
    /// Construct a new subscription with a generated identifier.
    #[must_use]
    pub fn new(agent_id: impl Into<String>, task_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            agent_id: agent_id.into(),
            task_id: task_id.into(),
            subscribed_at: Utc::now(),
        }
    }
}
