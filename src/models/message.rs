//! Task comment model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A comment posted on a task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Unique record identifier.
    pub id: String,
    /// Task the comment belongs to.
    pub task_id: String,
    /// Posting agent.
    pub from_agent_id: String,
    /// Comment body.
    pub content: String,
    /// Posting timestamp.
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Construct a new comment with a generated identifier.
    #[must_use]
    pub fn new(
        task_id: impl Into<String>,
        from_agent_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            task_id: task_id.into(),
            from_agent_id: from_agent_id.into(),
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

/// A comment joined with its author's display name.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    /// The comment.
    #[serde(flatten)]
    pub message: Message,
    /// Author display name, `Unknown` when the agent row is gone.
    pub agent_name: String,
}
