//! Notification record produced by the fan-out engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::agent::AgentRole;

/// Message prefix that marks a notification as a work assignment.
pub const ASSIGNMENT_PREFIX: &str = "You were assigned to: ";

/// Notification classification.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    /// The recipient was named directly (mention or assignment).
    Mention,
    /// Someone commented on a task the recipient follows.
    Comment,
}

/// A pending or delivered notice to one agent.
///
/// `delivered` belongs to the delivery daemon and `read` to the UI; the two
/// flags are independent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// Unique record identifier.
    pub id: String,
    /// Agent receiving the notice.
    pub recipient_id: String,
    /// Agent that caused the notice, if any.
    pub author_id: Option<String>,
    /// Author display name captured at write time.
    pub author_name: String,
    /// Classification.
    #[serde(rename = "type")]
    pub kind: NotificationType,
    /// Human-readable text.
    pub message: String,
    /// Task the notice refers to.
    pub source_task_id: Option<String>,
    /// Acknowledged in the UI.
    pub read: bool,
    /// Pushed to the recipient's session.
    pub delivered: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Notification {
    fn build(
        recipient_id: &str,
        author_id: Option<&str>,
        author_name: &str,
        kind: NotificationType,
        message: String,
        task_id: &str,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            recipient_id: recipient_id.to_owned(),
            author_id: author_id.map(str::to_owned),
            author_name: author_name.to_owned(),
            kind,
            message,
            source_task_id: Some(task_id.to_owned()),
            read: false,
            delivered: false,
            created_at: Utc::now(),
        }
    }

    /// Assignment notice: `You were assigned to: <title>`.
    #[must_use]
    pub fn assignment(
        recipient_id: &str,
        author_id: Option<&str>,
        author_name: &str,
        task_id: &str,
        task_title: &str,
    ) -> Self {
        Self::build(
            recipient_id,
            author_id,
            author_name,
            NotificationType::Mention,
            format!("{ASSIGNMENT_PREFIX}{task_title}"),
            task_id,
        )
    }

    /// Mention notice: `<author> mentioned you in: <title>`.
    #[must_use]
    pub fn mention(
        recipient_id: &str,
        author_id: &str,
        author_name: &str,
        task_id: &str,
        task_title: &str,
    ) -> Self {
        Self::build(
            recipient_id,
            Some(author_id),
            author_name,
            NotificationType::Mention,
            format!("{author_name} mentioned you in: {task_title}"),
            task_id,
        )
    }

    /// Subscriber notice: `<author> commented on: <title>`.
    #[must_use]
    pub fn comment(
        recipient_id: &str,
        author_id: &str,
        author_name: &str,
        task_id: &str,
        task_title: &str,
    ) -> Self {
        Self::build(
            recipient_id,
            Some(author_id),
            author_name,
            NotificationType::Comment,
            format!("{author_name} commented on: {task_title}"),
            task_id,
        )
    }

    /// Whether the message marks a work assignment.
    #[must_use]
    pub fn is_assignment(&self) -> bool {
        self.message.starts_with(ASSIGNMENT_PREFIX)
    }
}

/// An undelivered notification joined with its recipient's addressing data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDelivery {
    /// The notification itself.
    pub notification: Notification,
    /// Recipient display name, `Unknown` when the agent row is gone.
    pub recipient_name: String,
    /// Recipient session key as stored.
    pub session_key: Option<String>,
    /// Recipient role, generalist when the agent row is gone.
    pub recipient_role: AgentRole,
}
