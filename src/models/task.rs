//! Task record, lifecycle enums, and the derived display status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stored task status.
///
/// Any status may follow any other: the store applies transitions without
/// validating the from→to edge.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Newly created, not yet picked up.
    Inbox,
    /// Picked up by at least one assignee.
    Assigned,
    /// Work underway.
    InProgress,
    /// Awaiting review.
    Review,
    /// Finished.
    Done,
}

impl TaskStatus {
    /// Wire name of the status.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Inbox => "inbox",
            Self::Assigned => "assigned",
            Self::InProgress => "in_progress",
            Self::Review => "review",
            Self::Done => "done",
        }
    }
}

/// Task urgency.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    /// Whenever convenient.
    Low,
    /// Normal priority.
    #[default]
    Medium,
    /// Soon.
    High,
    /// Drop everything.
    Urgent,
}

impl TaskPriority {
    /// Sort rank, most urgent first.
    #[must_use]
    pub fn rank(self) -> u8 {
        match self {
            Self::Urgent => 0,
            Self::High => 1,
            Self::Medium => 2,
            Self::Low => 3,
        }
    }
}

/// Status shown to readers for a stored status and assignee count.
///
/// A task stored as `inbox` with at least one assignee is presented as
/// `assigned` without a stored transition. Every other status is shown as
/// stored.
#[must_use]
pub fn display_status(stored: TaskStatus, assignee_count: usize) -> TaskStatus {
    if stored == TaskStatus::Inbox && assignee_count > 0 {
        TaskStatus::Assigned
    } else {
        stored
    }
}

/// A unit of work tracked through its lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Unique record identifier.
    pub id: String,
    /// Short title.
    pub title: String,
    /// Optional long-form description.
    pub description: Option<String>,
    /// Stored status.
    pub status: TaskStatus,
    /// Urgency.
    pub priority: TaskPriority,
    /// Free-form tags, unique.
    pub tags: Vec<String>,
    /// Assigned agent ids, unique.
    pub assignee_ids: Vec<String>,
    /// Agent that created the task, if any.
    pub creator_id: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Build a new inbox task from creation input.
    #[must_use]
    pub fn from_new(input: &NewTask) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            title: input.title.clone(),
            description: input.description.clone(),
            status: TaskStatus::Inbox,
            priority: input.priority,
            tags: dedup_preserving_order(&input.tags),
            assignee_ids: dedup_preserving_order(&input.assignee_ids),
            creator_id: input.creator_id.clone(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Status presented to readers.
    #[must_use]
    pub fn display_status(&self) -> TaskStatus {
        display_status(self.status, self.assignee_ids.len())
    }

    /// Whether `agent_id` is among the assignees.
    #[must_use]
    pub fn is_assigned_to(&self, agent_id: &str) -> bool {
        self.assignee_ids.iter().any(|id| id == agent_id)
    }
}

/// A task as presented to readers: the stored record plus its display
/// status.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TaskView {
    /// Stored record.
    #[serde(flatten)]
    pub task: Task,
    /// See [`display_status`].
    pub display_status: TaskStatus,
}

impl From<Task> for TaskView {
    fn from(task: Task) -> Self {
        let display_status = task.display_status();
        Self {
            task,
            display_status,
        }
    }
}

/// Input for task creation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewTask {
    /// Short title.
    pub title: String,
    /// Optional description.
    pub description: Option<String>,
    /// Urgency.
    pub priority: TaskPriority,
    /// Tags.
    pub tags: Vec<String>,
    /// Initial assignees.
    pub assignee_ids: Vec<String>,
    /// Creating agent.
    pub creator_id: Option<String>,
}

/// Partial field edit; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    /// New title.
    pub title: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// Replacement tag set.
    pub tags: Option<Vec<String>>,
    /// Replacement assignee set.
    pub assignee_ids: Option<Vec<String>>,
    /// New priority.
    pub priority: Option<TaskPriority>,
}

/// Remove duplicates while keeping first-occurrence order.
#[must_use]
pub fn dedup_preserving_order(items: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        if !out.contains(item) {
            out.push(item.clone());
        }
    }
    out
}
