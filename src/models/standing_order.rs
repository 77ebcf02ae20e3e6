//! Standing orders: long-running goals an agent keeps working toward.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Weight of a standing order against the agent's other orders.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderPriority {
    /// The agent's main objective.
    #[default]
    Primary,
    /// Worked on when primary goals allow.
    Secondary,
}

/// A per-agent goal with optional success metrics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StandingOrder {
    /// Unique record identifier.
    pub id: String,
    /// Agent the order applies to.
    pub agent_id: String,
    /// What the agent should achieve.
    pub goal: String,
    /// How progress is measured.
    pub metrics: Option<String>,
    /// Relative weight.
    pub priority: OrderPriority,
    /// Inactive orders are kept but not handed out.
    pub active: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last edit timestamp.
    pub updated_at: DateTime<Utc>,
}

impl StandingOrder {
    /// Construct an active order with a generated identifier.
    #[must_use]
    pub fn new(
        agent_id: impl Into<String>,
        goal: impl Into<String>,
        priority: OrderPriority,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            agent_id: agent_id.into(),
            goal: goal.into(),
            metrics: None,
            priority,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Builder-style setter for the success metrics.
    #[must_use]
    pub fn with_metrics(mut self, metrics: impl Into<String>) -> Self {
        self.metrics = Some(metrics.into());
        self
    }
}

/// Partial order edit; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StandingOrderPatch {
    /// New goal.
    pub goal: Option<String>,
    /// New metrics.
    pub metrics: Option<String>,
    /// New priority.
    pub priority: Option<OrderPriority>,
    /// New active flag.
    pub active: Option<bool>,
}
