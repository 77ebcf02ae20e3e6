//! Agent identity, role, and presence model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::rule::RuleScope;

/// Presence status reported by an agent's heartbeat.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    /// Agent is online with nothing in hand.
    Idle,
    /// Agent is actively working.
    Working,
    /// Agent cannot make progress without help.
    Blocked,
}

impl AgentStatus {
    /// Resolve a heartbeat status string, accepting the legacy presence aliases
    /// `online`/`active` (working) and `offline` (idle).
    #[must_use]
    pub fn from_heartbeat(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "idle" | "offline" => Some(Self::Idle),
            "working" | "online" | "active" => Some(Self::Working),
            "blocked" => Some(Self::Blocked),
            _ => None,
        }
    }

    /// Wire name of the status.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Working => "working",
            Self::Blocked => "blocked",
        }
    }
}

/// Seniority of an agent within the fleet.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AgentLevel {
    /// Team lead.
    Lead,
    /// Domain specialist.
    #[default]
    Specialist,
    /// Junior helper.
    Intern,
}

/// Functional role of an agent.
///
/// The role is the single source of the agent's rule scope; see
/// [`AgentRole::scope`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    /// Fleet coordinator; receives delegation directives and blocked-agent alerts.
    Coordinator,
    /// Social media growth.
    Social,
    /// Market trading.
    Trading,
    /// Infrastructure security.
    Security,
    /// Job search pipeline.
    Jobs,
    /// Software building.
    Builder,
    /// No specialised scope; only global rules apply.
    #[default]
    Generalist,
}

impl AgentRole {
    /// Rule scope governed by this role, if any.
    #[must_use]
    pub fn scope(self) -> Option<RuleScope> {
        match self {
            Self::Coordinator => Some(RuleScope::Coordination),
            Self::Social => Some(RuleScope::Social),
            Self::Trading => Some(RuleScope::Trading),
            Self::Security => Some(RuleScope::Security),
            Self::Jobs => Some(RuleScope::Jobs),
            Self::Builder => Some(RuleScope::Building),
            Self::Generalist => None,
        }
    }

    /// Whether agents in this role act as the fleet supervisor.
    #[must_use]
    pub fn is_supervisor(self) -> bool {
        matches!(self, Self::Coordinator)
    }
}

/// An autonomous worker identity with a reachable session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    /// Unique record identifier.
    pub id: String,
    /// Display name; unique and resolved case-insensitively.
    pub name: String,
    /// Functional role.
    pub role: AgentRole,
    /// Last reported presence status.
    pub status: AgentStatus,
    /// Free-text description of what the agent is doing.
    pub current_task: Option<String>,
    /// Gateway session key, bare (`alpha`) or qualified (`agent:alpha:main`).
    pub session_key: Option<String>,
    /// Seniority.
    pub level: AgentLevel,
    /// Last heartbeat or status change.
    pub last_active: DateTime<Utc>,
    /// Avatar shown on the dashboard.
    pub avatar_emoji: String,
}

impl Agent {
    /// Construct a new idle agent with a generated identifier.
    #[must_use]
    pub fn new(name: impl Into<String>, role: AgentRole, level: AgentLevel) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            role,
            status: AgentStatus::Idle,
            current_task: None,
            session_key: None,
            level,
            last_active: Utc::now(),
            avatar_emoji: "🤖".into(),
        }
    }

    /// Builder-style setter for the session key.
    #[must_use]
    pub fn with_session_key(mut self, key: impl Into<String>) -> Self {
        self.session_key = Some(key.into());
        self
    }

    /// Gateway-qualified session key, if the agent has one.
    #[must_use]
    pub fn qualified_session_key(&self) -> Option<String> {
        self.session_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .map(normalize_session_key)
    }
}

/// Qualify a bare session key as `agent:<key>:main`.
///
/// Keys that already contain a `:` are returned unchanged.
#[must_use]
pub fn normalize_session_key(key: &str) -> String {
    if key.contains(':') {
        key.to_owned()
    } else {
        format!("agent:{key}:main")
    }
}

/// Extract the gateway agent id from a qualified session key.
///
/// `agent:alpha:main` yields `alpha`; a key without segments is returned whole.
#[must_use]
pub fn agent_id_from_session_key(key: &str) -> &str {
    key.split(':')
        .nth(1)
        .filter(|segment| !segment.is_empty())
        .unwrap_or(key)
}
