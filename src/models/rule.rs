//! Operating rules and their scopes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which agents a rule applies to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RuleScope {
    /// Every agent.
    Global,
    /// Social role.
    Social,
    /// Trading role.
    Trading,
    /// Security role.
    Security,
    /// Jobs role.
    Jobs,
    /// Builder role.
    Building,
    /// Coordinator role.
    Coordination,
}

/// Rule severity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RuleTier {
    /// Must never be broken.
    Critical,
    /// Normal expectation.
    #[default]
    Standard,
}

/// An operating rule, optionally machine-checkable through a pattern.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    /// Unique record identifier.
    pub id: String,
    /// The rule itself.
    pub text: String,
    /// Why the rule exists.
    pub rationale: String,
    /// Who the rule applies to.
    pub scope: RuleScope,
    /// Severity.
    pub tier: RuleTier,
    /// Whether preflight evaluates the rule.
    pub checkable: bool,
    /// Regex (optionally prefixed to require presence) evaluated by preflight.
    pub check_pattern: Option<String>,
    /// Inactive rules are ignored.
    pub active: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last edit timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Rule {
    /// Construct an active rule with a generated identifier.
    #[must_use]
    pub fn new(
        text: impl Into<String>,
        rationale: impl Into<String>,
        scope: RuleScope,
        tier: RuleTier,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            text: text.into(),
            rationale: rationale.into(),
            scope,
            tier,
            checkable: false,
            check_pattern: None,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Builder-style setter making the rule checkable with `pattern`.
    #[must_use]
    pub fn with_check(mut self, pattern: impl Into<String>) -> Self {
        self.checkable = true;
        self.check_pattern = Some(pattern.into());
        self
    }

    /// Whether preflight should evaluate this rule for an agent in `scope`.
    #[must_use]
    pub fn applies_to(&self, scope: Option<RuleScope>) -> bool {
        self.active
            && self.checkable
            && self
                .check_pattern
                .as_deref()
                .is_some_and(|pattern| !pattern.is_empty())
            && (self.scope == RuleScope::Global || Some(self.scope) == scope)
    }
}

/// Partial rule edit; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RulePatch {
    /// New text.
    pub text: Option<String>,
    /// New rationale.
    pub rationale: Option<String>,
    /// New scope.
    pub scope: Option<RuleScope>,
    /// New tier.
    pub tier: Option<RuleTier>,
    /// New checkable flag.
    pub checkable: Option<bool>,
    /// New check pattern.
    pub check_pattern: Option<String>,
    /// New active flag.
    pub active: Option<bool>,
}

/// Optional filters for rule listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuleFilter {
    /// Only this scope.
    pub scope: Option<RuleScope>,
    /// Only this tier.
    pub tier: Option<RuleTier>,
    /// Only rules with this active flag.
    pub active: Option<bool>,
}
