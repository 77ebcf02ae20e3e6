//! Persistence layer modules.

pub mod activity_repo;
pub mod agent_repo;
pub mod db;
pub mod decision_repo;
pub mod document_repo;
pub mod message_repo;
pub mod notification_repo;
pub mod preflight_repo;
pub mod retention;
pub mod rule_repo;
pub mod schema;
pub mod standing_order_repo;
pub mod subscription_repo;
pub mod task_repo;

/// Re-export the database pool type for convenience.
pub use sqlx::SqlitePool;

use std::sync::Arc;

use self::activity_repo::ActivityRepo;
use self::agent_repo::AgentRepo;
use self::db::Database;
use self::decision_repo::DecisionRepo;
use self::document_repo::DocumentRepo;
use self::message_repo::MessageRepo;
use self::notification_repo::NotificationRepo;
use self::preflight_repo::PreflightRepo;
use self::rule_repo::RuleRepo;
use self::standing_order_repo::StandingOrderRepo;
use self::subscription_repo::SubscriptionRepo;
use self::task_repo::TaskRepo;

/// Every repository over one shared pool.
#[derive(Clone)]
pub struct Repositories {
    /// Agents.
    pub agents: AgentRepo,
    /// Tasks.
    pub tasks: TaskRepo,
    /// Task comments.
    pub messages: MessageRepo,
    /// Subscription directory.
    pub subscriptions: SubscriptionRepo,
    /// Notifications.
    pub notifications: NotificationRepo,
    /// Activity feed.
    pub activities: ActivityRepo,
    /// Documents.
    pub documents: DocumentRepo,
    /// Operating rules.
    pub rules: RuleRepo,
    /// Preflight audit log.
    pub preflight: PreflightRepo,
    /// Decision requests.
    pub decisions: DecisionRepo,
    /// Standing orders.
    pub standing_orders: StandingOrderRepo,
}

impl Repositories {
    /// Build every repository over `db`.
    #[must_use]
    pub fn new(db: &Arc<Database>) -> Self {
        Self {
            agents: AgentRepo::new(Arc::clone(db)),
            tasks: TaskRepo::new(Arc::clone(db)),
            messages: MessageRepo::new(Arc::clone(db)),
            subscriptions: SubscriptionRepo::new(Arc::clone(db)),
            notifications: NotificationRepo::new(Arc::clone(db)),
            activities: ActivityRepo::new(Arc::clone(db)),
            documents: DocumentRepo::new(Arc::clone(db)),
            rules: RuleRepo::new(Arc::clone(db)),
            preflight: PreflightRepo::new(Arc::clone(db)),
            decisions: DecisionRepo::new(Arc::clone(db)),
            standing_orders: StandingOrderRepo::new(Arc::clone(db)),
        }
    }
}
