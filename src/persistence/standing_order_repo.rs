//! Standing order repository for `SQLite` persistence.

use std::sync::Arc;

use chrono::Utc;

use crate::models::standing_order::{OrderPriority, StandingOrder, StandingOrderPatch};
use crate::{AppError, Result};

use super::db::{decode_ts, encode_ts, Database};

const SELECT_ORDER: &str = "SELECT id, agent_id, goal, metrics, priority, active, created_at, \
                            updated_at FROM standing_order";

/// Repository for standing orders.
#[derive(Clone)]
pub struct StandingOrderRepo {
    db: Arc<Database>,
}

/// Internal row struct for `SQLite` deserialization.
#[derive(sqlx::FromRow)]
struct StandingOrderRow {
    id: String,
    agent_id: String,
    goal: String,
    metrics: Option<String>,
    priority: String,
    active: i64,
    created_at: String,
    updated_at: String,
}

impl StandingOrderRow {
    fn into_order(self) -> Result<StandingOrder> {
        Ok(StandingOrder {
            priority: parse_priority(&self.priority)?,
            created_at: decode_ts("created_at", &self.created_at)?,
            updated_at: decode_ts("updated_at", &self.updated_at)?,
            id: self.id,
            agent_id: self.agent_id,
            goal: self.goal,
            metrics: self.metrics,
            active: self.active != 0,
        })
    }
}

fn parse_priority(s: &str) -> Result<OrderPriority> {
    match s {
        "primary" => Ok(OrderPriority::Primary),
        "secondary" => Ok(OrderPriority::Secondary),
        other => Err(AppError::Db(format!("invalid order priority: {other}"))),
    }
}

fn priority_str(priority: OrderPriority) -> &'static str {
    match priority {
        OrderPriority::Primary => "primary",
        OrderPriority::Secondary => "secondary",
    }
}

impl StandingOrderRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert a new order.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the insert fails.
    pub async fn insert(&self, order: &StandingOrder) -> Result<StandingOrder> {
        sqlx::query(
            "INSERT INTO standing_order (id, agent_id, goal, metrics, priority, active,
                                         created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .bind(&order.id)
        .bind(&order.agent_id)
        .bind(&order.goal)
        .bind(&order.metrics)
        .bind(priority_str(order.priority))
        .bind(i64::from(order.active))
        .bind(encode_ts(&order.created_at))
        .bind(encode_ts(&order.updated_at))
        .execute(self.db.as_ref())
        .await?;

        Ok(order.clone())
    }

    /// Retrieve an order by identifier.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn get(&self, id: &str) -> Result<Option<StandingOrder>> {
        let row: Option<StandingOrderRow> =
            sqlx::query_as(&format!("{SELECT_ORDER} WHERE id = ?1"))
                .bind(id)
                .fetch_optional(self.db.as_ref())
                .await?;
        row.map(StandingOrderRow::into_order).transpose()
    }

    /// Every order, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list(&self) -> Result<Vec<StandingOrder>> {
        let rows: Vec<StandingOrderRow> =
            sqlx::query_as(&format!("{SELECT_ORDER} ORDER BY created_at ASC, rowid ASC"))
                .fetch_all(self.db.as_ref())
                .await?;
        rows.into_iter().map(StandingOrderRow::into_order).collect()
    }

    /// Active orders for one agent, primary goals first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_for_agent(&self, agent_id: &str) -> Result<Vec<StandingOrder>> {
        let rows: Vec<StandingOrderRow> = sqlx::query_as(&format!(
            "{SELECT_ORDER}
             WHERE agent_id = ?1 AND active = 1
             ORDER BY priority = 'secondary', created_at ASC, rowid ASC"
        ))
        .bind(agent_id)
        .fetch_all(self.db.as_ref())
        .await?;
        rows.into_iter().map(StandingOrderRow::into_order).collect()
    }

    /// Apply a partial edit and stamp `updated_at`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the order does not exist, or
    /// `AppError::Db` if a query fails.
    pub async fn update(&self, id: &str, patch: &StandingOrderPatch) -> Result<StandingOrder> {
        let mut order = self
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("standing order {id} not found")))?;

        if let Some(goal) = &patch.goal {
            order.goal.clone_from(goal);
        }
        if let Some(metrics) = &patch.metrics {
            order.metrics = Some(metrics.clone());
        }
        if let Some(priority) = patch.priority {
            order.priority = priority;
        }
        if let Some(active) = patch.active {
            order.active = active;
        }
        order.updated_at = Utc::now();

        sqlx::query(
            "UPDATE standing_order SET goal = ?1, metrics = ?2, priority = ?3, active = ?4,
                                       updated_at = ?5
             WHERE id = ?6",
        )
        .bind(&order.goal)
        .bind(&order.metrics)
        .bind(priority_str(order.priority))
        .bind(i64::from(order.active))
        .bind(encode_ts(&order.updated_at))
        .bind(&order.id)
        .execute(self.db.as_ref())
        .await?;

        Ok(order)
    }

    /// Delete an order. Returns whether a row was removed.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the delete fails.
    pub async fn remove(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM standing_order WHERE id = ?1")
            .bind(id)
            .execute(self.db.as_ref())
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
