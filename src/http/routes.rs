//! Route handlers for the control surface.
//!
//! Request bodies are camelCase JSON. Agents are named, not addressed by
//! id, and several routes accept the agent name under more than one key.

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::fanout::NewDocument;
use crate::models::activity::{Activity, ActivityAction, ActivityTarget};
use crate::models::agent::{Agent, AgentStatus};
use crate::models::decision::{DecisionStatus, NewDecision};
use crate::models::document::DocumentType;
use crate::models::standing_order::{OrderPriority, StandingOrder};
use crate::models::task::{NewTask, TaskPriority, TaskStatus, TaskView};
use crate::report;
use crate::tasks::{decisions, presence};
use crate::AppError;

use super::{ApiResult, AppState};

/// Maximum notifications returned (and marked read) per request.
const NOTIFICATION_PAGE: u32 = 50;

/// `?agent=Name` query.
#[derive(Debug, Deserialize)]
pub struct AgentQuery {
    agent: Option<String>,
}

/// Names an agent under any of the accepted keys.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRef {
    agent_name: Option<String>,
    name: Option<String>,
    agent: Option<String>,
}

impl AgentRef {
    /// First non-empty of `agentName`, `name`, `agent`.
    fn resolve_key(&self) -> Option<&str> {
        [&self.agent_name, &self.name, &self.agent]
            .into_iter()
            .filter_map(Option::as_deref)
            .find(|name| !name.trim().is_empty())
    }

    fn require(&self) -> Result<&str, AppError> {
        self.resolve_key()
            .ok_or_else(|| AppError::Validation("Missing agentName, name, or agent field".into()))
    }
}

async fn find_agent(state: &AppState, name: &str) -> Result<Option<Agent>, AppError> {
    state.repos.agents.find_by_name(name).await
}

async fn require_agent(state: &AppState, name: &str) -> Result<Agent, AppError> {
    find_agent(state, name)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Agent not found: {name}")))
}

fn query_agent(query: std::result::Result<Query<AgentQuery>, QueryRejection>) -> ApiResult<String> {
    let Query(query) = query?;
    query
        .agent
        .filter(|name| !name.trim().is_empty())
        .ok_or_else(|| AppError::Validation("Missing agent parameter".into()).into())
}

fn required(field: Option<String>, name: &str) -> Result<String, AppError> {
    field
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| AppError::Validation(format!("Missing {name}")))
}

// ─── Presence ───────────────────────────────────────────

/// `POST /api/heartbeat` body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatBody {
    session_key: Option<String>,
    status: Option<String>,
    current_task: Option<String>,
}

/// Record a heartbeat; unknown session keys answer `agentId: null`.
pub async fn heartbeat(
    State(state): State<Arc<AppState>>,
    body: std::result::Result<Json<HeartbeatBody>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(body) = body?;
    let session_key = required(body.session_key, "sessionKey")?;
    let raw_status = required(body.status, "status")?;
    let status = AgentStatus::from_heartbeat(&raw_status)
        .ok_or_else(|| AppError::Validation(format!("Invalid status: {raw_status}")))?;

    let agent = presence::heartbeat(
        &state.repos,
        &session_key,
        status,
        body.current_task.as_deref(),
    )
    .await?;
    Ok(Json(json!({ "ok": true, "agentId": agent.map(|agent| agent.id) })))
}

// ─── Agent views ────────────────────────────────────────

/// `GET /api/my-tasks?agent=Name`.
pub async fn my_tasks(
    State(state): State<Arc<AppState>>,
    query: std::result::Result<Query<AgentQuery>, QueryRejection>,
) -> ApiResult<Json<Value>> {
    let name = query_agent(query)?;
    let agent = require_agent(&state, &name).await?;
    let tasks: Vec<TaskView> = state
        .tasks
        .list_for_agent(&agent.id)
        .await?
        .into_iter()
        .map(TaskView::from)
        .collect();
    Ok(Json(json!({ "ok": true, "tasks": tasks })))
}

/// `GET /api/my-notifications?agent=Name`; returned notifications are
/// marked read.
pub async fn my_notifications(
    State(state): State<Arc<AppState>>,
    query: std::result::Result<Query<AgentQuery>, QueryRejection>,
) -> ApiResult<Json<Value>> {
    let name = query_agent(query)?;
    let agent = require_agent(&state, &name).await?;
    let notifications = state
        .repos
        .notifications
        .take_unread(&agent.id, NOTIFICATION_PAGE)
        .await?;
    Ok(Json(json!({ "ok": true, "notifications": notifications })))
}

/// `GET /api/documents?agent=Name`.
pub async fn documents(
    State(state): State<Arc<AppState>>,
    query: std::result::Result<Query<AgentQuery>, QueryRejection>,
) -> ApiResult<Json<Value>> {
    let name = query_agent(query)?;
    let agent = require_agent(&state, &name).await?;
    let documents = state.repos.documents.list_by_author(&agent.id).await?;
    Ok(Json(json!({ "ok": true, "documents": documents })))
}

// ─── Tasks ──────────────────────────────────────────────

/// `POST /api/task` body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskBody {
    title: Option<String>,
    description: Option<String>,
    priority: Option<TaskPriority>,
    #[serde(default)]
    tags: Vec<String>,
    assignee_names: Option<Vec<String>>,
    assignees: Option<Vec<String>>,
    agents: Option<Vec<String>>,
    creator_name: Option<String>,
    #[serde(flatten)]
    creator: AgentRef,
}

/// Create a task. Unresolved assignee names are dropped; an unresolved
/// creator leaves the task without one.
pub async fn create_task(
    State(state): State<Arc<AppState>>,
    body: std::result::Result<Json<CreateTaskBody>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(body) = body?;
    let creator_name = body
        .creator_name
        .as_deref()
        .filter(|name| !name.trim().is_empty())
        .map_or_else(|| body.creator.require(), Ok)?
        .to_owned();
    let title = required(body.title, "title")?;

    let names = body
        .assignee_names
        .or(body.assignees)
        .or(body.agents)
        .unwrap_or_default();
    let assignee_ids = state
        .repos
        .agents
        .resolve_names(&names)
        .await?
        .into_iter()
        .map(|agent| agent.id)
        .collect();
    let creator_id = find_agent(&state, &creator_name).await?.map(|agent| agent.id);

    let task = state
        .tasks
        .create(&NewTask {
            title,
            description: body.description,
            priority: body.priority.unwrap_or_default(),
            tags: body.tags,
            assignee_ids,
            creator_id,
        })
        .await?;
    info!(task_id = %task.id, creator = %creator_name, "task created over http");
    Ok(Json(json!({ "ok": true, "taskId": task.id })))
}

/// `POST /api/task/status` body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatusBody {
    task_id: Option<String>,
    status: Option<TaskStatus>,
    #[serde(flatten)]
    agent: AgentRef,
}

/// Move a task to any status.
pub async fn update_task_status(
    State(state): State<Arc<AppState>>,
    body: std::result::Result<Json<TaskStatusBody>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(body) = body?;
    let name = body.agent.require()?.to_owned();
    let task_id = required(body.task_id, "taskId")?;
    let status = body
        .status
        .ok_or_else(|| AppError::Validation("Missing status".into()))?;
    let acting = find_agent(&state, &name).await?.map(|agent| agent.id);

    state
        .tasks
        .update_status(&task_id, status, acting.as_deref())
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Task not found: {task_id}")))?;
    Ok(Json(json!({ "ok": true })))
}

// ─── Comments and documents ─────────────────────────────

/// `POST /api/comment` body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentBody {
    task_id: Option<String>,
    content: Option<String>,
    #[serde(default)]
    preflight: bool,
    #[serde(flatten)]
    agent: AgentRef,
}

/// Post a comment, optionally running preflight checks first.
///
/// Preflight results are reported alongside; they never block the comment.
pub async fn post_comment(
    State(state): State<Arc<AppState>>,
    body: std::result::Result<Json<CommentBody>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(body) = body?;
    let name = body.agent.require()?.to_owned();
    let task_id = required(body.task_id, "taskId")?;
    let content = required(body.content, "content")?;
    let agent = require_agent(&state, &name).await?;

    let report = if body.preflight {
        Some(
            state
                .preflight
                .run_checks(&agent.id, &content, Some(task_id.as_str()))
                .await?,
        )
    } else {
        None
    };

    let outcome = state
        .fanout
        .post_comment(&task_id, &agent.id, &content)
        .await?;
    let mut response = json!({
        "ok": true,
        "messageId": outcome.message.id,
        "mentioned": outcome.mentioned,
    });
    if let Some(report) = report {
        response["preflight"] = serde_json::to_value(report).map_err(AppError::from)?;
    }
    Ok(Json(response))
}

/// `POST /api/document` body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentBody {
    title: Option<String>,
    content: Option<String>,
    #[serde(rename = "type")]
    kind: Option<DocumentType>,
    task_id: Option<String>,
    #[serde(flatten)]
    agent: AgentRef,
}

/// Store a document authored by the named agent.
pub async fn post_document(
    State(state): State<Arc<AppState>>,
    body: std::result::Result<Json<DocumentBody>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(body) = body?;
    let name = body.agent.require()?.to_owned();
    let agent = require_agent(&state, &name).await?;

    let document = state
        .fanout
        .post_document(&NewDocument {
            title: body
                .title
                .filter(|title| !title.trim().is_empty())
                .unwrap_or_else(|| "Untitled".into()),
            content: body.content.unwrap_or_default(),
            kind: body.kind.unwrap_or_default(),
            task_id: body.task_id.filter(|id| !id.is_empty()),
            author_id: agent.id,
        })
        .await?;
    Ok(Json(json!({ "ok": true, "documentId": document.id })))
}

// ─── Decisions and standing orders ──────────────────────

/// `POST /api/decision` body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionBody {
    title: Option<String>,
    description: Option<String>,
    options: Option<Vec<String>>,
    task_id: Option<String>,
    #[serde(flatten)]
    agent: AgentRef,
}

/// Raise a decision request on behalf of a named agent.
pub async fn request_decision(
    State(state): State<Arc<AppState>>,
    body: std::result::Result<Json<DecisionBody>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(body) = body?;
    let name = body.agent.require()?.to_owned();
    let title = required(body.title, "title")?;
    let agent = require_agent(&state, &name).await?;

    let decision = decisions::request(
        &state.repos,
        &NewDecision {
            agent_id: agent.id,
            title,
            description: body.description,
            options: body.options.filter(|options| !options.is_empty()),
            task_id: body.task_id.filter(|id| !id.is_empty()),
        },
    )
    .await?;
    Ok(Json(json!({ "ok": true, "decisionId": decision.id })))
}

/// `?status=` filter for decision listing.
#[derive(Debug, Deserialize)]
pub struct DecisionQuery {
    status: Option<DecisionStatus>,
}

/// `GET /api/decisions[?status=pending]`, newest first.
pub async fn list_decisions(
    State(state): State<Arc<AppState>>,
    query: std::result::Result<Query<DecisionQuery>, QueryRejection>,
) -> ApiResult<Json<Value>> {
    let Query(query) = query?;
    let decisions = state.repos.decisions.list(query.status).await?;
    Ok(Json(json!({ "ok": true, "decisions": decisions })))
}

/// `POST /api/decision/resolve` body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveDecisionBody {
    id: Option<String>,
    status: Option<DecisionStatus>,
    resolution: Option<String>,
}

/// Answer a decision.
pub async fn resolve_decision(
    State(state): State<Arc<AppState>>,
    body: std::result::Result<Json<ResolveDecisionBody>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(body) = body?;
    let id = required(body.id, "id")?;
    let status = body
        .status
        .ok_or_else(|| AppError::Validation("Missing status".into()))?;

    let decision =
        decisions::resolve(&state.repos, &id, status, body.resolution.as_deref()).await?;
    Ok(Json(json!({ "ok": true, "decision": decision })))
}

/// `POST /api/decision/comment` body.
#[derive(Debug, Deserialize)]
pub struct DecisionCommentBody {
    id: Option<String>,
    text: Option<String>,
}

/// Add a note to a decision thread; an unknown id answers `added: false`.
pub async fn comment_on_decision(
    State(state): State<Arc<AppState>>,
    body: std::result::Result<Json<DecisionCommentBody>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(body) = body?;
    let id = required(body.id, "id")?;
    let text = required(body.text, "text")?;

    let added = state.repos.decisions.add_comment(&id, &text).await?;
    Ok(Json(json!({ "ok": true, "added": added })))
}

/// `POST /api/standing-order` body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StandingOrderBody {
    goal: Option<String>,
    metrics: Option<String>,
    priority: Option<OrderPriority>,
    active: Option<bool>,
    #[serde(flatten)]
    agent: AgentRef,
}

/// Give a named agent a standing order.
pub async fn create_standing_order(
    State(state): State<Arc<AppState>>,
    body: std::result::Result<Json<StandingOrderBody>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(body) = body?;
    let name = body.agent.require()?.to_owned();
    let goal = required(body.goal, "goal")?;
    let agent = require_agent(&state, &name).await?;

    let mut order = StandingOrder::new(agent.id, goal, body.priority.unwrap_or_default());
    order.metrics = body.metrics.filter(|metrics| !metrics.trim().is_empty());
    order.active = body.active.unwrap_or(true);
    let order = state.repos.standing_orders.insert(&order).await?;
    info!(order_id = %order.id, agent = %name, "standing order created");
    Ok(Json(json!({ "ok": true, "orderId": order.id })))
}

/// `GET /api/standing-orders?agent=Name`: the agent's active orders.
pub async fn standing_orders(
    State(state): State<Arc<AppState>>,
    query: std::result::Result<Query<AgentQuery>, QueryRejection>,
) -> ApiResult<Json<Value>> {
    let name = query_agent(query)?;
    let agent = require_agent(&state, &name).await?;
    let orders = state.repos.standing_orders.list_for_agent(&agent.id).await?;
    Ok(Json(json!({ "ok": true, "orders": orders })))
}

// ─── Activity, preflight, standup ───────────────────────

/// `POST /api/activity` body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityBody {
    action: Option<ActivityAction>,
    target_type: Option<ActivityTarget>,
    target_id: Option<String>,
    description: Option<String>,
    #[serde(flatten)]
    agent: AgentRef,
}

/// Append a free-form activity entry.
pub async fn log_activity(
    State(state): State<Arc<AppState>>,
    body: std::result::Result<Json<ActivityBody>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(body) = body?;
    let name = body.agent.require()?.to_owned();
    let action = body
        .action
        .ok_or_else(|| AppError::Validation("Missing action".into()))?;
    let target_type = body
        .target_type
        .ok_or_else(|| AppError::Validation("Missing targetType".into()))?;
    let description = required(body.description, "description")?;
    let agent_id = find_agent(&state, &name).await?.map(|agent| agent.id);

    state
        .repos
        .activities
        .insert(&Activity::new(
            agent_id.as_deref(),
            action,
            target_type,
            body.target_id.unwrap_or_default(),
            description,
        ))
        .await?;
    Ok(Json(json!({ "ok": true })))
}

/// `POST /api/preflight` body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreflightBody {
    content: Option<String>,
    task_id: Option<String>,
    #[serde(flatten)]
    agent: AgentRef,
}

/// Run preflight checks without posting anything.
pub async fn preflight(
    State(state): State<Arc<AppState>>,
    body: std::result::Result<Json<PreflightBody>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(body) = body?;
    let name = body.agent.require()?.to_owned();
    let content = required(body.content, "content")?;
    let agent = require_agent(&state, &name).await?;

    let report = state
        .preflight
        .run_checks(&agent.id, &content, body.task_id.as_deref())
        .await?;
    Ok(Json(json!({ "ok": true, "report": report })))
}

/// `GET /api/standup`.
pub async fn standup(State(state): State<Arc<AppState>>) -> ApiResult<Json<Value>> {
    let standup = report::generate(&state.repos, Utc::now()).await?;
    Ok(Json(json!({ "ok": true, "standup": standup })))
}
