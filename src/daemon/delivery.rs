//! Notification delivery loop.
//!
//! Each cycle claims the oldest undelivered notifications and pushes them,
//! one at a time, into the recipient's live session through the
//! [`SessionGateway`]. A notification is marked delivered as soon as the
//! gateway answers a send with a 2xx, whatever the body says; a spawn also
//! needs `accepted`. Anything that fails stays undelivered and is picked up
//! again by the next cycle. Every Nth cycle also looks for blocked agents
//! and alerts the supervisor once per blocked episode.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::config::GlobalConfig;
use crate::fanout::{FanoutEngine, NewDocument};
use crate::models::agent::{agent_id_from_session_key, normalize_session_key};
use crate::models::notification::{NotificationType, PendingDelivery};
use crate::models::task::Task;
use crate::persistence::Repositories;
use crate::{AppError, Result};

use super::blocked::BlockedAlertCache;
use super::gateway::{GatewayRequest, GatewayResponse, SessionGateway};
use super::prompts;
use super::reply::{parse_reply, GatewayReply};

/// Pacing and timeout values for the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DaemonSettings {
    /// Sleep between cycles.
    pub poll_interval: Duration,
    /// Timeout for spawns and alerts.
    pub simple_timeout: Duration,
    /// Timeout for sends that wait on an agent reply.
    pub request_timeout: Duration,
    /// Run-time budget handed to spawned sub-sessions.
    pub spawn_run_timeout_seconds: u64,
    /// Blocked-agent check runs on every Nth cycle.
    pub blocked_check_every: u64,
    /// Notifications claimed per cycle.
    pub batch_size: u32,
}

impl DaemonSettings {
    /// Settings taken from the loaded configuration.
    #[must_use]
    pub fn from_config(config: &GlobalConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            simple_timeout: config.simple_timeout(),
            request_timeout: config.request_timeout(),
            spawn_run_timeout_seconds: config.daemon.spawn_run_timeout_seconds,
            blocked_check_every: config.daemon.blocked_check_every.max(1),
            batch_size: config.daemon.batch_size,
        }
    }
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self::from_config(&GlobalConfig::default())
    }
}

/// How a notification is pushed to its recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryRoute {
    /// Plain message, no reply handling.
    Ping,
    /// Spawned sub-session doing assigned work.
    Assignment,
    /// Spawned supervisor sub-session triaging an unassigned task.
    Delegation,
    /// Send and wait for a reply that is posted back on the task.
    Conversation,
}

/// Choose the route for a notification.
///
/// `task` is the notification's source task when it still exists.
#[must_use]
pub fn route_for(pending: &PendingDelivery, task: Option<&Task>) -> DeliveryRoute {
    let notification = &pending.notification;
    let Some(task) = task else {
        return DeliveryRoute::Ping;
    };
    if notification.kind == NotificationType::Comment {
        return DeliveryRoute::Ping;
    }
    if notification.is_assignment() {
        DeliveryRoute::Assignment
    } else if pending.recipient_role.is_supervisor() && task.assignee_ids.is_empty() {
        DeliveryRoute::Delegation
    } else {
        DeliveryRoute::Conversation
    }
}

/// Counters for one poll cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Cycle number, starting at 1.
    pub cycle: u64,
    /// Notifications claimed.
    pub attempted: usize,
    /// Notifications marked delivered.
    pub delivered: usize,
    /// Notifications left for the next cycle.
    pub failed: usize,
    /// Blocked-agent alerts sent.
    pub alerts_sent: usize,
}

/// The delivery daemon.
pub struct DeliveryDaemon {
    repos: Repositories,
    fanout: FanoutEngine,
    gateway: Arc<dyn SessionGateway>,
    settings: DaemonSettings,
    alerts: BlockedAlertCache,
    cycle: AtomicU64,
}

impl DeliveryDaemon {
    /// Create a daemon with an empty alert cache.
    #[must_use]
    pub fn new(
        repos: Repositories,
        gateway: Arc<dyn SessionGateway>,
        settings: DaemonSettings,
    ) -> Self {
        Self {
            fanout: FanoutEngine::new(repos.clone()),
            repos,
            gateway,
            settings,
            alerts: BlockedAlertCache::new(),
            cycle: AtomicU64::new(0),
        }
    }

    /// Blocked agents already reported to the supervisor.
    #[must_use]
    pub fn alerts(&self) -> &BlockedAlertCache {
        &self.alerts
    }

    /// Poll until `cancel` fires. A running cycle always completes.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(poll_interval = ?self.settings.poll_interval, "delivery daemon started");
        loop {
            if cancel.is_cancelled() {
                break;
            }
            let report = self.poll_once().await;
            if report.attempted > 0 || report.alerts_sent > 0 {
                info!(
                    cycle = report.cycle,
                    delivered = report.delivered,
                    failed = report.failed,
                    alerts = report.alerts_sent,
                    "delivery cycle finished"
                );
            }
            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(self.settings.poll_interval) => {}
            }
        }
        info!("delivery daemon stopped");
    }

    /// Run one cycle. Never fails; problems are logged and counted.
    pub async fn poll_once(&self) -> CycleReport {
        let cycle = self.cycle.fetch_add(1, Ordering::Relaxed) + 1;
        let span = info_span!("delivery_cycle", cycle);
        self.cycle_inner(cycle).instrument(span).await
    }

    async fn cycle_inner(&self, cycle: u64) -> CycleReport {
        let mut report = CycleReport {
            cycle,
            ..CycleReport::default()
        };

        match self
            .repos
            .notifications
            .list_undelivered(self.settings.batch_size)
            .await
        {
            Ok(batch) => {
                report.attempted = batch.len();
                for pending in &batch {
                    if self.deliver_and_mark(pending).await {
                        report.delivered += 1;
                    } else {
                        report.failed += 1;
                    }
                }
            }
            Err(err) => error!(%err, "failed to fetch undelivered notifications"),
        }

        if cycle % self.settings.blocked_check_every == 0 {
            match self.check_blocked().await {
                Ok(sent) => report.alerts_sent = sent,
                Err(err) => error!(%err, "blocked-agent check failed"),
            }
        }
        report
    }

    async fn deliver_and_mark(&self, pending: &PendingDelivery) -> bool {
        let notification = &pending.notification;
        let span = info_span!(
            "deliver",
            notification_id = %notification.id,
            recipient = %pending.recipient_name
        );
        async {
            if let Err(err) = self.deliver(pending).await {
                warn!(%err, "delivery failed, will retry next cycle");
                return false;
            }
            match self
                .repos
                .notifications
                .mark_delivered(&notification.id)
                .await
            {
                Ok(()) => {
                    debug!("notification delivered");
                    true
                }
                Err(err) => {
                    error!(%err, "failed to mark notification delivered");
                    false
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Push one notification to its recipient.
    ///
    /// A send succeeds on any 2xx answer, including `ok: false` and an empty
    /// body; those simply carry no reply to post. A spawn succeeds only when
    /// accepted. Reply handling errors are logged and do not fail the
    /// delivery.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` when the recipient has no session key,
    /// or the gateway call's error.
    pub async fn deliver(&self, pending: &PendingDelivery) -> Result<()> {
        let notification = &pending.notification;
        let raw_key = pending
            .session_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                AppError::Validation(format!(
                    "no session key for recipient {}",
                    pending.recipient_name
                ))
            })?;
        let session_key = normalize_session_key(raw_key);

        let task = match notification.source_task_id.as_deref() {
            Some(task_id) => self.repos.tasks.get(task_id).await?,
            None => None,
        };
        let route = route_for(pending, task.as_ref());
        debug!(?route, "routing notification");

        let Some(task) = task.filter(|_| route != DeliveryRoute::Ping) else {
            let request =
                GatewayRequest::send(&session_key, &prompts::comment_ping(&notification.message));
            self.call(request, self.settings.request_timeout).await?;
            return Ok(());
        };

        let comments = self.repos.messages.list_by_task(&task.id).await?;
        let context = prompts::task_context(&task, &comments);
        let teammates = self.teammates(&notification.recipient_id).await?;
        let name = &pending.recipient_name;

        match route {
            DeliveryRoute::Assignment | DeliveryRoute::Delegation => {
                let prompt = if route == DeliveryRoute::Assignment {
                    prompts::assignment_prompt(name, &task, &context, &teammates)
                } else {
                    prompts::delegation_prompt(
                        name,
                        &task,
                        &notification.message,
                        &context,
                        &teammates,
                    )
                };
                let request = GatewayRequest::spawn(
                    agent_id_from_session_key(&session_key),
                    &session_key,
                    &prompt,
                    self.settings.spawn_run_timeout_seconds,
                );
                let response = self.call(request, self.settings.simple_timeout).await?;
                if !response.spawn_accepted() {
                    return Err(AppError::Gateway(format!(
                        "spawn not accepted: {}",
                        describe_failure(&response)
                    )));
                }
                info!(?route, task_id = %task.id, "sub-session spawned");
            }
            DeliveryRoute::Conversation | DeliveryRoute::Ping => {
                let prompt = prompts::mention_prompt(
                    name,
                    &task,
                    &notification.message,
                    &context,
                    &teammates,
                );
                let request = GatewayRequest::send(&session_key, &prompt);
                let response = self.call(request, self.settings.request_timeout).await?;
                if let Err(err) = self.handle_reply(pending, &task, &response).await {
                    warn!(%err, task_id = %task.id, "failed to post agent reply");
                }
            }
        }
        Ok(())
    }

    /// Post an agent's reply back onto the task as the agent.
    async fn handle_reply(
        &self,
        pending: &PendingDelivery,
        task: &Task,
        response: &GatewayResponse,
    ) -> Result<()> {
        let reply = GatewayReply::decode(response);
        if let GatewayReply::Rejected { status, error } = &reply {
            warn!(%status, error = ?error, "agent run did not produce a reply");
            return Ok(());
        }
        let Some(text) = reply.actionable() else {
            debug!("no reply to post");
            return Ok(());
        };

        let agent_id = &pending.notification.recipient_id;
        let parsed = parse_reply(text, &pending.recipient_name, &task.title);
        self.fanout
            .post_comment(&task.id, agent_id, &parsed.comment)
            .await?;

        if let Some(draft) = parsed.document {
            let document = self
                .fanout
                .post_document(&NewDocument {
                    title: draft.title,
                    content: draft.body,
                    kind: draft.kind,
                    task_id: Some(task.id.clone()),
                    author_id: agent_id.clone(),
                })
                .await?;
            info!(document_id = %document.id, "reply document stored");
        }
        Ok(())
    }

    /// Alert the supervisor about newly blocked agents.
    ///
    /// Returns the number of alerts sent.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the agent queries fail. Gateway failures are
    /// logged and leave the agent eligible for the next check.
    pub async fn check_blocked(&self) -> Result<usize> {
        let blocked = self.repos.agents.list_blocked().await?;
        self.alerts
            .retain_blocked(blocked.iter().map(|agent| agent.id.as_str()));
        if blocked.is_empty() {
            return Ok(0);
        }

        let Some(supervisor) = self.repos.agents.find_supervisor().await? else {
            debug!("no supervisor with a session key; skipping blocked alerts");
            return Ok(0);
        };
        let Some(session_key) = supervisor.qualified_session_key() else {
            return Ok(0);
        };

        let mut sent = 0;
        for agent in blocked
            .iter()
            .filter(|agent| agent.id != supervisor.id && self.alerts.should_alert(&agent.id))
        {
            let message = prompts::blocked_alert(&agent.name, agent.current_task.as_deref());
            let request = GatewayRequest::send(&session_key, &message);
            match self.call(request, self.settings.simple_timeout).await {
                Ok(_) => {
                    self.alerts.record(&agent.id);
                    sent += 1;
                    info!(agent = %agent.name, supervisor = %supervisor.name, "blocked alert sent");
                }
                Err(err) => warn!(%err, agent = %agent.name, "blocked alert failed"),
            }
        }
        Ok(sent)
    }

    async fn teammates(&self, recipient_id: &str) -> Result<Vec<String>> {
        Ok(self
            .repos
            .agents
            .list_all()
            .await?
            .into_iter()
            .filter(|agent| agent.id != recipient_id)
            .map(|agent| agent.name)
            .collect())
    }

    /// Invoke the gateway, turning an elapsed deadline into `AppError::Timeout`.
    async fn call(&self, request: GatewayRequest, timeout: Duration) -> Result<GatewayResponse> {
        let tool = request.tool;
        match tokio::time::timeout(timeout, self.gateway.invoke(request, timeout)).await {
            Ok(result) => result,
            Err(_) => Err(AppError::Timeout(format!(
                "{tool:?} did not finish within {}ms",
                timeout.as_millis()
            ))),
        }
    }
}

fn describe_failure(response: &GatewayResponse) -> String {
    match &response.error {
        Some(serde_json::Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
        None if response.ok => format!("unexpected result {}", response.result),
        None => "gateway reported failure".into(),
    }
}

/// Spawn the daemon loop as a background task.
#[must_use]
pub fn spawn_delivery_daemon(
    daemon: Arc<DeliveryDaemon>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move { daemon.run(cancel).await })
}
