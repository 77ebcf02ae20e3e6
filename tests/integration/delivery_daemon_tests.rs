//! Delivery daemon cycles against a scripted gateway.

use std::sync::Arc;
use std::time::Duration;

use citadel::daemon::{route_for, spawn_delivery_daemon, DeliveryRoute, GatewayTool};
use citadel::fanout::FanoutEngine;
use citadel::models::agent::{Agent, AgentRole, AgentStatus};
use citadel::models::task::{NewTask, Task};
use citadel::persistence::Repositories;
use citadel::tasks::{presence, TaskService};
use citadel::AppError;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use super::test_helpers::{daemon, ok, reply, seed_agent, spawn_accepted, store, ScriptedGateway};

async fn task_with(repos: &Repositories, title: &str, assignees: &[&Agent]) -> Task {
    TaskService::new(repos.clone())
        .create(&NewTask {
            title: title.into(),
            assignee_ids: assignees.iter().map(|agent| agent.id.clone()).collect(),
            ..NewTask::default()
        })
        .await
        .expect("task")
}

/// Mark everything currently pending as delivered.
async fn settle(repos: &Repositories) {
    for pending in repos.notifications.list_undelivered(100).await.expect("pending") {
        repos
            .notifications
            .mark_delivered(&pending.notification.id)
            .await
            .expect("settle");
    }
}

// ─── Routing ─────────────────────────────────────────────

#[tokio::test]
async fn routes_follow_kind_role_and_assignees() {
    let (_db, repos) = store().await;
    let atlas = seed_agent(&repos, "Atlas", AgentRole::Coordinator, Some("atlas")).await;
    let pixel = seed_agent(&repos, "Pixel", AgentRole::Social, Some("pixel")).await;
    let unassigned = task_with(&repos, "Open", &[]).await;
    let assigned = task_with(&repos, "Owned", &[&pixel]).await;
    let engine = FanoutEngine::new(repos.clone());

    // assignment to Pixel from task creation
    let pending = repos.notifications.list_undelivered(10).await.expect("pending");
    assert_eq!(route_for(&pending[0], Some(&assigned)), DeliveryRoute::Assignment);
    assert_eq!(route_for(&pending[0], None), DeliveryRoute::Ping);
    settle(&repos).await;

    engine
        .post_comment(&unassigned.id, &pixel.id, "@Atlas who takes this?")
        .await
        .expect("comment");
    let pending = repos.notifications.list_undelivered(10).await.expect("pending");
    assert_eq!(route_for(&pending[0], Some(&unassigned)), DeliveryRoute::Delegation);
    settle(&repos).await;

    engine
        .post_comment(&assigned.id, &atlas.id, "@Pixel status?")
        .await
        .expect("comment");
    let pending = repos.notifications.list_undelivered(10).await.expect("pending");
    assert_eq!(route_for(&pending[0], Some(&assigned)), DeliveryRoute::Conversation);
    settle(&repos).await;

    engine
        .post_comment(&assigned.id, &pixel.id, "on it")
        .await
        .expect("comment");
    let pending = repos.notifications.list_undelivered(10).await.expect("pending");
    assert_eq!(pending[0].notification.recipient_id, atlas.id);
    assert_eq!(route_for(&pending[0], Some(&assigned)), DeliveryRoute::Ping);
}

// ─── Delivery ────────────────────────────────────────────

#[tokio::test]
async fn subscriber_comment_is_pinged_and_marked() {
    let (_db, repos) = store().await;
    let alpha = seed_agent(&repos, "Alpha", AgentRole::Social, Some("alpha")).await;
    let delta = seed_agent(&repos, "Delta", AgentRole::Trading, Some("delta")).await;
    let task = task_with(&repos, "Ship it", &[]).await;
    repos.subscriptions.subscribe(&delta.id, &task.id).await.expect("sub");
    FanoutEngine::new(repos.clone())
        .post_comment(&task.id, &alpha.id, "pushed the fix")
        .await
        .expect("comment");

    let gateway = Arc::new(ScriptedGateway::new());
    let report = daemon(&repos, &gateway).poll_once().await;

    assert_eq!(report.cycle, 1);
    assert_eq!(report.attempted, 1);
    assert_eq!(report.delivered, 1);
    assert_eq!(report.failed, 0);

    let requests = gateway.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].tool, GatewayTool::SessionsSend);
    assert_eq!(requests[0].args["sessionKey"], "agent:delta:main");
    assert_eq!(
        requests[0].args["message"],
        "🔔 Citadel: Alpha commented on: Ship it"
    );
    assert!(repos.notifications.list_undelivered(10).await.expect("pending").is_empty());
}

#[tokio::test]
async fn recipient_without_session_key_stays_pending() {
    let (_db, repos) = store().await;
    let ghost = seed_agent(&repos, "Ghost", AgentRole::Generalist, None).await;
    task_with(&repos, "Haunt", &[&ghost]).await;

    let gateway = Arc::new(ScriptedGateway::new());
    let daemon = daemon(&repos, &gateway);
    let report = daemon.poll_once().await;

    assert_eq!(report.failed, 1);
    assert!(gateway.requests().is_empty());
    let pending = repos.notifications.list_undelivered(10).await.expect("pending");
    assert_eq!(pending.len(), 1);

    let err = daemon.deliver(&pending[0]).await.expect_err("no key");
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn assignment_spawns_sub_session() {
    let (_db, repos) = store().await;
    let pixel = seed_agent(&repos, "Pixel", AgentRole::Social, Some("pixel")).await;
    let task = task_with(&repos, "Launch post", &[&pixel]).await;

    let gateway = Arc::new(ScriptedGateway::new());
    gateway.push(Ok(spawn_accepted()));
    let report = daemon(&repos, &gateway).poll_once().await;

    assert_eq!(report.delivered, 1);
    let requests = gateway.requests();
    assert_eq!(requests.len(), 1);
    let spawn = &requests[0];
    assert_eq!(spawn.tool, GatewayTool::SessionsSpawn);
    assert_eq!(spawn.session_key.as_deref(), Some("agent:pixel:main"));
    assert_eq!(spawn.args["agentId"], "pixel");
    assert_eq!(spawn.args["runTimeoutSeconds"], 300);
    let prompt = spawn.args["task"].as_str().expect("prompt");
    assert!(prompt.starts_with("🔔 CITADEL TASK ASSIGNED: \"Launch post\""));
    assert!(prompt.contains(&task.id));
}

#[tokio::test]
async fn unaccepted_spawn_is_retried() {
    let (_db, repos) = store().await;
    let pixel = seed_agent(&repos, "Pixel", AgentRole::Social, Some("agent:pixel:main")).await;
    task_with(&repos, "Launch post", &[&pixel]).await;

    let gateway = Arc::new(ScriptedGateway::new());
    gateway.push(Ok(ok(json!({ "details": { "status": "forbidden" } }))));
    gateway.push(Ok(spawn_accepted()));
    let daemon = daemon(&repos, &gateway);

    let first = daemon.poll_once().await;
    assert_eq!(first.failed, 1);
    assert_eq!(
        repos.notifications.list_undelivered(10).await.expect("pending").len(),
        1
    );

    let second = daemon.poll_once().await;
    assert_eq!(second.cycle, 2);
    assert_eq!(second.delivered, 1);
    assert_eq!(gateway.requests().len(), 2);
}

#[tokio::test]
async fn mention_reply_posts_comment_and_document() {
    let (_db, repos) = store().await;
    let atlas = seed_agent(&repos, "Atlas", AgentRole::Coordinator, Some("atlas")).await;
    let pixel = seed_agent(&repos, "Pixel", AgentRole::Social, Some("pixel")).await;
    let task = task_with(&repos, "Launch post", &[&pixel]).await;
    settle(&repos).await;
    FanoutEngine::new(repos.clone())
        .post_comment(&task.id, &atlas.id, "@Pixel can you draft the copy?")
        .await
        .expect("comment");

    let body = "b".repeat(80);
    let gateway = Arc::new(ScriptedGateway::new());
    gateway.push(Ok(reply(&format!(
        "---COMMENT--- Drafted, see doc ---DOCUMENT_TITLE--- Launch copy ---DOCUMENT--- {body}"
    ))));
    let report = daemon(&repos, &gateway).poll_once().await;
    assert_eq!(report.delivered, 1);

    let send = &gateway.requests()[0];
    assert_eq!(send.tool, GatewayTool::SessionsSend);
    assert_eq!(send.args["sessionKey"], "agent:pixel:main");
    let prompt = send.args["message"].as_str().expect("prompt");
    assert!(prompt.starts_with(
        "🔔 Citadel @mention on task \"Launch post\": Atlas mentioned you in: Launch post"
    ));
    assert!(prompt.contains("- @Pixel can you draft the copy?"));

    let comments = repos.messages.list_by_task(&task.id).await.expect("comments");
    assert_eq!(comments.len(), 2);
    assert_eq!(comments[1].agent_name, "Pixel");
    assert_eq!(comments[1].message.content, "Drafted, see doc");

    let documents = repos.documents.list_by_task(&task.id).await.expect("docs");
    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0].title, "Launch copy");
    assert_eq!(documents[0].content, body);
    assert_eq!(documents[0].created_by, pixel.id);

    // the posted reply fans out to Atlas as a subscriber
    let pending = repos.notifications.list_undelivered(10).await.expect("pending");
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].notification.recipient_id, atlas.id);
}

#[tokio::test]
async fn short_document_body_posts_only_comment() {
    let (_db, repos) = store().await;
    let atlas = seed_agent(&repos, "Atlas", AgentRole::Coordinator, Some("atlas")).await;
    let pixel = seed_agent(&repos, "Pixel", AgentRole::Social, Some("pixel")).await;
    let task = task_with(&repos, "Launch post", &[&pixel]).await;
    settle(&repos).await;
    FanoutEngine::new(repos.clone())
        .post_comment(&task.id, &atlas.id, "@Pixel quick note?")
        .await
        .expect("comment");

    let gateway = Arc::new(ScriptedGateway::new());
    gateway.push(Ok(reply(&format!(
        "---COMMENT--- ack ---DOCUMENT--- {}",
        "s".repeat(40)
    ))));
    daemon(&repos, &gateway).poll_once().await;

    let comments = repos.messages.list_by_task(&task.id).await.expect("comments");
    assert_eq!(comments.last().expect("reply").message.content, "ack");
    assert!(repos.documents.list_by_task(&task.id).await.expect("docs").is_empty());
}

#[tokio::test]
async fn silent_or_rejected_reply_posts_nothing() {
    let (_db, repos) = store().await;
    let atlas = seed_agent(&repos, "Atlas", AgentRole::Coordinator, Some("atlas")).await;
    let pixel = seed_agent(&repos, "Pixel", AgentRole::Social, Some("pixel")).await;
    let task = task_with(&repos, "Launch post", &[&pixel]).await;
    settle(&repos).await;
    let engine = FanoutEngine::new(repos.clone());
    engine
        .post_comment(&task.id, &atlas.id, "@Pixel one")
        .await
        .expect("comment");
    engine
        .post_comment(&task.id, &atlas.id, "@Pixel two")
        .await
        .expect("comment");

    let gateway = Arc::new(ScriptedGateway::new());
    gateway.push(Ok(reply("NO_REPLY")));
    gateway.push(Ok(ok(json!({
        "content": [{ "type": "text", "text": "{\"status\":\"timeout\",\"error\":\"slow\"}" }]
    }))));
    let report = daemon(&repos, &gateway).poll_once().await;

    assert_eq!(report.delivered, 2);
    assert_eq!(
        repos.messages.list_by_task(&task.id).await.expect("comments").len(),
        2,
        "only the two original comments"
    );
}

#[tokio::test]
async fn unassigned_task_mention_delegates_to_supervisor() {
    let (_db, repos) = store().await;
    seed_agent(&repos, "Atlas", AgentRole::Coordinator, Some("atlas")).await;
    let pixel = seed_agent(&repos, "Pixel", AgentRole::Social, Some("pixel")).await;
    let task = task_with(&repos, "Market scan", &[]).await;
    FanoutEngine::new(repos.clone())
        .post_comment(&task.id, &pixel.id, "@Atlas who should take this?")
        .await
        .expect("comment");

    let gateway = Arc::new(ScriptedGateway::new());
    gateway.push(Ok(spawn_accepted()));
    let report = daemon(&repos, &gateway).poll_once().await;

    assert_eq!(report.delivered, 1);
    let spawn = &gateway.requests()[0];
    assert_eq!(spawn.tool, GatewayTool::SessionsSpawn);
    assert_eq!(spawn.args["agentId"], "atlas");
    let prompt = spawn.args["task"].as_str().expect("prompt");
    assert!(prompt.starts_with("🔔 CITADEL DELEGATION: \"Market scan\""));
    assert!(prompt.contains("Trigger: Pixel mentioned you in: Market scan"));
    assert!(prompt.contains("@Pixel"), "teammates exclude the recipient");
    assert!(!prompt.contains("@Atlas,"));
}

#[tokio::test]
async fn missing_task_falls_back_to_ping() {
    let (_db, repos) = store().await;
    let pixel = seed_agent(&repos, "Pixel", AgentRole::Social, Some("pixel")).await;
    let task = task_with(&repos, "Gone soon", &[&pixel]).await;
    TaskService::new(repos.clone())
        .remove(&task.id)
        .await
        .expect("remove");

    let gateway = Arc::new(ScriptedGateway::new());
    let report = daemon(&repos, &gateway).poll_once().await;

    assert_eq!(report.delivered, 1);
    assert_eq!(
        gateway.sent_messages(),
        vec!["🔔 Citadel: You were assigned to: Gone soon".to_owned()]
    );
}

#[tokio::test]
async fn slow_gateway_times_out_and_keeps_notification() {
    let (_db, repos) = store().await;
    let alpha = seed_agent(&repos, "Alpha", AgentRole::Social, None).await;
    let delta = seed_agent(&repos, "Delta", AgentRole::Trading, Some("delta")).await;
    let task = task_with(&repos, "Ship it", &[]).await;
    repos.subscriptions.subscribe(&delta.id, &task.id).await.expect("sub");
    FanoutEngine::new(repos.clone())
        .post_comment(&task.id, &alpha.id, "update")
        .await
        .expect("comment");

    let gateway = Arc::new(ScriptedGateway::slow(Duration::from_secs(2)));
    let daemon = daemon(&repos, &gateway);
    let pending = repos.notifications.list_undelivered(10).await.expect("pending");

    let err = daemon.deliver(&pending[0]).await.expect_err("timeout");
    assert!(matches!(err, AppError::Timeout(_)));
    assert_eq!(
        repos.notifications.list_undelivered(10).await.expect("pending").len(),
        1
    );
}

#[tokio::test]
async fn gateway_failure_leaves_notification_pending() {
    let (_db, repos) = store().await;
    let alpha = seed_agent(&repos, "Alpha", AgentRole::Social, None).await;
    let delta = seed_agent(&repos, "Delta", AgentRole::Trading, Some("delta")).await;
    let task = task_with(&repos, "Ship it", &[]).await;
    repos.subscriptions.subscribe(&delta.id, &task.id).await.expect("sub");
    FanoutEngine::new(repos.clone())
        .post_comment(&task.id, &alpha.id, "update")
        .await
        .expect("comment");

    let gateway = Arc::new(ScriptedGateway::new());
    gateway.push(Err(AppError::Gateway("connection refused".into())));
    let daemon = daemon(&repos, &gateway);

    assert_eq!(daemon.poll_once().await.failed, 1);
    assert_eq!(
        repos.notifications.list_undelivered(10).await.expect("pending").len(),
        1
    );
    assert_eq!(daemon.poll_once().await.delivered, 1);
    assert_eq!(gateway.requests().len(), 2);
}

#[tokio::test]
async fn send_answered_with_ok_false_still_counts_as_delivered() {
    let (_db, repos) = store().await;
    let atlas = seed_agent(&repos, "Atlas", AgentRole::Coordinator, Some("atlas")).await;
    let pixel = seed_agent(&repos, "Pixel", AgentRole::Social, Some("pixel")).await;
    let task = task_with(&repos, "Launch post", &[&pixel]).await;
    settle(&repos).await;
    FanoutEngine::new(repos.clone())
        .post_comment(&task.id, &atlas.id, "@Pixel status?")
        .await
        .expect("comment");

    let gateway = Arc::new(ScriptedGateway::new());
    gateway.push(Ok(citadel::daemon::GatewayResponse {
        ok: false,
        result: json!(null),
        error: Some(json!("session busy")),
    }));
    let daemon = daemon(&repos, &gateway);

    let report = daemon.poll_once().await;
    assert_eq!(report.delivered, 1);
    assert_eq!(report.failed, 0);
    assert!(repos.notifications.list_undelivered(10).await.expect("pending").is_empty());
    assert_eq!(
        repos.messages.list_by_task(&task.id).await.expect("comments").len(),
        1,
        "nothing to post back"
    );
    assert_eq!(daemon.poll_once().await.delivered, 0);
    assert_eq!(gateway.requests().len(), 1, "no resend");
}

#[tokio::test]
async fn rejected_spawn_stays_pending() {
    let (_db, repos) = store().await;
    let pixel = seed_agent(&repos, "Pixel", AgentRole::Social, Some("pixel")).await;
    task_with(&repos, "Draft thread", &[&pixel]).await;

    let gateway = Arc::new(ScriptedGateway::new());
    gateway.push(Ok(ok(json!({ "details": { "status": "rejected" } }))));
    gateway.push(Ok(spawn_accepted()));
    let daemon = daemon(&repos, &gateway);

    assert_eq!(daemon.poll_once().await.failed, 1);
    assert_eq!(daemon.poll_once().await.delivered, 1);
    assert!(gateway
        .requests()
        .iter()
        .all(|request| request.tool == GatewayTool::SessionsSpawn));
}

// ─── Blocked alerts ──────────────────────────────────────

#[tokio::test]
async fn blocked_agent_alerts_supervisor_once_per_episode() {
    let (_db, repos) = store().await;
    seed_agent(&repos, "Atlas", AgentRole::Coordinator, Some("atlas")).await;
    let pixel = seed_agent(&repos, "Pixel", AgentRole::Social, Some("pixel")).await;
    let pixel = presence::report_status(&repos, &pixel, AgentStatus::Blocked, Some("waiting on keys"))
        .await
        .expect("blocked");

    let gateway = Arc::new(ScriptedGateway::new());
    let daemon = daemon(&repos, &gateway);

    assert_eq!(daemon.poll_once().await.alerts_sent, 1);
    assert_eq!(daemon.poll_once().await.alerts_sent, 0, "one alert per episode");
    assert!(daemon.alerts().contains(&pixel.id));

    let requests = gateway.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].args["sessionKey"], "agent:atlas:main");
    assert_eq!(
        requests[0].args["message"],
        "🚨 Citadel: Pixel is BLOCKED (waiting on keys). Check their task and help unblock them."
    );

    let pixel = presence::report_status(&repos, &pixel, AgentStatus::Working, None)
        .await
        .expect("unblocked");
    assert_eq!(daemon.poll_once().await.alerts_sent, 0);
    assert!(daemon.alerts().is_empty());

    presence::report_status(&repos, &pixel, AgentStatus::Blocked, None)
        .await
        .expect("blocked again");
    assert_eq!(daemon.poll_once().await.alerts_sent, 1, "new episode alerts again");
}

#[tokio::test]
async fn blocked_supervisor_is_not_alerted_about_itself() {
    let (_db, repos) = store().await;
    let atlas = seed_agent(&repos, "Atlas", AgentRole::Coordinator, Some("atlas")).await;
    presence::report_status(&repos, &atlas, AgentStatus::Blocked, None)
        .await
        .expect("blocked");

    let gateway = Arc::new(ScriptedGateway::new());
    let sent = daemon(&repos, &gateway).check_blocked().await.expect("check");

    assert_eq!(sent, 0);
    assert!(gateway.requests().is_empty());
}

#[tokio::test]
async fn failed_alert_is_retried_next_check() {
    let (_db, repos) = store().await;
    seed_agent(&repos, "Atlas", AgentRole::Coordinator, Some("atlas")).await;
    let pixel = seed_agent(&repos, "Pixel", AgentRole::Social, None).await;
    presence::report_status(&repos, &pixel, AgentStatus::Blocked, None)
        .await
        .expect("blocked");

    let gateway = Arc::new(ScriptedGateway::new());
    gateway.push(Err(AppError::Gateway("down".into())));
    let daemon = daemon(&repos, &gateway);

    assert_eq!(daemon.check_blocked().await.expect("check"), 0);
    assert!(!daemon.alerts().contains(&pixel.id));
    assert_eq!(daemon.check_blocked().await.expect("check"), 1);
    assert!(gateway.sent_messages()[1].contains("(no current task reported)"));
}

// ─── Loop ────────────────────────────────────────────────

#[tokio::test]
async fn background_loop_delivers_and_stops_on_cancel() {
    let (_db, repos) = store().await;
    let pixel = seed_agent(&repos, "Pixel", AgentRole::Social, Some("pixel")).await;
    task_with(&repos, "Launch post", &[&pixel]).await;

    let gateway = Arc::new(ScriptedGateway::new());
    gateway.push(Ok(spawn_accepted()));
    let cancel = CancellationToken::new();
    let handle = spawn_delivery_daemon(Arc::new(daemon(&repos, &gateway)), cancel.clone());

    let delivered = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if repos
                .notifications
                .list_undelivered(10)
                .await
                .expect("pending")
                .is_empty()
            {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(delivered.is_ok(), "daemon delivered within the deadline");

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("daemon stops")
        .expect("no panic");
}
