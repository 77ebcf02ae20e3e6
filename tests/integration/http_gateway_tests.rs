//! `HttpGateway` against a local fake gateway server.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use citadel::daemon::{
    DeliveryDaemon, GatewayReply, GatewayRequest, GatewayResponse, GatewayTool, HttpGateway,
    SessionGateway,
};
use citadel::fanout::FanoutEngine;
use citadel::models::agent::AgentRole;
use citadel::models::task::NewTask;
use citadel::tasks::TaskService;
use citadel::AppError;
use serde_json::{json, Value};

use super::test_helpers::{fast_settings, seed_agent, store};

type Recorded = Arc<Mutex<Vec<(Option<String>, Value)>>>;

async fn invoke(
    State(recorded): State<Recorded>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let auth = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);
    recorded.lock().unwrap().push((auth, body.clone()));

    match body["args"]["sessionKey"].as_str().unwrap_or_default() {
        "agent:broken:main" => (StatusCode::BAD_GATEWAY, "upstream down").into_response(),
        "agent:garbage:main" => (StatusCode::OK, "definitely not json").into_response(),
        "agent:empty:main" => StatusCode::OK.into_response(),
        "agent:refused:main" => Json(json!({ "ok": false, "error": "busy" })).into_response(),
        "agent:slow:main" => {
            tokio::time::sleep(Duration::from_secs(2)).await;
            Json(json!({ "ok": true })).into_response()
        }
        _ if body["tool"] == "sessions_spawn" => Json(json!({
            "ok": true,
            "result": { "details": { "status": "accepted", "runId": "r-1" } }
        }))
        .into_response(),
        _ => Json(json!({
            "ok": true,
            "result": { "details": { "reply": "hello from the agent" } }
        }))
        .into_response(),
    }
}

async fn fake_gateway() -> (String, Recorded) {
    let recorded: Recorded = Arc::default();
    let app = Router::new()
        .route("/tools/invoke", post(invoke))
        .with_state(Arc::clone(&recorded));
    let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    (format!("http://{addr}/"), recorded)
}

const TIMEOUT: Duration = Duration::from_millis(500);

#[tokio::test]
async fn send_posts_tool_invocation_with_bearer_token() {
    let (url, recorded) = fake_gateway().await;
    let gateway = HttpGateway::new(&url, "s3cret");

    let response = gateway
        .invoke(GatewayRequest::send("agent:pixel:main", "ping"), TIMEOUT)
        .await
        .expect("invoke");

    assert!(response.ok);
    assert_eq!(
        GatewayReply::decode(&response),
        GatewayReply::Details("hello from the agent".into())
    );

    let calls = recorded.lock().unwrap().clone();
    assert_eq!(calls.len(), 1);
    let (auth, body) = &calls[0];
    assert_eq!(auth.as_deref(), Some("Bearer s3cret"));
    assert_eq!(body["tool"], "sessions_send");
    assert_eq!(body["args"]["sessionKey"], "agent:pixel:main");
    assert_eq!(body["args"]["message"], "ping");
    assert!(body.get("sessionKey").is_none());
}

#[tokio::test]
async fn spawn_carries_session_key_and_no_token_means_no_auth() {
    let (url, recorded) = fake_gateway().await;
    let gateway = HttpGateway::new(&url, "");

    let request = GatewayRequest::spawn("pixel", "agent:pixel:main", "do the work", 300);
    assert_eq!(request.tool, GatewayTool::SessionsSpawn);
    let response = gateway.invoke(request, TIMEOUT).await.expect("invoke");
    assert!(response.spawn_accepted());

    let calls = recorded.lock().unwrap().clone();
    let (auth, body) = &calls[0];
    assert_eq!(auth, &None);
    assert_eq!(body["sessionKey"], "agent:pixel:main");
    assert_eq!(body["args"]["agentId"], "pixel");
    assert_eq!(body["args"]["runTimeoutSeconds"], 300);
}

#[tokio::test]
async fn non_success_status_is_gateway_error() {
    let (url, _) = fake_gateway().await;
    let err = HttpGateway::new(&url, "")
        .invoke(GatewayRequest::send("agent:broken:main", "ping"), TIMEOUT)
        .await
        .expect_err("502");
    assert!(matches!(err, AppError::Gateway(msg) if msg.contains("502") && msg.contains("upstream down")));
}

#[tokio::test]
async fn empty_or_non_json_success_body_is_default_response() {
    let (url, _) = fake_gateway().await;
    let gateway = HttpGateway::new(&url, "");

    for key in ["agent:empty:main", "agent:garbage:main"] {
        let response = gateway
            .invoke(GatewayRequest::send(key, "ping"), TIMEOUT)
            .await
            .expect("2xx is not an error");
        assert_eq!(response, GatewayResponse::default(), "{key}");
        assert_eq!(GatewayReply::decode(&response), GatewayReply::None);
    }
}

#[tokio::test]
async fn daemon_marks_delivered_on_any_success_status() {
    let (url, recorded) = fake_gateway().await;
    let (_db, repos) = store().await;
    let atlas = seed_agent(&repos, "Atlas", AgentRole::Coordinator, Some("atlas")).await;
    let empty = seed_agent(&repos, "Empty", AgentRole::Social, Some("empty")).await;
    let refused = seed_agent(&repos, "Refused", AgentRole::Generalist, Some("refused")).await;
    let task = TaskService::new(repos.clone())
        .create(&NewTask {
            title: "Weekly recap".into(),
            assignee_ids: vec![empty.id.clone(), refused.id.clone()],
            ..NewTask::default()
        })
        .await
        .expect("task");
    for pending in repos.notifications.list_undelivered(10).await.expect("pending") {
        repos
            .notifications
            .mark_delivered(&pending.notification.id)
            .await
            .expect("settle");
    }
    FanoutEngine::new(repos.clone())
        .post_comment(&task.id, &atlas.id, "@Empty @Refused numbers?")
        .await
        .expect("comment");

    let daemon = DeliveryDaemon::new(
        repos.clone(),
        Arc::new(HttpGateway::new(&url, "")) as Arc<dyn SessionGateway>,
        fast_settings(),
    );
    let report = daemon.poll_once().await;

    assert_eq!(report.delivered, 2);
    assert_eq!(report.failed, 0);
    assert!(repos.notifications.list_undelivered(10).await.expect("pending").is_empty());
    assert_eq!(recorded.lock().unwrap().len(), 2);
    assert_eq!(
        repos.messages.list_by_task(&task.id).await.expect("comments").len(),
        1
    );
}

#[tokio::test]
async fn slow_gateway_is_timeout() {
    let (url, _) = fake_gateway().await;
    let err = HttpGateway::new(&url, "")
        .invoke(
            GatewayRequest::send("agent:slow:main", "ping"),
            Duration::from_millis(100),
        )
        .await
        .expect_err("timeout");
    assert!(matches!(err, AppError::Timeout(_)));
}

#[tokio::test]
async fn unreachable_gateway_is_gateway_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let err = HttpGateway::new(&format!("http://{addr}"), "")
        .invoke(GatewayRequest::send("agent:pixel:main", "ping"), TIMEOUT)
        .await
        .expect_err("refused");
    assert!(matches!(err, AppError::Gateway(_)));
}
