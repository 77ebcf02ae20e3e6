//! Unit tests for the notification repository.

use std::sync::Arc;

use citadel::models::agent::{Agent, AgentLevel, AgentRole};
use citadel::models::notification::Notification;
use citadel::persistence::{db, Repositories};
use citadel::AppError;

async fn repos() -> Repositories {
    let db = db::connect_memory().await.expect("db");
    Repositories::new(&Arc::new(db))
}

async fn notify(repos: &Repositories, recipient: &str, title: &str) -> Notification {
    repos
        .notifications
        .insert(&Notification::comment(recipient, "author", "Atlas", "t1", title))
        .await
        .expect("insert")
}

#[tokio::test]
async fn undelivered_come_back_oldest_first_with_addressing() {
    let repos = repos().await;
    let pixel = repos
        .agents
        .insert(
            &Agent::new("Pixel", AgentRole::Social, AgentLevel::Specialist)
                .with_session_key("pixel"),
        )
        .await
        .expect("agent");

    let first = notify(&repos, &pixel.id, "one").await;
    let second = notify(&repos, "ghost", "two").await;
    let third = notify(&repos, &pixel.id, "three").await;

    let pending = repos.notifications.list_undelivered(50).await.expect("list");
    let ids: Vec<&str> = pending
        .iter()
        .map(|p| p.notification.id.as_str())
        .collect();
    assert_eq!(ids, vec![first.id.as_str(), second.id.as_str(), third.id.as_str()]);

    assert_eq!(pending[0].recipient_name, "Pixel");
    assert_eq!(pending[0].session_key.as_deref(), Some("pixel"));
    assert_eq!(pending[0].recipient_role, AgentRole::Social);
    assert_eq!(pending[1].recipient_name, "Unknown");
    assert_eq!(pending[1].session_key, None);

    let limited = repos.notifications.list_undelivered(2).await.expect("list");
    assert_eq!(limited.len(), 2);
}

#[tokio::test]
async fn mark_delivered_is_idempotent_and_leaves_read_alone() {
    let repos = repos().await;
    let notification = notify(&repos, "r1", "one").await;

    repos
        .notifications
        .mark_delivered(&notification.id)
        .await
        .expect("deliver");
    repos
        .notifications
        .mark_delivered(&notification.id)
        .await
        .expect("deliver again");

    assert!(repos
        .notifications
        .list_undelivered(50)
        .await
        .expect("list")
        .is_empty());
    let stored = repos
        .notifications
        .get(&notification.id)
        .await
        .expect("get")
        .expect("stored");
    assert!(stored.delivered);
    assert!(!stored.read);
}

#[tokio::test]
async fn marking_missing_notification_is_not_found() {
    let repos = repos().await;
    let err = repos
        .notifications
        .mark_delivered("missing")
        .await
        .expect_err("missing");
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn take_unread_marks_exactly_what_it_returns() {
    let repos = repos().await;
    for title in ["a", "b", "c"] {
        notify(&repos, "r1", title).await;
    }
    notify(&repos, "r2", "other").await;

    let taken = repos.notifications.take_unread("r1", 2).await.expect("take");
    assert_eq!(taken.len(), 2);
    assert_eq!(taken[0].message, "Atlas commented on: c", "newest first");
    assert_eq!(repos.notifications.count_unread("r1").await.expect("count"), 1);
    assert_eq!(repos.notifications.count_unread("r2").await.expect("count"), 1);

    let undelivered = repos.notifications.list_undelivered(50).await.expect("list");
    assert_eq!(undelivered.len(), 4, "read does not imply delivered");
}

#[tokio::test]
async fn mark_all_read_counts_changes() {
    let repos = repos().await;
    let first = notify(&repos, "r1", "a").await;
    notify(&repos, "r1", "b").await;
    repos.notifications.mark_read(&first.id).await.expect("read");

    assert_eq!(repos.notifications.mark_all_read("r1").await.expect("all"), 1);
    assert!(repos
        .notifications
        .list_for_recipient("r1", true, 50)
        .await
        .expect("list")
        .is_empty());
    assert_eq!(
        repos
            .notifications
            .list_for_recipient("r1", false, 50)
            .await
            .expect("list")
            .len(),
        2
    );
}

#[tokio::test]
async fn undecodable_row_is_skipped_not_fatal() {
    let db = Arc::new(db::connect_memory().await.expect("db"));
    let repos = Repositories::new(&db);
    sqlx::query(
        "INSERT INTO notification (id, recipient_id, author_name, kind, message, created_at)
         VALUES ('broken', 'ghost', 'Atlas', 'comment', 'lost', '0000-not-a-time')",
    )
    .execute(db.as_ref())
    .await
    .expect("raw insert");
    let good = notify(&repos, "ghost", "still delivered").await;

    let pending = repos.notifications.list_undelivered(50).await.expect("list");

    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].notification.id, good.id);
}
