//! Retention purge of old notifications and activity.

use chrono::{Duration, Utc};
use citadel::models::activity::{Activity, ActivityAction, ActivityTarget};
use citadel::models::notification::Notification;
use citadel::persistence::retention;

use super::test_helpers::store;

fn aged_notification(days: i64, read: bool, delivered: bool) -> Notification {
    let mut notification = Notification::comment("r1", "a1", "Atlas", "t1", "Launch");
    notification.created_at = Utc::now() - Duration::days(days);
    notification.read = read;
    notification.delivered = delivered;
    notification
}

#[tokio::test]
async fn purge_removes_only_expired_settled_rows() {
    let (db, repos) = store().await;

    let old_settled = aged_notification(40, true, true);
    let old_unread = aged_notification(40, false, true);
    let old_undelivered = aged_notification(40, true, false);
    let fresh_settled = aged_notification(1, true, true);
    for notification in [&old_settled, &old_unread, &old_undelivered, &fresh_settled] {
        repos.notifications.insert(notification).await.expect("insert");
    }

    let mut old_activity = Activity::new(
        None,
        ActivityAction::Create,
        ActivityTarget::Task,
        "t1",
        "created task: Launch",
    );
    old_activity.created_at = Utc::now() - Duration::days(31);
    repos.activities.insert(&old_activity).await.expect("insert");
    repos
        .activities
        .insert(&Activity::new(
            None,
            ActivityAction::Comment,
            ActivityTarget::Comment,
            "m1",
            "commented on: Launch",
        ))
        .await
        .expect("insert");

    let report = retention::purge(&db, 30).await.expect("purge");

    assert_eq!(report.notifications, 1);
    assert_eq!(report.activities, 1);
    assert!(repos
        .notifications
        .get(&old_settled.id)
        .await
        .expect("get")
        .is_none());
    for kept in [&old_unread, &old_undelivered, &fresh_settled] {
        assert!(repos.notifications.get(&kept.id).await.expect("get").is_some());
    }
    assert_eq!(repos.activities.list_recent(None, 10).await.expect("feed").len(), 1);
}

#[tokio::test]
async fn purge_on_empty_store_is_noop() {
    let (db, _repos) = store().await;
    let report = retention::purge(&db, 30).await.expect("purge");
    assert_eq!(report, retention::PurgeReport::default());
}

#[tokio::test]
async fn retention_task_stops_on_cancel() {
    let (db, _repos) = store().await;
    let cancel = tokio_util::sync::CancellationToken::new();
    let handle = retention::spawn_retention_task(db, 30, cancel.clone());

    cancel.cancel();
    tokio::time::timeout(std::time::Duration::from_secs(2), handle)
        .await
        .expect("task stops")
        .expect("no panic");
}
