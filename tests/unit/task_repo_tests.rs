//! Unit tests for task persistence and the task store service.

use std::sync::Arc;

use chrono::{Duration, Utc};
use citadel::models::activity::ActivityAction;
use citadel::models::agent::{Agent, AgentLevel, AgentRole};
use citadel::models::message::Message;
use citadel::models::task::{NewTask, Task, TaskPatch, TaskPriority, TaskStatus};
use citadel::persistence::{db, Repositories};
use citadel::tasks::TaskService;
use citadel::AppError;

async fn setup() -> (Repositories, TaskService) {
    let db = db::connect_memory().await.expect("db");
    let repos = Repositories::new(&Arc::new(db));
    let service = TaskService::new(repos.clone());
    (repos, service)
}

async fn agent(repos: &Repositories, name: &str) -> Agent {
    repos
        .agents
        .insert(&Agent::new(name, AgentRole::Generalist, AgentLevel::Specialist))
        .await
        .expect("agent")
}

fn new_task(title: &str, priority: TaskPriority) -> NewTask {
    NewTask {
        title: title.into(),
        priority,
        ..NewTask::default()
    }
}

// ─── Repository ──────────────────────────────────────────

#[tokio::test]
async fn insert_round_trips_lists() {
    let (repos, _) = setup().await;
    let task = Task::from_new(&NewTask {
        title: "Launch".into(),
        description: Some("copy + art".into()),
        tags: vec!["x".into(), "growth".into()],
        assignee_ids: vec!["a1".into()],
        ..NewTask::default()
    });
    repos.tasks.insert(&task).await.expect("insert");

    let stored = repos.tasks.get(&task.id).await.expect("get").expect("task");
    assert_eq!(stored.title, "Launch");
    assert_eq!(stored.description.as_deref(), Some("copy + art"));
    assert_eq!(stored.tags, vec!["x", "growth"]);
    assert_eq!(stored.assignee_ids, vec!["a1"]);
    assert_eq!(stored.status, TaskStatus::Inbox);
    assert_eq!(stored.display_status(), TaskStatus::Assigned);
    assert_eq!(
        stored.created_at.timestamp_micros(),
        task.created_at.timestamp_micros()
    );
}

#[tokio::test]
async fn list_for_assignee_matches_exact_ids() {
    let (repos, _) = setup().await;
    let mine = Task::from_new(&NewTask {
        title: "mine".into(),
        assignee_ids: vec!["a1".into(), "b2".into()],
        ..NewTask::default()
    });
    let lookalike = Task::from_new(&NewTask {
        title: "not mine".into(),
        assignee_ids: vec!["a10".into()],
        ..NewTask::default()
    });
    repos.tasks.insert(&mine).await.expect("insert");
    repos.tasks.insert(&lookalike).await.expect("insert");

    let found = repos.tasks.list_for_assignee("a1").await.expect("list");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, mine.id);
}

#[tokio::test]
async fn save_on_missing_task_is_not_found() {
    let (repos, _) = setup().await;
    let ghost = Task::from_new(&new_task("ghost", TaskPriority::Low));
    let err = repos.tasks.save(&ghost).await.expect_err("missing");
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn updated_since_uses_window() {
    let (repos, service) = setup().await;
    let task = service
        .create(&new_task("recent", TaskPriority::Medium))
        .await
        .expect("create");

    let recent = repos
        .tasks
        .list_updated_since(Utc::now() - Duration::hours(1))
        .await
        .expect("list");
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].id, task.id);

    let future = repos
        .tasks
        .list_updated_since(Utc::now() + Duration::hours(1))
        .await
        .expect("list");
    assert!(future.is_empty());
}

// ─── Service ─────────────────────────────────────────────

#[tokio::test]
async fn update_status_stamps_and_logs() {
    let (repos, service) = setup().await;
    let pixel = agent(&repos, "Pixel").await;
    let task = service
        .create(&new_task("Launch", TaskPriority::High))
        .await
        .expect("create");

    let moved = service
        .update_status(&task.id, TaskStatus::Review, Some(pixel.id.as_str()))
        .await
        .expect("update")
        .expect("task exists");
    assert_eq!(moved.status, TaskStatus::Review);
    assert!(moved.updated_at >= task.updated_at);

    // any edge is allowed, including backwards
    let back = service
        .update_status(&task.id, TaskStatus::Inbox, None)
        .await
        .expect("update")
        .expect("task exists");
    assert_eq!(back.status, TaskStatus::Inbox);

    let feed = repos.activities.list_recent(None, 10).await.expect("feed");
    let statuses = feed
        .iter()
        .filter(|view| view.activity.action == ActivityAction::Status)
        .count();
    assert_eq!(statuses, 2);
}

#[tokio::test]
async fn assign_notifies_only_new_assignees() {
    let (repos, service) = setup().await;
    let atlas = agent(&repos, "Atlas").await;
    let pixel = agent(&repos, "Pixel").await;
    let task = service
        .create(&new_task("Launch", TaskPriority::Medium))
        .await
        .expect("create");

    service
        .assign(&task.id, &pixel.id, Some(atlas.id.as_str()))
        .await
        .expect("assign")
        .expect("task");
    let again = service
        .assign(&task.id, &pixel.id, Some(atlas.id.as_str()))
        .await
        .expect("assign again")
        .expect("task");

    assert_eq!(again.assignee_ids, vec![pixel.id.clone()]);
    let notifications = repos
        .notifications
        .list_for_recipient(&pixel.id, false, 10)
        .await
        .expect("list");
    assert_eq!(notifications.len(), 1);
    assert!(notifications[0].is_assignment());
    assert_eq!(notifications[0].author_name, "Atlas");
    assert!(repos
        .subscriptions
        .is_subscribed(&pixel.id, &task.id)
        .await
        .expect("query"));
}

#[tokio::test]
async fn patch_adding_assignee_notifies_once() {
    let (repos, service) = setup().await;
    let pixel = agent(&repos, "Pixel").await;
    let ledger = agent(&repos, "Ledger").await;
    let task = service
        .create(&NewTask {
            title: "Launch".into(),
            assignee_ids: vec![pixel.id.clone()],
            ..NewTask::default()
        })
        .await
        .expect("create");

    let patched = service
        .update(
            &task.id,
            &TaskPatch {
                title: Some("Launch v2".into()),
                assignee_ids: Some(vec![pixel.id.clone(), ledger.id.clone()]),
                ..TaskPatch::default()
            },
        )
        .await
        .expect("update")
        .expect("task");

    assert_eq!(patched.title, "Launch v2");
    assert_eq!(
        repos
            .notifications
            .list_for_recipient(&pixel.id, false, 10)
            .await
            .expect("list")
            .len(),
        1,
        "existing assignee is not re-notified"
    );
    let ledger_notes = repos
        .notifications
        .list_for_recipient(&ledger.id, false, 10)
        .await
        .expect("list");
    assert_eq!(ledger_notes.len(), 1);
    assert_eq!(ledger_notes[0].author_name, "System");
    assert_eq!(ledger_notes[0].author_id, None);
}

#[tokio::test]
async fn patch_assignment_speaks_for_creator_with_previous_title() {
    let (repos, service) = setup().await;
    let atlas = agent(&repos, "Atlas").await;
    let ledger = agent(&repos, "Ledger").await;
    let task = service
        .create(&NewTask {
            title: "Audit".into(),
            creator_id: Some(atlas.id.clone()),
            ..NewTask::default()
        })
        .await
        .expect("create");

    service
        .update(
            &task.id,
            &TaskPatch {
                title: Some("Audit keys".into()),
                assignee_ids: Some(vec![ledger.id.clone()]),
                ..TaskPatch::default()
            },
        )
        .await
        .expect("update")
        .expect("task");

    let notes = repos
        .notifications
        .list_for_recipient(&ledger.id, false, 10)
        .await
        .expect("list");
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].author_name, "Atlas");
    assert_eq!(notes[0].author_id.as_deref(), Some(atlas.id.as_str()));
    assert!(notes[0].message.ends_with("Audit"), "{}", notes[0].message);
    assert!(!notes[0].message.contains("Audit keys"));

    let assigned = repos
        .activities
        .list_recent(None, 10)
        .await
        .expect("feed")
        .into_iter()
        .find(|view| view.activity.action == ActivityAction::Assign)
        .expect("assign activity");
    assert_eq!(assigned.activity.agent_id.as_deref(), Some(ledger.id.as_str()));
    assert_eq!(assigned.activity.description, "assigned to: Audit");
    assert_eq!(assigned.agent_name, "Ledger");
    assert!(repos
        .subscriptions
        .is_subscribed(&ledger.id, &task.id)
        .await
        .expect("query"));
}

#[tokio::test]
async fn inbox_lists_unclaimed_by_priority() {
    let (_, service) = setup().await;
    service
        .create(&new_task("low", TaskPriority::Low))
        .await
        .expect("create");
    service
        .create(&new_task("urgent", TaskPriority::Urgent))
        .await
        .expect("create");
    service
        .create(&NewTask {
            title: "claimed".into(),
            assignee_ids: vec!["someone".into()],
            ..NewTask::default()
        })
        .await
        .expect("create");

    let titles: Vec<String> = service
        .list_inbox()
        .await
        .expect("inbox")
        .into_iter()
        .map(|task| task.title)
        .collect();
    assert_eq!(titles, vec!["urgent", "low"]);
}

#[tokio::test]
async fn remove_deletes_comments_and_subscriptions() {
    let (repos, service) = setup().await;
    let pixel = agent(&repos, "Pixel").await;
    let task = service
        .create(&NewTask {
            title: "Launch".into(),
            creator_id: Some(pixel.id.clone()),
            ..NewTask::default()
        })
        .await
        .expect("create");
    repos
        .messages
        .insert(&Message::new(&task.id, &pixel.id, "hello"))
        .await
        .expect("message");

    assert!(service.remove(&task.id).await.expect("remove"));
    assert!(service.get(&task.id).await.expect("get").is_none());
    assert!(repos.messages.list_by_task(&task.id).await.expect("list").is_empty());
    assert!(repos.subscriptions.subscribers(&task.id).await.expect("list").is_empty());
    assert!(!service.remove(&task.id).await.expect("remove again"));
}
