//! Unit tests for the prompt text sent to agent sessions.

use citadel::daemon::prompts::{
    assignment_prompt, blocked_alert, comment_ping, delegation_prompt, mention_prompt,
    task_context, CONTEXT_COMMENTS,
};
use citadel::models::message::{Message, MessageView};
use citadel::models::task::{NewTask, Task};

fn task(description: Option<&str>) -> Task {
    Task::from_new(&NewTask {
        title: "Launch post".into(),
        description: description.map(str::to_owned),
        ..NewTask::default()
    })
}

fn comments(task_id: &str, count: usize) -> Vec<MessageView> {
    (1..=count)
        .map(|n| MessageView {
            message: Message::new(task_id, "a1", format!("comment {n}")),
            agent_name: "Atlas".into(),
        })
        .collect()
}

fn teammates() -> Vec<String> {
    vec!["Atlas".into(), "Pixel".into()]
}

// ─── Context ─────────────────────────────────────────────

#[test]
fn context_includes_description_and_last_comments() {
    let task = task(Some("Write the copy"));
    let context = task_context(&task, &comments(&task.id, 7));

    assert!(context.starts_with("\nTask description: Write the copy"));
    assert!(context.contains("\n\nRecent comments on this task:"));
    assert!(!context.contains("comment 2\n"));
    assert!(!context.contains("- comment 1\n"));
    for n in 3..=7 {
        assert!(context.contains(&format!("\n- comment {n}")), "comment {n}");
    }
    assert_eq!(context.matches("\n- ").count(), CONTEXT_COMMENTS);
}

#[test]
fn empty_context_when_nothing_to_add() {
    let task = task(Some("   "));
    assert_eq!(task_context(&task, &[]), "");
}

// ─── Prompts ─────────────────────────────────────────────

#[test]
fn assignment_prompt_lists_ctl_steps() {
    let task = task(None);
    let prompt = assignment_prompt("Pixel", &task, "", &teammates());

    assert!(prompt.starts_with("🔔 CITADEL TASK ASSIGNED: \"Launch post\""));
    assert!(prompt.contains(&format!("Task ID: {}", task.id)));
    assert!(prompt.contains(&format!("citadel-ctl status Pixel {} in_progress", task.id)));
    assert!(prompt.contains(&format!("citadel-ctl status Pixel {} done", task.id)));
    assert!(prompt.contains("deliverable"));
    assert!(prompt.contains("(e.g. @Atlas, @Pixel)"));
}

#[test]
fn mention_prompt_explains_reply_markers() {
    let task = task(Some("Write the copy"));
    let context = task_context(&task, &[]);
    let prompt = mention_prompt(
        "Pixel",
        &task,
        "Atlas mentioned you in: Launch post",
        &context,
        &[],
    );

    assert!(prompt.starts_with(
        "🔔 Citadel @mention on task \"Launch post\": Atlas mentioned you in: Launch post"
    ));
    assert!(prompt.contains("Task description: Write the copy"));
    assert!(prompt.contains("---COMMENT---"));
    assert!(prompt.contains("---DOCUMENT_TITLE---"));
    assert!(prompt.contains("respond with a short acknowledgment"));
    assert!(!prompt.contains("(e.g."));
}

#[test]
fn delegation_prompt_names_trigger() {
    let task = task(None);
    let prompt = delegation_prompt(
        "Atlas",
        &task,
        "Pixel commented on: Launch post",
        "",
        &teammates(),
    );

    assert!(prompt.starts_with("🔔 CITADEL DELEGATION: \"Launch post\""));
    assert!(prompt.contains("Trigger: Pixel commented on: Launch post"));
    assert!(prompt.contains(&format!("citadel-ctl comment Atlas {}", task.id)));
}

#[test]
fn ping_and_blocked_alert_text() {
    assert_eq!(
        comment_ping("Atlas commented on: Launch post"),
        "🔔 Citadel: Atlas commented on: Launch post"
    );
    assert_eq!(
        blocked_alert("Pixel", Some("waiting on API keys")),
        "🚨 Citadel: Pixel is BLOCKED (waiting on API keys). Check their task and help unblock them."
    );
    assert!(blocked_alert("Pixel", None).contains("(no current task reported)"));
    assert!(blocked_alert("Pixel", Some(" ")).contains("(no current task reported)"));
}
