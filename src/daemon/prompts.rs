//! Prompt text sent to agent sessions.

use crate::models::message::MessageView;
use crate::models::task::Task;

/// Command-line client agents use to report back.
const CTL: &str = "citadel-ctl";

/// Number of most recent comments included as task context.
pub const CONTEXT_COMMENTS: usize = 5;

/// Task description plus the last few comments, as prompt context.
#[must_use]
pub fn task_context(task: &Task, comments: &[MessageView]) -> String {
    let mut context = String::new();
    if let Some(description) = task.description.as_deref().filter(|d| !d.trim().is_empty()) {
        context.push_str("\nTask description: ");
        context.push_str(description);
    }

    let skip = comments.len().saturating_sub(CONTEXT_COMMENTS);
    let recent = &comments[skip..];
    if !recent.is_empty() {
        context.push_str("\n\nRecent comments on this task:");
        for comment in recent {
            context.push_str("\n- ");
            context.push_str(&comment.message.content);
        }
    }
    context
}

fn teammate_hint(teammates: &[String]) -> String {
    if teammates.is_empty() {
        return String::new();
    }
    let names: Vec<String> = teammates.iter().map(|name| format!("@{name}")).collect();
    format!(" (e.g. {})", names.join(", "))
}

/// Work order handed to a spawned sub-session for a new assignment.
#[must_use]
pub fn assignment_prompt(
    agent_name: &str,
    task: &Task,
    context: &str,
    teammates: &[String],
) -> String {
    let id = &task.id;
    [
        format!("🔔 CITADEL TASK ASSIGNED: \"{}\"", task.title),
        format!("Task ID: {id}"),
        context.to_owned(),
        String::new(),
        "You've been assigned this task. Do the actual work:".into(),
        String::new(),
        format!("1. Acknowledge: {CTL} comment {agent_name} {id} \"your message\""),
        format!("2. Start: {CTL} status {agent_name} {id} in_progress"),
        "3. Do the work with whatever tools the task needs.".into(),
        format!("4. Post progress: {CTL} comment {agent_name} {id} \"update\""),
        format!(
            "5. Post deliverables: {CTL} document {agent_name} {id} \"Title\" \"content\" deliverable"
        ),
        format!("6. Finish: {CTL} status {agent_name} {id} done"),
        String::new(),
        format!(
            "If you need help from a teammate, @mention them in a comment{}.",
            teammate_hint(teammates)
        ),
        "The comment notifies them and they respond on the task.".into(),
        String::new(),
        "If something fails, do not stop. Log the failure as a comment and try another approach.".into(),
        format!(
            "If truly blocked, run: {CTL} status {agent_name} {id} assigned and explain what is blocking."
        ),
    ]
    .join("\n")
}

/// Conversational prompt for an `@mention` that expects a short reply.
#[must_use]
pub fn mention_prompt(
    agent_name: &str,
    task: &Task,
    notification_message: &str,
    context: &str,
    teammates: &[String],
) -> String {
    let id = &task.id;
    [
        format!(
            "🔔 Citadel @mention on task \"{}\": {notification_message}",
            task.title
        ),
        format!("Task ID: {id}"),
        context.to_owned(),
        String::new(),
        format!(
            "Reply with a helpful response. If you need input from a teammate, @mention them{}.",
            teammate_hint(teammates)
        ),
        String::new(),
        "Your reply is posted on the task as your comment. To attach a document, use:".into(),
        "---COMMENT--- short comment ---DOCUMENT_TITLE--- title ---DOCUMENT--- document body"
            .into(),
        String::new(),
        "If this requires real work, do it with your tools and post results via:".into(),
        format!("   {CTL} comment {agent_name} {id} \"your update\""),
        format!(
            "   {CTL} document {agent_name} {id} \"Title\" \"content\" research|deliverable|report"
        ),
        String::new(),
        "For now, respond with a short acknowledgment. Then keep working.".into(),
    ]
    .join("\n")
}

/// Triage order for the supervisor when a task has nobody assigned.
#[must_use]
pub fn delegation_prompt(
    agent_name: &str,
    task: &Task,
    notification_message: &str,
    context: &str,
    teammates: &[String],
) -> String {
    let id = &task.id;
    [
        format!("🔔 CITADEL DELEGATION: \"{}\"", task.title),
        format!("Task ID: {id}"),
        format!("Trigger: {notification_message}"),
        context.to_owned(),
        String::new(),
        "Nobody is assigned to this task yet. As coordinator:".into(),
        "1. Decide which teammate fits the work best.".into(),
        format!(
            "2. Assign them by @mentioning them in a comment{}: {CTL} comment {agent_name} {id} \"@Name please take this\"",
            teammate_hint(teammates)
        ),
        format!("3. Move the task forward: {CTL} status {agent_name} {id} assigned"),
        "4. If nobody fits, do the work yourself or explain what is missing.".into(),
    ]
    .join("\n")
}

/// Plain notice for subscriber comment notifications.
#[must_use]
pub fn comment_ping(notification_message: &str) -> String {
    format!("🔔 Citadel: {notification_message}")
}

/// Supervisor alert for an agent reporting `blocked`.
#[must_use]
pub fn blocked_alert(agent_name: &str, current_task: Option<&str>) -> String {
    let doing = current_task
        .filter(|task| !task.trim().is_empty())
        .unwrap_or("no current task reported");
    format!(
        "🚨 Citadel: {agent_name} is BLOCKED ({doing}). Check their task and help unblock them."
    )
}
