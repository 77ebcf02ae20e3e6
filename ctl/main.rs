#![forbid(unsafe_code)]

//! `citadel-ctl` — command-line client for the citadel control surface.
//!
//! Agents run it from their sessions to comment, move tasks, and store
//! deliverables. Every command is one authenticated HTTP request.

use clap::{Parser, Subcommand};
use serde_json::{json, Value};

#[derive(Debug, Parser)]
#[command(
    name = "citadel-ctl",
    about = "Command-line client for the citadel server",
    version,
    long_about = None
)]
struct Cli {
    /// Base URL of the citadel server.
    #[arg(long, env = "CITADEL_URL", default_value = "http://127.0.0.1:3210")]
    url: String,

    /// Shared secret sent as `X-Citadel-Key`.
    #[arg(long, env = "CITADEL_API_KEY", default_value = "", hide_env_values = true)]
    api_key: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Post a comment on a task.
    Comment {
        /// Authoring agent name.
        agent: String,
        /// Task ID.
        task_id: String,
        /// Comment text; `@Name` notifies that agent.
        content: String,
        /// Run preflight checks and print their results.
        #[arg(long)]
        preflight: bool,
    },

    /// Move a task to a new status.
    Status {
        /// Acting agent name.
        agent: String,
        /// Task ID.
        task_id: String,
        /// inbox, assigned, in_progress, review, or done.
        status: String,
    },

    /// Store a document on a task.
    Document {
        /// Authoring agent name.
        agent: String,
        /// Task ID.
        task_id: String,
        /// Document title.
        title: String,
        /// Markdown body.
        content: String,
        /// deliverable, research, protocol, or report.
        #[arg(default_value = "deliverable")]
        kind: String,
    },

    /// Create a task.
    Task {
        /// Creating agent name.
        agent: String,
        /// Task title.
        title: String,
        /// Longer description.
        #[arg(long)]
        description: Option<String>,
        /// low, medium, high, or urgent.
        #[arg(long, default_value = "medium")]
        priority: String,
        /// Agent to assign; repeatable.
        #[arg(long = "assign")]
        assignees: Vec<String>,
        /// Tag; repeatable.
        #[arg(long = "tag")]
        tags: Vec<String>,
    },

    /// Report presence for a session.
    Heartbeat {
        /// Gateway session key.
        session_key: String,
        /// idle, working, blocked (or online, active, offline).
        status: String,
        /// What the agent is doing right now.
        #[arg(long)]
        current_task: Option<String>,
    },

    /// Check content against the operating rules without posting it.
    Preflight {
        /// Agent whose rules apply.
        agent: String,
        /// Content to check.
        content: String,
        /// Related task ID.
        #[arg(long)]
        task_id: Option<String>,
    },

    /// Fetch unread notifications and mark them read.
    Notifications {
        /// Agent name.
        agent: String,
    },

    /// List tasks assigned to an agent.
    Tasks {
        /// Agent name.
        agent: String,
    },

    /// Ask for a decision you cannot make alone.
    Decision {
        /// Requesting agent name.
        agent: String,
        /// The question.
        title: String,
        /// Background for whoever answers.
        #[arg(long)]
        description: Option<String>,
        /// Proposed answer; repeatable.
        #[arg(long = "option")]
        options: Vec<String>,
        /// Related task ID.
        #[arg(long)]
        task_id: Option<String>,
    },

    /// List decisions still waiting for an answer.
    Decisions,

    /// Answer a decision.
    Resolve {
        /// Decision ID.
        id: String,
        /// approved, rejected, or resolved.
        status: String,
        /// Answer text.
        #[arg(long)]
        resolution: Option<String>,
    },

    /// List an agent's active standing orders.
    Orders {
        /// Agent name.
        agent: String,
    },

    /// Print the daily standup.
    Standup,
}

enum Call {
    Get(&'static str, Vec<(&'static str, String)>),
    Post(&'static str, Value),
}

fn build_call(command: Command) -> Call {
    match command {
        Command::Comment {
            agent,
            task_id,
            content,
            preflight,
        } => Call::Post(
            "/api/comment",
            json!({ "agentName": agent, "taskId": task_id, "content": content, "preflight": preflight }),
        ),
        Command::Status {
            agent,
            task_id,
            status,
        } => Call::Post(
            "/api/task/status",
            json!({ "agentName": agent, "taskId": task_id, "status": status }),
        ),
        Command::Document {
            agent,
            task_id,
            title,
            content,
            kind,
        } => Call::Post(
            "/api/document",
            json!({
                "agentName": agent,
                "taskId": task_id,
                "title": title,
                "content": content,
                "type": kind,
            }),
        ),
        Command::Task {
            agent,
            title,
            description,
            priority,
            assignees,
            tags,
        } => Call::Post(
            "/api/task",
            json!({
                "creatorName": agent,
                "title": title,
                "description": description,
                "priority": priority,
                "assigneeNames": assignees,
                "tags": tags,
            }),
        ),
        Command::Heartbeat {
            session_key,
            status,
            current_task,
        } => Call::Post(
            "/api/heartbeat",
            json!({ "sessionKey": session_key, "status": status, "currentTask": current_task }),
        ),
        Command::Preflight {
            agent,
            content,
            task_id,
        } => Call::Post(
            "/api/preflight",
            json!({ "agentName": agent, "content": content, "taskId": task_id }),
        ),
        Command::Notifications { agent } => {
            Call::Get("/api/my-notifications", vec![("agent", agent)])
        }
        Command::Tasks { agent } => Call::Get("/api/my-tasks", vec![("agent", agent)]),
        Command::Decision {
            agent,
            title,
            description,
            options,
            task_id,
        } => Call::Post(
            "/api/decision",
            json!({
                "agentName": agent,
                "title": title,
                "description": description,
                "options": options,
                "taskId": task_id,
            }),
        ),
        Command::Decisions => Call::Get("/api/decisions", vec![("status", "pending".into())]),
        Command::Resolve {
            id,
            status,
            resolution,
        } => Call::Post(
            "/api/decision/resolve",
            json!({ "id": id, "status": status, "resolution": resolution }),
        ),
        Command::Orders { agent } => Call::Get("/api/standing-orders", vec![("agent", agent)]),
        Command::Standup => Call::Get("/api/standup", Vec::new()),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = Cli::parse();
    let base = args.url.trim_end_matches('/').to_owned();

    match send(&base, &args.api_key, build_call(args.command)).await {
        Ok(response) => print_response(&response),
        Err(err) => {
            eprintln!("Failed to reach citadel at {base}: {err}");
            std::process::exit(1);
        }
    }
}

fn print_response(response: &Value) {
    if let Some(err_msg) = response.get("error").and_then(Value::as_str) {
        eprintln!("Error: {err_msg}");
        std::process::exit(1);
    }
    if let Some(standup) = response.get("standup").and_then(Value::as_str) {
        println!("{standup}");
        return;
    }
    let mut body = response.clone();
    if let Some(obj) = body.as_object_mut() {
        obj.remove("ok");
        if obj.is_empty() {
            println!("OK");
            return;
        }
    }
    println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
}

/// Send one request and decode its JSON body, whatever the status code.
async fn send(
    base: &str,
    api_key: &str,
    call: Call,
) -> std::result::Result<Value, Box<dyn std::error::Error>> {
    let client = reqwest::Client::new();
    let request = match call {
        Call::Get(path, query) => {
            client.get(reqwest::Url::parse_with_params(&format!("{base}{path}"), &query)?)
        }
        Call::Post(path, body) => client.post(format!("{base}{path}")).json(&body),
    };
    let response = request.header("X-Citadel-Key", api_key).send().await?;
    let text = response.text().await?;
    Ok(serde_json::from_str(&text)?)
}
