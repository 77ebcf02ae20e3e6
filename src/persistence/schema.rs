//! `SQLite` schema bootstrap logic.
//!
//! All table definitions use `CREATE TABLE IF NOT EXISTS` and are safe to
//! re-run on every server startup.

use sqlx::SqlitePool;

use crate::Result;

/// Apply all table and index definitions to the connected database.
///
/// # Errors
///
/// Returns `AppError::Db` if any DDL statement fails.
pub async fn bootstrap_schema(pool: &SqlitePool) -> Result<()> {
    let ddl = r"
CREATE TABLE IF NOT EXISTS agent (
    id              TEXT PRIMARY KEY NOT NULL,
    name            TEXT NOT NULL,
    name_key        TEXT NOT NULL UNIQUE,
    role            TEXT NOT NULL CHECK(role IN ('coordinator','social','trading','security','jobs','builder','generalist')),
    status          TEXT NOT NULL CHECK(status IN ('idle','working','blocked')),
    current_task    TEXT,
    session_key     TEXT,
    level           TEXT NOT NULL CHECK(level IN ('lead','specialist','intern')),
    last_active     TEXT NOT NULL,
    avatar_emoji    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS task (
    id              TEXT PRIMARY KEY NOT NULL,
    title           TEXT NOT NULL,
    description     TEXT,
    status          TEXT NOT NULL CHECK(status IN ('inbox','assigned','in_progress','review','done')),
    priority        TEXT NOT NULL CHECK(priority IN ('low','medium','high','urgent')),
    tags            TEXT NOT NULL,
    assignee_ids    TEXT NOT NULL,
    creator_id      TEXT,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS message (
    id              TEXT PRIMARY KEY NOT NULL,
    task_id         TEXT NOT NULL,
    from_agent_id   TEXT NOT NULL,
    content         TEXT NOT NULL,
    created_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS subscription (
    id              TEXT PRIMARY KEY NOT NULL,
    agent_id        TEXT NOT NULL,
    task_id         TEXT NOT NULL,
    subscribed_at   TEXT NOT NULL,
    UNIQUE(agent_id, task_id)
);

CREATE TABLE IF NOT EXISTS notification (
    id              TEXT PRIMARY KEY NOT NULL,
    recipient_id    TEXT NOT NULL,
    author_id       TEXT,
    author_name     TEXT NOT NULL,
    kind            TEXT NOT NULL CHECK(kind IN ('mention','comment')),
    message         TEXT NOT NULL,
    source_task_id  TEXT,
    read            INTEGER NOT NULL DEFAULT 0,
    delivered       INTEGER NOT NULL DEFAULT 0,
    created_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS activity (
    id              TEXT PRIMARY KEY NOT NULL,
    agent_id        TEXT,
    action          TEXT NOT NULL CHECK(action IN ('create','status','assign','comment','document')),
    target_type     TEXT NOT NULL CHECK(target_type IN ('task','comment','document','agent','decision')),
    target_id       TEXT NOT NULL,
    description     TEXT NOT NULL,
    created_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS document (
    id              TEXT PRIMARY KEY NOT NULL,
    title           TEXT NOT NULL,
    content         TEXT NOT NULL,
    kind            TEXT NOT NULL CHECK(kind IN ('deliverable','research','protocol','report')),
    task_id         TEXT,
    created_by      TEXT NOT NULL,
    created_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS rule (
    id              TEXT PRIMARY KEY NOT NULL,
    text            TEXT NOT NULL,
    rationale       TEXT NOT NULL,
    scope           TEXT NOT NULL CHECK(scope IN ('global','social','trading','security','jobs','building','coordination')),
    tier            TEXT NOT NULL CHECK(tier IN ('critical','standard')),
    checkable       INTEGER NOT NULL DEFAULT 0,
    check_pattern   TEXT,
    active          INTEGER NOT NULL DEFAULT 1,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS decision (
    id              TEXT PRIMARY KEY NOT NULL,
    agent_id        TEXT NOT NULL,
    title           TEXT NOT NULL,
    description     TEXT NOT NULL,
    options         TEXT,
    status          TEXT NOT NULL CHECK(status IN ('pending','approved','rejected','resolved')),
    resolution      TEXT,
    resolved_at     TEXT,
    task_id         TEXT,
    comments        TEXT NOT NULL DEFAULT '[]',
    created_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS standing_order (
    id              TEXT PRIMARY KEY NOT NULL,
    agent_id        TEXT NOT NULL,
    goal            TEXT NOT NULL,
    metrics         TEXT,
    priority        TEXT NOT NULL CHECK(priority IN ('primary','secondary')),
    active          INTEGER NOT NULL DEFAULT 1,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS preflight_log (
    id              TEXT PRIMARY KEY NOT NULL,
    agent_id        TEXT NOT NULL,
    task_id         TEXT,
    check_type      TEXT NOT NULL,
    passed          INTEGER NOT NULL,
    details         TEXT,
    content         TEXT,
    created_at      TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_message_task ON message(task_id, created_at);
CREATE INDEX IF NOT EXISTS idx_subscription_task ON subscription(task_id);
CREATE INDEX IF NOT EXISTS idx_notification_delivered ON notification(delivered, created_at);
CREATE INDEX IF NOT EXISTS idx_notification_recipient ON notification(recipient_id, read);
CREATE INDEX IF NOT EXISTS idx_activity_created ON activity(created_at);
CREATE INDEX IF NOT EXISTS idx_document_task ON document(task_id);
CREATE INDEX IF NOT EXISTS idx_decision_status ON decision(status, created_at);
CREATE INDEX IF NOT EXISTS idx_standing_order_agent ON standing_order(agent_id, active);
CREATE INDEX IF NOT EXISTS idx_preflight_agent ON preflight_log(agent_id, created_at);
";

    sqlx::raw_sql(ddl).execute(pool).await?;
    Ok(())
}
