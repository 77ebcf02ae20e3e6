//! Document repository for `SQLite` persistence.

use std::sync::Arc;

use crate::models::document::{Document, DocumentType};
use crate::{AppError, Result};

use super::db::{decode_ts, encode_ts, Database};

/// Repository for document records.
#[derive(Clone)]
pub struct DocumentRepo {
    db: Arc<Database>,
}

/// Internal row struct for `SQLite` deserialization.
#[derive(sqlx::FromRow)]
struct DocumentRow {
    id: String,
    title: String,
    content: String,
    kind: String,
    task_id: Option<String>,
    created_by: String,
    created_at: String,
}

impl DocumentRow {
    fn into_document(self) -> Result<Document> {
        Ok(Document {
            kind: parse_kind(&self.kind)?,
            created_at: decode_ts("created_at", &self.created_at)?,
            id: self.id,
            title: self.title,
            content: self.content,
            task_id: self.task_id,
            created_by: self.created_by,
        })
    }
}

fn parse_kind(s: &str) -> Result<DocumentType> {
    match s {
        "deliverable" => Ok(DocumentType::Deliverable),
        "research" => Ok(DocumentType::Research),
        "protocol" => Ok(DocumentType::Protocol),
        "report" => Ok(DocumentType::Report),
        other => Err(AppError::Db(format!("invalid document type: {other}"))),
    }
}

fn kind_str(kind: DocumentType) -> &'static str {
    match kind {
        DocumentType::Deliverable => "deliverable",
        DocumentType::Research => "research",
        DocumentType::Protocol => "protocol",
        DocumentType::Report => "report",
    }
}

impl DocumentRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert a new document.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the insert fails.
    pub async fn insert(&self, document: &Document) -> Result<Document> {
        sqlx::query(
            "INSERT INTO document (id, title, content, kind, task_id, created_by, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(&document.id)
        .bind(&document.title)
        .bind(&document.content)
        .bind(kind_str(document.kind))
        .bind(&document.task_id)
        .bind(&document.created_by)
        .bind(encode_ts(&document.created_at))
        .execute(self.db.as_ref())
        .await?;

        Ok(document.clone())
    }

    /// Documents attached to a task, newest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_by_task(&self, task_id: &str) -> Result<Vec<Document>> {
        let rows: Vec<DocumentRow> = sqlx::query_as(
            "SELECT id, title, content, kind, task_id, created_by, created_at
             FROM document WHERE task_id = ?1
             ORDER BY created_at DESC, rowid DESC",
        )
        .bind(task_id)
        .fetch_all(self.db.as_ref())
        .await?;

        rows.into_iter().map(DocumentRow::into_document).collect()
    }

    /// Documents written by an agent, newest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_by_author(&self, agent_id: &str) -> Result<Vec<Document>> {
        let rows: Vec<DocumentRow> = sqlx::query_as(
            "SELECT id, title, content, kind, task_id, created_by, created_at
             FROM document WHERE created_by = ?1
             ORDER BY created_at DESC, rowid DESC",
        )
        .bind(agent_id)
        .fetch_all(self.db.as_ref())
        .await?;

        rows.into_iter().map(DocumentRow::into_document).collect()
    }
}
