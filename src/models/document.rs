//! Deliverable documents attached to tasks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Document classification.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    /// Generic work product.
    #[default]
    Deliverable,
    /// Research findings or analysis.
    Research,
    /// Plan, spec, or architecture.
    Protocol,
    /// Report or summary.
    Report,
}

/// A document posted by an agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Unique record identifier.
    pub id: String,
    /// Title.
    pub title: String,
    /// Markdown body.
    pub content: String,
    /// Classification.
    #[serde(rename = "type")]
    pub kind: DocumentType,
    /// Task the document belongs to.
    pub task_id: Option<String>,
    /// Authoring agent.
    pub created_by: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Document {
    /// Construct a new document with a generated identifier.
    #[must_use]
    pub fn new(
        title: impl Into<String>,
        content: impl Into<String>,
        kind: DocumentType,
        task_id: Option<&str>,
        created_by: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            content: content.into(),
            kind,
            task_id: task_id.map(str::to_owned),
            created_by: created_by.into(),
            created_at: Utc::now(),
        }
    }
}
