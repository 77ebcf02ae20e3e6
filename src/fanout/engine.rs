//! Notification fan-out for task comments and documents.
//!
//! On each comment, mentioned agents are notified first and collected into a
//! handled set; the generic subscriber pass then skips the author and every
//! handled agent. Nobody receives both a mention and a comment notice for the
//! same message.

use std::collections::HashSet;

use tracing::{debug, info, info_span, Instrument};

use crate::models::activity::{Activity, ActivityAction, ActivityTarget};
use crate::models::document::{Document, DocumentType};
use crate::models::message::Message;
use crate::models::notification::Notification;
use crate::persistence::Repositories;
use crate::{AppError, Result};

use super::mentions::extract_mentions;

/// What a single comment fan-out produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentOutcome {
    /// The persisted comment.
    pub message: Message,
    /// Agent ids that received a mention notification, in mention order.
    pub mentioned: Vec<String>,
    /// Agent ids that received a comment notification.
    pub notified_subscribers: Vec<String>,
}

/// Input for [`FanoutEngine::post_document`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDocument {
    /// Title.
    pub title: String,
    /// Markdown body.
    pub content: String,
    /// Classification.
    pub kind: DocumentType,
    /// Owning task, if any.
    pub task_id: Option<String>,
    /// Authoring agent.
    pub author_id: String,
}

/// Writes comments and documents with their notification side effects.
#[derive(Clone)]
pub struct FanoutEngine {
    repos: Repositories,
}

impl FanoutEngine {
    /// Create an engine over `repos`.
    #[must_use]
    pub fn new(repos: Repositories) -> Self {
        Self { repos }
    }

    /// Post a comment and fan out notifications.
    ///
    /// Steps, in order: persist the comment, subscribe the author, notify and
    /// subscribe each resolved mention (excluding the author), notify every
    /// other subscriber, then write one activity row. Mention tokens that
    /// match no agent are dropped.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the task or author does not exist, or
    /// `AppError::Db` if a write fails.
    pub async fn post_comment(
        &self,
        task_id: &str,
        author_id: &str,
        content: &str,
    ) -> Result<CommentOutcome> {
        let span = info_span!("post_comment", task_id, author_id);
        self.fan_out_comment(task_id, author_id, content)
            .instrument(span)
            .await
    }

    async fn fan_out_comment(
        &self,
        task_id: &str,
        author_id: &str,
        content: &str,
    ) -> Result<CommentOutcome> {
        let task = self
            .repos
            .tasks
            .get(task_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("task {task_id} not found")))?;
        let author = self
            .repos
            .agents
            .get(author_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("agent {author_id} not found")))?;

        let message = self
            .repos
            .messages
            .insert(&Message::new(task_id, author_id, content))
            .await?;

        self.repos.subscriptions.subscribe(author_id, task_id).await?;

        let mut handled: HashSet<String> = HashSet::new();
        let mut mentioned = Vec::new();
        for name in extract_mentions(content) {
            let Some(agent) = self.repos.agents.find_by_name(&name).await? else {
                debug!(mention = %name, "mention does not match any agent");
                continue;
            };
            if agent.id == author_id || handled.contains(&agent.id) {
                continue;
            }

            self.repos.subscriptions.subscribe(&agent.id, task_id).await?;
            self.repos
                .notifications
                .insert(&Notification::mention(
                    &agent.id,
                    author_id,
                    &author.name,
                    task_id,
                    &task.title,
                ))
                .await?;
            handled.insert(agent.id.clone());
            mentioned.push(agent.id);
        }

        let mut notified_subscribers = Vec::new();
        for subscriber in self.repos.subscriptions.subscribers(task_id).await? {
            if subscriber == author_id || handled.contains(&subscriber) {
                continue;
            }
            self.repos
                .notifications
                .insert(&Notification::comment(
                    &subscriber,
                    author_id,
                    &author.name,
                    task_id,
                    &task.title,
                ))
                .await?;
            notified_subscribers.push(subscriber);
        }

        self.repos
            .activities
            .insert(&Activity::new(
                Some(author_id),
                ActivityAction::Comment,
                ActivityTarget::Comment,
                message.id.clone(),
                format!("commented on: {}", task.title),
            ))
            .await?;

        info!(
            message_id = %message.id,
            mentions = mentioned.len(),
            subscribers = notified_subscribers.len(),
            "comment fanned out"
        );
        Ok(CommentOutcome {
            message,
            mentioned,
            notified_subscribers,
        })
    }

    /// Store a document and record it in the activity feed.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the author does not exist, or
    /// `AppError::Db` if a write fails.
    pub async fn post_document(&self, input: &NewDocument) -> Result<Document> {
        if self.repos.agents.get(&input.author_id).await?.is_none() {
            return Err(AppError::NotFound(format!(
                "agent {} not found",
                input.author_id
            )));
        }

        let document = self
            .repos
            .documents
            .insert(&Document::new(
                input.title.clone(),
                input.content.clone(),
                input.kind,
                input.task_id.as_deref(),
                input.author_id.clone(),
            ))
            .await?;

        self.repos
            .activities
            .insert(&Activity::new(
                Some(input.author_id.as_str()),
                ActivityAction::Document,
                ActivityTarget::Document,
                document.id.clone(),
                format!("created document: {}", document.title),
            ))
            .await?;

        info!(document_id = %document.id, kind = ?document.kind, "document stored");
        Ok(document)
    }
}
