//! Task store service: lifecycle operations and their side effects.
//!
//! Every path that touches a task for an agent goes through
//! [`SubscriptionRepo::subscribe`](crate::persistence::subscription_repo::SubscriptionRepo::subscribe),
//! so "subscribed" always means "previously ensured".

pub mod decisions;
pub mod presence;

use chrono::{DateTime, Utc};
use tracing::{info, info_span, Instrument};

use crate::models::activity::{Activity, ActivityAction, ActivityTarget};
use crate::models::notification::Notification;
use crate::models::task::{dedup_preserving_order, NewTask, Task, TaskPatch, TaskStatus};
use crate::persistence::Repositories;
use crate::Result;

/// Author name used when a change has no known acting agent.
pub const SYSTEM_AUTHOR: &str = "System";

/// High-level task operations over the repositories.
#[derive(Clone)]
pub struct TaskService {
    repos: Repositories,
}

impl TaskService {
    /// Create a service over `repos`.
    #[must_use]
    pub fn new(repos: Repositories) -> Self {
        Self { repos }
    }

    /// Create a task.
    ///
    /// Writes one `create` activity, subscribes the creator and every
    /// assignee, and sends each assignee an assignment notification.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if a write fails.
    pub async fn create(&self, input: &NewTask) -> Result<Task> {
        let span = info_span!("create_task", title = %input.title);
        async {
            let task = self.repos.tasks.insert(&Task::from_new(input)).await?;

            self.log(
                task.creator_id.as_deref(),
                ActivityAction::Create,
                &task.id,
                format!("created task: {}", task.title),
            )
            .await?;

            if let Some(creator) = task.creator_id.as_deref() {
                self.repos.subscriptions.subscribe(creator, &task.id).await?;
            }

            let author = self.author_name(task.creator_id.as_deref()).await?;
            for assignee in &task.assignee_ids {
                self.repos.subscriptions.subscribe(assignee, &task.id).await?;
                self.repos
                    .notifications
                    .insert(&Notification::assignment(
                        assignee,
                        task.creator_id.as_deref(),
                        &author,
                        &task.id,
                        &task.title,
                    ))
                    .await?;
            }

            info!(task_id = %task.id, assignees = task.assignee_ids.len(), "task created");
            Ok(task)
        }
        .instrument(span)
        .await
    }

    /// Move a task to `status`.
    ///
    /// Any status may follow any other; the from→to edge is not validated.
    /// Returns `None` without side effects when the task does not exist.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if a write fails.
    pub async fn update_status(
        &self,
        id: &str,
        status: TaskStatus,
        acting_agent: Option<&str>,
    ) -> Result<Option<Task>> {
        let Some(mut task) = self.repos.tasks.get(id).await? else {
            return Ok(None);
        };

        task.status = status;
        let task = self.repos.tasks.save(&task).await?;
        self.log(
            acting_agent,
            ActivityAction::Status,
            &task.id,
            format!("moved task: {} → {}", task.title, status.as_str()),
        )
        .await?;

        info!(task_id = %task.id, status = status.as_str(), "task status updated");
        Ok(Some(task))
    }

    /// Add `agent_id` to the assignees if absent, subscribe it, and record
    /// the assignment.
    ///
    /// The assignment notification is only sent when the agent was not
    /// already assigned. Returns `None` without side effects when the task
    /// does not exist.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if a write fails.
    pub async fn assign(
        &self,
        id: &str,
        agent_id: &str,
        acting_agent: Option<&str>,
    ) -> Result<Option<Task>> {
        let Some(mut task) = self.repos.tasks.get(id).await? else {
            return Ok(None);
        };

        let newly_added = !task.is_assigned_to(agent_id);
        if newly_added {
            task.assignee_ids.push(agent_id.to_owned());
            task = self.repos.tasks.save(&task).await?;
        }

        self.repos.subscriptions.subscribe(agent_id, &task.id).await?;
        self.log(
            acting_agent,
            ActivityAction::Assign,
            &task.id,
            format!("assigned agent to: {}", task.title),
        )
        .await?;

        if newly_added {
            let author = self.author_name(acting_agent).await?;
            self.repos
                .notifications
                .insert(&Notification::assignment(
                    agent_id,
                    acting_agent,
                    &author,
                    &task.id,
                    &task.title,
                ))
                .await?;
        }

        Ok(Some(task))
    }

    /// Apply a partial edit.
    ///
    /// Agents present only in the new assignee set are notified on the
    /// creator's behalf, subscribed, and credited with an `assign` activity.
    /// Notification and activity text name the task as it was titled before
    /// the edit. Returns `None` when the task does not exist.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if a write fails.
    pub async fn update(&self, id: &str, patch: &TaskPatch) -> Result<Option<Task>> {
        let Some(mut task) = self.repos.tasks.get(id).await? else {
            return Ok(None);
        };

        let previous = task.assignee_ids.clone();
        let old_title = task.title.clone();
        if let Some(title) = &patch.title {
            task.title.clone_from(title);
        }
        if let Some(description) = &patch.description {
            task.description = Some(description.clone());
        }
        if let Some(tags) = &patch.tags {
            task.tags = dedup_preserving_order(tags);
        }
        if let Some(priority) = patch.priority {
            task.priority = priority;
        }
        if let Some(assignees) = &patch.assignee_ids {
            task.assignee_ids = dedup_preserving_order(assignees);
        }
        let task = self.repos.tasks.save(&task).await?;

        let added: Vec<&String> = task
            .assignee_ids
            .iter()
            .filter(|id| !previous.contains(id))
            .collect();
        if !added.is_empty() {
            let creator = task.creator_id.as_deref();
            let author = self.author_name(creator).await?;
            for agent_id in added {
                self.repos
                    .notifications
                    .insert(&Notification::assignment(
                        agent_id,
                        creator,
                        &author,
                        &task.id,
                        &old_title,
                    ))
                    .await?;
                self.log(
                    Some(agent_id.as_str()),
                    ActivityAction::Assign,
                    &task.id,
                    format!("assigned to: {old_title}"),
                )
                .await?;
                self.repos.subscriptions.subscribe(agent_id, &task.id).await?;
            }
        }

        Ok(Some(task))
    }

    /// Delete a task together with its comments and subscriptions.
    ///
    /// Returns whether the task existed.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if a delete fails.
    pub async fn remove(&self, id: &str) -> Result<bool> {
        let messages = self.repos.messages.delete_for_task(id).await?;
        let subscriptions = self.repos.subscriptions.delete_for_task(id).await?;
        let removed = self.repos.tasks.delete(id).await?;
        if removed {
            info!(task_id = id, messages, subscriptions, "task removed");
        }
        Ok(removed)
    }

    /// Fetch a task.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn get(&self, id: &str) -> Result<Option<Task>> {
        self.repos.tasks.get(id).await
    }

    /// List tasks, newest first, optionally by stored status.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list(&self, status: Option<TaskStatus>) -> Result<Vec<Task>> {
        self.repos.tasks.list(status).await
    }

    /// Unclaimed work: stored `inbox` tasks with no assignees, most urgent first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_inbox(&self) -> Result<Vec<Task>> {
        let mut inbox: Vec<Task> = self
            .repos
            .tasks
            .list(Some(TaskStatus::Inbox))
            .await?
            .into_iter()
            .filter(|task| task.assignee_ids.is_empty())
            .collect();
        inbox.sort_by_key(|task| task.priority.rank());
        Ok(inbox)
    }

    /// Tasks assigned to an agent, newest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_for_agent(&self, agent_id: &str) -> Result<Vec<Task>> {
        self.repos.tasks.list_for_assignee(agent_id).await
    }

    /// Tasks touched at or after `since`, newest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_updated_since(&self, since: DateTime<Utc>) -> Result<Vec<Task>> {
        self.repos.tasks.list_updated_since(since).await
    }

    async fn author_name(&self, agent_id: Option<&str>) -> Result<String> {
        let Some(agent_id) = agent_id else {
            return Ok(SYSTEM_AUTHOR.into());
        };
        Ok(self
            .repos
            .agents
            .get(agent_id)
            .await?
            .map_or_else(|| SYSTEM_AUTHOR.into(), |agent| agent.name))
    }

    async fn log(
        &self,
        agent_id: Option<&str>,
        action: ActivityAction,
        task_id: &str,
        description: String,
    ) -> Result<()> {
        self.repos
            .activities
            .insert(&Activity::new(
                agent_id,
                action,
                ActivityTarget::Task,
                task_id,
                description,
            ))
            .await?;
        Ok(())
    }
}
