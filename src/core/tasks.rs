//! Follow-up task business logic
//!
//! Tasks are reminders for the sales staff, optionally tied to a project. The
//! overdue sweep runs periodically from `main`: every incomplete task past its
//! deadline is alerted exactly once, tracked through `alerted_at`.

use crate::{
    core::project::require_project,
    entities::{Task, task},
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};

/// Creates a follow-up task.
///
/// # Arguments
/// * `db` - Database connection
/// * `project_id` - Project the task is about, if any
/// * `title` - Short description
/// * `due_at` - Deadline
///
/// # Errors
/// Returns a validation error for an empty title and `ProjectNotFound` for an
/// unknown project.
pub async fn create_task(
    db: &DatabaseConnection,
    project_id: Option<i64>,
    title: String,
    due_at: DateTime<Utc>,
) -> Result<task::Model> {
    let title = title.trim().to_string();
    if title.is_empty() {
        return Err(Error::validation("Task title cannot be empty"));
    }
    if let Some(id) = project_id {
        require_project(db, id).await?;
    }

    let task = task::ActiveModel {
        project_id: Set(project_id),
        title: Set(title),
        due_at: Set(due_at),
        completed: Set(false),
        alerted_at: Set(None),
        ..Default::default()
    };
    let task = task.insert(db).await?;
    tracing::info!(task_id = task.id, ?project_id, "Created task");
    Ok(task)
}

/// Marks a task as done.
///
/// # Errors
/// Returns `Error::TaskNotFound` if the task does not exist.
pub async fn complete_task(db: &DatabaseConnection, task_id: i64) -> Result<task::Model> {
    let task = Task::find_by_id(task_id)
        .one(db)
        .await?
        .ok_or(Error::TaskNotFound { id: task_id })?;

    let mut active_model: task::ActiveModel = task.into();
    active_model.completed = Set(true);
    active_model.update(db).await.map_err(Into::into)
}

/// Open tasks, optionally of one project, by deadline.
pub async fn list_open_tasks(
    db: &DatabaseConnection,
    project_id: Option<i64>,
) -> Result<Vec<task::Model>> {
    let mut query = Task::find().filter(task::Column::Completed.eq(false));
    if let Some(id) = project_id {
        query = query.filter(task::Column::ProjectId.eq(id));
    }
    query
        .order_by_asc(task::Column::DueAt)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Raises the overdue alert for every incomplete task due before `now` that
/// was not alerted yet. This function:
///
/// 1. Finds incomplete, not yet alerted tasks with `due_at < now`
/// 2. Stamps `alerted_at = now` on each of them
/// 3. Logs a warning per task
///
/// # Arguments
/// * `db` - Database connection
/// * `now` - Reference time of the sweep
///
/// # Returns
/// The tasks alerted by this sweep; an immediate second sweep returns none.
pub async fn sweep_overdue_tasks(
    db: &DatabaseConnection,
    now: DateTime<Utc>,
) -> Result<Vec<task::Model>> {
    // All stamps must land or none, so a retry alerts the same set
    let txn = db.begin().await?;

    let overdue = Task::find()
        .filter(task::Column::Completed.eq(false))
        .filter(task::Column::AlertedAt.is_null())
        .filter(task::Column::DueAt.lt(now))
        .order_by_asc(task::Column::DueAt)
        .all(&txn)
        .await?;

    let mut alerted = Vec::with_capacity(overdue.len());
    for task in overdue {
        let mut active_model: task::ActiveModel = task.into();
        active_model.alerted_at = Set(Some(now));
        let task = active_model.update(&txn).await?;
        tracing::warn!(
            task_id = task.id,
            project_id = ?task.project_id,
            due_at = %task.due_at,
            "Task is overdue: {}",
            task.title
        );
        alerted.push(task);
    }

    txn.commit().await?;
    tracing::info!(alerted = alerted.len(), "Overdue task sweep finished");
    Ok(alerted)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;
    use chrono::Duration;

    #[tokio::test]
    async fn test_create_task_validation() -> Result<()> {
        let db = setup_test_db().await?;

        let result = create_task(&db, None, "   ".to_string(), Utc::now()).await;
        assert!(matches!(result, Err(Error::Validation { message: _ })));

        let result = create_task(&db, Some(404), "Call".to_string(), Utc::now()).await;
        assert!(matches!(result, Err(Error::ProjectNotFound { id: 404 })));
        Ok(())
    }

    #[tokio::test]
    async fn test_complete_task() -> Result<()> {
        let (db, project) = setup_with_project().await?;
        let task = create_task(&db, Some(project.id), "Send offer".to_string(), Utc::now()).await?;
        assert!(!task.completed);

        let done = complete_task(&db, task.id).await?;
        assert!(done.completed);
        assert!(list_open_tasks(&db, Some(project.id)).await?.is_empty());

        let result = complete_task(&db, 999).await;
        assert!(matches!(result, Err(Error::TaskNotFound { id: 999 })));
        Ok(())
    }

    #[tokio::test]
    async fn test_sweep_alerts_each_overdue_task_once() -> Result<()> {
        let (db, project) = setup_with_project().await?;
        let now = Utc::now();

        let overdue = create_task(
            &db,
            Some(project.id),
            "Call back".to_string(),
            now - Duration::hours(2),
        )
        .await?;
        let done = create_task(&db, None, "Measure roof".to_string(), now - Duration::hours(3))
            .await?;
        complete_task(&db, done.id).await?;
        create_task(&db, None, "Order tiles".to_string(), now + Duration::days(1)).await?;

        let alerted = sweep_overdue_tasks(&db, now).await?;
        assert_eq!(alerted.len(), 1);
        assert_eq!(alerted[0].id, overdue.id);
        assert!(alerted[0].alerted_at.is_some());

        let again = sweep_overdue_tasks(&db, now + Duration::minutes(5)).await?;
        assert!(again.is_empty());
        assert_eq!(list_open_tasks(&db, None).await?.len(), 2);
        Ok(())
    }
}
