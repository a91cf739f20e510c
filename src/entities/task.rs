//! Task entity - a follow-up reminder, optionally tied to a project.
//! Overdue, incomplete tasks are picked up by `core::tasks::sweep_overdue_tasks`.
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Task database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tasks")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Project the task is about, if any
    pub project_id: Option<i64>,
    /// Short description
    pub title: String,
    /// Deadline
    pub due_at: DateTimeUtc,
    /// Whether the task has been done
    pub completed: bool,
    /// When the overdue alert was raised, `None` until then
    pub alerted_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// A task may belong to a project
    #[sea_orm(
        belongs_to = "super::project::Entity",
        from = "Column::ProjectId",
        to = "super::project::Column::Id",
        on_delete = "Cascade"
    )]
    Project,
}

impl Related<super::project::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Project.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
