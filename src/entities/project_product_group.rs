//! Project product group entity - the committed group option for one
//! (manufacturer, group name, category) bundle of a project.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Committed group choice database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "project_product_groups")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning project
    pub project_id: i64,
    /// Category text
    pub category: String,
    /// Manufacturer of the bundle
    pub manufacturer: String,
    /// Group name of the bundle
    pub group_name: String,
    /// `"MAIN"`, `"OPTIONAL"` or `"NONE"`
    pub group_option: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each group choice belongs to one project
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
