//! Project input entity - one quantity typed into the project form,
//! keyed by mapper key (e.g. `"roof_area"`).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Form input database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "project_inputs")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning project
    pub project_id: i64,
    /// Mapper key linking this input to catalog products
    pub mapper_key: String,
    /// Quantity entered by the user
    pub quantity: f64,
}

/// Defines relationships between `ProjectInput` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each input belongs to one project
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
