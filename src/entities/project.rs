//! Project entity - a customer-specific offer under construction.
//!
//! A project belongs to exactly one client and owns its form inputs, committed
//! product overrides, committed group choices, staged drafts and follow-up tasks.
//! The per-category margin/discount pairs remember the last category-wide
//! adjustment so the UI can restore its sliders.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Project database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "projects")]
pub struct Model {
    /// Unique identifier for the project
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Client reference, one project per client
    #[sea_orm(unique)]
    pub client_id: i64,
    /// Free-form workflow status (e.g. "draft", "offered")
    pub status: String,
    /// Category-wide margin for tiles
    pub tile_margin: Option<f64>,
    /// Category-wide discount for tiles
    pub tile_discount: Option<f64>,
    /// Category-wide margin for gutters
    pub gutter_margin: Option<f64>,
    /// Category-wide discount for gutters
    pub gutter_discount: Option<f64>,
    /// Category-wide margin for accessories
    pub accessory_margin: Option<f64>,
    /// Category-wide discount for accessories
    pub accessory_discount: Option<f64>,
    /// When the project was first saved
    pub created_at: DateTime,
    /// When the project was last saved
    pub updated_at: DateTime,
}

/// Defines relationships between Project and its owned rows
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One project has many form inputs
    #[sea_orm(has_many = "super::project_input::Entity")]
    Inputs,
    /// One project has many committed product overrides
    #[sea_orm(has_many = "super::project_product::Entity")]
    ProjectProducts,
    /// One project has many committed group choices
    #[sea_orm(has_many = "super::project_product_group::Entity")]
    ProjectProductGroups,
    /// One project has many staged drafts
    #[sea_orm(has_many = "super::draft_change::Entity")]
    Drafts,
}

impl Related<super::project_input::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Inputs.def()
    }
}

impl Related<super::project_product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProjectProducts.def()
    }
}

impl Related<super::project_product_group::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProjectProductGroups.def()
    }
}

impl Related<super::draft_change::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Drafts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
