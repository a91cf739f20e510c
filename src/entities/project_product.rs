//! Project product entity - a committed per-project override of a catalog row.
//!
//! Rows are keyed logically by (`project_id`, `product_id`, `category`) but the
//! key is not enforced: historical writes left duplicates behind, and readers
//! resolve them with `core::bulk::keep_newest` (highest id wins).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Committed override database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "project_products")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning project
    pub project_id: i64,
    /// Catalog product id (not a foreign key, the product may be gone)
    pub product_id: i64,
    /// Category text as staged
    pub category: String,
    /// Saved catalog/retail price
    pub retail_price: Option<f64>,
    /// Saved purchase price
    pub purchase_price: Option<f64>,
    /// Saved selling price
    pub selling_price: Option<f64>,
    /// Saved quantity
    pub quantity: Option<f64>,
    /// Saved margin percent
    pub margin_percent: Option<f64>,
    /// Saved discount percent
    pub discount_percent: Option<f64>,
    /// `"AUTO"` or `"MANUAL"`
    pub price_source: Option<String>,
    /// Accessory toggle
    pub selected: Option<bool>,
}

/// Defines relationships between `ProjectProduct` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each override belongs to one project
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
