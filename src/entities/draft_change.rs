//! Draft change entity - a staged, not yet committed edit.
//!
//! At most one row exists per (`project_id`, `product_id`, `category`); the
//! unique index is created in `config::database::create_tables` and upserts
//! rely on it. A `product_id` of 0 marks a group-scoped decision that applies
//! to the bundle named by `group_manufacturer`/`group_name`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Staged edit database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "draft_changes")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning project
    pub project_id: i64,
    /// Catalog product id, or 0 for a group-scoped draft
    pub product_id: i64,
    /// Category text as received
    pub category: String,
    /// Staged catalog/retail price
    pub retail_price: Option<f64>,
    /// Staged purchase price
    pub purchase_price: Option<f64>,
    /// Staged selling price
    pub selling_price: Option<f64>,
    /// Staged quantity
    pub quantity: Option<f64>,
    /// Staged margin percent
    pub margin_percent: Option<f64>,
    /// Staged discount percent
    pub discount_percent: Option<f64>,
    /// `"AUTO"` or `"MANUAL"`
    pub price_source: Option<String>,
    /// Staged group option for the product's bundle
    pub group_option: Option<String>,
    /// Accessory toggle
    pub selected: Option<bool>,
    /// Manufacturer of the bundle, only for group-scoped drafts
    pub group_manufacturer: Option<String>,
    /// Group name of the bundle, only for group-scoped drafts
    pub group_name: Option<String>,
    /// Category-wide margin in effect when the row was staged
    pub category_margin: Option<f64>,
    /// Category-wide discount in effect when the row was staged
    pub category_discount: Option<f64>,
    /// When the row was last staged
    pub updated_at: DateTime,
}

impl Model {
    /// `true` when nothing but the group option is staged.
    ///
    /// Such a draft carries an explicit group decision, including an explicit
    /// `NONE`. A row without a group option is not group-option-only.
    #[must_use]
    pub const fn is_group_option_only(&self) -> bool {
        self.group_option.is_some() && self.has_no_value_fields()
    }

    /// `true` when every staged field, group option included, is null.
    /// Readers treat such a row as if no draft existed.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.group_option.is_none() && self.has_no_value_fields()
    }

    const fn has_no_value_fields(&self) -> bool {
        self.retail_price.is_none()
            && self.purchase_price.is_none()
            && self.selling_price.is_none()
            && self.quantity.is_none()
            && self.margin_percent.is_none()
            && self.discount_percent.is_none()
            && self.price_source.is_none()
            && self.selected.is_none()
    }
}

/// Defines relationships between `DraftChange` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each draft belongs to one project
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
