//! Product entity - a row of the vendor catalog.
//!
//! Products are independent of any project. They are grouped by
//! (manufacturer, group name, category) for group-option decisions, and linked
//! to quantity inputs through `mapper_key`. Prices are stored already derived
//! and rounded; see `core::pricing::derive_prices`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Catalog product database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    /// Unique identifier for the product
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Display name (e.g. "Tile Roma red")
    pub name: String,
    /// `"TILE"`, `"GUTTER"` or `"ACCESSORY"`
    pub category: String,
    /// Manufacturer name
    pub manufacturer: String,
    /// Product group within the manufacturer's range
    pub group_name: String,
    /// Key of the form input that drives this product's quantity
    pub mapper_key: Option<String>,
    /// Unit of sale (e.g. "pcs", "m")
    pub unit: String,
    /// Factor from the form input to the product quantity
    pub quantity_converter: f64,
    /// Catalog (retail list) price
    pub catalog_price: f64,
    /// Purchase price after stacked discounts
    pub purchase_price: f64,
    /// Default selling price
    pub selling_price: f64,
    /// Basic discount percent
    pub basic_discount: f64,
    /// Additional discount percent
    pub additional_discount: f64,
    /// Promotional discount percent
    pub promotion_discount: f64,
    /// Early-payment (skonto) discount percent
    pub skonto_discount: f64,
    /// `"CATALOG"` or `"PURCHASE"`: which price was authoritative on import
    pub discount_method: String,
    /// Margin percent used when the catalog price is derived from purchase price
    pub margin_percent: f64,
    /// Default group option, `"MAIN"`, `"OPTIONAL"` or `"NONE"`
    pub group_option: String,
    /// When the product was imported
    pub created_at: DateTime,
    /// When the product was last modified
    pub updated_at: DateTime,
}

/// Products reference nothing; projects reference products by id only
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
