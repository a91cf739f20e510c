//! Shared test utilities.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test entities with sensible defaults.

use crate::{
    core::{
        bulk::BatchOptions,
        catalog::{self, DiscountsInput, NewProduct},
        project::{self, CategoryDefaults, ProjectForm},
    },
    entities::{self, draft_change, project_product},
    errors::{Error, Result},
    models::{Category, DiscountMethod, GroupOption},
};
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Builds an importer row with sensible defaults.
///
/// # Defaults
/// * `manufacturer`: "Braas"
/// * `group_name`: "Roma"
/// * `unit`: "pcs", `quantity_converter`: 1.0
/// * no discounts, no margin, catalog method
pub fn new_product(name: &str, category: Category, catalog_price: f64) -> NewProduct {
    NewProduct {
        name: name.to_string(),
        category,
        manufacturer: "Braas".to_string(),
        group_name: "Roma".to_string(),
        mapper_key: None,
        unit: "pcs".to_string(),
        quantity_converter: 1.0,
        catalog_price,
        purchase_price: 0.0,
        discounts: DiscountsInput::default(),
        discount_method: DiscountMethod::Catalog,
        margin_percent: 0.0,
        group_option: GroupOption::None,
    }
}

async fn insert_one(db: &DatabaseConnection, new: NewProduct) -> Result<entities::product::Model> {
    let category = new.category;
    let name = new.name.clone();
    catalog::insert_products(db, vec![new], &BatchOptions::default()).await?;
    catalog::find_by_category(db, category)
        .await?
        .into_iter()
        .rev()
        .find(|product| product.name == name)
        .ok_or_else(|| Error::validation(format!("test product '{name}' was not stored")))
}

/// Creates a catalog product with the defaults of [`new_product`].
pub async fn create_test_product(
    db: &DatabaseConnection,
    name: &str,
    category: Category,
    catalog_price: f64,
) -> Result<entities::product::Model> {
    insert_one(db, new_product(name, category, catalog_price)).await
}

/// Creates a catalog product in a specific bundle, optionally mapped to a
/// form input.
pub async fn create_custom_product(
    db: &DatabaseConnection,
    name: &str,
    category: Category,
    manufacturer: &str,
    group_name: &str,
    mapper_key: Option<&str>,
    quantity_converter: f64,
) -> Result<entities::product::Model> {
    let mut new = new_product(name, category, 10.0);
    new.manufacturer = manufacturer.to_string();
    new.group_name = group_name.to_string();
    new.mapper_key = mapper_key.map(str::to_string);
    new.quantity_converter = quantity_converter;
    insert_one(db, new).await
}

/// Creates a project for `client_id` with no defaults and no inputs.
pub async fn create_test_project(
    db: &DatabaseConnection,
    client_id: i64,
) -> Result<entities::project::Model> {
    project::save_project(
        db,
        ProjectForm {
            project_id: None,
            client_id,
            status: "draft".to_string(),
            defaults: CategoryDefaults::default(),
            inputs: Vec::new(),
        },
    )
    .await
}

/// Sets up a complete test environment with a project.
/// Returns (db, project) for common test scenarios.
pub async fn setup_with_project() -> Result<(DatabaseConnection, entities::project::Model)> {
    let db = setup_test_db().await?;
    let project = create_test_project(&db, 1).await?;
    Ok((db, project))
}

/// Inserts a draft row directly, bypassing validation.
///
/// # Defaults
/// Only `quantity` is set; every other staged field is null.
pub async fn insert_test_draft(
    db: &DatabaseConnection,
    project_id: i64,
    product_id: i64,
    category: &str,
    quantity: Option<f64>,
) -> Result<draft_change::Model> {
    draft_change::ActiveModel {
        project_id: Set(project_id),
        product_id: Set(product_id),
        category: Set(category.to_string()),
        quantity: Set(quantity),
        updated_at: Set(chrono::Utc::now().naive_utc()),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Inserts a committed override directly. Duplicates are allowed, which is how
/// tests reproduce historical data.
pub async fn insert_test_project_product(
    db: &DatabaseConnection,
    project_id: i64,
    product_id: i64,
    category: &str,
    selling_price: Option<f64>,
) -> Result<project_product::Model> {
    project_product::ActiveModel {
        project_id: Set(project_id),
        product_id: Set(product_id),
        category: Set(category.to_string()),
        selling_price: Set(selling_price),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}
