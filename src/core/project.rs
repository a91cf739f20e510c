//! Project business logic - lifecycle of a customer project and its form inputs.
//!
//! A project is created on its first save and updated in place afterwards; it
//! is never recreated, so committed overrides keep pointing at the same id.
//! Deleting a project removes every row it owns in one transaction.

use crate::{
    core::{
        bulk::{BatchOptions, delete_for_project, find_for_project, insert_chunked, keep_newest},
        pricing::{validate_amount, validate_margin, validate_percent},
    },
    entities::{
        DraftChange, Project, ProjectInput, ProjectProduct, ProjectProductGroup, Task, project,
        project_input, project_product, project_product_group,
    },
    errors::{Error, Result},
    models::Category,
};
use sea_orm::{Set, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Category-wide margin/discount pair
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MarginDiscount {
    /// Margin percent on top of the purchase price
    #[serde(default)]
    pub margin: Option<f64>,
    /// Discount percent off the catalog price
    #[serde(default)]
    pub discount: Option<f64>,
}

impl MarginDiscount {
    /// Checks the margin is above -100 % and the discount within `[0, 100]`.
    pub fn validate(&self) -> Result<()> {
        if let Some(margin) = self.margin {
            validate_margin(margin)?;
        }
        if let Some(discount) = self.discount {
            validate_percent(discount)?;
        }
        Ok(())
    }

    /// `true` when neither value is set
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.margin.is_none() && self.discount.is_none()
    }
}

/// The three category-wide pairs of a project
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryDefaults {
    /// Tiles
    pub tiles: MarginDiscount,
    /// Gutters
    pub gutters: MarginDiscount,
    /// Accessories
    pub accessories: MarginDiscount,
}

impl CategoryDefaults {
    /// The pair for `category`
    #[must_use]
    pub const fn get(&self, category: Category) -> MarginDiscount {
        match category {
            Category::Tile => self.tiles,
            Category::Gutter => self.gutters,
            Category::Accessory => self.accessories,
        }
    }

    /// Validates all three pairs.
    pub fn validate(&self) -> Result<()> {
        Category::ALL
            .iter()
            .try_for_each(|category| self.get(*category).validate())
    }
}

/// One quantity typed into the project form
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputValue {
    /// Mapper key (e.g. `"roof_area"`)
    pub mapper_key: String,
    /// Entered quantity
    pub quantity: f64,
}

/// Project form as submitted by the UI
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectForm {
    /// Existing project id, `None` on first save
    #[serde(default)]
    pub project_id: Option<i64>,
    /// Client the project belongs to
    pub client_id: i64,
    /// Workflow status
    #[serde(default = "default_status")]
    pub status: String,
    /// Category-wide margins/discounts
    #[serde(default)]
    pub defaults: CategoryDefaults,
    /// Form inputs, replacing the stored ones
    #[serde(default)]
    pub inputs: Vec<InputValue>,
}

fn default_status() -> String {
    "draft".to_string()
}

impl project::Model {
    /// The stored category-wide pair for `category`
    #[must_use]
    pub const fn defaults_for(&self, category: Category) -> MarginDiscount {
        match category {
            Category::Tile => MarginDiscount {
                margin: self.tile_margin,
                discount: self.tile_discount,
            },
            Category::Gutter => MarginDiscount {
                margin: self.gutter_margin,
                discount: self.gutter_discount,
            },
            Category::Accessory => MarginDiscount {
                margin: self.accessory_margin,
                discount: self.accessory_discount,
            },
        }
    }
}

fn set_defaults(active: &mut project::ActiveModel, category: Category, pair: MarginDiscount) {
    match category {
        Category::Tile => {
            active.tile_margin = Set(pair.margin);
            active.tile_discount = Set(pair.discount);
        }
        Category::Gutter => {
            active.gutter_margin = Set(pair.margin);
            active.gutter_discount = Set(pair.discount);
        }
        Category::Accessory => {
            active.accessory_margin = Set(pair.margin);
            active.accessory_discount = Set(pair.discount);
        }
    }
}

fn validate_form(form: &ProjectForm) -> Result<()> {
    if form.status.trim().is_empty() {
        return Err(Error::validation("Project status cannot be empty"));
    }
    form.defaults.validate()?;

    let mut seen = HashSet::new();
    for input in &form.inputs {
        if input.mapper_key.trim().is_empty() {
            return Err(Error::validation("Input mapper key cannot be empty"));
        }
        if !seen.insert(input.mapper_key.trim()) {
            return Err(Error::validation(format!(
                "Input '{}' given more than once",
                input.mapper_key.trim()
            )));
        }
        validate_amount(input.quantity)?;
    }
    Ok(())
}

/// Loads a project or fails with `Error::ProjectNotFound`.
pub async fn require_project<C>(db: &C, project_id: i64) -> Result<project::Model>
where
    C: ConnectionTrait,
{
    Project::find_by_id(project_id)
        .one(db)
        .await?
        .ok_or(Error::ProjectNotFound { id: project_id })
}

/// Creates the project on first save, otherwise updates it in place, and
/// replaces its form inputs.
///
/// # Errors
/// Returns a validation error for a malformed form and `ProjectNotFound` when
/// `project_id` names a project that does not exist.
pub async fn save_project(db: &DatabaseConnection, form: ProjectForm) -> Result<project::Model> {
    validate_form(&form)?;

    let txn = db.begin().await?;
    let now = chrono::Utc::now().naive_utc();

    let existing = match form.project_id {
        Some(id) => Some(require_project(&txn, id).await?),
        None => {
            Project::find()
                .filter(project::Column::ClientId.eq(form.client_id))
                .one(&txn)
                .await?
        }
    };

    let is_new = existing.is_none();
    let mut active: project::ActiveModel = match existing {
        Some(model) => model.into(),
        None => project::ActiveModel {
            created_at: Set(now),
            ..Default::default()
        },
    };
    active.client_id = Set(form.client_id);
    active.status = Set(form.status.trim().to_string());
    active.updated_at = Set(now);
    for category in Category::ALL {
        set_defaults(&mut active, category, form.defaults.get(category));
    }
    let saved = if is_new {
        active.insert(&txn).await?
    } else {
        active.update(&txn).await?
    };
    let project_id = saved.id;

    delete_for_project::<ProjectInput, _>(&txn, project_id, None).await?;
    let inputs: Vec<project_input::ActiveModel> = form
        .inputs
        .into_iter()
        .map(|input| project_input::ActiveModel {
            project_id: Set(project_id),
            mapper_key: Set(input.mapper_key.trim().to_string()),
            quantity: Set(input.quantity),
            ..Default::default()
        })
        .collect();
    insert_chunked(&txn, inputs, None, &BatchOptions::default()).await?;

    txn.commit().await?;

    tracing::info!(project_id, client_id = saved.client_id, is_new, "Saved project");
    Ok(saved)
}

/// Finds a project by id.
pub async fn get_project(
    db: &DatabaseConnection,
    project_id: i64,
) -> Result<Option<project::Model>> {
    Project::find_by_id(project_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Finds the project of a client.
pub async fn get_project_by_client(
    db: &DatabaseConnection,
    client_id: i64,
) -> Result<Option<project::Model>> {
    Project::find()
        .filter(project::Column::ClientId.eq(client_id))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Form inputs of a project, ordered by id.
pub async fn list_inputs<C>(db: &C, project_id: i64) -> Result<Vec<project_input::Model>>
where
    C: ConnectionTrait,
{
    find_for_project::<ProjectInput, _>(db, project_id, None).await
}

/// Stores the category-wide margin/discount pair of one category.
pub async fn set_category_defaults<C>(
    db: &C,
    project_id: i64,
    category: Category,
    pair: MarginDiscount,
) -> Result<project::Model>
where
    C: ConnectionTrait,
{
    pair.validate()?;
    let mut active: project::ActiveModel = require_project(db, project_id).await?.into();
    set_defaults(&mut active, category, pair);
    active.updated_at = Set(chrono::Utc::now().naive_utc());
    active.update(db).await.map_err(Into::into)
}

/// Stores all three category-wide pairs in one update.
pub async fn set_all_category_defaults<C>(
    db: &C,
    project_id: i64,
    defaults: CategoryDefaults,
) -> Result<project::Model>
where
    C: ConnectionTrait,
{
    defaults.validate()?;
    let mut active: project::ActiveModel = require_project(db, project_id).await?.into();
    for category in Category::ALL {
        set_defaults(&mut active, category, defaults.get(category));
    }
    active.updated_at = Set(chrono::Utc::now().naive_utc());
    active.update(db).await.map_err(Into::into)
}

/// Deletes a project and everything it owns: inputs, committed products and
/// groups, drafts and tasks.
///
/// # Errors
/// Returns `Error::ProjectNotFound` if the project does not exist.
pub async fn delete_project(db: &DatabaseConnection, project_id: i64) -> Result<()> {
    let txn = db.begin().await?;
    let project = require_project(&txn, project_id).await?;

    let drafts = delete_for_project::<DraftChange, _>(&txn, project_id, None).await?;
    let products = delete_for_project::<ProjectProduct, _>(&txn, project_id, None).await?;
    let groups = delete_for_project::<ProjectProductGroup, _>(&txn, project_id, None).await?;
    delete_for_project::<ProjectInput, _>(&txn, project_id, None).await?;
    delete_for_project::<Task, _>(&txn, project_id, None).await?;
    project.delete(&txn).await?;

    txn.commit().await?;
    tracing::info!(
        project_id,
        drafts,
        products,
        groups,
        "Deleted project with its owned rows"
    );
    Ok(())
}

/// Committed product overrides, one per (product, category), newest row wins.
pub async fn list_project_products<C>(
    db: &C,
    project_id: i64,
    category: Option<Category>,
) -> Result<Vec<project_product::Model>>
where
    C: ConnectionTrait,
{
    let rows = find_for_project::<ProjectProduct, _>(db, project_id, category).await?;
    let mut newest: Vec<project_product::Model> = keep_newest(
        rows,
        |row| (row.product_id, row.category.clone()),
        |row| row.id,
    )
    .into_values()
    .collect();
    newest.sort_by_key(|row| row.id);
    Ok(newest)
}

/// Committed group choices of a project, ordered by id.
pub async fn list_project_groups<C>(
    db: &C,
    project_id: i64,
) -> Result<Vec<project_product_group::Model>>
where
    C: ConnectionTrait,
{
    find_for_project::<ProjectProductGroup, _>(db, project_id, None).await
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::entities::DraftChangeModel;
    use crate::test_utils::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn form(client_id: i64) -> ProjectForm {
        ProjectForm {
            project_id: None,
            client_id,
            status: "draft".to_string(),
            defaults: CategoryDefaults::default(),
            inputs: vec![InputValue {
                mapper_key: "roof_area".to_string(),
                quantity: 120.0,
            }],
        }
    }

    #[tokio::test]
    async fn test_save_project_validation() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();

        let mut bad = form(1);
        bad.status = "  ".to_string();
        let result = save_project(&db, bad).await;
        assert!(matches!(result, Err(Error::Validation { message: _ })));

        let mut bad = form(1);
        bad.inputs.push(InputValue {
            mapper_key: "roof_area".to_string(),
            quantity: 3.0,
        });
        let result = save_project(&db, bad).await;
        assert!(matches!(result, Err(Error::Validation { message: _ })));

        let mut bad = form(1);
        bad.defaults.tiles.discount = Some(120.0);
        let result = save_project(&db, bad).await;
        assert!(matches!(result, Err(Error::InvalidAmount { amount: _ })));

        let mut bad = form(1);
        bad.inputs[0].quantity = 1e15;
        let result = save_project(&db, bad).await;
        assert!(matches!(result, Err(Error::InvalidAmount { amount }) if amount == 1e15));

        let mut bad = form(1);
        bad.defaults.tiles.margin = Some(1e30);
        let result = save_project(&db, bad).await;
        assert!(matches!(result, Err(Error::InvalidAmount { amount: _ })));
        Ok(())
    }

    #[tokio::test]
    async fn test_first_save_creates_then_updates_in_place() -> Result<()> {
        let db = setup_test_db().await?;

        let created = save_project(&db, form(7)).await?;
        assert_eq!(created.client_id, 7);
        assert_eq!(list_inputs(&db, created.id).await?.len(), 1);

        let mut second = form(7);
        second.status = "offered".to_string();
        second.defaults.tiles.margin = Some(15.0);
        second.inputs = vec![
            InputValue {
                mapper_key: "roof_area".to_string(),
                quantity: 130.0,
            },
            InputValue {
                mapper_key: "eaves_length".to_string(),
                quantity: 24.0,
            },
        ];
        let updated = save_project(&db, second).await?;

        assert_eq!(updated.id, created.id);
        assert_eq!(updated.status, "offered");
        assert_eq!(updated.defaults_for(Category::Tile).margin, Some(15.0));
        let inputs = list_inputs(&db, created.id).await?;
        assert_eq!(inputs.len(), 2);
        assert_eq!(inputs[0].quantity, 130.0);
        assert_eq!(get_project_by_client(&db, 7).await?.unwrap().id, created.id);
        Ok(())
    }

    #[tokio::test]
    async fn test_save_with_unknown_project_id() -> Result<()> {
        let db = setup_test_db().await?;
        let mut bad = form(1);
        bad.project_id = Some(404);
        let result = save_project(&db, bad).await;
        assert!(matches!(result, Err(Error::ProjectNotFound { id: 404 })));
        Ok(())
    }

    #[tokio::test]
    async fn test_set_category_defaults() -> Result<()> {
        let (db, project) = setup_with_project().await?;
        let pair = MarginDiscount {
            margin: Some(12.5),
            discount: None,
        };
        let updated = set_category_defaults(&db, project.id, Category::Gutter, pair).await?;
        assert_eq!(updated.defaults_for(Category::Gutter), pair);
        assert!(updated.defaults_for(Category::Tile).is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_project_cascades() -> Result<()> {
        let (db, project) = setup_with_project().await?;
        let product = create_test_product(&db, "Roma", Category::Tile, 10.0).await?;
        insert_test_draft(&db, project.id, product.id, "TILE", Some(5.0)).await?;
        insert_test_project_product(&db, project.id, product.id, "TILE", Some(9.0)).await?;
        crate::core::tasks::create_task(
            &db,
            Some(project.id),
            "Call back".to_string(),
            chrono::Utc::now(),
        )
        .await?;

        delete_project(&db, project.id).await?;

        assert!(get_project(&db, project.id).await?.is_none());
        let drafts: Vec<DraftChangeModel> = DraftChange::find().all(&db).await?;
        assert!(drafts.is_empty());
        assert!(ProjectProduct::find().all(&db).await?.is_empty());
        assert!(Task::find().all(&db).await?.is_empty());
        assert!(ProjectInput::find().all(&db).await?.is_empty());

        let result = delete_project(&db, project.id).await;
        assert!(matches!(result, Err(Error::ProjectNotFound { id: _ })));
        Ok(())
    }

    #[tokio::test]
    async fn test_list_project_products_keeps_newest_duplicate() -> Result<()> {
        let (db, project) = setup_with_project().await?;
        let older = insert_test_project_product(&db, project.id, 5, "TILE", Some(10.0)).await?;
        let newer = insert_test_project_product(&db, project.id, 5, "TILE", Some(12.0)).await?;
        insert_test_project_product(&db, project.id, 6, "TILE", Some(3.0)).await?;

        let rows = list_project_products(&db, project.id, Some(Category::Tile)).await?;
        assert_eq!(rows.len(), 2);
        let five = rows.iter().find(|r| r.product_id == 5).unwrap();
        assert_eq!(five.id, newer.id);
        assert!(newer.id > older.id);
        assert_eq!(five.selling_price, Some(12.0));
        Ok(())
    }
}
