//! Draft store - staged, not yet committed edits of a project.
//!
//! Every UI edit lands here through an `INSERT ... ON CONFLICT DO UPDATE` on
//! the unique (project, product, category) key, so overlapping upserts from
//! rapid consecutive actions converge on one row without application locks.
//!
//! Two upsert shapes exist:
//! - full row: the caller provides every field and all of them overwrite the
//!   staged row, nulls included;
//! - quantity only: a batch in which every item sets nothing but `quantity`
//!   (and no category-wide margin/discount is given) only touches the quantity
//!   column of existing rows, keeping every other staged field. It is also the
//!   cheaper statement, so [`bulk_upsert`] picks it whenever the batch allows.

use crate::{
    core::{
        bulk::{BatchOptions, delete_for_project, find_for_project, insert_chunked},
        catalog,
        pricing::{validate_amount, validate_margin, validate_percent},
        project::require_project,
    },
    entities::{DraftChange, draft_change},
    errors::{Error, Result},
    models::{Category, GroupOption, PriceSource},
};
use sea_orm::{Set, TransactionTrait, prelude::*, sea_query::OnConflict};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Product id of a draft that applies to a whole manufacturer/group bundle.
///
/// Group-scoped drafts share the `(project, 0, category)` key, so a project
/// holds at most one per category: staging a second bundle before the commit
/// replaces the first.
pub const GROUP_SENTINEL_PRODUCT_ID: i64 = 0;

/// Editable fields of a draft; `None` means "not staged"
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DraftFields {
    /// Catalog/retail price override
    pub retail_price: Option<f64>,
    /// Purchase price override
    pub purchase_price: Option<f64>,
    /// Selling price override
    pub selling_price: Option<f64>,
    /// Quantity
    pub quantity: Option<f64>,
    /// Margin percent
    pub margin_percent: Option<f64>,
    /// Discount percent
    pub discount_percent: Option<f64>,
    /// Why the price differs from the catalog
    pub price_source: Option<PriceSource>,
    /// Group option for the product's bundle
    pub group_option: Option<GroupOption>,
    /// Accessory toggle
    pub selected: Option<bool>,
    /// Bundle manufacturer, group-scoped drafts only
    pub group_manufacturer: Option<String>,
    /// Bundle group name, group-scoped drafts only
    pub group_name: Option<String>,
}

impl DraftFields {
    /// `true` when `quantity` is the only field set
    #[must_use]
    pub fn is_quantity_only(&self) -> bool {
        self.quantity.is_some() && Self { quantity: None, ..self.clone() } == Self::default()
    }

    fn validate(&self) -> Result<()> {
        for amount in [
            self.retail_price,
            self.purchase_price,
            self.selling_price,
            self.quantity,
        ]
        .into_iter()
        .flatten()
        {
            validate_amount(amount)?;
        }
        if let Some(margin) = self.margin_percent {
            validate_margin(margin)?;
        }
        if let Some(discount) = self.discount_percent {
            validate_percent(discount)?;
        }
        Ok(())
    }
}

/// One product's staged fields
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftItem {
    /// Catalog product id, or [`GROUP_SENTINEL_PRODUCT_ID`]
    pub product_id: i64,
    /// Staged fields
    #[serde(flatten)]
    pub fields: DraftFields,
}

/// Request body of a draft upsert
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftUpsertRequest {
    /// Category text, validated on use
    pub category: String,
    /// Category-wide margin in effect
    #[serde(default)]
    pub category_margin: Option<f64>,
    /// Category-wide discount in effect
    #[serde(default)]
    pub category_discount: Option<f64>,
    /// Staged items
    #[serde(default)]
    pub items: Vec<DraftItem>,
}

/// How a batch is written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertMode {
    /// Every field of the staged row is replaced
    FullRow,
    /// Only the quantity of the staged row is replaced
    QuantityOnly,
}

/// Result of [`bulk_upsert`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertOutcome {
    /// Chosen write path
    pub mode: UpsertMode,
    /// Rows inserted or updated
    pub rows: u64,
}

/// Picks the field-scoped path when every item only carries a quantity and no
/// category-wide margin/discount is present.
#[must_use]
pub fn detect_mode(request: &DraftUpsertRequest) -> UpsertMode {
    let quantity_only = !request.items.is_empty()
        && request.category_margin.is_none()
        && request.category_discount.is_none()
        && request.items.iter().all(|item| item.fields.is_quantity_only());
    if quantity_only {
        UpsertMode::QuantityOnly
    } else {
        UpsertMode::FullRow
    }
}

fn validate_item(item: &DraftItem) -> Result<()> {
    item.fields.validate()?;
    if item.product_id < GROUP_SENTINEL_PRODUCT_ID {
        return Err(Error::validation(format!(
            "Invalid product id {}",
            item.product_id
        )));
    }
    if item.product_id == GROUP_SENTINEL_PRODUCT_ID {
        let scoped = item.fields.group_option.is_some()
            && item.fields.group_manufacturer.is_some()
            && item.fields.group_name.is_some();
        if !scoped {
            return Err(Error::validation(
                "A group-scoped draft needs a group option, manufacturer and group name",
            ));
        }
    }
    Ok(())
}

fn validate_request(request: &DraftUpsertRequest) -> Result<Category> {
    let category: Category = request.category.parse()?;
    if let Some(margin) = request.category_margin {
        validate_margin(margin)?;
    }
    if let Some(discount) = request.category_discount {
        validate_percent(discount)?;
    }
    request.items.iter().try_for_each(validate_item)?;
    Ok(category)
}

/// Keeps the last item per product id, in first-seen order.
fn last_item_per_product(items: Vec<DraftItem>) -> Vec<DraftItem> {
    let mut position: HashMap<i64, usize> = HashMap::new();
    let mut unique: Vec<DraftItem> = Vec::with_capacity(items.len());
    for item in items {
        if let Some(index) = position.get(&item.product_id) {
            unique[*index] = item;
        } else {
            position.insert(item.product_id, unique.len());
            unique.push(item);
        }
    }
    unique
}

fn key_conflict() -> OnConflict {
    OnConflict::columns([
        draft_change::Column::ProjectId,
        draft_change::Column::ProductId,
        draft_change::Column::Category,
    ])
    .to_owned()
}

fn conflict_clause(mode: UpsertMode) -> OnConflict {
    let mut clause = key_conflict();
    match mode {
        UpsertMode::QuantityOnly => {
            clause.update_columns([draft_change::Column::Quantity, draft_change::Column::UpdatedAt]);
        }
        UpsertMode::FullRow => {
            clause.update_columns([
                draft_change::Column::RetailPrice,
                draft_change::Column::PurchasePrice,
                draft_change::Column::SellingPrice,
                draft_change::Column::Quantity,
                draft_change::Column::MarginPercent,
                draft_change::Column::DiscountPercent,
                draft_change::Column::PriceSource,
                draft_change::Column::GroupOption,
                draft_change::Column::Selected,
                draft_change::Column::GroupManufacturer,
                draft_change::Column::GroupName,
                draft_change::Column::CategoryMargin,
                draft_change::Column::CategoryDiscount,
                draft_change::Column::UpdatedAt,
            ]);
        }
    }
    clause
}

struct StagingContext {
    project_id: i64,
    category: Category,
    category_margin: Option<f64>,
    category_discount: Option<f64>,
    now: DateTime,
}

fn to_active_model(ctx: &StagingContext, item: DraftItem) -> draft_change::ActiveModel {
    let fields = item.fields;
    draft_change::ActiveModel {
        project_id: Set(ctx.project_id),
        product_id: Set(item.product_id),
        category: Set(ctx.category.as_str().to_string()),
        retail_price: Set(fields.retail_price),
        purchase_price: Set(fields.purchase_price),
        selling_price: Set(fields.selling_price),
        quantity: Set(fields.quantity),
        margin_percent: Set(fields.margin_percent),
        discount_percent: Set(fields.discount_percent),
        price_source: Set(fields.price_source.map(|s| s.as_str().to_string())),
        group_option: Set(fields.group_option.map(|o| o.as_str().to_string())),
        selected: Set(fields.selected),
        group_manufacturer: Set(fields.group_manufacturer),
        group_name: Set(fields.group_name),
        category_margin: Set(ctx.category_margin),
        category_discount: Set(ctx.category_discount),
        updated_at: Set(ctx.now),
        ..Default::default()
    }
}

/// Writes already validated items inside the caller's transaction.
pub(crate) async fn stage_items<C>(
    db: &C,
    project_id: i64,
    request: DraftUpsertRequest,
    category: Category,
    mode: UpsertMode,
    options: &BatchOptions,
) -> Result<u64>
where
    C: ConnectionTrait,
{
    let items = last_item_per_product(request.items);
    let product_ids: Vec<i64> = items
        .iter()
        .map(|item| item.product_id)
        .filter(|id| *id != GROUP_SENTINEL_PRODUCT_ID)
        .collect();
    catalog::require_in_category(db, category, &product_ids).await?;

    let ctx = StagingContext {
        project_id,
        category,
        category_margin: request.category_margin,
        category_discount: request.category_discount,
        now: chrono::Utc::now().naive_utc(),
    };
    let rows: Vec<draft_change::ActiveModel> = items
        .into_iter()
        .map(|item| to_active_model(&ctx, item))
        .collect();

    insert_chunked(db, rows, Some(&conflict_clause(mode)), options).await
}

/// Stages a batch of edits for one category of a project.
///
/// The request is rejected as a whole on a malformed category, an invalid
/// amount, a missing project, an unknown product or a product filed under
/// another category.
#[tracing::instrument(skip(db, request, options), fields(items = request.items.len()))]
pub async fn bulk_upsert(
    db: &DatabaseConnection,
    project_id: i64,
    request: DraftUpsertRequest,
    options: &BatchOptions,
) -> Result<UpsertOutcome> {
    let category = validate_request(&request)?;
    let mode = detect_mode(&request);

    let txn = db.begin().await?;
    require_project(&txn, project_id).await?;
    let rows = stage_items(&txn, project_id, request, category, mode, options).await?;
    txn.commit().await?;

    tracing::debug!(?mode, rows, %category, "Staged drafts");
    Ok(UpsertOutcome { mode, rows })
}

/// Stages one product as a full row, replacing whatever was staged for the key.
pub async fn upsert(
    db: &DatabaseConnection,
    project_id: i64,
    product_id: i64,
    category: Category,
    fields: DraftFields,
) -> Result<()> {
    let request = DraftUpsertRequest {
        category: category.as_str().to_string(),
        category_margin: None,
        category_discount: None,
        items: vec![DraftItem { product_id, fields }],
    };
    validate_request(&request)?;

    let txn = db.begin().await?;
    require_project(&txn, project_id).await?;
    stage_items(
        &txn,
        project_id,
        request,
        category,
        UpsertMode::FullRow,
        &BatchOptions::default(),
    )
    .await?;
    txn.commit().await?;
    Ok(())
}

/// Staged drafts of a project, optionally for one category, ordered by id.
pub async fn list_by<C>(
    db: &C,
    project_id: i64,
    category: Option<Category>,
) -> Result<Vec<draft_change::Model>>
where
    C: ConnectionTrait,
{
    find_for_project::<DraftChange, _>(db, project_id, category).await
}

/// Discards staged drafts of a project, optionally for one category.
///
/// # Errors
/// Returns `Error::ProjectNotFound` if the project does not exist.
pub async fn clear(
    db: &DatabaseConnection,
    project_id: i64,
    category: Option<Category>,
) -> Result<u64> {
    require_project(db, project_id).await?;
    let deleted = delete_for_project::<DraftChange, _>(db, project_id, category).await?;
    tracing::info!(project_id, ?category, deleted, "Discarded drafts");
    Ok(deleted)
}
