//! Bulk edits that produce drafts from catalog data.
//!
//! Both actions only stage; nothing reaches the committed tables until the
//! project is committed.

use crate::{
    core::{
        bulk::{BatchOptions, keep_newest},
        catalog,
        draft::{self, DraftFields, DraftItem, DraftUpsertRequest, UpsertMode, UpsertOutcome},
        pricing::{quantity, selling_price_with_discount, selling_price_with_margin},
        project::{self, MarginDiscount, require_project},
    },
    entities::{draft_change, product},
    errors::Result,
    models::{Category, GroupOption, PriceSource},
};
use sea_orm::{DatabaseConnection, TransactionTrait};
use std::collections::HashMap;

/// Stages `quantity(input, converter)` for every catalog product of
/// `category` whose mapper key has a value in the project form.
///
/// Uses the quantity-only path, so staged prices are kept.
#[tracing::instrument(skip(db, options))]
pub async fn recalculate_quantities(
    db: &DatabaseConnection,
    project_id: i64,
    category: Category,
    options: &BatchOptions,
) -> Result<UpsertOutcome> {
    let txn = db.begin().await?;
    require_project(&txn, project_id).await?;

    let inputs: HashMap<String, f64> = project::list_inputs(&txn, project_id)
        .await?
        .into_iter()
        .map(|input| (input.mapper_key, input.quantity))
        .collect();

    let items: Vec<DraftItem> = catalog::find_by_category(&txn, category)
        .await?
        .into_iter()
        .filter_map(|product| {
            let input = product
                .mapper_key
                .as_deref()
                .and_then(|key| inputs.get(key))?;
            Some(DraftItem {
                product_id: product.id,
                fields: DraftFields {
                    quantity: Some(quantity(*input, product.quantity_converter)),
                    ..Default::default()
                },
            })
        })
        .collect();

    let request = DraftUpsertRequest {
        category: category.as_str().to_string(),
        category_margin: None,
        category_discount: None,
        items,
    };
    let rows = draft::stage_items(
        &txn,
        project_id,
        request,
        category,
        UpsertMode::QuantityOnly,
        options,
    )
    .await?;
    txn.commit().await?;

    tracing::info!(rows, "Recalculated quantities from form inputs");
    Ok(UpsertOutcome {
        mode: UpsertMode::QuantityOnly,
        rows,
    })
}

fn repriced_fields(
    product: &product::Model,
    pair: MarginDiscount,
    staged: Option<&draft_change::Model>,
) -> DraftFields {
    let selling_price = match (pair.margin, pair.discount) {
        (Some(margin), _) => selling_price_with_margin(product.purchase_price, margin),
        (None, Some(discount)) => selling_price_with_discount(product.catalog_price, discount),
        (None, None) => product.selling_price,
    };

    let group_option = staged
        .and_then(|draft| draft.group_option.as_deref())
        .and_then(|raw| match raw.parse::<GroupOption>() {
            Ok(option) => Some(option),
            Err(e) => {
                tracing::warn!(draft_id = ?staged.map(|d| d.id), error = %e, "Dropping malformed staged group option");
                None
            }
        });

    DraftFields {
        retail_price: Some(product.catalog_price),
        purchase_price: Some(product.purchase_price),
        selling_price: Some(selling_price),
        quantity: staged.and_then(|draft| draft.quantity),
        margin_percent: pair.margin,
        discount_percent: pair.discount,
        price_source: Some(PriceSource::Auto),
        group_option,
        selected: staged.and_then(|draft| draft.selected),
        group_manufacturer: None,
        group_name: None,
    }
}

/// Reprices every catalog product of `category` with a category-wide margin
/// (or, without one, a discount), stages the result as full rows and stores the
/// pair as the project's default for the category.
///
/// Already staged quantities, group options and selections are carried over.
#[tracing::instrument(skip(db, options))]
pub async fn apply_category_margin(
    db: &DatabaseConnection,
    project_id: i64,
    category: Category,
    pair: MarginDiscount,
    options: &BatchOptions,
) -> Result<u64> {
    pair.validate()?;

    let txn = db.begin().await?;
    project::set_category_defaults(&txn, project_id, category, pair).await?;

    let staged = keep_newest(
        draft::list_by(&txn, project_id, Some(category)).await?,
        |row| row.product_id,
        |row| row.id,
    );

    let items: Vec<DraftItem> = catalog::find_by_category(&txn, category)
        .await?
        .iter()
        .map(|product| DraftItem {
            product_id: product.id,
            fields: repriced_fields(product, pair, staged.get(&product.id)),
        })
        .collect();

    let request = DraftUpsertRequest {
        category: category.as_str().to_string(),
        category_margin: pair.margin,
        category_discount: pair.discount,
        items,
    };
    let rows = draft::stage_items(
        &txn,
        project_id,
        request,
        category,
        UpsertMode::FullRow,
        options,
    )
    .await?;
    txn.commit().await?;

    tracing::info!(rows, "Applied category-wide margin");
    Ok(rows)
}
