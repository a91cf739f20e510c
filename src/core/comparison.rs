//! Comparison view builder - the read model behind the offer screen.
//!
//! For every current catalog product of a category it joins the committed
//! override, the staged draft and the effective group option into one row.
//! Products removed from the catalog disappear from the view even when
//! committed rows still refer to them.

use crate::{
    core::{
        bulk::{find_for_project, keep_newest},
        catalog, draft,
        pricing::money_eq,
        project::{self, require_project},
    },
    entities::{ProjectProduct, draft_change, product, project_product, project_product_group},
    errors::Result,
    models::{Category, GroupOption},
};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use std::collections::HashMap;

const QUANTITY_TOLERANCE: f64 = 0.01;

/// One product line of the comparison view
///
/// Prices come in four flavours: `current_*` from the catalog, `saved_*` from
/// the committed override, `draft_*` from the staged draft and `new_*`, the
/// draft value falling back to the catalog.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonRow {
    /// Catalog product id
    pub id: i64,
    /// Display name
    pub name: String,
    /// Manufacturer
    pub manufacturer: String,
    /// Group name
    pub group_name: String,
    /// Category
    pub category: Category,
    /// Unit of sale
    pub unit: String,
    /// Factor from form input to quantity
    pub quantity_converter: f64,

    /// Catalog price
    pub current_catalog_price: f64,
    /// Catalog purchase price
    pub current_purchase_price: f64,
    /// Catalog selling price
    pub current_selling_price: f64,

    /// Committed retail price
    pub saved_retail_price: Option<f64>,
    /// Committed purchase price
    pub saved_purchase_price: Option<f64>,
    /// Committed selling price
    pub saved_selling_price: Option<f64>,

    /// Staged retail price
    pub draft_retail_price: Option<f64>,
    /// Staged purchase price
    pub draft_purchase_price: Option<f64>,
    /// Staged selling price
    pub draft_selling_price: Option<f64>,

    /// Staged retail price, else catalog price
    pub new_retail_price: f64,
    /// Staged purchase price, else catalog purchase price
    pub new_purchase_price: f64,
    /// Staged selling price, else catalog selling price
    pub new_selling_price: f64,

    /// Committed quantity
    pub saved_quantity: Option<f64>,
    /// Staged quantity
    pub draft_quantity: Option<f64>,

    /// Catalog basic discount
    pub basic_discount: f64,
    /// Catalog additional discount
    pub additional_discount: f64,
    /// Catalog promotional discount
    pub promotion_discount: f64,
    /// Catalog early-payment discount
    pub skonto_discount: f64,
    /// Catalog margin
    pub margin_percent: f64,
    /// Committed margin
    pub saved_margin_percent: Option<f64>,
    /// Committed discount
    pub saved_discount_percent: Option<f64>,
    /// Staged margin
    pub draft_margin_percent: Option<f64>,
    /// Staged discount
    pub draft_discount_percent: Option<f64>,
    /// Staged price source, else the committed one
    pub price_source: Option<String>,
    /// Staged selection, else the committed one
    pub selected: Option<bool>,

    /// Effective group option
    pub group_option: GroupOption,
    /// Committed selling price differs from the catalog by a cent or more
    pub price_changed: bool,
    /// Staged quantity differs from the committed one
    pub quantity_changed: bool,
}

/// The comparison view of one category
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonView {
    /// Category shown
    pub category: Category,
    /// One row per catalog product, ordered by id
    pub rows: Vec<ComparisonRow>,
    /// Category-wide margin in effect, from the drafts or the project default
    pub category_margin: Option<f64>,
    /// Category-wide discount in effect, from the drafts or the project default
    pub category_discount: Option<f64>,
}

fn parse_option(raw: Option<&str>, draft_id: i64) -> Option<GroupOption> {
    let raw = raw?;
    match raw.parse() {
        Ok(option) => Some(option),
        Err(e) => {
            tracing::warn!(draft_id, error = %e, "Ignoring malformed group option");
            None
        }
    }
}

/// Group option priority: an explicit group-option-only draft (even `NONE`),
/// then a set option on the product's draft, then a group-scoped draft for
/// the bundle, then the committed group, then `NONE`.
fn effective_group_option(
    product: &product::Model,
    draft: Option<&draft_change::Model>,
    bundle_drafts: &HashMap<(String, String), GroupOption>,
    committed_groups: &HashMap<(String, String), GroupOption>,
) -> GroupOption {
    let drafted = draft.and_then(|d| parse_option(d.group_option.as_deref(), d.id).map(|o| (d, o)));
    match drafted {
        Some((d, option)) if d.is_group_option_only() => return option,
        Some((_, option)) if option.is_set() => return option,
        _ => {}
    }

    let bundle = (product.manufacturer.clone(), product.group_name.clone());
    if let Some(option) = bundle_drafts.get(&bundle).filter(|o| o.is_set()) {
        return *option;
    }
    committed_groups.get(&bundle).copied().unwrap_or_default()
}

fn quantity_changed(draft_quantity: Option<f64>, saved_quantity: Option<f64>) -> bool {
    match (draft_quantity, saved_quantity) {
        (Some(drafted), Some(saved)) => (drafted - saved).abs() >= QUANTITY_TOLERANCE,
        (Some(_), None) => true,
        (None, _) => false,
    }
}

/// Joins catalog, committed rows, drafts and groups of one category.
///
/// Duplicates among committed rows and drafts are resolved newest-wins; a
/// draft with every field null counts as absent.
pub fn assemble_rows(
    category: Category,
    products: &[product::Model],
    committed: Vec<project_product::Model>,
    drafts: Vec<draft_change::Model>,
    groups: &[project_product_group::Model],
) -> Vec<ComparisonRow> {
    let committed = keep_newest(committed, |row| row.product_id, |row| row.id);

    let (bundle_rows, product_rows): (Vec<_>, Vec<_>) = drafts
        .into_iter()
        .partition(|d| d.product_id == draft::GROUP_SENTINEL_PRODUCT_ID);
    let drafts: HashMap<i64, draft_change::Model> =
        keep_newest(product_rows, |row| row.product_id, |row| row.id)
            .into_iter()
            .filter(|(_, row)| !row.is_empty())
            .collect();

    let bundle_drafts: HashMap<(String, String), GroupOption> = keep_newest(
        bundle_rows,
        |row| (row.group_manufacturer.clone(), row.group_name.clone()),
        |row| row.id,
    )
    .into_iter()
    .filter_map(|((manufacturer, group_name), row)| {
        let option = parse_option(row.group_option.as_deref(), row.id)?;
        Some(((manufacturer?, group_name?), option))
    })
    .collect();

    let committed_groups: HashMap<(String, String), GroupOption> = groups
        .iter()
        .filter_map(|g| {
            let option: GroupOption = g.group_option.parse().ok()?;
            Some(((g.manufacturer.clone(), g.group_name.clone()), option))
        })
        .collect();

    products
        .iter()
        .map(|product| {
            let saved = committed.get(&product.id);
            let staged = drafts.get(&product.id);

            let saved_selling_price = saved.and_then(|s| s.selling_price);
            let saved_quantity = saved.and_then(|s| s.quantity);
            let draft_retail_price = staged.and_then(|d| d.retail_price);
            let draft_purchase_price = staged.and_then(|d| d.purchase_price);
            let draft_selling_price = staged.and_then(|d| d.selling_price);
            let draft_quantity = staged.and_then(|d| d.quantity);

            ComparisonRow {
                id: product.id,
                name: product.name.clone(),
                manufacturer: product.manufacturer.clone(),
                group_name: product.group_name.clone(),
                category,
                unit: product.unit.clone(),
                quantity_converter: product.quantity_converter,
                current_catalog_price: product.catalog_price,
                current_purchase_price: product.purchase_price,
                current_selling_price: product.selling_price,
                saved_retail_price: saved.and_then(|s| s.retail_price),
                saved_purchase_price: saved.and_then(|s| s.purchase_price),
                saved_selling_price,
                draft_retail_price,
                draft_purchase_price,
                draft_selling_price,
                new_retail_price: draft_retail_price.unwrap_or(product.catalog_price),
                new_purchase_price: draft_purchase_price.unwrap_or(product.purchase_price),
                new_selling_price: draft_selling_price.unwrap_or(product.selling_price),
                saved_quantity,
                draft_quantity,
                basic_discount: product.basic_discount,
                additional_discount: product.additional_discount,
                promotion_discount: product.promotion_discount,
                skonto_discount: product.skonto_discount,
                margin_percent: product.margin_percent,
                saved_margin_percent: saved.and_then(|s| s.margin_percent),
                saved_discount_percent: saved.and_then(|s| s.discount_percent),
                draft_margin_percent: staged.and_then(|d| d.margin_percent),
                draft_discount_percent: staged.and_then(|d| d.discount_percent),
                price_source: staged
                    .and_then(|d| d.price_source.clone())
                    .or_else(|| saved.and_then(|s| s.price_source.clone())),
                selected: staged
                    .and_then(|d| d.selected)
                    .or_else(|| saved.and_then(|s| s.selected)),
                group_option: effective_group_option(
                    product,
                    staged,
                    &bundle_drafts,
                    &committed_groups,
                ),
                price_changed: saved_selling_price
                    .is_some_and(|price| !money_eq(price, product.selling_price)),
                quantity_changed: quantity_changed(draft_quantity, saved_quantity),
            }
        })
        .collect()
}

/// Builds the comparison view of one category of a project. Read only.
///
/// # Errors
/// Returns `Error::ProjectNotFound` if the project does not exist.
pub async fn build_comparison(
    db: &DatabaseConnection,
    project_id: i64,
    category: Category,
) -> Result<ComparisonView> {
    let project = require_project(db, project_id).await?;
    let products = catalog::find_by_category(db, category).await?;
    let committed = find_for_project::<ProjectProduct, _>(db, project_id, Some(category)).await?;
    let drafts = draft::list_by(db, project_id, Some(category)).await?;
    let groups: Vec<project_product_group::Model> = project::list_project_groups(db, project_id)
        .await?
        .into_iter()
        .filter(|g| g.category == category.as_str())
        .collect();

    let defaults = project.defaults_for(category);
    let drafted = drafts
        .iter()
        .find(|d| d.category_margin.is_some() || d.category_discount.is_some());
    let (category_margin, category_discount) = drafted.map_or(
        (defaults.margin, defaults.discount),
        |d| (d.category_margin, d.category_discount),
    );

    let rows = assemble_rows(category, &products, committed, drafts, &groups);
    tracing::debug!(project_id, %category, rows = rows.len(), "Built comparison view");

    Ok(ComparisonView {
        category,
        rows,
        category_margin,
        category_discount,
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::core::bulk::BatchOptions;
    use crate::core::draft::{DraftFields, DraftItem, DraftUpsertRequest};
    use crate::core::project::MarginDiscount;
    use crate::errors::Error;
    use crate::test_utils::*;

    fn timestamp() -> chrono::NaiveDateTime {
        chrono::NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn catalog_row(id: i64, manufacturer: &str, group_name: &str, price: f64) -> product::Model {
        product::Model {
            id,
            name: format!("Product {id}"),
            category: "TILE".to_string(),
            manufacturer: manufacturer.to_string(),
            group_name: group_name.to_string(),
            mapper_key: None,
            unit: "pcs".to_string(),
            quantity_converter: 1.0,
            catalog_price: price,
            purchase_price: price,
            selling_price: price,
            basic_discount: 0.0,
            additional_discount: 0.0,
            promotion_discount: 0.0,
            skonto_discount: 0.0,
            discount_method: "CATALOG".to_string(),
            margin_percent: 0.0,
            group_option: "NONE".to_string(),
            created_at: timestamp(),
            updated_at: timestamp(),
        }
    }

    fn draft_row(id: i64, product_id: i64) -> draft_change::Model {
        draft_change::Model {
            id,
            project_id: 1,
            product_id,
            category: "TILE".to_string(),
            retail_price: None,
            purchase_price: None,
            selling_price: None,
            quantity: None,
            margin_percent: None,
            discount_percent: None,
            price_source: None,
            group_option: None,
            selected: None,
            group_manufacturer: None,
            group_name: None,
            category_margin: None,
            category_discount: None,
            updated_at: timestamp(),
        }
    }

    fn committed_row(id: i64, product_id: i64, selling_price: Option<f64>) -> project_product::Model {
        project_product::Model {
            id,
            project_id: 1,
            product_id,
            category: "TILE".to_string(),
            retail_price: None,
            purchase_price: None,
            selling_price,
            quantity: None,
            margin_percent: None,
            discount_percent: None,
            price_source: None,
            selected: None,
        }
    }

    fn group_row(manufacturer: &str, group_name: &str, option: &str) -> project_product_group::Model {
        project_product_group::Model {
            id: 1,
            project_id: 1,
            category: "TILE".to_string(),
            manufacturer: manufacturer.to_string(),
            group_name: group_name.to_string(),
            group_option: option.to_string(),
        }
    }

    #[test]
    fn test_draft_without_committed_row() {
        let products = vec![catalog_row(5, "Braas", "Roma", 40.0)];
        let mut draft = draft_row(1, 5);
        draft.selling_price = Some(50.0);
        draft.quantity = Some(3.0);

        let rows = assemble_rows(Category::Tile, &products, Vec::new(), vec![draft], &[]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].saved_selling_price, None);
        assert_eq!(rows[0].new_selling_price, 50.0);
        assert_eq!(rows[0].draft_quantity, Some(3.0));
        assert!(rows[0].quantity_changed);
        assert!(!rows[0].price_changed);
        assert_eq!(rows[0].new_retail_price, 40.0);
    }

    #[test]
    fn test_duplicate_drafts_newest_wins() {
        let products = vec![catalog_row(5, "Braas", "Roma", 40.0)];
        let mut older = draft_row(101, 5);
        older.selling_price = Some(41.0);
        let mut newer = draft_row(102, 5);
        newer.selling_price = Some(42.0);

        let rows = assemble_rows(Category::Tile, &products, Vec::new(), vec![newer, older], &[]);
        assert_eq!(rows[0].draft_selling_price, Some(42.0));
    }

    #[test]
    fn test_products_missing_from_catalog_are_excluded() {
        let products = vec![catalog_row(1, "Braas", "Roma", 10.0)];
        let committed = vec![committed_row(1, 1, Some(10.0)), committed_row(2, 999, Some(5.0))];
        let rows = assemble_rows(Category::Tile, &products, committed, vec![draft_row(3, 999)], &[]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, 1);
    }

    #[test]
    fn test_price_and_quantity_change_flags() {
        let products = vec![
            catalog_row(1, "Braas", "Roma", 10.0),
            catalog_row(2, "Braas", "Roma", 10.0),
        ];
        let mut same = committed_row(1, 1, Some(10.004));
        same.quantity = Some(4.0);
        let moved = committed_row(2, 2, Some(12.0));
        let mut draft = draft_row(3, 1);
        draft.quantity = Some(4.005);

        let rows = assemble_rows(Category::Tile, &products, vec![same, moved], vec![draft], &[]);
        assert!(!rows[0].price_changed);
        assert!(!rows[0].quantity_changed);
        assert!(rows[1].price_changed);
        assert!(!rows[1].quantity_changed);
    }

    #[test]
    fn test_empty_draft_counts_as_absent() {
        let products = vec![catalog_row(1, "Braas", "Roma", 10.0)];
        let rows = assemble_rows(
            Category::Tile,
            &products,
            Vec::new(),
            vec![draft_row(1, 1)],
            &[group_row("Braas", "Roma", "OPTIONAL")],
        );
        assert_eq!(rows[0].draft_selling_price, None);
        assert_eq!(rows[0].group_option, GroupOption::Optional);
    }

    #[test]
    fn test_group_option_priority() {
        let products = vec![
            catalog_row(1, "Braas", "Roma", 10.0),
            catalog_row(2, "Braas", "Roma", 10.0),
            catalog_row(3, "Braas", "Roma", 10.0),
            catalog_row(4, "Creaton", "Domino", 10.0),
            catalog_row(5, "Wienerberger", "Flat", 10.0),
        ];

        // Explicit NONE from a group-option-only draft beats everything
        let mut explicit_none = draft_row(1, 1);
        explicit_none.group_option = Some("NONE".to_string());
        // A NONE next to other values falls through to the bundle
        let mut value_with_none = draft_row(2, 2);
        value_with_none.group_option = Some("NONE".to_string());
        value_with_none.quantity = Some(1.0);
        let mut value_with_main = draft_row(3, 3);
        value_with_main.group_option = Some("MAIN".to_string());
        value_with_main.quantity = Some(1.0);
        let mut bundle = draft_row(4, draft::GROUP_SENTINEL_PRODUCT_ID);
        bundle.group_option = Some("OPTIONAL".to_string());
        bundle.group_manufacturer = Some("Braas".to_string());
        bundle.group_name = Some("Roma".to_string());

        let groups = vec![
            group_row("Braas", "Roma", "MAIN"),
            group_row("Creaton", "Domino", "MAIN"),
        ];
        let rows = assemble_rows(
            Category::Tile,
            &products,
            Vec::new(),
            vec![explicit_none, value_with_none, value_with_main, bundle],
            &groups,
        );

        assert_eq!(rows[0].group_option, GroupOption::None);
        assert_eq!(rows[1].group_option, GroupOption::Optional);
        assert_eq!(rows[2].group_option, GroupOption::Main);
        assert_eq!(rows[3].group_option, GroupOption::Main);
        assert_eq!(rows[4].group_option, GroupOption::None);
    }

    #[tokio::test]
    async fn test_build_comparison_from_store() -> Result<()> {
        let (db, project) = setup_with_project().await?;
        let tile = create_test_product(&db, "Roma red", Category::Tile, 20.0).await?;
        create_test_product(&db, "Gutter", Category::Gutter, 5.0).await?;
        insert_test_project_product(&db, project.id, tile.id, "TILE", Some(18.0)).await?;

        project::set_category_defaults(
            &db,
            project.id,
            Category::Tile,
            MarginDiscount {
                margin: Some(7.0),
                discount: None,
            },
        )
        .await?;
        let view = build_comparison(&db, project.id, Category::Tile).await?;
        assert_eq!(view.rows.len(), 1);
        assert_eq!(view.rows[0].saved_selling_price, Some(18.0));
        assert!(view.rows[0].price_changed);
        assert_eq!(view.category_margin, Some(7.0));

        let request = DraftUpsertRequest {
            category: "TILE".to_string(),
            category_margin: Some(12.0),
            category_discount: Some(3.0),
            items: vec![DraftItem {
                product_id: tile.id,
                fields: DraftFields {
                    quantity: Some(2.0),
                    ..Default::default()
                },
            }],
        };
        draft::bulk_upsert(&db, project.id, request, &BatchOptions::default()).await?;

        let view = build_comparison(&db, project.id, Category::Tile).await?;
        assert_eq!(view.category_margin, Some(12.0));
        assert_eq!(view.category_discount, Some(3.0));
        assert_eq!(view.rows[0].draft_quantity, Some(2.0));

        let result = build_comparison(&db, 404, Category::Tile).await;
        assert!(matches!(result, Err(Error::ProjectNotFound { id: 404 })));
        Ok(())
    }
}
