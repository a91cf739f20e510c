//! Reconciliation engine - turns the staged drafts of a project into its
//! committed products and groups.
//!
//! A commit runs as one transaction:
//! 1. validate the request, store the category-wide defaults on the project;
//! 2. load every draft of the project;
//! 3. without drafts, clear the committed products and stop;
//! 4. otherwise replace the committed products with one row per draft, fields
//!    copied verbatim (nulls included);
//! 5. derive one group row per (manufacturer, group name, category) from the
//!    drafts that carry a group option;
//! 6. delete the consumed drafts;
//! 7. merge request overrides for keys no draft covered;
//! 8. replace the committed groups with the derived ones plus request groups
//!    not already derived.
//!
//! A draft with malformed enum text is skipped with a warning and left in
//! place; every other failure rolls the whole commit back.

use crate::{
    core::{
        bulk::{BatchOptions, delete_for_project, insert_chunked, keep_newest},
        catalog,
        draft::{self, GROUP_SENTINEL_PRODUCT_ID},
        pricing::{validate_amount, validate_margin, validate_percent},
        project::{CategoryDefaults, require_project, set_all_category_defaults},
    },
    entities::{
        DraftChange, ProjectProduct, ProjectProductGroup, draft_change, product, project_product,
        project_product_group,
    },
    errors::{Error, Result},
    models::{Category, GroupOption, PriceSource},
};
use sea_orm::{Set, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// A committed value sent with the commit request, outside the draft flow
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductOverride {
    /// Catalog product id
    pub product_id: i64,
    /// Category text
    pub category: String,
    /// Catalog/retail price
    pub retail_price: Option<f64>,
    /// Purchase price
    pub purchase_price: Option<f64>,
    /// Selling price
    pub selling_price: Option<f64>,
    /// Quantity
    pub quantity: Option<f64>,
    /// Margin percent
    pub margin_percent: Option<f64>,
    /// Discount percent
    pub discount_percent: Option<f64>,
    /// Price source
    pub price_source: Option<PriceSource>,
    /// Accessory toggle
    pub selected: Option<bool>,
}

/// A group choice sent with the commit request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupOverride {
    /// Category text
    pub category: String,
    /// Manufacturer of the bundle
    pub manufacturer: String,
    /// Group name of the bundle
    pub group_name: String,
    /// Group option text
    pub group_option: String,
}

/// Body of a commit
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CommitRequest {
    /// Category-wide margins/discounts to store on the project
    pub defaults: CategoryDefaults,
    /// Product overrides, merged where no draft exists
    pub products: Vec<ProductOverride>,
    /// Group overrides, merged where no draft derived a group
    pub groups: Vec<GroupOverride>,
}

/// What a commit did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitSummary {
    /// Drafts turned into committed rows and deleted
    pub drafts_consumed: usize,
    /// Drafts skipped because of malformed values
    pub drafts_skipped: usize,
    /// Committed product rows removed before writing
    pub products_cleared: u64,
    /// Committed product rows written from drafts
    pub products_written: u64,
    /// Committed product rows written from request overrides
    pub overrides_merged: u64,
    /// Committed group rows written
    pub groups_written: u64,
}

type GroupKey = (String, String, Category);

struct ValidDraft {
    draft: draft_change::Model,
    category: Category,
    group_option: Option<GroupOption>,
}

struct ValidatedRequest {
    defaults: CategoryDefaults,
    products: Vec<(Category, ProductOverride)>,
    groups: Vec<(GroupKey, GroupOption)>,
}

fn validate_override(item: &ProductOverride) -> Result<Category> {
    let category = item.category.parse()?;
    if item.product_id <= GROUP_SENTINEL_PRODUCT_ID {
        return Err(Error::validation(format!(
            "Invalid product id {} in override",
            item.product_id
        )));
    }
    for amount in [
        item.retail_price,
        item.purchase_price,
        item.selling_price,
        item.quantity,
    ]
    .into_iter()
    .flatten()
    {
        validate_amount(amount)?;
    }
    if let Some(margin) = item.margin_percent {
        validate_margin(margin)?;
    }
    if let Some(discount) = item.discount_percent {
        validate_percent(discount)?;
    }
    Ok(category)
}

/// Every override must name a catalog product of its own category.
async fn require_override_products<C>(
    db: &C,
    products: &[(Category, ProductOverride)],
) -> Result<()>
where
    C: ConnectionTrait,
{
    let mut by_category: BTreeMap<Category, Vec<i64>> = BTreeMap::new();
    for (category, item) in products {
        by_category.entry(*category).or_default().push(item.product_id);
    }
    for (category, ids) in by_category {
        catalog::require_in_category(db, category, &ids).await?;
    }
    Ok(())
}

fn validate_request(request: CommitRequest) -> Result<ValidatedRequest> {
    request.defaults.validate()?;
    let products = request
        .products
        .into_iter()
        .map(|item| Ok((validate_override(&item)?, item)))
        .collect::<Result<Vec<_>>>()?;
    let groups = request
        .groups
        .into_iter()
        .map(|group| {
            let category: Category = group.category.parse()?;
            let option: GroupOption = group.group_option.parse()?;
            Ok((
                (
                    group.manufacturer.trim().to_string(),
                    group.group_name.trim().to_string(),
                    category,
                ),
                option,
            ))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(ValidatedRequest {
        defaults: request.defaults,
        products,
        groups,
    })
}

fn parse_draft_enums(draft: &draft_change::Model) -> Result<(Category, Option<GroupOption>)> {
    let category: Category = draft.category.parse()?;
    let group_option = draft
        .group_option
        .as_deref()
        .map(str::parse::<GroupOption>)
        .transpose()?;
    if let Some(source) = draft.price_source.as_deref() {
        source.parse::<PriceSource>()?;
    }
    Ok((category, group_option))
}

/// Parses the enum text of a draft; `None` means the draft is skipped.
fn parse_draft(draft: draft_change::Model) -> Option<ValidDraft> {
    let parsed = parse_draft_enums(&draft);
    match parsed {
        Ok((category, group_option)) => Some(ValidDraft {
            draft,
            category,
            group_option,
        }),
        Err(e) => {
            tracing::warn!(
                draft_id = draft.id,
                product_id = draft.product_id,
                error = %e,
                "Skipping malformed draft"
            );
            None
        }
    }
}

fn committed_from_draft(project_id: i64, valid: &ValidDraft) -> project_product::ActiveModel {
    let draft = &valid.draft;
    project_product::ActiveModel {
        project_id: Set(project_id),
        product_id: Set(draft.product_id),
        category: Set(valid.category.as_str().to_string()),
        retail_price: Set(draft.retail_price),
        purchase_price: Set(draft.purchase_price),
        selling_price: Set(draft.selling_price),
        quantity: Set(draft.quantity),
        margin_percent: Set(draft.margin_percent),
        discount_percent: Set(draft.discount_percent),
        price_source: Set(draft.price_source.clone()),
        selected: Set(draft.selected),
        ..Default::default()
    }
}

fn committed_from_override(
    project_id: i64,
    category: Category,
    item: ProductOverride,
) -> project_product::ActiveModel {
    project_product::ActiveModel {
        project_id: Set(project_id),
        product_id: Set(item.product_id),
        category: Set(category.as_str().to_string()),
        retail_price: Set(item.retail_price),
        purchase_price: Set(item.purchase_price),
        selling_price: Set(item.selling_price),
        quantity: Set(item.quantity),
        margin_percent: Set(item.margin_percent),
        discount_percent: Set(item.discount_percent),
        price_source: Set(item.price_source.map(|s| s.as_str().to_string())),
        selected: Set(item.selected),
        ..Default::default()
    }
}

/// Resolves the bundle a group-carrying draft belongs to.
fn resolve_group(
    valid: &ValidDraft,
    products_by_id: &HashMap<i64, product::Model>,
    catalog_by_category: &HashMap<Category, Vec<product::Model>>,
) -> Option<(String, String)> {
    let draft = &valid.draft;
    if draft.product_id == GROUP_SENTINEL_PRODUCT_ID {
        let manufacturer = draft.group_manufacturer.as_deref()?;
        let group_name = draft.group_name.as_deref()?;
        return catalog_by_category
            .get(&valid.category)?
            .iter()
            .find(|p| p.manufacturer == manufacturer && p.group_name == group_name)
            .map(|p| (p.manufacturer.clone(), p.group_name.clone()));
    }
    products_by_id
        .get(&draft.product_id)
        .map(|p| (p.manufacturer.clone(), p.group_name.clone()))
}

async fn derive_groups<C>(db: &C, drafts: &[ValidDraft]) -> Result<Vec<(GroupKey, GroupOption)>>
where
    C: ConnectionTrait,
{
    let carrying: Vec<(&ValidDraft, GroupOption)> = drafts
        .iter()
        .filter_map(|valid| {
            valid
                .group_option
                .filter(|option| option.is_set())
                .map(|option| (valid, option))
        })
        .collect();
    if carrying.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<i64> = carrying
        .iter()
        .map(|(valid, _)| valid.draft.product_id)
        .filter(|id| *id != GROUP_SENTINEL_PRODUCT_ID)
        .collect();
    let products_by_id: HashMap<i64, product::Model> = catalog::find_all_by_id(db, &ids)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    let mut catalog_by_category: HashMap<Category, Vec<product::Model>> = HashMap::new();
    for (valid, _) in &carrying {
        if valid.draft.product_id == GROUP_SENTINEL_PRODUCT_ID
            && !catalog_by_category.contains_key(&valid.category)
        {
            let products = catalog::find_by_category(db, valid.category).await?;
            catalog_by_category.insert(valid.category, products);
        }
    }

    let mut seen: HashSet<GroupKey> = HashSet::new();
    let mut groups = Vec::new();
    for (valid, option) in carrying {
        let Some((manufacturer, group_name)) =
            resolve_group(valid, &products_by_id, &catalog_by_category)
        else {
            tracing::warn!(
                draft_id = valid.draft.id,
                product_id = valid.draft.product_id,
                "No catalog product for group option, skipping"
            );
            continue;
        };
        let key = (manufacturer, group_name, valid.category);
        if seen.insert(key.clone()) {
            groups.push((key, option));
        }
    }
    Ok(groups)
}

/// Request overrides for keys no draft covered; the last one per key wins.
fn override_rows(
    project_id: i64,
    products: Vec<(Category, ProductOverride)>,
    draft_keys: &HashSet<(i64, Category)>,
) -> Vec<project_product::ActiveModel> {
    let mut overrides: Vec<(Category, ProductOverride)> = Vec::new();
    let mut positions: HashMap<(i64, Category), usize> = HashMap::new();
    for (category, item) in products {
        let key = (item.product_id, category);
        if draft_keys.contains(&key) {
            continue;
        }
        if let Some(index) = positions.get(&key) {
            overrides[*index] = (category, item);
        } else {
            positions.insert(key, overrides.len());
            overrides.push((category, item));
        }
    }
    overrides
        .into_iter()
        .map(|(category, item)| committed_from_override(project_id, category, item))
        .collect()
}

/// Derived groups first, then request groups for bundles not derived.
fn group_rows(
    project_id: i64,
    derived: Vec<(GroupKey, GroupOption)>,
    requested: Vec<(GroupKey, GroupOption)>,
) -> Vec<project_product_group::ActiveModel> {
    let mut seen: HashSet<GroupKey> = derived.iter().map(|(key, _)| key.clone()).collect();
    let mut groups = derived;
    for (key, option) in requested {
        if seen.insert(key.clone()) {
            groups.push((key, option));
        }
    }
    groups
        .into_iter()
        .map(
            |((manufacturer, group_name, category), option)| project_product_group::ActiveModel {
                project_id: Set(project_id),
                category: Set(category.as_str().to_string()),
                manufacturer: Set(manufacturer),
                group_name: Set(group_name),
                group_option: Set(option.as_str().to_string()),
                ..Default::default()
            },
        )
        .collect()
}

/// Commits the staged drafts of a project.
///
/// # Errors
/// Rejects malformed request values, unknown projects and overrides naming an
/// unknown product (or one of another category) before anything is written.
/// Database errors roll the commit back.
#[tracing::instrument(skip(db, request, options))]
pub async fn commit_project(
    db: &DatabaseConnection,
    project_id: i64,
    request: CommitRequest,
    options: &BatchOptions,
) -> Result<CommitSummary> {
    let request = validate_request(request)?;

    let txn = db.begin().await?;
    require_project(&txn, project_id).await?;
    require_override_products(&txn, &request.products).await?;
    set_all_category_defaults(&txn, project_id, request.defaults).await?;

    let drafts = draft::list_by(&txn, project_id, None).await?;
    let mut summary = CommitSummary {
        products_cleared: delete_for_project::<ProjectProduct, _>(&txn, project_id, None).await?,
        ..Default::default()
    };

    if drafts.is_empty() {
        txn.commit().await?;
        tracing::info!(
            cleared = summary.products_cleared,
            "No drafts to commit, cleared committed products"
        );
        return Ok(summary);
    }

    let total = drafts.len();
    let parsed: Vec<ValidDraft> = drafts.into_iter().filter_map(parse_draft).collect();
    // Superseded duplicates are consumed too
    let consumed: Vec<i64> = parsed.iter().map(|v| v.draft.id).collect();
    let mut valid: Vec<ValidDraft> = keep_newest(
        parsed,
        |v| {
            (
                v.draft.product_id,
                v.category,
                v.draft.group_manufacturer.clone(),
                v.draft.group_name.clone(),
            )
        },
        |v| v.draft.id,
    )
    .into_values()
    .collect();
    valid.sort_by_key(|v| v.draft.id);

    let draft_keys: HashSet<(i64, Category)> = valid
        .iter()
        .map(|v| (v.draft.product_id, v.category))
        .collect();

    let rows: Vec<project_product::ActiveModel> = valid
        .iter()
        .filter(|v| v.draft.product_id != GROUP_SENTINEL_PRODUCT_ID)
        .map(|v| committed_from_draft(project_id, v))
        .collect();
    summary.products_written = insert_chunked(&txn, rows, None, options).await?;

    let derived = derive_groups(&txn, &valid).await?;

    summary.drafts_consumed = consumed.len();
    summary.drafts_skipped = total - consumed.len();
    DraftChange::delete_many()
        .filter(draft_change::Column::Id.is_in(consumed))
        .exec(&txn)
        .await?;

    let rows = override_rows(project_id, request.products, &draft_keys);
    summary.overrides_merged = insert_chunked(&txn, rows, None, options).await?;

    delete_for_project::<ProjectProductGroup, _>(&txn, project_id, None).await?;
    let rows = group_rows(project_id, derived, request.groups);
    summary.groups_written = insert_chunked(&txn, rows, None, options).await?;

    txn.commit().await?;
    tracing::info!(
        consumed = summary.drafts_consumed,
        skipped = summary.drafts_skipped,
        written = summary.products_written,
        overrides = summary.overrides_merged,
        groups = summary.groups_written,
        "Committed project drafts"
    );
    Ok(summary)
}
