//! Catalog store - read access to the product catalog plus the typed bulk insert
//! used by the spreadsheet importer.
//!
//! Imported rows pass through [`derive_prices`] before they are stored, so the
//! derived prices on a product row always follow the authoritative one.

use crate::{
    core::{
        bulk::{BatchOptions, insert_chunked},
        pricing::{Discounts, PriceInputs, derive_prices, validate_amount, validate_margin},
    },
    entities::{Product, product},
    errors::{Error, Result},
    models::{Category, DiscountMethod, GroupOption},
};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use serde::Deserialize;
use std::collections::HashSet;

/// A catalog row as delivered by the importer, before price derivation
#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    /// Display name
    pub name: String,
    /// Category
    pub category: Category,
    /// Manufacturer
    pub manufacturer: String,
    /// Group within the manufacturer's range
    pub group_name: String,
    /// Form input driving the quantity
    #[serde(default)]
    pub mapper_key: Option<String>,
    /// Unit of sale
    pub unit: String,
    /// Factor from form input to quantity
    pub quantity_converter: f64,
    /// Catalog price (authoritative for `DiscountMethod::Catalog`)
    #[serde(default)]
    pub catalog_price: f64,
    /// Purchase price (authoritative for `DiscountMethod::Purchase`)
    #[serde(default)]
    pub purchase_price: f64,
    /// Stacked discounts
    #[serde(default)]
    pub discounts: DiscountsInput,
    /// Which price is authoritative
    #[serde(default)]
    pub discount_method: DiscountMethod,
    /// Margin percent
    #[serde(default)]
    pub margin_percent: f64,
    /// Default group option
    #[serde(default)]
    pub group_option: GroupOption,
}

/// Serde-facing mirror of [`Discounts`]
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct DiscountsInput {
    /// Basic discount
    pub basic: f64,
    /// Additional discount
    pub additional: f64,
    /// Promotional discount
    pub promotion: f64,
    /// Early-payment discount
    pub skonto: f64,
}

impl From<DiscountsInput> for Discounts {
    fn from(value: DiscountsInput) -> Self {
        Self {
            basic: value.basic,
            additional: value.additional,
            promotion: value.promotion,
            skonto: value.skonto,
        }
    }
}

impl product::Model {
    /// The four discount components of this row
    #[must_use]
    pub const fn discounts(&self) -> Discounts {
        Discounts {
            basic: self.basic_discount,
            additional: self.additional_discount,
            promotion: self.promotion_discount,
            skonto: self.skonto_discount,
        }
    }

    /// Parsed category
    ///
    /// # Errors
    /// Returns `Error::InvalidCategory` for rows written with an unknown category.
    pub fn parsed_category(&self) -> Result<Category> {
        self.category.parse()
    }
}

fn validate_new_product(new: &NewProduct) -> Result<()> {
    if new.name.trim().is_empty() {
        return Err(Error::validation("Product name cannot be empty"));
    }
    if new.manufacturer.trim().is_empty() || new.group_name.trim().is_empty() {
        return Err(Error::validation(format!(
            "Product '{}' needs a manufacturer and a group name",
            new.name.trim()
        )));
    }
    validate_amount(new.quantity_converter)?;
    validate_amount(new.catalog_price)?;
    validate_amount(new.purchase_price)?;
    validate_margin(new.margin_percent)?;
    Discounts::from(new.discounts).validate()
}

fn to_active_model(new: NewProduct, now: DateTime) -> product::ActiveModel {
    let discounts = Discounts::from(new.discounts);
    let prices = derive_prices(&PriceInputs {
        category: new.category,
        method: new.discount_method,
        catalog_price: new.catalog_price,
        purchase_price: new.purchase_price,
        discounts,
        margin_percent: new.margin_percent,
    });

    product::ActiveModel {
        name: Set(new.name.trim().to_string()),
        category: Set(new.category.as_str().to_string()),
        manufacturer: Set(new.manufacturer.trim().to_string()),
        group_name: Set(new.group_name.trim().to_string()),
        mapper_key: Set(new.mapper_key),
        unit: Set(new.unit),
        quantity_converter: Set(new.quantity_converter),
        catalog_price: Set(prices.catalog_price),
        purchase_price: Set(prices.purchase_price),
        selling_price: Set(prices.selling_price),
        basic_discount: Set(discounts.basic),
        additional_discount: Set(discounts.additional),
        promotion_discount: Set(discounts.promotion),
        skonto_discount: Set(discounts.skonto),
        discount_method: Set(new.discount_method.as_str().to_string()),
        margin_percent: Set(new.margin_percent),
        group_option: Set(new.group_option.as_str().to_string()),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
}

/// Inserts imported catalog rows with derived prices, in one transaction.
///
/// # Errors
/// Rejects the whole batch if any row fails validation; database errors roll
/// the batch back.
pub async fn insert_products(
    db: &DatabaseConnection,
    products: Vec<NewProduct>,
    options: &BatchOptions,
) -> Result<u64> {
    for new in &products {
        validate_new_product(new)?;
    }

    let now = chrono::Utc::now().naive_utc();
    let rows: Vec<product::ActiveModel> = products
        .into_iter()
        .map(|new| to_active_model(new, now))
        .collect();

    let txn = db.begin().await?;
    let inserted = insert_chunked(&txn, rows, None, options).await?;
    txn.commit().await?;

    tracing::info!(inserted, "Imported catalog products");
    Ok(inserted)
}

/// All products of a category, ordered by id.
pub async fn find_by_category<C>(db: &C, category: Category) -> Result<Vec<product::Model>>
where
    C: ConnectionTrait,
{
    Product::find()
        .filter(product::Column::Category.eq(category.as_str()))
        .order_by_asc(product::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// One product by id.
pub async fn find_by_id<C>(db: &C, product_id: i64) -> Result<Option<product::Model>>
where
    C: ConnectionTrait,
{
    Product::find_by_id(product_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Every product whose id is in `ids`; unknown ids are silently absent.
pub async fn find_all_by_id<C>(db: &C, ids: &[i64]) -> Result<Vec<product::Model>>
where
    C: ConnectionTrait,
{
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    Product::find()
        .filter(product::Column::Id.is_in(ids.iter().copied()))
        .order_by_asc(product::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Checks that every id names a catalog product of `category`.
///
/// # Errors
/// Returns `Error::ProductNotFound` with the smallest unknown id, or a
/// validation error for a product filed under another category.
pub async fn require_in_category<C>(db: &C, category: Category, ids: &[i64]) -> Result<()>
where
    C: ConnectionTrait,
{
    let ids: Vec<i64> = ids
        .iter()
        .copied()
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    let products = find_all_by_id(db, &ids).await?;

    let found: HashSet<i64> = products.iter().map(|product| product.id).collect();
    if let Some(missing) = ids.into_iter().filter(|id| !found.contains(id)).min() {
        return Err(Error::ProductNotFound { id: missing });
    }
    match products
        .iter()
        .find(|product| product.category != category.as_str())
    {
        Some(product) => Err(Error::validation(format!(
            "Product {} belongs to {}, not {}",
            product.id, product.category, category
        ))),
        None => Ok(()),
    }
}

/// Removes a product from the catalog. Committed project rows that refer to
/// it are kept; the comparison view no longer shows them.
///
/// # Errors
/// Returns `Error::ProductNotFound` if the product does not exist.
pub async fn delete_product(db: &DatabaseConnection, product_id: i64) -> Result<()> {
    let result = Product::delete_by_id(product_id).exec(db).await?;
    if result.rows_affected == 0 {
        return Err(Error::ProductNotFound { id: product_id });
    }
    tracing::info!(product_id, "Removed product from catalog");
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::test_utils::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn test_insert_products_validation() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();

        let mut bad = new_product("", Category::Tile, 10.0);
        let result = insert_products(&db, vec![bad.clone()], &BatchOptions::default()).await;
        assert!(matches!(result, Err(Error::Validation { message: _ })));

        bad.name = "Tile".to_string();
        bad.discounts.basic = 150.0;
        let result = insert_products(&db, vec![bad.clone()], &BatchOptions::default()).await;
        assert!(matches!(result, Err(Error::InvalidAmount { amount: _ })));

        bad.discounts.basic = 0.0;
        bad.catalog_price = f64::NAN;
        let result = insert_products(&db, vec![bad], &BatchOptions::default()).await;
        assert!(matches!(result, Err(Error::InvalidAmount { amount: _ })));
        Ok(())
    }

    #[tokio::test]
    async fn test_insert_products_rejects_oversized_amounts() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();

        let huge_price = new_product("Roma red", Category::Tile, 1e27);
        let result = insert_products(&db, vec![huge_price], &BatchOptions::default()).await;
        assert!(matches!(result, Err(Error::InvalidAmount { amount }) if amount == 1e27));

        let mut huge_converter = new_product("Roma red", Category::Tile, 10.0);
        huge_converter.quantity_converter = 1e15;
        let result = insert_products(&db, vec![huge_converter], &BatchOptions::default()).await;
        assert!(matches!(result, Err(Error::InvalidAmount { amount: _ })));

        let mut huge_margin = new_product("Gutter 125", Category::Gutter, 0.0);
        huge_margin.discount_method = DiscountMethod::Purchase;
        huge_margin.purchase_price = 90.0;
        huge_margin.margin_percent = 1e30;
        let result = insert_products(&db, vec![huge_margin], &BatchOptions::default()).await;
        assert!(matches!(result, Err(Error::InvalidAmount { amount: _ })));
        Ok(())
    }

    #[tokio::test]
    async fn test_require_in_category() -> Result<()> {
        let db = setup_test_db().await?;
        let tile = create_test_product(&db, "Roma red", Category::Tile, 10.0).await?;
        let gutter = create_test_product(&db, "Gutter 125", Category::Gutter, 20.0).await?;

        require_in_category(&db, Category::Tile, &[tile.id, tile.id]).await?;
        require_in_category(&db, Category::Tile, &[]).await?;

        let result = require_in_category(&db, Category::Tile, &[tile.id, 999_999]).await;
        assert!(matches!(result, Err(Error::ProductNotFound { id: 999_999 })));

        let result = require_in_category(&db, Category::Gutter, &[gutter.id, tile.id]).await;
        assert!(matches!(result, Err(Error::Validation { message: _ })));
        Ok(())
    }

    #[tokio::test]
    async fn test_insert_products_derives_prices() -> Result<()> {
        let db = setup_test_db().await?;

        let mut tile = new_product("Roma red", Category::Tile, 100.0);
        tile.discounts.basic = 10.0;
        let mut hook = new_product("Gutter hook", Category::Accessory, 100.0);
        hook.discounts.basic = 10.0;
        let mut gutter = new_product("Gutter 125", Category::Gutter, 0.0);
        gutter.discount_method = DiscountMethod::Purchase;
        gutter.purchase_price = 90.0;
        gutter.margin_percent = 20.0;

        let inserted =
            insert_products(&db, vec![tile, hook, gutter], &BatchOptions::default()).await?;
        assert_eq!(inserted, 3);

        let tiles = find_by_category(&db, Category::Tile).await?;
        assert_eq!(tiles.len(), 1);
        assert_eq!(tiles[0].purchase_price, 90.0);
        assert_eq!(tiles[0].selling_price, 100.0);
        assert_eq!(tiles[0].discounts().basic, 10.0);

        let accessories = find_by_category(&db, Category::Accessory).await?;
        assert_eq!(accessories[0].selling_price, 90.0);

        let gutters = find_by_category(&db, Category::Gutter).await?;
        assert_eq!(gutters[0].catalog_price, 108.0);
        assert_eq!(gutters[0].discount_method, "PURCHASE");
        Ok(())
    }

    #[tokio::test]
    async fn test_bulk_import_above_threshold() -> Result<()> {
        let db = setup_test_db().await?;
        let products: Vec<NewProduct> = (0..120)
            .map(|i| new_product(&format!("Tile {i}"), Category::Tile, 10.0))
            .collect();
        let options = BatchOptions {
            chunk_size: 50,
            threshold: 10,
        };

        let inserted = insert_products(&db, products, &options).await?;
        assert_eq!(inserted, 120);
        assert_eq!(find_by_category(&db, Category::Tile).await?.len(), 120);
        Ok(())
    }

    #[tokio::test]
    async fn test_find_by_id_and_all_by_id() -> Result<()> {
        let db = setup_test_db().await?;
        let a = create_test_product(&db, "A", Category::Tile, 10.0).await?;
        let b = create_test_product(&db, "B", Category::Gutter, 20.0).await?;

        assert_eq!(find_by_id(&db, a.id).await?.unwrap().name, "A");
        assert!(find_by_id(&db, 999).await?.is_none());

        let found = find_all_by_id(&db, &[b.id, a.id, 999]).await?;
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].id, a.id);
        assert!(find_all_by_id(&db, &[]).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_product() -> Result<()> {
        let db = setup_test_db().await?;
        let product = create_test_product(&db, "A", Category::Tile, 10.0).await?;

        delete_product(&db, product.id).await?;
        assert!(find_by_id(&db, product.id).await?.is_none());

        let result = delete_product(&db, product.id).await;
        assert!(matches!(result, Err(Error::ProductNotFound { id: _ })));
        Ok(())
    }

    #[test]
    fn test_new_product_deserializes_with_defaults() {
        let json = r#"{
            "name": "Roma red",
            "category": "TILE",
            "manufacturer": "Braas",
            "group_name": "Roma",
            "unit": "pcs",
            "quantity_converter": 10.5,
            "catalog_price": 2.45,
            "discounts": { "basic": 30 }
        }"#;
        let parsed: NewProduct = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.category, Category::Tile);
        assert_eq!(parsed.discounts.basic, 30.0);
        assert_eq!(parsed.discount_method, DiscountMethod::Catalog);
        assert_eq!(parsed.group_option, GroupOption::None);
    }
}
