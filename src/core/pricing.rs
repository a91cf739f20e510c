//! Price calculator - pure derivation of purchase, retail and selling prices.
//!
//! All arithmetic happens on `Decimal`; `f64` is only the storage format. Every
//! derived monetary value is rounded to 2 places with round-half-up
//! (`MidpointAwayFromZero`, prices are never negative). Totals downstream are
//! summed from these already rounded line values, so the rounding must be
//! reproducible exactly.
//!
//! Functions take and return plain values. A catalog row is never mutated to
//! compute a derived price; callers get a fresh [`DerivedPrices`] instead.

use crate::{
    errors::{Error, Result},
    models::{Category, DiscountMethod},
};
use rust_decimal::{
    Decimal, RoundingStrategy,
    prelude::{FromPrimitive, ToPrimitive},
};

const DECIMAL_PLACES: u32 = 2;

/// Upper bound for prices, quantities and converters accepted at the boundary.
/// Products of two bounded values stay far inside the `Decimal` range.
pub const MAX_AMOUNT: f64 = 1_000_000_000.0;

/// Upper bound for a margin in percent
pub const MAX_MARGIN_PERCENT: f64 = 10_000.0;

/// The four stacked discount components of a catalog row, in percent.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Discounts {
    /// Basic discount
    pub basic: f64,
    /// Additional discount
    pub additional: f64,
    /// Promotional discount
    pub promotion: f64,
    /// Early-payment discount
    pub skonto: f64,
}

impl Discounts {
    /// Discounts in the order they are applied
    #[must_use]
    pub const fn in_order(&self) -> [f64; 4] {
        [self.basic, self.additional, self.promotion, self.skonto]
    }

    /// Checks every component lies in `[0, 100]`.
    pub fn validate(&self) -> Result<()> {
        for value in self.in_order() {
            validate_percent(value)?;
        }
        Ok(())
    }
}

/// Everything needed to derive the stored prices of a catalog row
#[derive(Debug, Clone, Copy)]
pub struct PriceInputs {
    /// Product category, decides the default selling price
    pub category: Category,
    /// Which of the two prices below is authoritative
    pub method: DiscountMethod,
    /// Catalog price (authoritative for `DiscountMethod::Catalog`)
    pub catalog_price: f64,
    /// Purchase price (authoritative for `DiscountMethod::Purchase`)
    pub purchase_price: f64,
    /// Stacked discounts
    pub discounts: Discounts,
    /// Margin percent
    pub margin_percent: f64,
}

/// Result of [`derive_prices`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivedPrices {
    /// Catalog (retail) price
    pub catalog_price: f64,
    /// Purchase price
    pub purchase_price: f64,
    /// Default selling price
    pub selling_price: f64,
}

/// Converts to `Decimal` for calculation. Non-finite input counts as zero and
/// is logged; boundaries validate with [`validate_amount`] first.
///
/// Goes through the shortest round-trip text of the float, so `2.345` becomes
/// exactly `2.345` and not the nearest binary fraction below it.
fn to_decimal(value: f64) -> Decimal {
    if !value.is_finite() {
        tracing::error!(value = ?value, "Non-finite f64 in price calculation, using zero");
        return Decimal::ZERO;
    }
    value
        .to_string()
        .parse::<Decimal>()
        .ok()
        .or_else(|| Decimal::from_f64(value))
        .unwrap_or_else(|| {
            tracing::error!(value = ?value, "f64 out of decimal range, using zero");
            Decimal::ZERO
        })
}

/// `value × (100 ± percent) / 100` without panicking. Overflow is only
/// reachable with unvalidated input; it is logged and yields zero.
fn apply_percent(value: Decimal, factor_percent: Decimal) -> Decimal {
    value
        .checked_mul(factor_percent)
        .and_then(|v| v.checked_div(Decimal::ONE_HUNDRED))
        .unwrap_or_else(|| {
            tracing::error!(%value, %factor_percent, "Price calculation overflowed, using zero");
            Decimal::ZERO
        })
}

fn round_dec(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

/// Converts back to `f64` rounded to 2 places
fn to_money(value: Decimal) -> f64 {
    round_dec(value).to_f64().unwrap_or_default()
}

/// Rounds to 2 decimal places, half up: `round2(2.345) == 2.35`.
#[must_use]
pub fn round2(value: f64) -> f64 {
    to_money(to_decimal(value))
}

/// `catalog × Π(1 − dᵢ/100)` over basic, additional, promotional and skonto
/// discounts, each applied to the already discounted price.
#[must_use]
pub fn purchase_price(catalog_price: f64, discounts: &Discounts) -> f64 {
    let catalog = to_decimal(catalog_price);
    if catalog.is_zero() {
        return 0.0;
    }
    let discounted = discounts
        .in_order()
        .into_iter()
        .fold(catalog, |price, discount| {
            apply_percent(price, Decimal::ONE_HUNDRED - to_decimal(discount))
        });
    to_money(discounted)
}

/// `purchase × (100 + margin) / 100`, zero for a zero purchase price.
#[must_use]
pub fn retail_price(purchase_price: f64, margin_percent: f64) -> f64 {
    let purchase = to_decimal(purchase_price);
    if purchase.is_zero() {
        return 0.0;
    }
    to_money(apply_percent(
        purchase,
        Decimal::ONE_HUNDRED + to_decimal(margin_percent),
    ))
}

/// Selling price recomputed from a margin on top of the purchase price.
#[must_use]
pub fn selling_price_with_margin(purchase_price: f64, margin_percent: f64) -> f64 {
    retail_price(purchase_price, margin_percent)
}

/// `catalog × (100 − discount) / 100`
#[must_use]
pub fn selling_price_with_discount(catalog_price: f64, discount_percent: f64) -> f64 {
    to_money(apply_percent(
        to_decimal(catalog_price),
        Decimal::ONE_HUNDRED - to_decimal(discount_percent),
    ))
}

/// Product quantity for a form input. Not a monetary value, so not rounded.
#[must_use]
pub fn quantity(input_quantity: f64, converter: f64) -> f64 {
    to_decimal(input_quantity)
        .checked_mul(to_decimal(converter))
        .and_then(|q| q.to_f64())
        .unwrap_or_else(|| {
            tracing::error!(input_quantity, converter, "Quantity overflowed, using zero");
            0.0
        })
}

/// Accessories sell at purchase price, tiles and gutters at catalog price.
#[must_use]
pub const fn default_selling_price(
    category: Category,
    catalog_price: f64,
    purchase_price: f64,
) -> f64 {
    match category {
        Category::Accessory => purchase_price,
        Category::Tile | Category::Gutter => catalog_price,
    }
}

/// Runs the full cascade for one catalog row.
#[must_use]
pub fn derive_prices(inputs: &PriceInputs) -> DerivedPrices {
    let (catalog_price, purchase) = match inputs.method {
        DiscountMethod::Catalog => (
            round2(inputs.catalog_price),
            purchase_price(inputs.catalog_price, &inputs.discounts),
        ),
        DiscountMethod::Purchase => {
            let purchase = round2(inputs.purchase_price);
            (retail_price(purchase, inputs.margin_percent), purchase)
        }
    };
    DerivedPrices {
        catalog_price,
        purchase_price: purchase,
        selling_price: default_selling_price(inputs.category, catalog_price, purchase),
    }
}

/// Two prices are equal when they differ by less than one cent.
#[must_use]
pub fn money_eq(a: f64, b: f64) -> bool {
    (to_decimal(a) - to_decimal(b)).abs() < Decimal::new(1, 2)
}

/// Accepts finite values in `[0, 100]`.
pub fn validate_percent(value: f64) -> Result<f64> {
    if value.is_finite() && (0.0..=100.0).contains(&value) {
        Ok(value)
    } else {
        Err(Error::InvalidAmount { amount: value })
    }
}

/// Accepts finite margins above -100 % and up to [`MAX_MARGIN_PERCENT`].
pub fn validate_margin(value: f64) -> Result<f64> {
    if value.is_finite() && value > -100.0 && value <= MAX_MARGIN_PERCENT {
        Ok(value)
    } else {
        Err(Error::InvalidAmount { amount: value })
    }
}

/// Accepts finite amounts in `[0, MAX_AMOUNT]`.
pub fn validate_amount(value: f64) -> Result<f64> {
    if value.is_finite() && (0.0..=MAX_AMOUNT).contains(&value) {
        Ok(value)
    } else {
        Err(Error::InvalidAmount { amount: value })
    }
}
