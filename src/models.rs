//! Domain enums shared by the entities and the business logic.
//!
//! The database stores these as upper-case text (`"TILE"`, `"MAIN"`, ...) so
//! that rows written by older clients with unexpected values can still be
//! loaded and skipped individually instead of failing a whole query.

use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Product category of the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Category {
    /// Roof tiles
    Tile,
    /// Gutters and downpipes
    Gutter,
    /// Accessories (selling price defaults to purchase price)
    Accessory,
}

impl Category {
    /// All categories in display order
    pub const ALL: [Self; 3] = [Self::Tile, Self::Gutter, Self::Accessory];

    /// Text stored in the database
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tile => "TILE",
            Self::Gutter => "GUTTER",
            Self::Accessory => "ACCESSORY",
        }
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "TILE" => Ok(Self::Tile),
            "GUTTER" => Ok(Self::Gutter),
            "ACCESSORY" => Ok(Self::Accessory),
            _ => Err(Error::InvalidCategory {
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which variant of an offer a manufacturer/group bundle belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GroupOption {
    /// Primary variant presented to the customer
    Main,
    /// Alternative variant
    Optional,
    /// Not part of the offer
    #[default]
    None,
}

impl GroupOption {
    /// Text stored in the database
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Main => "MAIN",
            Self::Optional => "OPTIONAL",
            Self::None => "NONE",
        }
    }

    /// `true` for `MAIN` and `OPTIONAL`
    #[must_use]
    pub const fn is_set(self) -> bool {
        !matches!(self, Self::None)
    }
}

impl FromStr for GroupOption {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MAIN" => Ok(Self::Main),
            "OPTIONAL" => Ok(Self::Optional),
            "NONE" => Ok(Self::None),
            _ => Err(Error::InvalidEnumValue {
                kind: "group option",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for GroupOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a saved price differs from the catalog price
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PriceSource {
    /// Derived from a category-wide margin or discount
    Auto,
    /// Typed in by the salesperson
    Manual,
}

impl PriceSource {
    /// Text stored in the database
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "AUTO",
            Self::Manual => "MANUAL",
        }
    }
}

impl FromStr for PriceSource {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AUTO" => Ok(Self::Auto),
            "MANUAL" => Ok(Self::Manual),
            _ => Err(Error::InvalidEnumValue {
                kind: "price source",
                value: s.to_string(),
            }),
        }
    }
}

/// Which price of a catalog row is authoritative on import
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DiscountMethod {
    /// Catalog price is given, purchase price is derived through stacked discounts
    #[default]
    Catalog,
    /// Purchase price is given, catalog price is derived through the margin
    Purchase,
}

impl DiscountMethod {
    /// Text stored in the database
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Catalog => "CATALOG",
            Self::Purchase => "PURCHASE",
        }
    }
}

impl FromStr for DiscountMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CATALOG" => Ok(Self::Catalog),
            "PURCHASE" => Ok(Self::Purchase),
            _ => Err(Error::InvalidEnumValue {
                kind: "discount method",
                value: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_category_parse_is_case_insensitive() {
        assert_eq!("tile".parse::<Category>().unwrap(), Category::Tile);
        assert_eq!(" GUTTER ".parse::<Category>().unwrap(), Category::Gutter);
        assert!(matches!(
            "roof".parse::<Category>(),
            Err(Error::InvalidCategory { .. })
        ));
    }

    #[test]
    fn test_group_option_round_trips_through_text() {
        for option in [GroupOption::Main, GroupOption::Optional, GroupOption::None] {
            assert_eq!(option.as_str().parse::<GroupOption>().unwrap(), option);
        }
        assert!(!GroupOption::None.is_set());
        assert!(GroupOption::Main.is_set());
    }

    #[test]
    fn test_serde_uses_upper_case() {
        let json = serde_json::to_string(&Category::Accessory).unwrap();
        assert_eq!(json, "\"ACCESSORY\"");
        let parsed: PriceSource = serde_json::from_str("\"MANUAL\"").unwrap();
        assert_eq!(parsed, PriceSource::Manual);
    }
}
