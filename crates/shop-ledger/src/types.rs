//! Core data types for captured prices, cart entries and errors.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Sub};

use serde::{Deserialize, Serialize};

use crate::ledger::LedgerState;

/// Display name of a catalog item. Join key between locator and ledger.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductName(String);

impl ProductName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProductName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProductName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for ProductName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl AsRef<str> for ProductName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// An amount of money as an integer count of minor units (cents).
///
/// Displays with two decimals and no currency symbol, e.g. `12.50`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_minor(minor_units: i64) -> Self {
        Self(minor_units)
    }

    pub const fn minor(self) -> i64 {
        self.0
    }

    /// Unit price times a cart quantity. `None` on overflow.
    pub fn checked_times(self, quantity: u32) -> Option<Money> {
        self.0.checked_mul(i64::from(quantity)).map(Money)
    }

    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    pub fn abs(self) -> Money {
        Money(self.0.abs())
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, Add::add)
    }
}

/// Which locator tier produced a quote. Diagnostic only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteSource {
    /// Price found inside the product's own item container.
    Container,
    /// Page-wide price scan joined back to the product by container text.
    BroadSearch,
    /// Currency text among the descendants of the title's block.
    Sibling,
    /// Currency text around the title's block (parent and siblings).
    LastResort,
}

impl fmt::Display for QuoteSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            QuoteSource::Container => "container",
            QuoteSource::BroadSearch => "broad search",
            QuoteSource::Sibling => "sibling",
            QuoteSource::LastResort => "last resort",
        };
        f.write_str(label)
    }
}

/// A point-in-time read of a product's price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub product: ProductName,
    pub amount: Money,
    pub source: QuoteSource,
}

/// A product in the cart with the unit price captured when it was added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub product: ProductName,
    pub unit_price: PriceQuote,
    pub quantity: u32,
}

impl LedgerEntry {
    pub fn line_total(&self) -> Option<Money> {
        self.unit_price.amount.checked_times(self.quantity)
    }
}

/// Errors that can occur while locating, parsing or reconciling prices.
#[derive(thiserror::Error, Debug)]
pub enum ShopError {
    #[error("Price element not found for product \"{0}\"")]
    PriceNotFound(ProductName),

    #[error("Unable to parse price \"{0}\"")]
    PriceParse(String),

    #[error(
        "Total mismatch: calculated {calculated} but page shows {displayed} (difference {difference})"
    )]
    ReconciliationMismatch {
        calculated: Money,
        displayed: Money,
        difference: Money,
    },

    #[error("Shipping price cannot be {0}")]
    InvalidShipping(Money),

    #[error("No price recorded for product \"{0}\"")]
    UnknownProduct(ProductName),

    #[error("Invalid quantity {quantity} for product \"{product}\"")]
    InvalidQuantity { product: ProductName, quantity: u64 },

    #[error("Discount percentage must be within 0..=100, got {0}")]
    InvalidDiscount(u32),

    #[error("Cannot {operation} while ledger is {state}")]
    InvalidState {
        state: LedgerState,
        operation: &'static str,
    },

    #[error("Profile error: {0}")]
    Profile(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience result type.
pub type ShopResult<T> = Result<T, ShopError>;
