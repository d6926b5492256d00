//! Price ledger: the per-session record of captured prices and cart lines.
//!
//! A ledger walks one way through its states:
//!
//! ```text
//! Empty -> Populating -> CheckoutSnapshotTaken -> Reconciled | Mismatched
//! ```
//!
//! Unit prices are point-in-time reads: an entry keeps the quote captured
//! when the product was added, even if a later read records a new price.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::checkout::{CheckoutSummary, Reconciliation, DEFAULT_TOLERANCE};
use crate::types::{LedgerEntry, Money, PriceQuote, ProductName, ShopError, ShopResult};

/// Lifecycle of a session's ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerState {
    Empty,
    Populating,
    CheckoutSnapshotTaken,
    Reconciled,
    Mismatched,
}

impl LedgerState {
    pub fn is_terminal(self) -> bool {
        matches!(self, LedgerState::Reconciled | LedgerState::Mismatched)
    }
}

impl fmt::Display for LedgerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LedgerState::Empty => "empty",
            LedgerState::Populating => "populating",
            LedgerState::CheckoutSnapshotTaken => "at checkout",
            LedgerState::Reconciled => "reconciled",
            LedgerState::Mismatched => "mismatched",
        };
        f.write_str(label)
    }
}

/// Captured prices and cart lines of one shopping session.
#[derive(Debug, Clone)]
pub struct PriceLedger {
    tolerance: Money,
    prices: HashMap<ProductName, PriceQuote>,
    entries: Vec<LedgerEntry>,
    state: LedgerState,
    snapshot: Option<CheckoutSummary>,
}

impl Default for PriceLedger {
    fn default() -> Self {
        Self::new(DEFAULT_TOLERANCE)
    }
}

impl PriceLedger {
    pub fn new(tolerance: Money) -> Self {
        Self {
            tolerance,
            prices: HashMap::new(),
            entries: Vec::new(),
            state: LedgerState::Empty,
            snapshot: None,
        }
    }

    pub fn state(&self) -> LedgerState {
        self.state
    }

    pub fn tolerance(&self) -> Money {
        self.tolerance
    }

    /// Cart lines in the order products were first added.
    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn entry(&self, product: &ProductName) -> Option<&LedgerEntry> {
        self.entries.iter().find(|e| &e.product == product)
    }

    pub fn unit_price(&self, product: &ProductName) -> Option<&PriceQuote> {
        self.prices.get(product)
    }

    pub fn snapshot(&self) -> Option<&CheckoutSummary> {
        self.snapshot.as_ref()
    }

    /// Store or overwrite the captured unit price of a product. Returns the
    /// previous quote, if any.
    pub fn record_unit_price(&mut self, quote: PriceQuote) -> Option<PriceQuote> {
        tracing::debug!(product = %quote.product, amount = %quote.amount, "recorded unit price");
        self.prices.insert(quote.product.clone(), quote)
    }

    /// Unit price times quantity, in exact minor units.
    pub fn expected_line_total(&self, product: &ProductName, quantity: u32) -> ShopResult<Money> {
        let quote = self
            .prices
            .get(product)
            .ok_or_else(|| ShopError::UnknownProduct(product.clone()))?;
        quote
            .amount
            .checked_times(quantity)
            .ok_or_else(|| ShopError::InvalidQuantity {
                product: product.clone(),
                quantity: u64::from(quantity),
            })
    }

    /// Sum of all cart lines at their captured unit prices.
    pub fn expected_subtotal(&self) -> ShopResult<Money> {
        self.entries.iter().try_fold(Money::ZERO, |total, entry| {
            entry
                .line_total()
                .and_then(|line| total.checked_add(line))
                .ok_or_else(|| ShopError::InvalidQuantity {
                    product: entry.product.clone(),
                    quantity: u64::from(entry.quantity),
                })
        })
    }

    /// Put `quantity` units of a product in the cart. Adding a product that
    /// is already in the cart increases its quantity.
    pub fn add_product(&mut self, product: &ProductName, quantity: u32) -> ShopResult<&LedgerEntry> {
        self.ensure_cart_open("add a product")?;
        if quantity == 0 {
            return Err(ShopError::InvalidQuantity {
                product: product.clone(),
                quantity: 0,
            });
        }
        let unit_price = self
            .prices
            .get(product)
            .cloned()
            .ok_or_else(|| ShopError::UnknownProduct(product.clone()))?;

        let index = match self.entries.iter().position(|e| &e.product == product) {
            Some(index) => {
                let entry = &mut self.entries[index];
                entry.quantity = checked_quantity(product, u64::from(entry.quantity) + u64::from(quantity))?;
                index
            }
            None => {
                self.entries.push(LedgerEntry {
                    product: product.clone(),
                    unit_price,
                    quantity,
                });
                self.entries.len() - 1
            }
        };
        self.state = LedgerState::Populating;
        Ok(&self.entries[index])
    }

    pub fn increase(&mut self, product: &ProductName, by: u32) -> ShopResult<u32> {
        let current = self.quantity_of(product)?;
        let target = checked_quantity(product, u64::from(current) + u64::from(by))?;
        self.set_quantity(product, target)
    }

    /// Decrease a line; reaching zero removes it.
    pub fn decrease(&mut self, product: &ProductName, by: u32) -> ShopResult<u32> {
        let current = self.quantity_of(product)?;
        self.set_quantity(product, current.saturating_sub(by))
    }

    /// Set a line's quantity; zero removes it. Returns the new quantity.
    pub fn set_quantity(&mut self, product: &ProductName, quantity: u32) -> ShopResult<u32> {
        self.ensure_cart_open("change a quantity")?;
        let index = self.position(product)?;
        if quantity == 0 {
            self.entries.remove(index);
            tracing::debug!(%product, "removed from cart");
        } else {
            self.entries[index].quantity = quantity;
            tracing::debug!(%product, quantity, "quantity changed");
        }
        Ok(quantity)
    }

    pub fn remove_product(&mut self, product: &ProductName) -> ShopResult<LedgerEntry> {
        self.ensure_cart_open("remove a product")?;
        let index = self.position(product)?;
        tracing::debug!(%product, "removed from cart");
        Ok(self.entries.remove(index))
    }

    /// Freeze the checkout figures. Allowed once, from a populated cart.
    pub fn take_checkout_snapshot(&mut self, summary: CheckoutSummary) -> ShopResult<()> {
        if self.state != LedgerState::Populating {
            return Err(ShopError::InvalidState {
                state: self.state,
                operation: "take a checkout snapshot",
            });
        }
        self.snapshot = Some(summary);
        self.state = LedgerState::CheckoutSnapshotTaken;
        Ok(())
    }

    /// Reconcile the snapshot. Any failure leaves the ledger `Mismatched`.
    pub fn reconcile(&mut self) -> ShopResult<Reconciliation> {
        let summary = match (&self.snapshot, self.state) {
            (Some(summary), LedgerState::CheckoutSnapshotTaken) => summary,
            _ => {
                return Err(ShopError::InvalidState {
                    state: self.state,
                    operation: "reconcile",
                })
            }
        };
        let outcome = summary.reconcile(self.tolerance);
        self.state = if outcome.is_ok() {
            LedgerState::Reconciled
        } else {
            LedgerState::Mismatched
        };
        outcome
    }

    fn ensure_cart_open(&self, operation: &'static str) -> ShopResult<()> {
        match self.state {
            LedgerState::Empty | LedgerState::Populating => Ok(()),
            state => Err(ShopError::InvalidState { state, operation }),
        }
    }

    fn position(&self, product: &ProductName) -> ShopResult<usize> {
        self.entries
            .iter()
            .position(|e| &e.product == product)
            .ok_or_else(|| ShopError::UnknownProduct(product.clone()))
    }

    fn quantity_of(&self, product: &ProductName) -> ShopResult<u32> {
        self.entry(product)
            .map(|e| e.quantity)
            .ok_or_else(|| ShopError::UnknownProduct(product.clone()))
    }
}

fn checked_quantity(product: &ProductName, quantity: u64) -> ShopResult<u32> {
    u32::try_from(quantity).map_err(|_| ShopError::InvalidQuantity {
        product: product.clone(),
        quantity,
    })
}
