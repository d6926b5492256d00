//! Shop Ledger: price discovery and checkout reconciliation for storefront checks.

pub mod checkout;
pub mod ledger;
pub mod locator;
pub mod money;
pub mod page;
pub mod profile;
pub mod types;

pub use checkout::{reconcile_total, reconcile_total_within, CheckoutSummary, Reconciliation, DEFAULT_TOLERANCE};
pub use ledger::{LedgerState, PriceLedger};
pub use locator::PriceLocator;
pub use money::{parse_price_text, DEFAULT_CURRENCY_SYMBOL};
pub use page::{read_amount, HtmlPage, PageHandle};
pub use profile::SiteProfile;
pub use types::*;
