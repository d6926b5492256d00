//! Site profile: selectors, copy and test data for one storefront.
//!
//! The muffin shop profile is embedded at compile time from
//! `profiles/muffin_shop.json`, so the default run needs no file I/O. Other
//! storefronts (or a redesigned muffin shop) are described by a JSON file of
//! the same shape.

use std::path::Path;
use std::time::Duration;

use scraper::Selector;
use serde::{Deserialize, Serialize};

use crate::ledger::PriceLedger;
use crate::locator::PriceLocator;
use crate::types::{Money, ProductName, ShopError, ShopResult};

/// Raw JSON of the built-in muffin shop profile.
const MUFFIN_SHOP_JSON: &str = include_str!("../profiles/muffin_shop.json");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteProfile {
    pub name: String,
    pub base_url: String,
    pub currency_symbol: String,
    pub tolerance_minor_units: i64,
    pub locator: LocatorProfile,
    pub selectors: Selectors,
    pub journey: JourneyPlan,
    pub test_data: TestData,
    pub messages: Messages,
    pub timeouts: Timeouts,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocatorProfile {
    pub container_selectors: Vec<String>,
    pub price_selectors: Vec<String>,
    pub block_selector: String,
}

/// CSS selectors the browser driver acts on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Selectors {
    pub nav_shop_link: String,
    pub product_title: String,
    pub product_qty_toggle: String,
    pub product_qty_input: String,
    pub add_to_bag_button: String,
    pub cart_close_button: String,
    pub cart_open_button: String,
    pub cart_content: String,
    pub cart_qty_input: String,
    pub cart_decrease_button: String,
    pub cart_delete_button: String,
    pub cart_checkout_button: String,
    pub checkout_subtotal: String,
    pub checkout_shipping: String,
    pub checkout_total: String,
    pub discount_code_input: String,
    pub discount_apply_button: String,
    pub discount_pill: String,
    pub shipping_option: String,
    pub shipping_dropdown_input: String,
    pub shipping_continue_button: String,
    pub continue_buttons: Vec<String>,
    pub dropdown_options: Vec<String>,
    pub dropdown_fallback: String,
    pub email_input: String,
    pub name_input: String,
    pub phone_input: String,
    pub special_requests_input: String,
}

/// What the shopping journey puts in and takes out of the cart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JourneyPlan {
    pub add_to_cart: Vec<CartLine>,
    #[serde(default)]
    pub decrease_in_cart: Vec<ProductName>,
    #[serde(default)]
    pub delete_from_cart: Vec<ProductName>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartLine {
    pub product: ProductName,
    pub quantity: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestData {
    pub contact: ContactInfo,
    pub discount: Discount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactInfo {
    pub email: String,
    pub full_name: String,
    pub phone: String,
    pub special_requests: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Discount {
    pub code: String,
    pub percentage: u32,
    pub expected_text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Messages {
    pub page_title: String,
    pub validation_errors: Vec<String>,
    pub order_success: Vec<String>,
    pub cart_empty: String,
    pub buttons: Buttons,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Buttons {
    #[serde(rename = "continue")]
    pub continue_: String,
    pub place_order: String,
    pub got_it: String,
    pub home: String,
    pub shop: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Timeouts {
    pub default_ms: u64,
    pub short_ms: u64,
    pub very_short_ms: u64,
    pub medium_ms: u64,
    pub long_ms: u64,
}

impl Timeouts {
    pub fn default_wait(&self) -> Duration {
        Duration::from_millis(self.default_ms)
    }

    pub fn short(&self) -> Duration {
        Duration::from_millis(self.short_ms)
    }

    pub fn very_short(&self) -> Duration {
        Duration::from_millis(self.very_short_ms)
    }

    pub fn medium(&self) -> Duration {
        Duration::from_millis(self.medium_ms)
    }

    pub fn long(&self) -> Duration {
        Duration::from_millis(self.long_ms)
    }
}

impl SiteProfile {
    /// The built-in muffin shop profile.
    pub fn muffin_shop() -> ShopResult<Self> {
        Self::from_json(MUFFIN_SHOP_JSON)
    }

    pub fn from_json(json: &str) -> ShopResult<Self> {
        let profile: SiteProfile = serde_json::from_str(json)?;
        profile.validate()?;
        Ok(profile)
    }

    pub fn load(path: &Path) -> ShopResult<Self> {
        let json = std::fs::read_to_string(path)?;
        let profile = Self::from_json(&json)
            .map_err(|e| ShopError::Profile(format!("{}: {e}", path.display())))?;
        tracing::debug!(path = %path.display(), name = %profile.name, "loaded site profile");
        Ok(profile)
    }

    /// Reject profiles the locator or the checkout reads cannot work with.
    pub fn validate(&self) -> ShopResult<()> {
        if self.currency_symbol.is_empty() {
            return Err(ShopError::Profile("currency_symbol is empty".into()));
        }
        if self.tolerance_minor_units <= 0 {
            return Err(ShopError::Profile(format!(
                "tolerance_minor_units must be positive, got {}",
                self.tolerance_minor_units
            )));
        }
        if self.locator.container_selectors.is_empty() {
            return Err(ShopError::Profile("locator.container_selectors is empty".into()));
        }
        if self.locator.price_selectors.is_empty() {
            return Err(ShopError::Profile("locator.price_selectors is empty".into()));
        }
        if self.test_data.discount.percentage > 100 {
            return Err(ShopError::InvalidDiscount(self.test_data.discount.percentage));
        }
        if let Some(line) = self.journey.add_to_cart.iter().find(|l| l.quantity == 0) {
            return Err(ShopError::InvalidQuantity {
                product: line.product.clone(),
                quantity: 0,
            });
        }

        // Selectors evaluated by `scraper` against snapshots.
        let scraped = self
            .locator
            .container_selectors
            .iter()
            .chain(&self.locator.price_selectors)
            .chain([
                &self.locator.block_selector,
                &self.selectors.checkout_subtotal,
                &self.selectors.checkout_shipping,
                &self.selectors.checkout_total,
                &self.selectors.discount_pill,
            ]);
        for selector in scraped {
            if Selector::parse(selector).is_err() {
                return Err(ShopError::Profile(format!("invalid CSS selector: {selector}")));
            }
        }
        Ok(())
    }

    pub fn price_locator(&self) -> PriceLocator {
        PriceLocator::new(
            self.locator.container_selectors.clone(),
            self.locator.price_selectors.clone(),
            self.locator.block_selector.clone(),
            self.currency_symbol.clone(),
        )
    }

    pub fn tolerance(&self) -> Money {
        Money::from_minor(self.tolerance_minor_units)
    }

    /// A fresh ledger for one session against this site.
    pub fn new_ledger(&self) -> PriceLedger {
        PriceLedger::new(self.tolerance())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_embedded_profile_loads() {
        let profile = SiteProfile::muffin_shop().unwrap();
        assert_eq!(profile.name, "Muffin Shop");
        assert_eq!(profile.currency_symbol, "€");
        assert_eq!(profile.tolerance(), Money::from_minor(2));
        assert_eq!(profile.journey.add_to_cart.len(), 4);
        assert_eq!(profile.test_data.discount.code, "MUFFIN");
        assert_eq!(profile.test_data.discount.percentage, 10);
        assert_eq!(profile.messages.buttons.continue_, "Continue");
        assert_eq!(profile.messages.buttons.shop, "Shop");
        assert_eq!(profile.selectors.cart_content, ".cart__content");
        assert_eq!(profile.messages.validation_errors.len(), 4);
        assert_eq!(profile.timeouts.very_short(), Duration::from_millis(500));
    }

    #[test]
    fn test_embedded_locator_matches_defaults() {
        let profile = SiteProfile::muffin_shop().unwrap();
        assert_eq!(
            profile.locator.container_selectors,
            crate::locator::DEFAULT_CONTAINER_SELECTORS
        );
        assert_eq!(
            profile.locator.price_selectors,
            crate::locator::DEFAULT_PRICE_SELECTORS
        );
        assert_eq!(profile.price_locator().currency_symbol(), "€");
    }

    fn edited(edit: impl FnOnce(&mut serde_json::Value)) -> String {
        let mut value: serde_json::Value = serde_json::from_str(MUFFIN_SHOP_JSON).unwrap();
        edit(&mut value);
        value.to_string()
    }

    #[test]
    fn test_rejects_invalid_price_selector() {
        let json = edited(|v| v["locator"]["price_selectors"][0] = "p[".into());
        let err = SiteProfile::from_json(&json).unwrap_err();
        assert!(matches!(err, ShopError::Profile(msg) if msg.contains("p[")));
    }

    #[test]
    fn test_rejects_empty_container_list() {
        let json = edited(|v| v["locator"]["container_selectors"] = serde_json::json!([]));
        assert!(matches!(SiteProfile::from_json(&json), Err(ShopError::Profile(_))));
    }

    #[test]
    fn test_rejects_discount_above_hundred() {
        let json = edited(|v| v["test_data"]["discount"]["percentage"] = 120.into());
        assert!(matches!(
            SiteProfile::from_json(&json),
            Err(ShopError::InvalidDiscount(120))
        ));
    }

    #[test]
    fn test_rejects_zero_quantity_line() {
        let json = edited(|v| v["journey"]["add_to_cart"][1]["quantity"] = 0.into());
        assert!(matches!(
            SiteProfile::from_json(&json),
            Err(ShopError::InvalidQuantity { quantity: 0, .. })
        ));
    }

    #[test]
    fn test_rejects_malformed_json() {
        assert!(matches!(SiteProfile::from_json("{"), Err(ShopError::Json(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shop.json");
        let json = edited(|v| v["name"] = "Staging Muffins".into());
        std::fs::File::create(&path)
            .unwrap()
            .write_all(json.as_bytes())
            .unwrap();

        let profile = SiteProfile::load(&path).unwrap();
        assert_eq!(profile.name, "Staging Muffins");
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = SiteProfile::load(&dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, ShopError::Io(_)));
    }
}
