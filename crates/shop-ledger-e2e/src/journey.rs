//! The full shopping journey.
//!
//! Visits the shop, puts the planned products in the bag while capturing
//! each product page price into a [`PriceLedger`], edits the cart, and at
//! checkout verifies every line and the discounted total against the ledger
//! before placing the order and checking the bag is empty again.
//!
//! Every step is timed, logged and appended to the [`JourneyReport`]; the
//! first failing step stops the run.

use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use shop_ledger::profile::CartLine;
use shop_ledger::{
    read_amount, CheckoutSummary, HtmlPage, Money, PageHandle, PriceLedger, PriceLocator,
    PriceQuote, ProductName, Reconciliation, SiteProfile,
};

use crate::driver::{PageDriver, WHOLE_PAGE};
use crate::report::{JourneyReport, StepRecord};

/// One run of the shopping journey against a site.
pub struct Journey {
    profile: SiteProfile,
    base_url: String,
    locator: PriceLocator,
    ledger: PriceLedger,
    report: JourneyReport,
}

impl Journey {
    pub fn new(profile: SiteProfile) -> Self {
        Self {
            base_url: profile.base_url.clone(),
            locator: profile.price_locator(),
            ledger: profile.new_ledger(),
            report: JourneyReport::in_memory(),
            profile,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_report(mut self, report: JourneyReport) -> Self {
        self.report = report;
        self
    }

    pub fn ledger(&self) -> &PriceLedger {
        &self.ledger
    }

    pub fn report(&self) -> &JourneyReport {
        &self.report
    }

    pub fn into_report(self) -> JourneyReport {
        self.report
    }

    /// Drive the whole journey. Returns the checkout reconciliation once the
    /// order has been placed and the bag verified empty.
    pub async fn run<D: PageDriver + ?Sized>(&mut self, driver: &mut D) -> Result<Reconciliation> {
        tracing::info!(site = %self.profile.name, base_url = %self.base_url, "starting journey");

        let started = Instant::now();
        let result = self.open_home(driver).await;
        self.record("open_home", started, result)?;

        let started = Instant::now();
        let result = self.open_shop(driver).await;
        self.record("open_shop", started, result)?;

        for line in self.profile.journey.add_to_cart.clone() {
            let step = format!("add_to_cart: {}", line.product);
            let started = Instant::now();
            let result = self.add_to_cart(driver, &line).await;
            self.record(&step, started, result)?;
        }

        let started = Instant::now();
        let result = self.open_cart(driver).await;
        self.record("open_cart", started, result)?;

        for product in self.profile.journey.decrease_in_cart.clone() {
            let step = format!("decrease_in_cart: {product}");
            let started = Instant::now();
            let result = self.decrease_in_cart(driver, &product).await;
            self.record(&step, started, result)?;
        }

        for product in self.profile.journey.delete_from_cart.clone() {
            let step = format!("delete_from_cart: {product}");
            let started = Instant::now();
            let result = self.delete_from_cart(driver, &product).await;
            self.record(&step, started, result)?;
        }

        let started = Instant::now();
        let result = self.open_checkout(driver).await;
        self.record("open_checkout", started, result)?;

        let started = Instant::now();
        let result = self.verify_checkout_lines(driver).await;
        let subtotal = self.record("verify_checkout_lines", started, result)?;

        let started = Instant::now();
        let result = self.apply_discount(driver).await;
        self.record("apply_discount", started, result)?;

        let started = Instant::now();
        let result = self.reconcile_total(driver, subtotal).await;
        let reconciliation = self.record("reconcile_total", started, result)?;

        let started = Instant::now();
        let result = self.select_shipping(driver).await;
        self.record("select_shipping", started, result)?;

        let started = Instant::now();
        let result = self.check_contact_validation(driver).await;
        self.record("contact_validation", started, result)?;

        let started = Instant::now();
        let result = self.fill_contact_form(driver).await;
        self.record("fill_contact_form", started, result)?;

        let started = Instant::now();
        let result = self.place_order(driver).await;
        self.record("place_order", started, result)?;

        let started = Instant::now();
        let result = self.verify_cart_empty(driver).await;
        self.record("verify_cart_empty", started, result)?;

        tracing::info!(
            steps = self.report.steps().len(),
            total = %reconciliation.displayed,
            "journey passed"
        );
        Ok(reconciliation)
    }

    fn record<T>(&mut self, step: &str, started: Instant, result: Result<T>) -> Result<T> {
        let duration_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => {
                tracing::info!(step, duration_ms, "step passed");
                self.report.record(StepRecord::passed(step, duration_ms));
            }
            Err(e) => {
                tracing::error!(step, duration_ms, "step failed: {e:#}");
                self.report
                    .record(StepRecord::failed(step, duration_ms, format!("{e:#}")));
            }
        }
        result.with_context(|| format!("journey step `{step}` failed"))
    }

    // ── steps ──

    async fn open_home<D: PageDriver + ?Sized>(&mut self, driver: &mut D) -> Result<()> {
        driver.goto(&self.base_url).await?;
        let title = driver.title().await?;
        if !title.contains(&self.profile.messages.page_title) {
            bail!(
                "page title \"{title}\" does not include \"{}\"",
                self.profile.messages.page_title
            );
        }
        Ok(())
    }

    async fn open_shop<D: PageDriver + ?Sized>(&mut self, driver: &mut D) -> Result<()> {
        let timeouts = self.profile.timeouts;
        self.click_shop_link(driver).await?;
        driver
            .wait_for_selector(&self.profile.selectors.product_title, timeouts.default_wait())
            .await?;
        if let Some(first) = self.profile.journey.add_to_cart.first() {
            driver
                .wait_for_text(first.product.as_str(), timeouts.default_wait())
                .await?;
        }
        Ok(())
    }

    async fn add_to_cart<D: PageDriver + ?Sized>(&mut self, driver: &mut D, line: &CartLine) -> Result<()> {
        let timeouts = self.profile.timeouts;
        let selectors = self.profile.selectors.clone();
        let product = line.product.as_str();

        if !driver.exists(&selectors.product_title).await? {
            self.click_shop_link(driver).await?;
            driver
                .wait_for_selector(&selectors.product_title, timeouts.default_wait())
                .await?;
        }
        driver.wait_for_text(product, timeouts.default_wait()).await?;
        driver.click_in_item(WHOLE_PAGE, product, "a").await?;
        driver
            .wait_for_selector(&selectors.add_to_bag_button, timeouts.default_wait())
            .await?;
        driver.wait_for_text(product, timeouts.default_wait()).await?;

        let html = driver.html().await?;
        let quote = self.capture_price(&line.product, &html)?;
        tracing::info!(product, price = %quote.amount, source = %quote.source, "captured price");
        self.ledger.record_unit_price(quote);

        if driver.exists(&selectors.product_qty_toggle).await? {
            driver.click(&selectors.product_qty_toggle).await?;
            driver
                .wait_for_selector(&selectors.product_qty_input, timeouts.short())
                .await?;
        }
        driver
            .fill(&selectors.product_qty_input, &line.quantity.to_string())
            .await?;
        driver.press_enter(&selectors.product_qty_input).await?;

        driver.click(&selectors.add_to_bag_button).await?;
        self.ledger.add_product(&line.product, line.quantity)?;

        if driver.exists(&selectors.cart_close_button).await? {
            driver.click(&selectors.cart_close_button).await?;
        }

        driver.go_back().await?;
        driver
            .wait_for_selector(&selectors.product_title, timeouts.default_wait())
            .await?;
        Ok(())
    }

    async fn open_cart<D: PageDriver + ?Sized>(&mut self, driver: &mut D) -> Result<()> {
        driver.click(&self.profile.selectors.cart_open_button).await?;
        driver
            .wait_for_selector(
                &self.profile.selectors.cart_qty_input,
                self.profile.timeouts.default_wait(),
            )
            .await
    }

    async fn decrease_in_cart<D: PageDriver + ?Sized>(
        &mut self,
        driver: &mut D,
        product: &ProductName,
    ) -> Result<()> {
        driver
            .wait_for_text(product.as_str(), self.profile.timeouts.default_wait())
            .await?;
        let selectors = &self.profile.selectors;
        driver
            .click_in_item(&selectors.cart_content, product.as_str(), &selectors.cart_decrease_button)
            .await?;
        let remaining = self.ledger.decrease(product, 1)?;
        tracing::info!(%product, remaining, "decreased in cart");
        pause(self.profile.timeouts.very_short()).await;
        Ok(())
    }

    async fn delete_from_cart<D: PageDriver + ?Sized>(
        &mut self,
        driver: &mut D,
        product: &ProductName,
    ) -> Result<()> {
        driver
            .wait_for_text(product.as_str(), self.profile.timeouts.short())
            .await?;
        let selectors = &self.profile.selectors;
        driver
            .click_in_item(&selectors.cart_content, product.as_str(), &selectors.cart_delete_button)
            .await?;
        self.ledger.remove_product(product)?;
        tracing::info!(%product, "deleted from cart");
        pause(self.profile.timeouts.very_short()).await;
        Ok(())
    }

    async fn open_checkout<D: PageDriver + ?Sized>(&mut self, driver: &mut D) -> Result<()> {
        driver.click(&self.profile.selectors.cart_checkout_button).await?;
        driver
            .wait_for_selector(
                &self.profile.selectors.checkout_subtotal,
                self.profile.timeouts.default_wait(),
            )
            .await
    }

    /// Every cart line shows its ledger total; returns the pre-discount subtotal.
    async fn verify_checkout_lines<D: PageDriver + ?Sized>(&mut self, driver: &mut D) -> Result<Money> {
        let timeouts = self.profile.timeouts;
        for entry in self.ledger.entries() {
            driver
                .wait_for_text(entry.product.as_str(), timeouts.default_wait())
                .await?;
        }

        let html = driver.html().await?;
        for entry in self.ledger.entries() {
            let shown = self.capture_price(&entry.product, &html)?;
            let expected = self.ledger.expected_line_total(&entry.product, entry.quantity)?;
            if shown.amount != expected {
                bail!(
                    "checkout shows {} for \"{}\" but {} x {} = {expected}",
                    shown.amount,
                    entry.product,
                    entry.quantity,
                    entry.unit_price.amount
                );
            }
            tracing::info!(product = %entry.product, price = %shown.amount, "checkout line verified");
        }

        let subtotal = self.read_checkout_amount(&html, &self.profile.selectors.checkout_subtotal)?;
        let expected = self.ledger.expected_subtotal()?;
        if subtotal != expected {
            bail!("checkout subtotal {subtotal} differs from cart lines {expected}");
        }
        tracing::info!(%subtotal, "subtotal before discount");
        Ok(subtotal)
    }

    async fn apply_discount<D: PageDriver + ?Sized>(&mut self, driver: &mut D) -> Result<()> {
        let timeouts = self.profile.timeouts;
        let selectors = &self.profile.selectors;
        let discount = &self.profile.test_data.discount;

        driver
            .wait_for_selector(&selectors.discount_code_input, timeouts.default_wait())
            .await?;
        driver.fill(&selectors.discount_code_input, &discount.code).await?;
        driver.click(&selectors.discount_apply_button).await?;
        pause(timeouts.very_short()).await;

        driver
            .wait_for_selector(&selectors.discount_pill, timeouts.default_wait())
            .await?;
        let html = driver.html().await?;
        let pill = element_text(&html, &selectors.discount_pill).unwrap_or_default();
        if !pill.contains(&discount.expected_text) {
            bail!(
                "discount pill shows \"{pill}\", expected \"{}\"",
                discount.expected_text
            );
        }
        pause(timeouts.very_short()).await;
        Ok(())
    }

    /// Shipping and total are read after the discount is applied.
    async fn reconcile_total<D: PageDriver + ?Sized>(
        &mut self,
        driver: &mut D,
        subtotal: Money,
    ) -> Result<Reconciliation> {
        let capture = CheckoutSummary::begin(subtotal)
            .apply_discount(self.profile.test_data.discount.percentage)?;

        let html = driver.html().await?;
        let shipping = self.read_checkout_amount(&html, &self.profile.selectors.checkout_shipping)?;
        let displayed = self.read_checkout_amount(&html, &self.profile.selectors.checkout_total)?;
        tracing::info!(%shipping, %displayed, "checkout after discount");

        let summary = capture.shipping(shipping).displayed_total(displayed);
        self.ledger.take_checkout_snapshot(summary)?;
        Ok(self.ledger.reconcile()?)
    }

    async fn select_shipping<D: PageDriver + ?Sized>(&mut self, driver: &mut D) -> Result<()> {
        let timeouts = self.profile.timeouts;
        let selectors = &self.profile.selectors;

        driver
            .wait_for_selector(&selectors.shipping_option, timeouts.default_wait())
            .await?;
        driver.click(&selectors.shipping_option).await?;
        pause(timeouts.very_short()).await;

        driver
            .wait_for_selector(&selectors.shipping_dropdown_input, timeouts.default_wait())
            .await?;
        driver.click(&selectors.shipping_dropdown_input).await?;
        pause(timeouts.medium()).await;

        let mut picked = false;
        for option in &selectors.dropdown_options {
            if driver.exists(option).await? {
                driver.click(option).await?;
                picked = true;
                break;
            }
        }
        if !picked {
            driver.click(&selectors.dropdown_fallback).await?;
        }
        pause(timeouts.very_short()).await;

        driver
            .wait_for_selector(&selectors.shipping_continue_button, timeouts.default_wait())
            .await?;
        driver.click(&selectors.shipping_continue_button).await?;
        pause(timeouts.medium()).await;
        Ok(())
    }

    /// Continuing with an empty contact form must show every validation error.
    async fn check_contact_validation<D: PageDriver + ?Sized>(&mut self, driver: &mut D) -> Result<()> {
        let timeouts = self.profile.timeouts;
        let messages = &self.profile.messages;

        click_button(
            driver,
            &messages.buttons.continue_,
            &self.profile.selectors.continue_buttons,
        )
        .await?;
        pause(timeouts.medium()).await;

        for message in &messages.validation_errors {
            driver.wait_for_text(message, timeouts.short()).await?;
        }
        Ok(())
    }

    async fn fill_contact_form<D: PageDriver + ?Sized>(&mut self, driver: &mut D) -> Result<()> {
        let timeouts = self.profile.timeouts;
        let selectors = &self.profile.selectors;
        let contact = &self.profile.test_data.contact;

        for (selector, value) in [
            (&selectors.email_input, &contact.email),
            (&selectors.name_input, &contact.full_name),
            (&selectors.phone_input, &contact.phone),
            (&selectors.special_requests_input, &contact.special_requests),
        ] {
            driver.wait_for_selector(selector, timeouts.default_wait()).await?;
            driver.fill(selector, value).await?;
        }
        pause(timeouts.very_short()).await;

        let label = &self.profile.messages.buttons.continue_;
        click_button(driver, label, &text_selectors(label)).await?;
        pause(timeouts.medium()).await;
        Ok(())
    }

    async fn place_order<D: PageDriver + ?Sized>(&mut self, driver: &mut D) -> Result<()> {
        let timeouts = self.profile.timeouts;
        let messages = &self.profile.messages;

        let label = &messages.buttons.place_order;
        click_button(driver, label, &text_selectors(label)).await?;
        pause(timeouts.long()).await;

        for message in &messages.order_success {
            driver.wait_for_text(message, timeouts.default_wait()).await?;
        }
        Ok(())
    }

    async fn verify_cart_empty<D: PageDriver + ?Sized>(&mut self, driver: &mut D) -> Result<()> {
        let timeouts = self.profile.timeouts;
        let buttons = &self.profile.messages.buttons;

        click_button(driver, &buttons.got_it, &text_selectors(&buttons.got_it)).await?;
        pause(timeouts.very_short()).await;
        click_button(driver, &buttons.home, &text_selectors(&buttons.home)).await?;
        pause(timeouts.medium()).await;

        let cart_button = &self.profile.selectors.cart_open_button;
        driver.wait_for_selector(cart_button, timeouts.default_wait()).await?;
        driver.click(cart_button).await?;
        pause(timeouts.very_short()).await;

        driver
            .wait_for_text(&self.profile.messages.cart_empty, timeouts.short())
            .await
    }

    /// The navigation link labelled with the shop button text.
    async fn click_shop_link<D: PageDriver + ?Sized>(&self, driver: &mut D) -> Result<()> {
        let label = &self.profile.messages.buttons.shop;
        click_button(driver, label, std::slice::from_ref(&self.profile.selectors.nav_shop_link)).await
    }

    // ── snapshot reads ──

    fn capture_price(&self, product: &ProductName, html: &str) -> Result<PriceQuote> {
        let page = HtmlPage::parse(html);
        self.locator
            .locate(product, &page)
            .with_context(|| format!("reading the price of \"{product}\""))
    }

    fn read_checkout_amount(&self, html: &str, selector: &str) -> Result<Money> {
        let page = HtmlPage::parse(html);
        read_amount(&page, selector, self.locator.currency_symbol())
            .with_context(|| format!("reading {selector}"))
    }
}

/// Text of the first element matching `selector`.
fn element_text(html: &str, selector: &str) -> Option<String> {
    let page = HtmlPage::parse(html);
    let root = page.root();
    page.find_all(root, selector).first().map(|el| page.read_text(*el))
}

/// `data-qa` selectors derived from a button label.
fn text_selectors(label: &str) -> Vec<String> {
    let key = label.to_lowercase();
    vec![
        format!("[data-qa*=\"{key}\"]"),
        format!("button[data-qa*=\"{key}\"]"),
        format!("a[data-qa*=\"{key}\"]"),
    ]
}

/// Click the first rendered selector, or the element showing `label`.
async fn click_button<D: PageDriver + ?Sized>(driver: &mut D, label: &str, selectors: &[String]) -> Result<()> {
    for selector in selectors {
        if driver.exists(selector).await? {
            return driver.click(selector).await;
        }
    }
    driver.click_text(label).await
}

async fn pause(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_selectors() {
        assert_eq!(
            text_selectors("Got it"),
            vec![
                "[data-qa*=\"got it\"]".to_string(),
                "button[data-qa*=\"got it\"]".to_string(),
                "a[data-qa*=\"got it\"]".to_string(),
            ]
        );
    }

    #[test]
    fn test_element_text() {
        let html = r#"<html><body><span data-qa="pill"> MUFFIN  (10% OFF) </span></body></html>"#;
        assert_eq!(
            element_text(html, "[data-qa=\"pill\"]").as_deref(),
            Some("MUFFIN (10% OFF)")
        );
        assert_eq!(element_text(html, ".missing"), None);
    }

    #[test]
    fn test_journey_uses_profile_defaults() {
        let profile = SiteProfile::muffin_shop().unwrap();
        let journey = Journey::new(profile.clone()).with_base_url("http://127.0.0.1:9000/");
        assert_eq!(journey.base_url, "http://127.0.0.1:9000/");
        assert_eq!(journey.ledger().tolerance(), profile.tolerance());
        assert!(journey.report().steps().is_empty());
    }
}
