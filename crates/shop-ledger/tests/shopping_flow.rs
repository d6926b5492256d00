//! End-to-end ledger flow over static storefront snapshots.
//!
//! Listing and product prices are captured with the locator, the cart is
//! tracked in the ledger and the checkout figures are reconciled.

use shop_ledger::{
    read_amount, CheckoutSummary, HtmlPage, LedgerState, Money, PriceLedger, ProductName,
    QuoteSource, ShopError, SiteProfile,
};

// ─────────────────────── fixtures ───────────────────────

const LISTING: &str = r#"
<html><head><title>Freshly Baked Muffins</title></head><body>
  <nav><a data-qa="navigationblock-page-shop">Shop</a></nav>
  <ul class="product-list">
    <li class="product-list_item">
      <a data-qa="product-list-section-item-title"><h6>Blueberry Burst Muffins</h6></a>
      <p class="block-product_price">€3,50</p>
    </li>
    <li class="product-list_item">
      <a data-qa="product-list-section-item-title"><h6>Glazed Paradise Donuts</h6></a>
      <p class="block-product_price">€2,80</p>
    </li>
    <li class="product-list_item">
      <a data-qa="product-list-section-item-title"><h6>Cookies &amp; Cream Cloud Cupcakes</h6></a>
      <p class="block-product_price">€4,10</p>
    </li>
  </ul>
</body></html>
"#;

const PRODUCT_PAGE: &str = r#"
<html><body>
  <section class="block-product">
    <h1>Cookies &amp; Cream Cloud Cupcakes</h1>
    <p class="block-product__price">€ 4,10</p>
    <input data-qa="productpage-text-qty" type="number" value="1">
    <button data-qa="productsection-btn-addtobag">Add to bag</button>
  </section>
</body></html>
"#;

const CART: &str = r#"
<html><body>
  <div class="cart__content">
    <ul>
      <li class="cart-item"><span>Blueberry Burst Muffins</span><p class="cart-item__price">€3,50</p></li>
      <li class="cart-item"><span>Glazed Paradise Donuts</span><p class="cart-item__price">€2,80</p></li>
      <li class="cart-item"><span>Cookies &amp; Cream Cloud Cupcakes</span><p class="cart-item__price">€8,20</p></li>
    </ul>
  </div>
</body></html>
"#;

fn checkout_page(subtotal: &str, shipping: &str, total: &str) -> String {
    format!(
        r#"<html><body>
          <div class="checkout-cartsummary">
            <span data-qa="checkout-cartsummary-discount-pill">MUFFIN (10% OFF)</span>
            <p>Subtotal <span data-qa="checkout-cartsummary-subtotalprice-value">{subtotal}</span></p>
            <p>Shipping <span data-qa="checkout-cartsummary-shippingprice-value">{shipping}</span></p>
            <p>Total <span data-qa="checkout-cartsummary-totalprice-value">{total}</span></p>
          </div>
        </body></html>"#
    )
}

fn name(s: &str) -> ProductName {
    ProductName::from(s)
}

/// Capture listing prices and fill the cart the way the journey does.
fn populated_ledger(profile: &SiteProfile) -> PriceLedger {
    let locator = profile.price_locator();
    let mut ledger = profile.new_ledger();

    let listing = HtmlPage::parse(LISTING);
    for (product, quantity) in [
        ("Blueberry Burst Muffins", 2),
        ("Glazed Paradise Donuts", 1),
        ("Cookies & Cream Cloud Cupcakes", 2),
    ] {
        let quote = locator.locate(&name(product), &listing).unwrap();
        assert_eq!(quote.source, QuoteSource::Container);
        ledger.record_unit_price(quote);
        ledger.add_product(&name(product), quantity).unwrap();
    }
    ledger.decrease(&name("Blueberry Burst Muffins"), 1).unwrap();
    ledger
}

fn summary_from(profile: &SiteProfile, html: &str) -> CheckoutSummary {
    let page = HtmlPage::parse(html);
    let symbol = &profile.currency_symbol;
    let s = &profile.selectors;
    CheckoutSummary::begin(read_amount(&page, &s.checkout_subtotal, symbol).unwrap())
        .apply_discount(profile.test_data.discount.percentage)
        .unwrap()
        .shipping(read_amount(&page, &s.checkout_shipping, symbol).unwrap())
        .displayed_total(read_amount(&page, &s.checkout_total, symbol).unwrap())
}

// ─────────────────────── price capture ───────────────────────

#[test]
fn product_page_price_matches_listing() {
    let profile = SiteProfile::muffin_shop().unwrap();
    let locator = profile.price_locator();
    let product = name("Cookies & Cream Cloud Cupcakes");

    let listing = locator.locate(&product, &HtmlPage::parse(LISTING)).unwrap();
    let detail = locator.locate(&product, &HtmlPage::parse(PRODUCT_PAGE)).unwrap();

    assert_eq!(listing.amount, detail.amount);
    assert_eq!(detail.amount, Money::from_minor(410));
}

#[test]
fn cart_line_totals_match_ledger() {
    let profile = SiteProfile::muffin_shop().unwrap();
    let ledger = populated_ledger(&profile);
    let cart = HtmlPage::parse(CART);
    let locator = profile.price_locator();

    for entry in ledger.entries() {
        let shown = locator.locate(&entry.product, &cart).unwrap();
        assert_eq!(Some(shown.amount), entry.line_total(), "{}", entry.product);
    }
    assert_eq!(ledger.expected_subtotal().unwrap(), Money::from_minor(1450));
}

#[test]
fn missing_product_is_reported() {
    let profile = SiteProfile::muffin_shop().unwrap();
    let err = profile
        .price_locator()
        .locate(&name("Lemon Drizzle Loaf"), &HtmlPage::parse(LISTING))
        .unwrap_err();
    assert!(matches!(err, ShopError::PriceNotFound(p) if p.as_str() == "Lemon Drizzle Loaf"));
}

// ─────────────────────── checkout ───────────────────────

#[test]
fn checkout_reconciles() {
    let profile = SiteProfile::muffin_shop().unwrap();
    let mut ledger = populated_ledger(&profile);

    let summary = summary_from(&profile, &checkout_page("€14,50", "€4,99", "€18,04"));
    assert_eq!(summary.subtotal(), ledger.expected_subtotal().unwrap());

    ledger.take_checkout_snapshot(summary).unwrap();
    let outcome = ledger.reconcile().unwrap();

    assert_eq!(outcome.discount, Money::from_minor(145));
    assert_eq!(outcome.calculated, Money::from_minor(1804));
    assert_eq!(ledger.state(), LedgerState::Reconciled);
}

#[test]
fn checkout_mismatch_is_terminal() {
    let profile = SiteProfile::muffin_shop().unwrap();
    let mut ledger = populated_ledger(&profile);

    // Discount taken off the shipping too: 19.49 - 1.95 = 17.54.
    ledger
        .take_checkout_snapshot(summary_from(&profile, &checkout_page("€14,50", "€4,99", "€17,54")))
        .unwrap();

    let err = ledger.reconcile().unwrap_err();
    assert!(matches!(
        err,
        ShopError::ReconciliationMismatch { difference, .. } if difference == Money::from_minor(50)
    ));
    assert_eq!(ledger.state(), LedgerState::Mismatched);
    assert!(ledger.state().is_terminal());
    assert!(matches!(
        ledger.add_product(&name("Glazed Paradise Donuts"), 1),
        Err(ShopError::InvalidState { .. })
    ));
}

#[test]
fn free_shipping_text_fails_to_parse() {
    let profile = SiteProfile::muffin_shop().unwrap();
    let page = HtmlPage::parse(&checkout_page("€14,50", "Free", "€13,05"));
    let err = read_amount(&page, &profile.selectors.checkout_shipping, &profile.currency_symbol)
        .unwrap_err();
    assert!(matches!(err, ShopError::PriceParse(_)));
}

#[test]
fn discount_pill_text_is_readable() {
    use shop_ledger::PageHandle;

    let profile = SiteProfile::muffin_shop().unwrap();
    let page = HtmlPage::parse(&checkout_page("€14,50", "€4,99", "€18,04"));
    let pill = page.find_all(page.root(), &profile.selectors.discount_pill);
    assert_eq!(page.read_text(pill[0]), profile.test_data.discount.expected_text);
}
