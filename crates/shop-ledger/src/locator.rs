//! Price locator: resolves a product title to its displayed price.
//!
//! Storefront markup differs between the listing, the product page, the cart
//! and checkout, so no single selector finds every price. The locator anchors
//! on the deepest element whose text contains the product name and then walks
//! an ordered cascade of tiers, stopping at the first that yields text:
//!
//! 1. **Container**: the anchor's nearest item container, searched with the
//!    price selectors in priority order.
//! 2. **Broad search**: every price-shaped element on the page, kept only if
//!    its own item container also contains the product name.
//! 3. **Sibling**: currency text among the descendants of the anchor's
//!    nearest generic block (`div`, `li`, `article`, `section`).
//! 4. **Last resort**: currency text under that block's parent and siblings.
//!
//! Tiers 3 and 4 require the currency symbol *and* a number, so decorative
//! symbols are never mistaken for prices.

use crate::money::{contains_decimal, looks_like_price, parse_price_text, DEFAULT_CURRENCY_SYMBOL};
use crate::page::{closest, PageHandle};
use crate::types::{PriceQuote, ProductName, QuoteSource, ShopError, ShopResult};

/// Tiers in the order they are tried.
const CASCADE: [QuoteSource; 4] = [
    QuoteSource::Container,
    QuoteSource::BroadSearch,
    QuoteSource::Sibling,
    QuoteSource::LastResort,
];

/// Elements whose text is never rendered as page content.
const NON_CONTENT: &str = "head, title, script, style, noscript, template";

/// Default item-container predicates, highest priority first.
pub const DEFAULT_CONTAINER_SELECTORS: &[&str] = &[
    ".product-list_item",
    ".checkout-cartsummary-item",
    "[class*=\"product\"]",
    "[class*=\"item\"]",
    "div",
    "li",
    "article",
    "section",
];

/// Default price-shaped selectors, highest priority first.
pub const DEFAULT_PRICE_SELECTORS: &[&str] = &[
    "p.block-product__price",
    ".block-product__price",
    "p.block-product_price",
    ".block-product_price",
    "p.product_price",
    ".product_price",
    "[class*=\"product_price\"]",
    "[class*=\"price\"]",
];

/// Generic block elements used by the sibling tiers.
pub const DEFAULT_BLOCK_SELECTOR: &str = "div, li, article, section";

/// Locator tuning. Usually taken from the site profile.
#[derive(Debug, Clone)]
pub struct PriceLocator {
    container_selectors: Vec<String>,
    price_selectors: Vec<String>,
    block_selector: String,
    currency_symbol: String,
}

impl Default for PriceLocator {
    fn default() -> Self {
        Self {
            container_selectors: DEFAULT_CONTAINER_SELECTORS.iter().map(|s| s.to_string()).collect(),
            price_selectors: DEFAULT_PRICE_SELECTORS.iter().map(|s| s.to_string()).collect(),
            block_selector: DEFAULT_BLOCK_SELECTOR.to_string(),
            currency_symbol: DEFAULT_CURRENCY_SYMBOL.to_string(),
        }
    }
}

impl PriceLocator {
    pub fn new(
        container_selectors: Vec<String>,
        price_selectors: Vec<String>,
        block_selector: impl Into<String>,
        currency_symbol: impl Into<String>,
    ) -> Self {
        Self {
            container_selectors,
            price_selectors,
            block_selector: block_selector.into(),
            currency_symbol: currency_symbol.into(),
        }
    }

    pub fn currency_symbol(&self) -> &str {
        &self.currency_symbol
    }

    /// Find and parse the price displayed for `product`.
    ///
    /// Fails with [`ShopError::PriceNotFound`] when the title is absent or no
    /// tier matches, and with [`ShopError::PriceParse`] when the matched text
    /// carries no number.
    pub fn locate<P: PageHandle>(&self, product: &ProductName, page: &P) -> ShopResult<PriceQuote> {
        let anchor = self
            .anchor(product, page)
            .ok_or_else(|| ShopError::PriceNotFound(product.clone()))?;

        let (source, text) = CASCADE
            .iter()
            .find_map(|tier| {
                let found = self.attempt(*tier, product, page, anchor);
                if found.is_none() {
                    tracing::debug!(%product, tier = %tier, "no price in tier");
                }
                found.map(|text| (*tier, text))
            })
            .ok_or_else(|| ShopError::PriceNotFound(product.clone()))?;

        let amount = parse_price_text(&text, &self.currency_symbol)?;
        tracing::debug!(%product, source = %source, %amount, "located price");

        Ok(PriceQuote {
            product: product.clone(),
            amount,
            source,
        })
    }

    /// Deepest content element whose text contains the product name; first
    /// in document order when several qualify.
    fn anchor<'a, P: PageHandle>(&self, product: &ProductName, page: &'a P) -> Option<P::Element<'a>> {
        let name = product.as_str();
        let root = page.root();
        std::iter::once(root)
            .chain(page.find_all(root, "*"))
            .filter(|el| !page.matches(*el, NON_CONTENT))
            .filter(|el| page.read_text(*el).contains(name))
            .find(|el| {
                !page
                    .children(*el)
                    .into_iter()
                    .any(|child| !page.matches(child, NON_CONTENT) && page.read_text(child).contains(name))
            })
    }

    fn attempt<'a, P: PageHandle>(
        &self,
        tier: QuoteSource,
        product: &ProductName,
        page: &'a P,
        anchor: P::Element<'a>,
    ) -> Option<String> {
        match tier {
            QuoteSource::Container => self.container_tier(page, anchor),
            QuoteSource::BroadSearch => self.broad_tier(product, page),
            QuoteSource::Sibling => self.sibling_tier(page, anchor),
            QuoteSource::LastResort => self.last_resort_tier(page, anchor),
        }
    }

    /// Nearest ancestor (inclusive) matching any container predicate.
    fn container_of<'a, P: PageHandle>(&self, page: &'a P, element: P::Element<'a>) -> Option<P::Element<'a>> {
        std::iter::successors(Some(element), |el| page.parent(*el)).find(|el| {
            self.container_selectors
                .iter()
                .any(|predicate| page.matches(*el, predicate))
        })
    }

    fn container_tier<'a, P: PageHandle>(&self, page: &'a P, anchor: P::Element<'a>) -> Option<String> {
        let container = self.container_of(page, anchor)?;
        self.price_selectors.iter().find_map(|selector| {
            let first = page.find_all(container, selector).into_iter().next()?;
            let text = page.read_text(first);
            contains_decimal(&text).then_some(text)
        })
    }

    fn broad_tier<P: PageHandle>(&self, product: &ProductName, page: &P) -> Option<String> {
        let root = page.root();
        self.price_selectors.iter().find_map(|selector| {
            page.find_all(root, selector).into_iter().find_map(|candidate| {
                let container = self.container_of(page, candidate)?;
                if !page.read_text(container).contains(product.as_str()) {
                    return None;
                }
                let text = page.read_text(candidate);
                contains_decimal(&text).then_some(text)
            })
        })
    }

    fn sibling_tier<'a, P: PageHandle>(&self, page: &'a P, anchor: P::Element<'a>) -> Option<String> {
        let block = closest(page, anchor, &self.block_selector)?;
        self.first_currency_text(page, page.find_all(block, "*"))
    }

    fn last_resort_tier<'a, P: PageHandle>(&self, page: &'a P, anchor: P::Element<'a>) -> Option<String> {
        let block = closest(page, anchor, &self.block_selector)?;
        let parent = page.parent(block)?;

        let mut scope: Vec<P::Element<'a>> = page.find_all(parent, "*");
        let siblings = page.children(parent).into_iter().filter(|el| *el != block);
        for sibling in siblings {
            for el in page.find_all(sibling, "*") {
                if !scope.contains(&el) {
                    scope.push(el);
                }
            }
        }
        self.first_currency_text(page, scope)
    }

    fn first_currency_text<'a, P: PageHandle>(
        &self,
        page: &'a P,
        candidates: Vec<P::Element<'a>>,
    ) -> Option<String> {
        candidates
            .into_iter()
            .map(|el| page.read_text(el))
            .find(|text| looks_like_price(text, &self.currency_symbol))
    }
}
