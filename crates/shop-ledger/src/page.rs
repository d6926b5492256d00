//! Page abstraction consumed by the price locator.
//!
//! The locator never talks to a browser. It walks a rendered snapshot through
//! the [`PageHandle`] trait, which offers just enough tree navigation for the
//! price cascade: selector queries, ancestry, children and text. [`HtmlPage`]
//! implements it over a `scraper` document; any browser collaborator can hand
//! the locator a snapshot by serializing the live DOM to HTML.
//!
//! `scraper` types are `!Send`, so an `HtmlPage` should be built and dropped
//! between awaits rather than held across them.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::Debug;

use scraper::{ElementRef, Html, Selector};

use crate::money::parse_price_text;
use crate::types::{Money, ShopError, ShopResult};

/// A rendered page (or part of one) that can be searched for elements.
pub trait PageHandle {
    /// Opaque element handle, valid for as long as the page is borrowed.
    type Element<'a>: Copy + PartialEq + Debug
    where
        Self: 'a;

    /// The document element.
    fn root(&self) -> Self::Element<'_>;

    /// Descendants of `scope` (excluding `scope`) matching a CSS selector, in
    /// document order. Unparsable selectors match nothing.
    fn find_all<'a>(&'a self, scope: Self::Element<'a>, selector: &str) -> Vec<Self::Element<'a>>;

    /// Whether the element itself matches a CSS selector.
    fn matches<'a>(&'a self, element: Self::Element<'a>, selector: &str) -> bool;

    fn parent<'a>(&'a self, element: Self::Element<'a>) -> Option<Self::Element<'a>>;

    fn children<'a>(&'a self, element: Self::Element<'a>) -> Vec<Self::Element<'a>>;

    /// Rendered text of the element and its descendants, whitespace-collapsed.
    fn read_text<'a>(&'a self, element: Self::Element<'a>) -> String;
}

/// Nearest element, starting at `element` itself, that matches `selector`.
pub fn closest<'a, P: PageHandle>(
    page: &'a P,
    element: P::Element<'a>,
    selector: &str,
) -> Option<P::Element<'a>> {
    let mut current = Some(element);
    while let Some(el) = current {
        if page.matches(el, selector) {
            return Some(el);
        }
        current = page.parent(el);
    }
    None
}

/// Read and parse the amount shown by the first element matching `selector`.
///
/// A missing element surfaces as [`ShopError::PriceParse`].
pub fn read_amount<P: PageHandle>(page: &P, selector: &str, currency_symbol: &str) -> ShopResult<Money> {
    let root = page.root();
    let text = page
        .find_all(root, selector)
        .first()
        .map(|el| page.read_text(*el))
        .ok_or_else(|| ShopError::PriceParse(format!("<no element for {selector}>")))?;
    parse_price_text(&text, currency_symbol)
}

/// A parsed HTML snapshot.
pub struct HtmlPage {
    document: Html,
    selectors: RefCell<HashMap<String, Option<Selector>>>,
}

impl HtmlPage {
    /// Parse a full HTML document.
    pub fn parse(html: &str) -> Self {
        Self {
            document: Html::parse_document(html),
            selectors: RefCell::new(HashMap::new()),
        }
    }

    /// Run `f` with the compiled selector, caching compilation per page.
    fn with_selector<R>(&self, selector: &str, f: impl FnOnce(&Selector) -> R) -> Option<R> {
        let mut cache = self.selectors.borrow_mut();
        let compiled = cache
            .entry(selector.to_string())
            .or_insert_with(|| match Selector::parse(selector) {
                Ok(sel) => Some(sel),
                Err(e) => {
                    tracing::warn!(selector, "skipping unparsable selector: {e:?}");
                    None
                }
            });
        compiled.as_ref().map(f)
    }
}

impl PageHandle for HtmlPage {
    type Element<'a> = ElementRef<'a> where Self: 'a;

    fn root(&self) -> ElementRef<'_> {
        self.document.root_element()
    }

    fn find_all<'a>(&'a self, scope: ElementRef<'a>, selector: &str) -> Vec<ElementRef<'a>> {
        self.with_selector(selector, |sel| {
            scope.select(sel).filter(|el| *el != scope).collect()
        })
        .unwrap_or_default()
    }

    fn matches<'a>(&'a self, element: ElementRef<'a>, selector: &str) -> bool {
        self.with_selector(selector, |sel| sel.matches(&element))
            .unwrap_or(false)
    }

    fn parent<'a>(&'a self, element: ElementRef<'a>) -> Option<ElementRef<'a>> {
        element.parent().and_then(ElementRef::wrap)
    }

    fn children<'a>(&'a self, element: ElementRef<'a>) -> Vec<ElementRef<'a>> {
        element.children().filter_map(ElementRef::wrap).collect()
    }

    fn read_text<'a>(&'a self, element: ElementRef<'a>) -> String {
        element
            .text()
            .collect::<String>()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }
}
