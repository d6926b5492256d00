//! Browser automation abstraction used by the journey.
//!
//! Defines the `PageDriver` trait over a single browser tab. Waiting and
//! polling live here; the price core only ever sees HTML snapshots.

pub mod chromium;

use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use async_trait::async_trait;
use shop_ledger::{HtmlPage, PageHandle};

pub use chromium::ChromiumDriver;

/// Scope covering the whole document body.
pub const WHOLE_PAGE: &str = "body";

/// Delay between two polls of a wait.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A single browser tab the journey can drive.
#[async_trait]
pub trait PageDriver: Send {
    /// Navigate to a URL and wait for it to load.
    async fn goto(&mut self, url: &str) -> Result<()>;

    /// Current document title.
    async fn title(&mut self) -> Result<String>;

    /// Serialized HTML of the current document.
    async fn html(&mut self) -> Result<String>;

    /// Whether at least one element matching `selector` is rendered.
    async fn exists(&mut self, selector: &str) -> Result<bool>;

    /// Click the first rendered element matching `selector`.
    async fn click(&mut self, selector: &str) -> Result<()>;

    /// Click the deepest rendered element whose text contains `text`,
    /// ignoring case.
    async fn click_text(&mut self, text: &str) -> Result<()>;

    /// Click a `selector` match belonging to the item showing `item_text`.
    ///
    /// The text is searched inside the first `scope` match (the body when
    /// none renders). The target is the first match in the text's nearest
    /// block, then in that block's parent, then any match on the page whose
    /// own block shows the text.
    async fn click_in_item(&mut self, scope: &str, item_text: &str, selector: &str) -> Result<()>;

    /// Clear an input and type `value` into it.
    async fn fill(&mut self, selector: &str, value: &str) -> Result<()>;

    /// Press Enter in an input.
    async fn press_enter(&mut self, selector: &str) -> Result<()>;

    /// Go back one entry in the tab history.
    async fn go_back(&mut self) -> Result<()>;

    /// Poll until `selector` is rendered.
    async fn wait_for_selector(&mut self, selector: &str, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.exists(selector).await? {
                return Ok(());
            }
            if Instant::now() >= deadline {
                bail!("timed out after {}ms waiting for {selector}", timeout.as_millis());
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Poll until the page text contains `text`.
    async fn wait_for_text(&mut self, text: &str, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            let html = self.html().await?;
            if page_shows_text(&html, text) {
                return Ok(());
            }
            if Instant::now() >= deadline {
                bail!("timed out after {}ms waiting for text \"{text}\"", timeout.as_millis());
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

/// Whether the body of a snapshot shows `text`.
pub fn page_shows_text(html: &str, text: &str) -> bool {
    let page = HtmlPage::parse(html);
    let root = page.root();
    let body = page.find_all(root, "body").into_iter().next().unwrap_or(root);
    page.read_text(body).contains(text)
}
