//! Chromium-based page driver using chromiumoxide.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;

use super::PageDriver;

/// Environment variable pointing at a Chromium binary.
pub const CHROMIUM_PATH_ENV: &str = "SHOP_LEDGER_CHROMIUM_PATH";

/// How long `go_back` waits for the history navigation to settle.
const BACK_SETTLE: Duration = Duration::from_secs(2);

const RENDERED: &str = "const rendered = (el) => el.getClientRects().length > 0;";

const EXISTS_JS: &str = r#"(selector) => {
    RENDERED
    return Array.from(document.querySelectorAll(selector)).some(rendered);
}"#;

const CLICK_JS: &str = r#"(selector) => {
    RENDERED
    const all = Array.from(document.querySelectorAll(selector));
    const el = all.find(rendered) || all[0];
    if (!el) return false;
    el.scrollIntoView({ block: 'center' });
    el.click();
    return true;
}"#;

const CLICK_TEXT_JS: &str = r#"(text) => {
    RENDERED
    const needle = text.toLowerCase();
    const hits = Array.from(document.body.querySelectorAll('*'))
        .filter((el) => rendered(el) && (el.textContent || '').toLowerCase().includes(needle));
    const el = hits.find((el) => !hits.some((other) => other !== el && el.contains(other)));
    if (!el) return false;
    const target = el.closest('button, a') || el;
    target.scrollIntoView({ block: 'center' });
    target.click();
    return true;
}"#;

const CLICK_IN_ITEM_JS: &str = r#"(scope, text, selector) => {
    const BLOCK = 'div, li, article, section';
    const root = document.querySelector(scope) || document.body;
    const hits = Array.from(root.querySelectorAll('*'))
        .filter((el) => (el.textContent || '').includes(text));
    const anchor = hits.find((el) => !hits.some((other) => other !== el && el.contains(other)));
    const block = anchor && anchor.closest(BLOCK);
    let target = block && (block.querySelector(selector)
        || (block.parentElement && block.parentElement.querySelector(selector)));
    if (!target) {
        target = Array.from(document.querySelectorAll(selector)).find((el) => {
            const own = el.closest(BLOCK);
            return own && (own.textContent || '').includes(text);
        });
    }
    if (!target) return false;
    target.scrollIntoView({ block: 'center' });
    target.click();
    return true;
}"#;

const CLEAR_JS: &str = r#"(selector) => {
    const el = document.querySelector(selector);
    if (!el) return false;
    el.focus();
    el.value = '';
    el.dispatchEvent(new Event('input', { bubbles: true }));
    return true;
}"#;

/// Find the Chromium binary path.
pub fn find_chromium() -> Option<PathBuf> {
    // 1. SHOP_LEDGER_CHROMIUM_PATH env
    if let Ok(p) = std::env::var(CHROMIUM_PATH_ENV) {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. System PATH
    for name in ["google-chrome", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    // 3. Common macOS location
    if cfg!(target_os = "macos") {
        let common = PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// A single Chromium tab.
pub struct ChromiumDriver {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
    navigation_timeout: Duration,
}

impl ChromiumDriver {
    /// Launch Chromium and open a blank tab. Headless unless `headful`.
    pub async fn launch(headful: bool, navigation_timeout: Duration) -> Result<Self> {
        let chrome_path = find_chromium()
            .with_context(|| format!("Chromium not found. Install Chrome or set {CHROMIUM_PATH_ENV}."))?;

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .window_size(1440, 900);
        builder = if headful {
            builder.with_head()
        } else {
            builder.arg("--headless=new")
        };
        let config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch Chromium")?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("browser handler event error: {e}");
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .context("failed to create new page")?;

        tracing::info!(headful, "launched Chromium");
        Ok(Self {
            browser,
            page,
            handler,
            navigation_timeout,
        })
    }

    /// Close the browser and stop its event handler.
    pub async fn close(mut self) -> Result<()> {
        let _ = self.page.clone().close().await;
        self.browser.close().await.context("failed to close Chromium")?;
        let _ = self.browser.wait().await;
        self.handler.abort();
        Ok(())
    }

    async fn call<T: DeserializeOwned>(&self, function: &str, args: &[&str]) -> Result<T> {
        let args = args
            .iter()
            .map(|a| serde_json::to_string(a))
            .collect::<Result<Vec<_>, _>>()?
            .join(", ");
        let script = format!("({})({args})", function.replace("RENDERED", RENDERED));
        let result = self
            .page
            .evaluate(script)
            .await
            .context("JS execution failed")?;
        result
            .into_value()
            .map_err(|e| anyhow::anyhow!("failed to convert JS result: {e:?}"))
    }
}

#[async_trait]
impl PageDriver for ChromiumDriver {
    async fn goto(&mut self, url: &str) -> Result<()> {
        let timeout = self.navigation_timeout;
        match tokio::time::timeout(timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => {
                let _ = self.page.wait_for_navigation().await;
                tracing::debug!(url, "navigated");
                Ok(())
            }
            Ok(Err(e)) => bail!("navigation to {url} failed: {e}"),
            Err(_) => bail!("navigation to {url} timed out after {}ms", timeout.as_millis()),
        }
    }

    async fn title(&mut self) -> Result<String> {
        Ok(self
            .page
            .get_title()
            .await
            .context("failed to read title")?
            .unwrap_or_default())
    }

    async fn html(&mut self) -> Result<String> {
        let result = self
            .page
            .evaluate("document.documentElement.outerHTML")
            .await
            .context("failed to get HTML")?;

        result
            .into_value()
            .map_err(|e| anyhow::anyhow!("failed to convert HTML result: {e:?}"))
    }

    async fn exists(&mut self, selector: &str) -> Result<bool> {
        self.call(EXISTS_JS, &[selector]).await
    }

    async fn click(&mut self, selector: &str) -> Result<()> {
        if !self.call::<bool>(CLICK_JS, &[selector]).await? {
            bail!("no element to click for {selector}");
        }
        tracing::debug!(selector, "clicked");
        Ok(())
    }

    async fn click_text(&mut self, text: &str) -> Result<()> {
        if !self.call::<bool>(CLICK_TEXT_JS, &[text]).await? {
            bail!("no element showing \"{text}\"");
        }
        tracing::debug!(text, "clicked by text");
        Ok(())
    }

    async fn click_in_item(&mut self, scope: &str, item_text: &str, selector: &str) -> Result<()> {
        if !self
            .call::<bool>(CLICK_IN_ITEM_JS, &[scope, item_text, selector])
            .await?
        {
            bail!("no {selector} next to \"{item_text}\" in {scope}");
        }
        tracing::debug!(scope, item_text, selector, "clicked in item");
        Ok(())
    }

    async fn fill(&mut self, selector: &str, value: &str) -> Result<()> {
        if !self.call::<bool>(CLEAR_JS, &[selector]).await? {
            bail!("no input for {selector}");
        }
        self.page
            .find_element(selector)
            .await
            .with_context(|| format!("input {selector} disappeared"))?
            .click()
            .await?
            .type_str(value)
            .await
            .with_context(|| format!("failed to type into {selector}"))?;
        Ok(())
    }

    async fn press_enter(&mut self, selector: &str) -> Result<()> {
        self.page
            .find_element(selector)
            .await
            .with_context(|| format!("no input for {selector}"))?
            .press_key("Enter")
            .await
            .with_context(|| format!("failed to press Enter in {selector}"))?;
        Ok(())
    }

    async fn go_back(&mut self) -> Result<()> {
        self.page
            .evaluate("history.back()")
            .await
            .context("failed to go back")?;
        let _ = tokio::time::timeout(BACK_SETTLE, self.page.wait_for_navigation()).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Requires Chromium to be installed
    async fn test_chromium_drives_a_data_page() {
        let mut driver = ChromiumDriver::launch(false, Duration::from_secs(10))
            .await
            .expect("failed to launch Chromium");

        driver
            .goto("data:text/html,<title>Muffins</title><div><h6>Glazed</h6><p class='price'>€2,80</p><button onclick=\"this.textContent='done'\">Add</button></div>")
            .await
            .expect("navigation failed");

        assert_eq!(driver.title().await.unwrap(), "Muffins");
        assert!(driver.exists("p.price").await.unwrap());
        assert!(!driver.exists("p.missing").await.unwrap());

        driver
            .click_in_item(crate::driver::WHOLE_PAGE, "Glazed", "button")
            .await
            .unwrap();
        driver
            .wait_for_text("done", Duration::from_secs(2))
            .await
            .unwrap();

        driver.close().await.unwrap();
    }
}
