//! Browser control surface.
//!
//! `PageDriver` is the seam between the loop and the live page: the executor
//! and controller only talk to this trait, so a scripted in-memory page can
//! stand in during tests. `ChromePage` is the real implementation over a
//! `headless_chrome` tab.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use headless_chrome::Tab;
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;

use crate::labeler::{self, selector_for};

/// Page identity read alongside each observation. Degrades to `"Unknown"`
/// mid-navigation instead of failing the encode.
#[derive(Debug, Clone)]
pub struct PageIdentity {
    pub url: String,
    pub title: String,
}

#[allow(async_fn_in_trait)]
pub trait PageDriver {
    /// Run a batch of synchronous page calls. Drivers backed by a live
    /// browser move the batch to a blocking thread so protocol round-trips
    /// never stall the async runtime; the default runs it inline.
    async fn offload<F, T>(&self, f: F) -> T
    where
        Self: Sized,
        F: FnOnce(&Self) -> T + Send + 'static,
        T: Send + 'static,
    {
        f(self)
    }

    /// Run one labeling pass; returns the number of labeled elements.
    fn label(&self) -> Result<u32>;

    /// Rendered markup of the current page. Failing here means the page is
    /// unusable and the task cannot continue.
    fn content(&self) -> Result<String>;

    fn identity(&self) -> PageIdentity;

    /// Count of live elements bearing the given labeler id.
    fn matches(&self, id: &str) -> Result<u32>;

    fn click(&self, id: &str) -> Result<()>;

    fn fill(&self, id: &str, text: &str) -> Result<()>;

    /// Press a key on the labeled element if given, else on whatever
    /// currently holds focus.
    fn press(&self, id: Option<&str>, key: &str) -> Result<()>;

    /// Lowercased tag name of the labeled element.
    fn tag_of(&self, id: &str) -> Result<String>;

    fn navigate(&self, url: &str) -> Result<()>;

    fn scroll_by(&self, delta_y: i32) -> Result<()>;

    /// Dashboard collaborator only; the loop never consults pixels.
    fn screenshot(&self) -> Result<Vec<u8>>;
}

/// Live page driven over the DevTools protocol.
#[derive(Clone)]
pub struct ChromePage {
    tab: Arc<Tab>,
}

impl ChromePage {
    pub fn new(tab: Arc<Tab>, action_timeout: Duration) -> Self {
        tab.set_default_timeout(action_timeout);
        Self { tab }
    }

    fn eval_string(&self, expr: &str) -> Result<Option<String>> {
        let result = self.tab.evaluate(expr, false)?;
        Ok(result.value.and_then(|v| v.as_str().map(String::from)))
    }

    fn eval_u64(&self, expr: &str) -> Result<u64> {
        let result = self.tab.evaluate(expr, false)?;
        Ok(result.value.and_then(|v| v.as_u64()).unwrap_or(0))
    }
}

impl PageDriver for ChromePage {
    async fn offload<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&Self) -> T + Send + 'static,
        T: Send + 'static,
    {
        let page = self.clone();
        tokio::task::spawn_blocking(move || f(&page))
            .await
            .expect("blocking page task panicked")
    }

    fn label(&self) -> Result<u32> {
        let count = self.eval_u64(labeler::LABEL_JS)?;
        Ok(count as u32)
    }

    fn content(&self) -> Result<String> {
        Ok(self.tab.get_content()?)
    }

    fn identity(&self) -> PageIdentity {
        let url = self
            .eval_string("window.location.href")
            .ok()
            .flatten()
            .unwrap_or_else(|| "Unknown".to_string());
        let title = self
            .eval_string("document.title")
            .ok()
            .flatten()
            .unwrap_or_else(|| "Unknown".to_string());
        PageIdentity { url, title }
    }

    fn matches(&self, id: &str) -> Result<u32> {
        let selector = selector_for(id).replace('\'', "\\'");
        let count = self.eval_u64(&format!("document.querySelectorAll('{selector}').length"))?;
        Ok(count as u32)
    }

    fn click(&self, id: &str) -> Result<()> {
        let element = self.tab.find_element(&selector_for(id))?;
        element.click()?;
        Ok(())
    }

    fn fill(&self, id: &str, text: &str) -> Result<()> {
        let selector = selector_for(id);
        let element = self.tab.find_element(&selector)?;
        element.click()?;
        let js_sel = selector.replace('\'', "\\'");
        self.tab.evaluate(
            &format!("document.querySelector('{js_sel}').value = ''"),
            false,
        )?;
        self.tab.type_str(text)?;
        Ok(())
    }

    fn press(&self, id: Option<&str>, key: &str) -> Result<()> {
        if let Some(id) = id {
            let element = self.tab.find_element(&selector_for(id))?;
            element.focus()?;
        }
        self.tab.press_key(key)?;
        Ok(())
    }

    fn tag_of(&self, id: &str) -> Result<String> {
        let selector = selector_for(id).replace('\'', "\\'");
        self.eval_string(&format!(
            "document.querySelector('{selector}').tagName.toLowerCase()"
        ))?
        .ok_or_else(|| anyhow!("no tag name for element {id}"))
    }

    fn navigate(&self, url: &str) -> Result<()> {
        self.tab.navigate_to(url)?;
        self.tab.wait_for_element("body")?;
        Ok(())
    }

    fn scroll_by(&self, delta_y: i32) -> Result<()> {
        self.tab
            .evaluate(&format!("window.scrollBy(0, {delta_y})"), false)?;
        Ok(())
    }

    fn screenshot(&self) -> Result<Vec<u8>> {
        Ok(self
            .tab
            .capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true)?)
    }
}
