//! Browser session lifecycle. One session holds the Chrome process and the
//! current tab; each task gets a fresh tab so no two tasks share a page.

use std::ffi::OsStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use headless_chrome::{Browser, LaunchOptions, Tab};

use crate::page::ChromePage;

pub struct BrowserSession {
    browser: Browser,
    pub tab: Arc<Tab>,
}

impl BrowserSession {
    /// Attach to an already-running Chrome on the standard debug port if one
    /// exists, otherwise launch our own.
    pub fn launch(headless: bool) -> Result<Self> {
        if let Ok(browser) = Browser::connect("http://127.0.0.1:9222".to_string()) {
            eprintln!("[Session] attached to existing Chrome on port 9222");
            let tab = {
                let tabs_lock = browser.get_tabs();
                let tabs = tabs_lock.lock().unwrap();
                match tabs.first() {
                    Some(t) => t.clone(),
                    None => browser.new_tab()?,
                }
            };
            return Ok(Self {
                browser,
                tab,
            });
        }

        eprintln!("[Session] launching Chrome (headless: {headless})...");
        let options = LaunchOptions {
            headless,
            window_size: Some((1280, 800)),
            args: vec![
                OsStr::new("--no-first-run"),
                OsStr::new("--no-default-browser-check"),
                OsStr::new("--disable-blink-features=AutomationControlled"),
                OsStr::new("--disable-infobars"),
            ],
            idle_browser_timeout: Duration::from_secs(300),
            ..Default::default()
        };
        let browser = Browser::new(options)?;

        let tab = browser.new_tab()?;
        tab.navigate_to("about:blank")?;
        eprintln!("[Session] Chrome ready");

        Ok(Self {
            browser,
            tab,
        })
    }

    /// Open a fresh tab and make it current.
    pub fn new_tab(&mut self) -> Result<()> {
        self.tab = self.browser.new_tab()?;
        Ok(())
    }

    /// Page driver for the current tab.
    pub fn page(&self, action_timeout: Duration) -> ChromePage {
        ChromePage::new(self.tab.clone(), action_timeout)
    }
}
