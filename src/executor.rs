//! Action Executor: maps one normalized decision onto browser effects.
//!
//! The machine is stateless per call; each action carries its own guards.
//! Failures stay contained here: a target that no longer resolves skips the
//! step, and an operation that throws is recorded as a failure marker. Both
//! surface to the oracle only through the next step's memory string.

use std::time::Duration;

use anyhow::{Result, anyhow, bail};

use crate::page::PageDriver;
use crate::types::{Action, Decision, SCROLL_STEP_PX};

/// Memory marker for a resolution miss (zero live matches).
pub const NOT_FOUND_MARK: &str = "Element not found";

/// Memory marker for an operation that threw or timed out.
pub const FAILED_MARK: &str = "Failed";

/// Execute one decision against the live page and describe what happened.
/// The returned string becomes the next step's `last_action` memory.
pub fn execute<P: PageDriver>(page: &P, decision: &Decision) -> String {
    match try_execute(page, decision) {
        Ok(description) => description,
        Err(e) => {
            eprintln!("[Executor] {} failed: {e:#}", decision.action);
            FAILED_MARK.to_string()
        }
    }
}

fn try_execute<P: PageDriver>(page: &P, decision: &Decision) -> Result<String> {
    match decision.action {
        // Honored by the controller before execution reaches here.
        Action::Finish => Ok("Finished".to_string()),

        Action::Goto => {
            let url = decision
                .value
                .as_deref()
                .ok_or_else(|| anyhow!("goto without a url"))?;
            let url = with_scheme(url);
            eprintln!("[Executor] navigating to {url}");
            page.navigate(&url)?;
            Ok(format!("Navigated to {url}"))
        }

        Action::Scroll => {
            page.scroll_by(scroll_delta(decision.value.as_deref()))?;
            Ok("Scrolled".to_string())
        }

        Action::Key => {
            let key = decision
                .value
                .as_deref()
                .ok_or_else(|| anyhow!("key without a key name"))?;
            // An unresolved target falls back to whatever holds focus.
            let target = match decision.id.as_deref() {
                Some(id) if page.matches(id)? > 0 => Some(id),
                _ => None,
            };
            page.press(target, key)?;
            Ok(format!("Pressed key {key}"))
        }

        Action::Click | Action::Type => {
            let Some(id) = decision.id.as_deref() else {
                bail!("{} without a target id", decision.action);
            };
            if page.matches(id)? == 0 {
                eprintln!("[Executor] element {id} not found, skipping step");
                return Ok(NOT_FOUND_MARK.to_string());
            }

            if decision.action == Action::Click {
                page.click(id)?;
                return Ok(format!("Clicked {id}"));
            }

            let text = decision.value.as_deref().unwrap_or("");
            let tag = page.tag_of(id)?;
            if tag == "input" || tag == "textarea" {
                page.fill(id, text)?;
                Ok(format!("Typed {text}"))
            } else {
                // Mis-classified target; treat it as actionable.
                page.click(id)?;
                Ok(format!("Clicked {id} (fallback)"))
            }
        }
    }
}

/// Settling delay taken after the action, compensating for asynchronous
/// page updates the executor cannot await deterministically.
pub fn settle_delay(action: Action) -> Duration {
    match action {
        Action::Finish => Duration::ZERO,
        Action::Goto | Action::Key => Duration::from_secs(3),
        Action::Click | Action::Type | Action::Scroll => Duration::from_secs(2),
    }
}

fn with_scheme(url: &str) -> String {
    if url.starts_with("http") {
        url.to_string()
    } else {
        format!("https://{url}")
    }
}

fn scroll_delta(value: Option<&str>) -> i32 {
    if value == Some("up") {
        -SCROLL_STEP_PX
    } else {
        SCROLL_STEP_PX
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::PageIdentity;
    use std::cell::RefCell;

    /// Records every page call; a configurable set of ids resolve.
    #[derive(Default)]
    struct RecordingPage {
        present: Vec<String>,
        input_ids: Vec<String>,
        calls: RefCell<Vec<String>>,
    }

    impl RecordingPage {
        fn log(&self, call: impl Into<String>) {
            self.calls.borrow_mut().push(call.into());
        }
    }

    impl PageDriver for RecordingPage {
        fn label(&self) -> Result<u32> {
            Ok(self.present.len() as u32)
        }
        fn content(&self) -> Result<String> {
            Ok(String::new())
        }
        fn identity(&self) -> PageIdentity {
            PageIdentity {
                url: "about:blank".into(),
                title: "Unknown".into(),
            }
        }
        fn matches(&self, id: &str) -> Result<u32> {
            Ok(self.present.iter().filter(|p| *p == id).count() as u32)
        }
        fn click(&self, id: &str) -> Result<()> {
            self.log(format!("click {id}"));
            Ok(())
        }
        fn fill(&self, id: &str, text: &str) -> Result<()> {
            self.log(format!("fill {id} {text}"));
            Ok(())
        }
        fn press(&self, id: Option<&str>, key: &str) -> Result<()> {
            self.log(format!("press {} {key}", id.unwrap_or("<focus>")));
            Ok(())
        }
        fn tag_of(&self, id: &str) -> Result<String> {
            Ok(if self.input_ids.iter().any(|i| i == id) {
                "input".into()
            } else {
                "a".into()
            })
        }
        fn navigate(&self, url: &str) -> Result<()> {
            if url.contains("unreachable") {
                bail!("net::ERR_NAME_NOT_RESOLVED");
            }
            self.log(format!("navigate {url}"));
            Ok(())
        }
        fn scroll_by(&self, delta_y: i32) -> Result<()> {
            self.log(format!("scroll {delta_y}"));
            Ok(())
        }
        fn screenshot(&self) -> Result<Vec<u8>> {
            Ok(Vec::new())
        }
    }

    fn decision(action: Action, id: Option<&str>, value: Option<&str>) -> Decision {
        Decision {
            action,
            id: id.map(String::from),
            value: value.map(String::from),
            reasoning: String::new(),
        }
    }

    #[test]
    fn goto_prefixes_missing_scheme() {
        let page = RecordingPage::default();
        let desc = execute(&page, &decision(Action::Goto, None, Some("example.com")));
        assert_eq!(desc, "Navigated to https://example.com");
        assert_eq!(page.calls.borrow()[0], "navigate https://example.com");
    }

    #[test]
    fn goto_failure_is_contained() {
        let page = RecordingPage::default();
        let desc = execute(&page, &decision(Action::Goto, None, Some("unreachable.test")));
        assert_eq!(desc, "Failed");
        assert_eq!(desc, FAILED_MARK);
    }

    #[test]
    fn scroll_direction_follows_value() {
        let page = RecordingPage::default();
        execute(&page, &decision(Action::Scroll, None, Some("up")));
        execute(&page, &decision(Action::Scroll, None, Some("down")));
        execute(&page, &decision(Action::Scroll, None, None));
        assert_eq!(
            *page.calls.borrow(),
            vec!["scroll -500", "scroll 500", "scroll 500"]
        );
    }

    #[test]
    fn unresolved_key_target_falls_back_to_focus() {
        let page = RecordingPage {
            present: vec!["3".into()],
            ..Default::default()
        };
        execute(&page, &decision(Action::Key, Some("3"), Some("Enter")));
        execute(&page, &decision(Action::Key, Some("99"), Some("Enter")));
        execute(&page, &decision(Action::Key, None, Some("Tab")));
        assert_eq!(
            *page.calls.borrow(),
            vec!["press 3 Enter", "press <focus> Enter", "press <focus> Tab"]
        );
    }

    #[test]
    fn click_on_missing_element_skips_without_error() {
        let page = RecordingPage::default();
        let desc = execute(&page, &decision(Action::Click, Some("5"), None));
        assert_eq!(desc, NOT_FOUND_MARK);
        assert!(page.calls.borrow().is_empty());
    }

    #[test]
    fn type_fills_inputs_and_clicks_everything_else() {
        let page = RecordingPage {
            present: vec!["1".into(), "2".into()],
            input_ids: vec!["1".into()],
            ..Default::default()
        };
        let typed = execute(&page, &decision(Action::Type, Some("1"), Some("DeepSeek")));
        assert_eq!(typed, "Typed DeepSeek");
        let fallback = execute(&page, &decision(Action::Type, Some("2"), Some("DeepSeek")));
        assert_eq!(fallback, "Clicked 2 (fallback)");
        assert_eq!(*page.calls.borrow(), vec!["fill 1 DeepSeek", "click 2"]);
    }

    #[test]
    fn finish_has_no_page_effect() {
        let page = RecordingPage::default();
        execute(&page, &decision(Action::Finish, None, None));
        assert!(page.calls.borrow().is_empty());
        assert_eq!(settle_delay(Action::Finish), Duration::ZERO);
    }
}
