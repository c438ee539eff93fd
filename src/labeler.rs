//! Element labeling contract: the script injected into the live page before
//! every observation, and the selector syntax used to address its ids.
//!
//! Ids are reassigned from zero on every pass in document order, so they are
//! only valid for the step that produced them. Callers re-run the pass
//! immediately before each observation and never cache an id.

/// Attribute carrying the pass-scoped element id.
pub const ID_ATTR: &str = "data-agent-id";

/// Labeling pass, evaluated against the current page.
///
/// 1. Selects interactive and navigation-target elements.
/// 2. Keeps only elements with a non-zero rendered box and visible style.
/// 3. Assigns sequential `data-agent-id` values starting at 0.
/// 4. Mirrors live input values into the `value` attribute so the encoder
///    can read them from markup without running further script.
/// 5. Returns the number of labeled elements.
///
/// The red border and `title` marker make the pass visible in headed runs.
pub const LABEL_JS: &str = r#"
(() => {
  let counter = 0;
  document.querySelectorAll('a[target="_blank"]').forEach(el => el.removeAttribute('target'));
  const candidates = document.querySelectorAll(
    'a, button, input, textarea, select, [role="button"], [role="link"], h3, span, div[role="textbox"]'
  );
  candidates.forEach(el => {
    const rect = el.getBoundingClientRect();
    const style = window.getComputedStyle(el);
    if (rect.width > 0 && rect.height > 0 && style.visibility !== 'hidden' && style.display !== 'none') {
      el.setAttribute('data-agent-id', counter.toString());
      if (el.tagName === 'INPUT' || el.tagName === 'TEXTAREA') {
        el.setAttribute('value', el.value);
      }
      el.style.border = '2px solid red';
      el.setAttribute('title', 'ID: ' + counter);
      counter++;
    }
  });
  return counter;
})()
"#;

/// CSS selector addressing the element labeled `id` in the current pass.
pub fn selector_for(id: &str) -> String {
    let escaped = id.replace('\\', "\\\\").replace('"', "\\\"");
    format!("[{ID_ATTR}=\"{escaped}\"]")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_targets_id_attribute() {
        assert_eq!(selector_for("3"), r#"[data-agent-id="3"]"#);
    }

    #[test]
    fn selector_escapes_quotes() {
        assert_eq!(selector_for(r#"a"b"#), r#"[data-agent-id="a\"b"]"#);
    }
}
