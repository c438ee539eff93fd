//! Observation Encoder: flattens a labeled page into the line-oriented
//! snapshot handed to the oracle.
//!
//! Encoding is a pure function of (markup, page identity). It performs no
//! network or mutation side effects, so identical input always yields an
//! identical `Observation`.

use scraper::{Html, Selector};

use crate::labeler::ID_ATTR;
use crate::types::{ELEMENT_TEXT_MAX_CHARS, ElementDescriptor, ElementKind, Observation};

/// Diagnostics for token budgeting by the caller; never used in control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeStats {
    pub raw_len: usize,
    pub element_count: usize,
}

/// Encode labeled markup plus page identity into an `Observation`.
///
/// Elements appear in document order. A non-input element that carries no
/// text, value, placeholder, or label is dropped as noise; input-like
/// elements are always kept because their emptiness is itself
/// decision-relevant.
pub fn encode(html: &str, page_url: &str, page_title: &str) -> (Observation, EncodeStats) {
    let raw_len = html.len();
    let mut elements = Vec::new();

    let doc = Html::parse_document(html);
    let labeled_selector = format!("[{ID_ATTR}]");
    if let Ok(labeled) = Selector::parse(&labeled_selector) {
        for node in doc.select(&labeled) {
            let Some(id) = node.value().attr(ID_ATTR) else {
                continue;
            };

            let tag = node.value().name().to_ascii_lowercase();
            let role = node.value().attr("role").unwrap_or("");
            let kind = classify(&tag, role);

            let text: String = node
                .text()
                .collect::<String>()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
                .chars()
                .take(ELEMENT_TEXT_MAX_CHARS)
                .collect();

            let current_value = node.value().attr("value").map(str::to_string);
            let placeholder = node.value().attr("placeholder").map(str::to_string);
            let aria_label = hint_label(&node);

            let has_info = !text.is_empty()
                || current_value.as_deref().is_some_and(|v| !v.is_empty())
                || placeholder.as_deref().is_some_and(|p| !p.is_empty())
                || aria_label.as_deref().is_some_and(|a| !a.is_empty());
            if !has_info && kind != ElementKind::Input {
                continue;
            }

            elements.push(ElementDescriptor {
                id: id.to_string(),
                kind,
                tag,
                text,
                current_value,
                placeholder,
                aria_label,
            });
        }
    }

    let stats = EncodeStats {
        raw_len,
        element_count: elements.len(),
    };
    let observation = Observation {
        page_url: page_url.to_string(),
        page_title: page_title.to_string(),
        elements,
    };
    (observation, stats)
}

fn classify(tag: &str, role: &str) -> ElementKind {
    if tag == "input" || tag == "textarea" || role == "textbox" {
        ElementKind::Input
    } else if matches!(tag, "a" | "button" | "select") || matches!(role, "button" | "link") {
        ElementKind::Actionable
    } else {
        ElementKind::Unknown
    }
}

/// aria-label, falling back to title. The labeler writes its own
/// `title="ID: n"` marker on every element it labels; that marker is not a
/// hint, so it is filtered out here.
fn hint_label(node: &scraper::ElementRef<'_>) -> Option<String> {
    if let Some(aria) = node.value().attr("aria-label") {
        if !aria.is_empty() {
            return Some(aria.to_string());
        }
    }
    node.value()
        .attr("title")
        .filter(|t| !t.is_empty() && !t.starts_with("ID: "))
        .map(str::to_string)
}
