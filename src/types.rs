use serde::{Deserialize, Deserializer, Serialize};

/// Fixed viewport scroll magnitude in pixels.
pub const SCROLL_STEP_PX: i32 = 500;

/// Visible-text truncation applied per element during encoding.
pub const ELEMENT_TEXT_MAX_CHARS: usize = 50;

pub const DEFAULT_MAX_STEPS: usize = 20;

/// The action vocabulary the oracle may choose from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Click,
    Type,
    Key,
    Scroll,
    Goto,
    Finish,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Action::Click => "click",
            Action::Type => "type",
            Action::Key => "key",
            Action::Scroll => "scroll",
            Action::Goto => "goto",
            Action::Finish => "finish",
        };
        f.write_str(s)
    }
}

/// One normalized decision from the oracle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub action: Action,
    /// Labeler-assigned element id, valid only for the current step.
    #[serde(default, deserialize_with = "id_as_string")]
    pub id: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub reasoning: String,
}

impl Decision {
    /// Synthetic terminal decision substituted when the oracle cannot answer.
    pub fn finish_with(reasoning: impl Into<String>) -> Self {
        Self {
            action: Action::Finish,
            id: None,
            value: None,
            reasoning: reasoning.into(),
        }
    }

    /// Short form used as the next step's `last_action` memory.
    pub fn describe(&self) -> String {
        format!(
            "{} {} val={}",
            self.action,
            self.id.as_deref().unwrap_or("-"),
            self.value.as_deref().unwrap_or("-"),
        )
    }
}

/// Oracles sometimes return the element id as a bare number; ids are
/// compared as strings everywhere downstream.
fn id_as_string<'de, D>(de: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(de)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        Some(other) => Some(other.to_string()),
    })
}

/// Coarse classification of a labeled element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Input,
    Actionable,
    Unknown,
}

impl std::fmt::Display for ElementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ElementKind::Input => "input",
            ElementKind::Actionable => "actionable",
            ElementKind::Unknown => "unknown",
        })
    }
}

/// One labeled element as seen by the oracle. Produced fresh each pass,
/// never mutated, discarded after encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementDescriptor {
    pub id: String,
    pub kind: ElementKind,
    pub tag: String,
    pub text: String,
    pub current_value: Option<String>,
    pub placeholder: Option<String>,
    pub aria_label: Option<String>,
}

/// Immutable snapshot of labeled page state; lives for one decision request.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub page_url: String,
    pub page_title: String,
    pub elements: Vec<ElementDescriptor>,
}

impl Observation {
    /// Line-oriented text form embedded into the oracle prompt. The header
    /// anchors the oracle against stale-goal navigation; element order is
    /// document order.
    pub fn render(&self) -> String {
        let mut out = format!("Page: {}\nTitle: {}\n", self.page_url, self.page_title);
        for el in &self.elements {
            out.push_str(&format!("ID: {} | {} | <{}", el.id, el.kind, el.tag));
            if !el.text.is_empty() {
                out.push_str(&format!(" Text='{}'", el.text));
            }
            if let Some(v) = &el.current_value {
                if !v.is_empty() {
                    out.push_str(&format!(" CURRENT_VALUE='{v}'"));
                }
            }
            if let Some(p) = &el.placeholder {
                if !p.is_empty() {
                    out.push_str(&format!(" Placeholder='{p}'"));
                }
            }
            if let Some(a) = &el.aria_label {
                if !a.is_empty() {
                    out.push_str(&format!(" Label='{a}'"));
                }
            }
            out.push_str(">\n");
        }
        out
    }
}

/// What to attempt: a goal, an optional starting page, and a step budget.
#[derive(Debug, Clone)]
pub struct TaskSpec {
    pub name: String,
    pub goal: String,
    pub start_url: Option<String>,
    pub max_steps: usize,
}

/// Outcome of one task run. Token and latency totals are pass-through
/// metrics for callers, never control inputs.
#[derive(Debug, Clone, Serialize)]
pub struct TaskResult {
    pub task_name: String,
    pub finished: bool,
    pub steps_taken: usize,
    pub total_tokens: u64,
    pub total_latency_s: f64,
    pub error: Option<String>,
}

impl TaskResult {
    pub fn new(task_name: impl Into<String>) -> Self {
        Self {
            task_name: task_name.into(),
            finished: false,
            steps_taken: 0,
            total_tokens: 0,
            total_latency_s: 0.0,
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_id_is_coerced_to_string() {
        let d: Decision = serde_json::from_str(r#"{"action":"click","id":7,"reasoning":"r"}"#)
            .expect("decision parses");
        assert_eq!(d.id.as_deref(), Some("7"));
        assert_eq!(d.action, Action::Click);
    }

    #[test]
    fn string_id_passes_through() {
        let d: Decision =
            serde_json::from_str(r#"{"action":"type","id":"3","value":"DeepSeek","reasoning":""}"#)
                .expect("decision parses");
        assert_eq!(d.id.as_deref(), Some("3"));
        assert_eq!(d.value.as_deref(), Some("DeepSeek"));
    }

    #[test]
    fn missing_optional_fields_default() {
        let d: Decision = serde_json::from_str(r#"{"action":"scroll"}"#).expect("decision parses");
        assert_eq!(d.action, Action::Scroll);
        assert!(d.id.is_none());
        assert!(d.value.is_none());
        assert!(d.reasoning.is_empty());
    }

    #[test]
    fn describe_is_compact() {
        let d: Decision =
            serde_json::from_str(r#"{"action":"key","id":"3","value":"Enter","reasoning":"go"}"#)
                .expect("decision parses");
        assert_eq!(d.describe(), "key 3 val=Enter");
    }
}
