//! Decision Oracle Client: turns an observation, the task goal, and the
//! last action's description into one validated `Decision`.
//!
//! Any transport or parse failure is absorbed here as a synthetic `finish`
//! decision with a diagnostic reasoning string, so the loop always receives
//! a well-formed decision and terminates cleanly instead of crashing.

use std::time::{Duration, Instant};

use anyhow::{Result, anyhow};
use reqwest::Client;
use serde_json::json;

use crate::config::Config;
use crate::types::{Decision, Observation};

/// A decision plus pass-through call metrics.
#[derive(Debug, Clone)]
pub struct OracleReply {
    pub decision: Decision,
    pub total_tokens: u64,
    pub latency: Duration,
}

/// The sole source of control-flow branching in the loop. Behind a trait so
/// a scripted stand-in can replace the language model in tests.
#[allow(async_fn_in_trait)]
pub trait DecisionOracle {
    async fn decide(&self, goal: &str, observation: &Observation, last_action: &str)
    -> OracleReply;
}

/// Oracle backed by an OpenAI-compatible chat-completions endpoint.
pub struct LlmOracle {
    client: Client,
    api_key: String,
    endpoint: String,
    model: String,
}

impl LlmOracle {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::new(),
            api_key: config.api_key.clone(),
            endpoint: config.chat_endpoint(),
            model: config.model.clone(),
        }
    }

    async fn request(&self, prompt: &str) -> Result<(Decision, u64)> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&json!({
                "model": self.model,
                "messages": [{"role": "user", "content": prompt}],
                "response_format": {"type": "json_object"},
                "temperature": 0.0,
            }))
            .send()
            .await?;

        let status = response.status();
        let body: serde_json::Value = response.json().await?;

        if !status.is_success() {
            let message = body["error"]["message"].as_str().unwrap_or("unknown API error");
            return Err(anyhow!("API error ({status}): {message}"));
        }

        let content = body["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| anyhow!("no content in oracle response: {body}"))?;

        let decision = parse_decision(content)?;
        let tokens = body["usage"]["total_tokens"].as_u64().unwrap_or(0);
        Ok((decision, tokens))
    }
}

impl DecisionOracle for LlmOracle {
    async fn decide(
        &self,
        goal: &str,
        observation: &Observation,
        last_action: &str,
    ) -> OracleReply {
        let prompt = build_prompt(goal, observation, last_action);
        let started = Instant::now();

        match self.request(&prompt).await {
            Ok((decision, total_tokens)) => OracleReply {
                decision,
                total_tokens,
                latency: started.elapsed(),
            },
            Err(e) => {
                eprintln!("[Oracle] request failed: {e:#}");
                OracleReply {
                    decision: Decision::finish_with(format!("Oracle failure: {e}")),
                    total_tokens: 0,
                    latency: started.elapsed(),
                }
            }
        }
    }
}

/// One prompt per step: page snapshot, goal, last action, and the behavioral
/// policy the oracle must follow.
pub fn build_prompt(goal: &str, observation: &Observation, last_action: &str) -> String {
    format!(
        r#"You are a general-purpose web agent operating a real browser.

Current page state:
===
{obs}===

Overall task: "{goal}"
Last action: "{last_action}"

Decision rules you must follow strictly:
1. Anti-loop: if the last action was "key Enter" or a click on a search control, and the current URL has already changed (for example to a /search or /result page), the search succeeded. Even if the task says "go to some site", do NOT goto back to a start page; look for the result on the current page instead.
2. Domain check: if the task targets a host like "movie.example.com" and the current URL is on "search.example.com", that is the same site; treat the navigation as already done and do not issue another goto.
3. Input check: if an input's CURRENT_VALUE already holds the intended text, do not type it again; press key Enter (or click the submit control) instead.
4. If no suitable target is visible, scroll before giving up.
5. When the task is accomplished, return finish.

Respond with a single JSON object:
{{
    "action": "click" | "type" | "key" | "scroll" | "goto" | "finish",
    "id": "target element id",
    "value": "text to type / key name / scroll direction / url",
    "reasoning": "why this step (e.g. URL changed, search succeeded, now locating the result...)"
}}"#,
        obs = observation.render(),
    )
}

/// Parse the oracle's raw reply into a `Decision`, tolerating markdown
/// fences around the JSON object.
pub fn parse_decision(content: &str) -> Result<Decision> {
    let cleaned = content
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    serde_json::from_str(cleaned)
        .map_err(|e| anyhow!("malformed oracle response: {e}; content: {cleaned}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Action;

    #[test]
    fn parses_fenced_json() {
        let d = parse_decision("```json\n{\"action\":\"goto\",\"value\":\"example.com\",\"reasoning\":\"start\"}\n```")
            .expect("fenced json parses");
        assert_eq!(d.action, Action::Goto);
        assert_eq!(d.value.as_deref(), Some("example.com"));
    }

    #[test]
    fn numeric_id_normalized_during_parse() {
        let d = parse_decision(r#"{"action":"click","id":7,"reasoning":"pick result"}"#)
            .expect("numeric id parses");
        assert_eq!(d.id.as_deref(), Some("7"));
    }

    #[test]
    fn garbage_is_an_error_not_a_panic() {
        assert!(parse_decision("sure, I'll click the button").is_err());
    }

    #[test]
    fn prompt_embeds_observation_goal_and_memory() {
        let observation = Observation {
            page_url: "https://www.example.com".into(),
            page_title: "Example".into(),
            elements: Vec::new(),
        };
        let prompt = build_prompt("find the pricing page", &observation, "Scrolled");
        assert!(prompt.contains("Page: https://www.example.com"));
        assert!(prompt.contains(r#"Overall task: "find the pricing page""#));
        assert!(prompt.contains(r#"Last action: "Scrolled""#));
        assert!(prompt.contains("Anti-loop"));
    }
}
