use std::time::Duration;

use anyhow::{Result, anyhow};

/// Process-wide configuration, read once at startup and immutable after.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub headless: bool,
    pub action_timeout: Duration,
    pub result_file: String,
}

impl Config {
    /// Load from the environment (plus `.env` if present).
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let api_key = std::env::var("WEBPILOT_API_KEY")
            .or_else(|_| std::env::var("DEEPSEEK_API_KEY"))
            .map_err(|_| anyhow!("WEBPILOT_API_KEY not set in environment"))?;

        let base_url = std::env::var("WEBPILOT_BASE_URL")
            .unwrap_or_else(|_| "https://api.deepseek.com".to_string());
        let model =
            std::env::var("WEBPILOT_MODEL").unwrap_or_else(|_| "deepseek-chat".to_string());

        let headless = std::env::var("WEBPILOT_HEADLESS")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let action_timeout = std::env::var("WEBPILOT_ACTION_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_millis(5000));

        let result_file = std::env::var("WEBPILOT_RESULT_FILE")
            .unwrap_or_else(|_| "experiment_results.csv".to_string());

        Ok(Self {
            api_key,
            base_url,
            model,
            headless,
            action_timeout,
            result_file,
        })
    }

    /// Chat-completions endpoint derived from the base URL.
    pub fn chat_endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}
