use anyhow::{Result, anyhow};
use clap::Parser;
use tokio::sync::broadcast;

use webpilot::face::{self, AgentEvent};
use webpilot::types::DEFAULT_MAX_STEPS;
use webpilot::{BrowserSession, Config, LlmOracle, PageDriver, TaskSpec, run_task};

/// LLM-driven browser agent.
#[derive(Parser)]
#[command(name = "webpilot")]
struct Cli {
    /// Run a single task and exit instead of starting the dashboard
    #[arg(long)]
    goal: Option<String>,

    /// Starting URL for each task
    #[arg(long)]
    url: Option<String>,

    /// Step budget per task
    #[arg(long, default_value_t = DEFAULT_MAX_STEPS)]
    max_steps: usize,

    /// Run Chrome without a visible window
    #[arg(long)]
    headless: bool,

    /// Verify configuration and browser launch, then exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;
    let headless = cli.headless || config.headless;

    if cli.check {
        return preflight(&config, headless).await;
    }

    eprintln!("[Agent] launching Chrome...");
    let mut session = tokio::task::spawn_blocking(move || BrowserSession::launch(headless))
        .await
        .map_err(|e| anyhow!("browser launch panicked: {e}"))??;
    let oracle = LlmOracle::new(&config);

    if let Some(goal) = cli.goal {
        let (events, _) = broadcast::channel(8);
        let spec = TaskSpec {
            name: "cli".to_string(),
            goal,
            start_url: cli.url,
            max_steps: cli.max_steps,
        };
        let page = session.page(config.action_timeout);
        let result = run_task(&page, &oracle, &spec, &events).await;
        report(&result);
        return Ok(());
    }

    let (mut cmd_rx, event_tx) = face::start_server().await;
    eprintln!("[Agent] ready, waiting for commands...");

    while let Some(command) = cmd_rx.recv().await {
        eprintln!("[Agent] received command: '{command}'");
        // Each task runs in a fresh tab.
        if let Err(e) = session.new_tab() {
            eprintln!("[Agent] warning: failed to open new tab: {e:#}");
        }
        let spec = TaskSpec {
            name: "interactive".to_string(),
            goal: command,
            start_url: cli.url.clone(),
            max_steps: cli.max_steps,
        };
        let page = session.page(config.action_timeout);
        let result = run_task(&page, &oracle, &spec, &event_tx).await;
        report(&result);
        let _ = event_tx.send(AgentEvent::Ready);
    }

    Ok(())
}

fn report(result: &webpilot::TaskResult) {
    eprintln!(
        "[Agent] task '{}': finished={} steps={} tokens={} latency={:.1}s{}",
        result.task_name,
        result.finished,
        result.steps_taken,
        result.total_tokens,
        result.total_latency_s,
        result
            .error
            .as_deref()
            .map(|e| format!(" error={e}"))
            .unwrap_or_default(),
    );
}

/// Environment sanity check: config readable, browser launches, a page
/// identity can be read back.
async fn preflight(config: &Config, headless: bool) -> Result<()> {
    eprintln!("[Check] endpoint: {}", config.chat_endpoint());
    eprintln!("[Check] model: {}", config.model);
    eprintln!("[Check] api key present ({} chars)", config.api_key.len());

    let session = tokio::task::spawn_blocking(move || BrowserSession::launch(headless))
        .await
        .map_err(|e| anyhow!("browser launch panicked: {e}"))??;
    let page = session.page(config.action_timeout);
    let identity = page.identity();
    eprintln!("[Check] browser ok, current page: {}", identity.url);
    eprintln!("[Check] all good");
    Ok(())
}
