//! Experiment harness: runs a fixed task set through the agent loop and
//! appends per-task metrics to a CSV results file.

use anyhow::{Result, anyhow};
use tokio::sync::broadcast;

use webpilot::{BrowserSession, Config, LlmOracle, PageDriver, TaskResult, TaskSpec, run_task};

fn tasks() -> Vec<TaskSpec> {
    vec![
        TaskSpec {
            name: "Shopping Demo (Login & Add Cart)".to_string(),
            start_url: Some("https://www.saucedemo.com/".to_string()),
            goal: "1. Log in (username: standard_user, password: secret_sauce). \
                   2. Find 'Sauce Labs Backpack' and click 'Add to cart'. \
                   3. Click the cart icon in the top right corner."
                .to_string(),
            max_steps: 8,
        },
        TaskSpec {
            name: "Douban Movie Search".to_string(),
            start_url: Some("https://movie.douban.com/".to_string()),
            goal: "Type 'The Shawshank Redemption' into the search box and press Enter. \
                   On the results page, click the first movie title (the one with a poster)."
                .to_string(),
            max_steps: 6,
        },
        // A simple one as a baseline.
        TaskSpec {
            name: "Baidu Search".to_string(),
            start_url: Some("https://www.baidu.com".to_string()),
            goal: "Type 'DeepSeek' into the search box, then press Enter".to_string(),
            max_steps: 4,
        },
    ]
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    let headless = config.headless;

    eprintln!("[Experiment] launching Chrome...");
    let mut session = tokio::task::spawn_blocking(move || BrowserSession::launch(headless))
        .await
        .map_err(|e| anyhow!("browser launch panicked: {e}"))??;
    let oracle = LlmOracle::new(&config);

    // No dashboard here; events go nowhere.
    let (events, _) = broadcast::channel(8);

    let mut results = Vec::new();
    for spec in tasks() {
        if let Err(e) = session.new_tab() {
            eprintln!("[Experiment] warning: failed to open new tab: {e:#}");
        }
        let page = session.page(config.action_timeout);

        // A task whose start page will not load is skipped, not recorded.
        if let Some(url) = spec.start_url.clone() {
            if !open_start_page(&page, url).await {
                continue;
            }
        }
        let spec = TaskSpec {
            start_url: None,
            ..spec
        };

        let result = run_task(&page, &oracle, &spec, &events).await;
        eprintln!(
            "[Experiment] '{}': finished={} steps={} tokens={} latency={:.1}s",
            result.task_name,
            result.finished,
            result.steps_taken,
            result.total_tokens,
            result.total_latency_s,
        );
        results.push(result);
    }

    write_results(&config.result_file, &results)?;
    eprintln!("[Experiment] results saved to {}", config.result_file);
    Ok(())
}

async fn open_start_page<P: PageDriver>(page: &P, url: String) -> bool {
    let shown = url.clone();
    match page.offload(move |p| p.navigate(&url)).await {
        Ok(()) => true,
        Err(e) => {
            eprintln!("[Experiment] failed to load {shown}: {e:#}; skipping task");
            false
        }
    }
}

fn write_results(path: &str, results: &[TaskResult]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for result in results {
        writer.serialize(result)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use webpilot::PageIdentity;

    struct StubPage {
        reachable: bool,
    }

    impl PageDriver for StubPage {
        fn label(&self) -> Result<u32> {
            Ok(0)
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
        fn matches(&self, _id: &str) -> Result<u32> {
            Ok(0)
        }
        fn click(&self, _id: &str) -> Result<()> {
            Ok(())
        }
        fn fill(&self, _id: &str, _text: &str) -> Result<()> {
            Ok(())
        }
        fn press(&self, _id: Option<&str>, _key: &str) -> Result<()> {
            Ok(())
        }
        fn tag_of(&self, _id: &str) -> Result<String> {
            Ok("a".into())
        }
        fn navigate(&self, _url: &str) -> Result<()> {
            if self.reachable {
                Ok(())
            } else {
                bail!("net::ERR_NAME_NOT_RESOLVED")
            }
        }
        fn scroll_by(&self, _delta_y: i32) -> Result<()> {
            Ok(())
        }
        fn screenshot(&self) -> Result<Vec<u8>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn unreachable_start_page_skips_the_task() {
        let down = StubPage { reachable: false };
        assert!(!open_start_page(&down, "https://down.example.com".into()).await);

        let up = StubPage { reachable: true };
        assert!(open_start_page(&up, "https://up.example.com".into()).await);
    }
}
