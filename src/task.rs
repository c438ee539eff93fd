//! Loop Controller: drives the perception-decision-action cycle for one task.
//!
//! Per step: re-label the page, encode an observation, ask the oracle, run
//! the action, remember its description. The single `last_action` string is
//! the only state carried between steps. Failures below the fatal tier are
//! absorbed by the component that produced them; the controller itself is a
//! flat iteration with no nested recovery branches.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use std::time::Duration;
use tokio::sync::broadcast;

use crate::executor::{self, FAILED_MARK, NOT_FOUND_MARK};
use crate::face::AgentEvent;
use crate::observe;
use crate::oracle::DecisionOracle;
use crate::page::PageDriver;
use crate::types::{Action, TaskResult, TaskSpec};

/// Pause after a labeling pass so freshly mirrored values settle.
const LABEL_SETTLE: Duration = Duration::from_millis(500);

/// Run one task to completion: `finish`, step-budget exhaustion, or a fatal
/// page failure. Steps are counted per decision obtained, so the finishing
/// decision counts as a step.
pub async fn run_task<P, O>(
    page: &P,
    oracle: &O,
    spec: &TaskSpec,
    events: &broadcast::Sender<AgentEvent>,
) -> TaskResult
where
    P: PageDriver,
    O: DecisionOracle,
{
    eprintln!("[Agent] starting task '{}': {}", spec.name, spec.goal);
    let mut result = TaskResult::new(spec.name.clone());

    if let Some(url) = spec.start_url.clone() {
        let shown = url.clone();
        if let Err(e) = page.offload(move |p| p.navigate(&url)).await {
            eprintln!("[Agent] warning: failed to open start page {shown}: {e:#}");
        }
    }

    let mut last_action = String::from("None (Start)");

    for step in 0..spec.max_steps {
        eprintln!("[Agent] step {} of {}", step + 1, spec.max_steps);

        if let Err(e) = page.offload(|p| p.label()).await {
            eprintln!("[Agent] warning: labeling pass failed: {e:#}");
        }
        tokio::time::sleep(LABEL_SETTLE).await;

        let (html, identity) = page.offload(|p| (p.content(), p.identity())).await;
        let html = match html {
            Ok(html) => html,
            Err(e) => {
                // No markup means no further decision can be grounded.
                let message = format!("page unavailable: {e:#}");
                eprintln!("[Agent] fatal: {message}");
                let _ = events.send(AgentEvent::TaskError {
                    message: message.clone(),
                });
                result.error = Some(message);
                return result;
            }
        };
        let (observation, stats) = observe::encode(&html, &identity.url, &identity.title);
        eprintln!(
            "[Agent] observed {} elements ({} bytes of markup)",
            stats.element_count, stats.raw_len
        );

        let _ = events.send(AgentEvent::Thinking);
        let reply = oracle.decide(&spec.goal, &observation, &last_action).await;
        result.steps_taken += 1;
        result.total_tokens += reply.total_tokens;
        result.total_latency_s += reply.latency.as_secs_f64();

        let decision = reply.decision;
        eprintln!("[Agent] decision: {}", decision.describe());
        eprintln!("[Agent] reasoning: {}", decision.reasoning);
        let _ = events.send(AgentEvent::Step {
            number: result.steps_taken,
            description: decision.describe(),
            reasoning: decision.reasoning.clone(),
        });

        if decision.action == Action::Finish {
            eprintln!("[Agent] task complete: {}", decision.reasoning);
            result.finished = true;
            let _ = events.send(AgentEvent::TaskComplete {
                summary: decision.reasoning.clone(),
            });
            return result;
        }

        let to_run = decision.clone();
        last_action = page
            .offload(move |p| executor::execute(p, &to_run))
            .await;
        if last_action == FAILED_MARK || last_action == NOT_FOUND_MARK {
            let _ = events.send(AgentEvent::StepError {
                message: format!("{last_action}: {}", decision.describe()),
            });
        }

        publish_screen(page, events).await;
        tokio::time::sleep(executor::settle_delay(decision.action)).await;
    }

    eprintln!("[Agent] step budget ({}) exhausted", spec.max_steps);
    let _ = events.send(AgentEvent::TaskError {
        message: format!("step budget ({}) exhausted", spec.max_steps),
    });
    result
}

/// Push a screenshot to the dashboard if anyone is watching. The loop never
/// consults pixels itself.
async fn publish_screen<P: PageDriver>(page: &P, events: &broadcast::Sender<AgentEvent>) {
    if events.receiver_count() == 0 {
        return;
    }
    match page.offload(|p| p.screenshot()).await {
        Ok(png) => {
            let _ = events.send(AgentEvent::Screen {
                png_base64: BASE64.encode(png),
            });
        }
        Err(e) => eprintln!("[Agent] screenshot failed: {e:#}"),
    }
}
