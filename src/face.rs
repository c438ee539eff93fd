//! Web dashboard: a localhost page that submits goals and streams agent
//! progress (and a live screenshot) back over SSE.
//!
//! The dashboard never touches the page itself. Commands flow to the agent
//! loop over a bounded mpsc channel with a single consumer, and events come
//! back over a broadcast channel, so the browser stays a single-writer
//! resource owned by the loop.

use std::convert::Infallible;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::response::Html;
use axum::response::sse::{Event, Sse};
use axum::routing::{get, post};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::{broadcast, mpsc};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;

/// Events streamed to the dashboard.
#[derive(Clone, Debug)]
pub enum AgentEvent {
    Thinking,
    Step {
        number: usize,
        description: String,
        reasoning: String,
    },
    StepError {
        message: String,
    },
    /// PNG of the page after the step, base64-encoded for the SSE payload.
    Screen {
        png_base64: String,
    },
    TaskComplete {
        summary: String,
    },
    TaskError {
        message: String,
    },
    Ready,
}

impl AgentEvent {
    fn to_sse_event(&self) -> Event {
        match self {
            AgentEvent::Thinking => Event::default().event("thinking").data("{}"),
            AgentEvent::Step {
                number,
                description,
                reasoning,
            } => Event::default().event("step").data(
                json!({"number": number, "description": description, "reasoning": reasoning})
                    .to_string(),
            ),
            AgentEvent::StepError { message } => Event::default()
                .event("step_error")
                .data(json!({"message": message}).to_string()),
            AgentEvent::Screen { png_base64 } => Event::default()
                .event("screen")
                .data(json!({"png": png_base64}).to_string()),
            AgentEvent::TaskComplete { summary } => Event::default()
                .event("task_complete")
                .data(json!({"summary": summary}).to_string()),
            AgentEvent::TaskError { message } => Event::default()
                .event("task_error")
                .data(json!({"message": message}).to_string()),
            AgentEvent::Ready => Event::default().event("ready").data("{}"),
        }
    }
}

#[derive(Clone)]
struct AppState {
    cmd_tx: mpsc::Sender<String>,
    event_tx: broadcast::Sender<AgentEvent>,
}

#[derive(Deserialize)]
struct CommandPayload {
    command: String,
}

/// Start the dashboard server. Returns the command receiver (single
/// consumer: the agent loop) and the event sender.
pub async fn start_server() -> (mpsc::Receiver<String>, broadcast::Sender<AgentEvent>) {
    let (cmd_tx, cmd_rx) = mpsc::channel::<String>(1);
    let (event_tx, _) = broadcast::channel::<AgentEvent>(64);

    let state = Arc::new(AppState {
        cmd_tx,
        event_tx: event_tx.clone(),
    });

    let app = Router::new()
        .route("/", get(index_handler))
        .route("/command", post(command_handler))
        .route("/events", get(sse_handler))
        .route(
            "/favicon.ico",
            get(|| async { axum::http::StatusCode::NO_CONTENT }),
        )
        .with_state(state);

    // Port 3000 may be held by a previous run; walk forward a few.
    let mut listener = None;
    let mut port = 3000;
    for p in 3000..3010 {
        match tokio::net::TcpListener::bind(format!("127.0.0.1:{p}")).await {
            Ok(l) => {
                listener = Some(l);
                port = p;
                break;
            }
            Err(_) => continue,
        }
    }
    let listener = listener.expect("could not bind any port in 3000-3009; kill the old agent first");

    eprintln!("[Web] dashboard running at http://localhost:{port}");

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            eprintln!("[Web] server stopped: {e:#}");
        }
    });

    (cmd_rx, event_tx)
}

async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn command_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CommandPayload>,
) -> &'static str {
    eprintln!("[Web] POST /command: {}", payload.command);
    let _ = state.cmd_tx.send(payload.command).await;
    "ok"
}

async fn sse_handler(
    State(state): State<Arc<AppState>>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let rx = state.event_tx.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(event) => Some(Ok::<_, Infallible>(event.to_sse_event())),
        Err(_) => None,
    });
    Sse::new(stream)
}

const INDEX_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<title>webpilot</title>
<style>
  * { margin: 0; padding: 0; box-sizing: border-box; }
  body { background: #0d1117; color: #c9d1d9; font-family: system-ui, sans-serif;
         height: 100vh; display: flex; flex-direction: column; }
  header { padding: 16px 24px; border-bottom: 1px solid #21262d; display: flex;
           align-items: center; gap: 10px; }
  header h1 { font-size: 18px; color: #f0f6fc; }
  .dot { width: 9px; height: 9px; border-radius: 50%; background: #3fb950; }
  .dot.busy { background: #d29922; }
  .panes { flex: 1; display: flex; min-height: 0; }
  .left { flex: 1; display: flex; flex-direction: column; padding: 16px; gap: 12px;
          border-right: 1px solid #21262d; }
  .right { flex: 1; padding: 16px; display: flex; align-items: flex-start;
           justify-content: center; overflow: auto; }
  #screen { max-width: 100%; border: 1px solid #21262d; border-radius: 6px; }
  #log { flex: 1; overflow-y: auto; display: flex; flex-direction: column; gap: 6px;
         font-size: 13px; }
  .entry { padding: 8px 12px; border-radius: 6px; background: #161b22;
           border-left: 3px solid #30363d; line-height: 1.4; }
  .entry.user { border-left-color: #a371f7; }
  .entry.step { border-left-color: #58a6ff; font-family: ui-monospace, monospace; }
  .entry.step .why { color: #8b949e; display: block; margin-top: 2px; }
  .entry.error { border-left-color: #f85149; color: #ffa198; }
  .entry.done { border-left-color: #3fb950; color: #7ee787; }
  .entry.thinking { border-left-color: #d29922; color: #e3b341; }
  form { display: flex; gap: 8px; }
  #goal { flex: 1; background: #0d1117; border: 1px solid #30363d; border-radius: 6px;
          padding: 10px 12px; color: #f0f6fc; font-size: 14px; outline: none; }
  #goal:focus { border-color: #58a6ff; }
  button { background: #238636; color: #fff; border: none; border-radius: 6px;
           padding: 10px 18px; font-size: 14px; font-weight: 600; cursor: pointer; }
  button:disabled { background: #30363d; cursor: not-allowed; }
</style>
</head>
<body>
  <header><div class="dot" id="dot"></div><h1>webpilot</h1></header>
  <div class="panes">
    <div class="left">
      <div id="log"></div>
      <form onsubmit="send(); return false;">
        <input id="goal" placeholder="Describe a task for the agent..." autofocus>
        <button id="run" type="submit">Run</button>
      </form>
    </div>
    <div class="right"><img id="screen" alt="page view"></div>
  </div>
<script>
  const log = document.getElementById('log');
  const goal = document.getElementById('goal');
  const run = document.getElementById('run');
  const dot = document.getElementById('dot');
  const screen = document.getElementById('screen');

  function entry(cls, html) {
    const div = document.createElement('div');
    div.className = 'entry ' + cls;
    div.innerHTML = html;
    log.appendChild(div);
    log.scrollTop = log.scrollHeight;
  }
  const esc = s => s.replace(/</g, '&lt;');
  function busy(b) {
    goal.disabled = b; run.disabled = b;
    dot.className = b ? 'dot busy' : 'dot';
    if (!b) goal.focus();
  }
  async function send() {
    const text = goal.value.trim();
    if (!text || goal.disabled) return;
    goal.value = '';
    entry('user', '<strong>Goal:</strong> ' + esc(text));
    busy(true);
    await fetch('/command', {
      method: 'POST',
      headers: {'Content-Type': 'application/json'},
      body: JSON.stringify({command: text}),
    });
  }

  const es = new EventSource('/events');
  es.addEventListener('thinking', () => entry('thinking', 'Thinking...'));
  es.addEventListener('step', e => {
    const d = JSON.parse(e.data);
    entry('step', 'Step ' + d.number + ': ' + esc(d.description)
      + '<span class="why">' + esc(d.reasoning) + '</span>');
  });
  es.addEventListener('step_error', e => {
    entry('error', esc(JSON.parse(e.data).message));
  });
  es.addEventListener('screen', e => {
    screen.src = 'data:image/png;base64,' + JSON.parse(e.data).png;
  });
  es.addEventListener('task_complete', e => {
    entry('done', '<strong>Done:</strong> ' + esc(JSON.parse(e.data).summary));
    busy(false);
  });
  es.addEventListener('task_error', e => {
    entry('error', '<strong>Task failed:</strong> ' + esc(JSON.parse(e.data).message));
    busy(false);
  });
  es.addEventListener('ready', () => busy(false));

  entry('done', 'Agent ready.');
</script>
</body>
</html>
"##;
