//! Shared helpers for vitrine-player integration tests
//!
//! - fake directory endpoints served by an in-process axum server
//! - directory payload builders
//! - session fixtures on the headless viewer

#![allow(dead_code)]

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use vitrine_common::config::PlaybackConfig;
use vitrine_common::events::{EventBus, ViewerEvent};
use vitrine_player::directory::ModelDirectory;
use vitrine_player::headless::HeadlessViewer;
use vitrine_player::platform::Platform;
use vitrine_player::{SessionContext, ViewerSession};

/// How a fake endpoint answers
#[derive(Clone)]
pub enum Reply {
    Json(Value),
    Status(u16),
    /// Answer with `Json` after a delay
    Slow(Duration, Value),
    /// 200 with a body that is not JSON
    Garbage,
}

struct EndpointState {
    reply: Reply,
    hits: AtomicUsize,
    ids: Mutex<Vec<String>>,
}

/// A running fake endpoint
pub struct FakeEndpoint {
    pub url: String,
    state: Arc<EndpointState>,
}

impl FakeEndpoint {
    pub fn hits(&self) -> usize {
        self.state.hits.load(Ordering::SeqCst)
    }

    /// Model ids received so far
    pub fn ids(&self) -> Vec<String> {
        self.state.ids.lock().unwrap().clone()
    }
}

async fn handle(State(state): State<Arc<EndpointState>>, Json(body): Json<Value>) -> axum::response::Response {
    use axum::response::IntoResponse;

    state.hits.fetch_add(1, Ordering::SeqCst);
    if let Some(id) = body["id"].as_str() {
        state.ids.lock().unwrap().push(id.to_string());
    }

    match state.reply.clone() {
        Reply::Json(value) => Json(value).into_response(),
        Reply::Status(code) => StatusCode::from_u16(code)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            .into_response(),
        Reply::Slow(delay, value) => {
            tokio::time::sleep(delay).await;
            Json(value).into_response()
        }
        Reply::Garbage => (StatusCode::OK, "<html>not json</html>").into_response(),
    }
}

/// Serve `reply` on an ephemeral port
pub async fn spawn_endpoint(reply: Reply) -> FakeEndpoint {
    let state = Arc::new(EndpointState {
        reply,
        hits: AtomicUsize::new(0),
        ids: Mutex::new(Vec::new()),
    });
    let app = Router::new()
        .route("/webhook", post(handle))
        .with_state(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    FakeEndpoint {
        url: format!("http://{}/webhook", addr),
        state,
    }
}

/// Record object with a one-row KPI table
pub fn record(name: &str, url: &str) -> Value {
    json!({
        "name": name,
        "fileUrl": url,
        "kpi": { "rows": [["GFZ", 1.2], ["BGF", 1500, "m²"], ["Kosten Gesamt", 2500000, "€"]] }
    })
}

/// Record object without KPI rows
pub fn record_without_kpi(name: &str, url: &str) -> Value {
    json!({ "name": name, "fileUrl": url, "kpi": { "rows": [] } })
}

/// Webhook shape: one-element array wrapping a keyed object of JSON strings
pub fn webhook_payload(records: &[Value]) -> Value {
    let mut keyed = serde_json::Map::new();
    for (i, record) in records.iter().enumerate() {
        keyed.insert(format!("model-{}.glb", i), Value::String(record.to_string()));
    }
    json!([Value::Object(keyed)])
}

pub fn directory(records: &[Value]) -> ModelDirectory {
    ModelDirectory::from_raw(&webhook_payload(records)).expect("test directory must not be empty")
}

/// `count` models named M0.. with content m0.glb..
pub fn models(count: usize) -> Vec<Value> {
    (0..count)
        .map(|i| record(&format!("M{}", i), &format!("m{}.glb", i)))
        .collect()
}

pub struct Fixture {
    pub ctx: Arc<SessionContext>,
    pub viewer: Arc<HeadlessViewer>,
    pub session: ViewerSession,
    pub events: broadcast::Receiver<ViewerEvent>,
}

/// Session on a headless viewer that reports loads after 10ms
pub fn start_session(records: &[Value], playback: PlaybackConfig) -> Fixture {
    let ctx = Arc::new(SessionContext::new(EventBus::new(1024)));
    let events = ctx.events().subscribe();
    let viewer = Arc::new(HeadlessViewer::new(Duration::from_millis(10)));
    let session = ViewerSession::start(
        Arc::clone(&ctx),
        directory(records),
        viewer.clone(),
        None,
        Platform::Other,
        &playback,
    )
    .expect("session should start");

    Fixture {
        ctx,
        viewer,
        session,
        events,
    }
}

/// Wait (in virtual or real time) for the first event matching `pred`
pub async fn wait_for_event<F>(rx: &mut broadcast::Receiver<ViewerEvent>, mut pred: F) -> ViewerEvent
where
    F: FnMut(&ViewerEvent) -> bool,
{
    let wait = async {
        loop {
            match rx.recv().await {
                Ok(event) if pred(&event) => return event,
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("event bus closed"),
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(60), wait)
        .await
        .expect("timed out waiting for event")
}

pub async fn wait_for_display(rx: &mut broadcast::Receiver<ViewerEvent>, index: usize) -> ViewerEvent {
    wait_for_event(rx, |e| matches!(e, ViewerEvent::ModelDisplayed { index: i, .. } if *i == index)).await
}
