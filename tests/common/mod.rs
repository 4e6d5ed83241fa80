//! In-process agent backend for integration tests
//!
//! Answers like the real control server: 400 with a JSON ack for
//! rejected actions, `no_change` for a redundant pause toggle, plain
//! text for the log. Every request is recorded for assertions.

#![allow(dead_code)]

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use steer::HttpAgentApi;

#[derive(Debug, Default)]
pub struct Backend {
    pub running: bool,
    pub paused: bool,
    pub goal: String,
    pub log: String,
    pub corrections: Vec<String>,
    /// `(path, body)` for every POST
    pub posts: Vec<(String, Value)>,
    /// `_` query parameter of every log fetch
    pub log_nonces: Vec<String>,
}

pub type Shared = Arc<Mutex<Backend>>;

type Reply = (StatusCode, Json<Value>);

fn ok(message: &str) -> Reply {
    (StatusCode::OK, Json(json!({"status": "success", "message": message})))
}

fn reject(message: &str) -> Reply {
    (StatusCode::BAD_REQUEST, Json(json!({"status": "error", "message": message})))
}

fn text_field(body: &Value, key: &str) -> String {
    body.get(key).and_then(Value::as_str).unwrap_or_default().to_string()
}

async fn get_tools() -> Json<Value> {
    Json(json!({
        "web": {
            "title": "Web",
            "tools": [
                {"name": "Fetch", "data": {"url": "x.com"}},
                {"name": "Search", "data": {"query": "", "limit": 5}}
            ]
        },
        "msg": {
            "title": "Messaging",
            "tools": [{"name": "Notify", "data": {}}]
        }
    }))
}

async fn status(State(s): State<Shared>) -> Json<Value> {
    let running = s.lock().unwrap().running;
    Json(json!({"is_running": running}))
}

async fn log(State(s): State<Shared>, Query(q): Query<HashMap<String, String>>) -> String {
    let mut b = s.lock().unwrap();
    if let Some(nonce) = q.get("_") {
        b.log_nonces.push(nonce.clone());
    }
    b.log.clone()
}

async fn start(State(s): State<Shared>, Json(body): Json<Value>) -> Reply {
    let mut b = s.lock().unwrap();
    b.posts.push(("/start".into(), body.clone()));
    if b.running {
        return reject("Agent is already running.");
    }
    let goal = text_field(&body, "goal");
    if goal.is_empty() {
        return reject("Goal cannot be empty.");
    }
    b.running = true;
    b.paused = false;
    b.goal = goal;
    ok("Agent started.")
}

async fn stop(State(s): State<Shared>) -> Reply {
    let mut b = s.lock().unwrap();
    b.posts.push(("/stop".into(), Value::Null));
    if !b.running {
        return reject("Agent is not running.");
    }
    b.running = false;
    b.paused = false;
    ok("Agent stopped.")
}

async fn pause(State(s): State<Shared>, Json(body): Json<Value>) -> Reply {
    let mut b = s.lock().unwrap();
    b.posts.push(("/pause".into(), body.clone()));
    let want = body.get("pause").and_then(Value::as_bool).unwrap_or(true);
    if want == b.paused {
        return (StatusCode::OK, Json(json!({"status": "no_change"})));
    }
    b.paused = want;
    ok(if want { "Agent paused." } else { "Agent resumed." })
}

async fn update_goal(State(s): State<Shared>, Json(body): Json<Value>) -> Reply {
    let mut b = s.lock().unwrap();
    b.posts.push(("/update_goal".into(), body.clone()));
    let goal = text_field(&body, "goal");
    if goal.is_empty() {
        return reject("Goal cannot be empty.");
    }
    b.goal = goal;
    ok("Goal updated.")
}

async fn submit_correction(State(s): State<Shared>, Json(body): Json<Value>) -> Reply {
    let mut b = s.lock().unwrap();
    b.posts.push(("/submit_correction".into(), body.clone()));
    let correction = text_field(&body, "correction");
    if correction.is_empty() {
        return reject("Correction cannot be empty.");
    }
    b.corrections.push(correction);
    ok("Correction submitted.")
}

pub fn router(state: Shared) -> Router {
    Router::new()
        .route("/get_tools", get(get_tools))
        .route("/status", get(status))
        .route("/log", get(log))
        .route("/start", post(start))
        .route("/stop", post(stop))
        .route("/pause", post(pause))
        .route("/update_goal", post(update_goal))
        .route("/submit_correction", post(submit_correction))
        .with_state(state)
}

/// Serve a fresh backend on an ephemeral port
pub async fn spawn_backend() -> (String, Shared) {
    let state: Shared = Arc::new(Mutex::new(Backend::default()));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = router(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), state)
}

pub fn client(base: &str) -> HttpAgentApi {
    HttpAgentApi::new(base, Duration::from_secs(5)).unwrap()
}

/// Base URL nothing listens on
pub async fn dead_server() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}
