//! In-memory backend for unit tests. Mirrors the real backend's answers
//! (already running, not running, empty goal) and records every call.

use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use crate::api::{Ack, AgentApi, ApiError, StatusReport};
use crate::catalog::ToolCatalog;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    GetTools,
    Status,
    Log,
    Start(String),
    Stop,
    UpdateGoal(String),
    Pause(bool),
    Correction(String),
}

#[derive(Debug, Clone, Copy)]
pub enum Failure {
    Transport,
    Reject(&'static str),
}

#[derive(Default)]
pub struct FakeApi {
    calls: Mutex<Vec<Call>>,
    running: Mutex<bool>,
    log: Mutex<String>,
    failures: Mutex<HashMap<&'static str, Failure>>,
    /// Status call number (1-based) -> how long its answer takes
    slow_status: Mutex<HashMap<usize, Duration>>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn set_running(&self, running: bool) {
        *self.running.lock().unwrap() = running;
    }

    pub fn is_running(&self) -> bool {
        *self.running.lock().unwrap()
    }

    pub fn set_log(&self, text: &str) {
        *self.log.lock().unwrap() = text.to_string();
    }

    pub fn fail(&self, endpoint: &'static str, failure: Failure) {
        self.failures.lock().unwrap().insert(endpoint, failure);
    }

    /// Answer the `nth` status call late, with the state seen when it was made
    pub fn slow_status(&self, nth: usize, delay: Duration) {
        self.slow_status.lock().unwrap().insert(nth, delay);
    }

    pub fn heal(&self, endpoint: &'static str) {
        self.failures.lock().unwrap().remove(endpoint);
    }

    fn record(&self, endpoint: &'static str, call: Call) -> Result<(), ApiError> {
        self.calls.lock().unwrap().push(call);
        match self.failures.lock().unwrap().get(endpoint) {
            None => Ok(()),
            Some(Failure::Transport) => Err(ApiError::Decode("connection refused".into())),
            Some(Failure::Reject(msg)) => Err(ApiError::Rejected {
                status: "error".into(),
                message: msg.to_string(),
            }),
        }
    }
}

fn reject(msg: &str) -> ApiError {
    ApiError::Rejected {
        status: "error".into(),
        message: msg.into(),
    }
}

#[async_trait]
impl AgentApi for FakeApi {
    async fn get_tools(&self) -> Result<ToolCatalog, ApiError> {
        self.record("get_tools", Call::GetTools)?;
        ToolCatalog::from_json(&json!({
            "web": {"title": "Web", "tools": [{"name": "Fetch", "data": {"url": "x.com"}}]}
        }))
        .map_err(|e| ApiError::Decode(e.to_string()))
    }

    async fn status(&self) -> Result<StatusReport, ApiError> {
        self.record("status", Call::Status)?;
        let report = StatusReport { is_running: self.is_running() };
        let nth = self.calls().iter().filter(|c| **c == Call::Status).count();
        let delay = self.slow_status.lock().unwrap().get(&nth).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(report)
    }

    async fn log(&self) -> Result<String, ApiError> {
        self.record("log", Call::Log)?;
        Ok(self.log.lock().unwrap().clone())
    }

    async fn start(&self, goal: &str) -> Result<Ack, ApiError> {
        self.record("start", Call::Start(goal.into()))?;
        if self.is_running() {
            return Err(reject("Agent is already running."));
        }
        if goal.is_empty() {
            return Err(reject("Goal cannot be empty."));
        }
        self.set_running(true);
        Ok(Ack::success("Agent started."))
    }

    async fn stop(&self) -> Result<Ack, ApiError> {
        self.record("stop", Call::Stop)?;
        if !self.is_running() {
            return Err(reject("Agent is not running."));
        }
        self.set_running(false);
        Ok(Ack::success("Agent stopped."))
    }

    async fn update_goal(&self, goal: &str) -> Result<Ack, ApiError> {
        self.record("update_goal", Call::UpdateGoal(goal.into()))?;
        if goal.is_empty() {
            return Err(reject("Goal cannot be empty."));
        }
        Ok(Ack::success("Goal updated."))
    }

    async fn pause(&self, pause: bool) -> Result<Ack, ApiError> {
        self.record("pause", Call::Pause(pause))?;
        Ok(Ack::success(if pause { "Agent paused." } else { "Agent resumed." }))
    }

    async fn submit_correction(&self, correction: &str) -> Result<Ack, ApiError> {
        self.record("submit_correction", Call::Correction(correction.into()))?;
        Ok(Ack::success("Correction submitted."))
    }
}
