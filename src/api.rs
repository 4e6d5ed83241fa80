//! Agent backend client
//!
//! [`AgentApi`] is the seam between the console and the remote agent;
//! [`HttpAgentApi`] speaks the backend's JSON-over-HTTP endpoints.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::catalog::ToolCatalog;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Network, timeout or body read failure
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),
    /// The backend answered with a non-success status
    #[error("{message}")]
    Rejected { status: String, message: String },
    /// The backend answered with something we could not understand
    #[error("unexpected response: {0}")]
    Decode(String),
}

/// Acknowledgement body of every state-changing endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Ack {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: "success".into(),
            message: Some(message.into()),
        }
    }

    /// `no_change` means the agent already was in the requested state
    pub fn is_success(&self) -> bool {
        self.status == "success" || self.status == "no_change"
    }

    /// Turn a non-success ack into [`ApiError::Rejected`]
    pub fn into_result(self) -> Result<Ack, ApiError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(ApiError::Rejected {
                message: self
                    .message
                    .unwrap_or_else(|| format!("request failed ({})", self.status)),
                status: self.status,
            })
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub is_running: bool,
}

#[async_trait]
pub trait AgentApi: Send + Sync {
    /// `GET /get_tools`
    async fn get_tools(&self) -> Result<ToolCatalog, ApiError>;
    /// `GET /status`
    async fn status(&self) -> Result<StatusReport, ApiError>;
    /// `GET /log`, always the full buffer
    async fn log(&self) -> Result<String, ApiError>;
    /// `POST /start {goal}`
    async fn start(&self, goal: &str) -> Result<Ack, ApiError>;
    /// `POST /stop`
    async fn stop(&self) -> Result<Ack, ApiError>;
    /// `POST /update_goal {goal}`
    async fn update_goal(&self, goal: &str) -> Result<Ack, ApiError>;
    /// `POST /pause {pause}`
    async fn pause(&self, pause: bool) -> Result<Ack, ApiError>;
    /// `POST /submit_correction {correction}`
    async fn submit_correction(&self, correction: &str) -> Result<Ack, ApiError>;
}

pub struct HttpAgentApi {
    base: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct GoalBody<'a> {
    goal: &'a str,
}

#[derive(Serialize)]
struct PauseBody {
    pause: bool,
}

#[derive(Serialize)]
struct CorrectionBody<'a> {
    correction: &'a str,
}

impl HttpAgentApi {
    pub fn new(base: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base: base.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn post_ack<B: Serialize + ?Sized>(&self, path: &str, body: Option<&B>) -> Result<Ack, ApiError> {
        let mut req = self.client.post(self.url(path));
        if let Some(body) = body {
            req = req.json(body);
        }

        let response = req.send().await?;
        let http_status = response.status();
        let text = response.text().await?;

        // Rejections come back as 4xx/5xx with a JSON ack body
        match serde_json::from_str::<Ack>(&text) {
            Ok(ack) => ack.into_result(),
            Err(_) if http_status.is_success() && text.trim().is_empty() => {
                Ok(Ack::success(String::new()))
            }
            Err(_) if http_status.is_success() => Err(ApiError::Decode(format!(
                "{} returned a non-JSON body",
                path
            ))),
            Err(_) => Err(ApiError::Rejected {
                status: http_status.as_u16().to_string(),
                message: format!("{} failed with HTTP {}", path, http_status),
            }),
        }
    }
}

#[async_trait]
impl AgentApi for HttpAgentApi {
    async fn get_tools(&self) -> Result<ToolCatalog, ApiError> {
        let response = self.client.get(self.url("/get_tools")).send().await?;
        if !response.status().is_success() {
            return Err(ApiError::Rejected {
                status: response.status().as_u16().to_string(),
                message: format!("tool catalog unavailable (HTTP {})", response.status()),
            });
        }
        let payload: serde_json::Value = response.json().await?;
        ToolCatalog::from_json(&payload).map_err(|e| ApiError::Decode(e.to_string()))
    }

    async fn status(&self) -> Result<StatusReport, ApiError> {
        let response = self.client.get(self.url("/status")).send().await?;
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| ApiError::Decode(format!("status: {}", e)))
    }

    async fn log(&self) -> Result<String, ApiError> {
        // Unique parameter per call so no cache in between serves a stale log
        let nonce = Uuid::new_v4().to_string();
        let response = self
            .client
            .get(self.url("/log"))
            .query(&[("_", nonce.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ApiError::Rejected {
                status: response.status().as_u16().to_string(),
                message: format!("log unavailable (HTTP {})", response.status()),
            });
        }
        Ok(response.text().await?)
    }

    async fn start(&self, goal: &str) -> Result<Ack, ApiError> {
        self.post_ack("/start", Some(&GoalBody { goal })).await
    }

    async fn stop(&self) -> Result<Ack, ApiError> {
        self.post_ack::<()>("/stop", None).await
    }

    async fn update_goal(&self, goal: &str) -> Result<Ack, ApiError> {
        self.post_ack("/update_goal", Some(&GoalBody { goal })).await
    }

    async fn pause(&self, pause: bool) -> Result<Ack, ApiError> {
        self.post_ack("/pause", Some(&PauseBody { pause })).await
    }

    async fn submit_correction(&self, correction: &str) -> Result<Ack, ApiError> {
        self.post_ack("/submit_correction", Some(&CorrectionBody { correction }))
            .await
    }
}
