//! State-changing actions: start, stop, pause/resume, correction
//!
//! Each action either returns the backend's acknowledgement or an
//! [`ActionError`]. Callers apply acknowledgements to the cached state; on
//! error the state is left alone so the UI never shows a transition that
//! did not happen.

use std::sync::Arc;

use crate::api::{Ack, AgentApi, ApiError};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    /// Rejected locally, nothing was sent
    #[error("{0}")]
    Validation(String),
    /// The backend said no
    #[error("{0}")]
    ServerRejection(String),
    /// The request never got a usable answer
    #[error("Network error: {0}")]
    Transport(String),
}

impl From<ApiError> for ActionError {
    fn from(e: ApiError) -> Self {
        match e {
            ApiError::Rejected { message, .. } => ActionError::ServerRejection(message),
            ApiError::Transport(e) => ActionError::Transport(e.to_string()),
            ApiError::Decode(msg) => ActionError::Transport(msg),
        }
    }
}

/// Result of a pause/resume toggle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PauseOutcome {
    /// Paused flag the backend acknowledged
    pub paused: bool,
    /// Set when the goal refresh before a resume failed; the resume still went out
    pub goal_update_error: Option<ActionError>,
}

#[derive(Clone)]
pub struct ActionDispatcher {
    api: Arc<dyn AgentApi>,
}

impl ActionDispatcher {
    pub fn new(api: Arc<dyn AgentApi>) -> Self {
        Self { api }
    }

    /// Start a run with the flattened goal
    pub async fn start(&self, goal: &str) -> Result<Ack, ActionError> {
        let goal = goal.trim();
        if goal.is_empty() {
            return Err(ActionError::Validation("Please enter a goal for the agent.".into()));
        }

        tracing::info!(goal_len = goal.len(), "starting agent");
        let ack = self.api.start(goal).await.map_err(|e| {
            tracing::warn!(error = %e, "start failed");
            ActionError::from(e)
        })?;
        Ok(ack)
    }

    pub async fn stop(&self) -> Result<Ack, ActionError> {
        tracing::info!("stopping agent");
        let ack = self.api.stop().await.map_err(|e| {
            tracing::warn!(error = %e, "stop failed");
            ActionError::from(e)
        })?;
        Ok(ack)
    }

    /// Flip the pause flag. Resuming first pushes the current goal so edits
    /// made while paused take effect; if that push fails the resume is sent
    /// anyway and the agent continues with its previous goal.
    pub async fn toggle_pause(&self, currently_paused: bool, goal: &str) -> Result<PauseOutcome, ActionError> {
        let should_pause = !currently_paused;
        let mut goal_update_error = None;

        if !should_pause {
            if let Err(e) = self.api.update_goal(goal).await {
                tracing::warn!(error = %e, "goal update before resume failed, resuming with previous goal");
                goal_update_error = Some(ActionError::from(e));
            }
        }

        tracing::info!(pause = should_pause, "toggling pause");
        self.api.pause(should_pause).await.map_err(|e| {
            tracing::warn!(error = %e, pause = should_pause, "pause toggle failed");
            ActionError::from(e)
        })?;

        Ok(PauseOutcome {
            paused: should_pause,
            goal_update_error,
        })
    }

    /// Send an emergency correction the running agent folds into its history
    pub async fn submit_correction(&self, text: &str) -> Result<Ack, ActionError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ActionError::Validation("Correction cannot be empty.".into()));
        }

        tracing::info!(len = text.len(), "submitting correction");
        let ack = self.api.submit_correction(text).await.map_err(|e| {
            tracing::warn!(error = %e, "correction failed");
            ActionError::from(e)
        })?;
        Ok(ack)
    }
}
