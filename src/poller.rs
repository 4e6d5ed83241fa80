//! Status checks and the log poll loop
//!
//! Status checks are one-shot tasks. The log loop runs only while the
//! cached state says the agent is running; [`PollDirective`]s from the state
//! transitions start and stop it. Both report back as [`AppEvent`]s.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::api::AgentApi;
use crate::app::AppEvent;
use crate::state::PollDirective;

/// Ask the backend whether the agent runs; the answer arrives as
/// [`AppEvent::Status`] stamped with `seq`, so a late answer can be told
/// apart from a newer one.
pub fn spawn_status_check(api: Arc<dyn AgentApi>, seq: u64, tx: mpsc::Sender<AppEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let result = api.status().await.map_err(|e| {
            tracing::warn!(error = %e, seq, "status check failed");
            e.to_string()
        });
        let _ = tx.send(AppEvent::Status(seq, result)).await;
    })
}

struct PollHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Fixed-cadence log fetcher
pub struct LogPoller {
    interval: Duration,
    active: Option<PollHandle>,
}

impl LogPoller {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            active: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.as_ref().is_some_and(|h| !h.task.is_finished())
    }

    pub fn apply(&mut self, directive: PollDirective, api: &Arc<dyn AgentApi>, tx: &mpsc::Sender<AppEvent>) {
        match directive {
            PollDirective::Start => self.start(api.clone(), tx.clone()),
            PollDirective::Stop => self.stop(),
            PollDirective::Keep => {}
        }
    }

    pub fn start(&mut self, api: Arc<dyn AgentApi>, tx: mpsc::Sender<AppEvent>) {
        if self.is_active() {
            return;
        }

        let cancel = CancellationToken::new();
        let task = tokio::spawn(poll_loop(api, self.interval, cancel.clone(), tx));
        self.active = Some(PollHandle { cancel, task });
        tracing::info!(interval_ms = self.interval.as_millis() as u64, "log polling started");
    }

    /// Stop ticking. A fetch already in flight still completes and is
    /// delivered once more.
    pub fn stop(&mut self) {
        if let Some(handle) = self.active.take() {
            handle.cancel.cancel();
            tracing::info!("log polling stopped");
        }
    }
}

impl Drop for LogPoller {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn poll_loop(
    api: Arc<dyn AgentApi>,
    interval: Duration,
    cancel: CancellationToken,
    tx: mpsc::Sender<AppEvent>,
) {
    let mut ticker = tokio::time::interval(interval);
    // A slow fetch swallows the ticks it overran instead of bunching them up
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        match api.log().await {
            Ok(text) => {
                tracing::debug!(bytes = text.len(), "log fetched");
                if tx.send(AppEvent::LogFetched(text)).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "log fetch failed, skipping tick");
            }
        }
    }
}
