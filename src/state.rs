//! Client-side view of the remote run
//!
//! The remote agent owns the truth; this record is a cache refreshed by
//! status checks and action acknowledgements. Every change goes through one
//! of the transition methods below, and the UI only ever renders
//! [`ConsoleState::affordances`].

use chrono::{DateTime, Local};

/// Activity lines kept for the status line
const ACTIVITY_CAP: usize = 64;

/// Cached run lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunState {
    #[default]
    Idle,
    Running,
    Paused,
}

impl RunState {
    pub fn is_running(&self) -> bool {
        !matches!(self, RunState::Idle)
    }

    pub fn name(&self) -> &'static str {
        match self {
            RunState::Idle => "IDLE",
            RunState::Running => "RUNNING",
            RunState::Paused => "PAUSED",
        }
    }
}

/// What the log poller should do after a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollDirective {
    Start,
    Stop,
    Keep,
}

/// An action sent to the backend and not yet acknowledged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingAction {
    Start,
    Stop,
    Pause,
    Resume,
    Correction,
}

impl PendingAction {
    pub fn name(&self) -> &'static str {
        match self {
            PendingAction::Start => "Starting",
            PendingAction::Stop => "Stopping",
            PendingAction::Pause => "Pausing",
            PendingAction::Resume => "Resuming",
            PendingAction::Correction => "Sending correction",
        }
    }
}

/// Which controls are enabled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Affordances {
    pub start: bool,
    pub stop: bool,
    pub pause: bool,
    pub pause_label: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// User-visible alert
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
    pub at: DateTime<Local>,
}

#[derive(Debug, Default)]
pub struct ConsoleState {
    run: RunState,
    polling: bool,
    log: String,
    notice: Option<Notice>,
    pending: Option<PendingAction>,
    activity: Vec<String>,
}

impl ConsoleState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn run(&self) -> RunState {
        self.run
    }

    pub fn is_polling(&self) -> bool {
        self.polling
    }

    pub fn log(&self) -> &str {
        &self.log
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn pending(&self) -> Option<PendingAction> {
        self.pending
    }

    pub fn activity(&self) -> &[String] {
        &self.activity
    }

    /// Reconcile with a `/status` answer
    pub fn apply_status(&mut self, is_running: bool) -> PollDirective {
        if is_running {
            if self.run == RunState::Idle {
                self.run = RunState::Running;
                self.note("Agent is running");
            }
            if self.polling {
                PollDirective::Keep
            } else {
                self.polling = true;
                PollDirective::Start
            }
        } else {
            if self.run != RunState::Idle {
                self.note("Agent is not running");
            }
            self.run = RunState::Idle;
            self.polling = false;
            PollDirective::Stop
        }
    }

    /// A status check that never got an answer: fall back to "not running"
    /// so Start stays reachable.
    pub fn apply_status_failure(&mut self, reason: &str) -> PollDirective {
        self.note(format!("Status check failed: {}", reason));
        self.apply_status(false)
    }

    /// The backend acknowledged a pause or resume
    pub fn apply_pause_ack(&mut self, paused: bool) {
        if self.run == RunState::Idle {
            return;
        }
        self.run = if paused { RunState::Paused } else { RunState::Running };
        self.note(if paused { "Agent paused" } else { "Agent resumed" });
    }

    /// Replace the whole log view with a fresh fetch
    pub fn replace_log(&mut self, text: String) {
        self.log = text;
    }

    pub fn begin(&mut self, action: PendingAction) {
        self.pending = Some(action);
    }

    pub fn finish(&mut self) {
        self.pending = None;
    }

    pub fn notify(&mut self, level: NoticeLevel, text: impl Into<String>) {
        let text = text.into();
        self.note(text.clone());
        self.notice = Some(Notice {
            level,
            text,
            at: Local::now(),
        });
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }

    pub fn note(&mut self, msg: impl Into<String>) {
        let now = Local::now().format("%H:%M:%S");
        if self.activity.len() >= ACTIVITY_CAP {
            self.activity.remove(0);
        }
        self.activity.push(format!("[{}] {}", now, msg.into()));
    }

    /// Enabled controls for the current cached state. Nothing is clickable
    /// twice while an action is in flight.
    pub fn affordances(&self) -> Affordances {
        let free = self.pending.is_none();
        match self.run {
            RunState::Idle => Affordances {
                start: free,
                stop: false,
                pause: false,
                pause_label: "Pause",
            },
            RunState::Running => Affordances {
                start: false,
                stop: free,
                pause: free,
                pause_label: "Pause",
            },
            RunState::Paused => Affordances {
                start: false,
                stop: free,
                pause: free,
                pause_label: "Resume",
            },
        }
    }

    pub fn paused_panel_visible(&self) -> bool {
        self.run == RunState::Paused
    }
}
