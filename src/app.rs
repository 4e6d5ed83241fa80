//! Console controller
//!
//! User gestures arrive as [`Command`]s, network results as [`AppEvent`]s.
//! Both are handled on the caller's task, so the cached run state and the
//! goal document have exactly one writer. Network work is spawned and never
//! blocks editing.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::api::{Ack, AgentApi, StatusReport};
use crate::bridge::ToolTransfer;
use crate::catalog::{ToolCatalog, ToolRef};
use crate::composer::{GoalDocument, TokenId};
use crate::dispatcher::{ActionDispatcher, ActionError, PauseOutcome};
use crate::poller::{self, LogPoller};
use crate::state::{ConsoleState, NoticeLevel, PendingAction, RunState};

/// Results of background work
#[derive(Debug)]
pub enum AppEvent {
    /// Answer to the status check with this sequence number
    Status(u64, Result<StatusReport, String>),
    LogFetched(String),
    Catalog(Result<ToolCatalog, String>),
    Started(Result<Ack, ActionError>),
    Stopped(Result<Ack, ActionError>),
    PauseToggled(Result<PauseOutcome, ActionError>),
    Corrected(Result<Ack, ActionError>),
}

/// One user gesture
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Start,
    Stop,
    TogglePause,
    Correct,
    RefreshStatus,
    LoadTools,

    /// Bracketed paste into whichever input has focus
    Paste(String),

    // Composer
    InsertText(String),
    Backspace,
    Delete,
    CaretLeft,
    CaretRight,
    CaretHome,
    CaretEnd,
    DropTool(ToolTransfer),
    RemoveToken(TokenId),
    /// Dismiss the pill next to the caret
    DismissPill,
    ClearGoal,

    // Palette
    DropSelected,
    PaletteUp,
    PaletteDown,
    FilterPush(char),
    FilterPop,

    // Correction input
    CorrectionPush(char),
    CorrectionPop,

    FocusNext,
    DismissNotice,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Composer,
    Palette,
    Correction,
}

impl Focus {
    fn next(self) -> Self {
        match self {
            Focus::Composer => Focus::Palette,
            Focus::Palette => Focus::Correction,
            Focus::Correction => Focus::Composer,
        }
    }
}

pub struct Console {
    state: ConsoleState,
    goal: GoalDocument,
    catalog: ToolCatalog,
    filter: String,
    selected: usize,
    correction: String,
    focus: Focus,
    quit: bool,

    /// Sequence number of the last status check issued
    status_issued: u64,
    /// Status answers at or below this number are stale
    status_floor: u64,

    api: Arc<dyn AgentApi>,
    dispatcher: ActionDispatcher,
    poller: LogPoller,
    tx: mpsc::Sender<AppEvent>,
}

impl Console {
    pub fn new(api: Arc<dyn AgentApi>, poll_interval: Duration) -> (Self, mpsc::Receiver<AppEvent>) {
        let (tx, rx) = mpsc::channel(256);
        let console = Self {
            state: ConsoleState::new(),
            goal: GoalDocument::new(),
            catalog: ToolCatalog::default(),
            filter: String::new(),
            selected: 0,
            correction: String::new(),
            focus: Focus::Composer,
            quit: false,
            status_issued: 0,
            status_floor: 0,
            dispatcher: ActionDispatcher::new(api.clone()),
            api,
            poller: LogPoller::new(poll_interval),
            tx,
        };
        (console, rx)
    }

    /// Initial status check and catalog load
    pub fn boot(&mut self) {
        self.handle(Command::RefreshStatus);
        self.handle(Command::LoadTools);
    }

    pub fn state(&self) -> &ConsoleState {
        &self.state
    }

    pub fn goal(&self) -> &GoalDocument {
        &self.goal
    }

    pub fn catalog(&self) -> &ToolCatalog {
        &self.catalog
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    pub fn correction(&self) -> &str {
        &self.correction
    }

    pub fn focus(&self) -> Focus {
        self.focus
    }

    pub fn should_quit(&self) -> bool {
        self.quit
    }

    pub fn is_polling(&self) -> bool {
        self.poller.is_active()
    }

    /// Palette rows for the current filter
    pub fn palette(&self) -> Vec<ToolRef> {
        self.catalog.filter(&self.filter)
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::Start => self.start(),
            Command::Stop => self.stop(),
            Command::TogglePause => self.toggle_pause(),
            Command::Correct => self.correct(),
            Command::RefreshStatus => {
                self.status_issued += 1;
                poller::spawn_status_check(self.api.clone(), self.status_issued, self.tx.clone());
            }
            Command::LoadTools => self.load_tools(),

            Command::Paste(text) => self.paste(&text),
            Command::InsertText(text) => self.goal.insert_text(&text),
            Command::Backspace => self.goal.backspace(),
            Command::Delete => self.goal.delete(),
            Command::CaretLeft => self.goal.move_left(),
            Command::CaretRight => self.goal.move_right(),
            Command::CaretHome => self.goal.move_home(),
            Command::CaretEnd => self.goal.move_end(),
            Command::DropTool(transfer) => {
                self.goal.insert_transfer(&transfer);
            }
            Command::RemoveToken(id) => {
                self.goal.remove_token(id);
            }
            Command::ClearGoal => self.goal.clear(),
            Command::DismissPill => {
                if let Some(id) = self.goal.pill_at_caret() {
                    self.handle(Command::RemoveToken(id));
                }
            }

            Command::DropSelected => {
                if let Some(transfer) = self.selected_transfer() {
                    self.goal.insert_transfer(&transfer);
                    self.focus = Focus::Composer;
                }
            }
            Command::PaletteUp => self.selected = self.selected.saturating_sub(1),
            Command::PaletteDown => {
                let len = self.palette().len();
                self.selected = (self.selected + 1).min(len.saturating_sub(1));
            }
            Command::FilterPush(c) => {
                self.filter.push(c);
                self.selected = 0;
            }
            Command::FilterPop => {
                self.filter.pop();
                self.selected = 0;
            }

            Command::CorrectionPush(c) => self.correction.push(c),
            Command::CorrectionPop => {
                self.correction.pop();
            }

            Command::FocusNext => self.focus = self.focus.next(),
            Command::DismissNotice => self.state.dismiss_notice(),
            Command::Quit => {
                self.poller.stop();
                self.quit = true;
            }
        }
    }

    pub fn apply(&mut self, event: AppEvent) {
        match event {
            AppEvent::Status(seq, _) if seq <= self.status_floor => {
                tracing::debug!(seq, floor = self.status_floor, "stale status answer dropped");
            }
            AppEvent::Status(seq, result) => {
                self.status_floor = seq;
                let directive = match result {
                    Ok(report) => self.state.apply_status(report.is_running),
                    Err(e) => self.state.apply_status_failure(&e),
                };
                self.poller.apply(directive, &self.api, &self.tx);
            }
            AppEvent::LogFetched(text) => self.state.replace_log(text),
            AppEvent::Catalog(Ok(catalog)) => {
                self.state.note(format!("Loaded {} tools", catalog.len()));
                self.catalog = catalog;
                self.selected = 0;
            }
            AppEvent::Catalog(Err(e)) => {
                self.state.notify(NoticeLevel::Warning, format!("Could not load tools: {}", e));
            }
            AppEvent::Started(result) | AppEvent::Stopped(result) => {
                self.state.finish();
                match result {
                    Ok(ack) => {
                        // Answers to checks issued before the ack describe the old run
                        self.status_floor = self.status_issued;
                        if let Some(msg) = ack.message.filter(|m| !m.is_empty()) {
                            self.state.note(msg);
                        }
                        // Re-check right away rather than waiting for a tick
                        self.handle(Command::RefreshStatus);
                    }
                    Err(e) => self.state.notify(NoticeLevel::Error, e.to_string()),
                }
            }
            AppEvent::PauseToggled(result) => {
                self.state.finish();
                match result {
                    Ok(outcome) => {
                        self.status_floor = self.status_issued;
                        if let Some(e) = outcome.goal_update_error {
                            self.state.notify(
                                NoticeLevel::Warning,
                                format!("Goal update failed ({}); resumed with the previous goal", e),
                            );
                        }
                        self.state.apply_pause_ack(outcome.paused);
                    }
                    Err(e) => self.state.notify(NoticeLevel::Error, e.to_string()),
                }
            }
            AppEvent::Corrected(result) => {
                self.state.finish();
                match result {
                    Ok(_) => {
                        self.correction.clear();
                        self.state.notify(NoticeLevel::Info, "Correction submitted.");
                    }
                    Err(e) => self.state.notify(NoticeLevel::Error, e.to_string()),
                }
            }
        }
    }

    fn paste(&mut self, text: &str) {
        let text = text.replace("\r\n", "\n").replace('\r', "\n");
        match self.focus {
            Focus::Composer => match ToolTransfer::from_wire(text.trim()) {
                Ok(transfer) => {
                    self.goal.insert_transfer(&transfer);
                }
                Err(_) => self.goal.insert_text(&text),
            },
            // Single-line inputs
            Focus::Correction => self.correction.push_str(&text.replace('\n', " ")),
            Focus::Palette => {
                self.filter.push_str(&text.replace('\n', " "));
                self.selected = 0;
            }
        }
    }

    fn selected_transfer(&self) -> Option<ToolTransfer> {
        let r = *self.palette().get(self.selected)?;
        self.catalog.get(r).map(ToolTransfer::from_tool)
    }

    fn load_tools(&self) {
        let api = self.api.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = api.get_tools().await.map_err(|e| {
                tracing::warn!(error = %e, "tool catalog fetch failed");
                e.to_string()
            });
            let _ = tx.send(AppEvent::Catalog(result)).await;
        });
    }

    fn start(&mut self) {
        if !self.state.affordances().start {
            return;
        }

        let goal = self.goal.serialize();
        if goal.is_empty() {
            // Same message the dispatcher would give, without a round trip
            self.state.notify(
                NoticeLevel::Error,
                ActionError::Validation("Please enter a goal for the agent.".into()).to_string(),
            );
            return;
        }

        self.state.begin(PendingAction::Start);
        let dispatcher = self.dispatcher.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = dispatcher.start(&goal).await;
            let _ = tx.send(AppEvent::Started(result)).await;
        });
    }

    fn stop(&mut self) {
        if !self.state.affordances().stop {
            return;
        }

        self.state.begin(PendingAction::Stop);
        let dispatcher = self.dispatcher.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = dispatcher.stop().await;
            let _ = tx.send(AppEvent::Stopped(result)).await;
        });
    }

    fn toggle_pause(&mut self) {
        if !self.state.affordances().pause {
            return;
        }

        let currently_paused = self.state.run() == RunState::Paused;
        self.state.begin(if currently_paused {
            PendingAction::Resume
        } else {
            PendingAction::Pause
        });

        let goal = self.goal.serialize();
        let dispatcher = self.dispatcher.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = dispatcher.toggle_pause(currently_paused, &goal).await;
            let _ = tx.send(AppEvent::PauseToggled(result)).await;
        });
    }

    fn correct(&mut self) {
        if self.state.pending().is_some() {
            return;
        }

        let text = self.correction.clone();
        if text.trim().is_empty() {
            self.state.notify(NoticeLevel::Error, "Correction cannot be empty.");
            return;
        }

        self.state.begin(PendingAction::Correction);
        let dispatcher = self.dispatcher.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = dispatcher.submit_correction(&text).await;
            let _ = tx.send(AppEvent::Corrected(result)).await;
        });
    }
}
