//! steer - operator console for a remote autonomous agent
//!
//! Compose a goal from free text and tool tokens, flatten it into the
//! string the agent parses, start the run, then watch, pause, resume,
//! correct or stop it. The remote agent owns the run state; the console
//! keeps a cache reconciled by polling and action acknowledgements.

pub mod api;
pub mod app;
pub mod bridge;
pub mod catalog;
pub mod composer;
pub mod config;
pub mod dispatcher;
pub mod logging;
pub mod poller;
pub mod state;
pub mod ui;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{Ack, AgentApi, ApiError, HttpAgentApi, StatusReport};
pub use composer::{GoalDocument, Segment, ToolToken};
pub use dispatcher::{ActionDispatcher, ActionError, PauseOutcome};
pub use state::{ConsoleState, RunState};
