//! steer - operator console for a remote autonomous agent
//!
//! USAGE:
//!   steer [--server URL]             # interactive console
//!   steer status                     # is the agent running?
//!   steer start <text> [--tool c/n]  # compose a goal and start a run
//!   steer pause | resume | stop      # control the run
//!   steer doctor                     # check config and backend

use anyhow::{Context, Result};
use std::sync::Arc;

use steer::api::{AgentApi, HttpAgentApi};
use steer::app::Console;
use steer::bridge::ToolTransfer;
use steer::catalog::ToolCatalog;
use steer::composer::GoalDocument;
use steer::config;
use steer::dispatcher::ActionDispatcher;
use steer::logging;
use steer::ui;

// ═══════════════════════════════════════════════════════════════
// CLI
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, PartialEq)]
enum Command {
    Interactive,
    Status,
    Log,
    Tools { filter: String, wire: bool },
    Start { parts: Vec<GoalPart> },
    Stop,
    Pause,
    Resume { parts: Vec<GoalPart> },
    Correct { text: String },
    Doctor,
    ConfigSet { key: String, value: String },
    Help,
}

/// Piece of a goal given on the command line
#[derive(Debug, Clone, PartialEq)]
enum GoalPart {
    Text(String),
    /// `category/name` of a catalog tool
    Tool(String),
    /// A tool transfer in wire form, as printed by `steer tools --wire`
    Transfer(String),
}

#[derive(Debug)]
struct Cli {
    server: Option<String>,
    command: Command,
}

fn parse_args(args: Vec<String>) -> Cli {
    let mut server = None;
    let mut rest = Vec::new();
    let mut i = 0;

    while i < args.len() {
        match args[i].as_str() {
            "--server" | "-s" => {
                i += 1;
                server = args.get(i).cloned();
            }
            "--help" | "-h" => {
                return Cli { server, command: Command::Help };
            }
            _ => rest.push(args[i].clone()),
        }
        i += 1;
    }

    let command = match rest.first().map(|s| s.as_str()) {
        None => Command::Interactive,
        Some("status") => Command::Status,
        Some("log") => Command::Log,
        Some("tools") => {
            let wire = rest[1..].iter().any(|a| a == "--wire");
            let filter: Vec<_> = rest[1..].iter().filter(|a| *a != "--wire").cloned().collect();
            Command::Tools { filter: filter.join(" "), wire }
        }
        Some("start") => Command::Start { parts: parse_goal_parts(&rest[1..]) },
        Some("stop") => Command::Stop,
        Some("pause") => Command::Pause,
        Some("resume") => Command::Resume { parts: parse_goal_parts(&rest[1..]) },
        Some("correct") => Command::Correct { text: rest[1..].join(" ") },
        Some("doctor") => Command::Doctor,
        Some("config") if rest.get(1).map(|s| s.as_str()) == Some("set") => Command::ConfigSet {
            key: rest.get(2).cloned().unwrap_or_default(),
            value: rest.get(3).cloned().unwrap_or_default(),
        },
        Some("help") => Command::Help,
        Some(_) => Command::Help,
    };

    Cli { server, command }
}

fn parse_goal_parts(args: &[String]) -> Vec<GoalPart> {
    let mut parts = Vec::new();
    let mut i = 0;
    while i < args.len() {
        if args[i] == "--tool" || args[i] == "-t" {
            i += 1;
            if let Some(tool) = args.get(i) {
                parts.push(GoalPart::Tool(tool.clone()));
            }
        } else if args[i] == "--tool-json" {
            i += 1;
            if let Some(wire) = args.get(i) {
                parts.push(GoalPart::Transfer(wire.clone()));
            }
        } else {
            parts.push(GoalPart::Text(args[i].clone()));
        }
        i += 1;
    }
    parts
}

fn print_help() {
    println!(r#"steer - operator console for a remote autonomous agent

USAGE:
    steer [--server URL]                    # interactive console
    steer status                            # show run state
    steer log                               # print the agent log
    steer tools [FILTER] [--wire]           # list tools (category/name, or wire form)
    steer start <text...> [--tool c/n ...]  # compose a goal and start
    steer pause                             # pause the running agent
    steer resume [<text...>] [--tool c/n]   # push goal, then resume
    steer stop                              # stop the agent
    steer correct <text...>                 # send an emergency correction
    steer doctor                            # check config and backend
    steer config set <key> <value>          # server, poll_interval_ms, request_timeout_secs

FLAGS:
    -s, --server <url>      Backend address (default from config)
    -t, --tool <c/n>        Insert tool <n> of category <c> into the goal
    --tool-json <wire>      Insert a tool given in wire form (steer tools --wire)
    -h, --help              Show this help

CONFIG:
    ~/.config/steer/config.json     Backend address, poll cadence
    ~/.local/state/steer/steer.log  Console log

ENVIRONMENT:
    STEER_SERVER            Override backend address
    STEER_LOG               Log filter (e.g. steer=debug)

CONTROLS (interactive mode):
    Tab     Switch focus: goal / tools / correction
    Enter   Drop selected tool into the goal (tools pane)
    ^S      Start        ^X  Stop        ^P  Pause / Resume
    ^R      Refresh      ^T  Reload tools
    ^D      Remove the tool pill next to the caret
    ^L      Clear the goal
    Paste   A `steer tools --wire` line pasted into the goal drops that tool
    Esc     Dismiss alert, or quit
"#);
}

// ═══════════════════════════════════════════════════════════════
// MAIN
// ═══════════════════════════════════════════════════════════════

#[tokio::main]
async fn main() -> Result<()> {
    let cli = parse_args(std::env::args().skip(1).collect());

    match cli.command {
        Command::Help => {
            print_help();
            Ok(())
        }
        Command::ConfigSet { key, value } => run_config_set(&key, &value),
        Command::Interactive => run_interactive(cli.server.as_deref()).await,
        command => {
            logging::init_stderr();
            let cfg = config::Config::load()?;
            let server = config::resolve_server(cli.server.as_deref(), &cfg);
            let api: Arc<dyn AgentApi> = Arc::new(HttpAgentApi::new(&server, cfg.request_timeout())?);
            run_oneshot(command, api, &server).await
        }
    }
}

// ═══════════════════════════════════════════════════════════════
// COMMANDS
// ═══════════════════════════════════════════════════════════════

async fn run_interactive(server_flag: Option<&str>) -> Result<()> {
    let cfg = config::Config::load()?;
    let _guard = logging::init_file(&config::state_dir()?)?;
    let server = config::resolve_server(server_flag, &cfg);
    tracing::info!(server = %server, "console starting");

    let api: Arc<dyn AgentApi> = Arc::new(HttpAgentApi::new(&server, cfg.request_timeout())?);
    let (console, rx) = Console::new(api, cfg.poll_interval());
    ui::run_tui(console, rx, &server).await
}

async fn run_oneshot(command: Command, api: Arc<dyn AgentApi>, server: &str) -> Result<()> {
    let dispatcher = ActionDispatcher::new(api.clone());

    match command {
        Command::Status => {
            let status = api.status().await.context("Status check failed")?;
            println!("{}", if status.is_running { "running" } else { "not running" });
        }
        Command::Log => {
            let log = api.log().await.context("Log fetch failed")?;
            print!("{}", log);
        }
        Command::Tools { filter, wire } => {
            let catalog = api.get_tools().await.context("Tool catalog fetch failed")?;
            for r in catalog.filter(&filter) {
                let Some(tool) = catalog.get(r) else { continue };
                if wire {
                    println!("{}", ToolTransfer::from_tool(tool).to_wire());
                } else {
                    println!("{}/{}  {}", tool.category, tool.name, tool.data);
                }
            }
        }
        Command::Start { parts } => {
            let goal = build_goal(&parts, api.as_ref()).await?.serialize();
            println!("Goal: {}", goal);
            let ack = dispatcher.start(&goal).await?;
            println!("{}", ack.message.unwrap_or_else(|| "Agent started.".into()));
        }
        Command::Stop => {
            let ack = dispatcher.stop().await?;
            println!("{}", ack.message.unwrap_or_else(|| "Agent stopped.".into()));
        }
        Command::Pause => {
            dispatcher.toggle_pause(false, "").await?;
            println!("Agent paused.");
        }
        Command::Resume { parts } => {
            let goal = build_goal(&parts, api.as_ref()).await?.serialize();
            let outcome = dispatcher.toggle_pause(true, &goal).await?;
            if let Some(e) = outcome.goal_update_error {
                eprintln!("Goal update failed ({}); resumed with the previous goal", e);
            }
            println!("Agent resumed.");
        }
        Command::Correct { text } => {
            let ack = dispatcher.submit_correction(&text).await?;
            println!("{}", ack.message.unwrap_or_else(|| "Correction submitted.".into()));
        }
        Command::Doctor => run_doctor(api.as_ref(), server).await?,
        Command::Interactive | Command::Help | Command::ConfigSet { .. } => {}
    }

    Ok(())
}

/// Build a goal document from CLI parts, resolving `--tool` references
/// against the backend's catalog
async fn build_goal(parts: &[GoalPart], api: &dyn AgentApi) -> Result<GoalDocument> {
    let needs_catalog = parts.iter().any(|p| matches!(p, GoalPart::Tool(_)));
    let catalog = if needs_catalog {
        api.get_tools().await.context("Tool catalog fetch failed")?
    } else {
        ToolCatalog::default()
    };
    compose(parts, &catalog)
}

fn compose(parts: &[GoalPart], catalog: &ToolCatalog) -> Result<GoalDocument> {
    let mut doc = GoalDocument::new();

    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            doc.insert_text(" ");
        }
        match part {
            GoalPart::Text(text) => doc.insert_text(text),
            GoalPart::Tool(reference) => {
                let (category, name) = reference
                    .split_once('/')
                    .with_context(|| format!("Tool reference must be category/name, got: {}", reference))?;
                let tool = catalog
                    .find(category, name)
                    .with_context(|| format!("Unknown tool: {}", reference))?;
                doc.insert_transfer(&ToolTransfer::from_tool(tool));
            }
            GoalPart::Transfer(wire) => {
                let transfer = ToolTransfer::from_wire(wire)
                    .with_context(|| format!("Not a tool transfer: {}", wire))?;
                doc.insert_transfer(&transfer);
            }
        }
    }

    Ok(doc)
}

async fn run_doctor(api: &dyn AgentApi, server: &str) -> Result<()> {
    println!("steer doctor\n");

    let cfg_path = config::config_path()?;
    println!("[{}] Config: {}",
        if cfg_path.exists() { "✓" } else { "-" },
        cfg_path.display()
    );
    println!("[✓] Log: {}", config::state_dir()?.join(logging::LOG_FILE).display());
    println!("[✓] Server: {}", server);

    match api.status().await {
        Ok(s) => println!("[✓] Backend: reachable, agent {}", if s.is_running { "running" } else { "idle" }),
        Err(e) => println!("[✗] Backend: {}", e),
    }

    match api.get_tools().await {
        Ok(c) => println!("[✓] Tools: {} in {} categories", c.len(), c.categories().len()),
        Err(e) => println!("[✗] Tools: {}", e),
    }

    Ok(())
}

fn run_config_set(key: &str, value: &str) -> Result<()> {
    let mut cfg = config::Config::load()?;
    cfg.set(key, value)?;
    cfg.save()?;
    println!("{} set in {}", key, config::config_path()?.display());
    Ok(())
}
