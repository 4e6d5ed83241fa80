//! Configuration management with XDG paths
//!
//! ~/.config/steer/config.json - backend address, poll cadence
//! ~/.local/state/steer/       - steer.log (tracing output)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_NAME: &str = "steer";

/// Environment override for the backend address
pub const SERVER_ENV: &str = "STEER_SERVER";

/// Get config directory (~/.config/steer/)
pub fn config_dir() -> Result<PathBuf> {
    let base = dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
        .context("Could not determine config directory")?;
    Ok(base.join(APP_NAME))
}

/// Get state directory (~/.local/state/steer/)
pub fn state_dir() -> Result<PathBuf> {
    let base = dirs::state_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".local/state")))
        .context("Could not determine state directory")?;
    Ok(base.join(APP_NAME))
}

/// Get config file path
pub fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.json"))
}

/// Ensure all directories exist
pub fn ensure_dirs() -> Result<()> {
    fs::create_dir_all(config_dir()?)?;
    fs::create_dir_all(state_dir()?)?;
    Ok(())
}

/// Main configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the agent backend
    #[serde(default = "default_server")]
    pub server: String,

    /// Log poll cadence while the agent runs
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Per-request timeout
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_server() -> String { "http://127.0.0.1:5001".to_string() }
fn default_poll_interval_ms() -> u64 { 1000 }
fn default_request_timeout_secs() -> u64 { 10 }

impl Default for Config {
    fn default() -> Self {
        Self {
            server: default_server(),
            poll_interval_ms: default_poll_interval_ms(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Config {
    /// Load config from disk, or return defaults
    pub fn load() -> Result<Self> {
        ensure_dirs()?;
        Self::load_from(&config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let config: Config = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse {}", path.display()))?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Save config to disk
    pub fn save(&self) -> Result<()> {
        ensure_dirs()?;
        self.save_to(&config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, &content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    /// Set a single key from `steer config set <key> <value>`
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "server" | "url" => {
                if !value.starts_with("http://") && !value.starts_with("https://") {
                    anyhow::bail!("Server must be an http(s) URL, got: {}", value);
                }
                self.server = value.trim_end_matches('/').to_string();
            }
            "poll_interval_ms" | "poll" => {
                let ms: u64 = value
                    .parse()
                    .with_context(|| format!("Invalid poll interval: {}", value))?;
                if ms == 0 {
                    anyhow::bail!("Poll interval must be positive");
                }
                self.poll_interval_ms = ms;
            }
            "request_timeout_secs" | "timeout" => {
                let secs: u64 = value
                    .parse()
                    .with_context(|| format!("Invalid timeout: {}", value))?;
                if secs == 0 {
                    anyhow::bail!("Request timeout must be positive");
                }
                self.request_timeout_secs = secs;
            }
            _ => anyhow::bail!(
                "Unknown config key: {}. Valid keys: server, poll_interval_ms, request_timeout_secs",
                key
            ),
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

/// Resolve the backend address: CLI flag, then environment, then config
pub fn resolve_server(flag: Option<&str>, cfg: &Config) -> String {
    if let Some(server) = flag {
        return server.trim_end_matches('/').to_string();
    }

    if let Ok(server) = std::env::var(SERVER_ENV) {
        if !server.is_empty() {
            return server.trim_end_matches('/').to_string();
        }
    }

    cfg.server.clone()
}
