// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized runtime configuration.
//!
//! Every tunable reads `SWARM_<NAME>` first, then the legacy
//! `MCP_SWARM_<NAME>` alias, then falls back to its default.

use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

/// Worker base names that imply `stateful = true` when the flag is not
/// set explicitly at declare time.
pub const STATEFUL_NAMES: [&str; 5] =
    ["playwright", "puppeteer", "browserbase", "stagehand", "browser-use"];

/// Whether a base name is in the built-in stateful set.
pub fn is_stateful_name(name: &str) -> bool {
    STATEFUL_NAMES.contains(&name)
}

/// Serving mode for the supervisor process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Single client over the parent process's standard streams.
    Stdio,
    /// Multi-client HTTP control surface.
    Http,
}

/// Resolved runtime configuration.
#[derive(Debug, Clone, Serialize)]
pub struct SwarmConfig {
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    /// When set, the HTTP surface binds this unix socket instead of host:port.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub socket_path: Option<PathBuf>,
    pub mode: Mode,
    pub max_sessions: usize,
    #[serde(with = "serde_millis")]
    pub session_idle_timeout: Duration,
    #[serde(with = "serde_millis")]
    pub session_cleanup_interval: Duration,
    #[serde(with = "serde_millis")]
    pub call_timeout: Duration,
    #[serde(with = "serde_millis")]
    pub queue_ttl: Duration,
    pub max_pool: usize,
    #[serde(with = "serde_millis")]
    pub scale_up_wait: Duration,
    #[serde(with = "serde_millis")]
    pub idle_kill: Duration,
    /// Zero disables the health watchdog.
    #[serde(with = "serde_millis")]
    pub health_interval: Duration,
    #[serde(with = "serde_millis")]
    pub health_timeout: Duration,
    pub cors: bool,
}

mod serde_millis {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }
}

impl Default for SwarmConfig {
    fn default() -> Self {
        let data_dir = default_data_dir();
        Self {
            db_path: data_dir.join("swarm.db"),
            data_dir,
            host: "127.0.0.1".to_string(),
            port: 7420,
            socket_path: None,
            mode: Mode::Http,
            max_sessions: 50,
            session_idle_timeout: Duration::from_secs(30 * 60),
            session_cleanup_interval: Duration::from_secs(60),
            call_timeout: Duration::from_secs(60),
            queue_ttl: Duration::from_secs(60),
            max_pool: 4,
            scale_up_wait: Duration::from_secs(5),
            idle_kill: Duration::from_secs(60),
            health_interval: Duration::from_secs(60),
            health_timeout: Duration::from_secs(10),
            cors: false,
        }
    }
}

impl SwarmConfig {
    /// Resolve the full configuration from the environment.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Some(dir) = var("DATA_DIR") {
            cfg.data_dir = PathBuf::from(dir);
            cfg.db_path = cfg.data_dir.join("swarm.db");
        }
        if let Some(path) = var("DB_PATH") {
            cfg.db_path = PathBuf::from(path);
        }
        if let Some(host) = var("HOST") {
            cfg.host = host;
        }
        if let Some(port) = parse_var("PORT") {
            cfg.port = port;
        }
        cfg.socket_path = var("SOCKET_PATH").map(PathBuf::from);
        if let Some(mode) = var("MODE") {
            cfg.mode = match mode.as_str() {
                "stdio" => Mode::Stdio,
                _ => Mode::Http,
            };
        }
        if let Some(n) = parse_var("MAX_SESSIONS") {
            cfg.max_sessions = n;
        }
        if let Some(ms) = parse_var("SESSION_IDLE_TIMEOUT_MS") {
            cfg.session_idle_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var("SESSION_CLEANUP_INTERVAL_MS") {
            cfg.session_cleanup_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var("CALL_TIMEOUT_MS") {
            cfg.call_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var("QUEUE_TTL_MS") {
            cfg.queue_ttl = Duration::from_millis(ms);
        }
        if let Some(n) = parse_var("MAX_POOL") {
            cfg.max_pool = n;
        }
        if let Some(ms) = parse_var("SCALE_UP_WAIT_MS") {
            cfg.scale_up_wait = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var("IDLE_KILL_MS") {
            cfg.idle_kill = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var("HEALTH_INTERVAL_MS") {
            cfg.health_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var("HEALTH_TIMEOUT_MS") {
            cfg.health_timeout = Duration::from_millis(ms);
        }
        if let Some(v) = var("CORS") {
            cfg.cors = matches!(v.as_str(), "1" | "true" | "yes");
        }
        cfg
    }
}

/// Read `SWARM_<name>`, falling back to the legacy `MCP_SWARM_<name>`.
fn var(name: &str) -> Option<String> {
    std::env::var(format!("SWARM_{name}"))
        .or_else(|_| std::env::var(format!("MCP_SWARM_{name}")))
        .ok()
        .filter(|s| !s.is_empty())
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    var(name).and_then(|s| s.parse().ok())
}

/// `SWARM_DATA_DIR` > `$XDG_DATA_HOME/swarm` > `~/.local/share/swarm`.
fn default_data_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        if !xdg.is_empty() {
            return PathBuf::from(xdg).join("swarm");
        }
    }
    match std::env::var("HOME") {
        Ok(home) if !home.is_empty() => PathBuf::from(home).join(".local/share/swarm"),
        _ => PathBuf::from(".swarm"),
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
