//! Global configuration parsing, validation, and credential loading.
//!
//! Every field has a default so the server can start with no config file at
//! all. A TOML file supplies the base values, environment variables overlay
//! them, and the two secrets are read from the OS keychain with an env-var
//! fallback.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::models::agent::{AgentLevel, AgentRole};
use crate::{AppError, Result};

/// Keychain service name used for credential lookups.
const KEYRING_SERVICE: &str = "citadel";

/// Session gateway connectivity.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GatewayConfig {
    /// Base URL of the agent session gateway.
    #[serde(default = "default_gateway_url")]
    pub url: String,
    /// Bearer token presented to the gateway (populated at runtime).
    #[serde(skip)]
    pub token: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            url: default_gateway_url(),
            token: String::new(),
        }
    }
}

fn default_gateway_url() -> String {
    "http://127.0.0.1:18789".into()
}

/// Delivery daemon pacing and timeout values.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct DaemonConfig {
    /// Whether the delivery daemon runs inside the server process.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Sleep between poll cycles.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Timeout for plain API round-trips.
    #[serde(default = "default_simple_timeout_ms")]
    pub simple_timeout_ms: u64,
    /// Timeout for round-trips that wait on an agent to think.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Run-time budget handed to spawned sub-sessions.
    #[serde(default = "default_spawn_run_timeout")]
    pub spawn_run_timeout_seconds: u64,
    /// Blocked-agent check runs on every Nth cycle.
    #[serde(default = "default_blocked_check_every")]
    pub blocked_check_every: u64,
    /// Maximum undelivered notifications claimed per cycle.
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_ms: default_poll_interval_ms(),
            simple_timeout_ms: default_simple_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            spawn_run_timeout_seconds: default_spawn_run_timeout(),
            blocked_check_every: default_blocked_check_every(),
            batch_size: default_batch_size(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_poll_interval_ms() -> u64 {
    3000
}

fn default_simple_timeout_ms() -> u64 {
    10_000
}

fn default_request_timeout_ms() -> u64 {
    60_000
}

fn default_spawn_run_timeout() -> u64 {
    300
}

fn default_blocked_check_every() -> u64 {
    10
}

fn default_batch_size() -> u32 {
    50
}

fn default_db_path() -> PathBuf {
    PathBuf::from("citadel.db")
}

fn default_http_port() -> u16 {
    3210
}

fn default_retention_days() -> u32 {
    30
}

/// One entry of the agent roster seeded at startup.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct AgentSeed {
    /// Display name, matched case-insensitively against existing agents.
    pub name: String,
    /// Functional role.
    #[serde(default)]
    pub role: AgentRole,
    /// Seniority.
    #[serde(default)]
    pub level: AgentLevel,
    /// Gateway session key.
    #[serde(default)]
    pub session_key: Option<String>,
    /// Dashboard avatar.
    #[serde(default = "default_avatar")]
    pub avatar_emoji: String,
}

fn default_avatar() -> String {
    "🤖".into()
}

/// Global configuration parsed from an optional `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// `SQLite` database file.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    /// Port for the inbound HTTP control surface.
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// Shared secret expected in the `X-Citadel-Key` header (populated at runtime).
    #[serde(skip)]
    pub api_key: String,
    /// Session gateway settings.
    #[serde(default)]
    pub gateway: GatewayConfig,
    /// Delivery daemon settings.
    #[serde(default)]
    pub daemon: DaemonConfig,
    /// Days after which read+delivered notifications and activities are purged.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
    /// Agents inserted or refreshed at startup.
    #[serde(default)]
    pub agents: Vec<AgentSeed>,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            http_port: default_http_port(),
            api_key: String::new(),
            gateway: GatewayConfig::default(),
            daemon: DaemonConfig::default(),
            retention_days: default_retention_days(),
            agents: Vec::new(),
        }
    }
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay values from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a variable holds an unparsable number or
    /// the merged configuration fails validation.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| env::var(key).ok())
    }

    /// Overlay values from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a value holds an unparsable number or
    /// the merged configuration fails validation.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("CITADEL_DB_PATH") {
            self.db_path = PathBuf::from(path);
        }
        if let Some(port) = lookup("CITADEL_HTTP_PORT") {
            self.http_port = parse_number("CITADEL_HTTP_PORT", &port)?;
        }
        if let Some(url) = lookup("GATEWAY_URL") {
            self.gateway.url = url;
        }
        if let Some(ms) = lookup("POLL_INTERVAL_MS") {
            self.daemon.poll_interval_ms = parse_number("POLL_INTERVAL_MS", &ms)?;
        }
        if let Some(ms) = lookup("SIMPLE_TIMEOUT_MS") {
            self.daemon.simple_timeout_ms = parse_number("SIMPLE_TIMEOUT_MS", &ms)?;
        }
        if let Some(ms) = lookup("REQUEST_TIMEOUT_MS") {
            self.daemon.request_timeout_ms = parse_number("REQUEST_TIMEOUT_MS", &ms)?;
        }
        if let Some(days) = lookup("CITADEL_RETENTION_DAYS") {
            self.retention_days = parse_number("CITADEL_RETENTION_DAYS", &days)?;
        }
        self.validate()
    }

    /// Load the inbound API key and gateway token from OS keychain with
    /// env-var fallback.
    ///
    /// A missing secret is not fatal: the API key stays empty (which makes
    /// the control surface reject every request) and the gateway is called
    /// without a token.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the keychain lookup task panics.
    pub async fn load_credentials(&mut self) -> Result<()> {
        if let Some(key) = load_credential("api_key", "CITADEL_API_KEY").await? {
            self.api_key = key;
        } else {
            warn!("CITADEL_API_KEY not configured; inbound API will reject all requests");
        }
        if let Some(token) = load_credential("gateway_token", "GATEWAY_TOKEN").await? {
            self.gateway.token = token;
        } else {
            warn!("GATEWAY_TOKEN not configured; gateway calls are unauthenticated");
        }
        Ok(())
    }

    /// Sleep between poll cycles.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.daemon.poll_interval_ms)
    }

    /// Timeout for plain API round-trips.
    #[must_use]
    pub fn simple_timeout(&self) -> Duration {
        Duration::from_millis(self.daemon.simple_timeout_ms)
    }

    /// Timeout for round-trips that wait on agent output.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.daemon.request_timeout_ms)
    }

    fn validate(&self) -> Result<()> {
        if self.daemon.poll_interval_ms == 0 {
            return Err(AppError::Config(
                "poll_interval_ms must be greater than zero".into(),
            ));
        }
        if self.daemon.simple_timeout_ms == 0 || self.daemon.request_timeout_ms == 0 {
            return Err(AppError::Config(
                "timeouts must be greater than zero".into(),
            ));
        }
        if self.daemon.blocked_check_every == 0 {
            return Err(AppError::Config(
                "blocked_check_every must be greater than zero".into(),
            ));
        }
        if self.daemon.batch_size == 0 {
            return Err(AppError::Config("batch_size must be greater than zero".into()));
        }
        if let Some(seed) = self.agents.iter().find(|seed| seed.name.trim().is_empty()) {
            return Err(AppError::Config(format!(
                "agent roster entry has an empty name (role {:?})",
                seed.role
            )));
        }
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| AppError::Config(format!("{key} must be a number, got '{raw}'")))
}

/// Load a single credential from OS keychain with env-var fallback.
async fn load_credential(keyring_key: &str, env_key: &str) -> Result<Option<String>> {
    let key = keyring_key.to_owned();

    // keyring is synchronous I/O.
    let keychain_result = tokio::task::spawn_blocking(move || {
        keyring::Entry::new(KEYRING_SERVICE, &key).and_then(|entry| entry.get_password())
    })
    .await
    .map_err(|err| AppError::Config(format!("keychain task panicked: {err}")))?;

    match keychain_result {
        Ok(value) if !value.is_empty() => return Ok(Some(value)),
        Ok(_) => {
            warn!(key = keyring_key, "keychain entry is empty, trying env var");
        }
        Err(err) => {
            tracing::debug!(key = keyring_key, ?err, "keychain lookup failed, trying env var");
        }
    }

    Ok(env::var(env_key).ok().filter(|value| !value.is_empty()))
}
