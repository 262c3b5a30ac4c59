//! Server configuration loading from file and environment variables.

use crate::fault::FaultInjector;
use serde::Deserialize;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use thiserror::Error;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Listener endpoint behaviour.
    #[serde(default)]
    pub listener: ListenerConfig,

    /// Scheduled liveness probing.
    #[serde(default)]
    pub prober: ProberConfig,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "peerlink_server=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

/// `/ping` and `/dpac` listener settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ListenerConfig {
    #[serde(default)]
    pub token_policy: TokenPolicyConfig,

    #[serde(default = "FaultInjector::ping_default")]
    pub ping: FaultInjector,

    #[serde(default = "FaultInjector::dpac_default")]
    pub dpac: FaultInjector,
}

/// How the listener validates bearer tokens.
#[derive(Clone, Default, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum TokenPolicyConfig {
    #[default]
    AnyWellFormed,
    Allowlist {
        tokens: Vec<String>,
    },
    Introspect {
        sts_url: String,
        client_id: String,
        client_secret: String,
    },
}

impl fmt::Debug for TokenPolicyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AnyWellFormed => f.write_str("AnyWellFormed"),
            Self::Allowlist { tokens } => f
                .debug_struct("Allowlist")
                .field("tokens", &tokens.len())
                .finish(),
            Self::Introspect {
                sts_url, client_id, ..
            } => f
                .debug_struct("Introspect")
                .field("sts_url", sts_url)
                .field("client_id", client_id)
                .field("client_secret", &"[REDACTED]")
                .finish(),
        }
    }
}

/// Background liveness probing of known peers.
#[derive(Debug, Clone, Deserialize)]
pub struct ProberConfig {
    /// Seconds between sweeps. `0` disables the task.
    #[serde(default)]
    pub interval_secs: u64,

    #[serde(default = "default_probe_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_probe_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Opaque state digest sent as the probe body.
    #[serde(default)]
    pub state_hash: String,

    #[serde(default)]
    pub credentials: Option<ProbeCredentials>,

    #[serde(default)]
    pub peers: Vec<PeerTarget>,
}

/// A peer listener to probe.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PeerTarget {
    pub peer_id: String,
    pub base_url: String,
}

/// Where the probe task gets its bearer token.
#[derive(Clone, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum ProbeCredentials {
    /// A fixed, pre-issued token.
    Static { token: String },
    /// A client-credentials exchange before each sweep.
    Exchange {
        sts_url: String,
        client_id: String,
        client_secret: String,
        #[serde(default)]
        scope: Option<String>,
    },
}

impl fmt::Debug for ProbeCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static { .. } => f
                .debug_struct("Static")
                .field("token", &"[REDACTED]")
                .finish(),
            Self::Exchange {
                sts_url,
                client_id,
                scope,
                ..
            } => f
                .debug_struct("Exchange")
                .field("sts_url", sts_url)
                .field("client_id", client_id)
                .field("client_secret", &"[REDACTED]")
                .field("scope", scope)
                .finish(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_probe_timeout_ms() -> u64 {
    500
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            token_policy: TokenPolicyConfig::default(),
            ping: FaultInjector::ping_default(),
            dpac: FaultInjector::dpac_default(),
        }
    }
}

impl Default for ProberConfig {
    fn default() -> Self {
        Self {
            interval_secs: 0,
            timeout_ms: default_probe_timeout_ms(),
            connect_timeout_ms: default_probe_timeout_ms(),
            state_hash: String::new(),
            credentials: None,
            peers: Vec::new(),
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value parsed but is unusable.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `PEERLINK_HOST` overrides `server.host`
/// - `PEERLINK_PORT` overrides `server.port`
/// - `PEERLINK_LOG_LEVEL` overrides `logging.level`
/// - `PEERLINK_LOG_JSON` overrides `logging.json` (set to "true" to enable)
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed, or
/// if the resulting configuration fails validation.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate(&config)?;
    Ok(config)
}

/// Applies `PEERLINK_*` overrides read through `lookup`.
pub fn apply_env_overrides(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(host) = lookup("PEERLINK_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Some(port) = lookup("PEERLINK_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Some(level) = lookup("PEERLINK_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = lookup("PEERLINK_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
}

/// Rejects configurations that parse but cannot run.
///
/// # Errors
///
/// Returns [`ConfigError::Invalid`] naming the offending key.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    for (name, faults) in [
        ("listener.ping", &config.listener.ping),
        ("listener.dpac", &config.listener.dpac),
    ] {
        if !(0.0..=1.0).contains(&faults.failure_rate) {
            return Err(ConfigError::Invalid(format!(
                "{}.failure_rate must be within [0.0, 1.0], got {}",
                name, faults.failure_rate
            )));
        }
    }

    let prober = &config.prober;
    if prober.interval_secs > 0 && !prober.peers.is_empty() && prober.credentials.is_none() {
        return Err(ConfigError::Invalid(
            "prober.credentials is required when probing is enabled".to_string(),
        ));
    }
    if prober.timeout_ms == 0 {
        return Err(ConfigError::Invalid(
            "prober.timeout_ms must be greater than zero".to_string(),
        ));
    }

    Ok(())
}
