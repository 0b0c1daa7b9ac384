//! Configuration settings for the vibe bridge.

use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::BridgeError;

/// Main configuration structure for the bridge.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
    #[serde(default)]
    pub host: HostConfig,
    #[serde(default)]
    pub whitelist: WhitelistConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub audit: AuditConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address to bind. Must be a loopback address.
    #[serde(default = "default_bind_address")]
    pub bind_address: IpAddr,
    /// TCP port. `0` picks an ephemeral port.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Security configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    /// Credential accepted until the first handshake provisions a session token.
    #[serde(default = "default_bootstrap_token")]
    pub bootstrap_token: String,
    /// Maximum allowed clock skew between the request timestamp and now.
    #[serde(default = "default_freshness_window_ms")]
    pub freshness_window_ms: u64,
}

/// Limits configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Maximum request body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Maximum number of commands waiting for the host thread.
    #[serde(default = "default_max_queue_depth")]
    pub max_queue_depth: usize,
    /// Maximum requests served concurrently.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,
    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

/// Main-loop dispatcher configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DispatcherConfig {
    /// Period of the host tick in milliseconds.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Upper bound on commands executed in one tick.
    #[serde(default = "default_max_commands_per_tick")]
    pub max_commands_per_tick: usize,
}

/// What the bridge reports about its host during the handshake.
#[derive(Debug, Clone, Deserialize)]
pub struct HostConfig {
    #[serde(default = "default_engine_version")]
    pub engine_version: String,
    #[serde(default = "default_capabilities")]
    pub capabilities: Vec<String>,
}

/// Paths accepted in addition to the built-in whitelist.
///
/// Extra paths are queued command routes with a `202` acknowledgement. They
/// extend the defaults and never replace them.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct WhitelistConfig {
    #[serde(default)]
    pub additional_paths: Vec<String>,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format ("pretty" or "json").
    #[serde(default = "default_log_format")]
    pub format: String,
}

/// Audit logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuditConfig {
    /// Whether audit logging is enabled.
    #[serde(default = "default_audit_enabled")]
    pub enabled: bool,
    /// Path to the audit log file.
    #[serde(default = "default_audit_log_path")]
    pub log_path: PathBuf,
}

// Default value functions
fn default_bind_address() -> IpAddr {
    IpAddr::V4(Ipv4Addr::LOCALHOST)
}

fn default_port() -> u16 {
    8085
}

fn default_bootstrap_token() -> String {
    "VIBE_BRIDGE_BOOTSTRAP_SECRET".to_string()
}

fn default_freshness_window_ms() -> u64 {
    5_000
}

fn default_max_body_bytes() -> usize {
    1_048_576 // 1MB
}

fn default_max_queue_depth() -> usize {
    1024
}

fn default_max_concurrent() -> usize {
    64
}

fn default_request_timeout() -> u64 {
    30
}

fn default_tick_interval_ms() -> u64 {
    100
}

fn default_max_commands_per_tick() -> usize {
    64
}

fn default_engine_version() -> String {
    format!("vibe-bridge/{}", env!("CARGO_PKG_VERSION"))
}

fn default_capabilities() -> Vec<String> {
    ["transform", "material", "mutate", "selection", "camera", "locking", "metrics"]
        .iter()
        .map(|c| c.to_string())
        .collect()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_audit_enabled() -> bool {
    false
}

fn default_audit_log_path() -> PathBuf {
    PathBuf::from(".vibesync/audit.jsonl")
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            bootstrap_token: default_bootstrap_token(),
            freshness_window_ms: default_freshness_window_ms(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: default_max_body_bytes(),
            max_queue_depth: default_max_queue_depth(),
            max_concurrent_requests: default_max_concurrent(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            max_commands_per_tick: default_max_commands_per_tick(),
        }
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            engine_version: default_engine_version(),
            capabilities: default_capabilities(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: default_audit_enabled(),
            log_path: default_audit_log_path(),
        }
    }
}

impl ServerConfig {
    /// Socket address the listener binds to.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }
}

impl DispatcherConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

impl LimitsConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

impl Settings {
    /// Load settings from a TOML configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, BridgeError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| BridgeError::Config {
            message: format!("Failed to read config file '{}': {}", path.display(), e),
        })?;

        Self::from_toml(&content).map_err(|e| match e {
            BridgeError::Config { message } => BridgeError::Config {
                message: format!("{} ({})", message, path.display()),
            },
            other => other,
        })
    }

    /// Parse and validate settings from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, BridgeError> {
        let settings: Settings = toml::from_str(content).map_err(|e| BridgeError::Config {
            message: format!("Failed to parse config: {}", e),
        })?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate the settings.
    pub fn validate(&self) -> Result<(), BridgeError> {
        // Validate log level
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(BridgeError::Config {
                message: format!(
                    "Invalid log level '{}'. Valid levels: {:?}",
                    self.logging.level, valid_levels
                ),
            });
        }

        // Validate log format
        let valid_formats = ["pretty", "json"];
        if !valid_formats.contains(&self.logging.format.to_lowercase().as_str()) {
            return Err(BridgeError::Config {
                message: format!(
                    "Invalid log format '{}'. Valid formats: {:?}",
                    self.logging.format, valid_formats
                ),
            });
        }

        if !self.server.bind_address.is_loopback() {
            return Err(BridgeError::Config {
                message: format!(
                    "Refusing to bind non-loopback address {}",
                    self.server.bind_address
                ),
            });
        }

        if self.security.bootstrap_token.is_empty() {
            return Err(BridgeError::Config {
                message: "security.bootstrap_token must not be empty".to_string(),
            });
        }

        let positive = [
            ("security.freshness_window_ms", self.security.freshness_window_ms),
            ("limits.max_body_bytes", self.limits.max_body_bytes as u64),
            ("limits.max_queue_depth", self.limits.max_queue_depth as u64),
            (
                "limits.max_concurrent_requests",
                self.limits.max_concurrent_requests as u64,
            ),
            (
                "limits.request_timeout_seconds",
                self.limits.request_timeout_seconds,
            ),
            ("dispatcher.tick_interval_ms", self.dispatcher.tick_interval_ms),
            (
                "dispatcher.max_commands_per_tick",
                self.dispatcher.max_commands_per_tick as u64,
            ),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, value)| *value == 0) {
            return Err(BridgeError::Config {
                message: format!("{} must be greater than zero", name),
            });
        }

        for path in &self.whitelist.additional_paths {
            validate_route_path(path)?;
        }

        Ok(())
    }
}

/// A whitelisted path is an absolute path without query, whitespace or `|`.
///
/// `|` is the canonical-string separator and must never occur in a field.
fn validate_route_path(path: &str) -> Result<(), BridgeError> {
    let valid = path.starts_with('/')
        && path.len() > 1
        && !path.chars().any(|c| c == '|' || c == '?' || c == '#' || c.is_whitespace());

    if !valid {
        return Err(BridgeError::Config {
            message: format!("Invalid whitelist path '{}'", path),
        });
    }
    Ok(())
}
