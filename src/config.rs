//! Configuration module for wire-echo.
//!
//! Supports both command-line arguments and TOML configuration file.
//! CLI arguments take precedence over config file values.

use crate::error::ConfigError;
use clap::{Parser, ValueEnum};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// What the serve loop does when draining a request fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ReadErrorPolicy {
    /// Stop the whole loop.
    FailStop,
    /// Close only the failing connection and keep accepting.
    Isolate,
}

/// Command-line arguments for the echo server
#[derive(Parser, Debug, Default)]
#[command(name = "wire-echo")]
#[command(version = "0.1.0")]
#[command(about = "Echoes each raw HTTP request back as an HTML page", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to bind to (e.g., 127.0.0.1:8080)
    #[arg(short = 'l', long)]
    pub listen: Option<String>,

    /// Value sent in the `Server` response header
    #[arg(long)]
    pub identity: Option<String>,

    /// Behavior when reading a request fails
    #[arg(long, value_enum)]
    pub read_error_policy: Option<ReadErrorPolicy>,

    /// Interval between accept/read polls in milliseconds
    #[arg(long)]
    pub poll_interval_ms: Option<u64>,

    /// Maximum bytes taken from the socket per read
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Do not watch the terminal for Escape / `q`
    #[arg(long)]
    pub no_keyboard: bool,

    /// Do not log the decoded request text
    #[arg(long)]
    pub quiet_requests: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub control: ControlConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server-related configuration
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to
    #[serde(default = "default_listen")]
    pub listen: String,
    /// `Server` header value
    #[serde(default = "default_identity")]
    pub identity: String,
    #[serde(default = "default_read_error_policy")]
    pub read_error_policy: ReadErrorPolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            identity: default_identity(),
            read_error_policy: default_read_error_policy(),
        }
    }
}

/// Polling and buffering configuration
#[derive(Debug, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Minimum spacing of "waiting for client" progress events
    #[serde(default = "default_progress_interval_ms")]
    pub progress_interval_ms: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            chunk_size: default_chunk_size(),
            progress_interval_ms: default_progress_interval_ms(),
        }
    }
}

/// Operator control configuration
#[derive(Debug, Deserialize)]
pub struct ControlConfig {
    /// Watch the terminal for Escape / `q`
    #[serde(default = "default_true")]
    pub keyboard: bool,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self { keyboard: true }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log each decoded request
    #[serde(default = "default_true")]
    pub echo_requests: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            echo_requests: true,
        }
    }
}

fn default_listen() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_identity() -> String {
    "Apache/2.4.4 (Win32) OpenSSL/0.9.8y PHP/5.4.16".to_string()
}

fn default_read_error_policy() -> ReadErrorPolicy {
    ReadErrorPolicy::FailStop
}

fn default_poll_interval_ms() -> u64 {
    1
}

fn default_chunk_size() -> usize {
    512
}

fn default_progress_interval_ms() -> u64 {
    1000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub listen: SocketAddr,
    pub identity: String,
    pub read_error_policy: ReadErrorPolicy,
    pub poll_interval: Duration,
    pub chunk_size: usize,
    pub progress_interval: Duration,
    pub keyboard: bool,
    pub echo_requests: bool,
    pub log_level: String,
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    /// CLI arguments take precedence over TOML file values.
    pub fn load() -> Result<Self, ConfigError> {
        let cli = CliArgs::parse();

        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        Self::merge(cli, toml_config)
    }

    /// Merge parsed CLI args over a TOML config and validate the result.
    pub fn merge(cli: CliArgs, toml_config: TomlConfig) -> Result<Self, ConfigError> {
        let listen = cli.listen.unwrap_or(toml_config.server.listen);
        let listen: SocketAddr = listen
            .parse()
            .map_err(|e| ConfigError::InvalidListen(listen.clone(), e))?;

        let poll_interval_ms = cli
            .poll_interval_ms
            .unwrap_or(toml_config.runtime.poll_interval_ms);
        if poll_interval_ms == 0 {
            return Err(ConfigError::Zero("poll_interval_ms"));
        }

        let chunk_size = cli.chunk_size.unwrap_or(toml_config.runtime.chunk_size);
        if chunk_size == 0 {
            return Err(ConfigError::Zero("chunk_size"));
        }

        Ok(Config {
            listen,
            identity: cli.identity.unwrap_or(toml_config.server.identity),
            read_error_policy: cli
                .read_error_policy
                .unwrap_or(toml_config.server.read_error_policy),
            poll_interval: Duration::from_millis(poll_interval_ms),
            chunk_size,
            progress_interval: Duration::from_millis(toml_config.runtime.progress_interval_ms),
            keyboard: !cli.no_keyboard && toml_config.control.keyboard,
            echo_requests: !cli.quiet_requests && toml_config.logging.echo_requests,
            log_level: cli.log_level.unwrap_or(toml_config.logging.level),
        })
    }
}

#[cfg(test)]
impl Config {
    /// Loopback config on an ephemeral port with no terminal watching.
    pub fn for_test() -> Self {
        let cli = CliArgs {
            listen: Some("127.0.0.1:0".to_string()),
            no_keyboard: true,
            ..CliArgs::default()
        };
        Self::merge(cli, TomlConfig::default()).unwrap()
    }
}
