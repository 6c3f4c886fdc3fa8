//! Error types for configuration loading and the serve loop.
//!
//! Operator cancellation is not an error and never shows up here.

use std::io;
use std::net::AddrParseError;
use std::path::PathBuf;
use thiserror::Error;

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{}': {}", .0.display(), .1)]
    FileRead(PathBuf, #[source] io::Error),
    #[error("Failed to parse config file '{}': {}", .0.display(), .1)]
    TomlParse(PathBuf, #[source] toml::de::Error),
    #[error("Invalid listen address '{0}': {1}")]
    InvalidListen(String, #[source] AddrParseError),
    #[error("Setting '{0}' must be greater than zero")]
    Zero(&'static str),
}

/// Fatal serve loop errors.
///
/// Send failures are absent on purpose: they are logged and the loop moves on.
#[derive(Debug, Error)]
pub enum ServeError {
    #[error("failed to bind listener: {0}")]
    Bind(#[source] io::Error),
    #[error("failed to accept connection: {0}")]
    Accept(#[source] io::Error),
    #[error("failed to read request: {0}")]
    Read(#[source] io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_names_path() {
        let err = ConfigError::FileRead(
            PathBuf::from("/etc/wire-echo.toml"),
            io::Error::new(io::ErrorKind::NotFound, "missing"),
        );
        let msg = err.to_string();
        assert!(msg.contains("/etc/wire-echo.toml"));
        assert!(msg.contains("missing"));
    }

    #[test]
    fn test_serve_error_keeps_source() {
        let err = ServeError::Read(io::Error::new(io::ErrorKind::ConnectionReset, "reset"));
        assert_eq!(err.to_string(), "failed to read request: reset");
        assert!(std::error::Error::source(&err).is_some());
    }
}
