//! Configuration errors
//!
//! This module defines error types for the configuration module.

use std::path::PathBuf;
use thiserror::Error;

use crate::common::ProxyError;

/// Configuration error type
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Error reading the configuration file
    #[error("Error reading configuration file {}: {1}", .0.display())]
    FileReadError(PathBuf, String),

    /// Error parsing configuration
    #[error("Error parsing configuration: {0}")]
    ParseError(String),

    /// Invalid value for configuration option
    #[error("Invalid value for '{0}': {1}")]
    InvalidValue(String, String),

    /// Missing required configuration value
    #[error("Missing required configuration value: {0}")]
    MissingRequiredValue(String),

    /// Certificate or key file missing or unreadable
    #[error("{0} is not readable at {}: {2}", .1.display())]
    CertificateUnavailable(&'static str, PathBuf, String),
}

/// Result type alias for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;

impl From<::config::ConfigError> for ConfigError {
    fn from(err: ::config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

// Convert to crate's common error type
impl From<ConfigError> for ProxyError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::CertificateUnavailable(..) => ProxyError::Certificate(err.to_string()),
            _ => ProxyError::Config(err.to_string()),
        }
    }
}
