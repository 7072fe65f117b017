//! Configuration validator
//!
//! This module provides functionality for validating configuration.
//! It runs before any socket is created.

use std::path::Path;
use log::warn;

use crate::common::check_readable_file;
use crate::config::error::{ConfigError, Result};
use crate::config::types::ForwarderConfig;

impl ForwarderConfig {
    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::CertificateUnavailable` if the certificate or key
    /// cannot be read, `ConfigError::InvalidValue` for out-of-range settings.
    pub fn validate(&self) -> Result<()> {
        validate_certificate_settings(self)?;
        validate_network_settings(self)?;
        validate_dispatch_settings(self)?;
        validate_general_settings(self);

        Ok(())
    }
}

/// Validate certificate settings
fn validate_certificate_settings(config: &ForwarderConfig) -> Result<()> {
    validate_readable(&config.public_certificate, "Public certificate")?;
    validate_readable(&config.private_key, "Private key")?;

    Ok(())
}

/// Validate network settings
fn validate_network_settings(config: &ForwarderConfig) -> Result<()> {
    if config.target_port == 0 {
        return Err(ConfigError::InvalidValue(
            "target_port".to_string(),
            "Target port must be greater than 0".to_string(),
        ));
    }

    if config.source_port == config.target_port {
        return Err(ConfigError::InvalidValue(
            "source_port".to_string(),
            "Source and target ports must be different".to_string(),
        ));
    }

    if config.backlog == 0 {
        return Err(ConfigError::InvalidValue(
            "backlog".to_string(),
            "Backlog must be greater than 0".to_string(),
        ));
    }

    Ok(())
}

/// Validate worker, queue and forwarding settings
fn validate_dispatch_settings(config: &ForwarderConfig) -> Result<()> {
    let positive = [
        ("workers", config.workers as u64),
        ("chunk_size", config.chunk_size as u64),
        ("connect_timeout", config.connect_timeout),
        ("handshake_timeout", config.handshake_timeout),
        ("shutdown_timeout", config.shutdown_timeout),
    ];

    for (name, value) in positive {
        if value == 0 {
            return Err(ConfigError::InvalidValue(
                name.to_string(),
                "Value must be greater than 0".to_string(),
            ));
        }
    }

    if config.queue_capacity == Some(0) {
        return Err(ConfigError::InvalidValue(
            "queue_capacity".to_string(),
            "Queue capacity must be greater than 0 (omit it for an unbounded queue)".to_string(),
        ));
    }

    Ok(())
}

/// Validate general settings
fn validate_general_settings(config: &ForwarderConfig) {
    match config.log_level.as_str() {
        "error" | "warn" | "info" | "debug" | "trace" => {}
        level => {
            warn!("Unrecognized log level: {}. env_logger will interpret it as a filter", level);
        }
    }
}

/// Check that a certificate or key file exists and can be read
fn validate_readable(path: &Path, description: &'static str) -> Result<()> {
    check_readable_file(path).map_err(|e| {
        ConfigError::CertificateUnavailable(description, path.to_path_buf(), e.to_string())
    })
}
