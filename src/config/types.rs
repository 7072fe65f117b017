//! Configuration types
//!
//! `ConfigValues` holds what a single source (file, environment, command line)
//! provided; `ForwarderConfig` is the resolved configuration the forwarder runs with.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::defaults;
use crate::config::error::{ConfigError, Result};
use crate::proxy::SessionOptions;

/// Configuration values from one source
///
/// Every field is optional so that sources can be layered: a value set by a
/// higher-priority source replaces the one below it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigValues {
    // --- Network settings ---

    /// Loopback port the forwarder listens on
    #[serde(default)]
    pub source_port: Option<u16>,

    /// Loopback port of the backend
    #[serde(default)]
    pub target_port: Option<u16>,

    /// Listen backlog
    #[serde(default)]
    pub backlog: Option<u32>,

    // --- TLS settings ---

    /// PEM certificate chain presented to clients
    #[serde(default)]
    pub public_certificate: Option<PathBuf>,

    /// PEM private key matching the certificate
    #[serde(default)]
    pub private_key: Option<PathBuf>,

    /// TLS handshake timeout in seconds
    #[serde(default)]
    pub handshake_timeout: Option<u64>,

    // --- Dispatch settings ---

    /// Number of workers
    #[serde(default)]
    pub workers: Option<usize>,

    /// Work queue capacity (unbounded when absent)
    #[serde(default)]
    pub queue_capacity: Option<usize>,

    /// Bytes read per forwarding step
    #[serde(default)]
    pub chunk_size: Option<usize>,

    /// Backend connect timeout in seconds
    #[serde(default)]
    pub connect_timeout: Option<u64>,

    /// Grace period for in-flight sessions at shutdown, in seconds
    #[serde(default)]
    pub shutdown_timeout: Option<u64>,

    // --- General settings ---

    /// Log level (error, warn, info, debug, trace)
    #[serde(default)]
    pub log_level: Option<String>,
}

impl ConfigValues {
    /// Layer `other` on top of `self`
    ///
    /// Values present in `other` win; absent ones fall through to `self`.
    pub fn merge(self, other: ConfigValues) -> ConfigValues {
        ConfigValues {
            source_port: other.source_port.or(self.source_port),
            target_port: other.target_port.or(self.target_port),
            backlog: other.backlog.or(self.backlog),
            public_certificate: other.public_certificate.or(self.public_certificate),
            private_key: other.private_key.or(self.private_key),
            handshake_timeout: other.handshake_timeout.or(self.handshake_timeout),
            workers: other.workers.or(self.workers),
            queue_capacity: other.queue_capacity.or(self.queue_capacity),
            chunk_size: other.chunk_size.or(self.chunk_size),
            connect_timeout: other.connect_timeout.or(self.connect_timeout),
            shutdown_timeout: other.shutdown_timeout.or(self.shutdown_timeout),
            log_level: other.log_level.or(self.log_level),
        }
    }

    /// Resolve into a complete configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingRequiredValue` naming the first required
    /// value (source port, target port, certificate, key) that no source provided.
    pub fn resolve(self) -> Result<ForwarderConfig> {
        fn required<T>(value: Option<T>, name: &str) -> Result<T> {
            value.ok_or_else(|| ConfigError::MissingRequiredValue(name.to_string()))
        }

        Ok(ForwarderConfig {
            source_port: required(self.source_port, "source_port")?,
            target_port: required(self.target_port, "target_port")?,
            public_certificate: required(self.public_certificate, "public_certificate")?,
            private_key: required(self.private_key, "private_key")?,
            backlog: self.backlog.unwrap_or(defaults::BACKLOG),
            handshake_timeout: self.handshake_timeout.unwrap_or(defaults::HANDSHAKE_TIMEOUT_SECS),
            workers: self.workers.unwrap_or_else(defaults::workers),
            queue_capacity: self.queue_capacity,
            chunk_size: self.chunk_size.unwrap_or(defaults::CHUNK_SIZE),
            connect_timeout: self.connect_timeout.unwrap_or(defaults::CONNECT_TIMEOUT_SECS),
            shutdown_timeout: self.shutdown_timeout.unwrap_or(defaults::SHUTDOWN_TIMEOUT_SECS),
            log_level: self.log_level.unwrap_or_else(defaults::log_level),
        })
    }
}

/// Resolved forwarder configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForwarderConfig {
    /// Loopback port the forwarder listens on (0 picks an ephemeral port)
    pub source_port: u16,
    /// Loopback port of the backend
    pub target_port: u16,
    /// Listen backlog
    pub backlog: u32,
    /// PEM certificate chain presented to clients
    pub public_certificate: PathBuf,
    /// PEM private key matching the certificate
    pub private_key: PathBuf,
    /// TLS handshake timeout in seconds
    pub handshake_timeout: u64,
    /// Number of workers
    pub workers: usize,
    /// Work queue capacity, `None` for unbounded
    pub queue_capacity: Option<usize>,
    /// Bytes read per forwarding step
    pub chunk_size: usize,
    /// Backend connect timeout in seconds
    pub connect_timeout: u64,
    /// Grace period for in-flight sessions at shutdown, in seconds
    pub shutdown_timeout: u64,
    /// Log level
    pub log_level: String,
}

impl ForwarderConfig {
    /// Configuration with defaults for everything but the required values
    pub fn new(
        source_port: u16,
        target_port: u16,
        public_certificate: impl AsRef<Path>,
        private_key: impl AsRef<Path>,
    ) -> Self {
        Self {
            source_port,
            target_port,
            backlog: defaults::BACKLOG,
            public_certificate: public_certificate.as_ref().to_path_buf(),
            private_key: private_key.as_ref().to_path_buf(),
            handshake_timeout: defaults::HANDSHAKE_TIMEOUT_SECS,
            workers: defaults::workers(),
            queue_capacity: None,
            chunk_size: defaults::CHUNK_SIZE,
            connect_timeout: defaults::CONNECT_TIMEOUT_SECS,
            shutdown_timeout: defaults::SHUTDOWN_TIMEOUT_SECS,
            log_level: defaults::log_level(),
        }
    }

    /// Backend connect timeout
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }

    /// TLS handshake timeout
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout)
    }

    /// Shutdown grace period
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout)
    }

    /// Per-session settings derived from this configuration
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            target_port: self.target_port,
            chunk_size: self.chunk_size,
            connect_timeout: self.connect_timeout(),
        }
    }
}
