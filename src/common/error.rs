//! Error handling module
//!
//! This module defines the error types and result type aliases used in the application.

use thiserror::Error;
use std::io;
use std::net::SocketAddr;

/// Exit code used when a required value is missing or a setting is invalid
pub const EXIT_CONFIG: u8 = 1;

/// Exit code used when the certificate or private key cannot be used
pub const EXIT_CERTIFICATE: u8 = 3;

/// Exit code used when the listen socket cannot be bound
pub const EXIT_BIND: u8 = 4;

/// TLS forwarder error type
#[derive(Error, Debug)]
pub enum ProxyError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// OpenSSL error
    #[error("OpenSSL error: {0}")]
    Ssl(#[from] openssl::error::ErrorStack),

    /// TLS handshake error
    #[error("TLS handshake error: {0}")]
    TlsHandshake(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Certificate error
    #[error("Certificate error: {0}")]
    Certificate(String),

    /// Listen socket could not be bound
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// Work queue no longer accepts sessions
    #[error("Work queue is closed")]
    QueueClosed,
}

impl ProxyError {
    /// Process exit code for errors that abort startup
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Certificate(_) | Self::Ssl(_) => EXIT_CERTIFICATE,
            Self::Bind { .. } => EXIT_BIND,
            _ => EXIT_CONFIG,
        }
    }
}

/// Result type alias
///
/// This is a `Result` type alias that uses our custom `ProxyError`.
pub type Result<T> = std::result::Result<T, ProxyError>;
