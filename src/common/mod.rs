//! Common module
//!
//! This module contains shared types, errors, and utility functions used throughout the application.

pub mod error;
pub mod fs;
pub mod log;
pub mod net;
pub mod types;

#[cfg(any(test, feature = "test-util"))]
pub mod test_utils;

// Re-export commonly used types and functions
pub use error::{ProxyError, Result, EXIT_BIND, EXIT_CERTIFICATE, EXIT_CONFIG};
pub use fs::{check_readable_file, read_file};
pub use self::log::init_logger;
pub use net::loopback;
pub use types::CertificateInfo;
