//! Configuration module
//!
//! This module handles application configuration: defaults, the optional JSON
//! configuration file, command line values, and validation.

pub mod defaults;
pub mod error;
mod loader;
mod types;
mod validator;

pub use self::defaults::ENV_PREFIX;
pub use self::error::ConfigError;
pub use self::loader::{load_file, ConfigLoader};
pub use self::types::{ConfigValues, ForwarderConfig};
