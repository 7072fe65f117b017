//! Configuration loader
//!
//! Layers configuration sources, lowest priority first:
//! 1. Built-in defaults (applied when resolving)
//! 2. JSON configuration file
//! 3. Explicit values (command line arguments and their environment fallbacks)

use std::path::{Path, PathBuf};
use log::debug;
use ::config::{Config, File, FileFormat};

use crate::config::error::{ConfigError, Result};
use crate::config::types::{ConfigValues, ForwarderConfig};

/// Configuration loader
///
/// Provides a fluent API for building configuration from multiple sources.
#[derive(Debug)]
pub struct ConfigLoader {
    file: Option<PathBuf>,
    overrides: ConfigValues,
    validate: bool,
}

impl ConfigLoader {
    /// Create a new loader with validation enabled
    pub fn new() -> Self {
        Self {
            file: None,
            overrides: ConfigValues::default(),
            validate: true,
        }
    }

    /// Read a JSON configuration file below the explicit values
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        let path = path.as_ref();
        debug!("Adding file configuration source: {}", path.display());
        self.file = Some(path.to_path_buf());
        self
    }

    /// Layer explicit values on top of everything else
    pub fn with_values(mut self, values: ConfigValues) -> Self {
        self.overrides = self.overrides.merge(values);
        self
    }

    /// Disable validation
    pub fn without_validation(mut self) -> Self {
        self.validate = false;
        self
    }

    /// Build the configuration
    pub fn load(self) -> Result<ForwarderConfig> {
        let mut values = ConfigValues::default();

        if let Some(path) = &self.file {
            values = values.merge(load_file(path)?);
        }

        let config = values.merge(self.overrides).resolve()?;

        if self.validate {
            debug!("Validating configuration");
            config.validate()?;
        }

        Ok(config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Load configuration values from a JSON file
pub fn load_file(path: &Path) -> Result<ConfigValues> {
    if !path.is_file() {
        return Err(ConfigError::FileReadError(
            path.to_path_buf(),
            "file not found".to_string(),
        ));
    }

    debug!("Loading configuration from file: {}", path.display());

    let settings = Config::builder()
        .add_source(File::from(path).format(FileFormat::Json).required(true))
        .build()?;

    settings.try_deserialize::<ConfigValues>().map_err(|e| {
        ConfigError::ParseError(format!("Error parsing {}: {}", path.display(), e))
    })
}
