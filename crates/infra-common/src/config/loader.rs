use crate::config::schema::SelfValidating;
use crate::errors::types::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Source a configuration was loaded from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Built-in defaults
    Default,
    /// A TOML file on disk
    File(PathBuf),
    /// An in-memory TOML document
    Inline,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "defaults"),
            ConfigSource::File(path) => write!(f, "{}", path.display()),
            ConfigSource::Inline => write!(f, "inline"),
        }
    }
}

/// Loads TOML configuration documents
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigLoader;

impl ConfigLoader {
    /// Parse and validate a configuration from a TOML string
    pub fn from_str<T>(document: &str) -> Result<T>
    where
        T: DeserializeOwned + SelfValidating,
    {
        let config: T = toml::from_str(document)?;
        config.validate_after_load()
    }

    /// Read, parse and validate a configuration file
    pub fn from_file<T>(path: impl AsRef<Path>) -> Result<T>
    where
        T: DeserializeOwned + SelfValidating,
    {
        let path = path.as_ref();
        debug!("Loading configuration from {}", path.display());
        let document = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_str(&document)
    }

    /// Read a configuration file, falling back to defaults when it does not exist
    pub fn from_file_or_default<T>(path: impl AsRef<Path>) -> Result<(T, ConfigSource)>
    where
        T: DeserializeOwned + SelfValidating + Default,
    {
        let path = path.as_ref();
        if path.exists() {
            Ok((Self::from_file(path)?, ConfigSource::File(path.to_path_buf())))
        } else {
            debug!("{} does not exist, using defaults", path.display());
            Ok((T::default().validate_after_load()?, ConfigSource::Default))
        }
    }

    /// Serialize a configuration back to disk
    pub fn save<T: Serialize>(config: &T, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let document = toml::to_string_pretty(config)?;
        std::fs::write(path, document)?;
        debug!("Saved configuration to {}", path.display());
        Ok(())
    }
}
