use std::io;
use thiserror::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types for the commbus stack
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// A module's init entry point failed; startup is aborted.
    #[error("Module {module} failed to initialize: {reason}")]
    ModuleInit { module: String, reason: String },

    /// No accepted module provides the essential capability.
    #[error("Could not find a module providing the essential capability '{0}'")]
    MissingEssential(String),

    /// A registry was queried while no provider was registered.
    #[error("No provider registered for {0}")]
    NoProvider(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn module_init(module: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::ModuleInit {
            module: module.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error must abort process startup.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::ModuleInit { .. } | Error::MissingEssential(_))
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(e: toml::ser::Error) -> Self {
        Error::Config(e.to_string())
    }
}
