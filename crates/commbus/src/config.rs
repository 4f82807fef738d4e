//! Top-level configuration document.
//!
//! ```toml
//! [logging]
//! level = "debug"
//!
//! [modules]
//! modules = ["rtconf-file", "manager"]
//! device_modules = ["loopback"]
//!
//! [rtconf]
//! ringer = true
//! vibration = false
//! call_sound = "/usr/share/sounds/ring.ogg"
//!
//! [loopback]
//! step_delay_ms = 3000
//! ```

use crate::modules::loopback::LoopbackConfig;
use commbus_comm_core::{ModulesConfig, RtconfSettings};
use commbus_infra_common::config::{ConfigLoader, ConfigSource, SelfValidating};
use commbus_infra_common::logging::LoggingConfig;
use commbus_infra_common::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CommbusConfig {
    pub logging: LoggingConfig,
    pub modules: ModulesConfig,
    pub rtconf: RtconfSettings,
    pub loopback: LoopbackConfig,
}

impl CommbusConfig {
    /// Load from a TOML file; a missing file yields the defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let (config, source): (Self, ConfigSource) = ConfigLoader::from_file_or_default(path)?;
        info!("Configuration loaded from {}", source);
        Ok(config)
    }

    pub fn from_toml(document: &str) -> Result<Self> {
        ConfigLoader::from_str(document)
    }

    /// The effective configuration as a TOML document
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

impl SelfValidating for CommbusConfig {
    fn validate(&self) -> Result<()> {
        commbus_infra_common::logging::parse_log_level(&self.logging.level)?;
        self.modules.validate()?;
        self.rtconf.validate()?;
        self.loopback.validate()
    }
}
