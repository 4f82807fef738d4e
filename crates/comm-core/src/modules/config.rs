use crate::rtconf::RTCONF_CAPABILITY;
use commbus_infra_common::config::SelfValidating;
use commbus_infra_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The `[modules]` table.
///
/// ```toml
/// [modules]
/// modules = ["rtconf-file", "manager"]
/// device_modules = ["loopback"]
/// user_modules = []
/// essential = "rtconf"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModulesConfig {
    /// Search path for out-of-tree modules; kept for diagnostics
    pub path: Option<PathBuf>,
    pub modules: Vec<String>,
    pub device_modules: Vec<String>,
    pub user_modules: Vec<String>,
    /// Capability that at least one accepted module must provide
    pub essential: String,
}

impl Default for ModulesConfig {
    fn default() -> Self {
        Self {
            path: None,
            modules: Vec::new(),
            device_modules: Vec::new(),
            user_modules: Vec::new(),
            essential: RTCONF_CAPABILITY.to_string(),
        }
    }
}

impl ModulesConfig {
    /// All configured names in load order
    pub fn load_order(&self) -> impl Iterator<Item = &str> {
        self.modules
            .iter()
            .chain(&self.device_modules)
            .chain(&self.user_modules)
            .map(String::as_str)
    }
}

impl SelfValidating for ModulesConfig {
    fn validate(&self) -> Result<()> {
        if self.essential.trim().is_empty() {
            return Err(Error::Validation("modules.essential must not be empty".into()));
        }
        if let Some(name) = self.load_order().find(|n| n.trim().is_empty()) {
            return Err(Error::Validation(format!("invalid module name {:?}", name)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use commbus_infra_common::config::ConfigLoader;

    #[test]
    fn test_lists_load_in_order() {
        let config: ModulesConfig = ConfigLoader::from_str(
            r#"
            modules = ["a", "b"]
            device_modules = ["modem"]
            user_modules = ["extra"]
            "#,
        )
        .unwrap();
        assert_eq!(config.load_order().collect::<Vec<_>>(), vec!["a", "b", "modem", "extra"]);
        assert_eq!(config.essential, "rtconf");
    }

    #[test]
    fn test_empty_essential_rejected() {
        let result: Result<ModulesConfig> = ConfigLoader::from_str(r#"essential = """#);
        assert!(matches!(result, Err(Error::Validation(_))));
    }
}
