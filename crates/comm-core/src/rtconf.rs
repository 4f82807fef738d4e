//! # Runtime Configuration
//!
//! User-adjustable settings queried at runtime (vibration, ringer, ring and
//! message tones). Exactly one module provides them; its capability tag,
//! [`RTCONF_CAPABILITY`], is the one capability the module registry insists
//! on. Queries made while no provider is registered log a warning and answer
//! `false` / `None`.

use commbus_infra_common::config::{ConfigLoader, SelfValidating};
use commbus_infra_common::{Error, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Capability tag of runtime configuration providers
pub const RTCONF_CAPABILITY: &str = "rtconf";

/// A runtime configuration provider
pub trait RuntimeConfig: Send + Sync {
    fn vibration_enabled(&self) -> bool;
    fn set_vibration_enabled(&self, enabled: bool) -> bool;
    fn ringer_enabled(&self) -> bool;
    fn set_ringer_enabled(&self, enabled: bool) -> bool;
    fn call_sound_path(&self) -> Option<PathBuf>;
    fn set_call_sound_path(&self, path: &Path) -> bool;
    fn sms_sound_path(&self) -> Option<PathBuf>;
    fn set_sms_sound_path(&self, path: &Path) -> bool;
    /// Persist the current values
    fn save(&self) -> Result<()>;
}

/// Settings document, read from the `[rtconf]` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RtconfSettings {
    pub vibration: bool,
    pub ringer: bool,
    pub call_sound: Option<PathBuf>,
    pub sms_sound: Option<PathBuf>,
    /// Where `save` writes the settings; `None` keeps them in memory only
    pub store_path: Option<PathBuf>,
}

impl Default for RtconfSettings {
    fn default() -> Self {
        Self {
            vibration: true,
            ringer: true,
            call_sound: None,
            sms_sound: None,
            store_path: None,
        }
    }
}

impl SelfValidating for RtconfSettings {
    fn validate(&self) -> Result<()> {
        for (key, path) in [("call_sound", &self.call_sound), ("sms_sound", &self.sms_sound)] {
            if path.as_ref().is_some_and(|p| p.as_os_str().is_empty()) {
                return Err(Error::Validation(format!("rtconf.{} must not be empty", key)));
            }
        }
        Ok(())
    }
}

/// [`RuntimeConfig`] backed by an [`RtconfSettings`] value
#[derive(Debug, Default)]
pub struct SettingsRuntimeConfig {
    settings: RwLock<RtconfSettings>,
}

impl SettingsRuntimeConfig {
    pub fn new(settings: RtconfSettings) -> Self {
        Self {
            settings: RwLock::new(settings),
        }
    }

    /// Load from a TOML file, falling back to defaults when it does not exist.
    /// The file becomes the store path.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let (mut settings, source) = ConfigLoader::from_file_or_default::<RtconfSettings>(path)?;
        settings.store_path = Some(path.to_path_buf());
        debug!("Runtime configuration loaded from {}", source);
        Ok(Self::new(settings))
    }

    pub fn snapshot(&self) -> RtconfSettings {
        self.settings.read().clone()
    }
}

impl RuntimeConfig for SettingsRuntimeConfig {
    fn vibration_enabled(&self) -> bool {
        self.settings.read().vibration
    }

    fn set_vibration_enabled(&self, enabled: bool) -> bool {
        self.settings.write().vibration = enabled;
        true
    }

    fn ringer_enabled(&self) -> bool {
        self.settings.read().ringer
    }

    fn set_ringer_enabled(&self, enabled: bool) -> bool {
        self.settings.write().ringer = enabled;
        true
    }

    fn call_sound_path(&self) -> Option<PathBuf> {
        self.settings.read().call_sound.clone()
    }

    fn set_call_sound_path(&self, path: &Path) -> bool {
        if path.as_os_str().is_empty() {
            return false;
        }
        self.settings.write().call_sound = Some(path.to_path_buf());
        true
    }

    fn sms_sound_path(&self) -> Option<PathBuf> {
        self.settings.read().sms_sound.clone()
    }

    fn set_sms_sound_path(&self, path: &Path) -> bool {
        if path.as_os_str().is_empty() {
            return false;
        }
        self.settings.write().sms_sound = Some(path.to_path_buf());
        true
    }

    fn save(&self) -> Result<()> {
        let settings = self.snapshot();
        match &settings.store_path {
            Some(path) => ConfigLoader::save(&settings, path),
            None => {
                debug!("Runtime configuration has no store path, nothing to save");
                Ok(())
            }
        }
    }
}

/// Handle identifying a registered provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProviderId(u64);

/// Holds the single active [`RuntimeConfig`] provider
#[derive(Default)]
pub struct RtconfRegistry {
    provider: RwLock<Option<(ProviderId, Arc<dyn RuntimeConfig>)>>,
    next_id: AtomicU64,
}

impl RtconfRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a provider, replacing any previous one
    pub fn register(&self, provider: Arc<dyn RuntimeConfig>) -> ProviderId {
        let id = ProviderId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let previous = self.provider.write().replace((id, provider));
        if previous.is_some() {
            warn!("rtconf: replacing an already registered provider");
        } else {
            info!("rtconf: provider registered");
        }
        id
    }

    pub fn unregister(&self, id: ProviderId) -> bool {
        let mut slot = self.provider.write();
        match slot.as_ref() {
            Some((current, _)) if *current == id => {
                *slot = None;
                info!("rtconf: provider unregistered");
                true
            }
            _ => {
                warn!("rtconf: trying to unregister a provider that is not registered");
                false
            }
        }
    }

    pub fn has_provider(&self) -> bool {
        self.provider.read().is_some()
    }

    fn provider(&self, operation: &str) -> Option<Arc<dyn RuntimeConfig>> {
        let provider = self.provider.read().as_ref().map(|(_, p)| p.clone());
        if provider.is_none() {
            warn!("rtconf: {} used without backend", operation);
        }
        provider
    }

    pub fn vibration_enabled(&self) -> bool {
        self.provider("vibration_enabled")
            .is_some_and(|p| p.vibration_enabled())
    }

    pub fn set_vibration_enabled(&self, enabled: bool) -> bool {
        self.provider("set_vibration_enabled")
            .is_some_and(|p| p.set_vibration_enabled(enabled))
    }

    pub fn ringer_enabled(&self) -> bool {
        self.provider("ringer_enabled").is_some_and(|p| p.ringer_enabled())
    }

    pub fn set_ringer_enabled(&self, enabled: bool) -> bool {
        self.provider("set_ringer_enabled")
            .is_some_and(|p| p.set_ringer_enabled(enabled))
    }

    pub fn call_sound_path(&self) -> Option<PathBuf> {
        self.provider("call_sound_path")?.call_sound_path()
    }

    pub fn set_call_sound_path(&self, path: &Path) -> bool {
        self.provider("set_call_sound_path")
            .is_some_and(|p| p.set_call_sound_path(path))
    }

    pub fn sms_sound_path(&self) -> Option<PathBuf> {
        self.provider("sms_sound_path")?.sms_sound_path()
    }

    pub fn set_sms_sound_path(&self, path: &Path) -> bool {
        self.provider("set_sms_sound_path")
            .is_some_and(|p| p.set_sms_sound_path(path))
    }

    pub fn save(&self) -> Result<()> {
        match self.provider("save") {
            Some(p) => p.save(),
            None => Err(Error::NoProvider(RTCONF_CAPABILITY.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queries_without_provider_are_negative() {
        let registry = RtconfRegistry::new();
        assert!(!registry.has_provider());
        assert!(!registry.vibration_enabled());
        assert!(!registry.ringer_enabled());
        assert!(!registry.set_ringer_enabled(true));
        assert_eq!(registry.call_sound_path(), None);
        assert!(matches!(registry.save(), Err(Error::NoProvider(_))));
    }

    #[test]
    fn test_registered_provider_answers() {
        let registry = RtconfRegistry::new();
        let id = registry.register(Arc::new(SettingsRuntimeConfig::new(RtconfSettings {
            call_sound: Some(PathBuf::from("/usr/share/sounds/ring.wav")),
            ..Default::default()
        })));
        assert!(registry.vibration_enabled());
        assert!(registry.set_vibration_enabled(false));
        assert!(!registry.vibration_enabled());
        assert_eq!(registry.call_sound_path(), Some(PathBuf::from("/usr/share/sounds/ring.wav")));
        assert_eq!(registry.sms_sound_path(), None);
        assert!(!registry.set_sms_sound_path(Path::new("")));
        assert!(registry.save().is_ok());

        assert!(registry.unregister(id));
        assert!(!registry.unregister(id));
        assert!(!registry.ringer_enabled());
    }

    #[test]
    fn test_stale_provider_id_does_not_unregister_replacement() {
        let registry = RtconfRegistry::new();
        let old = registry.register(Arc::new(SettingsRuntimeConfig::default()));
        let _new = registry.register(Arc::new(SettingsRuntimeConfig::default()));
        assert!(!registry.unregister(old));
        assert!(registry.has_provider());
    }

    #[test]
    fn test_load_save_through_store_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rtconf.toml");

        let config = SettingsRuntimeConfig::load(&path).unwrap();
        assert_eq!(config.snapshot().store_path.as_deref(), Some(path.as_path()));
        assert!(config.ringer_enabled());
        assert!(config.set_ringer_enabled(false));
        assert!(config.set_call_sound_path(Path::new("/sounds/ring.ogg")));
        config.save().unwrap();

        let reloaded = SettingsRuntimeConfig::load(&path).unwrap();
        assert!(!reloaded.ringer_enabled());
        assert_eq!(reloaded.call_sound_path(), Some(PathBuf::from("/sounds/ring.ogg")));
    }

    #[test]
    fn test_empty_sound_path_fails_validation() {
        let settings = RtconfSettings {
            sms_sound: Some(PathBuf::new()),
            ..Default::default()
        };
        assert!(matches!(settings.validate(), Err(Error::Validation(_))));
        assert!(RtconfSettings::default().validate().is_ok());
    }
}
