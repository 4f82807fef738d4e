use commbus_comm_core::rtconf::ProviderId;
use commbus_comm_core::{
    CommContext, ExitStatus, Module, ModuleInfo, Result, RtconfSettings, SettingsRuntimeConfig,
    RTCONF_CAPABILITY,
};
use std::sync::Arc;
use tracing::{debug, info};

pub const MODULE_NAME: &str = "rtconf-file";

/// Provides runtime configuration from the `[rtconf]` settings.
///
/// When the settings name a `store_path` that exists, the file overrides the
/// inline values and `save` writes back to it.
pub struct RtconfFileModule {
    info: ModuleInfo,
    settings: RtconfSettings,
    provider: Option<ProviderId>,
}

impl RtconfFileModule {
    pub fn new(settings: RtconfSettings) -> Self {
        Self {
            info: ModuleInfo::new(MODULE_NAME, &[RTCONF_CAPABILITY], 0),
            settings,
            provider: None,
        }
    }

    fn build_provider(&self) -> Result<SettingsRuntimeConfig> {
        match &self.settings.store_path {
            Some(path) if path.exists() => SettingsRuntimeConfig::load(path),
            _ => Ok(SettingsRuntimeConfig::new(self.settings.clone())),
        }
    }
}

impl Module for RtconfFileModule {
    fn info(&self) -> &ModuleInfo {
        &self.info
    }

    fn init(&mut self, ctx: &Arc<CommContext>) -> Result<()> {
        let provider = self.build_provider()?;
        let snapshot = provider.snapshot();
        info!(
            "Runtime configuration: ringer {}, vibration {}",
            snapshot.ringer, snapshot.vibration
        );
        self.provider = Some(ctx.rtconf.register(Arc::new(provider)));
        Ok(())
    }

    fn exit(&mut self, ctx: &Arc<CommContext>) -> ExitStatus {
        if let Some(id) = self.provider.take() {
            ctx.rtconf.unregister(id);
        }
        debug!("Runtime configuration provider removed");
        ExitStatus::Done
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_inline_settings_are_served() {
        let ctx = CommContext::shared();
        let mut module = RtconfFileModule::new(RtconfSettings {
            ringer: false,
            call_sound: Some(PathBuf::from("/sounds/ring.ogg")),
            ..Default::default()
        });
        module.init(&ctx).unwrap();
        assert!(!ctx.rtconf.ringer_enabled());
        assert!(ctx.rtconf.vibration_enabled());
        assert_eq!(ctx.rtconf.call_sound_path(), Some(PathBuf::from("/sounds/ring.ogg")));

        module.exit(&ctx);
        assert!(!ctx.rtconf.has_provider());
    }

    #[test]
    fn test_saved_settings_survive_restart() {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join("rtconf.toml");
        let settings = RtconfSettings {
            store_path: Some(store.clone()),
            ..Default::default()
        };

        let ctx = CommContext::shared();
        let mut module = RtconfFileModule::new(settings.clone());
        module.init(&ctx).unwrap();
        assert!(ctx.rtconf.set_vibration_enabled(false));
        assert!(ctx.rtconf.set_sms_sound_path(&PathBuf::from("/sounds/sms.ogg")));
        ctx.rtconf.save().unwrap();
        module.exit(&ctx);

        let ctx = CommContext::shared();
        let mut module = RtconfFileModule::new(settings);
        module.init(&ctx).unwrap();
        assert!(!ctx.rtconf.vibration_enabled());
        assert_eq!(ctx.rtconf.sms_sound_path(), Some(PathBuf::from("/sounds/sms.ogg")));
    }
}
