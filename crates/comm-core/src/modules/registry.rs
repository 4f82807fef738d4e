use super::{ExitStatus, Module, ModuleInfo, ModulesConfig};
use crate::context::CommContext;
use commbus_infra_common::{Error, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Builds a fresh instance of a module
pub type ModuleFactory = Arc<dyn Fn() -> Box<dyn Module> + Send + Sync>;

/// Table of the modules that can be loaded by name
#[derive(Clone, Default)]
pub struct ModuleCatalog {
    factories: BTreeMap<String, ModuleFactory>,
}

impl ModuleCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a module under `name`, replacing an earlier entry of the same name
    pub fn register<F, M>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> M + Send + Sync + 'static,
        M: Module + 'static,
    {
        let name = name.into();
        if self
            .factories
            .insert(name.clone(), Arc::new(move || Box::new(factory()) as Box<dyn Module>))
            .is_some()
        {
            debug!("Catalog entry {} replaced", name);
        }
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    fn instantiate(&self, name: &str) -> Option<Box<dyn Module>> {
        self.factories.get(name).map(|factory| factory())
    }
}

impl fmt::Debug for ModuleCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.factories.keys()).finish()
    }
}

/// Owns the loaded modules for the lifetime of a commbus instance
#[derive(Default)]
pub struct ModuleRegistry {
    modules: Vec<Box<dyn Module>>,
    initialized: usize,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the configured module lists against `catalog`.
    ///
    /// Unknown names are skipped. A module whose capabilities overlap an
    /// already accepted one is rejected, which also rejects a name that is
    /// listed twice. Fails when no accepted module provides `config.essential`.
    pub fn load(&mut self, catalog: &ModuleCatalog, config: &ModulesConfig) -> Result<()> {
        if let Some(path) = &config.path {
            debug!("Module path: {}", path.display());
        }

        for name in config.load_order() {
            let Some(module) = catalog.instantiate(name) else {
                warn!("Failed to load module {}: not in catalog", name);
                continue;
            };
            self.accept(module);
        }

        if self.provider_of(&config.essential).is_none() {
            error!(
                "Could not find a module providing the essential capability {}",
                config.essential
            );
            return Err(Error::MissingEssential(config.essential.clone()));
        }
        Ok(())
    }

    /// Offer an already built module; returns whether it was accepted
    pub fn accept(&mut self, module: Box<dyn Module>) -> bool {
        let info = module.info();
        if let Some((owner, capability)) = self
            .modules
            .iter()
            .find_map(|m| info.overlap(m.info()).map(|c| (m.info().name.clone(), c.to_string())))
        {
            warn!(
                "Module {} provides {} like module {}, and will not be loaded",
                info.name, capability, owner
            );
            return false;
        }
        info!("Loaded module {} (priority {})", info.name, info.priority);
        self.modules.push(module);
        true
    }

    /// Name of the accepted module providing `capability`
    pub fn provider_of(&self, capability: &str) -> Option<&str> {
        self.modules
            .iter()
            .map(|m| m.info())
            .find(|info| info.provides(capability))
            .map(|info| info.name.as_str())
    }

    /// Initialize every accepted module in acceptance order
    pub fn init_all(&mut self, ctx: &Arc<CommContext>) -> Result<()> {
        for module in self.modules.iter_mut().skip(self.initialized) {
            let name = module.info().name.clone();
            debug!("Initializing module {}", name);
            if let Err(e) = module.init(ctx) {
                error!("Failed to initialize module {}: {}", name, e);
                return Err(Error::module_init(name, e.to_string()));
            }
            self.initialized += 1;
        }
        info!("{} modules initialized", self.initialized);
        Ok(())
    }

    /// Run exit on every initialized module, then drop all modules
    pub fn exit_all(&mut self, ctx: &Arc<CommContext>) {
        for module in self.modules.iter_mut().take(self.initialized) {
            let name = module.info().name.clone();
            match module.exit(ctx) {
                ExitStatus::Done => debug!("Module {} exited", name),
                ExitStatus::Unsupported => debug!("Module {} has no exit entry point", name),
            }
        }
        let count = self.modules.len();
        self.modules.clear();
        self.initialized = 0;
        info!("{} modules unloaded", count);
    }

    pub fn accepted(&self) -> Vec<ModuleInfo> {
        self.modules.iter().map(|m| m.info().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("modules", &self.accepted())
            .field("initialized", &self.initialized)
            .finish()
    }
}
