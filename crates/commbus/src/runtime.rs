use crate::bus_loop::{BusHandle, BusLoop};
use crate::config::CommbusConfig;
use crate::modules::builtin_catalog;
use commbus_comm_core::{CommContext, ModuleCatalog, ModuleInfo, ModuleRegistry};
use commbus_infra_common::logging::{log_welcome, setup_logging};
use commbus_infra_common::Result;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// A running commbus instance: context, bus loop and loaded modules
pub struct Runtime {
    ctx: Arc<CommContext>,
    bus: BusHandle,
    bus_task: JoinHandle<usize>,
    registry: Arc<Mutex<ModuleRegistry>>,
}

impl Runtime {
    /// Install the global log subscriber described by `config.logging`
    pub fn init_logging(config: &CommbusConfig) -> Result<()> {
        setup_logging(&config.logging)?;
        log_welcome(&config.logging.app_name, env!("CARGO_PKG_VERSION"));
        Ok(())
    }

    /// Start with the built-in module catalog
    pub async fn start(config: CommbusConfig) -> Result<Self> {
        Self::start_with(config, builtin_catalog).await
    }

    /// Start with a custom catalog.
    ///
    /// Must be called from within a tokio runtime. Modules are loaded and
    /// initialized on the bus loop. On failure every module that was
    /// initialized is exited again and the bus loop is stopped.
    pub async fn start_with<F>(config: CommbusConfig, catalog: F) -> Result<Self>
    where
        F: FnOnce(&CommbusConfig, &BusHandle) -> ModuleCatalog,
    {
        let ctx = CommContext::shared();
        let (bus, bus_task) = BusLoop::spawn(ctx.clone());
        let catalog = catalog(&config, &bus);
        let registry = Arc::new(Mutex::new(ModuleRegistry::new()));

        let modules = config.modules.clone();
        let loading = registry.clone();
        let started = bus
            .call(move |ctx| {
                let mut registry = loading.lock();
                let started = registry
                    .load(&catalog, &modules)
                    .and_then(|()| registry.init_all(ctx));
                if started.is_err() {
                    registry.exit_all(ctx);
                    ctx.teardown();
                }
                started
            })
            .await
            .and_then(|started| started);

        if let Err(e) = started {
            error!("Startup failed: {}", e);
            bus.shutdown();
            if let Err(join) = bus_task.await {
                warn!("Bus loop ended abnormally: {}", join);
            }
            return Err(e);
        }

        info!("commbus started with {} modules", registry.lock().len());
        Ok(Self {
            ctx,
            bus,
            bus_task,
            registry,
        })
    }

    pub fn context(&self) -> &Arc<CommContext> {
        &self.ctx
    }

    pub fn bus(&self) -> &BusHandle {
        &self.bus
    }

    pub fn modules(&self) -> Vec<ModuleInfo> {
        self.registry.lock().accepted()
    }

    /// Exit every module on the bus loop, stop it and tear down the pipes.
    ///
    /// Jobs queued before this call run first. Returns the number of pipe
    /// registrations modules failed to remove.
    pub async fn stop(self) -> usize {
        let exiting = self.registry.clone();
        let leftover = match self
            .bus
            .call(move |ctx| {
                exiting.lock().exit_all(ctx);
                ctx.teardown()
            })
            .await
        {
            Ok(leftover) => leftover,
            Err(e) => {
                warn!("Exiting modules off the bus: {}", e);
                self.registry.lock().exit_all(&self.ctx);
                self.ctx.teardown()
            }
        };
        self.bus.shutdown();
        match self.bus_task.await {
            Ok(jobs) => info!("commbus stopped, {} bus jobs run", jobs),
            Err(e) => warn!("Bus loop ended abnormally: {}", e),
        }
        leftover
    }
}
