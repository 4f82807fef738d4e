//! Built-in modules and the catalog that names them.

pub mod loopback;
pub mod rtconf_file;

use crate::bus_loop::BusHandle;
use crate::config::CommbusConfig;
use commbus_call_engine::ManagerModule;
use commbus_comm_core::ModuleCatalog;
use loopback::LoopbackModule;
use rtconf_file::RtconfFileModule;

/// Catalog of the modules shipped with commbus:
///
/// | Name | Provides |
/// |---|---|
/// | `rtconf-file` | `rtconf` |
/// | `loopback` | `loopback` |
/// | `manager` | `manager` |
pub fn builtin_catalog(config: &CommbusConfig, bus: &BusHandle) -> ModuleCatalog {
    let mut catalog = ModuleCatalog::new();

    let rtconf = config.rtconf.clone();
    catalog.register(rtconf_file::MODULE_NAME, move || {
        RtconfFileModule::new(rtconf.clone())
    });

    let (bus, loopback) = (bus.clone(), config.loopback.clone());
    catalog.register(loopback::MODULE_NAME, move || {
        LoopbackModule::new(bus.clone(), loopback.clone())
    });

    catalog.register(commbus_call_engine::MODULE_NAME, ManagerModule::new);
    catalog
}
