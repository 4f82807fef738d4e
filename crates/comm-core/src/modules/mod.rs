/*!
Module System

Every publisher and consumer on the bus is a [`Module`]. Modules are compiled
in and described by a [`ModuleCatalog`]; the configuration names which ones
to load. The [`ModuleRegistry`] owns their lifecycle:

1. `load` resolves the configured names against the catalog, applies the
   duplicate-capability rule and checks that the essential capability is
   provided
2. `init_all` runs every accepted module's init in acceptance order; the
   first failure aborts startup
3. `exit_all` runs exit in the same order and drops the modules

A module attaches its pipe registrations and registry entries in `init` and
must remove all of them in `exit`.
*/

pub mod config;
pub mod registry;

pub use config::ModulesConfig;
pub use registry::{ModuleCatalog, ModuleFactory, ModuleRegistry};

use crate::context::CommContext;
use commbus_infra_common::Result;
use std::sync::Arc;

/// Static description of a module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleInfo {
    pub name: String,
    /// Capability tags; no two loaded modules may share one
    pub provides: Vec<String>,
    pub priority: i32,
}

impl ModuleInfo {
    pub fn new(name: impl Into<String>, provides: &[&str], priority: i32) -> Self {
        Self {
            name: name.into(),
            provides: provides.iter().map(|p| p.to_string()).collect(),
            priority,
        }
    }

    pub fn provides(&self, capability: &str) -> bool {
        self.provides.iter().any(|p| p == capability)
    }

    /// First capability shared with `other`, if any
    pub fn overlap<'a>(&'a self, other: &ModuleInfo) -> Option<&'a str> {
        self.provides
            .iter()
            .find(|p| other.provides(p))
            .map(String::as_str)
    }
}

/// Result of a module's exit entry point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Done,
    /// The module has no exit entry point
    Unsupported,
}

/// A loadable unit of functionality
pub trait Module: Send {
    fn info(&self) -> &ModuleInfo;

    /// Attach pipe registrations and registry entries
    fn init(&mut self, ctx: &Arc<CommContext>) -> Result<()>;

    /// Detach everything `init` attached
    fn exit(&mut self, _ctx: &Arc<CommContext>) -> ExitStatus {
        ExitStatus::Unsupported
    }
}
