//! The registry bundle every module receives at init and exit.

use crate::backend::BackendRegistry;
use crate::pipes::Datapipes;
use crate::rtconf::RtconfRegistry;
use crate::ui::UiRegistry;
use std::sync::Arc;
use tracing::{info, warn};

/// Shared state of one commbus instance
pub struct CommContext {
    pub pipes: Arc<Datapipes>,
    pub backends: BackendRegistry,
    pub ui: UiRegistry,
    pub rtconf: RtconfRegistry,
}

impl CommContext {
    pub fn new() -> Self {
        let pipes = Arc::new(Datapipes::new());
        Self {
            backends: BackendRegistry::new(pipes.clone()),
            ui: UiRegistry::new(pipes.clone()),
            rtconf: RtconfRegistry::new(),
            pipes,
        }
    }

    /// Convenience for `Arc::new(CommContext::new())`
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Detach everything still attached to the pipes; returns how many
    /// registrations were left behind by their owners.
    pub fn teardown(&self) -> usize {
        let leftover = self.pipes.teardown();
        if leftover > 0 {
            warn!("{} pipe registrations were still attached at teardown", leftover);
        } else {
            info!("All pipes were clean at teardown");
        }
        leftover
    }
}

impl Default for CommContext {
    fn default() -> Self {
        Self::new()
    }
}
