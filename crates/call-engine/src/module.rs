use crate::manager::CallModeManager;
use commbus_comm_core::{
    Call, CommContext, ExitStatus, Message, Module, ModuleInfo, Registration, Result,
};
use std::sync::{Arc, Weak};
use tracing::debug;

pub const MODULE_NAME: &str = "manager";

/// Wires a [`CallModeManager`] to the call and message pipes
pub struct ManagerModule {
    info: ModuleInfo,
    manager: Option<Arc<CallModeManager>>,
    registrations: Vec<Registration>,
}

impl ManagerModule {
    pub fn new() -> Self {
        Self {
            info: ModuleInfo::new(MODULE_NAME, &[MODULE_NAME], 10),
            manager: None,
            registrations: Vec::new(),
        }
    }

    /// The running manager, between init and exit
    pub fn manager(&self) -> Option<Arc<CallModeManager>> {
        self.manager.clone()
    }
}

impl Default for ManagerModule {
    fn default() -> Self {
        Self::new()
    }
}

/// Trigger body that is a no-op once the manager is gone
fn with_manager<T>(
    manager: &Arc<CallModeManager>,
    f: impl Fn(&CallModeManager, &T) + Send + Sync + 'static,
) -> impl Fn(&T) + Send + Sync + 'static {
    let weak: Weak<CallModeManager> = Arc::downgrade(manager);
    move |payload: &T| {
        if let Some(manager) = weak.upgrade() {
            f(&manager, payload);
        }
    }
}

impl Module for ManagerModule {
    fn info(&self) -> &ModuleInfo {
        &self.info
    }

    fn init(&mut self, ctx: &Arc<CommContext>) -> Result<()> {
        let manager = Arc::new(CallModeManager::new(ctx.clone()));
        let pipes = &ctx.pipes;

        self.registrations = vec![
            pipes.call_new.add_trigger(
                MODULE_NAME,
                with_manager(&manager, |m, call: &Call| m.on_call_new(call)),
            ),
            pipes.call_properties_changed.add_trigger(
                MODULE_NAME,
                with_manager(&manager, |m, call: &Call| m.on_call_changed(call)),
            ),
            pipes.message_received.add_trigger(
                MODULE_NAME,
                with_manager(&manager, |m, message: &Message| m.on_message_received(message)),
            ),
        ];
        self.manager = Some(manager);
        debug!("Call mode manager attached");
        Ok(())
    }

    fn exit(&mut self, ctx: &Arc<CommContext>) -> ExitStatus {
        let pipes = &ctx.pipes;
        let registrations = std::mem::take(&mut self.registrations);
        if let [call_new, call_changed, message_received] = registrations.as_slice() {
            pipes.call_new.remove(call_new);
            pipes.call_properties_changed.remove(call_changed);
            pipes.message_received.remove(message_received);
        }
        self.manager = None;
        debug!("Call mode manager detached");
        ExitStatus::Done
    }
}
