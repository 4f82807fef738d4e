//! # Call Engine
//!
//! Call-state arbitration for commbus. The [`CallModeManager`] listens to
//! every call event on the bus, keeps its own copy of the live calls and
//! publishes the resulting global [`CallMode`](commbus_comm_core::CallMode)
//! together with the audio route, ringtone and vibration requests that go
//! with it. It also alerts the user about incoming messages.
//!
//! [`ManagerModule`] packages the manager as the `manager` module.
//!
//! ```no_run
//! use commbus_call_engine::ManagerModule;
//! use commbus_comm_core::{CommContext, Module};
//!
//! let ctx = CommContext::shared();
//! let mut module = ManagerModule::new();
//! module.init(&ctx).expect("manager init");
//! ```

pub mod manager;
pub mod module;

pub use manager::CallModeManager;
pub use module::{ManagerModule, MODULE_NAME};
