/*!
Communication core for commbus.

Backends (modems, VoIP accounts, test stubs) and front-ends (GUI, storage,
notifiers, audio routing) never call each other. They exchange the values of
the [`types`] module over the named pipes of [`Datapipes`], and find each
other through the registries bundled in [`CommContext`]:

- [`backend::BackendRegistry`]: registered communication backends
- [`ui::UiRegistry`]: front-end actions such as showing the dialer
- [`rtconf::RtconfRegistry`]: user settings (ringer, vibration, tones)
- [`modules::ModuleRegistry`]: lifecycle of every loaded module

```no_run
use commbus_comm_core::{CommContext, types::CallMode};

let ctx = CommContext::shared();
ctx.pipes.call_mode.add_trigger("example", |mode: &CallMode| {
    println!("call mode is now {:?}", mode);
});
```
*/

pub mod backend;
pub mod context;
pub mod modules;
pub mod pipes;
pub mod rtconf;
pub mod types;
pub mod ui;

pub use backend::{Backend, BackendFlags, BackendRegistry, Scheme};
pub use commbus_infra_common::{Error, Filtered, Registration, Result};
pub use context::CommContext;
pub use modules::{ExitStatus, Module, ModuleCatalog, ModuleInfo, ModuleRegistry, ModulesConfig};
pub use pipes::Datapipes;
pub use rtconf::{RtconfRegistry, RtconfSettings, RuntimeConfig, SettingsRuntimeConfig, RTCONF_CAPABILITY};
pub use types::{
    AudioRoute, BackendId, Call, CallKey, CallMode, CallState, Contact, Message, Notification,
    VibrateKind,
};
pub use ui::{UiBundle, UiId, UiRegistry};
