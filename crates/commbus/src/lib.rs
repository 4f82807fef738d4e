/*!
# commbus

Telephony and messaging middleware core. Communication backends and
front-ends are modules that only talk through the datapipes of a shared
[`CommContext`]; the call engine derives the global call mode from their
events.

This crate ties the pieces together:

- [`Runtime`]: loads the configured modules, runs them, shuts them down
- [`BusLoop`]: the single task all bus activity runs on
- [`modules`]: built-in modules (`rtconf-file`, `loopback`, `manager`)
- [`CommbusConfig`]: the TOML configuration document

```no_run
use commbus::{CommbusConfig, Runtime};

# async fn run() -> commbus::Result<()> {
let config = CommbusConfig::load("/etc/commbus.toml")?;
Runtime::init_logging(&config)?;
let runtime = Runtime::start(config).await?;
// ...
runtime.stop().await;
# Ok(())
# }
```
*/

pub mod bus_loop;
pub mod config;
pub mod modules;
pub mod runtime;

pub use bus_loop::{BusHandle, BusLoop, Job};
pub use config::CommbusConfig;
pub use modules::builtin_catalog;
pub use runtime::Runtime;

pub use commbus_call_engine as call_engine;
pub use commbus_comm_core as comm_core;
pub use commbus_infra_common as infra_common;
pub use commbus_infra_common::{Error, Result};
