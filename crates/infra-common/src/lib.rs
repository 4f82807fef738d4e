/*!
Common infrastructure for the commbus stack.

- [`errors`]: the error taxonomy shared by every crate
- [`logging`]: `tracing` subscriber setup
- [`config`]: TOML configuration loading and validation
- [`events`]: the synchronous datapipe primitive every component talks through
*/

pub mod config;
pub mod errors;
pub mod events;
pub mod logging;

pub use errors::{Error, Result};
pub use events::{Filtered, Pipe, PipeId, Registration};
