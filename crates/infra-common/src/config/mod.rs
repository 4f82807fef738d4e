/*!
Configuration System

TOML configuration loading for the commbus stack:

- [`ConfigLoader`] reads a file or string into any deserializable type
- [`SelfValidating`] lets configuration types reject semantically invalid values
- [`ConfigSource`] records where a value came from, for diagnostics
*/

pub mod loader;
pub mod schema;

pub use loader::{ConfigLoader, ConfigSource};
pub use schema::SelfValidating;
