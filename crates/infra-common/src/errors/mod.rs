/*!
Error Handling

Common error types for the commbus stack. Logic errors on the bus (removing
an unknown registration, unmatched call events) are never represented here:
they are logged and treated as no-ops. Only conditions a caller must act on
become an [`Error`].
*/

pub mod types;

pub use types::{Error, Result};
