/*!
Event System

The datapipe is the only channel between commbus components. A [`Pipe`] is a
named, typed channel with an ordered chain of filters (which may rewrite or
drop a payload) followed by an ordered list of triggers (which observe the
surviving payload). Publishing is synchronous: `publish` returns once every
filter and trigger has run, so nested publishes from inside a trigger are
fully ordered.
*/

pub mod pipe;

pub use pipe::{Filtered, Pipe, PipeId, Registration, RegistrationKind};
