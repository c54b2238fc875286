//! Wire types for the wslog log-streaming client.
//!
//! Holds the endpoint model, the log event document pushed by the service
//! and the normalizer that turns one event into one display line.

pub mod constants;
pub mod endpoint;
pub mod event;

pub use endpoint::{Endpoint, EndpointError, Scheme};
pub use event::{Container, EventError, LogEvent, NormalizedLine, normalize, source_name};
