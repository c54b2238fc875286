//! Transport session for the wslog log stream.
//!
//! Owns one WebSocket connection to the logging service and surfaces its
//! lifecycle (opened, message, closed) as an ordered event channel.

mod pumps;
pub mod session;
pub mod types;

pub use session::Session;
pub use types::{SessionEvent, SessionId, SessionOptions, SessionState};
pub use wslog_protocol::Endpoint;
