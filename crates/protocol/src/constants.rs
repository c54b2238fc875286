//! Protocol constants shared by the session and the driver.

use std::time::Duration;

/// Path the log service serves its stream on.
pub const DEFAULT_LOGS_PATH: &str = "/logs";

/// Host used when none is configured.
pub const DEFAULT_HOST: &str = "localhost";

/// Maximum time to wait for the WebSocket handshake.
pub const WS_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Interval between keepalive pings.
pub const WS_PING_PERIOD: Duration = Duration::from_secs(30);

/// Silence after which the connection is considered dead.
///
/// Any inbound frame resets the deadline, so it must be comfortably
/// larger than [`WS_PING_PERIOD`].
pub const WS_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

/// How long a closing session waits for its close frame to be written.
pub const WS_CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Maximum accepted frame/message size (1 MiB).
pub const WS_MAX_MESSAGE_SIZE: usize = 1024 * 1024;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_timeout_exceeds_ping_period() {
        assert!(WS_IDLE_TIMEOUT > WS_PING_PERIOD * 2);
    }

    #[test]
    fn logs_path_is_absolute() {
        assert!(DEFAULT_LOGS_PATH.starts_with('/'));
    }
}
