//! Public types for the transport session.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use wslog_protocol::constants::{
    WS_HANDSHAKE_TIMEOUT, WS_IDLE_TIMEOUT, WS_MAX_MESSAGE_SIZE, WS_PING_PERIOD,
};

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    /// WebSocket handshake in progress.
    Connecting = 0,
    /// Handshake completed; messages are flowing.
    Open = 1,
    /// `close()` was requested; shutdown in progress.
    Closing = 2,
    /// Connection ended. Terminal.
    Closed = 3,
}

impl SessionState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => SessionState::Connecting,
            1 => SessionState::Open,
            2 => SessionState::Closing,
            _ => SessionState::Closed,
        }
    }
}

/// Lock-free state cell shared between the session handle and its task.
#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn new(state: SessionState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub(crate) fn get(&self) -> SessionState {
        SessionState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Moves `Connecting` to `Open`. Fails if a close already started.
    pub(crate) fn mark_open(&self) -> bool {
        self.0
            .compare_exchange(
                SessionState::Connecting as u8,
                SessionState::Open as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Moves a live session to `Closing`. Returns `false` if it was
    /// already closing or closed.
    pub(crate) fn begin_close(&self) -> bool {
        self.0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| {
                match SessionState::from_u8(v) {
                    SessionState::Connecting | SessionState::Open => {
                        Some(SessionState::Closing as u8)
                    }
                    SessionState::Closing | SessionState::Closed => None,
                }
            })
            .is_ok()
    }

    pub(crate) fn mark_closed(&self) {
        self.0.store(SessionState::Closed as u8, Ordering::Release);
    }
}

/// Unique identity of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(uuid::Uuid);

impl SessionId {
    pub(crate) fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Events emitted by a session, in the order they happen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The handshake completed. Emitted at most once.
    Opened,
    /// One inbound text frame, in wire order.
    Message(String),
    /// The session reached [`SessionState::Closed`]. Always the last event.
    Closed,
}

/// Tuning for a session.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Maximum time allowed for the WebSocket handshake.
    pub handshake_timeout: Duration,
    /// Keepalive ping period. `None` disables pings.
    pub ping_interval: Option<Duration>,
    /// Silence after which the connection is treated as dead.
    /// `None` waits forever.
    pub idle_timeout: Option<Duration>,
    /// Frames and messages larger than this are refused.
    pub max_message_size: usize,
    /// Capacity of the event channel.
    pub event_buffer: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            handshake_timeout: WS_HANDSHAKE_TIMEOUT,
            ping_interval: Some(WS_PING_PERIOD),
            idle_timeout: Some(WS_IDLE_TIMEOUT),
            max_message_size: WS_MAX_MESSAGE_SIZE,
            event_buffer: 256,
        }
    }
}
