//! One WebSocket connection to the log service.
//!
//! [`Session::open`] returns immediately; the handshake, the read loop and
//! the keepalive run on a background task that reports through a
//! [`SessionEvent`] channel. [`Session::close`] is idempotent.

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};

use wslog_protocol::constants::WS_CLOSE_TIMEOUT;
use wslog_protocol::endpoint::Endpoint;

use crate::pumps::read::{ReadConfig, ReadEnd, read_pump};
use crate::pumps::write::write_pump;
use crate::types::{SessionEvent, SessionId, SessionOptions, SessionState, StateCell};

/// A live (or finished) connection to the log service.
///
/// Owned by the driver that opened it. Dropping the session tears the
/// connection down without waiting for a close handshake.
pub struct Session {
    id: SessionId,
    endpoint: Endpoint,
    state: Arc<StateCell>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl Session {
    /// Starts connecting to `endpoint` and returns at once.
    ///
    /// Progress is reported on the returned receiver: `Opened` after the
    /// handshake, `Message` per text frame, and a final `Closed`.
    /// Connection failures are logged and end in `Closed`; they are never
    /// retried. Must be called from within a tokio runtime.
    pub fn open(
        endpoint: Endpoint,
        options: SessionOptions,
    ) -> (Self, mpsc::Receiver<SessionEvent>) {
        let id = SessionId::new();
        let state = Arc::new(StateCell::new(SessionState::Connecting));
        let cancel = CancellationToken::new();
        let (events_tx, events_rx) = mpsc::channel(options.event_buffer.max(1));

        let url = endpoint.url();
        let span = info_span!("session", session_id = %id, %url);
        let task = tokio::spawn(
            run(url, options, Arc::clone(&state), cancel.clone(), events_tx).instrument(span),
        );

        let session = Self {
            id,
            endpoint,
            state,
            cancel,
            task,
        };
        (session, events_rx)
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn state(&self) -> SessionState {
        self.state.get()
    }

    /// `true` once a close was requested or the connection ended.
    pub fn is_closed(&self) -> bool {
        matches!(self.state(), SessionState::Closing | SessionState::Closed)
    }

    /// Requests a graceful shutdown.
    ///
    /// Sends a close frame if the connection is open, or abandons the
    /// handshake if it is still connecting. Calling this on a session that
    /// is already closing or closed does nothing.
    pub fn close(&self) {
        if !self.state.begin_close() {
            debug!(session_id = %self.id, "close ignored, session already closing or closed");
            return;
        }
        info!(session_id = %self.id, "closing session");
        self.cancel.cancel();
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.task.abort();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("endpoint", &self.endpoint.url())
            .field("state", &self.state())
            .finish()
    }
}

/// Background task owning the connection for its whole life.
async fn run(
    url: String,
    options: SessionOptions,
    state: Arc<StateCell>,
    cancel: CancellationToken,
    events_tx: mpsc::Sender<SessionEvent>,
) {
    if let Some(end) = connect_and_stream(&url, &options, &state, &cancel, &events_tx).await {
        debug!(?end, "read loop finished");
    }

    state.mark_closed();
    info!("session closed");
    let _ = events_tx.send(SessionEvent::Closed).await;
}

/// Returns `None` when the connection never opened.
async fn connect_and_stream(
    url: &str,
    options: &SessionOptions,
    state: &StateCell,
    cancel: &CancellationToken,
    events_tx: &mpsc::Sender<SessionEvent>,
) -> Option<ReadEnd> {
    let connect = tokio::time::timeout(
        options.handshake_timeout,
        tokio_tungstenite::connect_async_with_config(
            url,
            Some(transport_config(options.max_message_size)),
            false,
        ),
    );

    let mut ws = tokio::select! {
        _ = cancel.cancelled() => {
            debug!("close requested during handshake");
            return None;
        }
        result = connect => match result {
            Ok(Ok((ws, _))) => ws,
            Ok(Err(e)) => {
                warn!("WebSocket connect failed: {e}");
                return None;
            }
            Err(_) => {
                warn!(timeout = ?options.handshake_timeout, "WebSocket handshake timed out");
                return None;
            }
        },
    };

    if !state.mark_open() {
        // close() won the race against the handshake.
        let _ = ws.close(None).await;
        return None;
    }
    info!("connected to logging service");
    if events_tx.send(SessionEvent::Opened).await.is_err() {
        return Some(ReadEnd::ObserverGone);
    }

    let (write, read) = ws.split();
    let write_handle =
        tokio::spawn(write_pump(write, options.ping_interval, cancel.clone()).in_current_span());

    let read_config = ReadConfig {
        idle_timeout: options.idle_timeout,
        max_message_size: options.max_message_size,
    };
    let end = read_pump(read, read_config, events_tx.clone(), cancel.clone()).await;

    // Stop the writer; it flushes a close frame on the way out.
    cancel.cancel();
    if tokio::time::timeout(WS_CLOSE_TIMEOUT, write_handle).await.is_err() {
        warn!("timed out sending close frame");
    }

    Some(end)
}

/// Hard transport ceiling as a multiple of the per-message limit.
const TRANSPORT_CEILING_FACTOR: usize = 16;

/// Transport limits for tungstenite.
///
/// The ceiling sits above `max_message_size` so an oversized text frame
/// reaches the read pump, which drops it and keeps the session alive.
/// Only frames past the ceiling fail the connection.
fn transport_config(max_message_size: usize) -> WebSocketConfig {
    let ceiling = max_message_size.saturating_mul(TRANSPORT_CEILING_FACTOR);
    let mut config = WebSocketConfig::default();
    config.max_message_size = Some(config.max_message_size.map_or(ceiling, |n| n.max(ceiling)));
    config.max_frame_size = Some(config.max_frame_size.map_or(ceiling, |n| n.max(ceiling)));
    config
}
