//! Read pump: turns inbound frames into session events.

use std::pin::Pin;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio::time::Sleep;
use tokio_tungstenite::tungstenite::{self, Message as WsMessage};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::types::SessionEvent;

/// Why the read loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReadEnd {
    /// `close()` was called.
    Cancelled,
    /// The server sent a close frame.
    RemoteClosed,
    /// The stream ended without a close frame.
    StreamEnded,
    /// Transport error while reading.
    Failed,
    /// Nothing arrived within the idle timeout.
    IdleTimeout,
    /// The event receiver was dropped.
    ObserverGone,
}

/// Settings the read loop needs from the session.
pub(crate) struct ReadConfig {
    pub(crate) idle_timeout: Option<Duration>,
    pub(crate) max_message_size: usize,
}

/// Reads frames until cancellation, disconnect or idle timeout.
///
/// Text frames become [`SessionEvent::Message`] in arrival order. Any
/// inbound frame resets the idle deadline. Pings are answered by
/// tungstenite itself.
pub(crate) async fn read_pump<S>(
    mut read: S,
    config: ReadConfig,
    events_tx: mpsc::Sender<SessionEvent>,
    cancel: CancellationToken,
) -> ReadEnd
where
    S: StreamExt<Item = Result<WsMessage, tungstenite::Error>> + Unpin,
{
    let mut deadline: Option<Pin<Box<Sleep>>> =
        config.idle_timeout.map(|t| Box::pin(tokio::time::sleep(t)));

    loop {
        let frame = tokio::select! {
            biased;
            _ = cancel.cancelled() => return ReadEnd::Cancelled,
            () = idle_expired(&mut deadline) => {
                warn!(idle_timeout = ?config.idle_timeout, "no frames received, treating connection as dead");
                return ReadEnd::IdleTimeout;
            }
            frame = read.next() => frame,
        };

        let msg = match frame {
            Some(Ok(msg)) => msg,
            Some(Err(e)) => {
                warn!("WebSocket read error: {e}");
                return ReadEnd::Failed;
            }
            None => {
                debug!("WebSocket stream ended");
                return ReadEnd::StreamEnded;
            }
        };

        if let (Some(d), Some(t)) = (deadline.as_mut(), config.idle_timeout) {
            d.as_mut().reset(tokio::time::Instant::now() + t);
        }

        match msg {
            WsMessage::Text(text) => {
                if text.len() > config.max_message_size {
                    warn!(
                        limit = config.max_message_size,
                        "message too large ({} bytes), dropping",
                        text.len()
                    );
                    continue;
                }
                trace!(len = text.len(), "received text frame");
                let event = SessionEvent::Message(text.as_str().to_owned());
                tokio::select! {
                    biased;
                    // Nothing is delivered once a close is requested.
                    _ = cancel.cancelled() => return ReadEnd::Cancelled,
                    sent = events_tx.send(event) => {
                        if sent.is_err() {
                            debug!("event receiver dropped");
                            return ReadEnd::ObserverGone;
                        }
                    }
                }
            }
            WsMessage::Ping(_) => trace!("received ping"),
            WsMessage::Pong(_) => trace!("received pong"),
            WsMessage::Close(frame) => {
                debug!(?frame, "received close frame");
                return ReadEnd::RemoteClosed;
            }
            WsMessage::Binary(data) => {
                debug!(len = data.len(), "ignoring binary frame");
            }
            WsMessage::Frame(_) => {}
        }
    }
}

/// Resolves when the idle deadline passes; never resolves without one.
async fn idle_expired(deadline: &mut Option<Pin<Box<Sleep>>>) {
    match deadline {
        Some(d) => d.as_mut().await,
        None => std::future::pending().await,
    }
}
