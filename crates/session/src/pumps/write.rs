//! Writer task: sole owner of the sink half.
//!
//! The client never sends data on a log stream. Outbound traffic is the
//! keepalive ping and one close frame at the end.

use std::time::Duration;

use futures_util::{Sink, SinkExt};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_tungstenite::tungstenite::{self, Message as WsMessage};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// Pings every `keepalive` period until cancelled, then sends a single
/// close frame. A failed ping ends the task without one.
pub(crate) async fn write_pump<S>(
    mut write: S,
    keepalive: Option<Duration>,
    cancel: CancellationToken,
) where
    S: Sink<WsMessage, Error = tungstenite::Error> + Unpin,
{
    let mut ticker = keepalive.map(|period| {
        let mut t = tokio::time::interval_at(Instant::now() + period, period);
        t.set_missed_tick_behavior(MissedTickBehavior::Delay);
        t
    });

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            () = next_tick(&mut ticker) => {
                trace!("sending keepalive ping");
                if let Err(e) = write.send(WsMessage::Ping(Vec::new().into())).await {
                    warn!("keepalive ping failed: {e}");
                    return;
                }
            }
        }
    }

    debug!("sending close frame");
    if let Err(e) = write.send(WsMessage::Close(None)).await {
        debug!("close frame not sent: {e}");
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(t) => {
            t.tick().await;
        }
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::sink;
    use tokio::sync::mpsc;

    /// A sink that records every frame it is handed.
    fn recording_sink(
        tx: mpsc::UnboundedSender<WsMessage>,
    ) -> impl Sink<WsMessage, Error = tungstenite::Error> + Unpin {
        Box::pin(sink::unfold(tx, |tx, msg: WsMessage| async move {
            let _ = tx.send(msg);
            Ok::<_, tungstenite::Error>(tx)
        }))
    }

    #[tokio::test]
    async fn cancel_sends_exactly_one_close_frame() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(write_pump(recording_sink(tx), None, cancel.clone()));

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("should stop")
            .expect("no panic");

        assert!(matches!(rx.recv().await, Some(WsMessage::Close(None))));
        assert!(rx.recv().await.is_none(), "exactly one close frame");
    }

    #[tokio::test(start_paused = true)]
    async fn keepalive_pings_on_each_period() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(write_pump(
            recording_sink(tx),
            Some(Duration::from_secs(5)),
            cancel.clone(),
        ));

        // No ping at t=0; one at 5 s and one at 10 s.
        tokio::time::sleep(Duration::from_millis(10_500)).await;
        assert!(matches!(rx.try_recv(), Ok(WsMessage::Ping(_))));
        assert!(matches!(rx.try_recv(), Ok(WsMessage::Ping(_))));
        assert!(rx.try_recv().is_err());

        cancel.cancel();
        handle.await.unwrap();
        assert!(matches!(rx.recv().await, Some(WsMessage::Close(None))));
    }

    #[tokio::test(start_paused = true)]
    async fn no_keepalive_stays_silent_until_cancel() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(write_pump(recording_sink(tx), None, cancel.clone()));

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert!(rx.try_recv().is_err());

        cancel.cancel();
        handle.await.unwrap();
        assert!(matches!(rx.recv().await, Some(WsMessage::Close(None))));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_ping_ends_the_writer() {
        let failing = Box::pin(sink::unfold((), |(), _msg: WsMessage| async {
            Err::<(), _>(tungstenite::Error::ConnectionClosed)
        }));

        tokio::time::timeout(
            Duration::from_secs(60),
            write_pump(failing, Some(Duration::from_secs(1)), CancellationToken::new()),
        )
        .await
        .expect("writer should stop after the first failed ping");
    }
}
