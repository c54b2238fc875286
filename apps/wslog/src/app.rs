//! Driver: owns the session, normalizes each payload and writes lines.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Sleep;
use tracing::{debug, info, trace, warn};

use wslog_protocol::{Endpoint, normalize};
use wslog_session::{Session, SessionEvent};

use crate::config::Config;
use crate::sink::{self, LineSink};

/// Counters reported when the stream ends.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    /// Lines written to the sink.
    pub lines: u64,
    /// Payloads dropped because they did not decode.
    pub malformed: u64,
}

/// Consumes session events one at a time and renders them.
pub struct Driver<S> {
    sink: S,
    stats: Stats,
    /// Set once `close()` has been requested; later messages are ignored.
    closing: bool,
}

impl<S: LineSink> Driver<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            stats: Stats::default(),
            closing: false,
        }
    }

    pub fn stats(&self) -> Stats {
        self.stats
    }

    #[cfg(test)]
    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Handles one event. Returns `false` once the session has closed.
    pub fn handle(&mut self, event: SessionEvent) -> bool {
        match event {
            SessionEvent::Opened => {
                debug!("log stream opened");
                true
            }
            SessionEvent::Message(payload) => {
                if self.closing {
                    trace!("ignoring message delivered after close");
                } else {
                    self.render(&payload);
                }
                true
            }
            SessionEvent::Closed => false,
        }
    }

    fn render(&mut self, payload: &str) {
        let line = match normalize(payload) {
            Ok(line) => line,
            Err(e) => {
                self.stats.malformed += 1;
                warn!(len = payload.len(), "dropping event: {e}");
                return;
            }
        };
        match self.sink.write_line(&line) {
            Ok(()) => self.stats.lines += 1,
            Err(e) => warn!(source = %line.source, "failed to write log line: {e}"),
        }
    }

    /// Follows `session` until it closes.
    ///
    /// When `shutdown` resolves the session is asked to close; the driver
    /// then waits at most `grace` for the final `Closed` event.
    pub async fn follow(
        &mut self,
        session: &Session,
        events: &mut mpsc::Receiver<SessionEvent>,
        shutdown: impl Future<Output = ()>,
        grace: Duration,
    ) {
        tokio::pin!(shutdown);
        let mut grace_timer: Option<Pin<Box<Sleep>>> = None;

        loop {
            tokio::select! {
                () = &mut shutdown, if !self.closing => {
                    info!(session_id = %session.id(), "teardown requested");
                    session.close();
                    self.closing = true;
                    grace_timer = Some(Box::pin(tokio::time::sleep(grace)));
                }
                () = grace_elapsed(&mut grace_timer) => {
                    warn!(?grace, "session did not finish closing in time");
                    break;
                }
                event = events.recv() => match event {
                    Some(event) => {
                        if !self.handle(event) {
                            break;
                        }
                    }
                    None => break,
                },
            }
        }
    }
}

async fn grace_elapsed(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(t) => t.as_mut().await,
        None => std::future::pending().await,
    }
}

/// Resolves on Ctrl-C, or SIGTERM on Unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("SIGINT received, shutting down"),
        _ = terminate => info!("SIGTERM received, shutting down"),
    }
}

/// Streams logs from `endpoint` until the session ends or the process is
/// asked to stop.
pub async fn run(config: Config, endpoint: Endpoint) -> anyhow::Result<Stats> {
    let (session, mut events) = Session::open(endpoint, config.session_options());
    info!(session_id = %session.id(), url = %session.endpoint(), "connecting to logging service");

    let mut driver = Driver::new(sink::for_output(config.output));
    driver
        .follow(&session, &mut events, shutdown_signal(), config.shutdown_grace())
        .await;

    // Idempotent: covers the path where the server ended the stream.
    session.close();
    Ok(driver.stats())
}
