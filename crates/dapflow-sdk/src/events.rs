use std::pin::Pin;
use std::task::{Context, Poll};

use futures::stream::Stream;
use tokio::sync::{broadcast, mpsc};

pub use dapflow_runtime::DebugEvent;

/// Live stream of session lifecycle and stop events.
///
/// Bridges the core's broadcast fan-out to an unbounded channel so a slow
/// consumer only loses events if it lags far behind; lagged events are
/// logged and skipped.
pub struct EventStream {
    receiver: mpsc::UnboundedReceiver<DebugEvent>,
}

impl EventStream {
    pub(crate) fn new(mut source: broadcast::Receiver<DebugEvent>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            loop {
                match source.recv().await {
                    Ok(event) => {
                        if tx.send(event).is_err() {
                            break; // Stream dropped
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "event stream lagged; events dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Self { receiver: rx }
    }

    /// Poll for the next event (non-blocking).
    ///
    /// Returns `None` if no event is available immediately.
    pub fn try_next(&mut self) -> Option<DebugEvent> {
        self.receiver.try_recv().ok()
    }
}

impl Stream for EventStream {
    type Item = DebugEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}
