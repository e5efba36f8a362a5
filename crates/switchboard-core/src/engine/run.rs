//! Streamed run handle

use std::future::Future;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{EngineEvent, RunResult};
use crate::error::{Error, Result};

/// Sending half handed to the producer of a streamed run
#[derive(Debug, Clone)]
pub struct EventEmitter {
    tx: Option<mpsc::UnboundedSender<EngineEvent>>,
}

impl EventEmitter {
    /// Emitter that discards everything, for non-streamed runs
    pub fn noop() -> Self {
        Self { tx: None }
    }

    pub fn emit(&self, event: EngineEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.tx.is_some()
    }
}

/// Handle over a streamed engine run.
///
/// Drain events with `next_event` until it returns `None`, then call `finish`
/// for the result. Dropping the handle cancels the producing task.
pub struct StreamedRun {
    events: mpsc::UnboundedReceiver<EngineEvent>,
    result: Option<oneshot::Receiver<Result<RunResult>>>,
    cancel: CancellationToken,
}

impl StreamedRun {
    /// Spawn `producer` as a cancellable task feeding a new handle.
    pub fn spawn<F, Fut>(producer: F) -> Self
    where
        F: FnOnce(EventEmitter) -> Fut,
        Fut: Future<Output = Result<RunResult>> + Send + 'static,
    {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (result_tx, result_rx) = oneshot::channel();
        let cancel = CancellationToken::new();

        let run = producer(EventEmitter { tx: Some(event_tx) });
        let token = cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!("Streamed run cancelled");
                }
                result = run => {
                    let _ = result_tx.send(result);
                }
            }
        });

        Self {
            events: event_rx,
            result: Some(result_rx),
            cancel,
        }
    }

    /// Next event in production order; `None` once the producer has stopped.
    pub async fn next_event(&mut self) -> Option<EngineEvent> {
        self.events.recv().await
    }

    /// Wait for the run's result. Events not yet consumed are discarded.
    pub async fn finish(mut self) -> Result<RunResult> {
        let rx = self
            .result
            .take()
            .ok_or_else(|| Error::Engine("run result already taken".into()))?;
        rx.await
            .map_err(|_| Error::Engine("run ended without producing a result".into()))?
    }
}

impl Drop for StreamedRun {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
