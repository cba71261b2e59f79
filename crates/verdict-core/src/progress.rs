//! Progress reporting and per-run context
//!
//! A [`ProgressSink`] is supplied once per batch. The runtime hands every
//! engine its own [`RunContext`] that wraps the shared sink and stamps each
//! event with the engine's name, so a single sink receives a correctly
//! attributed, interleaved stream. Events from one engine arrive in the order
//! they were reported; no ordering is promised across engines.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// One progress report from a running engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Engine the event belongs to
    pub engine: String,
    /// Free-form stage label (e.g. "fetch", "compute")
    pub stage: String,
    /// Completion estimate in [0, 100]; not guaranteed to be monotonic
    pub percent: f64,
    /// Human-readable note
    pub note: String,
}

impl ProgressEvent {
    pub fn new(
        engine: impl Into<String>,
        stage: impl Into<String>,
        percent: f64,
        note: impl Into<String>,
    ) -> Self {
        let percent = if percent.is_nan() {
            0.0
        } else {
            percent.clamp(0.0, 100.0)
        };
        Self {
            engine: engine.into(),
            stage: stage.into(),
            percent,
            note: note.into(),
        }
    }
}

/// Destination for progress events
///
/// Cheap to clone; every clone feeds the same destination.
#[derive(Clone)]
pub struct ProgressSink {
    inner: Arc<dyn Fn(ProgressEvent) + Send + Sync>,
}

impl ProgressSink {
    /// Sink backed by a callback
    ///
    /// The callback runs on the reporting engine's task and should return
    /// quickly.
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(ProgressEvent) + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(callback),
        }
    }

    /// Sink backed by an unbounded tokio channel
    ///
    /// Events sent after the receiver is dropped are discarded.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = Self::new(move |event| {
            if tx.send(event).is_err() {
                tracing::trace!("progress receiver dropped, discarding event");
            }
        });
        (sink, rx)
    }

    /// Deliver an event
    pub fn emit(&self, event: ProgressEvent) {
        (self.inner)(event);
    }
}

impl fmt::Debug for ProgressSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressSink").finish_non_exhaustive()
    }
}

/// Per-engine execution context passed to [`AnalysisEngine::run`](crate::AnalysisEngine::run)
///
/// Carries the progress adapter for this engine and the batch's cooperative
/// cancellation signal.
#[derive(Debug, Clone)]
pub struct RunContext {
    engine: Arc<str>,
    sink: Option<ProgressSink>,
    cancel: CancellationToken,
}

impl RunContext {
    /// Create a context for `engine`
    pub fn new(engine: impl Into<Arc<str>>, sink: Option<ProgressSink>, cancel: CancellationToken) -> Self {
        Self {
            engine: engine.into(),
            sink,
            cancel,
        }
    }

    /// Context with no progress sink and a fresh cancellation token
    ///
    /// Useful when running an engine directly, outside a batch.
    pub fn detached(engine: impl Into<Arc<str>>) -> Self {
        Self::new(engine, None, CancellationToken::new())
    }

    /// Name of the engine this context belongs to
    pub fn engine_name(&self) -> &str {
        &self.engine
    }

    /// Whether a caller is listening for progress
    pub fn has_sink(&self) -> bool {
        self.sink.is_some()
    }

    /// Report progress, tagged with this context's engine name
    pub fn report(&self, stage: impl Into<String>, percent: f64, note: impl Into<String>) {
        if let Some(sink) = &self.sink {
            sink.emit(ProgressEvent::new(&*self.engine, stage, percent, note));
        }
    }

    /// Whether the batch has asked engines to stop
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolve once the batch asks engines to stop
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await;
    }

    /// Return an execution error if cancellation has been requested
    ///
    /// Convenient at stage boundaries: `ctx.check_cancelled()?;`
    pub fn check_cancelled(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::execution(&*self.engine, "cancelled"))
        } else {
            Ok(())
        }
    }

    /// The underlying token, for engines that spawn their own work
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }
}
