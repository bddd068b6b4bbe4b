//! Job-run progress subscription.
//!
//! A [`ProgressMonitor`] follows one job run at a time through a
//! server-sent-event stream carrying `progress`, `complete`, `failed` and
//! `error` events. It is an explicit state machine:
//!
//! ```text
//! Closed --watch--> Connecting --connected--> Streaming --progress--> Streaming
//!                        |                        |--complete--> Completed
//!                        |                        |--failed----> Failed
//!                        +--transport error-------+--error-----> Closed
//! ```
//!
//! Terminal transitions release the event source before the handler runs,
//! and each handler callback for a terminal outcome fires at most once per
//! subscription. Nothing is retried here; a transport error ends the
//! subscription and is reported through [`ProgressHandler::on_error`].

use std::{fmt, io::BufRead};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sse::{SseFrame, SseReader};

pub type JobRunId = u64;

#[derive(Debug, Error)]
pub enum ProgressError {
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not subscribe to job run {run_id}: {message}")]
    Connect { run_id: JobRunId, message: String },
    #[error("event stream ended before the run reached a terminal state")]
    StreamEnded,
    #[error("server reported an error: {0}")]
    Server(String),
    #[error("malformed '{event}' payload: {source}")]
    MalformedPayload {
        event: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Retrying,
    Cancelled,
    Paused,
    /// Any status this client does not know yet.
    #[serde(other)]
    Unknown,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::Retrying => "retrying",
            RunStatus::Cancelled => "cancelled",
            RunStatus::Paused => "paused",
            RunStatus::Unknown => "unknown",
        }
    }
}

/// Status payload carried by every run event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub job_id: Option<i64>,
    pub status: RunStatus,
    #[serde(default)]
    pub progress_percentage: Option<f64>,
    #[serde(default)]
    pub rows_processed: Option<u64>,
    #[serde(default)]
    pub rows_total: Option<u64>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub completed_at: Option<String>,
}

impl fmt::Display for ProgressSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.status.as_str())?;
        if let Some(pct) = self.progress_percentage {
            write!(f, " {pct:.0}%")?;
        }
        match (self.rows_processed, self.rows_total) {
            (Some(done), Some(total)) if total > 0 => write!(f, " ({done}/{total} rows)")?,
            (Some(done), _) => write!(f, " ({done} rows)")?,
            _ => {}
        }
        if let Some(message) = self.message.as_deref().filter(|m| !m.is_empty()) {
            write!(f, " - {message}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Progress(ProgressSnapshot),
    Complete(ProgressSnapshot),
    Failed(ProgressSnapshot),
    Error(String),
}

#[derive(Deserialize)]
struct ErrorPayload {
    #[serde(alias = "message")]
    error: String,
}

impl ProgressEvent {
    /// Interprets a decoded frame. Unknown event names yield `Ok(None)`.
    pub fn from_frame(frame: &SseFrame) -> Result<Option<Self>, ProgressError> {
        let snapshot = || {
            serde_json::from_str::<ProgressSnapshot>(&frame.data).map_err(|source| {
                ProgressError::MalformedPayload {
                    event: frame.event.clone(),
                    source,
                }
            })
        };
        let event = match frame.event.as_str() {
            "progress" => ProgressEvent::Progress(snapshot()?),
            "complete" => ProgressEvent::Complete(snapshot()?),
            "failed" => ProgressEvent::Failed(snapshot()?),
            "error" => {
                let message = serde_json::from_str::<ErrorPayload>(&frame.data)
                    .map(|payload| payload.error)
                    .unwrap_or_else(|_| frame.data.trim().to_string());
                ProgressEvent::Error(message)
            }
            _ => return Ok(None),
        };
        Ok(Some(event))
    }
}

/// One open event stream.
pub trait EventSource {
    /// Next frame, or `Ok(None)` when the server closed the stream.
    fn next_frame(&mut self) -> Result<Option<SseFrame>, ProgressError>;
}

impl<R: BufRead> EventSource for SseReader<R> {
    fn next_frame(&mut self) -> Result<Option<SseFrame>, ProgressError> {
        Ok(SseReader::next_frame(self)?)
    }
}

/// Opens event streams for job runs.
pub trait Connector {
    fn connect(&mut self, run_id: JobRunId) -> Result<Box<dyn EventSource>, ProgressError>;
}

/// Serves a single already-open byte stream (a file, a pipe from `curl -N`,
/// a test buffer). A second subscription attempt fails.
pub struct ReaderConnector<R> {
    reader: Option<R>,
}

impl<R: BufRead + 'static> ReaderConnector<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: Some(reader),
        }
    }
}

impl<R: BufRead + 'static> Connector for ReaderConnector<R> {
    fn connect(&mut self, run_id: JobRunId) -> Result<Box<dyn EventSource>, ProgressError> {
        let reader = self.reader.take().ok_or_else(|| ProgressError::Connect {
            run_id,
            message: "event stream already consumed".to_string(),
        })?;
        Ok(Box::new(SseReader::new(reader)))
    }
}

/// Callbacks of a subscription. Terminal callbacks fire at most once.
pub trait ProgressHandler {
    fn on_progress(&mut self, _snapshot: &ProgressSnapshot) {}
    fn on_complete(&mut self, snapshot: &ProgressSnapshot);
    fn on_failed(&mut self, snapshot: &ProgressSnapshot);
    fn on_error(&mut self, _error: &ProgressError) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Connecting,
    Streaming,
    Completed,
    Failed,
    Closed,
}

impl StreamState {
    pub fn is_active(self) -> bool {
        matches!(self, StreamState::Connecting | StreamState::Streaming)
    }

    pub fn is_terminal(self) -> bool {
        !self.is_active()
    }
}

pub struct ProgressMonitor<C, H> {
    connector: C,
    handler: H,
    run_id: Option<JobRunId>,
    state: StreamState,
    source: Option<Box<dyn EventSource>>,
    latest: Option<ProgressSnapshot>,
    error: Option<String>,
}

impl<C: Connector, H: ProgressHandler> ProgressMonitor<C, H> {
    pub fn new(connector: C, handler: H) -> Self {
        Self {
            connector,
            handler,
            run_id: None,
            state: StreamState::Closed,
            source: None,
            latest: None,
            error: None,
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn run_id(&self) -> Option<JobRunId> {
        self.run_id
    }

    pub fn latest(&self) -> Option<&ProgressSnapshot> {
        self.latest.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn into_handler(self) -> H {
        self.handler
    }

    /// Subscribes to `run_id`, releasing any subscription held before.
    pub fn watch(&mut self, run_id: JobRunId) -> StreamState {
        if self.source.is_some() {
            debug!(
                "Releasing subscription for run {:?} before watching run {run_id}",
                self.run_id
            );
        }
        self.disconnect();
        self.run_id = Some(run_id);
        self.latest = None;
        self.error = None;
        self.state = StreamState::Connecting;

        match self.connector.connect(run_id) {
            Ok(source) => {
                info!("Subscribed to progress of job run {run_id}");
                self.source = Some(source);
                self.state = StreamState::Streaming;
            }
            Err(err) => self.fail(err),
        }
        self.state
    }

    /// Handles at most one inbound frame and returns the resulting state.
    pub fn poll(&mut self) -> StreamState {
        if !self.state.is_active() {
            return self.state;
        }
        let Some(source) = self.source.as_mut() else {
            self.state = StreamState::Closed;
            return self.state;
        };

        let frame = match source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                self.fail(ProgressError::StreamEnded);
                return self.state;
            }
            Err(err) => {
                self.fail(err);
                return self.state;
            }
        };

        match ProgressEvent::from_frame(&frame) {
            Ok(Some(event)) => self.apply(event),
            Ok(None) => debug!("Ignoring '{}' event", frame.event),
            Err(err) => warn!("Ignoring event: {err}"),
        }
        self.state
    }

    /// Polls until the subscription leaves the active states.
    pub fn run(&mut self) -> StreamState {
        while self.state.is_active() {
            self.poll();
        }
        self.state
    }

    /// Releases the event source. Safe to call any number of times; a
    /// completed or failed subscription keeps its verdict.
    pub fn disconnect(&mut self) {
        if self.source.take().is_some() {
            debug!("Closed progress subscription for run {:?}", self.run_id);
        }
        if self.state.is_active() {
            self.state = StreamState::Closed;
        }
    }

    fn apply(&mut self, event: ProgressEvent) {
        match event {
            ProgressEvent::Progress(snapshot) => {
                debug!("Run {:?}: {snapshot}", self.run_id);
                self.handler.on_progress(&snapshot);
                self.latest = Some(snapshot);
            }
            ProgressEvent::Complete(snapshot) => {
                self.source = None;
                self.state = StreamState::Completed;
                info!("Run {:?} completed: {snapshot}", self.run_id);
                self.handler.on_complete(&snapshot);
                self.latest = Some(snapshot);
            }
            ProgressEvent::Failed(snapshot) => {
                self.source = None;
                self.state = StreamState::Failed;
                warn!("Run {:?} failed: {snapshot}", self.run_id);
                self.handler.on_failed(&snapshot);
                self.latest = Some(snapshot);
            }
            ProgressEvent::Error(message) => self.fail(ProgressError::Server(message)),
        }
    }

    fn fail(&mut self, err: ProgressError) {
        self.source = None;
        self.state = StreamState::Closed;
        warn!("Progress stream for run {:?} closed: {err}", self.run_id);
        self.error = Some(err.to_string());
        self.handler.on_error(&err);
    }
}
