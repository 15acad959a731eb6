//! Ingestion pipeline: one cancellable timed driver per run.
//!
//! Each accepted archive gets a single spawned task that walks `STAGE_SCRIPT`
//! against deadlines measured from acceptance. Cancelling the run (explicitly,
//! by starting another one, or by dropping it) stops that task as a unit: no
//! further snapshot is published and the completion callback never fires.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::types::{
    ArchiveInput, IngestionPhase, IngestionReport, IngestionSnapshot, STAGE_SCRIPT,
};
use crate::config::IngestionConfig;
use crate::error::IngestionError;

/// Default broadcast channel capacity.
const DEFAULT_BROADCAST_CAPACITY: usize = 64;

/// Callback invoked once when a run reaches `Complete`.
pub type CompletionCallback = Box<dyn FnOnce(IngestionReport) + Send + 'static>;

/// Handle to one in-flight (or finished) ingestion run.
pub struct IngestionRun {
    id: Uuid,
    cancelled: Arc<AtomicBool>,
    handle: JoinHandle<()>,
    snapshot: watch::Receiver<IngestionSnapshot>,
}

impl IngestionRun {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Latest published state of this run.
    pub fn snapshot(&self) -> IngestionSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Whether the driver task has stopped (completed or cancelled).
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stop the driver. Safe to call more than once.
    pub fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::AcqRel) {
            self.handle.abort();
            debug!(run_id = %self.id, "Ingestion run cancelled");
        }
    }
}

impl Drop for IngestionRun {
    fn drop(&mut self) {
        if !self.handle.is_finished() {
            self.cancel();
        }
    }
}

/// Starts ingestion runs for one screen and keeps at most one alive.
pub struct IngestionPipeline {
    origin: String,
    config: IngestionConfig,
    events: broadcast::Sender<IngestionSnapshot>,
    current: Option<IngestionRun>,
}

impl IngestionPipeline {
    /// Create a pipeline for the screen named `origin`.
    pub fn new(origin: impl Into<String>, config: IngestionConfig) -> Self {
        let (events, _rx) = broadcast::channel(DEFAULT_BROADCAST_CAPACITY);
        Self {
            origin: origin.into(),
            config,
            events,
            current: None,
        }
    }

    /// Publish snapshots on a shared broadcast channel instead of a private one.
    pub fn with_events(mut self, events: broadcast::Sender<IngestionSnapshot>) -> Self {
        self.events = events;
        self
    }

    /// Subscribe to every snapshot this pipeline publishes.
    pub fn subscribe(&self) -> broadcast::Receiver<IngestionSnapshot> {
        self.events.subscribe()
    }

    /// Accept `input` and start a new run, discarding any run in progress.
    ///
    /// A rejected input leaves the pipeline untouched.
    pub fn start<F>(
        &mut self,
        input: ArchiveInput,
        on_complete: F,
    ) -> Result<watch::Receiver<IngestionSnapshot>, IngestionError>
    where
        F: FnOnce(IngestionReport) + Send + 'static,
    {
        if !input.is_archive() {
            warn!(
                origin = %self.origin,
                name = %input.name,
                mime_type = %input.mime_type,
                "Rejected non-archive upload"
            );
            return Err(IngestionError::InvalidInputType {
                name: input.name,
                mime_type: input.mime_type,
            });
        }

        if let Some(previous) = self.current.take() {
            if !previous.is_finished() {
                info!(run_id = %previous.id(), "Discarding ingestion run in progress");
            }
            previous.cancel();
        }

        let run_id = Uuid::new_v4();
        let mut state = IngestionSnapshot::new(run_id, &self.origin, &input);
        let (tx, rx) = watch::channel(state.clone());
        let _ = self.events.send(state.clone());

        state.phase = IngestionPhase::Analyzing;
        tx.send_replace(state.clone());
        let _ = self.events.send(state.clone());

        info!(
            run_id = %run_id,
            origin = %self.origin,
            name = %input.name,
            size = input.size,
            "Ingestion run started"
        );

        let cancelled = Arc::new(AtomicBool::new(false));
        let driver = Driver {
            config: self.config.clone(),
            cancelled: Arc::clone(&cancelled),
            state,
            tx,
            events: self.events.clone(),
            on_complete: Box::new(on_complete),
        };
        let handle = tokio::spawn(driver.run(Instant::now()));

        self.current = Some(IngestionRun {
            id: run_id,
            cancelled,
            handle,
            snapshot: rx.clone(),
        });
        Ok(rx)
    }

    /// Cancel the current run, if any, and forget it.
    pub fn cancel(&mut self) {
        if let Some(run) = self.current.take() {
            run.cancel();
        }
    }

    /// Latest snapshot of the current run.
    pub fn snapshot(&self) -> Option<IngestionSnapshot> {
        self.current.as_ref().map(IngestionRun::snapshot)
    }

    pub fn current(&self) -> Option<&IngestionRun> {
        self.current.as_ref()
    }
}

/// State owned by a run's driver task.
struct Driver {
    config: IngestionConfig,
    cancelled: Arc<AtomicBool>,
    state: IngestionSnapshot,
    tx: watch::Sender<IngestionSnapshot>,
    events: broadcast::Sender<IngestionSnapshot>,
    on_complete: CompletionCallback,
}

impl Driver {
    async fn run(mut self, accepted_at: Instant) {
        for (index, stage) in STAGE_SCRIPT.iter().enumerate() {
            tokio::time::sleep_until(accepted_at + self.config.stage_offset(index)).await;
            if self.cancelled.load(Ordering::Acquire) {
                return;
            }
            self.state.advance(stage);
            debug!(
                run_id = %self.state.run_id,
                phase = %self.state.phase,
                percent = self.state.percent,
                "Ingestion stage"
            );
            self.tx.send_replace(self.state.clone());
            let _ = self.events.send(self.state.clone());
        }

        if self.cancelled.load(Ordering::Acquire) {
            return;
        }
        let report = IngestionReport::from_script(self.state.run_id, &self.state.file_name);
        info!(
            run_id = %report.run_id,
            documents = report.documents_processed,
            "Ingestion run complete"
        );
        (self.on_complete)(report);
    }
}
