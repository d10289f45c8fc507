use crate::{
    error::ProcessingError,
    processor::{ProcessedTransaction, Processor},
    storage::PutOutcome,
};
use chrono::{DateTime, Utc};
use common::config::ProcessorConfig;
use futures::{StreamExt, stream};
use metrics::{counter, histogram};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::{
    Arc, PoisonError, RwLock,
    atomic::{AtomicU8, AtomicU64, Ordering},
};
use std::time::{Duration, Instant};
use strum_macros::Display as EnumDisplay;
use tokio::{sync::Mutex, sync::Notify, task::JoinHandle};
use tracing::{debug, error, info, warn};

const STOPPED: u8 = 0;
const RUNNING: u8 = 1;
/// Running, but asked to stop at the next batch boundary.
const STOPPING: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, EnumDisplay)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PipelineStatus {
    Stopped,
    Running,
    Stopping,
}

/// Snapshot returned by [`PipelineController::status`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineState {
    pub status: PipelineStatus,
    pub transactions_processed: u64,
    pub batches_completed: u64,
    pub transactions_failed: u64,
    pub duplicates_skipped: u64,
    pub last_processed_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub batch_limit: u32,
    pub workers: usize,
    pub poll_interval: Duration,
}

impl From<&ProcessorConfig> for PipelineSettings {
    fn from(config: &ProcessorConfig) -> Self {
        Self {
            batch_limit: config.batch_limit.max(1),
            workers: config.threads.max(1) as usize,
            poll_interval: Duration::from_millis(config.sleep_ms),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub fetched: usize,
    pub stored: usize,
    pub duplicates: usize,
    pub failed: usize,
}

#[derive(Debug, Default)]
struct Timeline {
    started_at: Option<DateTime<Utc>>,
    last_processed_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

#[derive(Default)]
struct SharedState {
    phase: AtomicU8,
    processed: AtomicU64,
    batches: AtomicU64,
    failed: AtomicU64,
    duplicates: AtomicU64,
    timeline: RwLock<Timeline>,
    wake: Notify,
}

impl SharedState {
    fn update_timeline(&self, update: impl FnOnce(&mut Timeline)) {
        let mut timeline = self.timeline.write().unwrap_or_else(PoisonError::into_inner);
        update(&mut timeline);
    }

    /// Called at batch boundaries. Completes a pending stop.
    fn keep_running(&self) -> bool {
        loop {
            match self.phase.load(Ordering::Acquire) {
                RUNNING => return true,
                STOPPING => {
                    if self
                        .phase
                        .compare_exchange(STOPPING, STOPPED, Ordering::AcqRel, Ordering::Acquire)
                        .is_ok()
                    {
                        return false;
                    }
                }
                _ => return false,
            }
        }
    }

    fn record(&self, processed: &ProcessedTransaction) {
        match processed.outcome {
            PutOutcome::Inserted => {
                self.processed.fetch_add(1, Ordering::Relaxed);
                let at = processed.assessment.processed_at;
                self.update_timeline(|t| t.last_processed_at = t.last_processed_at.max(Some(at)));
                counter!("fraud_pipeline_transactions_processed_total").increment(1);
                counter!(
                    "fraud_pipeline_risk_level_total",
                    "level" => processed.assessment.risk_level.to_string()
                )
                .increment(1);
            }
            PutOutcome::AlreadyAssessed => {
                self.duplicates.fetch_add(1, Ordering::Relaxed);
                counter!("fraud_pipeline_duplicates_total").increment(1);
            }
        }
    }

    fn record_failure(&self, err: &ProcessingError) {
        warn!(
            transaction_id = err.transaction_id().unwrap_or_default(),
            error = %err,
            "Skipping transaction, it stays unprocessed"
        );
        self.failed.fetch_add(1, Ordering::Relaxed);
        counter!("fraud_pipeline_transactions_failed_total").increment(1);
    }

    fn halt(&self, err: &ProcessingError) {
        error!(error = %err, "Pipeline stopped after a fatal error");
        self.update_timeline(|t| t.last_error = Some(err.to_string()));
        self.phase.store(STOPPED, Ordering::Release);
    }
}

/// Drives the processor over the backlog of unprocessed transactions.
///
/// `start` and `stop` are safe to call concurrently: the phase only moves through
/// compare-and-set, so at most one loop runs, and a stop takes effect once the
/// in-flight batch has been written.
pub struct PipelineController {
    processor: Arc<Processor>,
    settings: PipelineSettings,
    shared: Arc<SharedState>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl PipelineController {
    pub fn new(processor: Arc<Processor>, settings: PipelineSettings) -> Self {
        Self {
            processor,
            settings,
            shared: Arc::new(SharedState::default()),
            handle: Mutex::new(None),
        }
    }

    /// Returns `false` when the pipeline was already running.
    pub async fn start(&self) -> bool {
        let mut handle = self.handle.lock().await;
        loop {
            match self.shared.phase.compare_exchange(
                STOPPED,
                RUNNING,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(RUNNING) => {
                    debug!("Pipeline already running");
                    return false;
                }
                Err(_) => {
                    // the loop has not reached its batch boundary yet, so keep it
                    if self
                        .shared
                        .phase
                        .compare_exchange(STOPPING, RUNNING, Ordering::AcqRel, Ordering::Acquire)
                        .is_ok()
                    {
                        info!("Pending stop withdrawn, pipeline keeps running");
                        return true;
                    }
                }
            }
        }

        self.shared.update_timeline(|t| {
            t.started_at = Some(Utc::now());
            t.last_error = None;
        });
        info!(
            batch_limit = self.settings.batch_limit,
            workers = self.settings.workers,
            "Starting pipeline"
        );
        *handle = Some(tokio::spawn(run_loop(
            self.processor.clone(),
            self.settings.clone(),
            self.shared.clone(),
        )));
        true
    }

    /// Asks the loop to stop after the current batch. Returns `false` if it was not running.
    pub fn stop(&self) -> bool {
        let requested = self
            .shared
            .phase
            .compare_exchange(RUNNING, STOPPING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if requested {
            info!("Stop requested");
            self.shared.wake.notify_one();
        }
        requested
    }

    /// Stops the loop and waits for the in-flight batch to finish.
    pub async fn stop_and_wait(&self) {
        self.stop();
        let handle = self.handle.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!(error = %e, "Pipeline task ended abnormally");
                self.shared.phase.store(STOPPED, Ordering::Release);
            }
        }
    }

    pub fn status(&self) -> PipelineState {
        let shared = &self.shared;
        let status = match shared.phase.load(Ordering::Acquire) {
            RUNNING => PipelineStatus::Running,
            STOPPING => PipelineStatus::Stopping,
            _ => PipelineStatus::Stopped,
        };
        let timeline = shared.timeline.read().unwrap_or_else(PoisonError::into_inner);
        PipelineState {
            status,
            transactions_processed: shared.processed.load(Ordering::Relaxed),
            batches_completed: shared.batches.load(Ordering::Relaxed),
            transactions_failed: shared.failed.load(Ordering::Relaxed),
            duplicates_skipped: shared.duplicates.load(Ordering::Relaxed),
            last_processed_at: timeline.last_processed_at,
            started_at: timeline.started_at,
            last_error: timeline.last_error.clone(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared.phase.load(Ordering::Acquire) != STOPPED
    }

    /// Processes batches on the caller's task until no transaction is left that
    /// has not already been tried during this call.
    pub async fn run_until_idle(&self) -> Result<PipelineState, ProcessingError> {
        let _handle = self.handle.lock().await;
        self.shared
            .phase
            .compare_exchange(STOPPED, RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ProcessingError::AlreadyRunning)?;
        self.shared.update_timeline(|t| {
            t.started_at = Some(Utc::now());
            t.last_error = None;
        });

        let mut skipped = HashSet::new();
        while self.shared.keep_running() {
            match run_batch(&self.processor, &self.settings, &self.shared, &mut skipped).await {
                Ok(summary) if summary.fetched > 0 => continue,
                Ok(_) => {
                    self.shared.phase.store(STOPPED, Ordering::Release);
                    break;
                }
                Err(e) => {
                    self.shared.halt(&e);
                    return Err(e);
                }
            }
        }
        Ok(self.status())
    }
}

async fn run_loop(
    processor: Arc<Processor>,
    settings: PipelineSettings,
    shared: Arc<SharedState>,
) {
    info!("Pipeline loop started");
    // failed transactions are retried once the loop has gone idle
    let mut skipped = HashSet::new();
    while shared.keep_running() {
        match run_batch(&processor, &settings, &shared, &mut skipped).await {
            Ok(summary) if summary.fetched > 0 => {}
            Ok(_) => {
                debug!(retrying = skipped.len(), "No fresh transactions, waiting");
                skipped.clear();
                tokio::select! {
                    _ = tokio::time::sleep(settings.poll_interval) => {}
                    _ = shared.wake.notified() => {}
                }
            }
            Err(e) => {
                shared.halt(&e);
                return;
            }
        }
    }
    info!("Pipeline loop stopped");
}

/// Runs one batch of transactions that have not failed yet in this run.
///
/// Counters move as each transaction completes. The first fatal error aborts
/// the batch; transactions still in flight stay unprocessed.
async fn run_batch(
    processor: &Processor,
    settings: &PipelineSettings,
    shared: &SharedState,
    skipped: &mut HashSet<String>,
) -> Result<BatchSummary, ProcessingError> {
    let started = Instant::now();
    let limit = u32::try_from(skipped.len())
        .map_or(u32::MAX, |n| n.saturating_add(settings.batch_limit));
    let mut batch = processor
        .source()
        .fetch_unprocessed(limit)
        .await
        .map_err(ProcessingError::Source)?;
    batch.retain(|t| !skipped.contains(&t.transaction_id));
    batch.truncate(settings.batch_limit as usize);
    if batch.is_empty() {
        return Ok(BatchSummary::default());
    }
    debug!(batch_size = batch.len(), "Processing batch");

    let mut summary = BatchSummary {
        fetched: batch.len(),
        ..Default::default()
    };
    let mut results = stream::iter(batch)
        .map(move |transaction| async move {
            let result = processor.process(&transaction).await;
            (transaction.transaction_id, result)
        })
        .buffer_unordered(settings.workers);

    while let Some((transaction_id, result)) = results.next().await {
        match result {
            Ok(processed) => {
                match processed.outcome {
                    PutOutcome::Inserted => summary.stored += 1,
                    PutOutcome::AlreadyAssessed => summary.duplicates += 1,
                }
                shared.record(&processed);
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                summary.failed += 1;
                shared.record_failure(&e);
                skipped.insert(transaction_id);
            }
        }
    }

    shared.batches.fetch_add(1, Ordering::Relaxed);
    counter!("fraud_pipeline_batches_total").increment(1);
    histogram!("fraud_pipeline_batch_seconds").record(started.elapsed().as_secs_f64());
    info!(
        batch_size = summary.fetched,
        stored = summary.stored,
        duplicates = summary.duplicates,
        failed = summary.failed,
        "Batch completed"
    );
    Ok(summary)
}
