//! Batch runner for one task
//!
//! Splits a suite into batches, runs up to `workers` batches concurrently and merges their
//! records back in suite order. Checkpoints are taken by the single merging loop every
//! `checkpoint_interval` records and written on spawned tasks. Before cutting a segment the
//! loop settles the previous write, so every segment links to a checkpoint that was stored;
//! the records of a failed write roll into the next segment.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::StreamExt;
use futures::stream;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::progress::{ProgressCallback, ProgressEvent, RunProgress};
use super::state::{RunState, TaskProgress};
use super::TaskRunConfig;
use crate::checkpoint::{Checkpoint, CheckpointKey, CheckpointStore, ResumePoint};
use crate::error::BenchResult;
use crate::gateway::{ModelGateway, QueryFailure, QueryResult};
use crate::metrics::{MetricsAggregator, RecordPreview, SCHEMA_VERSION, ScoredRecord, TaskOutcome};
use crate::sanitize::Sanitizer;
use crate::scoring::Scorer;
use crate::tasks::{SuiteEntry, TaskKind, TaskSuite, TestItem, build_prompt, truncate_preview};

/// Records shown in the report before checkpoint samples
const LEADING_PREVIEWS: usize = 10;

/// Characters kept per preview field
const PREVIEW_CHARS: usize = 100;

/// Runs the items of one task through the model gateway
pub struct BatchRunner {
    task: TaskKind,
    config: TaskRunConfig,
    workers: usize,
    gateway: Arc<dyn ModelGateway>,
    scorer: Scorer,
    sanitizer: Sanitizer,
    aggregator: MetricsAggregator,
    store: Option<CheckpointStore>,
    run_id: String,
    attempt: u32,
    cancel: CancellationToken,
    progress: Option<ProgressCallback>,
}

impl BatchRunner {
    pub fn new(task: TaskKind, config: TaskRunConfig, gateway: Arc<dyn ModelGateway>) -> Self {
        Self {
            task,
            config,
            workers: 1,
            gateway,
            scorer: Scorer::default(),
            sanitizer: Sanitizer::default(),
            aggregator: MetricsAggregator::default(),
            store: None,
            run_id: String::new(),
            attempt: 0,
            cancel: CancellationToken::new(),
            progress: None,
        }
    }

    /// Number of batches evaluated concurrently (at least 1)
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_scorer(mut self, scorer: Scorer) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn with_sanitizer(mut self, sanitizer: Sanitizer) -> Self {
        self.sanitizer = sanitizer;
        self
    }

    pub fn with_aggregator(mut self, aggregator: MetricsAggregator) -> Self {
        self.aggregator = aggregator;
        self
    }

    /// Write checkpoints for `run_id` into `store`
    pub fn with_checkpoints(mut self, store: CheckpointStore, run_id: impl Into<String>) -> Self {
        self.store = Some(store);
        self.run_id = run_id.into();
        self
    }

    /// Attempt number the checkpoints of this run are stored under
    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = attempt;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    pub fn task(&self) -> TaskKind {
        self.task
    }

    /// Evaluate `suite`, continuing after `resume` when given.
    ///
    /// Never fails: query errors become zero-score records and checkpoint write errors are
    /// counted on the outcome.
    pub async fn run(&self, suite: TaskSuite, resume: Option<ResumePoint>) -> TaskOutcome {
        let suite = match self.config.sample_size {
            Some(n) => suite.take_first(n),
            None => suite,
        };
        let total = suite.len();

        let (mut progress, resumed_from, mut last_stored) = match resume {
            Some(point) => {
                let offset = point.offset();
                let key = point.key();
                info!(task = %self.task, offset, attempt = self.attempt, "Resuming from checkpoint");
                (TaskProgress::resumed(self.task, point.records), Some(offset), Some(key))
            }
            None => (TaskProgress::new(self.task), None, None),
        };
        if progress.processed() > total {
            warn!(
                task = %self.task,
                restored = progress.processed(),
                total,
                "Checkpoint covers more entries than the suite holds"
            );
        }

        progress.transition(RunState::Running);
        self.emit(&progress, total, ProgressEvent::Started { resumed_from });
        info!(
            task = %self.task,
            total,
            start = progress.processed(),
            workers = self.workers,
            "Starting task"
        );

        let start = progress.processed().min(total);
        let batch_size = self.config.batch_size.max(1);
        let workers = self.workers;

        let mut batches = stream::iter(suite.entries()[start..].chunks(batch_size).enumerate())
            .map(|(index, entries)| async move {
                if self.cancel.is_cancelled() {
                    return None;
                }
                Some(self.process_batch(entries, index >= workers).await)
            })
            .buffered(workers);

        let mut pending: Option<(usize, JoinHandle<BenchResult<()>>)> = None;
        let mut checkpoints = Vec::new();
        let mut checkpoint_errors = 0;
        let mut stopped = false;
        while let Some(batch) = batches.next().await {
            let Some(records) = batch else {
                stopped = true;
                break;
            };
            for record in records {
                progress.push(record);
                self.emit(&progress, total, ProgressEvent::ItemScored);
                if self.store.is_none()
                    || progress.processed() % self.config.checkpoint_interval.max(1) != 0
                {
                    continue;
                }
                if let Some((offset, handle)) = pending.take() {
                    if self.settle(offset, handle).await {
                        checkpoints.push(offset);
                        last_stored = Some(CheckpointKey::new(offset, self.attempt));
                    } else {
                        checkpoint_errors += 1;
                    }
                }
                pending = self.checkpoint(&mut progress, total, last_stored);
            }
        }
        drop(batches);

        if let Some((offset, handle)) = pending.take() {
            if self.settle(offset, handle).await {
                checkpoints.push(offset);
            } else {
                checkpoint_errors += 1;
            }
        }

        let state = if stopped {
            RunState::Stopped
        } else {
            RunState::Complete
        };
        progress.transition(state);
        self.emit(&progress, total, ProgressEvent::Finished { state });

        let records = progress.into_records();
        let result = self.aggregator.aggregate(self.task, &records);
        info!(
            task = %self.task,
            state = %state,
            processed = records.len(),
            score = result.primary_score(),
            "Task finished"
        );

        TaskOutcome {
            task: self.task,
            state,
            previews: build_previews(suite.entries(), &records, &checkpoints),
            result: Some(result),
            failure: None,
            total_items: total,
            records,
            checkpoints,
            checkpoint_errors,
            resumed_from,
        }
    }

    /// Evaluate one batch sequentially.
    ///
    /// The first call of a batch skips the rate-limit pause unless the batch reuses a worker
    /// slot freed by an earlier batch.
    async fn process_batch(&self, entries: &[SuiteEntry], continues_worker: bool) -> Vec<ScoredRecord> {
        let mut records = Vec::with_capacity(entries.len());
        let mut pause = continues_worker;

        for entry in entries {
            let record = match entry {
                SuiteEntry::Skipped { id, reason } => {
                    debug!(task = %self.task, item_id = id, reason = %reason, "Skipping entry");
                    ScoredRecord::skipped(self.task, *id, reason.clone())
                }
                SuiteEntry::Item(item) => {
                    let prompt = self.sanitizer.sanitize(&build_prompt(item));
                    let result = if prompt.is_empty() {
                        QueryResult::failed(QueryFailure::EmptyPrompt, Duration::ZERO)
                    } else {
                        if pause {
                            self.rate_limit().await;
                        }
                        pause = true;
                        self.gateway.query(&prompt).await
                    };
                    self.score_item(item, &result)
                }
            };
            records.push(record);
        }

        records
    }

    async fn rate_limit(&self) {
        if !self.config.rate_limit_delay.is_zero() {
            tokio::time::sleep(self.config.rate_limit_delay).await;
        }
    }

    fn score_item(&self, item: &TestItem, result: &QueryResult) -> ScoredRecord {
        if let Some(failure) = &result.failure {
            debug!(task = %self.task, item_id = item.id(), failure = ?failure, "Query failed, scoring empty response");
        }
        let score = self.scorer.score(item, &result.raw_response);
        debug!(
            task = %self.task,
            item_id = item.id(),
            score = score.score,
            latency_ms = result.latency_ms(),
            "Scored item"
        );

        ScoredRecord {
            item_id: item.id(),
            task_kind: self.task,
            predicted: score.predicted,
            reference: item.reference(),
            score: score.score,
            is_correct: score.is_correct,
            latency_ms: result.latency_ms(),
            response_succeeded: result.succeeded,
            skip_reason: None,
        }
    }

    /// Cut a segment running from `previous` (the last stored checkpoint) and write it in
    /// the background
    fn checkpoint(
        &self,
        progress: &mut TaskProgress,
        total: usize,
        previous: Option<CheckpointKey>,
    ) -> Option<(usize, JoinHandle<BenchResult<()>>)> {
        let store = self.store.clone()?;
        let offset = progress.processed();
        let running_score = progress.running_score();
        let tally = progress.tally().clone();
        progress.rewind_segment(previous.map_or(0, |key| key.offset));
        let (segment_start, records) = progress.take_segment();

        let checkpoint = Checkpoint {
            schema_version: SCHEMA_VERSION,
            run_id: self.run_id.clone(),
            task: self.task,
            items_processed: offset,
            attempt: self.attempt,
            segment_start,
            segment_attempt: previous.map_or(0, |key| key.attempt),
            tally,
            running_score,
            timestamp: Utc::now(),
            records,
        };

        progress.transition(RunState::Checkpointed);
        info!(
            task = %self.task,
            offset,
            segment_start,
            total,
            running_score,
            "Checkpoint"
        );
        self.emit(progress, total, ProgressEvent::Checkpoint { offset });

        let handle = tokio::spawn(async move { store.save(&checkpoint).await });
        Some((offset, handle))
    }

    /// Wait for a checkpoint write; false when it failed
    async fn settle(&self, offset: usize, handle: JoinHandle<BenchResult<()>>) -> bool {
        match handle.await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!(task = %self.task, offset, error = %e, "Checkpoint write failed");
                false
            }
            Err(e) => {
                warn!(task = %self.task, offset, error = %e, "Checkpoint writer panicked");
                false
            }
        }
    }

    fn emit(&self, progress: &TaskProgress, total: usize, event: ProgressEvent) {
        if let Some(callback) = &self.progress {
            callback(RunProgress {
                task: self.task,
                processed: progress.processed(),
                total,
                event,
            });
        }
    }
}

/// First records plus the record at each checkpoint offset
fn build_previews(
    entries: &[SuiteEntry],
    records: &[ScoredRecord],
    checkpoints: &[usize],
) -> Vec<RecordPreview> {
    let mut positions: Vec<usize> = (0..records.len().min(LEADING_PREVIEWS)).collect();
    for offset in checkpoints {
        let position = offset.saturating_sub(1);
        if position < records.len() && !positions.contains(&position) {
            positions.push(position);
        }
    }

    positions
        .into_iter()
        .map(|position| {
            let record = &records[position];
            let question = match entries.get(position) {
                Some(SuiteEntry::Item(item)) => item.preview(),
                Some(SuiteEntry::Skipped { reason, .. }) => format!("(skipped: {})", reason),
                None => String::new(),
            };
            RecordPreview {
                item_id: record.item_id,
                question,
                predicted: truncate_preview(&record.predicted, PREVIEW_CHARS),
                reference: truncate_preview(&record.reference, PREVIEW_CHARS),
                score: record.score,
            }
        })
        .collect()
}
