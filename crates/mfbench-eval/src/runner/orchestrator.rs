//! Run orchestration
//!
//! Runs every enabled task in turn, isolates task failures and assembles the run report.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::batch::BatchRunner;
use super::progress::ProgressCallback;
use super::state::RunState;
use crate::checkpoint::{CheckpointStore, ResumePoint};
use crate::config::EvalConfig;
use crate::error::{BenchError, BenchResult, TaskFailure};
use crate::gateway::ModelGateway;
use crate::metrics::{EvalReport, MetricsAggregator, SCHEMA_VERSION, TaskOutcome};
use crate::sanitize::Sanitizer;
use crate::scoring::Scorer;
use crate::tasks::{DatasetSource, TaskKind};

/// Drives a full benchmark run over the enabled tasks
pub struct Orchestrator {
    config: EvalConfig,
    gateway: Arc<dyn ModelGateway>,
    dataset: Arc<dyn DatasetSource>,
    aggregator: MetricsAggregator,
    store: Option<CheckpointStore>,
    run_id: String,
    cancel: CancellationToken,
    progress: Option<ProgressCallback>,
}

impl Orchestrator {
    /// Create an orchestrator with a fresh run id
    pub fn new(
        config: EvalConfig,
        gateway: Arc<dyn ModelGateway>,
        dataset: Arc<dyn DatasetSource>,
    ) -> Self {
        let aggregator = MetricsAggregator::new(config.scoring.composite.clone());
        Self {
            config,
            gateway,
            dataset,
            aggregator,
            store: None,
            run_id: uuid::Uuid::new_v4().to_string(),
            cancel: CancellationToken::new(),
            progress: None,
        }
    }

    /// Write checkpoints to `store` and allow resuming from it
    pub fn with_store(mut self, store: CheckpointStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Reuse an existing run id, e.g. when resuming
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = run_id.into();
        self
    }

    pub fn with_aggregator(mut self, aggregator: MetricsAggregator) -> Self {
        self.aggregator = aggregator;
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

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    /// Evaluate every enabled task from the start
    pub async fn run(&self) -> EvalReport {
        self.execute(None).await
    }

    /// Evaluate every enabled task, continuing each from its latest usable checkpoint at or
    /// before `target`. Tasks without one start from zero.
    pub async fn resume(&self, target: Option<usize>) -> BenchResult<EvalReport> {
        if self.store.is_none() {
            return Err(BenchError::config("resuming requires a checkpoint store"));
        }
        Ok(self.execute(Some(target)).await)
    }

    async fn execute(&self, resume: Option<Option<usize>>) -> EvalReport {
        let started_at = Utc::now();
        let clock = Instant::now();
        info!(
            run_id = %self.run_id,
            model = %self.gateway.describe(),
            tasks = ?self.config.enabled_tasks,
            "Starting evaluation run"
        );

        let mut tasks = Vec::with_capacity(self.config.enabled_tasks.len());
        for &kind in &self.config.enabled_tasks {
            if self.cancel.is_cancelled() {
                info!(task = %kind, "Run cancelled, task not started");
                tasks.push(TaskOutcome::not_started(kind));
                continue;
            }

            let point = match resume {
                Some(target) => self.restore(kind, target).await,
                None => None,
            };
            tasks.push(self.run_task(kind, point).await);
        }

        let (composite, benchmarks) = self
            .aggregator
            .summarize(&tasks, &self.config.enabled_tasks);
        let stopped = tasks
            .iter()
            .any(|t| matches!(t.state, RunState::Stopped | RunState::NotStarted));

        let finished_at = Utc::now();
        let duration_secs = clock.elapsed().as_secs_f64();
        info!(
            run_id = %self.run_id,
            composite = composite.value,
            stopped,
            duration_secs,
            "Evaluation run finished"
        );

        EvalReport {
            schema_version: SCHEMA_VERSION,
            run_id: self.run_id.clone(),
            model: self.gateway.describe(),
            started_at,
            finished_at,
            duration_secs,
            tasks,
            composite,
            benchmarks,
            stopped,
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    async fn run_task(&self, kind: TaskKind, point: Option<ResumePoint>) -> TaskOutcome {
        let suite = match self.dataset.load(kind).await {
            Ok(suite) => suite,
            Err(e) => {
                error!(task = %kind, error = %e, "Failed to load dataset, skipping task");
                return TaskOutcome::failed(kind, TaskFailure::from_error(kind, &e));
            }
        };
        info!(
            task = %kind,
            entries = suite.len(),
            skipped = suite.skipped_count(),
            "Loaded dataset"
        );

        let sanitizer = Sanitizer::new(self.config.gateway.max_prompt_length);
        let mut runner = BatchRunner::new(kind, self.config.tasks.get(kind).clone(), self.gateway.clone())
            .with_workers(self.config.workers)
            .with_sanitizer(sanitizer)
            .with_scorer(Scorer::new(sanitizer, self.config.scoring.qa.clone()))
            .with_aggregator(self.aggregator.clone())
            .with_cancellation(self.cancel.clone());
        if let Some(store) = &self.store {
            let run_id = point.as_ref().map_or(self.run_id.as_str(), |p| p.run_id.as_str());
            let attempt = match store.next_attempt(kind).await {
                Ok(attempt) => attempt,
                Err(e) => {
                    warn!(task = %kind, error = %e, "Failed to list checkpoints, writing as attempt 0");
                    0
                }
            };
            runner = runner
                .with_checkpoints(store.clone(), run_id)
                .with_attempt(attempt);
        }
        if let Some(callback) = &self.progress {
            runner = runner.with_progress(callback.clone());
        }

        runner.run(suite, point).await
    }

    async fn restore(&self, kind: TaskKind, target: Option<usize>) -> Option<ResumePoint> {
        let store = self.store.as_ref()?;
        match store.restore(kind, target).await {
            Ok(Some(point)) => {
                if point.run_id != self.run_id {
                    warn!(
                        task = %kind,
                        checkpoint_run = %point.run_id,
                        run_id = %self.run_id,
                        "Resuming checkpoints of a different run id"
                    );
                }
                Some(point)
            }
            Ok(None) => {
                info!(task = %kind, "No usable checkpoint, starting from the beginning");
                None
            }
            Err(e) => {
                warn!(task = %kind, error = %e, "Failed to read checkpoints, starting from the beginning");
                None
            }
        }
    }
}
