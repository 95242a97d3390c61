//! Metrics collection and aggregation for evaluation
//!
//! This module provides the persisted result types and the aggregator that derives task
//! scores, the composite and baseline comparisons from them.

mod aggregator;
mod types;

pub use aggregator::{Baseline, MetricsAggregator, default_baselines, relative_delta};
pub use types::{
    AggregateResult, BaselineDelta, BenchmarkComparison, CompositeScore, CompositeWeights,
    EvalReport, RecordPreview, SCHEMA_VERSION, ScoredRecord, TaskMetrics, TaskOutcome,
};
