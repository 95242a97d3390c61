//! MainframeBench evaluation orchestrator
//!
//! Runs the three MainframeBench tasks against a model reached through an external command
//! and scores the answers.
//!
//! # Features
//!
//! - **Prompt Sanitization**: every prompt is filtered and length-bounded before it leaves
//!   the process
//! - **Model Gateway**: child-process invocation with a timeout, bounded output and a
//!   scratch working directory
//! - **Scoring**: exact-match accuracy for multiple choice, a heuristic quality score for
//!   question answering and corpus BLEU for code summaries
//! - **Checkpoints**: append-only checkpoint segments that a run can resume from
//! - **Report Generation**: JSON, Markdown and terminal table output
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use mfbench_eval::{DatasetLoader, EvalConfig, Orchestrator, ProcessGateway};
//!
//! let config = EvalConfig::load(None)?;
//! let gateway = Arc::new(ProcessGateway::new(config.gateway.clone())?);
//! let dataset = Arc::new(DatasetLoader::new(&config.data_dir));
//! let report = Orchestrator::new(config, gateway, dataset).run().await;
//! println!("composite: {:.4}", report.composite.value);
//! ```

pub mod checkpoint;
pub mod config;
pub mod error;
pub mod gateway;
pub mod metrics;
pub mod report;
pub mod runner;
pub mod sanitize;
pub mod scoring;
pub mod tasks;

// Re-exports for convenience
pub use checkpoint::{Checkpoint, CheckpointStore, ResumePoint};
pub use config::EvalConfig;
pub use error::{BenchError, BenchResult, TaskFailure};
pub use gateway::{ModelGateway, ProcessGateway, QueryResult};
pub use metrics::{AggregateResult, CompositeScore, EvalReport, MetricsAggregator, ScoredRecord};
pub use report::{ReportFormat, ResultsWriter, generate_report};
pub use runner::{BatchRunner, Orchestrator, RunProgress, RunState, TaskRunConfig};
pub use sanitize::Sanitizer;
pub use tasks::{DatasetLoader, DatasetSource, TaskKind, TaskSuite, TestItem};
