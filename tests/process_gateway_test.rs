//! Full runs through a real child process

#![cfg(unix)]

use std::sync::Arc;
use std::time::Duration;

use mfbench_eval::config::GatewayConfig;
use mfbench_eval::report::{ReportFormat, ResultsWriter, generate_report};
use mfbench_eval::{
    CheckpointStore, DatasetLoader, EvalConfig, Orchestrator, ProcessGateway, RunState, TaskKind,
};
use tempfile::TempDir;

fn write_mcq_dataset(dir: &std::path::Path) {
    std::fs::write(
        dir.join("multiple_choice_question.jsonl"),
        concat!(
            "{\"question\": \"Which division holds file definitions?\", \"A\": \"IDENTIFICATION\", \"B\": \"DATA\", \"C\": \"PROCEDURE\", \"D\": \"ENVIRONMENT\", \"answer\": \"B\"}\n",
            "{\"question\": \"Which verb ends a program?\", \"A\": \"STOP RUN\", \"B\": \"END\", \"C\": \"EXIT\", \"D\": \"HALT\", \"answer\": \"A\"}\n",
            "{\"question\": \"Which clause sets an initial value?\", \"A\": \"PIC\", \"B\": \"VALUE\", \"C\": \"USAGE\", \"D\": \"OCCURS\", \"answer\": \"b\"}\n",
        ),
    )
    .unwrap();
}

fn config_with(program: &str, args: &[&str], data_dir: &std::path::Path) -> EvalConfig {
    let gateway = GatewayConfig::new(program, args.iter().map(|a| a.to_string()).collect());
    let mut config = EvalConfig::default()
        .with_gateway(gateway)
        .with_tasks(vec![TaskKind::Mcq])
        .with_data_dir(data_dir);
    config.tasks.get_mut(TaskKind::Mcq).rate_limit_delay = Duration::ZERO;
    config
}

#[tokio::test]
async fn test_run_through_model_command() {
    let data_dir = TempDir::new().unwrap();
    let run_dir = TempDir::new().unwrap();
    write_mcq_dataset(data_dir.path());

    let config = config_with("echo", &["The answer is B"], data_dir.path());
    config.validate().unwrap();
    let gateway = ProcessGateway::new(config.gateway.clone()).unwrap();
    let dataset = DatasetLoader::new(&config.data_dir);
    let orchestrator = Orchestrator::new(config, Arc::new(gateway), Arc::new(dataset))
        .with_store(CheckpointStore::in_run_dir(run_dir.path()));

    let report = orchestrator.run().await;

    let mcq = report.task(TaskKind::Mcq).unwrap();
    assert_eq!(mcq.state, RunState::Complete);
    assert_eq!(mcq.items_processed(), 3);
    assert!((mcq.primary_score().unwrap() - 2.0 / 3.0).abs() < 1e-12);
    assert!(report.model.starts_with("echo"));

    ResultsWriter::new(run_dir.path()).write(&report).await.unwrap();
    let table = generate_report(&report, ReportFormat::Table).unwrap();
    assert!(table.contains("accuracy 0.6667 (2/3)"));
}

#[tokio::test]
async fn test_failing_model_command_scores_zero() {
    let data_dir = TempDir::new().unwrap();
    write_mcq_dataset(data_dir.path());

    let config = config_with("false", &[], data_dir.path());
    let gateway = ProcessGateway::new(config.gateway.clone()).unwrap();
    let dataset = DatasetLoader::new(&config.data_dir);

    let report = Orchestrator::new(config, Arc::new(gateway), Arc::new(dataset))
        .run()
        .await;

    let mcq = report.task(TaskKind::Mcq).unwrap();
    assert_eq!(mcq.state, RunState::Complete);
    assert_eq!(mcq.primary_score(), Some(0.0));
    assert_eq!(mcq.result.as_ref().unwrap().failed_queries, 3);
}

#[tokio::test]
async fn test_prompt_reaches_child_sanitized() {
    let data_dir = TempDir::new().unwrap();
    std::fs::write(
        data_dir.path().join("question_answering.json"),
        r#"[{"question": "What does `rm -rf /`; do?", "answer": "what does rm -rf / do"}]"#,
    )
    .unwrap();

    let mut config = config_with("cat", &[], data_dir.path()).with_tasks(vec![TaskKind::Qa]);
    config.tasks.get_mut(TaskKind::Qa).rate_limit_delay = Duration::ZERO;
    let gateway = ProcessGateway::new(config.gateway.clone()).unwrap();
    let dataset = DatasetLoader::new(&config.data_dir);

    let report = Orchestrator::new(config, Arc::new(gateway), Arc::new(dataset))
        .run()
        .await;

    let record = &report.task(TaskKind::Qa).unwrap().records[0];
    assert!(record.response_succeeded);
    assert!(record.predicted.contains("What does rm -rf / do?"));
    assert!(!record.predicted.contains('`'));
    assert!(!record.predicted.contains(';'));
}
