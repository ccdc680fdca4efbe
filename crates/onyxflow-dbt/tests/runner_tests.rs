//! Transform runner tests against the recording executor
//!
//! The `live_` test needs a dbt installation and is `#[ignore]`d.

use onyxflow_core::config::DEFAULT_MODELS;
use onyxflow_core::TransformConfig;
use onyxflow_dbt::{DbtCommand, ProcessExecutor, RecordingExecutor, TransformError, TransformRunner};
use pretty_assertions::assert_eq;
use std::path::PathBuf;

fn default_models() -> Vec<String> {
    DEFAULT_MODELS.iter().map(|m| m.to_string()).collect()
}

fn runner_in(dir: &tempfile::TempDir, executor: &RecordingExecutor) -> TransformRunner {
    let config = TransformConfig {
        project_dir: dir.path().to_path_buf(),
        ..TransformConfig::default()
    };
    TransformRunner::from_config(&config, dir.path(), Box::new(executor.clone()))
}

#[tokio::test]
async fn test_failing_second_model_stops_sequence() {
    let dir = tempfile::tempdir().unwrap();
    let executor = RecordingExecutor::new();
    executor.fail_model("daily_summary").await;

    let result = runner_in(&dir, &executor).run_models(&default_models()).await;

    match result {
        Err(TransformError::Failed { command, code }) => {
            assert_eq!(command, "dbt run --select daily_summary");
            assert_eq!(code, Some(1));
        }
        other => panic!("Expected Failed, got {:?}", other),
    }
    assert_eq!(
        executor.command_lines().await,
        vec![
            "dbt run --select game_performance_incremental",
            "dbt run --select daily_summary",
        ]
    );
}

#[tokio::test]
async fn test_full_sequence_then_tests() {
    let dir = tempfile::tempdir().unwrap();
    let executor = RecordingExecutor::new();
    let runner = runner_in(&dir, &executor);

    runner.run_models(&default_models()).await.unwrap();
    runner.run_tests().await.unwrap();

    assert_eq!(
        executor.command_lines().await,
        vec![
            "dbt run --select game_performance_incremental",
            "dbt run --select daily_summary",
            "dbt run --select total_turnover_by_venue",
            "dbt run --select revenue_by_egm_and_venue",
            "dbt test",
        ]
    );
}

#[tokio::test]
async fn test_target_and_profiles_reach_every_invocation() {
    let dir = tempfile::tempdir().unwrap();
    let executor = RecordingExecutor::new();
    let runner = runner_in(&dir, &executor)
        .with_target("ci")
        .with_profiles_dir("/etc/dbt");

    runner.run_models(&["daily_summary".to_string()]).await.unwrap();
    runner.run_tests().await.unwrap();

    assert_eq!(
        executor.command_lines().await,
        vec![
            "dbt run --select daily_summary --target ci --profiles-dir /etc/dbt",
            "dbt test --target ci --profiles-dir /etc/dbt",
        ]
    );
}

#[tokio::test]
async fn test_relative_project_dir_resolves_against_root() {
    let root = tempfile::tempdir().unwrap();
    std::fs::create_dir(root.path().join("dbt_project")).unwrap();
    let executor = RecordingExecutor::new();

    let runner = TransformRunner::from_config(&TransformConfig::default(), root.path(), Box::new(executor.clone()));
    runner.run_tests().await.unwrap();

    let invocations = executor.invocations().await;
    assert_eq!(invocations[0].current_dir, root.path().join("dbt_project"));
}

#[tokio::test]
#[ignore]
async fn live_dbt_tests() {
    let Ok(project) = std::env::var("ONYXFLOW_DBT_PROJECT") else {
        eprintln!("Skipping: ONYXFLOW_DBT_PROJECT not set");
        return;
    };

    let runner = TransformRunner::new("dbt", PathBuf::from(project), Box::new(ProcessExecutor));
    let invocation = runner.invocation(&DbtCommand::Test);
    assert_eq!(invocation.subcommand(), Some("test"));

    runner.run_tests().await.unwrap();
}
