//! Process execution seam
//!
//! The runner never spawns processes itself; it hands each [`Invocation`]
//! to a [`CommandExecutor`]. [`ProcessExecutor`] runs real child processes,
//! [`RecordingExecutor`] records invocations and fails chosen ones.

use crate::command::Invocation;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// How a child process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitOutcome {
    pub success: bool,

    /// Exit code; `None` when the process was killed by a signal
    pub code: Option<i32>,
}

impl ExitOutcome {
    pub fn success() -> Self {
        Self {
            success: true,
            code: Some(0),
        }
    }

    pub fn code(code: i32) -> Self {
        Self {
            success: code == 0,
            code: Some(code),
        }
    }
}

/// Runs one invocation to completion
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Spawn and wait. `Err` means the process could not be started.
    async fn execute(&self, invocation: &Invocation) -> std::io::Result<ExitOutcome>;
}

/// Executes invocations as child processes
///
/// stdout and stderr are inherited so the tool's own output reaches the
/// terminal as it runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessExecutor;

#[async_trait]
impl CommandExecutor for ProcessExecutor {
    async fn execute(&self, invocation: &Invocation) -> std::io::Result<ExitOutcome> {
        debug!(command = %invocation, cwd = %invocation.current_dir.display(), "Spawning process");

        let status = tokio::process::Command::new(&invocation.program)
            .args(&invocation.args)
            .current_dir(&invocation.current_dir)
            .status()
            .await?;

        Ok(ExitOutcome {
            success: status.success(),
            code: status.code(),
        })
    }
}

#[derive(Debug, Default)]
struct RecordingState {
    invocations: Vec<Invocation>,
    failing_models: Vec<String>,
    fail_tests: bool,
    unspawnable: bool,
}

/// Executor that records invocations instead of spawning them
///
/// Clones share state. Every invocation exits 0 unless configured otherwise.
#[derive(Debug, Clone, Default)]
pub struct RecordingExecutor {
    state: Arc<Mutex<RecordingState>>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// `run --select <model>` exits 1
    pub async fn fail_model(&self, model: impl Into<String>) {
        self.state.lock().await.failing_models.push(model.into());
    }

    /// `test` exits 1
    pub async fn fail_tests(&self) {
        self.state.lock().await.fail_tests = true;
    }

    /// Every invocation fails to spawn, as if the executable were missing
    pub async fn fail_spawn(&self) {
        self.state.lock().await.unspawnable = true;
    }

    /// Invocations received so far, in order
    pub async fn invocations(&self) -> Vec<Invocation> {
        self.state.lock().await.invocations.clone()
    }

    /// Rendered command lines received so far
    pub async fn command_lines(&self) -> Vec<String> {
        self.invocations().await.iter().map(ToString::to_string).collect()
    }
}

#[async_trait]
impl CommandExecutor for RecordingExecutor {
    async fn execute(&self, invocation: &Invocation) -> std::io::Result<ExitOutcome> {
        let mut state = self.state.lock().await;
        state.invocations.push(invocation.clone());

        if state.unspawnable {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{}: command not found", invocation.program),
            ));
        }

        let failing = state.failing_models.iter().any(|m| invocation.selects(m))
            || (state.fail_tests && invocation.subcommand() == Some("test"));

        Ok(if failing { ExitOutcome::code(1) } else { ExitOutcome::success() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::DbtCommand;
    use pretty_assertions::assert_eq;

    fn run(model: &str) -> Invocation {
        Invocation::new("dbt", ".").args(DbtCommand::run_model(model).args())
    }

    #[tokio::test]
    async fn recording_executor_records_in_order() {
        let executor = RecordingExecutor::new();

        executor.execute(&run("a")).await.unwrap();
        executor.execute(&run("b")).await.unwrap();

        assert_eq!(
            executor.command_lines().await,
            vec!["dbt run --select a", "dbt run --select b"]
        );
    }

    #[tokio::test]
    async fn recording_executor_fails_chosen_model() {
        let executor = RecordingExecutor::new();
        executor.fail_model("b").await;

        assert_eq!(executor.execute(&run("a")).await.unwrap(), ExitOutcome::success());
        assert_eq!(executor.execute(&run("b")).await.unwrap(), ExitOutcome::code(1));
    }

    #[tokio::test]
    async fn recording_executor_fails_tests() {
        let executor = RecordingExecutor::new();
        executor.fail_tests().await;
        let test = Invocation::new("dbt", ".").args(DbtCommand::Test.args());

        assert!(!executor.execute(&test).await.unwrap().success);
        assert!(executor.execute(&run("a")).await.unwrap().success);
    }

    #[tokio::test]
    async fn recording_executor_spawn_failure() {
        let executor = RecordingExecutor::new();
        executor.fail_spawn().await;

        let err = executor.execute(&run("a")).await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
        assert_eq!(executor.invocations().await.len(), 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn process_executor_reports_exit_code() {
        let dir = tempfile::tempdir().unwrap();

        let ok = Invocation::new("sh", dir.path()).args(["-c", "exit 0"]);
        assert_eq!(ProcessExecutor.execute(&ok).await.unwrap(), ExitOutcome::success());

        let failed = Invocation::new("sh", dir.path()).args(["-c", "exit 3"]);
        assert_eq!(ProcessExecutor.execute(&failed).await.unwrap(), ExitOutcome::code(3));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn process_executor_runs_in_current_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("dbt_project.yml"), "name: onyx\n").unwrap();

        let probe = Invocation::new("sh", dir.path()).args(["-c", "test -f dbt_project.yml"]);
        assert!(ProcessExecutor.execute(&probe).await.unwrap().success);
    }

    #[tokio::test]
    async fn process_executor_missing_program() {
        let dir = tempfile::tempdir().unwrap();
        let missing = Invocation::new("onyxflow-no-such-binary", dir.path());

        assert!(ProcessExecutor.execute(&missing).await.is_err());
    }
}
