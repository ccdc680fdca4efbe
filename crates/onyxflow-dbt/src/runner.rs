//! Model sequence and test runs

use crate::command::{DbtCommand, Invocation};
use crate::executor::CommandExecutor;
use onyxflow_core::TransformConfig;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Errors from running dbt
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error("dbt project directory not found: {}", .0.display())]
    ProjectDirMissing(PathBuf),

    #[error("Failed to start `{command}`: {message}")]
    Spawn { command: String, message: String },

    #[error(
        "`{command}` failed with exit code {}",
        .code.map_or_else(|| "none (terminated by signal)".to_string(), |c| c.to_string())
    )]
    Failed { command: String, code: Option<i32> },
}

/// Runs dbt models and tests in the configured project directory
pub struct TransformRunner {
    executable: String,
    project_dir: PathBuf,
    target: Option<String>,
    profiles_dir: Option<PathBuf>,
    executor: Box<dyn CommandExecutor>,
}

impl TransformRunner {
    pub fn new(
        executable: impl Into<String>,
        project_dir: impl Into<PathBuf>,
        executor: Box<dyn CommandExecutor>,
    ) -> Self {
        Self {
            executable: executable.into(),
            project_dir: project_dir.into(),
            target: None,
            profiles_dir: None,
            executor,
        }
    }

    /// Build from configuration, resolving relative paths against `project_root`
    ///
    /// A bare executable name such as `dbt` is left for `PATH` lookup; a
    /// relative path such as `venv/bin/dbt` is resolved like the directories.
    pub fn from_config(config: &TransformConfig, project_root: &Path, executor: Box<dyn CommandExecutor>) -> Self {
        let resolve = |path: &Path| {
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                project_root.join(path)
            }
        };

        let executable = Path::new(&config.executable);
        let executable = if executable.components().count() > 1 {
            resolve(executable).to_string_lossy().into_owned()
        } else {
            config.executable.clone()
        };

        Self {
            executable,
            project_dir: resolve(&config.project_dir),
            target: config.target.clone(),
            profiles_dir: config.profiles_dir.as_deref().map(resolve),
            executor,
        }
    }

    /// Set `--target`
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Set `--profiles-dir`
    pub fn with_profiles_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.profiles_dir = Some(dir.into());
        self
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    /// Run `models` one at a time, in order, stopping at the first failure
    ///
    /// An empty list runs the whole project once. Returns the number of
    /// invocations that completed successfully.
    pub async fn run_models(&self, models: &[String]) -> Result<usize, TransformError> {
        self.check_project_dir()?;

        if models.is_empty() {
            info!("Running all dbt models");
            self.execute(DbtCommand::run_all()).await?;
            return Ok(1);
        }

        for (index, model) in models.iter().enumerate() {
            info!(step = index + 1, total = models.len(), "Running dbt model: {}", model);
            self.execute(DbtCommand::run_model(model.as_str())).await?;
        }

        info!(models = models.len(), "dbt models completed successfully");
        Ok(models.len())
    }

    /// Run the project's tests once
    pub async fn run_tests(&self) -> Result<(), TransformError> {
        self.check_project_dir()?;

        info!("Running dbt tests");
        self.execute(DbtCommand::Test).await?;
        info!("dbt tests passed");
        Ok(())
    }

    /// The invocation the runner issues for `command`
    pub fn invocation(&self, command: &DbtCommand) -> Invocation {
        Invocation::new(&self.executable, &self.project_dir)
            .args(command.args())
            .with_profile(self.target.as_deref(), self.profiles_dir.as_deref())
    }

    fn check_project_dir(&self) -> Result<(), TransformError> {
        if self.project_dir.is_dir() {
            Ok(())
        } else {
            Err(TransformError::ProjectDirMissing(self.project_dir.clone()))
        }
    }

    async fn execute(&self, command: DbtCommand) -> Result<(), TransformError> {
        let invocation = self.invocation(&command);

        let outcome = self.executor.execute(&invocation).await.map_err(|e| {
            error!(command = %invocation, error = %e, "Failed to start dbt");
            TransformError::Spawn {
                command: invocation.to_string(),
                message: e.to_string(),
            }
        })?;

        if outcome.success {
            Ok(())
        } else {
            error!(command = %invocation, code = ?outcome.code, "dbt command failed");
            Err(TransformError::Failed {
                command: invocation.to_string(),
                code: outcome.code,
            })
        }
    }
}
