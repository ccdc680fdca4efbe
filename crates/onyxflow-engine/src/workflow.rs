//! The end-to-end pipeline run

use crate::report::RunReport;
use crate::stage::Stage;
use onyxflow_core::{Config, CsvOptions};
use onyxflow_dbt::{CommandExecutor, TransformError, TransformRunner};
use onyxflow_warehouse::maintenance;
use onyxflow_warehouse::{Connector, LoadError, LoadJob, Loader, WarehouseError, WarehouseSession};
use std::time::Instant;
use tracing::{error, info, warn};

/// Errors that move a run to `failed`
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("Failed to connect: {0}")]
    Connect(#[source] WarehouseError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("Failed to truncate staging table: {0}")]
    Truncate(#[source] WarehouseError),

    #[error(transparent)]
    Transform(#[from] TransformError),
}

/// What one run does: the two load jobs, the staging table and the models
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelinePlan {
    /// Loaded with overwrite
    pub full_load: LoadJob,

    /// Appended to the staging table
    pub incremental_load: LoadJob,

    /// Truncated once the models have run
    pub staging_table: String,

    pub models: Vec<String>,
}

impl PipelinePlan {
    pub fn from_config(config: &Config) -> Self {
        let load = &config.load;
        Self {
            full_load: LoadJob::new(config.resolve_path(&load.full_file), &load.full_table, true),
            incremental_load: LoadJob::new(
                config.resolve_path(&load.incremental_file),
                &load.staging_table,
                false,
            ),
            staging_table: load.staging_table.clone(),
            models: config.transform.models.clone(),
        }
    }
}

/// One pipeline run over a single warehouse session
pub struct Workflow {
    connector: Box<dyn Connector>,
    loader: Loader,
    runner: TransformRunner,
    plan: PipelinePlan,
}

impl Workflow {
    pub fn new(connector: Box<dyn Connector>, loader: Loader, runner: TransformRunner, plan: PipelinePlan) -> Self {
        Self {
            connector,
            loader,
            runner,
            plan,
        }
    }

    /// Assemble a workflow from configuration
    pub fn from_config(config: &Config, connector: Box<dyn Connector>, executor: Box<dyn CommandExecutor>) -> Self {
        let loader = Loader::game_performance().with_csv_options(CsvOptions {
            delimiter: config.delimiter_byte(),
        });
        let runner = TransformRunner::from_config(&config.transform, &config.project_root, executor);
        Self::new(connector, loader, runner, PipelinePlan::from_config(config))
    }

    pub fn plan(&self) -> &PipelinePlan {
        &self.plan
    }

    /// Run every stage in order, stopping at the first failure
    ///
    /// The session opened in `connect` is closed before returning, whether
    /// or not a later stage failed.
    pub async fn run(&self) -> RunReport {
        let mut report = RunReport::new();

        info!(stage = %Stage::Connect, "Connecting to warehouse");
        let started = Instant::now();
        let mut session = match self.connector.connect().await {
            Ok(session) => {
                info!(adapter = session.name(), "Connected to warehouse");
                report.succeed(Stage::Connect, elapsed_ms(started), Some(session.name().to_string()));
                session
            }
            Err(e) => {
                let e = WorkflowError::Connect(e);
                error!(stage = %Stage::Connect, error = %e, "Pipeline failed");
                report.fail(Stage::Connect, elapsed_ms(started), e.to_string());
                return report;
            }
        };

        self.run_stages(session.as_ref(), &mut report).await;

        if let Err(e) = session.close().await {
            warn!(error = %e, "Failed to close warehouse session");
        } else {
            info!("Warehouse session closed");
        }

        report
    }

    async fn run_stages(&self, session: &dyn WarehouseSession, report: &mut RunReport) {
        let mut stage = Stage::Connect.next();

        while !stage.is_terminal() {
            info!(stage = %stage, "Starting stage");
            let started = Instant::now();

            match self.execute(stage, session).await {
                Ok(detail) => {
                    report.succeed(stage, elapsed_ms(started), detail);
                    stage = stage.next();
                }
                Err(e) => {
                    error!(stage = %stage, error = %e, "Pipeline failed");
                    report.fail(stage, elapsed_ms(started), e.to_string());
                    stage = Stage::Failed;
                }
            }
        }

        if stage == Stage::Done {
            info!("Pipeline completed successfully");
        }
    }

    async fn execute(&self, stage: Stage, session: &dyn WarehouseSession) -> Result<Option<String>, WorkflowError> {
        match stage {
            Stage::FullLoad => self.load(session, &self.plan.full_load).await,
            Stage::IncrementalLoad => self.load(session, &self.plan.incremental_load).await,
            Stage::RunModels => {
                let ran = self.runner.run_models(&self.plan.models).await?;
                Ok(Some(format!("{} dbt invocation(s)", ran)))
            }
            Stage::TruncateStaging => {
                let table = maintenance::truncate(session, &self.plan.staging_table)
                    .await
                    .map_err(WorkflowError::Truncate)?;
                Ok(Some(table.fqn()))
            }
            Stage::RunTests => {
                self.runner.run_tests().await?;
                Ok(None)
            }
            Stage::Connect | Stage::Done | Stage::Failed => Ok(None),
        }
    }

    async fn load(&self, session: &dyn WarehouseSession, job: &LoadJob) -> Result<Option<String>, WorkflowError> {
        let summary = self.loader.load(session, job).await?;
        Ok(Some(format!("{} rows into {}", summary.rows, summary.table)))
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
