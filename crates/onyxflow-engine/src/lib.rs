//! Pipeline orchestration
//!
//! Drives one run of the pipeline as an explicit state machine:
//! connect, full load, incremental load, dbt models, staging truncate and
//! dbt tests. Produces a [`RunReport`] describing every stage.

pub mod report;
pub mod stage;
pub mod workflow;

pub use report::{RunReport, StageRecord, StageStatus};
pub use stage::Stage;
pub use workflow::{PipelinePlan, Workflow, WorkflowError};
