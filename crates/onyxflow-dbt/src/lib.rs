//! dbt invocation
//!
//! This crate handles:
//! - Building `dbt run --select <model>` / `dbt test` command lines
//! - Spawning them in the dbt project directory
//! - Running a model sequence that stops at the first failure

pub mod command;
pub mod executor;
pub mod runner;

pub use command::{DbtCommand, Invocation};
pub use executor::{CommandExecutor, ExitOutcome, ProcessExecutor, RecordingExecutor};
pub use runner::{TransformError, TransformRunner};
