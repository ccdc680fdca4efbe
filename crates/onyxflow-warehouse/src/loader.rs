//! CSV to warehouse table loading
//!
//! A load reads the whole file, normalizes its headers, makes sure the
//! destination table exists and bulk-writes every row. Any failure aborts
//! the load; nothing is written when the file or its headers are rejected.

use crate::adapter::{TableIdentifier, WarehouseError, WarehouseSession};
use onyxflow_core::{CsvOptions, Frame, ParseError, Schema};
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::info;

/// One file to load into one table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadJob {
    /// Source CSV file
    pub source: PathBuf,

    /// Destination table (bare name, qualified by the session)
    pub table: String,

    /// Replace existing rows instead of appending
    pub overwrite: bool,
}

impl LoadJob {
    pub fn new(source: impl Into<PathBuf>, table: impl Into<String>, overwrite: bool) -> Self {
        Self {
            source: source.into(),
            table: table.into(),
            overwrite,
        }
    }
}

/// Outcome of a successful load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadSummary {
    pub table: TableIdentifier,

    /// Rows written
    pub rows: u64,

    /// Normalized column names, in file order
    pub columns: Vec<String>,

    pub overwrite: bool,
}

/// Errors that abort a load
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Error reading CSV file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },

    #[error("Column '{column}' is not part of the {table} schema")]
    UnknownColumn { column: String, table: String },

    #[error("Column '{0}' appears more than once after normalization")]
    DuplicateColumn(String),

    #[error(transparent)]
    Warehouse(#[from] WarehouseError),
}

/// Loads CSV files into tables sharing one schema
#[derive(Debug, Clone)]
pub struct Loader {
    schema: Schema,
    options: CsvOptions,
}

impl Loader {
    /// Loader for an arbitrary target schema
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            options: CsvOptions::default(),
        }
    }

    /// Loader for the game performance tables
    pub fn game_performance() -> Self {
        Self::new(Schema::game_performance())
    }

    /// Set CSV reader options
    pub fn with_csv_options(mut self, options: CsvOptions) -> Self {
        self.options = options;
        self
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Read, normalize and validate a source file without touching the warehouse
    pub fn read(&self, job: &LoadJob) -> Result<Frame, LoadError> {
        let mut frame = Frame::from_path(&job.source, &self.options).map_err(|source| LoadError::Parse {
            path: job.source.clone(),
            source,
        })?;
        info!(path = %job.source.display(), rows = frame.len(), "CSV file loaded successfully");

        frame.normalize_headers();
        info!(columns = ?frame.headers, "Cleaned column names to match the table schema");

        self.check_headers(&frame, &job.table)?;
        Ok(frame)
    }

    /// Run one load job against an open session
    pub async fn load(&self, session: &dyn WarehouseSession, job: &LoadJob) -> Result<LoadSummary, LoadError> {
        let frame = self.read(job)?;
        self.load_frame(session, job, frame).await
    }

    /// Write a frame already returned by [`Loader::read`] for `job`
    ///
    /// The source file is not opened again.
    pub async fn load_frame(
        &self,
        session: &dyn WarehouseSession,
        job: &LoadJob,
        frame: Frame,
    ) -> Result<LoadSummary, LoadError> {
        let table = session.qualify(&job.table);

        session.create_table_if_not_exists(&table, &self.schema).await?;
        info!(table = %table, "Table is ready");

        let rows = session.write_frame(&table, &frame, job.overwrite).await?;
        info!(
            table = %table,
            rows,
            overwrite = job.overwrite,
            "Data successfully ingested"
        );

        Ok(LoadSummary {
            table,
            rows,
            columns: frame.headers,
            overwrite: job.overwrite,
        })
    }

    fn check_headers(&self, frame: &Frame, table: &str) -> Result<(), LoadError> {
        let mut seen = HashSet::new();
        for header in &frame.headers {
            if self.schema.find_column(header).is_none() {
                return Err(LoadError::UnknownColumn {
                    column: header.clone(),
                    table: table.to_string(),
                });
            }
            if !seen.insert(header.as_str()) {
                return Err(LoadError::DuplicateColumn(header.clone()));
            }
        }
        Ok(())
    }
}
