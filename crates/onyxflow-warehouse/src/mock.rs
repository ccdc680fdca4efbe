//! Mock warehouse for testing
//!
//! Tables live in memory and behave like the real warehouse for the
//! operations the pipeline uses: create-if-not-exists, bulk append or
//! overwrite, truncate, row count and schema lookup. It's useful for:
//! - Unit testing the loader and maintenance steps
//! - Driving the whole pipeline without credentials
//! - Simulating failures at any individual step
//!
//! ## Usage
//!
//! ```rust,ignore
//! use onyxflow_warehouse::{MockWarehouse, MockOperation, WarehouseError};
//!
//! let warehouse = MockWarehouse::new("ONYX_DB", "GAME_SCHEMA");
//! warehouse.add_error_for(
//!     MockOperation::Truncate,
//!     "GAME_PERFORMANCE_STAGING",
//!     WarehouseError::PermissionDenied("no TRUNCATE privilege".to_string()),
//! ).await;
//! ```
//!
//! A write that fails, whether injected or rejected, leaves the table as it
//! was, matching the transactional overwrite of the Snowflake adapter.
//!
//! Clones share state, so a test can hand one clone to the code under test
//! and inspect tables and recorded calls through another.

use crate::adapter::{Connector, TableIdentifier, WarehouseError, WarehouseSession};
use async_trait::async_trait;
use onyxflow_core::{Frame, Schema};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Operations that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOperation {
    CreateTable,
    Write,
    Truncate,
    RowCount,
    FetchSchema,
}

/// A call observed by the mock, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    Connect,
    CreateTable(String),
    Write { table: String, rows: usize, overwrite: bool },
    Truncate(String),
    RowCount(String),
    FetchSchema(String),
    Close,
}

#[derive(Debug, Clone)]
struct MockTable {
    schema: Schema,
    rows: Vec<Vec<String>>,
}

#[derive(Debug, Default)]
struct MockState {
    /// Tables by FQN
    tables: HashMap<String, MockTable>,

    /// Errors to return for (operation, table FQN)
    errors: HashMap<(MockOperation, String), WarehouseError>,

    calls: Vec<MockCall>,

    open_sessions: usize,
}

/// In-memory warehouse
#[derive(Clone)]
pub struct MockWarehouse {
    state: Arc<RwLock<MockState>>,

    database: String,

    schema: String,

    /// Simulate connection failure
    fail_connection: bool,
}

impl MockWarehouse {
    /// Create an empty warehouse whose sessions default to `database.schema`
    pub fn new(database: impl Into<String>, schema: impl Into<String>) -> Self {
        Self {
            state: Arc::new(RwLock::new(MockState::default())),
            database: database.into(),
            schema: schema.into(),
            fail_connection: false,
        }
    }

    /// Configure to fail connects and connection tests
    pub fn with_connection_failure(mut self) -> Self {
        self.fail_connection = true;
        self
    }

    /// Make `operation` on bare table name `table` return `error`
    pub async fn add_error_for(&self, operation: MockOperation, table: &str, error: WarehouseError) {
        let fqn = self.qualify(table).fqn();
        self.state.write().await.errors.insert((operation, fqn), error);
    }

    /// Clear all configured errors
    pub async fn clear_errors(&self) {
        self.state.write().await.errors.clear();
    }

    /// Rows of a table, aligned to its schema's column order
    pub async fn rows(&self, table: &str) -> Option<Vec<Vec<String>>> {
        let fqn = self.qualify(table).fqn();
        self.state.read().await.tables.get(&fqn).map(|t| t.rows.clone())
    }

    /// Check if a table exists
    pub async fn has_table(&self, table: &str) -> bool {
        let fqn = self.qualify(table).fqn();
        self.state.read().await.tables.contains_key(&fqn)
    }

    /// Every call made so far
    pub async fn calls(&self) -> Vec<MockCall> {
        self.state.read().await.calls.clone()
    }

    /// Sessions connected and not yet closed
    pub async fn open_sessions(&self) -> usize {
        self.state.read().await.open_sessions
    }

    async fn check_error(&self, operation: MockOperation, table: &TableIdentifier) -> Result<(), WarehouseError> {
        match self.state.read().await.errors.get(&(operation, table.fqn())) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    async fn record(&self, call: MockCall) {
        self.state.write().await.calls.push(call);
    }
}

#[async_trait]
impl WarehouseSession for MockWarehouse {
    fn name(&self) -> &'static str {
        "Mock"
    }

    fn qualify(&self, table: &str) -> TableIdentifier {
        TableIdentifier::new(&self.database, &self.schema, table)
    }

    async fn test_connection(&self) -> Result<(), WarehouseError> {
        if self.fail_connection {
            Err(WarehouseError::NetworkError(
                "Simulated connection failure".to_string(),
            ))
        } else {
            Ok(())
        }
    }

    async fn create_table_if_not_exists(
        &self,
        table: &TableIdentifier,
        schema: &Schema,
    ) -> Result<(), WarehouseError> {
        self.record(MockCall::CreateTable(table.fqn())).await;
        self.check_error(MockOperation::CreateTable, table).await?;

        self.state
            .write()
            .await
            .tables
            .entry(table.fqn())
            .or_insert_with(|| MockTable {
                schema: schema.clone(),
                rows: Vec::new(),
            });
        Ok(())
    }

    async fn write_frame(
        &self,
        table: &TableIdentifier,
        frame: &Frame,
        overwrite: bool,
    ) -> Result<u64, WarehouseError> {
        self.record(MockCall::Write {
            table: table.fqn(),
            rows: frame.len(),
            overwrite,
        })
        .await;
        self.check_error(MockOperation::Write, table).await?;

        let mut state = self.state.write().await;
        let target = state
            .tables
            .get_mut(&table.fqn())
            .ok_or_else(|| WarehouseError::TableNotFound(table.fqn()))?;

        // Identifiers are case-sensitive here, as for quoted Snowflake names
        let positions = frame
            .headers
            .iter()
            .map(|header| {
                target.schema.column_index(header).ok_or_else(|| {
                    WarehouseError::WriteError(format!("invalid identifier '{}'", header))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let width = target.schema.columns.len();
        let incoming: Vec<Vec<String>> = frame
            .rows
            .iter()
            .map(|row| {
                let mut aligned = vec![String::new(); width];
                for (cell, &position) in row.iter().zip(&positions) {
                    aligned[position] = cell.clone();
                }
                aligned
            })
            .collect();

        if overwrite {
            target.rows.clear();
        }
        target.rows.extend(incoming);

        Ok(frame.len() as u64)
    }

    async fn truncate_table(&self, table: &TableIdentifier) -> Result<(), WarehouseError> {
        self.record(MockCall::Truncate(table.fqn())).await;
        self.check_error(MockOperation::Truncate, table).await?;

        let mut state = self.state.write().await;
        let target = state
            .tables
            .get_mut(&table.fqn())
            .ok_or_else(|| WarehouseError::TableNotFound(table.fqn()))?;
        target.rows.clear();
        Ok(())
    }

    async fn row_count(&self, table: &TableIdentifier) -> Result<u64, WarehouseError> {
        self.record(MockCall::RowCount(table.fqn())).await;
        self.check_error(MockOperation::RowCount, table).await?;

        self.state
            .read()
            .await
            .tables
            .get(&table.fqn())
            .map(|t| t.rows.len() as u64)
            .ok_or_else(|| WarehouseError::TableNotFound(table.fqn()))
    }

    async fn fetch_schema(&self, table: &TableIdentifier) -> Result<Schema, WarehouseError> {
        self.record(MockCall::FetchSchema(table.fqn())).await;
        self.check_error(MockOperation::FetchSchema, table).await?;

        self.state
            .read()
            .await
            .tables
            .get(&table.fqn())
            .map(|t| t.schema.clone())
            .ok_or_else(|| WarehouseError::TableNotFound(table.fqn()))
    }

    async fn close(&mut self) -> Result<(), WarehouseError> {
        let mut state = self.state.write().await;
        state.calls.push(MockCall::Close);
        state.open_sessions = state.open_sessions.saturating_sub(1);
        Ok(())
    }
}

/// Connector handing out sessions on a shared [`MockWarehouse`]
#[derive(Clone)]
pub struct MockConnector {
    warehouse: MockWarehouse,
}

impl MockConnector {
    pub fn new(warehouse: MockWarehouse) -> Self {
        Self { warehouse }
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self) -> Result<Box<dyn WarehouseSession>, WarehouseError> {
        self.warehouse.record(MockCall::Connect).await;
        self.warehouse.test_connection().await?;
        self.warehouse.state.write().await.open_sessions += 1;
        Ok(Box::new(self.warehouse.clone()))
    }
}
