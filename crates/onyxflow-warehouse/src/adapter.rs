//! Warehouse session and connector traits

use async_trait::async_trait;
use onyxflow_core::{Frame, Schema};
use std::fmt;

/// Identifies a table in a warehouse
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableIdentifier {
    /// Database name
    pub database: String,

    /// Schema name
    pub schema: String,

    /// Table name
    pub table: String,
}

impl TableIdentifier {
    /// Create a new table identifier
    pub fn new(database: impl Into<String>, schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            schema: schema.into(),
            table: table.into(),
        }
    }

    /// Get fully qualified name
    pub fn fqn(&self) -> String {
        format!("{}.{}.{}", self.database, self.schema, self.table)
    }

    /// Table stage reference (`@DB.SCHEMA.%TABLE`)
    pub fn table_stage(&self) -> String {
        format!("@{}.{}.%{}", self.database, self.schema, self.table)
    }
}

impl fmt::Display for TableIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.fqn())
    }
}

/// Errors returned by warehouse operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum WarehouseError {
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Query failed: {0}")]
    QueryError(String),

    #[error("Bulk write failed: {0}")]
    WriteError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// One open warehouse session
///
/// A session is bound to a default database and schema; bare table names
/// are qualified against them with [`WarehouseSession::qualify`].
#[async_trait]
pub trait WarehouseSession: Send + Sync {
    /// Get the adapter name (e.g., "Snowflake")
    fn name(&self) -> &'static str;

    /// Qualify a bare table name with the session's database and schema
    fn qualify(&self, table: &str) -> TableIdentifier;

    /// Round-trip a trivial query
    async fn test_connection(&self) -> Result<(), WarehouseError>;

    /// Create the table with `schema` unless it already exists
    async fn create_table_if_not_exists(
        &self,
        table: &TableIdentifier,
        schema: &Schema,
    ) -> Result<(), WarehouseError>;

    /// Write every row of `frame` in one bulk operation
    ///
    /// Frame headers must already match table column names. With
    /// `overwrite`, existing rows are replaced; otherwise rows are appended.
    /// Returns the number of rows written.
    async fn write_frame(
        &self,
        table: &TableIdentifier,
        frame: &Frame,
        overwrite: bool,
    ) -> Result<u64, WarehouseError>;

    /// Remove all rows, keep the table definition
    async fn truncate_table(&self, table: &TableIdentifier) -> Result<(), WarehouseError>;

    /// Number of rows currently in the table
    async fn row_count(&self, table: &TableIdentifier) -> Result<u64, WarehouseError>;

    /// Column names and types from INFORMATION_SCHEMA
    async fn fetch_schema(&self, table: &TableIdentifier) -> Result<Schema, WarehouseError>;

    /// Release the session. Called once, on every exit path.
    async fn close(&mut self) -> Result<(), WarehouseError>;
}

/// Opens sessions from static configuration
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open and verify a new session
    async fn connect(&self) -> Result<Box<dyn WarehouseSession>, WarehouseError>;
}
