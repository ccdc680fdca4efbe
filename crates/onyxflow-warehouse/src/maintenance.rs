//! Table maintenance: truncate, row counts and layout checks

use crate::adapter::{TableIdentifier, WarehouseError, WarehouseSession};
use onyxflow_core::Schema;
use tracing::info;

/// How an existing table compares with the layout the pipeline writes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableLayout {
    /// The table has not been created yet
    Missing,

    /// Same column names and types (nullability is not compared)
    Matches,

    Differs {
        /// Expected columns the table lacks
        missing: Vec<String>,

        /// Table columns the pipeline never writes
        unexpected: Vec<String>,

        /// `NAME: expected TYPE, found TYPE`
        mismatched: Vec<String>,
    },
}

impl TableLayout {
    pub fn is_usable(&self) -> bool {
        !matches!(self, Self::Differs { .. })
    }
}

/// Remove every row from `table`, keeping its definition
///
/// Used on the staging table once the models have consumed it, so the next
/// run starts from an empty staging table.
pub async fn truncate(session: &dyn WarehouseSession, table: &str) -> Result<TableIdentifier, WarehouseError> {
    let table = session.qualify(table);
    session.truncate_table(&table).await?;
    info!(table = %table, "Table truncated");
    Ok(table)
}

/// Current number of rows in `table`
pub async fn row_count(session: &dyn WarehouseSession, table: &str) -> Result<u64, WarehouseError> {
    session.row_count(&session.qualify(table)).await
}

/// Compare the warehouse definition of `table` with `expected`
pub async fn check_layout(
    session: &dyn WarehouseSession,
    table: &str,
    expected: &Schema,
) -> Result<TableLayout, WarehouseError> {
    let table = session.qualify(table);
    let actual = match session.fetch_schema(&table).await {
        Ok(schema) => schema,
        Err(WarehouseError::TableNotFound(_)) => {
            info!(table = %table, "Table does not exist yet");
            return Ok(TableLayout::Missing);
        }
        Err(e) => return Err(e),
    };

    let mut missing = Vec::new();
    let mut mismatched = Vec::new();
    for column in &expected.columns {
        match actual.find_column(&column.name) {
            None => missing.push(column.name.clone()),
            Some(found) if found.logical_type != column.logical_type => mismatched.push(format!(
                "{}: expected {}, found {}",
                column.name, column.logical_type, found.logical_type
            )),
            Some(_) => {}
        }
    }

    let unexpected: Vec<String> = actual
        .columns
        .iter()
        .filter(|c| expected.find_column(&c.name).is_none())
        .map(|c| c.name.clone())
        .collect();

    if missing.is_empty() && unexpected.is_empty() && mismatched.is_empty() {
        info!(table = %table, "Table layout matches");
        Ok(TableLayout::Matches)
    } else {
        info!(table = %table, ?missing, ?unexpected, ?mismatched, "Table layout differs");
        Ok(TableLayout::Differs {
            missing,
            unexpected,
            mismatched,
        })
    }
}
