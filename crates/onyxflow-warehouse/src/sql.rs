//! SQL text for the statements the pipeline issues

use crate::adapter::TableIdentifier;
use onyxflow_core::Schema;
use std::path::Path;

/// `CREATE TABLE IF NOT EXISTS` with one column per schema entry
pub fn create_table_if_not_exists(table: &TableIdentifier, schema: &Schema) -> String {
    let columns: Vec<String> = schema
        .columns
        .iter()
        .map(|c| format!("    {} {}", c.name, c.logical_type.sql_type()))
        .collect();

    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n{}\n)",
        table.fqn(),
        columns.join(",\n")
    )
}

pub fn truncate_table(table: &TableIdentifier) -> String {
    format!("TRUNCATE TABLE {}", table.fqn())
}

/// Row removal that stays inside an open transaction
pub fn delete_all(table: &TableIdentifier) -> String {
    format!("DELETE FROM {}", table.fqn())
}

pub const BEGIN: &str = "BEGIN TRANSACTION";
pub const COMMIT: &str = "COMMIT";
pub const ROLLBACK: &str = "ROLLBACK";

/// Row count, cast to text so the result decodes the same way on every driver
pub fn row_count(table: &TableIdentifier) -> String {
    format!("SELECT COUNT(*)::VARCHAR AS ROW_COUNT FROM {}", table.fqn())
}

/// Upload a local file, uncompressed, to the table's stage
pub fn put_file(local: &Path, table: &TableIdentifier) -> String {
    format!(
        "PUT file://{} {} AUTO_COMPRESS = FALSE SOURCE_COMPRESSION = NONE OVERWRITE = TRUE",
        local.display(),
        table.table_stage()
    )
}

/// Copy one staged CSV file into the table, matching columns by position
/// against the explicit column list, then purge the staged file
pub fn copy_into(table: &TableIdentifier, columns: &[String], staged_file: &str) -> String {
    format!(
        "COPY INTO {} ({}) FROM {} FILES = ('{}') \
         FILE_FORMAT = (TYPE = CSV SKIP_HEADER = 1 FIELD_OPTIONALLY_ENCLOSED_BY = '\"' EMPTY_FIELD_AS_NULL = TRUE) \
         ON_ERROR = ABORT_STATEMENT PURGE = TRUE",
        table.fqn(),
        columns.join(", "),
        table.table_stage(),
        escape_literal(staged_file)
    )
}

/// Columns of a table from INFORMATION_SCHEMA, in ordinal order
///
/// Snowflake stores unquoted identifiers upper-cased, so schema and table
/// names are compared upper-cased.
pub fn information_schema_columns(table: &TableIdentifier) -> String {
    format!(
        r#"
            SELECT
                COLUMN_NAME,
                DATA_TYPE,
                IS_NULLABLE,
                NUMERIC_PRECISION::VARCHAR AS NUMERIC_PRECISION,
                NUMERIC_SCALE::VARCHAR AS NUMERIC_SCALE
            FROM {}.INFORMATION_SCHEMA.COLUMNS
            WHERE TABLE_SCHEMA = '{}'
              AND TABLE_NAME = '{}'
            ORDER BY ORDINAL_POSITION
            "#,
        table.database,
        escape_literal(&table.schema.to_uppercase()),
        escape_literal(&table.table.to_uppercase())
    )
}

/// Escape a value for use inside a single-quoted SQL literal
pub fn escape_literal(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "''")
}
