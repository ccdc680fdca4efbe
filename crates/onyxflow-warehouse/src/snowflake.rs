//! Snowflake session adapter
//!
//! Issues plain SQL through `snowflake-api`. Bulk writes stage the frame as
//! a CSV file in the table stage (`PUT`) and load it with `COPY INTO`, which
//! is one warehouse operation however many rows the frame holds.
//!
//! An overwrite deletes the old rows and copies the new ones inside one
//! transaction; if the copy fails the table keeps its previous rows.
//!
//! Required privileges on the target schema: USAGE, CREATE TABLE, and
//! INSERT / DELETE / TRUNCATE on the pipeline tables.
//!
//! ## Authentication Methods
//!
//! 1. Password authentication (username/password)
//! 2. Key-pair authentication (private key PEM)
//!
//! ## Usage
//!
//! ```rust,ignore
//! let adapter = SnowflakeAdapter::new("xy12345.ap-southeast-2", "loader", "password")
//!     .with_warehouse("COMPUTE_WH")
//!     .with_role("LOADER")
//!     .with_database("ONYX_DB")
//!     .with_schema("GAME_SCHEMA")
//!     .build()?;
//! ```

use crate::adapter::{Connector, TableIdentifier, WarehouseError, WarehouseSession};
use async_trait::async_trait;
use onyxflow_core::config::PASSWORD_ENV;
use onyxflow_core::{Frame, LogicalType, Schema, WarehouseConfig};

#[cfg(feature = "snowflake")]
use crate::sql;

#[cfg(feature = "snowflake")]
use onyxflow_core::{Column, CsvOptions, Nullability};

#[cfg(feature = "snowflake")]
use snowflake_api::{QueryResult, SnowflakeApi};

#[cfg(feature = "snowflake")]
use arrow_array::cast::AsArray;

#[cfg(feature = "snowflake")]
use arrow_array::Array;

/// Snowflake authentication credentials
#[derive(Clone)]
pub enum SnowflakeCredentials {
    /// Password-based authentication
    Password(String),
    /// Key-pair authentication (PEM format private key)
    PrivateKey(String),
}

/// Builder for SnowflakeAdapter
pub struct SnowflakeAdapterBuilder {
    #[cfg_attr(not(feature = "snowflake"), allow(dead_code))]
    account: String,
    #[cfg_attr(not(feature = "snowflake"), allow(dead_code))]
    username: String,
    #[cfg_attr(not(feature = "snowflake"), allow(dead_code))]
    credentials: SnowflakeCredentials,
    warehouse: Option<String>,
    role: Option<String>,
    database: String,
    schema: String,
}

impl SnowflakeAdapterBuilder {
    /// Create new builder with password authentication
    pub fn with_password(
        account: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self::with_credentials(account, username, SnowflakeCredentials::Password(password.into()))
    }

    /// Create new builder with key-pair authentication
    pub fn with_key_pair(
        account: impl Into<String>,
        username: impl Into<String>,
        private_key_pem: impl Into<String>,
    ) -> Self {
        Self::with_credentials(account, username, SnowflakeCredentials::PrivateKey(private_key_pem.into()))
    }

    fn with_credentials(
        account: impl Into<String>,
        username: impl Into<String>,
        credentials: SnowflakeCredentials,
    ) -> Self {
        Self {
            account: account.into(),
            username: username.into(),
            credentials,
            warehouse: None,
            role: None,
            database: String::new(),
            schema: String::new(),
        }
    }

    /// Set the warehouse to use
    pub fn with_warehouse(mut self, warehouse: impl Into<String>) -> Self {
        self.warehouse = Some(warehouse.into());
        self
    }

    /// Set the role to use
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// Set the default database
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    /// Set the default schema
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }

    fn check_location(&self) -> Result<(), WarehouseError> {
        if self.database.is_empty() || self.schema.is_empty() {
            return Err(WarehouseError::ConfigError(
                "Snowflake sessions need a default database and schema".to_string(),
            ));
        }
        Ok(())
    }

    /// Build the adapter
    #[cfg(feature = "snowflake")]
    pub fn build(self) -> Result<SnowflakeAdapter, WarehouseError> {
        self.check_location()?;

        let api = match &self.credentials {
            SnowflakeCredentials::Password(password) => {
                SnowflakeApi::with_password_auth(
                    &self.account,
                    self.warehouse.as_deref(),
                    Some(self.database.as_str()),
                    Some(self.schema.as_str()),
                    &self.username,
                    self.role.as_deref(),
                    password,
                )
                .map_err(|e| WarehouseError::AuthenticationError(format!(
                    "Failed to authenticate with Snowflake: {}",
                    e
                )))?
            }
            SnowflakeCredentials::PrivateKey(private_key_pem) => {
                SnowflakeApi::with_certificate_auth(
                    &self.account,
                    self.warehouse.as_deref(),
                    Some(self.database.as_str()),
                    Some(self.schema.as_str()),
                    &self.username,
                    self.role.as_deref(),
                    private_key_pem,
                )
                .map_err(|e| WarehouseError::AuthenticationError(format!(
                    "Failed to authenticate with key-pair: {}",
                    e
                )))?
            }
        };

        Ok(SnowflakeAdapter {
            api,
            account: self.account,
            database: self.database,
            schema: self.schema,
        })
    }

    /// Build without snowflake feature
    #[cfg(not(feature = "snowflake"))]
    pub fn build(self) -> Result<SnowflakeAdapter, WarehouseError> {
        self.check_location()?;
        Err(not_compiled())
    }
}

#[cfg(not(feature = "snowflake"))]
fn not_compiled() -> WarehouseError {
    WarehouseError::ConfigError(
        "Snowflake support not compiled. Rebuild with: cargo build --features snowflake".to_string(),
    )
}

/// Snowflake session
pub struct SnowflakeAdapter {
    #[cfg(feature = "snowflake")]
    api: SnowflakeApi,

    account: String,
    database: String,
    schema: String,
}

impl SnowflakeAdapter {
    /// Create a new Snowflake adapter with password authentication (returns builder)
    pub fn new(
        account: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> SnowflakeAdapterBuilder {
        SnowflakeAdapterBuilder::with_password(account, username, password)
    }

    /// Account this session is connected to
    pub fn account(&self) -> &str {
        &self.account
    }

    /// Convert Snowflake type to LogicalType
    pub fn map_snowflake_type(sf_type: &str) -> LogicalType {
        // Snowflake types can include precision/scale like "NUMBER(38,0)"
        let base_type = sf_type.split('(').next()
            .unwrap_or(sf_type)
            .trim()
            .to_uppercase();

        match base_type.as_str() {
            "BOOLEAN" => LogicalType::Bool,

            "NUMBER" | "DECIMAL" | "NUMERIC" => {
                if Self::is_integer_number(sf_type) {
                    LogicalType::Int
                } else {
                    Self::parse_decimal_type(sf_type)
                }
            }

            "INT" | "INTEGER" | "BIGINT" | "SMALLINT" | "TINYINT" | "BYTEINT" => LogicalType::Int,

            "FLOAT" | "FLOAT4" | "FLOAT8" | "DOUBLE" | "DOUBLE PRECISION" | "REAL" => LogicalType::Float,

            "VARCHAR" | "STRING" | "TEXT" | "CHAR" | "CHARACTER" | "NVARCHAR" | "NCHAR" => {
                LogicalType::String
            }

            "DATE" => LogicalType::Date,

            "DATETIME" | "TIMESTAMP" | "TIMESTAMP_NTZ" | "TIMESTAMP_LTZ" | "TIMESTAMP_TZ" => {
                LogicalType::Timestamp
            }

            _ => LogicalType::Unknown,
        }
    }

    /// NUMBER(p) and NUMBER(p,0) are integers; bare NUMBER is not
    fn is_integer_number(type_str: &str) -> bool {
        match Self::number_params(type_str) {
            Some((_, None)) => true,
            Some((_, Some(scale))) => scale == 0,
            None => false,
        }
    }

    /// Parse decimal type with precision and scale
    fn parse_decimal_type(type_str: &str) -> LogicalType {
        match Self::number_params(type_str) {
            Some((precision, scale)) => LogicalType::Decimal {
                precision,
                scale: Some(scale.unwrap_or(0)),
            },
            // Default Snowflake NUMBER precision
            None => LogicalType::Decimal {
                precision: Some(38),
                scale: Some(0),
            },
        }
    }

    /// `(precision, scale)` from "NUMBER(p,s)" / "NUMBER(p)"
    fn number_params(type_str: &str) -> Option<(Option<u16>, Option<u16>)> {
        let params = type_str.split('(').nth(1)?.strip_suffix(')')?;
        let parts: Vec<&str> = params.split(',').map(str::trim).collect();
        match parts.as_slice() {
            [p] => Some((p.parse().ok(), None)),
            [p, s] => Some((p.parse().ok(), Some(s.parse().ok()?))),
            _ => None,
        }
    }
}

#[cfg(feature = "snowflake")]
impl SnowflakeAdapter {
    async fn exec(&self, query: &str, table: Option<&TableIdentifier>) -> Result<QueryResult, WarehouseError> {
        tracing::debug!(query = query.trim(), "Executing Snowflake statement");

        self.api.exec(query).await.map_err(|e| {
            let err_str = e.to_string();
            let target = table.map(|t| t.fqn()).unwrap_or_default();
            if err_str.contains("does not exist") || err_str.contains("not found") {
                WarehouseError::TableNotFound(if target.is_empty() { err_str } else { target })
            } else if err_str.contains("Insufficient privileges") || err_str.contains("Permission") {
                WarehouseError::PermissionDenied(format!("Cannot access {}: {}", target, err_str))
            } else {
                WarehouseError::QueryError(err_str)
            }
        })
    }

    /// Delete the current rows and run `copy` as one transaction
    ///
    /// A failed copy rolls the delete back, so the table keeps its previous
    /// rows. `TRUNCATE` is not used here because it cannot be rolled back.
    async fn replace_rows(&self, table: &TableIdentifier, copy: &str) -> Result<(), WarehouseError> {
        self.exec(sql::BEGIN, Some(table)).await.map_err(as_write_error)?;

        let replaced = match self.exec(&sql::delete_all(table), Some(table)).await {
            Ok(_) => self.exec(copy, Some(table)).await.map(|_| ()),
            Err(e) => Err(e),
        };

        match replaced {
            Ok(()) => {
                self.exec(sql::COMMIT, Some(table)).await.map_err(as_write_error)?;
                Ok(())
            }
            Err(e) => {
                if let Err(rollback) = self.exec(sql::ROLLBACK, Some(table)).await {
                    tracing::warn!(table = %table, error = %rollback, "Rollback after failed overwrite failed");
                }
                Err(as_write_error(e))
            }
        }
    }

    /// Values of the named VARCHAR columns in an Arrow result, one `Vec` per column
    fn string_columns(result: QueryResult, columns: &[&str]) -> Result<Vec<Vec<Option<String>>>, WarehouseError> {
        let batches = match result {
            QueryResult::Arrow(batches) => batches,
            QueryResult::Json(_) => {
                return Err(WarehouseError::InvalidResponse(
                    "Unexpected JSON result format".to_string(),
                ));
            }
            QueryResult::Empty => Vec::new(),
        };

        let mut values = vec![Vec::new(); columns.len()];
        for batch in batches {
            let schema = batch.schema();

            for (slot, column) in values.iter_mut().zip(columns) {
                let index = schema.index_of(column).map_err(|_| {
                    WarehouseError::InvalidResponse(format!("Missing {} column", column))
                })?;
                let array = batch.column(index).as_string_opt::<i32>().ok_or_else(|| {
                    WarehouseError::InvalidResponse(format!("{} is not a string column", column))
                })?;

                for row in 0..batch.num_rows() {
                    slot.push(if array.is_null(row) {
                        None
                    } else {
                        Some(array.value(row).to_string())
                    });
                }
            }
        }
        Ok(values)
    }
}

#[cfg_attr(not(feature = "snowflake"), allow(dead_code))]
fn as_write_error(error: WarehouseError) -> WarehouseError {
    match error {
        WarehouseError::QueryError(message) => WarehouseError::WriteError(message),
        other => other,
    }
}

#[cfg(feature = "snowflake")]
#[async_trait]
impl WarehouseSession for SnowflakeAdapter {
    fn name(&self) -> &'static str {
        "Snowflake"
    }

    fn qualify(&self, table: &str) -> TableIdentifier {
        TableIdentifier::new(&self.database, &self.schema, table)
    }

    async fn test_connection(&self) -> Result<(), WarehouseError> {
        self.api.exec("SELECT 1")
            .await
            .map_err(|e| WarehouseError::NetworkError(format!("Connection test failed: {}", e)))?;
        Ok(())
    }

    async fn create_table_if_not_exists(
        &self,
        table: &TableIdentifier,
        schema: &Schema,
    ) -> Result<(), WarehouseError> {
        self.exec(&sql::create_table_if_not_exists(table, schema), Some(table)).await?;
        Ok(())
    }

    async fn write_frame(
        &self,
        table: &TableIdentifier,
        frame: &Frame,
        overwrite: bool,
    ) -> Result<u64, WarehouseError> {
        let mut staged = tempfile::Builder::new()
            .prefix("onyxflow_")
            .suffix(".csv")
            .tempfile()
            .map_err(|e| WarehouseError::WriteError(format!("Failed to create staging file: {}", e)))?;

        frame
            .write_csv(staged.as_file_mut(), &CsvOptions::default())
            .map_err(|e| WarehouseError::WriteError(format!("Failed to write staging file: {}", e)))?;

        let file_name = staged
            .path()
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or_else(|| WarehouseError::WriteError("Staging file name is not UTF-8".to_string()))?;

        self.exec(&sql::put_file(staged.path(), table), Some(table))
            .await
            .map_err(as_write_error)?;

        let copy = sql::copy_into(table, &frame.headers, &file_name);
        if overwrite {
            self.replace_rows(table, &copy).await?;
        } else {
            self.exec(&copy, Some(table)).await.map_err(as_write_error)?;
        }

        Ok(frame.len() as u64)
    }

    async fn truncate_table(&self, table: &TableIdentifier) -> Result<(), WarehouseError> {
        self.exec(&sql::truncate_table(table), Some(table)).await?;
        Ok(())
    }

    async fn row_count(&self, table: &TableIdentifier) -> Result<u64, WarehouseError> {
        let result = self.exec(&sql::row_count(table), Some(table)).await?;
        let count = Self::string_columns(result, &["ROW_COUNT"])?
            .into_iter()
            .next()
            .and_then(|values| values.into_iter().next())
            .flatten()
            .ok_or_else(|| WarehouseError::InvalidResponse("COUNT(*) returned no rows".to_string()))?;

        count
            .parse()
            .map_err(|_| WarehouseError::InvalidResponse(format!("Invalid row count '{}'", count)))
    }

    async fn fetch_schema(&self, table: &TableIdentifier) -> Result<Schema, WarehouseError> {
        let result = self.exec(&sql::information_schema_columns(table), Some(table)).await?;
        let mut decoded = Self::string_columns(
            result,
            &["COLUMN_NAME", "DATA_TYPE", "IS_NULLABLE", "NUMERIC_PRECISION", "NUMERIC_SCALE"],
        )?
        .into_iter();

        let mut next_column = || decoded.next().unwrap_or_default();
        let (names, types, nullable, precision, scale) =
            (next_column(), next_column(), next_column(), next_column(), next_column());

        let mut columns = Vec::new();
        for (i, name) in names.into_iter().enumerate() {
            let Some(name) = name else { continue };
            let data_type = types.get(i).cloned().flatten().unwrap_or_default();

            // Build full type with precision/scale for numeric types
            let full_type = if data_type == "NUMBER" {
                match (precision.get(i).cloned().flatten(), scale.get(i).cloned().flatten()) {
                    (Some(p), Some(s)) => format!("NUMBER({},{})", p, s),
                    (Some(p), None) => format!("NUMBER({})", p),
                    _ => data_type,
                }
            } else {
                data_type
            };

            let nullability = match nullable.get(i).cloned().flatten().as_deref() {
                Some("YES") => Nullability::Yes,
                Some("NO") => Nullability::No,
                _ => Nullability::Unknown,
            };

            columns.push(
                Column::new(name, Self::map_snowflake_type(&full_type)).with_nullability(nullability),
            );
        }

        if columns.is_empty() {
            return Err(WarehouseError::TableNotFound(format!(
                "Table {} not found or has no columns",
                table.fqn()
            )));
        }

        Ok(Schema::from_columns(columns))
    }

    async fn close(&mut self) -> Result<(), WarehouseError> {
        self.api
            .close_session()
            .await
            .map_err(|e| WarehouseError::NetworkError(format!("Failed to close session: {}", e)))
    }
}

#[cfg(not(feature = "snowflake"))]
#[async_trait]
impl WarehouseSession for SnowflakeAdapter {
    fn name(&self) -> &'static str {
        "Snowflake"
    }

    fn qualify(&self, table: &str) -> TableIdentifier {
        TableIdentifier::new(&self.database, &self.schema, table)
    }

    async fn test_connection(&self) -> Result<(), WarehouseError> {
        Err(not_compiled())
    }

    async fn create_table_if_not_exists(&self, _: &TableIdentifier, _: &Schema) -> Result<(), WarehouseError> {
        Err(not_compiled())
    }

    async fn write_frame(&self, _: &TableIdentifier, _: &Frame, _: bool) -> Result<u64, WarehouseError> {
        Err(not_compiled())
    }

    async fn truncate_table(&self, _: &TableIdentifier) -> Result<(), WarehouseError> {
        Err(not_compiled())
    }

    async fn row_count(&self, _: &TableIdentifier) -> Result<u64, WarehouseError> {
        Err(not_compiled())
    }

    async fn fetch_schema(&self, _: &TableIdentifier) -> Result<Schema, WarehouseError> {
        Err(not_compiled())
    }

    async fn close(&mut self) -> Result<(), WarehouseError> {
        Ok(())
    }
}

/// Opens Snowflake sessions from [`WarehouseConfig`]
pub struct SnowflakeConnector {
    config: WarehouseConfig,
}

impl SnowflakeConnector {
    pub fn new(config: WarehouseConfig) -> Self {
        Self { config }
    }

    /// Builder with credentials resolved from config, key file or environment
    pub fn builder(&self) -> Result<SnowflakeAdapterBuilder, WarehouseError> {
        let config = &self.config;

        let mut builder = if let Some(key_path) = &config.private_key_path {
            let pem = std::fs::read_to_string(key_path).map_err(|e| {
                WarehouseError::ConfigError(format!(
                    "Cannot read private key {}: {}",
                    key_path.display(),
                    e
                ))
            })?;
            SnowflakeAdapterBuilder::with_key_pair(&config.account, &config.user, pem)
        } else {
            let password = config.password().ok_or_else(|| {
                WarehouseError::ConfigError(format!(
                    "No Snowflake password: set warehouse.password or {}",
                    PASSWORD_ENV
                ))
            })?;
            SnowflakeAdapterBuilder::with_password(&config.account, &config.user, password)
        };

        builder = builder
            .with_database(&config.database)
            .with_schema(&config.schema);

        if let Some(warehouse) = &config.warehouse {
            builder = builder.with_warehouse(warehouse);
        }
        if let Some(role) = &config.role {
            builder = builder.with_role(role);
        }

        Ok(builder)
    }
}

#[async_trait]
impl Connector for SnowflakeConnector {
    async fn connect(&self) -> Result<Box<dyn WarehouseSession>, WarehouseError> {
        tracing::info!(
            account = %self.config.account,
            user = %self.config.user,
            database = %self.config.database,
            schema = %self.config.schema,
            "Connecting to Snowflake"
        );

        let mut adapter = self.builder()?.build()?;

        if let Err(e) = adapter.test_connection().await {
            // report the probe error, not the close error
            let _ = adapter.close().await;
            return Err(e);
        }

        Ok(Box::new(adapter))
    }
}
