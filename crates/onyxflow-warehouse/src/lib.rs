//! Warehouse access for the load pipeline
//!
//! This crate owns everything that talks to the warehouse: the session and
//! connector traits, the Snowflake adapter, an in-memory mock, the CSV
//! loader and table maintenance.
//!
//! ## Features
//!
//! - `snowflake` - compile the Snowflake adapter against `snowflake-api`
//!
//! ## Example
//!
//! ```rust,ignore
//! use onyxflow_warehouse::{Connector, Loader, LoadJob, SnowflakeConnector};
//!
//! let mut session = SnowflakeConnector::new(config.warehouse.unwrap()).connect().await?;
//! let job = LoadJob::new("data/game_performance.csv", "GAME_PERFORMANCE_DATA", true);
//! let summary = Loader::game_performance().load(session.as_ref(), &job).await;
//! session.close().await?;
//! ```

pub mod adapter;
pub mod loader;
pub mod maintenance;
pub mod mock;
pub mod snowflake;
pub mod sql;

pub use adapter::{Connector, TableIdentifier, WarehouseError, WarehouseSession};
pub use loader::{LoadError, LoadJob, LoadSummary, Loader};
pub use mock::{MockCall, MockConnector, MockOperation, MockWarehouse};
pub use snowflake::{SnowflakeAdapter, SnowflakeAdapterBuilder, SnowflakeConnector};
