//! onyxflow core
//!
//! Shared domain model for the load pipeline: configuration, the fixed
//! game performance table schema, and the in-memory CSV frame.

pub mod config;
pub mod frame;
pub mod schema;

pub use config::{Config, ConfigError, LoadConfig, TransformConfig, WarehouseConfig};
pub use frame::{CsvOptions, Frame, ParseError};
pub use schema::{normalize_column_name, Column, LogicalType, Nullability, Schema};
