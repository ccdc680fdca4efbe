//! Table schema types and the fixed game performance layout

use serde::{Deserialize, Serialize};

/// Portable logical type system
///
/// Maps warehouse column types to a common representation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LogicalType {
    /// Boolean type
    Bool,

    /// Integer type (any precision)
    Int,

    /// Floating point (any precision)
    Float,

    /// Decimal with precision and scale
    Decimal {
        precision: Option<u16>,
        scale: Option<u16>,
    },

    /// String/text type
    String,

    /// Date (no time component)
    Date,

    /// Timestamp (with time component)
    Timestamp,

    /// Unknown type (cannot map)
    Unknown,
}

impl LogicalType {
    /// Snowflake column type used when rendering DDL
    pub fn sql_type(&self) -> String {
        match self {
            Self::Bool => "BOOLEAN".to_string(),
            Self::Int => "INT".to_string(),
            Self::Float => "FLOAT".to_string(),
            Self::Decimal { precision, scale } => match (precision, scale) {
                (Some(p), Some(s)) => format!("NUMBER({},{})", p, s),
                (Some(p), None) => format!("NUMBER({})", p),
                _ => "NUMBER".to_string(),
            },
            Self::String => "STRING".to_string(),
            Self::Date => "DATE".to_string(),
            Self::Timestamp => "TIMESTAMP_NTZ".to_string(),
            Self::Unknown => "VARIANT".to_string(),
        }
    }
}

impl std::fmt::Display for LogicalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool => write!(f, "BOOL"),
            Self::Int => write!(f, "INT"),
            Self::Float => write!(f, "FLOAT"),
            Self::Decimal { precision, scale } => match (precision, scale) {
                (Some(p), Some(s)) => write!(f, "DECIMAL({}, {})", p, s),
                (Some(p), None) => write!(f, "DECIMAL({})", p),
                _ => write!(f, "DECIMAL"),
            },
            Self::String => write!(f, "STRING"),
            Self::Date => write!(f, "DATE"),
            Self::Timestamp => write!(f, "TIMESTAMP"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Nullability state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Nullability {
    /// Definitely nullable
    Yes,

    /// Definitely not nullable
    No,

    /// Cannot determine nullability
    Unknown,
}

/// A column in a table schema
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Column {
    /// Column name
    pub name: String,

    /// Logical type
    pub logical_type: LogicalType,

    /// Nullability
    pub nullable: Nullability,
}

impl Column {
    /// Create a new column with unknown nullability
    pub fn new(name: impl Into<String>, logical_type: LogicalType) -> Self {
        Self {
            name: name.into(),
            logical_type,
            nullable: Nullability::Unknown,
        }
    }

    /// Set nullability
    pub fn with_nullability(mut self, nullable: Nullability) -> Self {
        self.nullable = nullable;
        self
    }
}

/// An ordered collection of columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// Ordered list of columns
    pub columns: Vec<Column>,
}

impl Schema {
    /// Create a new empty schema
    pub fn new() -> Self {
        Self {
            columns: Vec::new(),
        }
    }

    /// Create a schema from columns
    pub fn from_columns(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    /// Layout of the game performance tables (full load and staging share it)
    pub fn game_performance() -> Self {
        Self::from_columns(vec![
            Column::new("BUS_DATE", LogicalType::Date),
            Column::new("VENUE_CODE", LogicalType::String),
            Column::new("EGM_DESCRIPTION", LogicalType::String),
            Column::new("MANUFACTURER", LogicalType::String),
            Column::new("FP", LogicalType::String),
            Column::new("TURNOVER_SUM", LogicalType::Float),
            Column::new("GMP_SUM", LogicalType::Float),
            Column::new("GAMES_PLAYED_SUM", LogicalType::Int),
        ])
    }

    /// Find a column by name
    pub fn find_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Position of a column by name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Get column names
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::new()
    }
}

/// Warehouse identifier convention: trimmed, all caps
pub fn normalize_column_name(name: &str) -> String {
    name.trim().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logical_type_display() {
        assert_eq!(LogicalType::Bool.to_string(), "BOOL");
        assert_eq!(
            LogicalType::Decimal { precision: Some(10), scale: Some(2) }.to_string(),
            "DECIMAL(10, 2)"
        );
    }

    #[test]
    fn sql_types_for_ddl() {
        assert_eq!(LogicalType::Date.sql_type(), "DATE");
        assert_eq!(LogicalType::String.sql_type(), "STRING");
        assert_eq!(LogicalType::Float.sql_type(), "FLOAT");
        assert_eq!(LogicalType::Int.sql_type(), "INT");
        assert_eq!(
            LogicalType::Decimal { precision: Some(38), scale: Some(0) }.sql_type(),
            "NUMBER(38,0)"
        );
    }

    #[test]
    fn game_performance_layout() {
        let schema = Schema::game_performance();

        assert_eq!(
            schema.column_names(),
            vec![
                "BUS_DATE",
                "VENUE_CODE",
                "EGM_DESCRIPTION",
                "MANUFACTURER",
                "FP",
                "TURNOVER_SUM",
                "GMP_SUM",
                "GAMES_PLAYED_SUM",
            ]
        );
        assert_eq!(schema.column_index("FP"), Some(4));
        assert!(schema.find_column("bus_date").is_none());
    }

    #[test]
    fn column_name_normalization() {
        assert_eq!(normalize_column_name("Bus_Date"), "BUS_DATE");
        assert_eq!(normalize_column_name("  venue_code\t"), "VENUE_CODE");
        assert_eq!(normalize_column_name("GMP_SUM"), "GMP_SUM");
        assert_eq!(normalize_column_name(" Games_Played_Sum\r"), "GAMES_PLAYED_SUM");
    }
}
