//! Configuration schema (onyxflow.toml)
//!
//! Connection parameters, load jobs and the transform project are all
//! supplied here at process start. The Snowflake password may be left out
//! of the file and provided through `ONYXFLOW_SNOWFLAKE_PASSWORD` instead.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable consulted when the config file carries no password
pub const PASSWORD_ENV: &str = "ONYXFLOW_SNOWFLAKE_PASSWORD";

/// Models run by default, in this order
pub const DEFAULT_MODELS: [&str; 4] = [
    "game_performance_incremental",
    "daily_summary",
    "total_turnover_by_venue",
    "revenue_by_egm_and_venue",
];

/// Warehouse connection configuration
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct WarehouseConfig {
    /// Account identifier (e.g. "xy12345.ap-southeast-2")
    pub account: String,

    /// Login name
    pub user: String,

    /// Password; falls back to `ONYXFLOW_SNOWFLAKE_PASSWORD`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// PEM private key for key-pair auth (takes precedence over password)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key_path: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    /// Compute warehouse
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warehouse: Option<String>,

    pub database: String,

    pub schema: String,
}

impl WarehouseConfig {
    /// Password from the file, or from the environment
    pub fn password(&self) -> Option<String> {
        self.password
            .clone()
            .or_else(|| std::env::var(PASSWORD_ENV).ok())
            .filter(|p| !p.is_empty())
    }
}

impl std::fmt::Debug for WarehouseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WarehouseConfig")
            .field("account", &self.account)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("private_key_path", &self.private_key_path)
            .field("role", &self.role)
            .field("warehouse", &self.warehouse)
            .field("database", &self.database)
            .field("schema", &self.schema)
            .finish()
    }
}

/// Source files and destination tables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    /// File loaded with overwrite into `full_table`
    pub full_file: PathBuf,

    /// Table replaced on every run
    pub full_table: String,

    /// File appended into `staging_table`
    pub incremental_file: PathBuf,

    /// Staging table, truncated once the models have consumed it
    pub staging_table: String,

    /// Field delimiter (single ASCII character)
    pub delimiter: char,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            full_file: PathBuf::from("data/game_performance.csv"),
            full_table: "GAME_PERFORMANCE_DATA".to_string(),
            incremental_file: PathBuf::from("data/game_performance_incremental.csv"),
            staging_table: "GAME_PERFORMANCE_STAGING".to_string(),
            delimiter: ',',
        }
    }
}

/// External transformation tool (dbt) settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    /// Executable name or path
    pub executable: String,

    /// Project directory; every invocation runs with this as its cwd
    pub project_dir: PathBuf,

    /// Models to run, in order. Empty runs the whole project once.
    pub models: Vec<String>,

    /// `--target`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,

    /// `--profiles-dir`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profiles_dir: Option<PathBuf>,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            executable: "dbt".to_string(),
            project_dir: PathBuf::from("dbt_project"),
            models: DEFAULT_MODELS.iter().map(|m| m.to_string()).collect(),
            target: None,
            profiles_dir: None,
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Warehouse connection (required by every command that connects)
    #[serde(default)]
    pub warehouse: Option<WarehouseConfig>,

    #[serde(default)]
    pub load: LoadConfig,

    #[serde(default)]
    pub transform: TransformConfig,

    /// Project root path (for resolving relative paths)
    #[serde(skip)]
    pub project_root: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            warehouse: None,
            load: LoadConfig::default(),
            transform: TransformConfig::default(),
            project_root: std::env::current_dir().unwrap_or_default(),
        }
    }
}

impl Config {
    /// Load config from TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(format!("{}: {}", path.display(), e)))?;

        let mut config = Self::from_toml(&contents)?;

        // Set project root to parent of config file
        if let Some(parent) = path.parent() {
            config.project_root = parent.to_path_buf();
        }

        Ok(config)
    }

    /// Load config from TOML string
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(toml)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to TOML file
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let toml = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, toml)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Reject values that would only fail later, mid-run
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.load.delimiter.is_ascii() {
            return Err(ConfigError::Invalid(format!(
                "load.delimiter must be a single ASCII character, got '{}'",
                self.load.delimiter
            )));
        }
        // the reader reserves these for quoting and line endings
        if matches!(self.load.delimiter, '"' | '\n' | '\r') {
            return Err(ConfigError::Invalid(format!(
                "load.delimiter cannot be {:?}",
                self.load.delimiter
            )));
        }
        if self.load.full_table.trim().is_empty() || self.load.staging_table.trim().is_empty() {
            return Err(ConfigError::Invalid("load table names must not be empty".to_string()));
        }
        if self.transform.executable.trim().is_empty() {
            return Err(ConfigError::Invalid("transform.executable must not be empty".to_string()));
        }
        if let Some(model) = self.transform.models.iter().find(|m| m.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!("blank model name in transform.models: '{}'", model)));
        }
        if let Some(warehouse) = &self.warehouse {
            for (key, value) in [
                ("account", &warehouse.account),
                ("user", &warehouse.user),
                ("database", &warehouse.database),
                ("schema", &warehouse.schema),
            ] {
                if value.trim().is_empty() {
                    return Err(ConfigError::Invalid(format!("warehouse.{} must not be empty", key)));
                }
            }
        }
        Ok(())
    }

    /// Resolve a configured path against the project root
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_root.join(path)
        }
    }

    /// Delimiter as the byte the CSV reader expects
    pub fn delimiter_byte(&self) -> u8 {
        // validate() guarantees ASCII
        self.load.delimiter as u8
    }
}

/// Config error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"
[warehouse]
account = "xy12345.ap-southeast-2"
user = "loader"
password = "secret"
role = "LOADER"
warehouse = "COMPUTE_WH"
database = "ONYX_DB"
schema = "GAME_SCHEMA"

[load]
full_file = "data/full.csv"
incremental_file = "data/delta.csv"
delimiter = ";"

[transform]
project_dir = "analytics"
models = ["daily_summary"]
target = "prod"
"#;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert!(config.warehouse.is_none());
        assert_eq!(config.load.full_table, "GAME_PERFORMANCE_DATA");
        assert_eq!(config.transform.executable, "dbt");
        assert_eq!(config.transform.models, DEFAULT_MODELS.to_vec());
    }

    #[test]
    fn parses_full_config() {
        let config = Config::from_toml(SAMPLE).unwrap();
        let warehouse = config.warehouse.as_ref().unwrap();

        assert_eq!(warehouse.account, "xy12345.ap-southeast-2");
        assert_eq!(warehouse.role.as_deref(), Some("LOADER"));
        assert_eq!(warehouse.password(), Some("secret".to_string()));
        assert_eq!(config.load.full_file, PathBuf::from("data/full.csv"));
        // unspecified fields keep their defaults
        assert_eq!(config.load.staging_table, "GAME_PERFORMANCE_STAGING");
        assert_eq!(config.delimiter_byte(), b';');
        assert_eq!(config.transform.models, vec!["daily_summary"]);
        assert_eq!(config.transform.target.as_deref(), Some("prod"));
        assert_eq!(config.transform.executable, "dbt");
    }

    #[test]
    fn debug_redacts_password() {
        let config = Config::from_toml(SAMPLE).unwrap();
        let rendered = format!("{:?}", config.warehouse.unwrap());
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn rejects_non_ascii_delimiter() {
        let result = Config::from_toml("[load]\ndelimiter = \"§\"\n");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn rejects_reserved_delimiters() {
        for toml in [
            "[load]\ndelimiter = '\"'\n",
            "[load]\ndelimiter = \"\\n\"\n",
            "[load]\ndelimiter = \"\\r\"\n",
        ] {
            let result = Config::from_toml(toml);
            assert!(matches!(result, Err(ConfigError::Invalid(_))), "accepted {:?}", toml);
        }

        let tab = Config::from_toml("[load]\ndelimiter = \"\\t\"\n").unwrap();
        assert_eq!(tab.delimiter_byte(), b'\t');
    }

    #[test]
    fn rejects_blank_model() {
        let result = Config::from_toml("[transform]\nmodels = [\"daily_summary\", \" \"]\n");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn rejects_incomplete_warehouse() {
        let result = Config::from_toml(
            "[warehouse]\naccount = \"a\"\nuser = \"u\"\ndatabase = \"\"\nschema = \"S\"\n",
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        assert!(matches!(Config::from_toml("[load"), Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn resolves_relative_paths_against_root() {
        let mut config = Config::default();
        config.project_root = PathBuf::from("/srv/onyx");

        assert_eq!(config.resolve_path(Path::new("data/a.csv")), PathBuf::from("/srv/onyx/data/a.csv"));
        assert_eq!(config.resolve_path(Path::new("/tmp/b.csv")), PathBuf::from("/tmp/b.csv"));
    }

    #[test]
    fn config_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("onyxflow.toml");

        let config = Config::from_toml(SAMPLE).unwrap();
        config.save_to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.load, config.load);
        assert_eq!(loaded.transform, config.transform);
        assert_eq!(loaded.warehouse, config.warehouse);
        assert_eq!(loaded.project_root, dir.path());
    }
}
