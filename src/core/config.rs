/// Configuration management for database definitions
///
/// The configuration file lists every database this process backs up. It is
/// loaded once at startup, validated as a whole, and shared read-only.

use cron::Schedule;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Duration;

use crate::core::error::ConfigError;
use crate::utils::{DEFAULT_BACKUP_ROOT, DEFAULT_DUMP_DIR, DEFAULT_EXEC_TIMEOUT};

/// One database entry of the configuration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub name: String,
    #[serde(rename = "backup_cmd")]
    pub backup_command: Vec<String>,
    #[serde(rename = "restore_cmd")]
    pub restore_command: Vec<String>,
    /// Directory inside the container that holds dumps
    #[serde(default = "default_dump_dir")]
    pub backup_dir: String,
    /// Cron expression; empty means manual backups only
    #[serde(rename = "backup_freq", default)]
    pub schedule: String,
}

impl DatabaseConfig {
    /// Parsed schedule, `None` for manual-only databases
    pub fn cron_schedule(&self) -> Option<Schedule> {
        if self.schedule.trim().is_empty() {
            return None;
        }
        parse_schedule(&self.schedule).ok()
    }

    /// Container path a dump named `timestamp` is written to
    pub fn dump_path(&self, timestamp: &str) -> String {
        format!("{}/{}", self.backup_dir.trim_end_matches('/'), timestamp)
    }
}

fn default_dump_dir() -> String {
    DEFAULT_DUMP_DIR.to_string()
}

fn default_backup_root() -> PathBuf {
    PathBuf::from(DEFAULT_BACKUP_ROOT)
}

fn default_exec_timeout() -> String {
    DEFAULT_EXEC_TIMEOUT.to_string()
}

/// On-disk shape of the configuration file
#[derive(Debug, Deserialize)]
struct ConfigFile {
    #[serde(default = "default_backup_root")]
    backup_root: PathBuf,
    #[serde(default = "default_exec_timeout")]
    exec_timeout: String,
    databases: Vec<DatabaseConfig>,
}

/// Validated, immutable process configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub databases: Vec<DatabaseConfig>,
    pub backup_root: PathBuf,
    pub exec_timeout: Duration,
}

impl AppConfig {
    /// Load configuration from a JSON, TOML or YAML file (by extension)
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let format = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        let parse_error = |message: String| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        };

        let file: ConfigFile = match format.as_deref() {
            Some("toml") => toml::from_str(&content).map_err(|e| parse_error(e.to_string()))?,
            Some("yaml") | Some("yml") => {
                serde_yaml::from_str(&content).map_err(|e| parse_error(e.to_string()))?
            }
            _ => serde_json::from_str(&content).map_err(|e| parse_error(e.to_string()))?,
        };

        Self::from_file(file)
    }

    /// Build a configuration from already constructed database entries
    pub fn new(
        databases: Vec<DatabaseConfig>,
        backup_root: impl Into<PathBuf>,
        exec_timeout: Duration,
    ) -> Result<Self, ConfigError> {
        validate_databases(&databases)?;
        Ok(Self {
            databases,
            backup_root: backup_root.into(),
            exec_timeout,
        })
    }

    fn from_file(file: ConfigFile) -> Result<Self, ConfigError> {
        let exec_timeout = humantime::parse_duration(file.exec_timeout.trim()).map_err(|e| {
            ConfigError::InvalidTimeout {
                value: file.exec_timeout.clone(),
                reason: e.to_string(),
            }
        })?;

        if exec_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout {
                value: file.exec_timeout,
                reason: "timeout must be greater than zero".to_string(),
            });
        }

        Self::new(file.databases, file.backup_root, exec_timeout)
    }

    /// Look up a database by its unique name
    pub fn database(&self, name: &str) -> Option<&DatabaseConfig> {
        self.databases.iter().find(|db| db.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.databases.iter().map(|db| db.name.as_str())
    }
}

// Docker's container name alphabet
const NAME_PATTERN: &str = r"^[A-Za-z0-9][A-Za-z0-9_.-]*$";

fn is_valid_name(name: &str) -> bool {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(NAME_PATTERN).ok())
        .as_ref()
        .is_some_and(|pattern| pattern.is_match(name))
}

fn validate_databases(databases: &[DatabaseConfig]) -> Result<(), ConfigError> {
    if databases.is_empty() {
        return Err(ConfigError::NoDatabases);
    }

    let mut seen = HashSet::new();
    for db in databases {
        if !is_valid_name(&db.name) {
            return Err(ConfigError::InvalidName(db.name.clone()));
        }
        if !seen.insert(db.name.as_str()) {
            return Err(ConfigError::DuplicateName(db.name.clone()));
        }
        if db.backup_command.is_empty() {
            return Err(ConfigError::EmptyCommand {
                name: db.name.clone(),
                which: "backup",
            });
        }
        if db.restore_command.is_empty() {
            return Err(ConfigError::EmptyCommand {
                name: db.name.clone(),
                which: "restore",
            });
        }
        if !db.schedule.trim().is_empty() {
            parse_schedule(&db.schedule).map_err(|reason| ConfigError::InvalidSchedule {
                name: db.name.clone(),
                expression: db.schedule.clone(),
                reason,
            })?;
        }
    }

    Ok(())
}

/// Parse a cron expression. Classic 5-field expressions get a leading
/// seconds field so they fire at second 0.
pub fn parse_schedule(expression: &str) -> Result<Schedule, String> {
    let expression = expression.trim();
    let normalized = if expression.split_whitespace().count() == 5 {
        format!("0 {}", expression)
    } else {
        expression.to_string()
    };

    Schedule::from_str(&normalized).map_err(|e| e.to_string())
}
