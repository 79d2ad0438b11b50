/// Error types for the backup/restore core
///
/// Each stage of a flow has its own error; `OperationError` is what a
/// backup or restore invocation returns to its caller.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("config defines no databases")]
    NoDatabases,

    #[error("database '{0}' is defined more than once")]
    DuplicateName(String),

    #[error("invalid database name '{0}'")]
    InvalidName(String),

    #[error("database '{name}' has an empty {which} command")]
    EmptyCommand { name: String, which: &'static str },

    #[error("database '{name}' has an invalid schedule '{expression}': {reason}")]
    InvalidSchedule {
        name: String,
        expression: String,
        reason: String,
    },

    #[error("invalid exec timeout '{value}': {reason}")]
    InvalidTimeout { value: String, reason: String },
}

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("no container named '{0}'")]
    NotFound(String),

    #[error("container name '{name}' is ambiguous ({count} matches)")]
    Ambiguous { name: String, count: usize },

    #[error("container runtime query failed: {0}")]
    Runtime(String),
}

#[derive(Error, Debug)]
pub enum ExecError {
    #[error("failed to create exec in container {container}: {message}")]
    Create { container: String, message: String },

    #[error("failed to start exec in container {container}: {message}")]
    Start { container: String, message: String },

    #[error("exec in container {container} timed out after {}", format_timeout(.timeout))]
    TimedOut { container: String, timeout: Duration },
}

fn format_timeout(timeout: &Duration) -> String {
    humantime::format_duration(*timeout).to_string()
}

#[derive(Error, Debug)]
pub enum TransferError {
    #[error("download of {path} from container {container} failed: {message}")]
    Download {
        container: String,
        path: String,
        message: String,
    },

    #[error("upload to {path} in container {container} failed: {message}")]
    Upload {
        container: String,
        path: String,
        message: String,
    },

    #[error("no backup '{timestamp}' for database '{database}'")]
    ArtifactNotFound { database: String, timestamp: String },

    #[error("artifact storage I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl TransferError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TransferError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Failure of a whole backup or restore flow
#[derive(Error, Debug)]
pub enum OperationError {
    #[error("database '{0}' is not configured")]
    UnknownDatabase(String),

    #[error("no backup selected for restore")]
    MissingSelector,

    #[error("no backup '{timestamp}' for database '{database}'")]
    ArtifactNotFound { database: String, timestamp: String },

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Exec(#[from] ExecError),

    #[error(transparent)]
    Transfer(TransferError),
}

impl From<TransferError> for OperationError {
    fn from(err: TransferError) -> Self {
        match err {
            TransferError::ArtifactNotFound {
                database,
                timestamp,
            } => OperationError::ArtifactNotFound {
                database,
                timestamp,
            },
            other => OperationError::Transfer(other),
        }
    }
}

pub type OperationResult<T> = Result<T, OperationError>;
