pub mod backup;
pub mod config;
pub mod docker;
pub mod error;
pub mod scheduler;
pub mod status;
pub mod storage;
pub mod template;

pub use backup::BackupManager;
pub use config::{AppConfig, DatabaseConfig};
pub use docker::{ContainerRuntime, DockerManager};
pub use error::{ConfigError, ExecError, OperationError, ResolveError, TransferError};
pub use scheduler::{Scheduler, SchedulerHandle};
pub use status::{Snapshot, StatusReporter};
pub use storage::{ArtifactStore, BackupArtifact};
