/// Backup and restore orchestration
///
/// Both flows follow the same shape: resolve the database's container,
/// expand the command template with a timestamp, run it inside the
/// container and move the archive between container and host. At most one
/// flow runs per database at any time.

use chrono::{Local, NaiveDateTime};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use crate::core::config::{AppConfig, DatabaseConfig};
use crate::core::docker::{self, ContainerRuntime, ExecOutput};
use crate::core::error::{OperationError, OperationResult};
use crate::core::storage::{ArtifactStore, BackupArtifact};
use crate::core::template;

/// Source of "now" for timestamps
pub type Clock = Arc<dyn Fn() -> NaiveDateTime + Send + Sync>;

pub struct BackupManager {
    config: Arc<AppConfig>,
    runtime: Arc<dyn ContainerRuntime>,
    store: ArtifactStore,
    clock: Clock,
    locks: HashMap<String, Arc<Mutex<()>>>,
}

impl BackupManager {
    pub fn new(config: Arc<AppConfig>, runtime: Arc<dyn ContainerRuntime>) -> Self {
        let store = ArtifactStore::new(config.backup_root.clone());
        let locks = config
            .names()
            .map(|name| (name.to_string(), Arc::new(Mutex::new(()))))
            .collect();

        Self {
            config,
            runtime,
            store,
            clock: Arc::new(|| Local::now().naive_local()),
            locks,
        }
    }

    /// Replace the wall clock (tests pin time with this)
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Shared handle to the configuration, for components built alongside
    pub fn config_arc(&self) -> Arc<AppConfig> {
        Arc::clone(&self.config)
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub fn runtime_arc(&self) -> Arc<dyn ContainerRuntime> {
        Arc::clone(&self.runtime)
    }

    fn lock_for(&self, name: &str) -> OperationResult<Arc<Mutex<()>>> {
        self.locks
            .get(name)
            .cloned()
            .ok_or_else(|| OperationError::UnknownDatabase(name.to_string()))
    }

    /// Back up a configured database with its configured command
    pub async fn backup_database(&self, name: &str) -> OperationResult<BackupArtifact> {
        let db = self
            .config
            .database(name)
            .ok_or_else(|| OperationError::UnknownDatabase(name.to_string()))?;
        self.backup(name, &db.backup_command).await
    }

    /// Restore a configured database with its configured command
    pub async fn restore_database(
        &self,
        name: &str,
        timestamp: Option<&str>,
    ) -> OperationResult<BackupArtifact> {
        match self.config.database(name) {
            Some(db) => self.restore(name, &db.restore_command, timestamp).await,
            // Selector is checked first so it wins over an unknown name
            None => self.restore(name, &[], timestamp).await,
        }
    }

    /// Dump `name` inside its container and store the archive on the host
    #[instrument(skip(self, template), fields(database = %name))]
    pub async fn backup(&self, name: &str, template: &[String]) -> OperationResult<BackupArtifact> {
        let lock = self.lock_for(name)?;
        let db = self
            .config
            .database(name)
            .ok_or_else(|| OperationError::UnknownDatabase(name.to_string()))?;
        let _guard = lock.lock().await;

        let container = docker::resolve(self.runtime.as_ref(), name).await?;

        // Reserved under the lock and with an exclusive create, so no two
        // runs ever share a timestamp
        let pending = self.store.reserve(name, (self.clock)()).await?;
        let timestamp = pending.timestamp().to_string();
        let command = template::expand(template, &timestamp);

        info!(container = %container.id, timestamp = %timestamp, "starting backup");
        let result = self.dump(&container.id, db, command, &timestamp, pending.path()).await;
        let bytes = match result {
            Ok(bytes) => bytes,
            Err(e) => {
                pending.discard().await;
                return Err(e);
            }
        };

        let artifact = pending.commit().await?;
        info!(path = %artifact.path.display(), bytes, "backup stored");

        Ok(artifact)
    }

    /// Run the dump command and copy its output into `dest`
    async fn dump(
        &self,
        container_id: &str,
        db: &DatabaseConfig,
        command: Vec<String>,
        timestamp: &str,
        dest: &Path,
    ) -> OperationResult<u64> {
        let output = docker::run(
            self.runtime.as_ref(),
            container_id,
            command,
            self.config.exec_timeout,
        )
        .await?;
        log_exec_output(&db.name, "backup", &output);

        let bytes = self
            .runtime
            .download(container_id, &db.dump_path(timestamp), dest)
            .await?;
        Ok(bytes)
    }

    /// Upload the archive `timestamp` into the container and run the
    /// restore command against it
    #[instrument(skip(self, template), fields(database = %name))]
    pub async fn restore(
        &self,
        name: &str,
        template: &[String],
        timestamp: Option<&str>,
    ) -> OperationResult<BackupArtifact> {
        let timestamp = match timestamp.map(str::trim) {
            Some(t) if !t.is_empty() => t,
            _ => return Err(OperationError::MissingSelector),
        };

        let lock = self.lock_for(name)?;
        let db = self
            .config
            .database(name)
            .ok_or_else(|| OperationError::UnknownDatabase(name.to_string()))?;
        let _guard = lock.lock().await;

        // Checked before any container I/O
        let artifact = self.store.open(name, timestamp)?;

        let container = docker::resolve(self.runtime.as_ref(), name).await?;

        info!(container = %container.id, timestamp = %timestamp, "starting restore");
        self.runtime
            .upload(&container.id, &db.backup_dir, &artifact.path)
            .await?;

        let command = template::expand(template, timestamp);
        let output = docker::run(
            self.runtime.as_ref(),
            &container.id,
            command,
            self.config.exec_timeout,
        )
        .await?;
        log_exec_output(name, "restore", &output);

        Ok(artifact)
    }
}

fn log_exec_output(database: &str, operation: &str, output: &ExecOutput) {
    info!(database, operation, output = %output.output.trim_end(), "command finished");

    if let Some(code) = output.exit_code.filter(|c| *c != 0) {
        warn!(database, operation, exit_code = code, "command exited with non-zero status");
    }
}
