/// Per-database status for display
///
/// Combines the live container state with the artifact inventory. Nothing
/// is cached; every snapshot queries the runtime and the disk again.

use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

use crate::core::config::AppConfig;
use crate::core::docker::{self, ContainerFilter, ContainerRuntime, ResolvedContainer};
use crate::core::error::TransferError;
use crate::core::storage::ArtifactStore;
use crate::utils::STATUS_DOWN;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatabaseStatus {
    pub name: String,
    pub status: String,
    pub backups: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    /// In configuration order
    pub databases: Vec<DatabaseStatus>,
}

pub struct StatusReporter {
    config: Arc<AppConfig>,
    runtime: Arc<dyn ContainerRuntime>,
    store: ArtifactStore,
}

impl StatusReporter {
    pub fn new(config: Arc<AppConfig>, runtime: Arc<dyn ContainerRuntime>) -> Self {
        let store = ArtifactStore::new(config.backup_root.clone());
        Self {
            config,
            runtime,
            store,
        }
    }

    pub async fn snapshot(&self) -> Result<Snapshot, TransferError> {
        self.store.ensure_root()?;

        let containers = match docker::resolve_all(self.runtime.as_ref(), ContainerFilter::All).await {
            Ok(containers) => containers,
            Err(e) => {
                warn!(error = %e, "container runtime unavailable, reporting all databases down");
                Vec::new()
            }
        };

        let databases = self
            .config
            .databases
            .iter()
            .map(|db| {
                let backups = self.store.list(&db.name).unwrap_or_else(|e| {
                    warn!(database = %db.name, error = %e, "failed to list backups");
                    Vec::new()
                });

                DatabaseStatus {
                    name: db.name.clone(),
                    status: container_status(&containers, &db.name),
                    backups,
                }
            })
            .collect();

        Ok(Snapshot { databases })
    }
}

fn container_status(containers: &[ResolvedContainer], name: &str) -> String {
    let matches: Vec<&ResolvedContainer> = containers.iter().filter(|c| c.name == name).collect();

    match matches.as_slice() {
        [] => STATUS_DOWN.to_string(),
        [container] => container.status.clone(),
        many => format!("Ambiguous ({} containers)", many.len()),
    }
}
