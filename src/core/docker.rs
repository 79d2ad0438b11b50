/// Docker integration
///
/// Resolves database names to containers, runs commands inside them and
/// moves archives between the container filesystem and the host.

use async_trait::async_trait;
use bollard::container::{
    DownloadFromContainerOptions, ListContainersOptions, LogOutput, UploadToContainerOptions,
};
use bollard::exec::{CreateExecOptions, StartExecOptions, StartExecResults};
use bollard::models::ContainerSummary;
use bollard::Docker;
use futures::{future, StreamExt};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::core::error::{ExecError, ResolveError, TransferError};

/// A container as seen by one query; never cached
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedContainer {
    pub id: String,
    pub name: String,
    /// Human readable status, e.g. "Up 3 hours"
    pub status: String,
    /// Machine state, e.g. "running"
    pub state: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerFilter {
    Running,
    All,
}

/// Result of one exec session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecOutput {
    /// stdout and stderr interleaved in arrival order
    pub output: String,
    pub exit_code: Option<i64>,
}

/// Operations the backup flows need from a container runtime
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// List containers, optionally narrowed by the runtime's name filter
    async fn list_containers(
        &self,
        filter: ContainerFilter,
        name: Option<String>,
    ) -> Result<Vec<ResolvedContainer>, ResolveError>;

    /// Run `command` in the container and collect combined output
    async fn exec(&self, container_id: &str, command: Vec<String>) -> Result<ExecOutput, ExecError>;

    /// Stream `path` out of the container as a tar archive into `dest`
    async fn download(
        &self,
        container_id: &str,
        path: &str,
        dest: &Path,
    ) -> Result<u64, TransferError>;

    /// Extract the tar archive at `source` into `dir` inside the container
    async fn upload(&self, container_id: &str, dir: &str, source: &Path) -> Result<(), TransferError>;
}

/// Map a logical database name to exactly one container
pub async fn resolve(
    runtime: &dyn ContainerRuntime,
    name: &str,
) -> Result<ResolvedContainer, ResolveError> {
    // The runtime filter matches substrings, so "orders" also finds "orders-replica"
    let mut matches: Vec<ResolvedContainer> = runtime
        .list_containers(ContainerFilter::All, Some(name.to_string()))
        .await?
        .into_iter()
        .filter(|c| c.name == name)
        .collect();

    match matches.len() {
        0 => Err(ResolveError::NotFound(name.to_string())),
        1 => Ok(matches.remove(0)),
        count => Err(ResolveError::Ambiguous {
            name: name.to_string(),
            count,
        }),
    }
}

/// List containers by state without requiring a match
pub async fn resolve_all(
    runtime: &dyn ContainerRuntime,
    filter: ContainerFilter,
) -> Result<Vec<ResolvedContainer>, ResolveError> {
    runtime.list_containers(filter, None).await
}

/// Run a command in a container, bounded by `timeout`
pub async fn run(
    runtime: &dyn ContainerRuntime,
    container_id: &str,
    command: Vec<String>,
    timeout: Duration,
) -> Result<ExecOutput, ExecError> {
    match tokio::time::timeout(timeout, runtime.exec(container_id, command)).await {
        Ok(result) => result,
        Err(_) => Err(ExecError::TimedOut {
            container: container_id.to_string(),
            timeout,
        }),
    }
}

/// `ContainerRuntime` backed by the local Docker daemon
#[derive(Clone)]
pub struct DockerManager {
    docker: Docker,
}

impl DockerManager {
    /// Connect using DOCKER_HOST or the platform default socket
    pub fn new() -> Result<Self, ResolveError> {
        let docker = Docker::connect_with_local_defaults().map_err(|e| {
            ResolveError::Runtime(format!("failed to connect to Docker daemon: {}", e))
        })?;

        Ok(Self { docker })
    }

    /// Check if Docker daemon is accessible
    pub async fn check_docker(&self) -> bool {
        self.docker.ping().await.is_ok()
    }

    /// Convert ContainerSummary to ResolvedContainer
    fn summary_to_container(summary: ContainerSummary) -> Vec<ResolvedContainer> {
        let id = summary.id.unwrap_or_default();
        let status = summary.status.unwrap_or_else(|| "unknown".to_string());
        let state = summary.state.unwrap_or_else(|| "unknown".to_string());

        // A container can carry several names (links); keep each so exact
        // matching sees all of them
        summary
            .names
            .unwrap_or_default()
            .into_iter()
            .map(|n| ResolvedContainer {
                id: id.clone(),
                name: n.trim_start_matches('/').to_string(),
                status: status.clone(),
                state: state.clone(),
            })
            .collect()
    }
}

#[async_trait]
impl ContainerRuntime for DockerManager {
    async fn list_containers(
        &self,
        filter: ContainerFilter,
        name: Option<String>,
    ) -> Result<Vec<ResolvedContainer>, ResolveError> {
        let mut filters = HashMap::new();
        if let Some(name) = name {
            filters.insert("name".to_string(), vec![name]);
        }
        if filter == ContainerFilter::Running {
            filters.insert("status".to_string(), vec!["running".to_string()]);
        }

        let options = Some(ListContainersOptions {
            all: filter == ContainerFilter::All,
            filters,
            ..Default::default()
        });

        let containers = self
            .docker
            .list_containers(options)
            .await
            .map_err(|e| ResolveError::Runtime(e.to_string()))?;

        Ok(containers
            .into_iter()
            .flat_map(Self::summary_to_container)
            .collect())
    }

    async fn exec(&self, container_id: &str, command: Vec<String>) -> Result<ExecOutput, ExecError> {
        let exec = self
            .docker
            .create_exec(
                container_id,
                CreateExecOptions {
                    attach_stdout: Some(true),
                    attach_stderr: Some(true),
                    tty: Some(false),
                    cmd: Some(command),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| ExecError::Create {
                container: container_id.to_string(),
                message: e.to_string(),
            })?;

        let start_error = |message: String| ExecError::Start {
            container: container_id.to_string(),
            message,
        };

        let started = self
            .docker
            .start_exec(
                &exec.id,
                Some(StartExecOptions {
                    detach: false,
                    ..Default::default()
                }),
            )
            .await
            .map_err(|e| start_error(e.to_string()))?;

        let mut buffer = Vec::new();
        if let StartExecResults::Attached { mut output, .. } = started {
            while let Some(chunk) = output.next().await {
                match chunk.map_err(|e| start_error(e.to_string()))? {
                    LogOutput::StdOut { message }
                    | LogOutput::StdErr { message }
                    | LogOutput::Console { message }
                    | LogOutput::StdIn { message } => buffer.extend_from_slice(&message),
                }
            }
        }

        // Exit code is informational only
        let exit_code = match self.docker.inspect_exec(&exec.id).await {
            Ok(inspect) => inspect.exit_code,
            Err(e) => {
                debug!(exec_id = %exec.id, error = %e, "failed to inspect finished exec");
                None
            }
        };

        Ok(ExecOutput {
            output: String::from_utf8_lossy(&buffer).to_string(),
            exit_code,
        })
    }

    async fn download(
        &self,
        container_id: &str,
        path: &str,
        dest: &Path,
    ) -> Result<u64, TransferError> {
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(dest)
            .await
            .map_err(|e| TransferError::io(dest, e))?;

        let mut stream = self.docker.download_from_container(
            container_id,
            Some(DownloadFromContainerOptions {
                path: path.to_string(),
            }),
        );

        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| TransferError::Download {
                container: container_id.to_string(),
                path: path.to_string(),
                message: e.to_string(),
            })?;
            file.write_all(&chunk)
                .await
                .map_err(|e| TransferError::io(dest, e))?;
            written += chunk.len() as u64;
        }

        file.flush().await.map_err(|e| TransferError::io(dest, e))?;
        file.sync_all().await.map_err(|e| TransferError::io(dest, e))?;

        Ok(written)
    }

    async fn upload(&self, container_id: &str, dir: &str, source: &Path) -> Result<(), TransferError> {
        let file = tokio::fs::File::open(source)
            .await
            .map_err(|e| TransferError::io(source, e))?;

        // The body must be infallible; a read error ends it early and is
        // reported once the runtime is done
        let read_error: Arc<Mutex<Option<std::io::Error>>> = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&read_error);
        let body = ReaderStream::new(file).scan((), move |_, chunk| {
            let next = match chunk {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    if let Ok(mut guard) = slot.lock() {
                        *guard = Some(e);
                    }
                    None
                }
            };
            future::ready(next)
        });

        let uploaded = self
            .docker
            .upload_to_container_streaming(
                container_id,
                Some(UploadToContainerOptions {
                    path: dir.to_string(),
                    ..Default::default()
                }),
                body,
            )
            .await;

        if let Some(e) = read_error.lock().ok().and_then(|mut guard| guard.take()) {
            return Err(TransferError::io(source, e));
        }

        uploaded.map_err(|e| TransferError::Upload {
            container: container_id.to_string(),
            path: dir.to_string(),
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn container(id: &str, name: &str) -> ResolvedContainer {
        ResolvedContainer {
            id: id.to_string(),
            name: name.to_string(),
            status: "Up 2 hours".to_string(),
            state: "running".to_string(),
        }
    }

    #[tokio::test]
    async fn test_resolve_exact_match() {
        let mut runtime = MockContainerRuntime::new();
        runtime
            .expect_list_containers()
            .withf(|filter, name| *filter == ContainerFilter::All && name.as_deref() == Some("orders"))
            .returning(|_, _| Ok(vec![container("a1", "orders"), container("b2", "orders-replica")]));

        let resolved = resolve(&runtime, "orders").await.unwrap();
        assert_eq!(resolved.id, "a1");
    }

    #[tokio::test]
    async fn test_resolve_not_found() {
        let mut runtime = MockContainerRuntime::new();
        runtime
            .expect_list_containers()
            .returning(|_, _| Ok(vec![container("b2", "orders-replica")]));

        let err = resolve(&runtime, "orders").await.unwrap_err();
        assert!(matches!(err, ResolveError::NotFound(ref n) if n == "orders"));
    }

    #[tokio::test]
    async fn test_resolve_ambiguous() {
        let mut runtime = MockContainerRuntime::new();
        runtime
            .expect_list_containers()
            .returning(|_, _| Ok(vec![container("a1", "orders"), container("a2", "orders")]));

        let err = resolve(&runtime, "orders").await.unwrap_err();
        assert!(matches!(err, ResolveError::Ambiguous { count: 2, .. }));
    }

    #[tokio::test]
    async fn test_resolve_all_passes_filter() {
        let mut runtime = MockContainerRuntime::new();
        runtime
            .expect_list_containers()
            .withf(|filter, name| *filter == ContainerFilter::Running && name.is_none())
            .returning(|_, _| Ok(vec![container("a1", "orders")]));

        let all = resolve_all(&runtime, ContainerFilter::Running).await.unwrap();
        assert_eq!(all.len(), 1);
    }

    struct HangingRuntime;

    #[async_trait]
    impl ContainerRuntime for HangingRuntime {
        async fn list_containers(
            &self,
            _filter: ContainerFilter,
            _name: Option<String>,
        ) -> Result<Vec<ResolvedContainer>, ResolveError> {
            Ok(vec![])
        }

        async fn exec(&self, _container_id: &str, _command: Vec<String>) -> Result<ExecOutput, ExecError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(ExecOutput::default())
        }

        async fn download(&self, _id: &str, _path: &str, _dest: &Path) -> Result<u64, TransferError> {
            Ok(0)
        }

        async fn upload(&self, _id: &str, _dir: &str, _source: &Path) -> Result<(), TransferError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_run_times_out() {
        let err = run(
            &HangingRuntime,
            "abc",
            vec!["sleep".to_string()],
            Duration::from_millis(20),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ExecError::TimedOut { ref container, .. } if container == "abc"));
    }

    #[tokio::test]
    async fn test_run_returns_output_regardless_of_exit_code() {
        let mut runtime = MockContainerRuntime::new();
        runtime.expect_exec().returning(|_, _| {
            Ok(ExecOutput {
                output: "error: disk full\n".to_string(),
                exit_code: Some(1),
            })
        });

        let out = run(&runtime, "abc", vec!["dump".to_string()], Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(out.exit_code, Some(1));
        assert!(out.output.contains("disk full"));
    }

    #[test]
    fn test_summary_to_container_strips_slash() {
        let summary = ContainerSummary {
            id: Some("abc".to_string()),
            names: Some(vec!["/orders".to_string()]),
            status: Some("Up 5 minutes".to_string()),
            state: Some("running".to_string()),
            ..Default::default()
        };

        let containers = DockerManager::summary_to_container(summary);
        assert_eq!(containers, vec![container_with("abc", "orders", "Up 5 minutes")]);
    }

    fn container_with(id: &str, name: &str, status: &str) -> ResolvedContainer {
        ResolvedContainer {
            id: id.to_string(),
            name: name.to_string(),
            status: status.to_string(),
            state: "running".to_string(),
        }
    }

    #[tokio::test]
    async fn test_docker_manager_creation() {
        // This test requires Docker to be running
        if let Ok(manager) = DockerManager::new() {
            let _ = manager.check_docker().await;
        }
    }
}
