/// Backup artifact storage
///
/// Artifacts live at `<root>/<database>/<timestamp>.tar`. The directory tree
/// is the only index: listing a database's backups is a directory scan.

use chrono::NaiveDateTime;
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::core::error::TransferError;
use crate::utils::{ARTIFACT_EXTENSION, PARTIAL_SUFFIX, TIMESTAMP_FORMAT};

/// One backup file, identified by (database_name, timestamp)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackupArtifact {
    pub database_name: String,
    pub timestamp: String,
    pub path: PathBuf,
}

/// An artifact whose content is still being transferred
#[derive(Debug)]
pub struct PendingArtifact {
    artifact: BackupArtifact,
    partial_path: PathBuf,
}

impl PendingArtifact {
    /// File the transfer writes into
    pub fn path(&self) -> &Path {
        &self.partial_path
    }

    pub fn timestamp(&self) -> &str {
        &self.artifact.timestamp
    }

    /// Move the finished transfer to its final name
    pub async fn commit(self) -> Result<BackupArtifact, TransferError> {
        tokio::fs::rename(&self.partial_path, &self.artifact.path)
            .await
            .map_err(|e| TransferError::io(&self.artifact.path, e))?;
        Ok(self.artifact)
    }

    /// Remove whatever part of the transfer reached the disk
    pub async fn discard(self) {
        if let Err(e) = tokio::fs::remove_file(&self.partial_path).await {
            if e.kind() != ErrorKind::NotFound {
                tracing::warn!(path = %self.partial_path.display(), error = %e, "failed to remove partial artifact");
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Fail unless the root directory exists and can be read
    pub fn ensure_root(&self) -> Result<(), TransferError> {
        fs::read_dir(&self.root)
            .map(|_| ())
            .map_err(|e| TransferError::io(&self.root, e))
    }

    pub fn database_dir(&self, database: &str) -> PathBuf {
        self.root.join(database)
    }

    pub fn artifact_path(&self, database: &str, timestamp: &str) -> PathBuf {
        self.database_dir(database)
            .join(format!("{}.{}", timestamp, ARTIFACT_EXTENSION))
    }

    fn partial_path(&self, database: &str, timestamp: &str) -> PathBuf {
        self.database_dir(database).join(format!(
            ".{}.{}.{}",
            timestamp, ARTIFACT_EXTENSION, PARTIAL_SUFFIX
        ))
    }

    /// Claim a timestamp for a backup taken at `now` and create its partial
    /// file. Minute granularity, with a `-N` suffix when that minute already
    /// has an artifact or a backup in flight.
    ///
    /// The claim is an exclusive create of the partial file, so processes
    /// sharing the root never hand out the same timestamp.
    pub async fn reserve(
        &self,
        database: &str,
        now: NaiveDateTime,
    ) -> Result<PendingArtifact, TransferError> {
        let dir = self.database_dir(database);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| TransferError::io(&dir, e))?;

        let base = now.format(TIMESTAMP_FORMAT).to_string();
        let mut attempt = 1u32;
        loop {
            let timestamp = if attempt == 1 {
                base.clone()
            } else {
                format!("{}-{}", base, attempt)
            };
            attempt += 1;

            let path = self.artifact_path(database, &timestamp);
            if path.exists() {
                continue;
            }

            let partial_path = self.partial_path(database, &timestamp);
            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&partial_path)
                .await
            {
                Ok(_) => {}
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(TransferError::io(&partial_path, e)),
            }

            // Another process may have committed this name between the two checks
            if path.exists() {
                let _ = tokio::fs::remove_file(&partial_path).await;
                continue;
            }

            return Ok(PendingArtifact {
                artifact: BackupArtifact {
                    database_name: database.to_string(),
                    timestamp,
                    path,
                },
                partial_path,
            });
        }
    }

    /// Locate an existing artifact for restore
    pub fn open(&self, database: &str, timestamp: &str) -> Result<BackupArtifact, TransferError> {
        let not_found = || TransferError::ArtifactNotFound {
            database: database.to_string(),
            timestamp: timestamp.to_string(),
        };

        if !is_plain_name(timestamp) {
            return Err(not_found());
        }

        let path = self.artifact_path(database, timestamp);
        if !path.is_file() {
            return Err(not_found());
        }

        Ok(BackupArtifact {
            database_name: database.to_string(),
            timestamp: timestamp.to_string(),
            path,
        })
    }

    /// Timestamps of all artifacts of `database`, oldest first. A database
    /// that never had a backup has no directory and lists as empty.
    pub fn list(&self, database: &str) -> Result<Vec<String>, TransferError> {
        let dir = self.database_dir(database);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(TransferError::io(&dir, e)),
        };

        let mut timestamps = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| TransferError::io(&dir, e))?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            if path.extension().and_then(|e| e.to_str()) != Some(ARTIFACT_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if !stem.starts_with('.') {
                    timestamps.push(stem.to_string());
                }
            }
        }

        timestamps.sort_by_key(|t| sort_key(t));
        Ok(timestamps)
    }
}

/// Rejects anything that could step outside the database directory
fn is_plain_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.contains('/')
        && !name.contains('\\')
        && !name.contains("..")
}

/// Chronological order; names that are not timestamps go last
fn sort_key(stem: &str) -> (bool, Option<NaiveDateTime>, u32, String) {
    let parsed = stem.get(..16).and_then(|base| {
        NaiveDateTime::parse_from_str(base, TIMESTAMP_FORMAT).ok()
    });
    let suffix = stem
        .get(16..)
        .and_then(|rest| rest.strip_prefix('-'))
        .and_then(|n| n.parse().ok())
        .unwrap_or(1);

    (parsed.is_none(), parsed, suffix, stem.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, day)
            .unwrap()
            .and_hms_opt(hour, minute, 42)
            .unwrap()
    }

    fn touch(store: &ArtifactStore, db: &str, timestamp: &str) {
        let path = store.artifact_path(db, timestamp);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"archive").unwrap();
    }

    #[test]
    fn test_artifact_layout() {
        let store = ArtifactStore::new("backups");
        assert_eq!(
            store.artifact_path("orders", "01-03-2024-10:15"),
            PathBuf::from("backups/orders/01-03-2024-10:15.tar")
        );
    }

    #[tokio::test]
    async fn test_reserve_minute_granularity() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());

        let pending = store.reserve("orders", at(1, 10, 15)).await.unwrap();
        assert_eq!(pending.timestamp(), "01-03-2024-10:15");
        assert!(pending.path().exists());
        assert!(store.list("orders").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reserve_avoids_collision() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());
        touch(&store, "orders", "01-03-2024-10:15");

        let second = store.reserve("orders", at(1, 10, 15)).await.unwrap();
        assert_eq!(second.timestamp(), "01-03-2024-10:15-2");

        // An in-flight backup holds its timestamp too
        let third = store.reserve("orders", at(1, 10, 15)).await.unwrap();
        assert_eq!(third.timestamp(), "01-03-2024-10:15-3");

        // Other databases are unaffected
        let users = store.reserve("users", at(1, 10, 15)).await.unwrap();
        assert_eq!(users.timestamp(), "01-03-2024-10:15");
    }

    #[tokio::test]
    async fn test_separate_stores_never_share_a_timestamp() {
        let dir = TempDir::new().unwrap();
        let a = ArtifactStore::new(dir.path());
        let b = ArtifactStore::new(dir.path());

        let (first, second) = tokio::join!(
            a.reserve("orders", at(1, 10, 15)),
            b.reserve("orders", at(1, 10, 15))
        );
        let (first, second) = (first.unwrap(), second.unwrap());
        assert_ne!(first.timestamp(), second.timestamp());

        fs::write(first.path(), b"one").unwrap();
        fs::write(second.path(), b"two").unwrap();
        first.commit().await.unwrap();
        second.commit().await.unwrap();
        assert_eq!(
            a.list("orders").unwrap(),
            vec!["01-03-2024-10:15", "01-03-2024-10:15-2"]
        );
    }

    #[tokio::test]
    async fn test_discard_frees_timestamp() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());

        let pending = store.reserve("orders", at(1, 10, 15)).await.unwrap();
        pending.discard().await;

        let again = store.reserve("orders", at(1, 10, 15)).await.unwrap();
        assert_eq!(again.timestamp(), "01-03-2024-10:15");
    }

    #[test]
    fn test_list_missing_directory_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());
        assert!(store.list("orders").unwrap().is_empty());
    }

    #[test]
    fn test_list_sorted_and_stripped() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());
        touch(&store, "orders", "02-03-2024-09:00");
        touch(&store, "orders", "01-03-2024-10:15-2");
        touch(&store, "orders", "01-03-2024-10:15");
        touch(&store, "orders", "manual");
        fs::write(store.database_dir("orders").join("notes.txt"), b"x").unwrap();
        fs::write(store.database_dir("orders").join(".03-03-2024-00:00.tar.part"), b"x").unwrap();
        fs::create_dir(store.database_dir("orders").join("nested.tar")).unwrap();

        assert_eq!(
            store.list("orders").unwrap(),
            vec!["01-03-2024-10:15", "01-03-2024-10:15-2", "02-03-2024-09:00", "manual"]
        );
    }

    #[test]
    fn test_open_requires_existing_file() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());
        touch(&store, "orders", "01-03-2024-10:15");

        let artifact = store.open("orders", "01-03-2024-10:15").unwrap();
        assert!(artifact.path.ends_with("orders/01-03-2024-10:15.tar"));

        let err = store.open("orders", "02-03-2024-10:15").unwrap_err();
        assert!(matches!(err, TransferError::ArtifactNotFound { .. }));

        let err = store.open("orders", "../users/01-03-2024-10:15").unwrap_err();
        assert!(matches!(err, TransferError::ArtifactNotFound { .. }));
    }

    #[tokio::test]
    async fn test_pending_artifact_commit_and_discard() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());

        let pending = store.reserve("orders", at(1, 10, 15)).await.unwrap();
        fs::write(pending.path(), b"tar bytes").unwrap();
        assert!(store.list("orders").unwrap().is_empty());

        let artifact = pending.commit().await.unwrap();
        assert_eq!(fs::read(&artifact.path).unwrap(), b"tar bytes");
        assert_eq!(store.list("orders").unwrap(), vec!["01-03-2024-10:15"]);

        let pending = store.reserve("orders", at(1, 10, 16)).await.unwrap();
        fs::write(pending.path(), b"half").unwrap();
        let partial = pending.path().to_path_buf();
        pending.discard().await;
        assert!(!partial.exists());
    }

    #[test]
    fn test_ensure_root() {
        let dir = TempDir::new().unwrap();
        assert!(ArtifactStore::new(dir.path()).ensure_root().is_ok());
        assert!(ArtifactStore::new(dir.path().join("missing")).ensure_root().is_err());
    }
}
