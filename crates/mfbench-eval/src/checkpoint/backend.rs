//! Checkpoint storage backends

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::types::{Checkpoint, CheckpointKey, checkpoint_file_stem, parse_checkpoint_file_name};
use crate::error::{BenchError, BenchResult};
use crate::tasks::TaskKind;

/// Trait for checkpoint storage backends
///
/// Storage is append-only: `write_new` must refuse to replace an existing checkpoint.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CheckpointBackend: Send + Sync {
    /// Persist a checkpoint that does not exist yet
    async fn write_new(&self, checkpoint: &Checkpoint) -> BenchResult<()>;

    /// Load the checkpoint of a task stored under `key`
    async fn read(&self, task: TaskKind, key: CheckpointKey) -> BenchResult<Option<Checkpoint>>;

    /// Keys stored for a task, ascending by offset then attempt
    async fn keys(&self, task: TaskKind) -> BenchResult<Vec<CheckpointKey>>;
}

/// File-based checkpoint storage
///
/// Stores one JSON file per checkpoint:
/// ```text
/// dir/
///   mcq_checkpoint_100.json
///   mcq_checkpoint_200_r1.json
///   qa_checkpoint_200.json
/// ```
pub struct FileCheckpointBackend {
    dir: PathBuf,
}

impl FileCheckpointBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &std::path::Path {
        &self.dir
    }

    fn checkpoint_path(&self, task: TaskKind, key: CheckpointKey) -> PathBuf {
        self.dir.join(format!("{}.json", checkpoint_file_stem(task, key)))
    }

    fn write_error(checkpoint: &Checkpoint, message: String) -> BenchError {
        BenchError::CheckpointWrite {
            task: checkpoint.task,
            offset: checkpoint.items_processed,
            message,
        }
    }
}

#[async_trait]
impl CheckpointBackend for FileCheckpointBackend {
    async fn write_new(&self, checkpoint: &Checkpoint) -> BenchResult<()> {
        fs::create_dir_all(&self.dir).await.map_err(|e| {
            Self::write_error(checkpoint, format!("Failed to create checkpoint directory: {}", e))
        })?;

        let json = serde_json::to_vec_pretty(checkpoint).map_err(|e| {
            Self::write_error(checkpoint, format!("Failed to serialize checkpoint: {}", e))
        })?;

        let path = self.dir.join(format!("{}.json", checkpoint.file_stem()));
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| {
                Self::write_error(
                    checkpoint,
                    format!("Failed to create checkpoint file {}: {}", path.display(), e),
                )
            })?;

        file.write_all(&json)
            .await
            .map_err(|e| Self::write_error(checkpoint, format!("Failed to write checkpoint file: {}", e)))?;
        file.sync_all()
            .await
            .map_err(|e| Self::write_error(checkpoint, format!("Failed to sync checkpoint file: {}", e)))?;

        tracing::debug!(path = %path.display(), "Saved checkpoint");
        Ok(())
    }

    async fn read(&self, task: TaskKind, key: CheckpointKey) -> BenchResult<Option<Checkpoint>> {
        let path = self.checkpoint_path(task, key);
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path).await.map_err(|e| {
            BenchError::checkpoint_read_with_context(
                format!("Failed to read checkpoint file: {}", e),
                path.display().to_string(),
            )
        })?;

        let checkpoint = serde_json::from_str(&content).map_err(|e| {
            BenchError::checkpoint_read_with_context(
                format!("Failed to deserialize checkpoint: {}", e),
                path.display().to_string(),
            )
        })?;

        Ok(Some(checkpoint))
    }

    async fn keys(&self, task: TaskKind) -> BenchResult<Vec<CheckpointKey>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut entries = fs::read_dir(&self.dir).await.map_err(|e| {
            BenchError::checkpoint_read(format!("Failed to read checkpoints directory: {}", e))
        })?;

        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| {
            BenchError::checkpoint_read(format!("Failed to read directory entry: {}", e))
        })? {
            if let Some(key) = entry
                .file_name()
                .to_str()
                .and_then(|name| parse_checkpoint_file_name(task, name))
            {
                keys.push(key);
            }
        }

        keys.sort_unstable();
        Ok(keys)
    }
}

/// In-memory checkpoint storage (for testing)
#[derive(Default)]
pub struct MemoryCheckpointBackend {
    checkpoints: tokio::sync::RwLock<BTreeMap<(TaskKind, CheckpointKey), Checkpoint>>,
}

impl MemoryCheckpointBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored checkpoints across tasks
    pub async fn len(&self) -> usize {
        self.checkpoints.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.checkpoints.read().await.is_empty()
    }
}

#[async_trait]
impl CheckpointBackend for MemoryCheckpointBackend {
    async fn write_new(&self, checkpoint: &Checkpoint) -> BenchResult<()> {
        let mut checkpoints = self.checkpoints.write().await;
        let key = (checkpoint.task, checkpoint.key());
        if checkpoints.contains_key(&key) {
            return Err(BenchError::CheckpointWrite {
                task: checkpoint.task,
                offset: checkpoint.items_processed,
                message: "checkpoint already exists".to_string(),
            });
        }
        checkpoints.insert(key, checkpoint.clone());
        Ok(())
    }

    async fn read(&self, task: TaskKind, key: CheckpointKey) -> BenchResult<Option<Checkpoint>> {
        let checkpoints = self.checkpoints.read().await;
        Ok(checkpoints.get(&(task, key)).cloned())
    }

    async fn keys(&self, task: TaskKind) -> BenchResult<Vec<CheckpointKey>> {
        let checkpoints = self.checkpoints.read().await;
        Ok(checkpoints
            .keys()
            .filter(|(kind, _)| *kind == task)
            .map(|(_, key)| *key)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::RunningTally;
    use chrono::Utc;
    use tempfile::TempDir;

    fn checkpoint(task: TaskKind, offset: usize) -> Checkpoint {
        Checkpoint {
            schema_version: 1,
            run_id: "run-1".to_string(),
            task,
            items_processed: offset,
            attempt: 0,
            segment_start: 0,
            segment_attempt: 0,
            tally: RunningTally::default(),
            running_score: 0.0,
            timestamp: Utc::now(),
            records: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_file_backend_round_trip_and_listing() {
        let temp_dir = TempDir::new().unwrap();
        let backend = FileCheckpointBackend::new(temp_dir.path().join("checkpoints"));

        assert!(backend.keys(TaskKind::Mcq).await.unwrap().is_empty());

        let mut retry = checkpoint(TaskKind::Mcq, 200);
        retry.attempt = 1;
        backend.write_new(&retry).await.unwrap();
        backend.write_new(&checkpoint(TaskKind::Mcq, 200)).await.unwrap();
        backend.write_new(&checkpoint(TaskKind::Mcq, 100)).await.unwrap();
        backend.write_new(&checkpoint(TaskKind::Qa, 200)).await.unwrap();

        assert_eq!(
            backend.keys(TaskKind::Mcq).await.unwrap(),
            vec![
                CheckpointKey::new(100, 0),
                CheckpointKey::new(200, 0),
                CheckpointKey::new(200, 1)
            ]
        );
        assert_eq!(backend.keys(TaskKind::Qa).await.unwrap(), vec![CheckpointKey::new(200, 0)]);
        assert!(
            temp_dir
                .path()
                .join("checkpoints/mcq_checkpoint_100.json")
                .is_file()
        );
        assert!(
            temp_dir
                .path()
                .join("checkpoints/mcq_checkpoint_200_r1.json")
                .is_file()
        );

        let loaded = backend
            .read(TaskKind::Mcq, CheckpointKey::new(200, 1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.attempt, 1);
        assert!(
            backend
                .read(TaskKind::Code, CheckpointKey::new(100, 0))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_file_backend_never_overwrites() {
        let temp_dir = TempDir::new().unwrap();
        let backend = FileCheckpointBackend::new(temp_dir.path());

        let mut first = checkpoint(TaskKind::Qa, 200);
        first.running_score = 0.5;
        backend.write_new(&first).await.unwrap();

        let mut second = checkpoint(TaskKind::Qa, 200);
        second.running_score = 0.9;
        let err = backend.write_new(&second).await.unwrap_err();
        assert!(matches!(err, BenchError::CheckpointWrite { offset: 200, .. }));

        let stored = backend
            .read(TaskKind::Qa, CheckpointKey::new(200, 0))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.running_score, 0.5);
    }

    #[tokio::test]
    async fn test_file_backend_corrupt_file_is_read_error() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("code_checkpoint_100.json"), "{").unwrap();
        let backend = FileCheckpointBackend::new(temp_dir.path());

        let err = backend.read(TaskKind::Code, CheckpointKey::new(100, 0)).await.unwrap_err();
        assert!(matches!(err, BenchError::CheckpointRead { .. }));
    }

    #[tokio::test]
    async fn test_memory_backend() {
        let backend = MemoryCheckpointBackend::new();
        assert!(backend.is_empty().await);

        backend.write_new(&checkpoint(TaskKind::Code, 100)).await.unwrap();
        assert!(backend.write_new(&checkpoint(TaskKind::Code, 100)).await.is_err());
        backend.write_new(&checkpoint(TaskKind::Code, 50)).await.unwrap();

        assert_eq!(backend.len().await, 2);
        assert_eq!(
            backend.keys(TaskKind::Code).await.unwrap(),
            vec![CheckpointKey::new(50, 0), CheckpointKey::new(100, 0)]
        );
    }
}
