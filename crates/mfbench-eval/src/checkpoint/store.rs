//! Checkpoint store
//!
//! Writes checkpoint segments through a backend and rebuilds task progress from them.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

use super::backend::{CheckpointBackend, FileCheckpointBackend};
use super::types::{Checkpoint, CheckpointKey, CheckpointSummary, RunningTally};
use crate::error::{BenchError, BenchResult};
use crate::metrics::ScoredRecord;
use crate::tasks::TaskKind;

/// Progress rebuilt from a chain of checkpoints
#[derive(Debug, Clone, PartialEq)]
pub struct ResumePoint {
    /// Run the checkpoints belong to
    pub run_id: String,

    /// Checkpoint the task resumes from
    pub checkpoint: Checkpoint,

    /// Records `[0..offset)` in evaluation order
    pub records: Vec<ScoredRecord>,

    /// Offsets of every checkpoint in the chain, ascending
    pub chain: Vec<usize>,
}

impl ResumePoint {
    pub fn offset(&self) -> usize {
        self.checkpoint.items_processed
    }

    /// Key new segments link back to
    pub fn key(&self) -> CheckpointKey {
        self.checkpoint.key()
    }
}

/// Append-only store of checkpoints, keyed by task, offset and attempt
#[derive(Clone)]
pub struct CheckpointStore {
    backend: Arc<dyn CheckpointBackend>,
}

impl CheckpointStore {
    pub fn new(backend: Arc<dyn CheckpointBackend>) -> Self {
        Self { backend }
    }

    /// Store backed by `<run_dir>/checkpoints`
    pub fn in_run_dir(run_dir: &Path) -> Self {
        Self::new(Arc::new(FileCheckpointBackend::new(run_dir.join("checkpoints"))))
    }

    /// Persist a new checkpoint
    pub async fn save(&self, checkpoint: &Checkpoint) -> BenchResult<()> {
        self.backend.write_new(checkpoint).await.map_err(|e| match e {
            BenchError::CheckpointWrite { .. } => e,
            other => BenchError::CheckpointWrite {
                task: checkpoint.task,
                offset: checkpoint.items_processed,
                message: other.to_string(),
            },
        })
    }

    pub async fn load(&self, task: TaskKind, key: CheckpointKey) -> BenchResult<Option<Checkpoint>> {
        self.backend.read(task, key).await
    }

    /// Stored keys for a task, ascending
    pub async fn keys(&self, task: TaskKind) -> BenchResult<Vec<CheckpointKey>> {
        self.backend.keys(task).await
    }

    /// Distinct stored offsets for a task, ascending
    pub async fn offsets(&self, task: TaskKind) -> BenchResult<Vec<usize>> {
        let mut offsets: Vec<usize> = self.keys(task).await?.into_iter().map(|k| k.offset).collect();
        offsets.dedup();
        Ok(offsets)
    }

    /// Attempt number for the next run of a task: one past every stored attempt
    pub async fn next_attempt(&self, task: TaskKind) -> BenchResult<u32> {
        Ok(self
            .keys(task)
            .await?
            .iter()
            .map(|k| k.attempt + 1)
            .max()
            .unwrap_or(0))
    }

    /// Summaries of every readable checkpoint of a task, ascending by offset
    pub async fn list(&self, task: TaskKind) -> BenchResult<Vec<CheckpointSummary>> {
        let mut summaries = Vec::new();
        for key in self.keys(task).await? {
            match self.load(task, key).await {
                Ok(Some(checkpoint)) => summaries.push(CheckpointSummary::from(&checkpoint)),
                Ok(None) => {}
                Err(e) => warn!(task = %task, key = %key, error = %e, "Skipping unreadable checkpoint"),
            }
        }
        Ok(summaries)
    }

    /// Latest readable checkpoint at or before `target` (any offset when `None`)
    pub async fn latest_at_or_before(
        &self,
        task: TaskKind,
        target: Option<usize>,
    ) -> BenchResult<Option<Checkpoint>> {
        for key in self.candidates(task, target).await? {
            match self.load(task, key).await {
                Ok(Some(checkpoint)) => return Ok(Some(checkpoint)),
                Ok(None) => {}
                Err(e) => warn!(task = %task, key = %key, error = %e, "Skipping unreadable checkpoint"),
            }
        }
        Ok(None)
    }

    /// Rebuild progress from the latest checkpoint at or before `target` whose chain of
    /// segments is complete and replays to its stored tally.
    ///
    /// At equal offsets the newest attempt wins. Returns `None` when no usable checkpoint
    /// exists; the task then starts from zero.
    pub async fn restore(
        &self,
        task: TaskKind,
        target: Option<usize>,
    ) -> BenchResult<Option<ResumePoint>> {
        for key in self.candidates(task, target).await? {
            match self.rebuild_chain(task, key).await {
                Ok(point) => {
                    debug!(task = %task, key = %key, segments = point.chain.len(), "Restored checkpoint chain");
                    return Ok(Some(point));
                }
                Err(e) => {
                    warn!(task = %task, key = %key, error = %e, "Checkpoint chain unusable, trying an earlier one");
                }
            }
        }
        Ok(None)
    }

    /// Keys at or before `target`, newest first
    async fn candidates(
        &self,
        task: TaskKind,
        target: Option<usize>,
    ) -> BenchResult<Vec<CheckpointKey>> {
        let mut keys: Vec<CheckpointKey> = self
            .keys(task)
            .await?
            .into_iter()
            .filter(|key| target.is_none_or(|t| key.offset <= t))
            .collect();
        keys.sort_unstable_by(|a, b| b.cmp(a));
        Ok(keys)
    }

    async fn rebuild_chain(&self, task: TaskKind, key: CheckpointKey) -> BenchResult<ResumePoint> {
        let head = self
            .load(task, key)
            .await?
            .ok_or_else(|| BenchError::checkpoint_read(format!("checkpoint {} is missing", key)))?;

        let mut segments = Vec::new();
        let mut current = head.clone();
        loop {
            let expected = current.items_processed.saturating_sub(current.segment_start);
            if current.segment_start > current.items_processed || current.records.len() != expected {
                return Err(BenchError::checkpoint_read_with_context(
                    format!(
                        "segment holds {} records, expected {}",
                        current.records.len(),
                        expected
                    ),
                    current.file_stem(),
                ));
            }
            if current.task != task || current.run_id != head.run_id {
                return Err(BenchError::checkpoint_read(format!(
                    "checkpoint {} belongs to a different run or task",
                    current.key()
                )));
            }

            let previous = current.previous_key();
            segments.push(current);
            let Some(previous) = previous else {
                break;
            };

            current = self.load(task, previous).await?.ok_or_else(|| {
                BenchError::checkpoint_read(format!("chain is broken: checkpoint {} is missing", previous))
            })?;
        }

        segments.reverse();
        let chain: Vec<usize> = segments.iter().map(|s| s.items_processed).collect();
        let records: Vec<ScoredRecord> = segments.into_iter().flat_map(|s| s.records).collect();

        let replayed = RunningTally::from_records(&records);
        if replayed != head.tally {
            return Err(BenchError::checkpoint_read_with_context(
                "replayed records do not match the stored tally",
                head.file_stem(),
            ));
        }

        Ok(ResumePoint {
            run_id: head.run_id.clone(),
            checkpoint: head,
            records,
            chain,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::backend::{MemoryCheckpointBackend, MockCheckpointBackend};
    use chrono::Utc;

    fn record(id: usize, score: f64) -> ScoredRecord {
        ScoredRecord {
            item_id: id,
            task_kind: TaskKind::Qa,
            predicted: "answer".to_string(),
            reference: "reference".to_string(),
            score,
            is_correct: None,
            latency_ms: 1,
            response_succeeded: true,
            skip_reason: None,
        }
    }

    fn records(range: std::ops::Range<usize>) -> Vec<ScoredRecord> {
        range.map(|i| record(i, (i % 7) as f64 / 7.0)).collect()
    }

    fn segment(all: &[ScoredRecord], start: usize, end: usize) -> Checkpoint {
        let tally = RunningTally::from_records(&all[..end]);
        Checkpoint {
            schema_version: 1,
            run_id: "run-1".to_string(),
            task: TaskKind::Qa,
            items_processed: end,
            attempt: 0,
            segment_start: start,
            segment_attempt: 0,
            running_score: tally.mean_score(),
            tally,
            timestamp: Utc::now(),
            records: all[start..end].to_vec(),
        }
    }

    #[tokio::test]
    async fn test_restore_rebuilds_records_from_chain() {
        let store = CheckpointStore::new(Arc::new(MemoryCheckpointBackend::new()));
        let all = records(0..600);
        store.save(&segment(&all, 0, 200)).await.unwrap();
        store.save(&segment(&all, 200, 400)).await.unwrap();
        store.save(&segment(&all, 400, 600)).await.unwrap();

        let point = store.restore(TaskKind::Qa, None).await.unwrap().unwrap();
        assert_eq!(point.offset(), 600);
        assert_eq!(point.chain, vec![200, 400, 600]);
        assert_eq!(point.records, all);

        let point = store.restore(TaskKind::Qa, Some(450)).await.unwrap().unwrap();
        assert_eq!(point.offset(), 400);
        assert_eq!(point.records, all[..400].to_vec());

        assert!(store.restore(TaskKind::Qa, Some(100)).await.unwrap().is_none());
        assert!(store.restore(TaskKind::Mcq, None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_broken_chain_falls_back() {
        let store = CheckpointStore::new(Arc::new(MemoryCheckpointBackend::new()));
        let all = records(0..600);
        store.save(&segment(&all, 0, 200)).await.unwrap();
        // 400 is missing, so 600 cannot be rebuilt
        store.save(&segment(&all, 400, 600)).await.unwrap();

        let point = store.restore(TaskKind::Qa, None).await.unwrap().unwrap();
        assert_eq!(point.offset(), 200);
    }

    #[tokio::test]
    async fn test_later_attempt_links_into_earlier_chain() {
        let store = CheckpointStore::new(Arc::new(MemoryCheckpointBackend::new()));
        let first = records(0..600);
        store.save(&segment(&first, 0, 200)).await.unwrap();
        store.save(&segment(&first, 200, 400)).await.unwrap();
        assert_eq!(store.next_attempt(TaskKind::Qa).await.unwrap(), 1);

        // attempt 1 re-evaluated [200..400) with different scores, continuing from 200
        let mut second = first.clone();
        for record in &mut second[200..400] {
            record.score = 1.0;
        }
        let mut retry = segment(&second, 200, 400);
        retry.attempt = 1;
        store.save(&retry).await.unwrap();

        let point = store.restore(TaskKind::Qa, None).await.unwrap().unwrap();
        assert_eq!(point.key(), CheckpointKey::new(400, 1));
        assert_eq!(point.chain, vec![200, 400]);
        assert_eq!(point.records, second[..400].to_vec());
        assert_eq!(store.offsets(TaskKind::Qa).await.unwrap(), vec![200, 400]);
        assert_eq!(store.next_attempt(TaskKind::Qa).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_tally_mismatch_falls_back() {
        let store = CheckpointStore::new(Arc::new(MemoryCheckpointBackend::new()));
        let all = records(0..400);
        store.save(&segment(&all, 0, 200)).await.unwrap();
        let mut tampered = segment(&all, 200, 400);
        tampered.tally.score_sum += 1.0;
        store.save(&tampered).await.unwrap();

        let point = store.restore(TaskKind::Qa, None).await.unwrap().unwrap();
        assert_eq!(point.offset(), 200);
    }

    #[tokio::test]
    async fn test_latest_at_or_before_and_list() {
        let store = CheckpointStore::new(Arc::new(MemoryCheckpointBackend::new()));
        let all = records(0..400);
        store.save(&segment(&all, 0, 200)).await.unwrap();
        store.save(&segment(&all, 200, 400)).await.unwrap();

        let latest = store.latest_at_or_before(TaskKind::Qa, Some(399)).await.unwrap().unwrap();
        assert_eq!(latest.items_processed, 200);

        let summaries = store.list(TaskKind::Qa).await.unwrap();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[1].segment_start, 200);
    }

    #[tokio::test]
    async fn test_backend_failure_becomes_write_error() {
        let mut backend = MockCheckpointBackend::new();
        backend.expect_write_new().returning(|_| {
            Err(BenchError::Io {
                message: "disk full".to_string(),
                path: None,
            })
        });
        let store = CheckpointStore::new(Arc::new(backend));

        let all = records(0..100);
        let err = store.save(&segment(&all, 0, 100)).await.unwrap_err();
        assert!(matches!(err, BenchError::CheckpointWrite { offset: 100, .. }));
        assert!(err.to_string().contains("disk full"));
    }
}
