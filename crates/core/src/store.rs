//! In-process job table
//!
//! Job records are mutated only by the task running the batch; pollers read
//! whole-record snapshots, so a concurrent `query` never observes a torn
//! update. The table is bounded: once it grows past the retention limit, the
//! oldest finished jobs are evicted. Running jobs are never evicted.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::types::{BatchJob, ComparisonResult, JobStatus};

struct JobEntry {
    job: BatchJob,
    cancel: CancellationToken,
}

/// Lifecycle-scoped store for batch jobs
pub struct JobStore {
    jobs: DashMap<Uuid, JobEntry>,
    max_retained_jobs: usize,
}

impl JobStore {
    pub fn new(max_retained_jobs: usize) -> Self {
        Self {
            jobs: DashMap::new(),
            max_retained_jobs: max_retained_jobs.max(1),
        }
    }

    /// Register a new running job before any rendering starts
    pub fn create(&self, total: usize) -> (Uuid, CancellationToken) {
        self.evict_finished();

        let id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        self.jobs.insert(
            id,
            JobEntry {
                job: BatchJob::new(id, total),
                cancel: cancel.clone(),
            },
        );

        info!("Registered batch job {} ({} pairs)", id, total);
        (id, cancel)
    }

    /// Append one result and advance the progress counters
    ///
    /// The append and counter update happen under the shard lock, so pollers
    /// see them as one atomic step.
    pub fn record_result(&self, id: Uuid, result: ComparisonResult) {
        if let Some(mut entry) = self.jobs.get_mut(&id) {
            let job = &mut entry.job;
            if job.status.is_terminal() {
                return;
            }
            job.results.push(result);
            job.completed = job.results.len();
            job.update_progress();
        }
    }

    /// Transition Running -> Complete; a no-op for terminal jobs
    pub fn complete(&self, id: Uuid) {
        if let Some(mut entry) = self.jobs.get_mut(&id) {
            if entry.job.status == JobStatus::Running {
                entry.job.status = JobStatus::Complete;
                // An empty batch records no results, so the percentage must
                // be settled here, not only in record_result
                entry.job.update_progress();
                info!("Batch job {} complete ({} pairs)", id, entry.job.completed);
            }
        }
    }

    /// Batch-fatal failure: mark Complete with an explanatory error so the
    /// job never stays permanently Running
    pub fn fail(&self, id: Uuid, message: impl Into<String>) {
        if let Some(mut entry) = self.jobs.get_mut(&id) {
            if entry.job.status == JobStatus::Running {
                let message = message.into();
                error!("Batch job {} failed: {}", id, message);
                entry.job.status = JobStatus::Complete;
                entry.job.update_progress();
                entry.job.error = Some(message);
            }
        }
    }

    /// Request cancellation; returns false for unknown or finished jobs
    pub fn cancel(&self, id: Uuid) -> bool {
        match self.jobs.get(&id) {
            Some(entry) if entry.job.status == JobStatus::Running => {
                entry.cancel.cancel();
                true
            }
            _ => false,
        }
    }

    /// Transition Running -> Cancelled, called by the batch runner when it
    /// observes the token between pairs
    pub fn mark_cancelled(&self, id: Uuid) {
        if let Some(mut entry) = self.jobs.get_mut(&id) {
            if entry.job.status == JobStatus::Running {
                entry.job.status = JobStatus::Cancelled;
                info!(
                    "Batch job {} cancelled after {} of {} pairs",
                    id, entry.job.completed, entry.job.total
                );
            }
        }
    }

    /// Consistent point-in-time snapshot of a job, or None for unknown ids
    pub fn snapshot(&self, id: Uuid) -> Option<BatchJob> {
        self.jobs.get(&id).map(|entry| entry.job.clone())
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    fn evict_finished(&self) {
        if self.jobs.len() < self.max_retained_jobs {
            return;
        }

        let mut finished: Vec<(Uuid, DateTime<Utc>)> = self
            .jobs
            .iter()
            .filter(|e| e.job.status.is_terminal())
            .map(|e| (e.job.id, e.job.started_at))
            .collect();
        finished.sort_by_key(|(_, started_at)| *started_at);

        let excess = (self.jobs.len() + 1).saturating_sub(self.max_retained_jobs);
        for (id, _) in finished.into_iter().take(excess) {
            self.jobs.remove(&id);
            debug!("Evicted finished batch job {}", id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ComparisonResult;

    #[test]
    fn record_keeps_counters_in_lockstep() {
        let store = JobStore::new(16);
        let (id, _cancel) = store.create(2);

        store.record_result(id, ComparisonResult::failed("a", "b", "x"));
        let snap = store.snapshot(id).unwrap();
        assert_eq!(snap.completed, 1);
        assert_eq!(snap.results.len(), 1);
        assert_eq!(snap.progress, 50);
        assert_eq!(snap.status, JobStatus::Running);
    }

    #[test]
    fn empty_job_completes_with_full_progress() {
        let store = JobStore::new(16);
        assert!(store.is_empty());

        let (id, _cancel) = store.create(0);
        store.complete(id);

        let snap = store.snapshot(id).unwrap();
        assert_eq!(snap.status, JobStatus::Complete);
        assert_eq!(snap.progress, 100);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn failed_empty_job_still_settles_progress() {
        let store = JobStore::new(16);
        let (id, _cancel) = store.create(0);
        store.fail(id, "no browser");

        let snap = store.snapshot(id).unwrap();
        assert_eq!(snap.status, JobStatus::Complete);
        assert_eq!(snap.progress, 100);
        assert_eq!(snap.error.as_deref(), Some("no browser"));
    }

    #[test]
    fn complete_is_idempotent_and_final() {
        let store = JobStore::new(16);
        let (id, _cancel) = store.create(0);

        store.complete(id);
        store.fail(id, "too late");
        let snap = store.snapshot(id).unwrap();
        assert_eq!(snap.status, JobStatus::Complete);
        assert!(snap.error.is_none());
    }

    #[test]
    fn terminal_jobs_reject_further_results() {
        let store = JobStore::new(16);
        let (id, _cancel) = store.create(3);
        store.record_result(id, ComparisonResult::failed("a", "b", "x"));
        store.mark_cancelled(id);
        store.record_result(id, ComparisonResult::failed("c", "d", "y"));

        let snap = store.snapshot(id).unwrap();
        assert_eq!(snap.status, JobStatus::Cancelled);
        assert_eq!(snap.completed, 1);
    }

    #[test]
    fn cancel_unknown_job_is_false() {
        let store = JobStore::new(16);
        assert!(!store.cancel(Uuid::new_v4()));
        assert!(store.snapshot(Uuid::new_v4()).is_none());
    }

    #[test]
    fn eviction_drops_oldest_finished_only() {
        let store = JobStore::new(2);

        let (a, _) = store.create(0);
        store.complete(a);
        let (b, _) = store.create(0); // still running

        // Inserting a third job must evict the finished one, not the runner
        let (c, _) = store.create(0);
        assert!(store.snapshot(a).is_none());
        assert!(store.snapshot(b).is_some());
        assert!(store.snapshot(c).is_some());
    }
}
