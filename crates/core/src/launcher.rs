//! Detached batch execution
//!
//! Batches run on their own tokio task so the submitting request returns
//! immediately. The spawn is tracked: a supervisor awaits the task handle
//! and records an aborted or panicked run into the job state instead of
//! dropping it silently, so a crashed batch never stays Running.

use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::error;
use uuid::Uuid;

use crate::store::JobStore;

/// Spawn a batch run detached from the caller, supervised by job id
pub fn spawn_tracked<F>(job_id: Uuid, store: Arc<JobStore>, fut: F) -> JoinHandle<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let inner = tokio::spawn(fut);

    tokio::spawn(async move {
        if let Err(e) = inner.await {
            error!("Batch task for job {} aborted: {}", job_id, e);
            store.fail(job_id, format!("batch task aborted: {e}"));
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::JobStatus;

    #[tokio::test]
    async fn panicked_batch_is_recorded_as_failed() {
        let store = Arc::new(JobStore::new(16));
        let (id, _cancel) = store.create(1);

        let supervisor = spawn_tracked(id, store.clone(), async {
            panic!("browser exploded");
        });
        supervisor.await.unwrap();

        let snap = store.snapshot(id).unwrap();
        assert_eq!(snap.status, JobStatus::Complete);
        assert!(snap.error.as_deref().unwrap().contains("aborted"));
    }

    #[tokio::test]
    async fn clean_run_leaves_job_untouched() {
        let store = Arc::new(JobStore::new(16));
        let (id, _cancel) = store.create(0);

        let supervisor = spawn_tracked(id, store.clone(), async {});
        supervisor.await.unwrap();

        let snap = store.snapshot(id).unwrap();
        assert_eq!(snap.status, JobStatus::Running);
        assert!(snap.error.is_none());
    }
}
