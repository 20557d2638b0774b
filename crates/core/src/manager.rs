//! Batch job manager
//!
//! Owns the job store and runs submitted batches: one shared browser
//! session per batch, pairs processed strictly sequentially, results
//! appended in input order as they finish. Cross-batch concurrency is
//! bounded by a semaphore, and a cancellation token is checked between
//! pairs.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::error::Result;
use crate::launcher;
use crate::store::JobStore;
use crate::types::{BatchJob, CaptureOptions, ComparisonResult, UrlPair};

/// Factory for per-batch comparison sessions
///
/// The seam between the batch engine and the browser: production code backs
/// it with a Chromium session, tests with a stub.
#[async_trait]
pub trait Comparator: Send + Sync {
    /// Acquire the shared session a whole batch will reuse
    async fn begin(&self) -> Result<Box<dyn BatchSession>>;
}

/// One acquired session processing a batch's pairs
#[async_trait]
pub trait BatchSession: Send {
    /// Compare one pair; never returns an error, failures become a
    /// `Failed` result
    async fn compare(
        &mut self,
        url_old: &str,
        url_new: &str,
        options: &CaptureOptions,
    ) -> ComparisonResult;

    /// Release the session
    async fn finish(self: Box<Self>) -> Result<()>;
}

/// Batch orchestrator
#[derive(Clone)]
pub struct BatchManager {
    comparator: Arc<dyn Comparator>,
    store: Arc<JobStore>,
    batch_permits: Arc<Semaphore>,
}

impl BatchManager {
    pub fn new(config: &Config, comparator: Arc<dyn Comparator>, store: Arc<JobStore>) -> Self {
        Self {
            comparator,
            store,
            batch_permits: Arc::new(Semaphore::new(config.max_concurrent_batches.max(1))),
        }
    }

    /// Register a batch and launch its run detached; returns immediately
    pub fn submit(&self, pairs: Vec<UrlPair>, options: CaptureOptions) -> Uuid {
        let (id, cancel) = self.store.create(pairs.len());

        let manager = self.clone();
        launcher::spawn_tracked(id, self.store.clone(), async move {
            manager.run(id, cancel, pairs, options).await;
        });

        id
    }

    /// Point-in-time snapshot of a job, or None for unknown ids
    pub fn query(&self, id: Uuid) -> Option<BatchJob> {
        self.store.snapshot(id)
    }

    /// Request cancellation of a running batch
    pub fn cancel(&self, id: Uuid) -> bool {
        self.store.cancel(id)
    }

    /// Number of jobs currently retained in the table
    pub fn job_count(&self) -> usize {
        self.store.len()
    }

    async fn run(
        &self,
        id: Uuid,
        cancel: CancellationToken,
        pairs: Vec<UrlPair>,
        options: CaptureOptions,
    ) {
        // Bound how many batches hold a browser at once
        let _permit = match self.batch_permits.clone().acquire_owned().await {
            Ok(permit) => permit,
            // Closed semaphore means the process is shutting down; the job
            // must still not stay Running forever
            Err(_) => {
                self.store.fail(id, "batch scheduler shut down");
                return;
            }
        };

        let mut session = match self.comparator.begin().await {
            Ok(session) => session,
            Err(e) => {
                // Losing the session the whole batch depends on is the one
                // batch-fatal condition
                self.store
                    .fail(id, format!("browser session unavailable: {e}"));
                return;
            }
        };

        info!("Batch {} started ({} pairs)", id, pairs.len());

        for pair in &pairs {
            if cancel.is_cancelled() {
                self.store.mark_cancelled(id);
                break;
            }

            let result = session
                .compare(&pair.url_old, &pair.url_new, &options)
                .await;
            self.store.record_result(id, result);
        }

        if let Err(e) = session.finish().await {
            warn!("Failed to release batch session for {}: {}", id, e);
        }

        // No-op if the loop exited through cancellation
        self.store.complete(id);
    }
}
