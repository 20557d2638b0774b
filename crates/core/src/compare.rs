//! The comparison unit: two concurrent captures plus one diff
//!
//! This is the failure-isolation boundary for batch processing. Whatever
//! goes wrong while capturing or diffing one pair is converted into a
//! `Failed` result here; nothing escapes to abort the batch loop.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::warn;

use crate::browser::BrowserSession;
use crate::config::Config;
use crate::diff;
use crate::error::{Error, Result};
use crate::manager::{BatchSession, Comparator};
use crate::paths;
use crate::types::{ArtifactPaths, CaptureOptions, ComparisonResult};

/// Compare one URL pair on a shared browser session
pub async fn run_pair(
    session: &BrowserSession,
    url_old: &str,
    url_new: &str,
    options: &CaptureOptions,
    output_root: &Path,
) -> ComparisonResult {
    match run_pair_inner(session, url_old, url_new, options, output_root).await {
        Ok((mismatched, paths)) => {
            ComparisonResult::success(url_old, url_new, mismatched, paths)
        }
        Err(e) => {
            warn!("Comparison failed for {} vs {}: {}", url_old, url_new, e);
            ComparisonResult::failed(url_old, url_new, e.to_string())
        }
    }
}

async fn run_pair_inner(
    session: &BrowserSession,
    url_old: &str,
    url_new: &str,
    options: &CaptureOptions,
    output_root: &Path,
) -> Result<(i64, ArtifactPaths)> {
    let out = paths::derive(output_root, url_old)?;
    let path_old = out.old_image();
    let path_new = out.new_image();
    let path_diff = out.diff_image();

    // The two navigations are independent; running them on two pages of the
    // same session halves the wall-clock latency of a pair.
    tokio::try_join!(
        session.capture(url_old, &path_old, options),
        session.capture(url_new, &path_new, options),
    )?;

    // The diff is CPU-bound; keep it off the scheduler driving navigation
    let mismatched = tokio::task::spawn_blocking(move || {
        diff::diff_images(&path_old, &path_new, &path_diff)
    })
    .await
    .map_err(|e| Error::Internal(format!("diff task failed: {e}")))??;

    Ok((mismatched, out.artifact_paths()))
}

/// One-shot comparison with a private browser session
///
/// Used by the synchronous surface when no batch tracking is needed. Only a
/// session-launch failure is returned as an error; everything else is
/// reported inside the result.
pub async fn compare_once(
    config: &Config,
    url_old: &str,
    url_new: &str,
    options: &CaptureOptions,
) -> Result<ComparisonResult> {
    let session = BrowserSession::launch(config).await?;
    let result = run_pair(&session, url_old, url_new, options, &config.output_dir).await;
    if let Err(e) = session.close().await {
        warn!("Failed to close browser session: {}", e);
    }
    Ok(result)
}

/// Production `Comparator` backed by headless Chromium
#[derive(Clone)]
pub struct ChromiumComparator {
    config: Config,
}

impl ChromiumComparator {
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Comparator for ChromiumComparator {
    async fn begin(&self) -> Result<Box<dyn BatchSession>> {
        let session = BrowserSession::launch(&self.config).await?;
        Ok(Box::new(ChromiumBatchSession {
            session,
            output_root: self.config.output_dir.clone(),
        }))
    }
}

struct ChromiumBatchSession {
    session: BrowserSession,
    output_root: PathBuf,
}

#[async_trait]
impl BatchSession for ChromiumBatchSession {
    async fn compare(
        &mut self,
        url_old: &str,
        url_new: &str,
        options: &CaptureOptions,
    ) -> ComparisonResult {
        run_pair(&self.session, url_old, url_new, options, &self.output_root).await
    }

    async fn finish(self: Box<Self>) -> Result<()> {
        self.session.close().await
    }
}
