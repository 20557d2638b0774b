//! Shared types for the comparison pipeline and batch jobs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// A named browser viewport configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub const DESKTOP: Viewport = Viewport { width: 1920, height: 1080 };
    pub const TABLET: Viewport = Viewport { width: 768, height: 1024 };
    pub const MOBILE: Viewport = Viewport { width: 375, height: 812 };

    /// Look up a viewport by its configured name (case-insensitive)
    pub fn by_name(name: &str) -> Result<Viewport> {
        match name.to_ascii_lowercase().as_str() {
            "desktop" => Ok(Self::DESKTOP),
            "tablet" => Ok(Self::TABLET),
            "mobile" => Ok(Self::MOBILE),
            other => Err(Error::UnknownViewport(other.to_string())),
        }
    }

    /// Names of all configured viewports
    pub fn names() -> &'static [&'static str] {
        &["desktop", "tablet", "mobile"]
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::DESKTOP
    }
}

/// Options applied to every capture in a comparison
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureOptions {
    /// Viewport dimensions for the page
    #[serde(default)]
    pub viewport: Viewport,

    /// CSS selectors whose matches are hidden before the screenshot
    #[serde(default)]
    pub hide_selectors: Vec<String>,

    /// Capture the full scrollable page instead of the viewport
    #[serde(default)]
    pub full_page: bool,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            viewport: Viewport::default(),
            hide_selectors: Vec::new(),
            full_page: false,
        }
    }
}

/// One old/new URL pair submitted for comparison
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlPair {
    pub url_old: String,
    pub url_new: String,
}

impl UrlPair {
    pub fn new(url_old: impl Into<String>, url_new: impl Into<String>) -> Self {
        Self {
            url_old: url_old.into(),
            url_new: url_new.into(),
        }
    }
}

/// Serving-root-relative locations of the three artifacts of one comparison
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactPaths {
    pub old: String,
    pub new: String,
    pub diff: String,
}

/// Outcome of a single comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonStatus {
    Success,
    Failed,
}

/// Result of comparing one URL pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub url_old: String,
    pub url_new: String,
    pub status: ComparisonStatus,

    /// Count of differing pixels; -1 when the diff was never computed
    pub mismatched_pixels: i64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub paths: Option<ArtifactPaths>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ComparisonResult {
    pub fn success(
        url_old: impl Into<String>,
        url_new: impl Into<String>,
        mismatched_pixels: i64,
        paths: ArtifactPaths,
    ) -> Self {
        Self {
            url_old: url_old.into(),
            url_new: url_new.into(),
            status: ComparisonStatus::Success,
            mismatched_pixels,
            paths: Some(paths),
            error: None,
        }
    }

    pub fn failed(
        url_old: impl Into<String>,
        url_new: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            url_old: url_old.into(),
            url_new: url_new.into(),
            status: ComparisonStatus::Failed,
            mismatched_pixels: -1,
            paths: None,
            error: Some(error.into()),
        }
    }
}

/// Lifecycle state of a batch job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Running,
    Complete,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Running)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Running => write!(f, "running"),
            JobStatus::Complete => write!(f, "complete"),
            JobStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// A tracked batch comparison job
///
/// Mutated only by the task running the batch; readers always receive a
/// cloned snapshot, so `results.len() == completed` holds in every view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchJob {
    pub id: Uuid,
    pub status: JobStatus,
    pub started_at: DateTime<Utc>,
    pub total: usize,
    pub completed: usize,

    /// Whole-percent progress, floor(completed / total * 100)
    pub progress: u8,

    pub results: Vec<ComparisonResult>,

    /// Set when the batch failed before or during processing (batch-fatal)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchJob {
    pub fn new(id: Uuid, total: usize) -> Self {
        Self {
            id,
            status: JobStatus::Running,
            started_at: Utc::now(),
            total,
            completed: 0,
            progress: 0,
            results: Vec::with_capacity(total),
            error: None,
        }
    }

    /// Recompute the progress percentage from the counters
    pub fn update_progress(&mut self) {
        self.progress = if self.total == 0 {
            100
        } else {
            ((self.completed * 100) / self.total) as u8
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewport_lookup_is_case_insensitive() {
        assert_eq!(Viewport::by_name("Desktop").unwrap(), Viewport::DESKTOP);
        assert_eq!(Viewport::by_name("MOBILE").unwrap(), Viewport::MOBILE);
        assert!(Viewport::by_name("watch").is_err());
    }

    #[test]
    fn progress_floor_and_empty_batch() {
        let mut job = BatchJob::new(Uuid::new_v4(), 3);
        job.completed = 1;
        job.update_progress();
        assert_eq!(job.progress, 33);
        job.completed = 3;
        job.update_progress();
        assert_eq!(job.progress, 100);

        let mut empty = BatchJob::new(Uuid::new_v4(), 0);
        empty.update_progress();
        assert_eq!(empty.progress, 100);
    }

    #[test]
    fn failed_result_carries_sentinel() {
        let r = ComparisonResult::failed("http://a", "http://b", "boom");
        assert_eq!(r.status, ComparisonStatus::Failed);
        assert_eq!(r.mismatched_pixels, -1);
        assert!(r.paths.is_none());
        assert_eq!(r.error.as_deref(), Some("boom"));
    }
}
