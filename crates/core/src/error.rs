//! Error types for vizdiff

use thiserror::Error;

/// Result type alias using the vizdiff Error
pub type Result<T> = std::result::Result<T, Error>;

/// vizdiff error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Unknown viewport: {0}")]
    UnknownViewport(String),

    #[error("Browser launch failed: {0}")]
    BrowserLaunch(String),

    #[error("CDP error: {0}")]
    Cdp(#[from] chromiumoxide::error::CdpError),

    #[error("Navigation failed for {url}: {reason}")]
    Navigation { url: String, reason: String },

    #[error("Navigation timed out after {seconds}s: {url}")]
    NavigationTimeout { url: String, seconds: u64 },

    #[error("Job not found: {id}")]
    JobNotFound { id: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
