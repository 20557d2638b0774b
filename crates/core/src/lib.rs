//! vizdiff core library
//!
//! Batch orchestration and diff pipeline for visual regression comparison:
//! - `browser`: shared headless-browser session and page capture
//! - `diff`: pixel-level perceptual comparison of two captures
//! - `compare`: the comparison unit (two concurrent captures + one diff)
//! - `store` / `manager` / `launcher`: batch job lifecycle and tracking

pub mod browser;
pub mod compare;
pub mod config;
pub mod diff;
pub mod error;
pub mod launcher;
pub mod manager;
pub mod paths;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use compare::{compare_once, ChromiumComparator};
pub use config::Config;
pub use error::{Error, Result};
pub use manager::{BatchManager, BatchSession, Comparator};
pub use store::JobStore;
pub use types::*;

/// vizdiff version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
