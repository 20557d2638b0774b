//! vizdiff web console
//!
//! HTTP surface over the core pipeline: synchronous comparison, batch
//! submission from CSV, batch status polling, cancellation, and artifact
//! serving.

pub mod input;
pub mod server;
