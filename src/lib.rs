//! Adaptive CIPE (CI Pipeline Execution) watcher.
//!
//! Polls a CIPE source on an interval that follows what the pipelines are doing,
//! derives which cloud view to show, and turns successive snapshots into
//! deduplicated notifications.

pub mod cli;
pub mod config;
pub mod error;
pub mod model;
pub mod monitor;
pub mod notifications;
pub mod output;
pub mod polling;
pub mod service;
pub mod source;
pub mod status;
pub mod view;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{CipeWatchError, Result};
