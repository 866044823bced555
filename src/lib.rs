//! Collects CI build status from GitHub Actions, GitLab CI and Jenkins,
//! keeps one canonical record per build and reports status transitions to
//! live subscribers and alert channels.

pub mod alerts;
pub mod auth;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod ingest;
pub mod model;
pub mod output;
pub mod providers;
pub mod server;
pub mod store;

pub use error::{CiPulseError, Result};
