//! Sticker conversion worker.
//!
//! This crate provides:
//! - Job executor with a bounded number of concurrent jobs
//! - Sequential per-job processing with progress events
//! - Cooperative cancellation between files
//! - Zip packaging of successful outputs
//! - Graceful shutdown

pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod metrics;
pub mod packager;
pub mod processor;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use executor::JobExecutor;
pub use logging::JobLogger;
pub use packager::{archive_name, build_archive};
pub use processor::{output_stem, JobTask, ProcessingContext, NO_SUCCESS_MESSAGE};
