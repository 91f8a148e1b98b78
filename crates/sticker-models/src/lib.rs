//! Shared data models for the sticker conversion backend.
//!
//! This crate provides Serde-serializable types for:
//! - Jobs, their lifecycle status and per-file results
//! - Conversion requests (loose wire form and validated form)
//! - Platform limits for every sticker variant
//! - Progress event schemas

pub mod error;
pub mod event;
pub mod job;
pub mod limits;
pub mod request;

// Re-export common types
pub use error::{ModelError, ModelResult};
pub use event::{FileOutcome, JobEvent, JobOutcome};
pub use job::{FileResult, Job, JobId, JobStatus};
pub use limits::StickerLimits;
pub use request::{ConversionRequest, FileConfig, ImageEncoding, MediaKind, Variant};
