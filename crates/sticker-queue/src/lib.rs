//! In-process job registry and progress publisher.
//!
//! This crate provides:
//! - Job records with a synchronized lifecycle state machine
//! - A cooperative cancellation flag per job
//! - Publish/subscribe progress events with a non-blocking drop policy

pub mod error;
pub mod progress;
pub mod registry;

pub use error::{QueueError, QueueResult};
pub use progress::{
    ProgressEvent, ProgressPublisher, SubscriberId, Subscription, Target,
    DEFAULT_SUBSCRIBER_BUFFER, EVENTS_DROPPED_METRIC,
};
pub use registry::{JobHandle, JobRegistry};
