//! Progress events over per-subscriber channels.
//!
//! Delivery is at-most-once. Publishing never waits: a subscriber whose
//! buffer is full misses the event, and a subscriber whose receiver is gone
//! is removed. Current job state stays queryable through the registry.

use chrono::{DateTime, Utc};
use futures_util::Stream;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, trace};
use uuid::Uuid;

use sticker_models::{JobEvent, JobId};

/// Events buffered per subscriber before new ones are dropped.
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 256;

/// Counter of events dropped for full buffers.
pub const EVENTS_DROPPED_METRIC: &str = "sticker_progress_events_dropped_total";

/// Address of one subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriberId(String);

impl SubscriberId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who an event is for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "to", content = "id", rename_all = "snake_case")]
pub enum Target {
    Subscriber(SubscriberId),
    Broadcast,
}

impl From<Option<SubscriberId>> for Target {
    fn from(subscriber: Option<SubscriberId>) -> Self {
        match subscriber {
            Some(id) => Target::Subscriber(id),
            None => Target::Broadcast,
        }
    }
}

/// Envelope delivered to subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub job_id: JobId,
    pub target: Target,
    pub timestamp: DateTime<Utc>,
    pub event: JobEvent,
}

/// Receiving end of a subscription.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    receiver: mpsc::Receiver<ProgressEvent>,
}

impl Subscription {
    pub fn id(&self) -> &SubscriberId {
        &self.id
    }

    /// Next event, or `None` once the publisher is gone.
    pub async fn recv(&mut self) -> Option<ProgressEvent> {
        self.receiver.recv().await
    }

    /// Next buffered event without waiting.
    pub fn try_recv(&mut self) -> Option<ProgressEvent> {
        self.receiver.try_recv().ok()
    }

    /// Consume the subscription as a stream of events.
    pub fn into_stream(self) -> impl Stream<Item = ProgressEvent> + Send {
        futures_util::stream::unfold(self.receiver, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        })
    }
}

/// Publish/subscribe hub for job progress.
#[derive(Debug)]
pub struct ProgressPublisher {
    subscribers: RwLock<HashMap<SubscriberId, mpsc::Sender<ProgressEvent>>>,
    buffer: usize,
    dropped: AtomicU64,
}

impl Default for ProgressPublisher {
    fn default() -> Self {
        Self::new(DEFAULT_SUBSCRIBER_BUFFER)
    }
}

impl ProgressPublisher {
    /// Create a publisher giving each subscriber `buffer` slots.
    pub fn new(buffer: usize) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            buffer: buffer.max(1),
            dropped: AtomicU64::new(0),
        }
    }

    /// Register a new subscriber.
    pub fn subscribe(&self) -> Subscription {
        let id = SubscriberId::new();
        let (tx, rx) = mpsc::channel(self.buffer);
        self.subscribers.write().insert(id.clone(), tx);
        debug!(subscriber = %id, "Progress subscriber registered");
        Subscription { id, receiver: rx }
    }

    pub fn unsubscribe(&self, id: &SubscriberId) -> bool {
        self.subscribers.write().remove(id).is_some()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Events dropped for full buffers since creation.
    pub fn dropped_events(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Deliver an event without blocking. Returns how many subscribers received it.
    pub fn publish(&self, target: &Target, event: JobEvent) -> usize {
        let envelope = ProgressEvent {
            job_id: event.job_id().clone(),
            target: target.clone(),
            timestamp: Utc::now(),
            event,
        };

        let recipients: Vec<(SubscriberId, mpsc::Sender<ProgressEvent>)> = {
            let subscribers = self.subscribers.read();
            match target {
                Target::Subscriber(id) => subscribers
                    .get(id)
                    .map(|tx| vec![(id.clone(), tx.clone())])
                    .unwrap_or_default(),
                Target::Broadcast => subscribers
                    .iter()
                    .map(|(id, tx)| (id.clone(), tx.clone()))
                    .collect(),
            }
        };

        if recipients.is_empty() {
            trace!(job_id = %envelope.job_id, "No subscriber for progress event");
            return 0;
        }

        let mut delivered = 0;
        let mut closed = Vec::new();

        for (id, tx) in recipients {
            match tx.try_send(envelope.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    metrics::counter!(EVENTS_DROPPED_METRIC).increment(1);
                    debug!(
                        subscriber = %id,
                        job_id = %envelope.job_id,
                        "Subscriber buffer full, dropping progress event"
                    );
                }
                Err(mpsc::error::TrySendError::Closed(_)) => closed.push(id),
            }
        }

        if !closed.is_empty() {
            let mut subscribers = self.subscribers.write();
            for id in closed {
                subscribers.remove(&id);
                debug!(subscriber = %id, "Progress subscriber disconnected");
            }
        }

        delivered
    }
}
