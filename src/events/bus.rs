//! Broadcast bus for engine events.
//!
//! A thin wrapper over `tokio::sync::broadcast` with lock-free metrics.
//! Publishing never blocks and never fails a job: with no subscribers the
//! event is counted as dropped and forgotten.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use super::types::AuditEvent;

/// Counters for bus activity.
#[derive(Debug, Default)]
pub struct EventMetrics {
    published: AtomicU64,
    dropped: AtomicU64,
    subscribers: AtomicUsize,
}

impl EventMetrics {
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            events_published: self.published.load(Ordering::SeqCst),
            events_dropped: self.dropped.load(Ordering::SeqCst),
            active_subscribers: self.subscribers.load(Ordering::SeqCst),
        }
    }
}

/// Consistent point-in-time view of the metrics.
#[derive(Debug, Clone, Copy)]
pub struct MetricsSnapshot {
    pub events_published: u64,
    pub events_dropped: u64,
    pub active_subscribers: usize,
}

/// Event bus for publishing and subscribing to [`AuditEvent`]s.
#[derive(Debug)]
pub struct EventBus {
    sender: broadcast::Sender<AuditEvent>,
    metrics: Arc<EventMetrics>,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` events per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            metrics: Arc::new(EventMetrics::default()),
        }
    }

    /// Publish an event to all current subscribers, best-effort.
    ///
    /// Returns the number of subscribers that received it (zero when nobody
    /// is listening).
    pub fn publish(&self, event: AuditEvent) -> usize {
        match self.sender.send(event) {
            Ok(count) => {
                self.metrics.published.fetch_add(1, Ordering::SeqCst);
                self.metrics.subscribers.store(count, Ordering::SeqCst);
                count
            }
            Err(_) => {
                self.metrics.dropped.fetch_add(1, Ordering::SeqCst);
                0
            }
        }
    }

    /// Subscribe to all events from this point on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<AuditEvent> {
        self.sender.subscribe()
    }

    /// Subscribe as a stream, keeping only events the predicate accepts.
    ///
    /// Lagged receivers silently skip the missed window rather than erroring
    /// the stream.
    pub fn subscribe_filtered<F>(
        &self,
        mut predicate: F,
    ) -> impl futures_util::Stream<Item = AuditEvent> + use<F>
    where
        F: FnMut(&AuditEvent) -> bool,
    {
        use futures_util::StreamExt;
        BroadcastStream::new(self.sender.subscribe())
            .filter_map(move |item| futures_util::future::ready(item.ok().filter(|e| predicate(e))))
    }

    #[must_use]
    pub fn metrics(&self) -> &EventMetrics {
        &self.metrics
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::types::AuditEvent;

    #[tokio::test]
    async fn test_publish_and_receive() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        let delivered = bus.publish(AuditEvent::cache_hit("https://example.com/".to_string()));
        assert_eq!(delivered, 1);

        let event = rx.recv().await.expect("subscriber should receive the event");
        assert_eq!(event.url(), "https://example.com/");
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_dropped() {
        let bus = EventBus::new(16);
        assert_eq!(
            bus.publish(AuditEvent::cache_hit("https://example.com/".to_string())),
            0
        );
        let snapshot = bus.metrics().snapshot();
        assert_eq!(snapshot.events_published, 0);
        assert_eq!(snapshot.events_dropped, 1);
    }

    #[tokio::test]
    async fn test_filtered_subscription() {
        use futures_util::StreamExt;

        let bus = EventBus::new(16);
        let mut stream = Box::pin(
            bus.subscribe_filtered(|e| matches!(e, AuditEvent::JobCompleted { .. })),
        );

        bus.publish(AuditEvent::cache_hit("https://a.example/".to_string()));
        bus.publish(AuditEvent::job_completed(
            "https://a.example/".to_string(),
            uuid::Uuid::new_v4(),
            crate::engine::job::JobStatus::Complete,
            42,
        ));

        let event = stream.next().await.expect("filtered stream should yield");
        assert!(matches!(event, AuditEvent::JobCompleted { .. }));
    }
}
