//! # Change Feed
//!
//! In-process push feed of attendance record changes. Storage backends
//! publish every inserted record; subscribers receive the rows of the subject
//! they subscribed to, as raw JSON payloads.

use shared::AttendanceRecord;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::traits::ChangeFeed;

/// Result of a subscription handshake, or a later change in channel health
#[derive(Debug, Clone, PartialEq)]
pub enum SubscribeStatus {
    Subscribed,
    ChannelError(String),
    TimedOut,
    Closed,
}

impl fmt::Display for SubscribeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubscribeStatus::Subscribed => write!(f, "SUBSCRIBED"),
            SubscribeStatus::ChannelError(reason) => write!(f, "CHANNEL_ERROR ({})", reason),
            SubscribeStatus::TimedOut => write!(f, "TIMED_OUT"),
            SubscribeStatus::Closed => write!(f, "CLOSED"),
        }
    }
}

/// Message delivered on a subscription
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelMessage {
    Status(SubscribeStatus),
    /// The new row of a changed attendance record
    Change(serde_json::Value),
}

/// One open subscription. Dropping the handle stops delivery.
#[derive(Debug)]
pub struct ChannelHandle {
    id: Uuid,
    subject_id: String,
    name: String,
    rx: mpsc::UnboundedReceiver<ChannelMessage>,
}

impl ChannelHandle {
    pub fn new(subject_id: &str, rx: mpsc::UnboundedReceiver<ChannelMessage>) -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            subject_id: subject_id.to_string(),
            name: format!("attendance-changes-{}-{}", subject_id, id),
            rx,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wait for the next message. `None` means the feed hung up.
    pub async fn recv(&mut self) -> Option<ChannelMessage> {
        self.rx.recv().await
    }
}

struct Subscriber {
    subject_id: String,
    tx: mpsc::UnboundedSender<ChannelMessage>,
}

/// Feed shared by the storage backend and every subscriber
#[derive(Clone, Default)]
pub struct BroadcastChangeFeed {
    subscribers: Arc<Mutex<HashMap<Uuid, Subscriber>>>,
}

impl BroadcastChangeFeed {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, Subscriber>> {
        match self.subscribers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Drop subscribers whose handle is gone, whatever their subject
    fn prune_closed(subscribers: &mut HashMap<Uuid, Subscriber>) {
        subscribers.retain(|id, subscriber| {
            if subscriber.tx.is_closed() {
                debug!("Dropping closed subscription {}", id);
                return false;
            }
            true
        });
    }

    /// Deliver a changed record to every subscriber of its subject.
    /// Returns the number of subscribers reached.
    pub fn publish(&self, record: &AttendanceRecord) -> usize {
        let payload = match serde_json::to_value(record) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Failed to serialize attendance change {}: {}", record.id, e);
                return 0;
            }
        };

        let mut subscribers = self.lock();
        Self::prune_closed(&mut subscribers);
        let mut delivered = 0;
        subscribers.retain(|id, subscriber| {
            if subscriber.subject_id != record.subject_id {
                return true;
            }
            match subscriber.tx.send(ChannelMessage::Change(payload.clone())) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(_) => {
                    debug!("Dropping closed subscription {}", id);
                    false
                }
            }
        });
        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }
}

impl ChangeFeed for BroadcastChangeFeed {
    fn subscribe(&self, subject_id: &str) -> ChannelHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = ChannelHandle::new(subject_id, rx);

        // The in-process feed has nothing to negotiate
        let _ = tx.send(ChannelMessage::Status(SubscribeStatus::Subscribed));

        let mut subscribers = self.lock();
        Self::prune_closed(&mut subscribers);
        subscribers.insert(
            handle.id(),
            Subscriber {
                subject_id: subject_id.to_string(),
                tx,
            },
        );
        info!("Opened channel {}", handle.name());
        handle
    }

    fn unsubscribe(&self, handle: ChannelHandle) {
        if self.lock().remove(&handle.id()).is_some() {
            info!("Removed channel {}", handle.name());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use shared::AttendanceStatus;

    fn record(student_id: &str, subject_id: &str) -> AttendanceRecord {
        let date = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
        AttendanceRecord {
            id: AttendanceRecord::generate_id(date, student_id, subject_id),
            date,
            student_id: student_id.to_string(),
            subject_id: subject_id.to_string(),
            status: AttendanceStatus::Present,
            marked_by_id: "1".to_string(),
            marked_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_subscribe_acknowledges_immediately() {
        let feed = BroadcastChangeFeed::new();
        let mut handle = feed.subscribe("2");

        assert_eq!(
            handle.recv().await,
            Some(ChannelMessage::Status(SubscribeStatus::Subscribed))
        );
        assert_eq!(feed.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_publish_filters_by_subject() {
        let feed = BroadcastChangeFeed::new();
        let mut math = feed.subscribe("2");
        let mut networks = feed.subscribe("3");
        math.recv().await;
        networks.recv().await;

        assert_eq!(feed.publish(&record("1", "2")), 1);

        match math.recv().await {
            Some(ChannelMessage::Change(payload)) => {
                assert_eq!(payload["student_id"], "1");
                assert_eq!(payload["status"], "present");
                assert_eq!(payload["date"], "2025-03-03");
            }
            other => panic!("unexpected message: {:?}", other),
        }
        assert!(networks.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_dropped_handles_on_quiet_subject_are_pruned() {
        let feed = BroadcastChangeFeed::new();
        for _ in 0..100 {
            drop(feed.subscribe("quiet"));
        }

        assert_eq!(feed.publish(&record("A", "busy")), 0);
        assert_eq!(feed.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_subscribe_prunes_dropped_handles() {
        let feed = BroadcastChangeFeed::new();
        drop(feed.subscribe("quiet"));
        drop(feed.subscribe("quiet"));

        let _live = feed.subscribe("busy");
        assert_eq!(feed.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_unsubscribe_and_dropped_handles_are_pruned() {
        let feed = BroadcastChangeFeed::new();
        let kept = feed.subscribe("2");
        let dropped = feed.subscribe("2");
        drop(dropped);

        assert_eq!(feed.publish(&record("1", "2")), 1);
        assert_eq!(feed.subscriber_count(), 1);

        feed.unsubscribe(kept);
        assert_eq!(feed.subscriber_count(), 0);
    }
}
