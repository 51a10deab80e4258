/// Test utilities shared by storage, domain and REST tests
///
/// Provides a seeded in-memory backend, a change feed whose handshakes the
/// test controls, and an attendance store that can be told to fail.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use shared::{AttendanceRecord, AttendanceStatus, Student, Subject};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tokio::time::Instant;
use uuid::Uuid;

use super::change_feed::{BroadcastChangeFeed, ChannelHandle, ChannelMessage, SubscribeStatus};
use super::memory::InMemoryStorage;
use super::traits::{AttendanceStorage, ChangeFeed, StudentStorage, SubjectStorage};

/// Students whose id, roll number and name derive from the given ids
pub fn sample_students(ids: &[&str]) -> Vec<Student> {
    ids.iter()
        .map(|id| Student {
            id: id.to_string(),
            roll_number: format!("R-{}", id),
            name: format!("Student {}", id),
            course: "B.Tech".to_string(),
            year: 3,
            section: "A".to_string(),
            image_url: None,
        })
        .collect()
}

pub fn sample_subject(id: &str, code: &str) -> Subject {
    Subject {
        id: id.to_string(),
        code: code.to_string(),
        name: format!("Subject {}", code),
        faculty_id: "f1".to_string(),
        course_id: "1".to_string(),
    }
}

/// In-memory backend seeded with a roster and the subjects "math" and "physics"
pub struct TestStorage {
    pub storage: InMemoryStorage,
    pub feed: BroadcastChangeFeed,
}

impl TestStorage {
    pub async fn with_roster(ids: &[&str]) -> Self {
        let feed = BroadcastChangeFeed::new();
        let storage = InMemoryStorage::new(feed.clone());
        for student in sample_students(ids) {
            storage.store_student(&student).await.expect("seed student");
        }
        storage
            .store_subject(&sample_subject("math", "MA101"))
            .await
            .expect("seed subject");
        storage
            .store_subject(&sample_subject("physics", "PH101"))
            .await
            .expect("seed subject");
        Self { storage, feed }
    }

    pub fn record(
        &self,
        date: NaiveDate,
        subject_id: &str,
        student_id: &str,
        status: AttendanceStatus,
    ) -> AttendanceRecord {
        AttendanceRecord {
            id: AttendanceRecord::generate_id(date, student_id, subject_id),
            date,
            student_id: student_id.to_string(),
            subject_id: subject_id.to_string(),
            status,
            marked_by_id: "f1".to_string(),
            marked_at: Utc::now(),
        }
    }
}

struct ScriptedSubscription {
    id: Uuid,
    subject_id: String,
    opened_at: Instant,
    tx: mpsc::UnboundedSender<ChannelMessage>,
    active: bool,
}

#[derive(Default)]
struct ScriptState {
    failures_remaining: u32,
    fail_all: bool,
    subscriptions: Vec<ScriptedSubscription>,
}

/// Change feed whose handshake outcomes and deliveries are driven by the test
#[derive(Clone, Default)]
pub struct ScriptedChangeFeed {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedChangeFeed {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ScriptState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// The next `count` handshakes answer with a channel error
    pub fn fail_next_handshakes(&self, count: u32) {
        self.lock().failures_remaining = count;
    }

    pub fn fail_all_handshakes(&self) {
        self.lock().fail_all = true;
    }

    pub fn subscription_count(&self) -> usize {
        self.lock().subscriptions.len()
    }

    pub fn active_subscriptions(&self) -> usize {
        self.lock().subscriptions.iter().filter(|s| s.active).count()
    }

    pub fn subject_of(&self, index: usize) -> Option<String> {
        self.lock().subscriptions.get(index).map(|s| s.subject_id.clone())
    }

    pub fn opened_at(&self, index: usize) -> Option<Instant> {
        self.lock().subscriptions.get(index).map(|s| s.opened_at)
    }

    /// Send a message on the subscription opened at `index`
    pub fn push(&self, index: usize, message: ChannelMessage) -> bool {
        let state = self.lock();
        match state.subscriptions.get(index) {
            Some(subscription) if subscription.active => subscription.tx.send(message).is_ok(),
            _ => false,
        }
    }

    /// Send a message on the most recently opened subscription
    pub fn push_latest(&self, message: ChannelMessage) -> bool {
        let count = self.subscription_count();
        count > 0 && self.push(count - 1, message)
    }

    /// Send a change row on the most recently opened subscription
    pub fn push_change(&self, student_id: &str, date: NaiveDate, status: AttendanceStatus) -> bool {
        self.push_latest(ChannelMessage::Change(serde_json::json!({
            "student_id": student_id,
            "date": date,
            "status": status,
        })))
    }
}

impl ChangeFeed for ScriptedChangeFeed {
    fn subscribe(&self, subject_id: &str) -> ChannelHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = ChannelHandle::new(subject_id, rx);

        let mut state = self.lock();
        let status = if state.fail_all {
            SubscribeStatus::ChannelError("scripted failure".to_string())
        } else if state.failures_remaining > 0 {
            state.failures_remaining -= 1;
            SubscribeStatus::ChannelError("scripted failure".to_string())
        } else {
            SubscribeStatus::Subscribed
        };
        let _ = tx.send(ChannelMessage::Status(status));

        state.subscriptions.push(ScriptedSubscription {
            id: handle.id(),
            subject_id: subject_id.to_string(),
            opened_at: Instant::now(),
            tx,
            active: true,
        });
        handle
    }

    fn unsubscribe(&self, handle: ChannelHandle) {
        let mut state = self.lock();
        if let Some(subscription) = state.subscriptions.iter_mut().find(|s| s.id == handle.id()) {
            subscription.active = false;
        }
    }
}

/// Attendance store that fails saves or fetches on demand
#[derive(Clone)]
pub struct FlakyAttendanceStorage {
    inner: InMemoryStorage,
    fail_saves: Arc<AtomicBool>,
    fail_fetches: Arc<AtomicBool>,
}

impl FlakyAttendanceStorage {
    pub fn new(inner: InMemoryStorage) -> Self {
        Self {
            inner,
            fail_saves: Arc::new(AtomicBool::new(false)),
            fail_fetches: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_fetches(&self, fail: bool) {
        self.fail_fetches.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl AttendanceStorage for FlakyAttendanceStorage {
    async fn fetch_attendance(
        &self,
        date: NaiveDate,
        subject_id: &str,
    ) -> Result<HashMap<String, AttendanceStatus>> {
        if self.fail_fetches.load(Ordering::SeqCst) {
            return Err(anyhow::anyhow!("database unavailable"));
        }
        self.inner.fetch_attendance(date, subject_id).await
    }

    async fn replace_attendance(
        &self,
        date: NaiveDate,
        subject_id: &str,
        records: &[AttendanceRecord],
    ) -> Result<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(anyhow::anyhow!("insert rejected by server"));
        }
        self.inner.replace_attendance(date, subject_id, records).await
    }

    async fn list_student_records(&self, student_id: &str) -> Result<Vec<AttendanceRecord>> {
        self.inner.list_student_records(student_id).await
    }
}
