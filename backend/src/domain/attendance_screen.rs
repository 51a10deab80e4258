//! # Attendance Screen
//!
//! State behind the "mark attendance" screen. The screen owns one selection
//! at a time: the roster, the reconciled draft, the change-feed subscription,
//! the retry timer and the highlight timers for one (date, subject).
//!
//! The screen is a plain `&mut self` object. The owner drives it by calling
//! [`AttendanceScreen::next_event`], which waits for whichever comes first:
//! a message on the subscription, the retry timer or the earliest highlight
//! expiry. Selecting another (date, subject) or dropping the screen closes
//! the subscription and cancels every timer of the old selection.

use chrono::NaiveDate;
use shared::{
    AttendanceChangeEvent, AttendanceStatus, AuthUser, SaveAttendanceRequest,
    SaveAttendanceResponse, Student,
};
use std::collections::{BTreeMap, HashMap};
use std::future::pending;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{sleep, sleep_until, Instant, Sleep};
use tracing::{debug, error, info, warn};

use crate::domain::attendance_service::{AttendanceService, SaveError};
use crate::domain::notifications::{Notification, NotificationQueue};
use crate::domain::reconciliation::{AttendanceCounts, ConflictPolicy, Reconciler, RemoteOutcome};
use crate::domain::sync_channel::{
    ChannelEffect, ChannelEvent, ChannelStatus, RetryPolicy, SyncChannel,
};
use crate::storage::{ChangeFeed, ChannelHandle, ChannelMessage, SubscribeStatus};

#[derive(Debug, Error)]
pub enum ScreenError {
    #[error("Select a date and subject first")]
    NoSelection,
    #[error("Unknown student: {0}")]
    UnknownStudent(String),
    #[error("Failed to load attendance: {0}")]
    Load(#[source] anyhow::Error),
    #[error(transparent)]
    Save(#[from] SaveError),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenSettings {
    pub retry: RetryPolicy,
    pub highlight_duration: Duration,
    pub conflict_policy: ConflictPolicy,
}

impl Default for ScreenSettings {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            highlight_duration: Duration::from_millis(2000),
            conflict_policy: ConflictPolicy::default(),
        }
    }
}

/// Something the owner may want to re-render for
#[derive(Debug, Clone, PartialEq)]
pub enum ScreenEvent {
    ChannelStatusChanged(ChannelStatus),
    RemoteChange {
        student_id: String,
        status: AttendanceStatus,
    },
    /// A well-formed change that did not apply to the draft
    ChangeIgnored {
        student_id: String,
    },
    /// A payload that could not be read as a change
    ChangeDropped {
        reason: String,
    },
    HighlightCleared {
        student_id: String,
    },
}

struct Selection {
    reconciler: Reconciler,
    roster: Vec<Student>,
    channel: SyncChannel,
    handle: Option<ChannelHandle>,
    retry_timer: Option<Pin<Box<Sleep>>>,
    highlights: HashMap<String, Instant>,
}

impl Selection {
    fn run_effects(
        &mut self,
        effects: Vec<ChannelEffect>,
        feed: &dyn ChangeFeed,
        notifications: &mut NotificationQueue,
    ) {
        for effect in effects {
            match effect {
                ChannelEffect::OpenChannel => {
                    let handle = feed.subscribe(self.reconciler.subject_id());
                    debug!("Subscribing on {}", handle.name());
                    self.handle = Some(handle);
                }
                ChannelEffect::CloseChannel => {
                    if let Some(handle) = self.handle.take() {
                        debug!("Closing {}", handle.name());
                        feed.unsubscribe(handle);
                    }
                }
                ChannelEffect::ScheduleRetry { delay, .. } => {
                    self.retry_timer = Some(Box::pin(sleep(delay)));
                }
                ChannelEffect::CancelRetry => {
                    self.retry_timer = None;
                }
                ChannelEffect::ReportFailure { message } => {
                    error!("{}", message);
                    notifications.push(Notification::error(message));
                }
            }
        }
    }

    fn next_highlight(&self) -> Option<(String, Instant)> {
        self.highlights
            .iter()
            .min_by_key(|(_, deadline)| **deadline)
            .map(|(id, deadline)| (id.clone(), *deadline))
    }

    fn is_idle(&self) -> bool {
        self.handle.is_none() && self.retry_timer.is_none() && self.highlights.is_empty()
    }

    fn student_name(&self, student_id: &str) -> &str {
        self.roster
            .iter()
            .find(|s| s.id == student_id)
            .map(|s| s.name.as_str())
            .unwrap_or("Student")
    }
}

enum Wake {
    Message(Option<ChannelMessage>),
    RetryDue,
    HighlightExpired(String),
}

async fn recv_message(handle: Option<&mut ChannelHandle>) -> Option<ChannelMessage> {
    match handle {
        Some(handle) => handle.recv().await,
        None => pending().await,
    }
}

async fn retry_due(timer: Option<&mut Pin<Box<Sleep>>>) {
    match timer {
        Some(timer) => timer.as_mut().await,
        None => pending().await,
    }
}

async fn highlight_expired(next: Option<(String, Instant)>) -> String {
    match next {
        Some((student_id, deadline)) => {
            sleep_until(deadline).await;
            student_id
        }
        None => pending().await,
    }
}

pub struct AttendanceScreen {
    service: AttendanceService,
    feed: Arc<dyn ChangeFeed>,
    user: AuthUser,
    settings: ScreenSettings,
    selection: Option<Selection>,
    notifications: NotificationQueue,
    load_error: Option<String>,
}

impl AttendanceScreen {
    pub fn new(
        service: AttendanceService,
        feed: Arc<dyn ChangeFeed>,
        user: AuthUser,
        settings: ScreenSettings,
    ) -> Self {
        Self {
            service,
            feed,
            user,
            settings,
            selection: None,
            notifications: NotificationQueue::default(),
            load_error: None,
        }
    }

    /// Switch to (date, subject): load the roster and stored marks and
    /// subscribe to changes for the subject
    pub async fn select(&mut self, date: NaiveDate, subject_id: &str) -> Result<(), ScreenError> {
        self.teardown();
        self.load_error = None;
        info!("Selecting attendance for {} / {}", date, subject_id);

        let roster = match self.service.roster().await {
            Ok(roster) => roster,
            Err(e) => return Err(self.load_failed(e)),
        };

        let mut selection = Selection {
            reconciler: Reconciler::new(
                date,
                subject_id,
                roster.iter().map(|s| s.id.clone()),
                self.settings.conflict_policy,
            ),
            roster,
            channel: SyncChannel::new(self.settings.retry),
            handle: None,
            retry_timer: None,
            highlights: HashMap::new(),
        };
        let effects = selection.channel.start();
        selection.run_effects(effects, self.feed.as_ref(), &mut self.notifications);

        let existing = match self.service.fetch_attendance(date, subject_id).await {
            Ok(existing) => existing,
            Err(e) => {
                let effects = selection.channel.apply(ChannelEvent::TornDown);
                selection.run_effects(effects, self.feed.as_ref(), &mut self.notifications);
                return Err(self.load_failed(e));
            }
        };
        let applied = selection.reconciler.overlay_existing(&existing);
        info!(
            "Loaded {} students, {} with stored marks",
            selection.roster.len(),
            applied
        );

        self.selection = Some(selection);
        Ok(())
    }

    fn load_failed(&mut self, e: anyhow::Error) -> ScreenError {
        error!("Failed to load attendance: {:?}", e);
        self.load_error = Some(e.to_string());
        self.notifications
            .push(Notification::error("Failed to fetch attendance records"));
        ScreenError::Load(e)
    }

    /// Record a click for today's attendance
    pub fn mark(
        &mut self,
        student_id: &str,
        status: AttendanceStatus,
    ) -> Result<AttendanceCounts, ScreenError> {
        let selection = self.selection.as_mut().ok_or(ScreenError::NoSelection)?;
        self.service.ensure_editable(selection.reconciler.date())?;

        if !selection.reconciler.apply_local(student_id, status) {
            return Err(ScreenError::UnknownStudent(student_id.to_string()));
        }
        debug!("Marked {} {}", student_id, status);
        Ok(selection.reconciler.counts())
    }

    /// Save the full draft. On failure the draft is left untouched.
    pub async fn save(&mut self) -> Result<SaveAttendanceResponse, ScreenError> {
        let selection = self.selection.as_mut().ok_or(ScreenError::NoSelection)?;
        let request = SaveAttendanceRequest {
            date: selection.reconciler.date(),
            subject_id: selection.reconciler.subject_id().to_string(),
            statuses: selection.reconciler.statuses_for_save(),
            marked_by_id: self.user.id.clone(),
        };

        match self.service.save(request).await {
            Ok(response) => {
                selection.reconciler.mark_saved();
                if let Some(warning) = &response.warning {
                    self.notifications.push(Notification::warning(warning.clone()));
                }
                self.notifications
                    .push(Notification::success(response.success_message.clone()));
                Ok(response)
            }
            Err(e) => {
                warn!("Save failed: {}", e);
                self.notifications.push(Notification::error(e.to_string()));
                Err(ScreenError::Save(e))
            }
        }
    }

    /// Wait for the next thing that changes what the screen shows.
    /// Returns `None` when nothing further can happen for this selection.
    pub async fn next_event(&mut self) -> Option<ScreenEvent> {
        loop {
            let selection = self.selection.as_mut()?;
            if selection.is_idle() {
                return None;
            }

            let next_highlight = selection.next_highlight();
            let wake = tokio::select! {
                message = recv_message(selection.handle.as_mut()) => Wake::Message(message),
                _ = retry_due(selection.retry_timer.as_mut()) => Wake::RetryDue,
                student_id = highlight_expired(next_highlight) => Wake::HighlightExpired(student_id),
            };

            let event = match wake {
                Wake::Message(message) => self.on_message(message),
                Wake::RetryDue => self.on_retry_due(),
                Wake::HighlightExpired(student_id) => self.on_highlight_expired(student_id),
            };
            if event.is_some() {
                return event;
            }
        }
    }

    fn on_message(&mut self, message: Option<ChannelMessage>) -> Option<ScreenEvent> {
        match message {
            Some(ChannelMessage::Status(SubscribeStatus::Subscribed)) => {
                self.apply_channel_event(ChannelEvent::Subscribed)
            }
            Some(ChannelMessage::Status(status)) => self.apply_channel_event(ChannelEvent::Failed {
                reason: status.to_string(),
            }),
            None => self.apply_channel_event(ChannelEvent::Failed {
                reason: "feed closed".to_string(),
            }),
            Some(ChannelMessage::Change(payload)) => Some(self.on_change(payload)),
        }
    }

    fn on_change(&mut self, payload: serde_json::Value) -> ScreenEvent {
        let event: AttendanceChangeEvent = match serde_json::from_value(payload) {
            Ok(event) => event,
            Err(e) => {
                warn!("Dropping malformed attendance change: {}", e);
                return ScreenEvent::ChangeDropped {
                    reason: e.to_string(),
                };
            }
        };

        let Some(selection) = self.selection.as_mut() else {
            return ScreenEvent::ChangeIgnored {
                student_id: event.student_id,
            };
        };
        let subject_id = match &selection.handle {
            Some(handle) => handle.subject_id().to_string(),
            None => String::new(),
        };

        match selection.reconciler.apply_remote(&subject_id, &event) {
            RemoteOutcome::Applied { student_id, status } => {
                let deadline = Instant::now() + self.settings.highlight_duration;
                selection.highlights.insert(student_id.clone(), deadline);
                let name = selection.student_name(&student_id).to_string();
                info!("Remote change: {} is now {}", student_id, status);
                self.notifications.push(Notification::info(format!(
                    "{}'s attendance updated to {}",
                    name, status
                )));
                ScreenEvent::RemoteChange { student_id, status }
            }
            outcome => {
                debug!("Ignoring change for {}: {:?}", event.student_id, outcome);
                ScreenEvent::ChangeIgnored {
                    student_id: event.student_id,
                }
            }
        }
    }

    fn on_retry_due(&mut self) -> Option<ScreenEvent> {
        if let Some(selection) = self.selection.as_mut() {
            selection.retry_timer = None;
        }
        self.apply_channel_event(ChannelEvent::RetryTimerFired)
    }

    fn on_highlight_expired(&mut self, student_id: String) -> Option<ScreenEvent> {
        let selection = self.selection.as_mut()?;
        selection.highlights.remove(&student_id);
        Some(ScreenEvent::HighlightCleared { student_id })
    }

    fn apply_channel_event(&mut self, event: ChannelEvent) -> Option<ScreenEvent> {
        let selection = self.selection.as_mut()?;
        let before = selection.channel.status();
        let effects = selection.channel.apply(event);
        selection.run_effects(effects, self.feed.as_ref(), &mut self.notifications);

        let after = selection.channel.status();
        (after != before).then_some(ScreenEvent::ChannelStatusChanged(after))
    }

    /// Close the subscription and cancel the timers of the current selection
    pub fn teardown(&mut self) {
        if let Some(mut selection) = self.selection.take() {
            info!(
                "Tearing down attendance for {} / {}",
                selection.reconciler.date(),
                selection.reconciler.subject_id()
            );
            let effects = selection.channel.apply(ChannelEvent::TornDown);
            selection.run_effects(effects, self.feed.as_ref(), &mut self.notifications);
        }
    }

    pub fn selected(&self) -> Option<(NaiveDate, &str)> {
        self.selection
            .as_ref()
            .map(|s| (s.reconciler.date(), s.reconciler.subject_id()))
    }

    pub fn roster(&self) -> &[Student] {
        self.selection
            .as_ref()
            .map(|s| s.roster.as_slice())
            .unwrap_or(&[])
    }

    pub fn status_of(&self, student_id: &str) -> AttendanceStatus {
        self.selection
            .as_ref()
            .map(|s| s.reconciler.get(student_id))
            .unwrap_or_default()
    }

    pub fn draft(&self) -> BTreeMap<String, AttendanceStatus> {
        self.selection
            .as_ref()
            .map(|s| s.reconciler.snapshot())
            .unwrap_or_default()
    }

    pub fn counts(&self) -> AttendanceCounts {
        self.selection
            .as_ref()
            .map(|s| s.reconciler.counts())
            .unwrap_or_default()
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.selection
            .as_ref()
            .map(|s| s.reconciler.has_unsaved_changes())
            .unwrap_or(false)
    }

    pub fn channel_status(&self) -> Option<ChannelStatus> {
        self.selection.as_ref().map(|s| s.channel.status())
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.selection
            .as_ref()
            .map(|s| s.channel.attempts())
            .unwrap_or(0)
    }

    pub fn retry_pending(&self) -> bool {
        self.selection
            .as_ref()
            .map(|s| s.retry_timer.is_some())
            .unwrap_or(false)
    }

    /// Persistent banner shown once real-time retries are exhausted
    pub fn realtime_unavailable(&self) -> bool {
        self.channel_status() == Some(ChannelStatus::Error)
    }

    pub fn is_highlighted(&self, student_id: &str) -> bool {
        self.selection
            .as_ref()
            .map(|s| s.highlights.contains_key(student_id))
            .unwrap_or(false)
    }

    pub fn is_editable(&self) -> bool {
        self.selection
            .as_ref()
            .map(|s| self.service.is_editable(s.reconciler.date()))
            .unwrap_or(false)
    }

    pub fn load_error(&self) -> Option<&str> {
        self.load_error.as_deref()
    }

    pub fn take_notifications(&mut self) -> Vec<Notification> {
        self.notifications.drain()
    }
}

impl Drop for AttendanceScreen {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::attendance_service::ZeroPresentPolicy;
    use crate::domain::clock::ManualClock;
    use crate::domain::notifications::NotificationLevel;
    use crate::storage::test_utils::{FlakyAttendanceStorage, ScriptedChangeFeed, TestStorage};
    use crate::storage::AttendanceStorage;
    use shared::UserRole;
    use tokio::time::timeout;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 3).unwrap()
    }

    fn faculty() -> AuthUser {
        AuthUser {
            id: "f1".to_string(),
            email: "faculty@example.edu".to_string(),
            role: UserRole::Faculty,
            name: "Dr. Faculty".to_string(),
        }
    }

    struct Harness {
        env: TestStorage,
        feed: ScriptedChangeFeed,
        flaky: FlakyAttendanceStorage,
        screen: AttendanceScreen,
    }

    async fn harness(ids: &[&str]) -> Harness {
        let env = TestStorage::with_roster(ids).await;
        let feed = ScriptedChangeFeed::new();
        let flaky = FlakyAttendanceStorage::new(env.storage.clone());
        let service = AttendanceService::new(
            Arc::new(env.storage.clone()),
            Arc::new(flaky.clone()),
            Arc::new(ManualClock::new(today())),
            ZeroPresentPolicy::default(),
        );
        let screen = AttendanceScreen::new(
            service,
            Arc::new(feed.clone()),
            faculty(),
            ScreenSettings::default(),
        );
        Harness {
            env,
            feed,
            flaky,
            screen,
        }
    }

    async fn next(screen: &mut AttendanceScreen) -> ScreenEvent {
        screen.next_event().await.expect("screen went idle")
    }

    /// Pump until the channel reports `status`
    async fn pump_until_status(screen: &mut AttendanceScreen, status: ChannelStatus) {
        loop {
            if let ScreenEvent::ChannelStatusChanged(current) = next(screen).await {
                if current == status {
                    return;
                }
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_seed_overlays_existing_records() {
        let mut h = harness(&["A", "B"]).await;
        let records = vec![h.env.record(today(), "math", "A", AttendanceStatus::Present)];
        h.env
            .storage
            .replace_attendance(today(), "math", &records)
            .await
            .unwrap();

        h.screen.select(today(), "math").await.unwrap();

        let mut expected = BTreeMap::new();
        expected.insert("A".to_string(), AttendanceStatus::Present);
        expected.insert("B".to_string(), AttendanceStatus::Absent);
        assert_eq!(h.screen.draft(), expected);
        assert_eq!(h.screen.counts(), AttendanceCounts { present: 1, absent: 1 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_local_edit_and_remote_change_combine() {
        let mut h = harness(&["A", "B", "C"]).await;
        h.screen.select(today(), "math").await.unwrap();
        assert_eq!(
            next(&mut h.screen).await,
            ScreenEvent::ChannelStatusChanged(ChannelStatus::Connected)
        );

        h.screen.mark("A", AttendanceStatus::Present).unwrap();
        assert!(h.feed.push_change("B", today(), AttendanceStatus::Present));

        assert_eq!(
            next(&mut h.screen).await,
            ScreenEvent::RemoteChange {
                student_id: "B".to_string(),
                status: AttendanceStatus::Present
            }
        );
        assert_eq!(h.screen.counts(), AttendanceCounts { present: 2, absent: 1 });
        assert_eq!(h.screen.status_of("A"), AttendanceStatus::Present);
        assert!(h.screen.is_highlighted("B"));

        let notifications = h.screen.take_notifications();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].level, NotificationLevel::Info);
        assert_eq!(notifications[0].message, "Student B's attendance updated to present");
    }

    #[tokio::test(start_paused = true)]
    async fn test_highlight_clears_after_two_seconds() {
        let mut h = harness(&["A"]).await;
        h.screen.select(today(), "math").await.unwrap();
        next(&mut h.screen).await;

        h.feed.push_change("A", today(), AttendanceStatus::Present);
        next(&mut h.screen).await;
        let changed_at = Instant::now();

        assert_eq!(
            next(&mut h.screen).await,
            ScreenEvent::HighlightCleared {
                student_id: "A".to_string()
            }
        );
        assert!(Instant::now() - changed_at >= Duration::from_millis(2000));
        assert!(!h.screen.is_highlighted("A"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ignores_other_dates_and_malformed_payloads() {
        let mut h = harness(&["A"]).await;
        h.screen.select(today(), "math").await.unwrap();
        next(&mut h.screen).await;

        h.feed.push_change("A", today().succ_opt().unwrap(), AttendanceStatus::Present);
        assert_eq!(
            next(&mut h.screen).await,
            ScreenEvent::ChangeIgnored {
                student_id: "A".to_string()
            }
        );

        h.feed
            .push_latest(ChannelMessage::Change(serde_json::json!({ "student_id": "A" })));
        assert!(matches!(
            next(&mut h.screen).await,
            ScreenEvent::ChangeDropped { .. }
        ));

        // Subscription still delivers
        h.feed.push_change("A", today(), AttendanceStatus::Present);
        assert!(matches!(
            next(&mut h.screen).await,
            ScreenEvent::RemoteChange { .. }
        ));
        assert_eq!(h.screen.channel_status(), Some(ChannelStatus::Connected));
        assert_eq!(h.feed.subscription_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_back_off_then_recover() {
        let mut h = harness(&["A"]).await;
        h.feed.fail_next_handshakes(2);
        h.screen.select(today(), "math").await.unwrap();

        pump_until_status(&mut h.screen, ChannelStatus::Connected).await;

        assert_eq!(h.feed.subscription_count(), 3);
        let first_gap = h.feed.opened_at(1).unwrap() - h.feed.opened_at(0).unwrap();
        let second_gap = h.feed.opened_at(2).unwrap() - h.feed.opened_at(1).unwrap();
        assert!(first_gap >= Duration::from_millis(2000));
        assert!(second_gap >= Duration::from_millis(4000));
        assert_eq!(h.screen.reconnect_attempts(), 0);
        assert_eq!(h.feed.active_subscriptions(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_five_retries() {
        let mut h = harness(&["A"]).await;
        h.feed.fail_all_handshakes();
        h.screen.select(today(), "math").await.unwrap();

        pump_until_status(&mut h.screen, ChannelStatus::Error).await;

        // Initial handshake plus five retries, no sixth timer
        assert_eq!(h.feed.subscription_count(), 6);
        for n in 1..6 {
            let gap = h.feed.opened_at(n).unwrap() - h.feed.opened_at(n - 1).unwrap();
            assert!(gap >= Duration::from_millis(2000u64 << (n - 1)));
        }
        assert!(!h.screen.retry_pending());
        assert!(h.screen.realtime_unavailable());
        assert_eq!(h.screen.reconnect_attempts(), 5);

        let errors: Vec<Notification> = h
            .screen
            .take_notifications()
            .into_iter()
            .filter(|n| n.level == NotificationLevel::Error)
            .collect();
        assert_eq!(errors.len(), 1);

        // Nothing is left to wait for
        assert_eq!(h.screen.next_event().await, None);
        assert_eq!(h.feed.subscription_count(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_selection_change_isolates_old_subject() {
        let mut h = harness(&["A", "B"]).await;
        h.feed.fail_next_handshakes(1);
        h.screen.select(today(), "math").await.unwrap();
        assert_eq!(
            next(&mut h.screen).await,
            ScreenEvent::ChannelStatusChanged(ChannelStatus::Reconnecting)
        );
        assert!(h.screen.retry_pending());

        h.screen.select(today(), "physics").await.unwrap();
        assert!(!h.screen.retry_pending());
        assert_eq!(h.feed.subject_of(1).as_deref(), Some("physics"));
        assert_eq!(h.feed.active_subscriptions(), 1);
        next(&mut h.screen).await;

        // The math subscription is gone
        assert!(!h.feed.push(0, ChannelMessage::Change(serde_json::json!({
            "student_id": "A",
            "date": today(),
            "status": "present"
        }))));

        // The old retry timer never fires
        let waited = timeout(Duration::from_secs(60), h.screen.next_event()).await;
        assert!(waited.is_err());
        assert_eq!(h.feed.subscription_count(), 2);
        assert_eq!(h.screen.status_of("A"), AttendanceStatus::Absent);
        assert_eq!(h.screen.selected(), Some((today(), "physics")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_save_failure_keeps_draft() {
        let mut h = harness(&["A", "B"]).await;
        h.screen.select(today(), "math").await.unwrap();
        h.screen.mark("A", AttendanceStatus::Present).unwrap();
        let before = h.screen.draft();

        h.flaky.set_fail_saves(true);
        let err = h.screen.save().await.unwrap_err();
        assert!(err.to_string().contains("insert rejected by server"));
        assert_eq!(h.screen.draft(), before);
        assert!(h.screen.has_unsaved_changes());

        h.flaky.set_fail_saves(false);
        let response = h.screen.save().await.unwrap();
        assert_eq!(response.saved_count, 2);
        assert!(!h.screen.has_unsaved_changes());

        let levels: Vec<NotificationLevel> =
            h.screen.take_notifications().iter().map(|n| n.level).collect();
        assert_eq!(levels, vec![NotificationLevel::Error, NotificationLevel::Success]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_past_dates_are_read_only() {
        let mut h = harness(&["A"]).await;
        let yesterday = today().pred_opt().unwrap();
        h.screen.select(yesterday, "math").await.unwrap();

        assert!(!h.screen.is_editable());
        assert!(matches!(
            h.screen.mark("A", AttendanceStatus::Present),
            Err(ScreenError::Save(SaveError::ReadOnlyDate { .. }))
        ));
        assert!(matches!(
            h.screen.save().await,
            Err(ScreenError::Save(SaveError::ReadOnlyDate { .. }))
        ));
        assert_eq!(h.env.storage.record_count(yesterday, "math").await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_failure_is_surfaced_without_retry() {
        let mut h = harness(&["A"]).await;
        h.flaky.set_fail_fetches(true);

        assert!(matches!(
            h.screen.select(today(), "math").await,
            Err(ScreenError::Load(_))
        ));
        assert_eq!(h.screen.load_error(), Some("database unavailable"));
        assert!(h.screen.selected().is_none());
        assert_eq!(h.feed.active_subscriptions(), 0);
        assert_eq!(h.screen.next_event().await, None);
        assert!(matches!(
            h.screen.mark("A", AttendanceStatus::Present),
            Err(ScreenError::NoSelection)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_closes_subscription() {
        let h = harness(&["A"]).await;
        let feed = h.feed.clone();
        let mut screen = h.screen;
        screen.select(today(), "math").await.unwrap();
        assert_eq!(feed.active_subscriptions(), 1);

        drop(screen);
        assert_eq!(feed.active_subscriptions(), 0);
    }
}
