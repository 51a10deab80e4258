//! # Attendance Change Stream
//!
//! Server-sent events over the change feed of one subject. The first event
//! is the subscription status; after that each saved record arrives as a
//! `change` event carrying the record JSON. Closing the connection drops the
//! subscription.

use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{self, Stream};
use serde::Deserialize;
use std::convert::Infallible;
use tracing::{debug, info};

use crate::storage::{BroadcastChangeFeed, ChangeFeed, ChannelHandle, ChannelMessage};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ChangesQuery {
    pub subject_id: String,
}

fn to_event(message: ChannelMessage) -> Event {
    match message {
        ChannelMessage::Status(status) => Event::default().event("status").data(status.to_string()),
        ChannelMessage::Change(payload) => Event::default().event("change").data(payload.to_string()),
    }
}

/// Subscription owned by one SSE response; unsubscribes when the client
/// goes away and the stream is dropped
struct Subscription {
    feed: BroadcastChangeFeed,
    handle: Option<ChannelHandle>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            debug!("Client left {}", handle.name());
            self.feed.unsubscribe(handle);
        }
    }
}

fn change_stream(subscription: Subscription) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::unfold(subscription, |mut subscription| async move {
        let handle = subscription.handle.as_mut()?;
        match handle.recv().await {
            Some(message) => Some((Ok(to_event(message)), subscription)),
            None => {
                debug!("Channel {} closed by the feed", handle.name());
                None
            }
        }
    })
}

pub async fn stream_attendance_changes(
    State(state): State<AppState>,
    Query(query): Query<ChangesQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("GET /api/attendance/changes - subject: {}", query.subject_id);

    let handle = state.change_feed.subscribe(&query.subject_id);
    let subscription = Subscription {
        feed: state.change_feed.clone(),
        handle: Some(handle),
    };
    Sse::new(change_stream(subscription)).keep_alive(KeepAlive::default())
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use axum::http::StatusCode;
    use futures::StreamExt;
    use shared::{AttendanceRecord, AttendanceStatus};

    async fn next_chunk(stream: &mut axum::body::BodyDataStream) -> String {
        let bytes = stream.next().await.unwrap().unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_stream_reports_status_then_changes() {
        let (router, state) = test_app().await;

        let response = send(&router, empty_request("GET", "/api/attendance/changes?subject_id=2")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["content-type"].to_str().unwrap(),
            "text/event-stream"
        );
        let mut body = response.into_body().into_data_stream();

        let first = next_chunk(&mut body).await;
        assert!(first.contains("event: status"));
        assert!(first.contains("data: SUBSCRIBED"));

        let record = AttendanceRecord {
            id: AttendanceRecord::generate_id(today(), "3", "2"),
            date: today(),
            student_id: "3".to_string(),
            subject_id: "2".to_string(),
            status: AttendanceStatus::Present,
            marked_by_id: "1".to_string(),
            marked_at: chrono::Utc::now(),
        };
        // Other subjects are filtered out by the feed
        let other = AttendanceRecord {
            subject_id: "4".to_string(),
            ..record.clone()
        };
        assert_eq!(state.change_feed.publish(&other), 0);
        assert_eq!(state.change_feed.publish(&record), 1);

        let second = next_chunk(&mut body).await;
        assert!(second.contains("event: change"));
        assert!(second.contains("\"student_id\":\"3\""));
        assert!(second.contains("\"status\":\"present\""));
        assert_eq!(state.change_feed.subscriber_count(), 1);

        drop(body);
        assert_eq!(state.change_feed.subscriber_count(), 0);
    }
}
