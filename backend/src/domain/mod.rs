//! # Domain Module
//!
//! Business logic of the attendance portal. Services receive their storage
//! through the traits in [`crate::storage`] and never reach a backend
//! directly.
//!
//! ## Mark-attendance core
//!
//! - **attendance_store**: the per-session draft of statuses
//! - **sync_channel**: reconnect and backoff reducer for the change feed
//! - **reconciliation**: precedence between stored records, clicks and pushes
//! - **attendance_screen**: ties the above to the roster, timers and Save
//!
//! ## Services
//!
//! - **attendance_service**: fetch, save, editability, per-day stats
//! - **roster_service**: student and subject management
//! - **summary**: attendance percentages
//! - **auth_service**: login and the current user
//! - **request_service**: requests to the administrators

pub mod attendance_screen;
pub mod attendance_service;
pub mod attendance_store;
pub mod auth_service;
pub mod clock;
pub mod notifications;
pub mod reconciliation;
pub mod request_service;
pub mod roster_service;
pub mod summary;
pub mod sync_channel;

pub use attendance_screen::{AttendanceScreen, ScreenError, ScreenEvent, ScreenSettings};
pub use attendance_service::{AttendanceService, SaveError, ZeroPresentPolicy};
pub use attendance_store::AttendanceStore;
pub use auth_service::{AccountConfig, AuthService, CURRENT_USER_KEY};
pub use clock::{Clock, ManualClock, SystemClock};
pub use notifications::{Notification, NotificationLevel};
pub use reconciliation::{AttendanceCounts, ConflictPolicy, Reconciler, RemoteOutcome};
pub use request_service::{
    LoggingDelivery, OutgoingMessage, RequestDelivery, RequestError, RequestService, RequestsConfig,
};
pub use roster_service::{RosterError, RosterService};
pub use summary::SummaryService;
pub use sync_channel::{ChannelEffect, ChannelEvent, ChannelStatus, RetryPolicy, SyncChannel};
