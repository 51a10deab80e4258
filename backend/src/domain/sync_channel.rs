//! # Sync Channel
//!
//! Connection state of one change-feed subscription, kept as a pure reducer.
//! The reducer never touches timers or handles itself: `apply` returns the
//! effects the owner must carry out, so every transition can be tested
//! without a runtime.
//!
//! ```text
//! Connecting ──Subscribed──▶ Connected
//!     │                          │
//!     └───────Failed─────────────┤
//!                                ▼
//!            attempts < max ? Reconnecting ──RetryTimerFired──▶ Connecting
//!                           : Error (terminal, failure reported once)
//! ```
//!
//! The retry delay is `base_delay × 2^attempts`, with `attempts` reset to
//! zero on every acknowledgment.

use std::fmt;
use std::time::Duration;
use tracing::{info, warn};

/// Notice shown once retries are exhausted
pub const REALTIME_UNAVAILABLE: &str =
    "Failed to establish real-time connection after multiple attempts";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelStatus {
    Connecting,
    Connected,
    Reconnecting,
    Error,
}

impl fmt::Display for ChannelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ChannelStatus::Connecting => "connecting",
            ChannelStatus::Connected => "connected",
            ChannelStatus::Reconnecting => "reconnecting",
            ChannelStatus::Error => "error",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// Handshake acknowledged
    Subscribed,
    /// Handshake rejected, channel error, timeout, close or hang-up
    Failed { reason: String },
    RetryTimerFired,
    /// Selection changed or the screen went away
    TornDown,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEffect {
    OpenChannel,
    CloseChannel,
    ScheduleRetry { attempt: u32, delay: Duration },
    CancelRetry,
    ReportFailure { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(2000),
        }
    }
}

impl RetryPolicy {
    /// Delay before the retry that follows `attempts` earlier retries
    pub fn delay_for(&self, attempts: u32) -> Duration {
        let factor = 1u32.checked_shl(attempts).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }
}

#[derive(Debug, Clone)]
pub struct SyncChannel {
    status: ChannelStatus,
    attempts: u32,
    policy: RetryPolicy,
    channel_open: bool,
    retry_pending: bool,
    failure_reported: bool,
    torn_down: bool,
}

impl SyncChannel {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            status: ChannelStatus::Connecting,
            attempts: 0,
            policy,
            channel_open: false,
            retry_pending: false,
            failure_reported: false,
            torn_down: false,
        }
    }

    pub fn status(&self) -> ChannelStatus {
        self.status
    }

    /// Retries started since the last acknowledgment
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Effects for the first handshake
    pub fn start(&mut self) -> Vec<ChannelEffect> {
        if self.torn_down || self.channel_open {
            return Vec::new();
        }
        self.status = ChannelStatus::Connecting;
        self.channel_open = true;
        vec![ChannelEffect::OpenChannel]
    }

    pub fn apply(&mut self, event: ChannelEvent) -> Vec<ChannelEffect> {
        if self.torn_down {
            return Vec::new();
        }

        match event {
            ChannelEvent::Subscribed => self.on_subscribed(),
            ChannelEvent::Failed { reason } => self.on_failed(&reason),
            ChannelEvent::RetryTimerFired => self.on_retry_timer(),
            ChannelEvent::TornDown => self.on_torn_down(),
        }
    }

    fn on_subscribed(&mut self) -> Vec<ChannelEffect> {
        if self.status != ChannelStatus::Connecting {
            return Vec::new();
        }
        info!("Subscription acknowledged after {} retries", self.attempts);
        self.status = ChannelStatus::Connected;
        self.attempts = 0;
        Vec::new()
    }

    fn on_failed(&mut self, reason: &str) -> Vec<ChannelEffect> {
        match self.status {
            ChannelStatus::Connecting | ChannelStatus::Connected => {}
            // A retry is already pending, or retries are exhausted
            ChannelStatus::Reconnecting | ChannelStatus::Error => return Vec::new(),
        }

        let mut effects = Vec::new();
        if self.channel_open {
            self.channel_open = false;
            effects.push(ChannelEffect::CloseChannel);
        }

        if self.attempts < self.policy.max_attempts {
            let delay = self.policy.delay_for(self.attempts);
            let attempt = self.attempts + 1;
            warn!(
                "Subscription failed ({}), scheduling reconnect {}/{} in {:?}",
                reason, attempt, self.policy.max_attempts, delay
            );
            self.status = ChannelStatus::Reconnecting;
            self.retry_pending = true;
            effects.push(ChannelEffect::ScheduleRetry { attempt, delay });
        } else {
            warn!(
                "Subscription failed ({}), giving up after {} retries",
                reason, self.attempts
            );
            self.status = ChannelStatus::Error;
            if !self.failure_reported {
                self.failure_reported = true;
                effects.push(ChannelEffect::ReportFailure {
                    message: REALTIME_UNAVAILABLE.to_string(),
                });
            }
        }
        effects
    }

    fn on_retry_timer(&mut self) -> Vec<ChannelEffect> {
        if self.status != ChannelStatus::Reconnecting {
            return Vec::new();
        }
        self.retry_pending = false;
        self.attempts += 1;
        self.status = ChannelStatus::Connecting;
        info!(
            "Reconnect attempt {}/{}",
            self.attempts, self.policy.max_attempts
        );

        let mut effects = Vec::new();
        if self.channel_open {
            effects.push(ChannelEffect::CloseChannel);
        }
        self.channel_open = true;
        effects.push(ChannelEffect::OpenChannel);
        effects
    }

    fn on_torn_down(&mut self) -> Vec<ChannelEffect> {
        self.torn_down = true;
        let mut effects = Vec::new();
        if self.retry_pending {
            self.retry_pending = false;
            effects.push(ChannelEffect::CancelRetry);
        }
        if self.channel_open {
            self.channel_open = false;
            effects.push(ChannelEffect::CloseChannel);
        }
        effects
    }
}
