//! Event and subscription types.

use crate::config::DEFAULT_EVENT_BUFFER_SIZE;
use serde::{Deserialize, Serialize};

/// Configuration for a subscription.
#[derive(Clone, Debug)]
pub struct SubscriptionConfig {
    /// Max buffered events before dropping the subscriber.
    pub buffer_size: usize,

    /// Which events to deliver.
    pub filter: EventFilter,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_EVENT_BUFFER_SIZE,
            filter: EventFilter::all(),
        }
    }
}

/// Filter criteria for subscriptions.
#[derive(Clone, Debug, Default)]
pub struct EventFilter {
    /// Deliver level-up notifications.
    pub include_level_ups: bool,

    /// Deliver error reports.
    pub include_errors: bool,

    /// Only deliver level-ups for this guild (None = every guild).
    pub guild_id: Option<String>,
}

impl EventFilter {
    /// Level-ups only.
    pub fn level_ups() -> Self {
        Self {
            include_level_ups: true,
            ..Default::default()
        }
    }

    /// Level-ups of one guild only.
    pub fn guild(guild_id: impl Into<String>) -> Self {
        Self {
            include_level_ups: true,
            guild_id: Some(guild_id.into()),
            ..Default::default()
        }
    }

    /// Errors only.
    pub fn errors() -> Self {
        Self {
            include_errors: true,
            ..Default::default()
        }
    }

    /// Everything.
    pub fn all() -> Self {
        Self {
            include_level_ups: true,
            include_errors: true,
            guild_id: None,
        }
    }

    pub(crate) fn matches(&self, event: &LedgerEvent) -> bool {
        match event {
            LedgerEvent::LevelUp { guild_id, .. } => {
                self.include_level_ups
                    && self.guild_id.as_deref().map_or(true, |g| g == guild_id)
            }
            LedgerEvent::Error { .. } => self.include_errors,
            LedgerEvent::Dropped { .. } => true,
        }
    }
}

/// Events published by the ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    /// A user gained a level.
    LevelUp {
        new_level: u64,
        previous_level: u64,
        user_id: String,
        guild_id: String,
        /// Channel the triggering message came from, for the host's reply.
        channel_id: String,
    },

    /// An operation failed after its arguments were accepted.
    Error {
        /// Name of the failing operation, if known.
        operation: Option<String>,
        message: String,
    },

    /// This subscription was dropped; no further events follow.
    Dropped { reason: DropReason },
}

/// Why a subscription was dropped.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Send buffer overflowed (slow consumer).
    BufferOverflow,
    /// Explicitly unsubscribed.
    Unsubscribed,
}

/// Unique identifier for a subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Receiving end of a subscription.
pub struct EventHandle {
    pub id: SubscriptionId,
    pub receiver: crossbeam_channel::Receiver<LedgerEvent>,
}

impl EventHandle {
    /// Receive the next event (blocking).
    pub fn recv(&self) -> Result<LedgerEvent, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> Result<LedgerEvent, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> Result<LedgerEvent, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Drain everything currently buffered.
    pub fn drain(&self) -> Vec<LedgerEvent> {
        self.receiver.try_iter().collect()
    }
}
