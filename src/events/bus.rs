//! Event bus broadcasting ledger events to subscribers.

use crossbeam_channel::{bounded, Sender};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use super::types::{DropReason, EventHandle, LedgerEvent, SubscriptionConfig, SubscriptionId};

/// Internal subscription state.
struct Subscription {
    config: SubscriptionConfig,
    sender: Sender<LedgerEvent>,
}

impl Subscription {
    /// Try to send an event. Returns false if the buffer is full or the
    /// receiver is gone (subscriber will be dropped).
    fn try_send(&self, event: LedgerEvent) -> bool {
        self.sender.try_send(event).is_ok()
    }
}

/// Manages subscriptions and broadcasts events.
pub struct EventBus {
    /// Active subscriptions by ID.
    subscriptions: RwLock<HashMap<SubscriptionId, Subscription>>,
    /// Counter for generating subscription IDs.
    next_id: AtomicU64,
    /// Buffer size used by [`EventBus::subscribe_all`].
    default_buffer_size: usize,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_buffer_size(crate::config::DEFAULT_EVENT_BUFFER_SIZE)
    }

    pub fn with_buffer_size(default_buffer_size: usize) -> Self {
        Self {
            subscriptions: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            default_buffer_size: default_buffer_size.max(1),
        }
    }

    /// Create a new subscription.
    pub fn subscribe(&self, config: SubscriptionConfig) -> EventHandle {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (sender, receiver) = bounded(config.buffer_size.max(1));

        self.subscriptions
            .write()
            .insert(id, Subscription { config, sender });

        EventHandle { id, receiver }
    }

    /// Subscribe to every event with the bus's default buffer size.
    pub fn subscribe_all(&self) -> EventHandle {
        self.subscribe(SubscriptionConfig {
            buffer_size: self.default_buffer_size,
            ..Default::default()
        })
    }

    /// Unsubscribe and clean up.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        if let Some(sub) = self.subscriptions.write().remove(&id) {
            let _ = sub.sender.try_send(LedgerEvent::Dropped {
                reason: DropReason::Unsubscribed,
            });
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscriptions.read().len()
    }

    /// Broadcast a level-up.
    pub fn publish_level_up(
        &self,
        new_level: u64,
        previous_level: u64,
        user_id: &str,
        guild_id: &str,
        channel_id: &str,
    ) {
        self.publish(LedgerEvent::LevelUp {
            new_level,
            previous_level,
            user_id: user_id.to_string(),
            guild_id: guild_id.to_string(),
            channel_id: channel_id.to_string(),
        });
    }

    /// Broadcast an operation failure.
    pub fn publish_error(&self, operation: Option<&str>, error: &dyn std::error::Error) {
        self.publish(LedgerEvent::Error {
            operation: operation.map(str::to_string),
            message: error.to_string(),
        });
    }

    /// Deliver `event` to every matching subscriber. Drops subscribers that
    /// fail to receive.
    pub fn publish(&self, event: LedgerEvent) {
        let mut to_remove = Vec::new();

        {
            let subs = self.subscriptions.read();
            for (id, sub) in subs.iter() {
                if sub.config.filter.matches(&event) && !sub.try_send(event.clone()) {
                    to_remove.push(*id);
                }
            }
        }

        if !to_remove.is_empty() {
            let mut subs = self.subscriptions.write();
            for id in to_remove {
                if let Some(sub) = subs.remove(&id) {
                    tracing::warn!(subscription = id.0, "dropping slow event subscriber");
                    let _ = sub.sender.try_send(LedgerEvent::Dropped {
                        reason: DropReason::BufferOverflow,
                    });
                }
            }
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LedgerError;
    use crate::events::EventFilter;
    use std::time::Duration;

    #[test]
    fn test_subscribe_unsubscribe() {
        let bus = EventBus::new();

        let handle = bus.subscribe(SubscriptionConfig::default());
        assert_eq!(bus.subscriber_count(), 1);

        bus.unsubscribe(handle.id);
        assert_eq!(bus.subscriber_count(), 0);
        assert_eq!(
            handle.recv_timeout(Duration::from_millis(100)).unwrap(),
            LedgerEvent::Dropped {
                reason: DropReason::Unsubscribed
            }
        );
    }

    #[test]
    fn test_publish_to_matching() {
        let bus = EventBus::new();
        let levels = bus.subscribe(SubscriptionConfig {
            filter: EventFilter::level_ups(),
            ..Default::default()
        });
        let errors = bus.subscribe(SubscriptionConfig {
            filter: EventFilter::errors(),
            ..Default::default()
        });

        bus.publish_level_up(3, 2, "u1", "g1", "c1");
        bus.publish_error(Some("setXP"), &LedgerError::Locked);

        match levels.recv_timeout(Duration::from_millis(100)).unwrap() {
            LedgerEvent::LevelUp {
                new_level,
                previous_level,
                ..
            } => {
                assert_eq!((new_level, previous_level), (3, 2));
            }
            other => panic!("Expected LevelUp event, got {:?}", other),
        }
        assert!(levels.try_recv().is_err());

        match errors.recv_timeout(Duration::from_millis(100)).unwrap() {
            LedgerEvent::Error { operation, message } => {
                assert_eq!(operation.as_deref(), Some("setXP"));
                assert!(message.contains("locked"));
            }
            other => panic!("Expected Error event, got {:?}", other),
        }
    }

    #[test]
    fn test_drop_slow_subscriber() {
        let bus = EventBus::new();
        let _handle = bus.subscribe(SubscriptionConfig {
            buffer_size: 2,
            filter: EventFilter::all(),
        });

        for level in 0..10 {
            bus.publish_level_up(level + 1, level, "u1", "g1", "c1");
        }

        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_disconnected_receiver_is_pruned() {
        let bus = EventBus::new();
        let handle = bus.subscribe_all();
        drop(handle);

        bus.publish_level_up(2, 1, "u1", "g1", "c1");
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::default();
        bus.publish_error(None, &LedgerError::NotInitialized);
        assert_eq!(bus.subscriber_count(), 0);
    }
}
