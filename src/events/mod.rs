//! Event channel between the ledger and its host.
//!
//! The ledger publishes two kinds of events:
//! - Level-ups, fired by `increment_xp` when a user crosses the threshold
//! - Errors, fired whenever an operation fails after argument validation
//!
//! Each subscriber gets its own bounded buffer. A subscriber that lets its
//! buffer fill up is dropped on the next publish.
//!
//! # Example
//!
//! ```ignore
//! let handle = ledger.events().subscribe(SubscriptionConfig {
//!     filter: EventFilter::level_ups(),
//!     ..Default::default()
//! });
//!
//! ledger.increment_xp("u1", "g1", "c1")?;
//!
//! while let Ok(event) = handle.try_recv() {
//!     if let LedgerEvent::LevelUp { new_level, user_id, .. } = event {
//!         println!("{} reached level {}", user_id, new_level);
//!     }
//! }
//! ```

mod bus;
mod types;

pub use bus::EventBus;
pub use types::{
    DropReason, EventFilter, EventHandle, LedgerEvent, SubscriptionConfig, SubscriptionId,
};
