//! # XP Ledger
//!
//! Per-user, per-guild experience and level bookkeeping for chat bots.
//!
//! ## Core Concepts
//!
//! - **Records**: one `{XP, level, XPoverTime, userId}` entry per user and
//!   guild, stored under the key `"{user}-{guild}"`
//! - **Stores**: any [`RecordStore`]; [`JsonFileStore`] keeps everything in
//!   one flat JSON file
//! - **Events**: level-ups and operation failures, delivered through the
//!   ledger's [`EventBus`]
//! - **Leaderboards**: guild rankings by lifetime XP, optionally rendered
//!   as a chart
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use xpledger::{JsonFileStore, JsonStoreConfig, LedgerConfig, XpLedger};
//!
//! let store = JsonFileStore::open_or_create(JsonStoreConfig::default())?;
//! let ledger = XpLedger::new(Arc::new(store), LedgerConfig::default())?;
//! let events = ledger.events().subscribe_all();
//!
//! // On every chat message
//! ledger.increment_xp("214871", "900312", "553019")?;
//!
//! // Leaderboard
//! let top = ledger.get_top_users("900312", 10)?;
//! ```

pub mod chart;
pub mod config;
pub mod error;
pub mod events;
pub mod ledger;
pub mod storage;
pub mod types;

// Re-exports
pub use chart::{ChartRenderer, SvgBarChart};
pub use config::LedgerConfig;
pub use error::{LedgerError, Result};
pub use events::{
    DropReason, EventBus, EventFilter, EventHandle, LedgerEvent, SubscriptionConfig,
    SubscriptionId,
};
pub use ledger::XpLedger;
pub use storage::{JsonFileStore, JsonStoreConfig, MemoryStore, RecordStore};
pub use types::*;
