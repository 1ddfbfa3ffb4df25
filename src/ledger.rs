//! XP and level accounting over a record store.

use crate::chart::{ChartRenderer, SvgBarChart};
use crate::config::LedgerConfig;
use crate::error::{LedgerError, Result};
use crate::events::EventBus;
use crate::storage::RecordStore;
use crate::types::{
    key_belongs_to_guild, IncrementOutcome, LeaderboardEntry, LevelSnapshot, RecordKey,
    UserGuildRecord, KEY_SEPARATOR,
};
use serde_json::Value;
use std::sync::Arc;

/// Operation names attached to published error events.
pub mod operation {
    pub const INCREMENT_XP: &str = "incrementXP";
    pub const GET_USER_LEVEL: &str = "getUserLevel";
    pub const GET_RECORD: &str = "getRecord";
    pub const SET_LEVEL: &str = "setLevel";
    pub const SET_XP: &str = "setXP";
    pub const REDUCE_LEVELS: &str = "reduceLevels";
    pub const REDUCE_XP: &str = "reduceXP";
    pub const DELETE_USER_DATA: &str = "deleteUserData";
    pub const DELETE_ALL_DATA: &str = "deleteAllData";
    pub const GET_TOP_USERS: &str = "getTopUsers";
    pub const GENERATE_XP_CHART: &str = "generateXPChart";
}

/// Per-user, per-guild XP ledger.
///
/// Every operation validates its arguments first and returns
/// [`LedgerError::InvalidArgument`] without touching the store. Failures
/// after that point are returned to the caller and also published on the
/// [`EventBus`] as `LedgerEvent::Error`, tagged with the operation name.
///
/// Record updates go through [`RecordStore::update`], so concurrent calls
/// for the same user and guild never lose an increment.
pub struct XpLedger {
    store: Arc<dyn RecordStore>,
    config: LedgerConfig,
    events: EventBus,
    renderer: Box<dyn ChartRenderer>,
}

impl XpLedger {
    /// Create a ledger rendering charts with the default [`SvgBarChart`].
    pub fn new(store: Arc<dyn RecordStore>, config: LedgerConfig) -> Result<Self> {
        Self::with_renderer(store, config, Box::new(SvgBarChart::default()))
    }

    /// Create a ledger with a custom chart renderer.
    pub fn with_renderer(
        store: Arc<dyn RecordStore>,
        config: LedgerConfig,
        renderer: Box<dyn ChartRenderer>,
    ) -> Result<Self> {
        config.validate()?;
        let events = EventBus::with_buffer_size(config.event_buffer_size);
        Ok(Self {
            store,
            config,
            events,
            renderer,
        })
    }

    /// Configuration the ledger was built with.
    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Event bus carrying level-up and error events.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    // --- XP accrual ---

    /// Count one message from `user_id` in `guild_id`.
    ///
    /// The first call for a pair creates its record with the configured
    /// starting XP and level. Later calls add one XP; when XP reaches the
    /// level-up threshold it resets to zero, the level goes up by one, and a
    /// level-up event carrying `channel_id` is published.
    pub fn increment_xp(
        &self,
        user_id: &str,
        guild_id: &str,
        channel_id: &str,
    ) -> Result<IncrementOutcome> {
        require_id("user id", user_id)?;
        require_id("guild id", guild_id)?;
        require_present("channel id", channel_id)?;

        let outcome = self.report(
            operation::INCREMENT_XP,
            self.apply_increment(user_id, guild_id),
        )?;

        match outcome {
            IncrementOutcome::Created => {
                tracing::debug!(user_id, guild_id, "created level record");
            }
            IncrementOutcome::LeveledUp {
                new_level,
                previous_level,
            } => {
                tracing::info!(user_id, guild_id, new_level, previous_level, "user leveled up");
                self.events.publish_level_up(
                    new_level,
                    previous_level,
                    user_id,
                    guild_id,
                    channel_id,
                );
            }
            IncrementOutcome::Accumulated { .. } => {}
        }

        Ok(outcome)
    }

    fn apply_increment(&self, user_id: &str, guild_id: &str) -> Result<IncrementOutcome> {
        let key = RecordKey::new(user_id, guild_id);
        let threshold = self.config.level_up_xp;
        let mut outcome = None;

        self.store.update(key.as_str(), &mut |current| {
            let record = match current {
                None => {
                    outcome = Some(IncrementOutcome::Created);
                    UserGuildRecord {
                        xp: self.config.starting_xp,
                        level: self.config.starting_level,
                        xp_over_time: 1,
                        user_id: user_id.to_string(),
                    }
                }
                Some(value) => {
                    let mut record = self.decode(&key, value, Some(user_id))?;
                    record.xp = record.xp.saturating_add(1);
                    record.xp_over_time = record.xp_over_time.saturating_add(1);

                    if record.xp >= threshold {
                        let previous_level = record.level;
                        record.xp = 0;
                        record.level = record.level.saturating_add(1);
                        outcome = Some(IncrementOutcome::LeveledUp {
                            new_level: record.level,
                            previous_level,
                        });
                    } else {
                        outcome = Some(IncrementOutcome::Accumulated { xp: record.xp });
                    }
                    record
                }
            };
            encode(&record).map(Some)
        })?;

        outcome.ok_or_else(|| LedgerError::Corruption(format!("increment of {} wrote nothing", key)))
    }

    // --- Reads ---

    /// Current level and XP, or `None` if the user has no record in the guild.
    pub fn get_user_level(&self, user_id: &str, guild_id: &str) -> Result<Option<LevelSnapshot>> {
        require_id("user id", user_id)?;
        require_id("guild id", guild_id)?;

        let record = self.report(
            operation::GET_USER_LEVEL,
            self.load(user_id, guild_id),
        )?;
        Ok(record.map(|r| r.snapshot()))
    }

    /// Full stored record, including lifetime XP.
    pub fn get_record(&self, user_id: &str, guild_id: &str) -> Result<Option<UserGuildRecord>> {
        require_id("user id", user_id)?;
        require_id("guild id", guild_id)?;

        self.report(operation::GET_RECORD, self.load(user_id, guild_id))
    }

    fn load(&self, user_id: &str, guild_id: &str) -> Result<Option<UserGuildRecord>> {
        let key = RecordKey::new(user_id, guild_id);
        self.store
            .get(key.as_str())?
            .map(|value| self.decode(&key, &value, Some(user_id)))
            .transpose()
    }

    // --- Overrides ---

    /// Overwrite the user's level. `level` must be positive.
    pub fn set_level(&self, level: u64, user_id: &str, guild_id: &str) -> Result<LevelSnapshot> {
        if level == 0 {
            return Err(LedgerError::InvalidArgument(
                "level must be greater than 0".into(),
            ));
        }
        require_id("user id", user_id)?;
        require_id("guild id", guild_id)?;

        self.report(
            operation::SET_LEVEL,
            self.modify(user_id, guild_id, |record| record.level = level),
        )
    }

    /// Overwrite the user's XP. `xp` may not exceed the level-up threshold.
    pub fn set_xp(&self, xp: u64, user_id: &str, guild_id: &str) -> Result<LevelSnapshot> {
        if xp > self.config.level_up_xp {
            return Err(LedgerError::InvalidArgument(format!(
                "xp cannot be more than {}",
                self.config.level_up_xp
            )));
        }
        require_id("user id", user_id)?;
        require_id("guild id", guild_id)?;

        self.report(
            operation::SET_XP,
            self.modify(user_id, guild_id, |record| record.xp = xp),
        )
    }

    // --- Decrements ---

    /// Take `amount` levels away, along with `amount * levelPenaltyXP`
    /// lifetime XP. Both floor at zero.
    pub fn reduce_levels(&self, user_id: &str, guild_id: &str, amount: u64) -> Result<LevelSnapshot> {
        require_id("user id", user_id)?;
        require_id("guild id", guild_id)?;
        require_amount(amount)?;

        let penalty = amount.saturating_mul(self.config.level_penalty_xp);
        self.report(
            operation::REDUCE_LEVELS,
            self.modify(user_id, guild_id, |record| {
                record.level = record.level.saturating_sub(amount);
                record.xp_over_time = record.xp_over_time.saturating_sub(penalty);
            }),
        )
    }

    /// Take `amount` XP away from both current and lifetime XP. Both floor
    /// at zero.
    pub fn reduce_xp(&self, user_id: &str, guild_id: &str, amount: u64) -> Result<LevelSnapshot> {
        require_id("user id", user_id)?;
        require_id("guild id", guild_id)?;
        require_amount(amount)?;

        self.report(
            operation::REDUCE_XP,
            self.modify(user_id, guild_id, |record| {
                record.xp = record.xp.saturating_sub(amount);
                record.xp_over_time = record.xp_over_time.saturating_sub(amount);
            }),
        )
    }

    /// Atomically apply `change` to an existing record.
    fn modify<F>(&self, user_id: &str, guild_id: &str, mut change: F) -> Result<LevelSnapshot>
    where
        F: FnMut(&mut UserGuildRecord),
    {
        let key = RecordKey::new(user_id, guild_id);
        let mut snapshot = None;

        self.store.update(key.as_str(), &mut |current| {
            let Some(value) = current else {
                return Err(LedgerError::RecordNotFound {
                    user_id: user_id.to_string(),
                    guild_id: guild_id.to_string(),
                });
            };
            let mut record = self.decode(&key, value, Some(user_id))?;
            change(&mut record);
            snapshot = Some(record.snapshot());
            encode(&record).map(Some)
        })?;

        snapshot.ok_or_else(|| LedgerError::Corruption(format!("update of {} wrote nothing", key)))
    }

    // --- Deletion ---

    /// Remove the user's record in the guild. Returns whether one existed.
    pub fn delete_user_data(&self, user_id: &str, guild_id: &str) -> Result<bool> {
        require_id("user id", user_id)?;
        require_id("guild id", guild_id)?;

        let key = RecordKey::new(user_id, guild_id);
        let removed = self.report(operation::DELETE_USER_DATA, self.store.delete(key.as_str()))?;
        if removed {
            tracing::debug!(user_id, guild_id, "deleted level record");
        }
        Ok(removed)
    }

    /// Wipe every record in the store, across all guilds.
    pub fn delete_all_data(&self) -> Result<()> {
        self.report(operation::DELETE_ALL_DATA, self.store.clear())?;
        tracing::info!("cleared all level records");
        Ok(())
    }

    // --- Leaderboards ---

    /// Up to `count` users of `guild_id`, highest lifetime XP first.
    ///
    /// Ties are ordered by level (highest first), then by user id.
    pub fn get_top_users(&self, guild_id: &str, count: usize) -> Result<Vec<LeaderboardEntry>> {
        require_id("guild id", guild_id)?;
        require_count(count)?;

        self.report(operation::GET_TOP_USERS, self.leaderboard(guild_id, count))
    }

    fn leaderboard(&self, guild_id: &str, count: usize) -> Result<Vec<LeaderboardEntry>> {
        let mut entries: Vec<LeaderboardEntry> = Vec::new();

        for (key, value) in self.store.all()? {
            if !key_belongs_to_guild(&key, guild_id) {
                continue;
            }
            let user_hint = key
                .strip_suffix(guild_id)
                .and_then(|rest| rest.strip_suffix(KEY_SEPARATOR));
            match self.decode(&key, &value, user_hint) {
                Ok(record) => entries.push(record.leaderboard_entry()),
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "skipping unreadable record in leaderboard");
                }
            }
        }

        entries.sort_by(|a, b| {
            b.xp_over_time
                .cmp(&a.xp_over_time)
                .then_with(|| b.level.cmp(&a.level))
                .then_with(|| a.user_id.cmp(&b.user_id))
        });
        entries.truncate(count);
        Ok(entries)
    }

    /// Render the guild's top `count` users with the configured renderer.
    pub fn generate_xp_chart(&self, guild_id: &str, count: usize) -> Result<Vec<u8>> {
        require_id("guild id", guild_id)?;
        require_count(count)?;

        let rendered = self
            .leaderboard(guild_id, count)
            .and_then(|entries| self.renderer.render(guild_id, &entries));
        self.report(operation::GENERATE_XP_CHART, rendered)
    }

    // --- Helpers ---

    /// Decode a stored record. A missing `level` reads as the starting level
    /// and a missing `userId` is filled from `user_hint`.
    fn decode(
        &self,
        key: &(impl std::fmt::Display + ?Sized),
        value: &Value,
        user_hint: Option<&str>,
    ) -> Result<UserGuildRecord> {
        let Value::Object(map) = value else {
            return Err(LedgerError::Corruption(format!(
                "record {} is not an object",
                key
            )));
        };

        let mut map = map.clone();
        map.entry("level")
            .or_insert_with(|| Value::from(self.config.starting_level));

        let mut record: UserGuildRecord = serde_json::from_value(Value::Object(map))
            .map_err(|e| LedgerError::Corruption(format!("record {}: {}", key, e)))?;
        if record.user_id.is_empty() {
            if let Some(user_id) = user_hint {
                record.user_id = user_id.to_string();
            }
        }
        Ok(record)
    }

    /// Publish failures that got past argument validation.
    fn report<T>(&self, operation: &str, result: Result<T>) -> Result<T> {
        if let Err(ref e) = result {
            if !e.is_validation() {
                tracing::warn!(operation, error = %e, "ledger operation failed");
                self.events.publish_error(Some(operation), e);
            }
        }
        result
    }
}

fn encode(record: &UserGuildRecord) -> Result<Value> {
    serde_json::to_value(record).map_err(|e| LedgerError::Serialization(e.to_string()))
}

fn require_present(what: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(LedgerError::InvalidArgument(format!(
            "a valid {} must be provided",
            what
        )));
    }
    Ok(())
}

/// User and guild ids make up the record key, so neither may contain the
/// key separator: `("a-b", "c")` and `("a", "b-c")` would share a record.
fn require_id(what: &str, value: &str) -> Result<()> {
    require_present(what, value)?;
    if value.contains(KEY_SEPARATOR) {
        return Err(LedgerError::InvalidArgument(format!(
            "{} cannot contain '{}'",
            what, KEY_SEPARATOR
        )));
    }
    Ok(())
}

fn require_amount(amount: u64) -> Result<()> {
    if amount == 0 {
        return Err(LedgerError::InvalidArgument(
            "amount must be greater than 0".into(),
        ));
    }
    Ok(())
}

fn require_count(count: usize) -> Result<()> {
    if count == 0 {
        return Err(LedgerError::InvalidArgument(
            "amount of users must be greater than 0".into(),
        ));
    }
    Ok(())
}
