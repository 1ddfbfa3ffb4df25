//! Ledger configuration.

use crate::error::{LedgerError, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// XP given to a user on their first recorded interaction.
pub const DEFAULT_STARTING_XP: u64 = 1;

/// Level a fresh record starts at.
pub const DEFAULT_STARTING_LEVEL: u64 = 1;

/// XP needed to gain a level.
pub const DEFAULT_LEVEL_UP_XP: u64 = 100;

/// Lifetime XP removed per level taken away by `reduce_levels`.
pub const DEFAULT_LEVEL_PENALTY_XP: u64 = 100;

/// Per-subscriber event buffer.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 256;

/// Ledger configuration.
///
/// Deserializes from the camelCase JSON option names (`startingXP`,
/// `startingLevel`, `levelUpXP`, ...); any missing field takes its default.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LedgerConfig {
    /// XP a newly created record starts with.
    #[serde(rename = "startingXP")]
    pub starting_xp: u64,

    /// Level a newly created record starts at.
    pub starting_level: u64,

    /// XP threshold for a level-up.
    #[serde(rename = "levelUpXP")]
    pub level_up_xp: u64,

    /// Lifetime XP subtracted for each level removed.
    #[serde(rename = "levelPenaltyXP")]
    pub level_penalty_xp: u64,

    /// Buffered events per subscriber before it is dropped.
    pub event_buffer_size: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            starting_xp: DEFAULT_STARTING_XP,
            starting_level: DEFAULT_STARTING_LEVEL,
            level_up_xp: DEFAULT_LEVEL_UP_XP,
            level_penalty_xp: DEFAULT_LEVEL_PENALTY_XP,
            event_buffer_size: DEFAULT_EVENT_BUFFER_SIZE,
        }
    }
}

impl LedgerConfig {
    /// Parse and validate a JSON config document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: LedgerConfig = serde_json::from_str(json)
            .map_err(|e| LedgerError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        if self.level_up_xp == 0 {
            return Err(LedgerError::InvalidConfig(
                "levelUpXP must be greater than 0".into(),
            ));
        }
        if self.starting_xp > self.level_up_xp {
            return Err(LedgerError::InvalidConfig(format!(
                "startingXP ({}) cannot be more than levelUpXP ({})",
                self.starting_xp, self.level_up_xp
            )));
        }
        if self.event_buffer_size == 0 {
            return Err(LedgerError::InvalidConfig(
                "eventBufferSize must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}
