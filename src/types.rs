//! Core types for the XP ledger.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator between the user and guild halves of a composite key.
pub const KEY_SEPARATOR: char = '-';

/// Composite key identifying one (user, guild) record: `"{user}-{guild}"`.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordKey(String);

impl RecordKey {
    /// Neither id may contain [`KEY_SEPARATOR`]; the ledger rejects such ids
    /// before a key is built.
    pub fn new(user_id: &str, guild_id: &str) -> Self {
        RecordKey(format!("{}{}{}", user_id, KEY_SEPARATOR, guild_id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when this key was built for `guild_id`.
    ///
    /// Matches on the `-{guild}` suffix rather than any substring, so guild
    /// `"12"` does not pick up records of guild `"123"` or of a user whose id
    /// happens to contain `"12"`.
    pub fn belongs_to_guild(&self, guild_id: &str) -> bool {
        key_belongs_to_guild(&self.0, guild_id)
    }
}

/// Suffix test shared by [`RecordKey::belongs_to_guild`] and raw store scans.
///
/// The user part before the suffix must be non-empty and free of the
/// separator, so an ambiguous key like `"a-b-c"` belongs to no guild.
pub fn key_belongs_to_guild(key: &str, guild_id: &str) -> bool {
    key.strip_suffix(guild_id)
        .and_then(|rest| rest.strip_suffix(KEY_SEPARATOR))
        .map(|user| !user.is_empty() && !user.contains(KEY_SEPARATOR))
        .unwrap_or(false)
}

impl fmt::Debug for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordKey({})", self.0)
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RecordKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A single user's standing in one guild, as persisted in the store.
///
/// Field names on disk match the flat layout existing data files use.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserGuildRecord {
    /// XP within the current level.
    #[serde(rename = "XP")]
    pub xp: u64,

    /// Current level.
    pub level: u64,

    /// Lifetime XP, the leaderboard sort key.
    #[serde(rename = "XPoverTime", default)]
    pub xp_over_time: u64,

    /// Owner of the record, kept for leaderboard reconstruction.
    #[serde(rename = "userId", default)]
    pub user_id: String,
}

impl UserGuildRecord {
    pub fn snapshot(&self) -> LevelSnapshot {
        LevelSnapshot {
            level: self.level,
            xp: self.xp,
        }
    }

    pub fn leaderboard_entry(&self) -> LeaderboardEntry {
        LeaderboardEntry {
            xp_over_time: self.xp_over_time,
            user_id: self.user_id.clone(),
            level: self.level,
            xp: self.xp,
        }
    }
}

/// Level and XP of one user, as returned by `get_user_level`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelSnapshot {
    pub level: u64,
    pub xp: u64,
}

/// One row of a guild leaderboard.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub xp_over_time: u64,
    pub user_id: String,
    pub level: u64,
    pub xp: u64,
}

/// What an XP increment did to the record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IncrementOutcome {
    /// First interaction; a fresh record was written.
    Created,
    /// XP went up by one, no level change.
    Accumulated { xp: u64 },
    /// Threshold reached; XP reset and level bumped.
    LeveledUp { new_level: u64, previous_level: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_key_format() {
        let key = RecordKey::new("42", "900");
        assert_eq!(key.as_str(), "42-900");
        assert_eq!(key.to_string(), "42-900");
    }

    #[test]
    fn test_belongs_to_guild_suffix_only() {
        let key = RecordKey::new("12", "123");
        assert!(key.belongs_to_guild("123"));
        assert!(!key.belongs_to_guild("12"));
        assert!(!key.belongs_to_guild("23"));
        assert!(!key.belongs_to_guild(""));
    }

    #[test]
    fn test_belongs_to_guild_needs_user_part() {
        assert!(!key_belongs_to_guild("-g1", "g1"));
        assert!(!key_belongs_to_guild("g1", "g1"));
        assert!(key_belongs_to_guild("u1-g1", "g1"));
    }

    #[test]
    fn test_belongs_to_guild_single_separator() {
        assert!(!key_belongs_to_guild("u-1-g1", "g1"));
        assert!(!key_belongs_to_guild("a-b-c", "b-c"));
        assert!(!key_belongs_to_guild("a-b-c", "c"));
    }

    #[test]
    fn test_record_wire_names() {
        let record = UserGuildRecord {
            xp: 3,
            level: 2,
            xp_over_time: 203,
            user_id: "u1".into(),
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["XP"], 3);
        assert_eq!(value["level"], 2);
        assert_eq!(value["XPoverTime"], 203);
        assert_eq!(value["userId"], "u1");
    }

    #[test]
    fn test_record_tolerates_missing_counters() {
        let record: UserGuildRecord =
            serde_json::from_str(r#"{"XP": 5, "level": 1}"#).unwrap();
        assert_eq!(record.xp_over_time, 0);
        assert!(record.user_id.is_empty());
    }
}
