//! Transaction Isolation Levels
//!
//! Levels a caller may request when opening a transaction. The SQL text
//! actually sent comes from the dialect rules' isolation map.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Transaction isolation levels supported by SQL Server
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationLevel {
    /// Read Uncommitted - dirty reads allowed
    ReadUncommitted,
    /// Read Committed - SQL Server default
    ReadCommitted,
    /// Repeatable Read - shared locks held until commit
    RepeatableRead,
    /// Snapshot - row versioning, requires ALLOW_SNAPSHOT_ISOLATION
    Snapshot,
    /// Serializable - highest isolation level
    Serializable,
}

impl IsolationLevel {
    /// Canonical SQL name used in `SET TRANSACTION ISOLATION LEVEL`
    pub fn as_sql(&self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Snapshot => "SNAPSHOT",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for IsolationLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['_', '-'], " ").as_str() {
            "read uncommitted" => Ok(IsolationLevel::ReadUncommitted),
            "read committed" => Ok(IsolationLevel::ReadCommitted),
            "repeatable read" => Ok(IsolationLevel::RepeatableRead),
            "snapshot" => Ok(IsolationLevel::Snapshot),
            "serializable" => Ok(IsolationLevel::Serializable),
            _ => Err(ConfigError::InvalidValue {
                field: "isolation_level".to_string(),
                value: s.to_string(),
                expected: "read_uncommitted, read_committed, repeatable_read, snapshot or serializable"
                    .to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_isolation_level() {
        assert_eq!("read_committed".parse::<IsolationLevel>().unwrap(), IsolationLevel::ReadCommitted);
        assert_eq!("REPEATABLE READ".parse::<IsolationLevel>().unwrap(), IsolationLevel::RepeatableRead);
        assert_eq!("snapshot".parse::<IsolationLevel>().unwrap(), IsolationLevel::Snapshot);
        assert!("chaos".parse::<IsolationLevel>().is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(IsolationLevel::Serializable.to_string(), "SERIALIZABLE");
    }
}
