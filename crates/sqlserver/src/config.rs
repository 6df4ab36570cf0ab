//! Dialect Rules - connection-level configuration of SQL Server syntax
//!
//! Rules are loaded once when the adapter is constructed and never change
//! afterwards. They can be built from presets, deserialized from JSON, or
//! read from `ELIF_SQLSERVER_*` environment variables.

use std::collections::BTreeMap;
use std::env;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::transaction::IsolationLevel;

/// Configuration errors raised while loading or validating dialect rules
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required field: {field}. {hint}")]
    MissingRequired { field: String, hint: String },

    #[error("Invalid value for field '{field}': '{value}'. Expected: {expected}")]
    InvalidValue {
        field: String,
        value: String,
        expected: String,
    },
}

/// How the dialect limits result rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaginationStrategy {
    /// `OFFSET n ROWS FETCH NEXT m ROWS ONLY` (SQL Server 2012+)
    OffsetFetch,
    /// `TOP (n)` with `ROW_NUMBER()` windows for offsets (SQL Server 2008)
    TopN,
}

impl FromStr for PaginationStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "offset_fetch" | "offset-fetch" | "fetch" => Ok(PaginationStrategy::OffsetFetch),
            "top_n" | "top-n" | "top" => Ok(PaginationStrategy::TopN),
            _ => Err(ConfigError::InvalidValue {
                field: "pagination".to_string(),
                value: s.to_string(),
                expected: "offset_fetch or top_n".to_string(),
            }),
        }
    }
}

/// What releasing a savepoint that is not on the stack does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SavepointRelease {
    /// Silently ignored; SQL Server has no release statement
    NoOp,
    /// Rejected with `UnknownSavepoint`
    ErrorOnUnknown,
}

impl FromStr for SavepointRelease {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "no_op" | "noop" | "no-op" => Ok(SavepointRelease::NoOp),
            "error_on_unknown" | "error" => Ok(SavepointRelease::ErrorOnUnknown),
            _ => Err(ConfigError::InvalidValue {
                field: "savepoint_release".to_string(),
                value: s.to_string(),
                expected: "no_op or error_on_unknown".to_string(),
            }),
        }
    }
}

/// Dialect rules for a SQL Server connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DialectRules {
    pub identifier_open: char,
    pub identifier_close: char,
    pub max_identifier_length: usize,
    pub pagination: PaginationStrategy,
    /// Whether `SET IDENTITY_INSERT` is available
    pub identity_insert: bool,
    pub isolation_levels: BTreeMap<IsolationLevel, String>,
    pub default_isolation: IsolationLevel,
    pub savepoint_release: SavepointRelease,
    pub savepoint_prefix: String,
    /// Tag string literals with the national character prefix (`N'..'`)
    pub unicode_literals: bool,
    /// Read through row locks with `READPAST` inside READ COMMITTED transactions
    pub read_committed_read_past: bool,
    pub bind_prefix: String,
    /// Longest string bound as `nvarchar(n)` before switching to `nvarchar(max)`
    pub max_inline_nvarchar: usize,
}

impl DialectRules {
    /// Rules for SQL Server 2012 and later
    pub fn sqlserver() -> Self {
        let isolation_levels = [
            IsolationLevel::ReadUncommitted,
            IsolationLevel::ReadCommitted,
            IsolationLevel::RepeatableRead,
            IsolationLevel::Snapshot,
            IsolationLevel::Serializable,
        ]
        .into_iter()
        .map(|level| (level, level.as_sql().to_string()))
        .collect();

        Self {
            identifier_open: '[',
            identifier_close: ']',
            max_identifier_length: 128,
            pagination: PaginationStrategy::OffsetFetch,
            identity_insert: true,
            isolation_levels,
            default_isolation: IsolationLevel::ReadCommitted,
            savepoint_release: SavepointRelease::NoOp,
            savepoint_prefix: "elif_sp_".to_string(),
            unicode_literals: true,
            read_committed_read_past: true,
            bind_prefix: "@".to_string(),
            max_inline_nvarchar: 4000,
        }
    }

    /// Rules for SQL Server 2008, which has no `OFFSET .. FETCH`
    pub fn legacy_sqlserver() -> Self {
        Self {
            pagination: PaginationStrategy::TopN,
            ..Self::sqlserver()
        }
    }

    /// Deserialize rules from JSON; missing fields take the SQL Server defaults
    pub fn from_json_str(json: &str) -> Result<Self, crate::error::DialectError> {
        let rules: DialectRules = serde_json::from_str(json)?;
        rules.validate()?;
        Ok(rules)
    }

    /// Load rules from environment variables on top of the SQL Server preset
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut rules = Self::sqlserver();

        if let Ok(value) = env::var("ELIF_SQLSERVER_PAGINATION") {
            rules.pagination = value.parse()?;
        }

        if let Ok(value) = env::var("ELIF_SQLSERVER_UNICODE_LITERALS") {
            rules.unicode_literals = parse_bool("unicode_literals", &value)?;
        }

        if let Ok(value) = env::var("ELIF_SQLSERVER_IDENTITY_INSERT") {
            rules.identity_insert = parse_bool("identity_insert", &value)?;
        }

        if let Ok(value) = env::var("ELIF_SQLSERVER_SAVEPOINT_RELEASE") {
            rules.savepoint_release = value.parse()?;
        }

        if let Ok(value) = env::var("ELIF_SQLSERVER_MAX_IDENTIFIER_LENGTH") {
            rules.max_identifier_length = value.parse().map_err(|_| ConfigError::InvalidValue {
                field: "max_identifier_length".to_string(),
                value,
                expected: "positive integer".to_string(),
            })?;
        }

        rules.validate()?;
        Ok(rules)
    }

    /// Validate the rules
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_identifier_length == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_identifier_length".to_string(),
                value: "0".to_string(),
                expected: "positive integer".to_string(),
            });
        }

        if self.bind_prefix.is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "bind_prefix".to_string(),
                hint: "SQL Server parameters are named with '@'".to_string(),
            });
        }

        if !self.isolation_levels.contains_key(&self.default_isolation) {
            return Err(ConfigError::InvalidValue {
                field: "default_isolation".to_string(),
                value: self.default_isolation.as_sql().to_string(),
                expected: "a level present in isolation_levels".to_string(),
            });
        }

        Ok(())
    }

    /// SQL text for an isolation level, if the dialect maps it
    pub fn isolation_sql(&self, level: IsolationLevel) -> Option<&str> {
        self.isolation_levels.get(&level).map(String::as_str)
    }
}

impl Default for DialectRules {
    fn default() -> Self {
        Self::sqlserver()
    }
}

fn parse_bool(field: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
            expected: "true or false".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for var in [
            "ELIF_SQLSERVER_PAGINATION",
            "ELIF_SQLSERVER_UNICODE_LITERALS",
            "ELIF_SQLSERVER_IDENTITY_INSERT",
            "ELIF_SQLSERVER_SAVEPOINT_RELEASE",
            "ELIF_SQLSERVER_MAX_IDENTIFIER_LENGTH",
        ] {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_sqlserver_preset() {
        let rules = DialectRules::sqlserver();
        assert_eq!(rules.identifier_open, '[');
        assert_eq!(rules.identifier_close, ']');
        assert_eq!(rules.pagination, PaginationStrategy::OffsetFetch);
        assert_eq!(rules.savepoint_release, SavepointRelease::NoOp);
        assert_eq!(
            rules.isolation_sql(IsolationLevel::Snapshot),
            Some("SNAPSHOT")
        );
        assert!(rules.validate().is_ok());
    }

    #[test]
    fn test_legacy_preset_uses_top_n() {
        let rules = DialectRules::legacy_sqlserver();
        assert_eq!(rules.pagination, PaginationStrategy::TopN);
        assert!(rules.unicode_literals);
    }

    #[test]
    fn test_from_json_fills_defaults() {
        let rules = DialectRules::from_json_str(
            r#"{"pagination": "top_n", "savepoint_release": "error_on_unknown"}"#,
        )
        .unwrap();
        assert_eq!(rules.pagination, PaginationStrategy::TopN);
        assert_eq!(rules.savepoint_release, SavepointRelease::ErrorOnUnknown);
        assert_eq!(rules.max_identifier_length, 128);
    }

    #[test]
    fn test_from_json_restricted_isolation_map() {
        let rules = DialectRules::from_json_str(
            r#"{"isolation_levels": {"read_committed": "READ COMMITTED"}}"#,
        )
        .unwrap();
        assert_eq!(rules.isolation_sql(IsolationLevel::Serializable), None);
        assert_eq!(
            rules.isolation_sql(IsolationLevel::ReadCommitted),
            Some("READ COMMITTED")
        );
    }

    #[test]
    fn test_validation_rejects_missing_default_isolation() {
        let result = DialectRules::from_json_str(
            r#"{"isolation_levels": {"serializable": "SERIALIZABLE"}}"#,
        );
        assert!(matches!(
            result,
            Err(crate::error::DialectError::Configuration(_))
        ));
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        clear_env();
        env::set_var("ELIF_SQLSERVER_PAGINATION", "top_n");
        env::set_var("ELIF_SQLSERVER_UNICODE_LITERALS", "false");
        env::set_var("ELIF_SQLSERVER_MAX_IDENTIFIER_LENGTH", "64");

        let rules = DialectRules::from_env().unwrap();
        assert_eq!(rules.pagination, PaginationStrategy::TopN);
        assert!(!rules.unicode_literals);
        assert_eq!(rules.max_identifier_length, 64);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_bad_values() {
        clear_env();
        env::set_var("ELIF_SQLSERVER_SAVEPOINT_RELEASE", "sometimes");

        let result = DialectRules::from_env();
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));

        clear_env();
    }
}
