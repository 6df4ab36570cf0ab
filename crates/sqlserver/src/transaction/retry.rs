//! Transaction retry configuration

use std::time::Duration;

use crate::error::DialectError;

use super::IsolationLevel;

/// Options for [`crate::adapter::SqlServerAdapter::with_transaction`]
#[derive(Debug, Clone)]
pub struct TransactionConfig {
    /// Transaction isolation level; the dialect default when `None`
    pub isolation_level: Option<IsolationLevel>,
    /// Enable automatic retry of deadlock victims
    pub auto_retry: bool,
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Delay before the first retry, doubled for each further attempt
    pub retry_backoff: Duration,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            isolation_level: None,
            auto_retry: false,
            max_retries: 3,
            retry_backoff: Duration::from_millis(50),
        }
    }
}

impl TransactionConfig {
    /// Delay before retry number `attempt` (1-based)
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.retry_backoff
            .saturating_mul(1u32 << attempt.saturating_sub(1).min(16))
    }
}

/// Check if an error means the transaction was chosen as a deadlock victim
/// or lost a snapshot update conflict, both of which can be retried
pub fn is_deadlock_victim(error: &DialectError) -> bool {
    match error {
        DialectError::Driver(msg) | DialectError::Transaction(msg) => {
            msg.contains("1205") || // deadlock victim
            msg.contains("3960") || // snapshot update conflict
            msg.contains("deadlocked on lock resources")
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_config_default() {
        let config = TransactionConfig::default();
        assert!(config.isolation_level.is_none());
        assert!(!config.auto_retry);
        assert_eq!(config.max_retries, 3);
    }

    #[test]
    fn test_backoff_doubles() {
        let config = TransactionConfig {
            retry_backoff: Duration::from_millis(10),
            ..Default::default()
        };
        assert_eq!(config.backoff_for(1), Duration::from_millis(10));
        assert_eq!(config.backoff_for(3), Duration::from_millis(40));
    }

    #[test]
    fn test_deadlock_detection() {
        let err = DialectError::Driver(
            "Msg 1205: Transaction (Process ID 52) was deadlocked on lock resources with another process".to_string(),
        );
        assert!(is_deadlock_victim(&err));

        let err = DialectError::Driver("Msg 3960: Snapshot isolation transaction aborted".to_string());
        assert!(is_deadlock_victim(&err));

        let err = DialectError::InvalidPlan("1205".to_string());
        assert!(!is_deadlock_victim(&err));
    }
}
