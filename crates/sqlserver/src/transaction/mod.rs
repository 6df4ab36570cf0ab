//! Transaction and savepoint control
//!
//! SQL Server has no nested transactions. The outermost level issues `BEGIN
//! TRANSACTION`; every level below it is a `SAVE TRANSACTION` savepoint that
//! is rolled back with `ROLLBACK TRANSACTION <name>`. There is no release
//! statement, so releasing a savepoint only drops the frame.
//!
//! The controller is a pure state machine: each operation updates the frame
//! stack and returns the statements the caller must send. Once those
//! statements ran, the caller reports it with `statements_executed`; until
//! then a changed isolation level counts as still in effect.

pub mod isolation;
pub mod retry;

pub use isolation::IsolationLevel;
pub use retry::{is_deadlock_victim, TransactionConfig};

use crate::config::{DialectRules, SavepointRelease};
use crate::error::{DialectError, DialectResult};
use crate::plan::LockHint;
use crate::quoting;

/// One level of the transaction stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionFrame {
    pub name: String,
    pub isolation_level: IsolationLevel,
    /// `None` for the outermost transaction
    pub savepoint_name: Option<String>,
}

/// Per-connection transaction state
#[derive(Debug, Clone)]
pub struct TransactionController {
    rules: DialectRules,
    frames: Vec<TransactionFrame>,
    savepoint_counter: u32,
    /// The session may be running at a level other than the default
    isolation_changed: bool,
}

impl TransactionController {
    pub fn new(rules: DialectRules) -> Self {
        Self {
            rules,
            frames: Vec::new(),
            savepoint_counter: 0,
            isolation_changed: false,
        }
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_active(&self) -> bool {
        !self.frames.is_empty()
    }

    pub fn frames(&self) -> &[TransactionFrame] {
        &self.frames
    }

    /// Isolation level of the open transaction
    pub fn current_isolation(&self) -> Option<IsolationLevel> {
        self.frames.last().map(|frame| frame.isolation_level)
    }

    /// Open a transaction, or a savepoint when one is already open
    pub fn begin_transaction(&mut self, isolation: Option<IsolationLevel>) -> DialectResult<Vec<String>> {
        if let Some(current) = self.current_isolation() {
            if let Some(requested) = isolation {
                if requested != current {
                    return Err(DialectError::Transaction(format!(
                        "cannot change isolation level from {} to {} inside an open transaction",
                        current, requested
                    )));
                }
            }

            let name = self.next_savepoint_name();
            tracing::debug!("Opening nested transaction at depth {} as savepoint {}", self.depth() + 1, name);
            let sql = self.save_sql(&name);
            self.frames.push(TransactionFrame {
                name: name.clone(),
                isolation_level: current,
                savepoint_name: Some(name),
            });
            return Ok(vec![sql]);
        }

        let mut statements = Vec::with_capacity(2);
        let level = match isolation {
            Some(level) => {
                statements.push(self.isolation_statement(level)?);
                if level != self.rules.default_isolation {
                    self.isolation_changed = true;
                }
                level
            }
            None => {
                if self.isolation_changed {
                    statements.push(self.isolation_statement(self.rules.default_isolation)?);
                }
                self.rules.default_isolation
            }
        };
        statements.push("BEGIN TRANSACTION".to_string());

        tracing::debug!("Beginning transaction with isolation level {}", level);
        self.frames.push(TransactionFrame {
            name: "transaction".to_string(),
            isolation_level: level,
            savepoint_name: None,
        });
        Ok(statements)
    }

    /// Commit the innermost level
    pub fn commit(&mut self) -> DialectResult<Vec<String>> {
        let frame = self.pop_frame("commit")?;
        if frame.savepoint_name.is_some() {
            tracing::debug!("Releasing savepoint {} on commit", frame.name);
            return Ok(Vec::new());
        }

        tracing::debug!("Committing transaction");
        let mut statements = vec!["COMMIT TRANSACTION".to_string()];
        statements.extend(self.finish_outermost()?);
        Ok(statements)
    }

    /// Roll back the innermost level
    pub fn rollback(&mut self) -> DialectResult<Vec<String>> {
        let frame = self.pop_frame("rollback")?;
        match frame.savepoint_name {
            Some(savepoint) => {
                tracing::debug!("Rolling back to savepoint {}", savepoint);
                Ok(vec![self.rollback_sql(Some(&savepoint))])
            }
            None => {
                tracing::debug!("Rolling back transaction");
                let mut statements = vec![self.rollback_sql(None)];
                statements.extend(self.finish_outermost()?);
                Ok(statements)
            }
        }
    }

    /// Create a named savepoint inside the open transaction
    pub fn create_savepoint(&mut self, name: &str) -> DialectResult<Vec<String>> {
        let isolation_level = self.current_isolation().ok_or_else(|| {
            DialectError::Transaction(format!("cannot create savepoint '{}' outside a transaction", name))
        })?;
        quoting::validate_identifier(&self.rules, name)?;
        if self.position_of(name).is_some() {
            return Err(DialectError::Transaction(format!("savepoint '{}' already exists", name)));
        }

        tracing::debug!("Creating savepoint {}", name);
        self.frames.push(TransactionFrame {
            name: name.to_string(),
            isolation_level,
            savepoint_name: Some(name.to_string()),
        });
        Ok(vec![self.save_sql(name)])
    }

    /// Forget a savepoint and every level opened after it
    ///
    /// Nothing is sent to the server. Releasing a name that is not on the
    /// stack succeeds under `NoOp` rules.
    pub fn release_savepoint(&mut self, name: &str) -> DialectResult<Vec<String>> {
        match self.position_of(name) {
            Some(position) => {
                tracing::debug!("Releasing savepoint {}", name);
                self.frames.truncate(position);
                Ok(Vec::new())
            }
            None => match self.rules.savepoint_release {
                SavepointRelease::NoOp => {
                    tracing::debug!("Savepoint {} is not active, release ignored", name);
                    Ok(Vec::new())
                }
                SavepointRelease::ErrorOnUnknown => Err(DialectError::UnknownSavepoint {
                    name: name.to_string(),
                }),
            },
        }
    }

    /// Roll back to a savepoint, which stays active; later levels are discarded
    pub fn rollback_to_savepoint(&mut self, name: &str) -> DialectResult<Vec<String>> {
        let position = self.position_of(name).ok_or_else(|| DialectError::UnknownSavepoint {
            name: name.to_string(),
        })?;
        tracing::debug!("Rolling back to savepoint {}", name);
        self.frames.truncate(position + 1);
        Ok(vec![self.rollback_sql(Some(name))])
    }

    /// Table hint reads should carry inside the open transaction
    ///
    /// Under READ COMMITTED, SQL Server blocks on rows locked by other
    /// transactions; `READPAST` skips them instead.
    pub fn read_hint(&self) -> Option<LockHint> {
        match self.current_isolation() {
            Some(IsolationLevel::ReadCommitted) if self.rules.read_committed_read_past => Some(LockHint::ReadPast),
            _ => None,
        }
    }

    /// Drop the innermost frame after its opening statement failed
    ///
    /// Returns the statements that put the session back to the default
    /// isolation level when the failed level was the outermost one and an
    /// isolation change may already have reached the server.
    pub fn discard_top(&mut self) -> DialectResult<Vec<String>> {
        let frame = match self.frames.pop() {
            Some(frame) => frame,
            None => return Ok(Vec::new()),
        };
        tracing::debug!("Discarding transaction frame {}", frame.name);
        if !self.frames.is_empty() {
            return Ok(Vec::new());
        }
        self.finish_outermost()
    }

    /// Record that the statements of the last operation were executed
    ///
    /// When no transaction is open, or the open one runs at the default
    /// level, any owed restore has reached the server with them.
    pub fn statements_executed(&mut self) {
        let at_default = self
            .frames
            .first()
            .map_or(true, |root| root.isolation_level == self.rules.default_isolation);
        if at_default {
            self.isolation_changed = false;
        }
    }

    /// Whether a default isolation restore is still owed to the server
    pub fn isolation_restore_pending(&self) -> bool {
        self.isolation_changed
    }

    /// Next generated savepoint name not already on the stack
    fn next_savepoint_name(&mut self) -> String {
        loop {
            self.savepoint_counter += 1;
            let name = format!("{}{}", self.rules.savepoint_prefix, self.savepoint_counter);
            if self.position_of(&name).is_none() {
                return name;
            }
        }
    }

    fn pop_frame(&mut self, operation: &str) -> DialectResult<TransactionFrame> {
        self.frames
            .pop()
            .ok_or_else(|| DialectError::Transaction(format!("cannot {} without an active transaction", operation)))
    }

    /// Reset per-transaction state and restore the default isolation level
    ///
    /// `isolation_changed` stays set until `statements_executed` confirms
    /// the restore ran.
    fn finish_outermost(&mut self) -> DialectResult<Vec<String>> {
        self.savepoint_counter = 0;
        if self.isolation_changed {
            Ok(vec![self.isolation_statement(self.rules.default_isolation)?])
        } else {
            Ok(Vec::new())
        }
    }

    fn isolation_statement(&self, level: IsolationLevel) -> DialectResult<String> {
        let sql = self
            .rules
            .isolation_sql(level)
            .ok_or_else(|| DialectError::UnsupportedIsolationLevel {
                level: level.as_sql().to_string(),
            })?;
        Ok(format!("SET TRANSACTION ISOLATION LEVEL {}", sql))
    }

    fn position_of(&self, savepoint: &str) -> Option<usize> {
        self.frames
            .iter()
            .position(|frame| frame.savepoint_name.as_deref() == Some(savepoint))
    }

    fn save_sql(&self, name: &str) -> String {
        format!("SAVE TRANSACTION {}", quoting::quote(&self.rules, name))
    }

    fn rollback_sql(&self, savepoint: Option<&str>) -> String {
        match savepoint {
            Some(name) => format!("ROLLBACK TRANSACTION {}", quoting::quote(&self.rules, name)),
            None => "ROLLBACK TRANSACTION".to_string(),
        }
    }
}
