//! Driver collaborator seam
//!
//! The dialect layer never talks to the network itself. A TDS driver
//! implements [`Driver`] and receives fully compiled statements; the
//! in-memory [`FakeDriver`] records them for tests and local tooling.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;
use serde_json::{Map, Value as JsonValue};

use crate::dispatch::CompiledStatement;
use crate::error::{DialectError, DialectResult};
use crate::value::SqlValue;

/// Boxed future borrowed from a driver, used by scoped operations
pub type DriverFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Connection-level driver operations
#[async_trait]
pub trait Driver: Send {
    /// Execute a statement and return the affected row count
    async fn execute(&mut self, statement: &CompiledStatement) -> DialectResult<u64>;

    /// Execute a statement and return its result rows
    async fn fetch_all(&mut self, statement: &CompiledStatement) -> DialectResult<Vec<Row>>;
}

/// A result row
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<SqlValue>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column
    pub fn with(mut self, column: &str, value: impl Into<SqlValue>) -> Self {
        self.columns.push(column.to_string());
        self.values.push(value.into());
        self
    }

    /// Get a column value by name
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|index| self.values.get(index))
    }

    /// Get a column value by index
    pub fn get_by_index(&self, index: usize) -> Option<&SqlValue> {
        self.values.get(index)
    }

    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Get a typed value from a column
    pub fn get_as<T>(&self, column: &str) -> DialectResult<T>
    where
        T: for<'de> serde::Deserialize<'de>,
    {
        let value = self
            .get(column)
            .ok_or_else(|| DialectError::Driver(format!("Column '{}' not found in row", column)))?;
        serde_json::from_value(value.to_json())
            .map_err(|e| DialectError::Driver(format!("Failed to deserialize column '{}': {}", column, e)))
    }

    /// Convert row to a JSON object
    pub fn to_json(&self) -> JsonValue {
        let map: Map<String, JsonValue> = self
            .columns
            .iter()
            .cloned()
            .zip(self.values.iter().map(SqlValue::to_json))
            .collect();
        JsonValue::Object(map)
    }
}

/// In-memory driver that records every statement it receives
#[derive(Debug, Default)]
pub struct FakeDriver {
    executed: Vec<String>,
    failures: Vec<(String, String)>,
    results: VecDeque<Vec<Row>>,
    affected_rows: u64,
}

impl FakeDriver {
    pub fn new() -> Self {
        Self {
            affected_rows: 1,
            ..Self::default()
        }
    }

    /// Fail every statement whose text contains `fragment`
    pub fn fail_on(mut self, fragment: &str, message: &str) -> Self {
        self.failures.push((fragment.to_string(), message.to_string()));
        self
    }

    /// Stop failing statements that contain `fragment`
    pub fn clear_failure(&mut self, fragment: &str) {
        self.failures.retain(|(f, _)| f != fragment);
    }

    /// Queue the rows returned by the next `fetch_all`
    pub fn push_result(&mut self, rows: Vec<Row>) {
        self.results.push_back(rows);
    }

    pub fn with_result(mut self, rows: Vec<Row>) -> Self {
        self.push_result(rows);
        self
    }

    pub fn set_affected_rows(&mut self, rows: u64) {
        self.affected_rows = rows;
    }

    /// Text of every statement received, in order
    pub fn executed(&self) -> &[String] {
        &self.executed
    }

    pub fn clear(&mut self) {
        self.executed.clear();
    }

    fn record(&mut self, statement: &CompiledStatement) -> DialectResult<()> {
        if statement.is_cancelled() {
            return Err(DialectError::Driver("Query was cancelled".to_string()));
        }
        self.executed.push(statement.text.clone());
        match self
            .failures
            .iter()
            .find(|(fragment, _)| statement.text.contains(fragment.as_str()))
        {
            Some((_, message)) => Err(DialectError::Driver(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Driver for FakeDriver {
    async fn execute(&mut self, statement: &CompiledStatement) -> DialectResult<u64> {
        self.record(statement)?;
        Ok(self.affected_rows)
    }

    async fn fetch_all(&mut self, statement: &CompiledStatement) -> DialectResult<Vec<Row>> {
        self.record(statement)?;
        Ok(self.results.pop_front().unwrap_or_default())
    }
}
