//! Query plan WHERE clause operations

use super::types::*;
use super::QueryPlan;
use crate::value::SqlValue;

impl QueryPlan {
    /// Add an arbitrary predicate
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    fn compare<T: Into<SqlValue>>(self, column: &str, op: ComparisonOp, value: T) -> Self {
        self.filter(Predicate::compare(column, op, value))
    }

    /// Add WHERE condition with equality
    pub fn where_eq<T: Into<SqlValue>>(self, column: &str, value: T) -> Self {
        self.compare(column, ComparisonOp::Eq, value)
    }

    /// Add WHERE condition with not equal
    pub fn where_ne<T: Into<SqlValue>>(self, column: &str, value: T) -> Self {
        self.compare(column, ComparisonOp::NotEq, value)
    }

    pub fn where_gt<T: Into<SqlValue>>(self, column: &str, value: T) -> Self {
        self.compare(column, ComparisonOp::Gt, value)
    }

    pub fn where_gte<T: Into<SqlValue>>(self, column: &str, value: T) -> Self {
        self.compare(column, ComparisonOp::Gte, value)
    }

    pub fn where_lt<T: Into<SqlValue>>(self, column: &str, value: T) -> Self {
        self.compare(column, ComparisonOp::Lt, value)
    }

    pub fn where_lte<T: Into<SqlValue>>(self, column: &str, value: T) -> Self {
        self.compare(column, ComparisonOp::Lte, value)
    }

    /// Add WHERE condition with IN
    pub fn where_in<T: Into<SqlValue>>(self, column: &str, values: Vec<T>) -> Self {
        self.filter(Predicate::in_values(column, values))
    }

    /// Add WHERE condition with NOT IN
    pub fn where_not_in<T: Into<SqlValue>>(self, column: &str, values: Vec<T>) -> Self {
        self.filter(Predicate::SetMembership {
            column: column.into(),
            set: MembershipSet::Values(values.into_iter().map(Into::into).collect()),
            negated: true,
        })
    }

    /// Add WHERE column IN (subquery)
    pub fn where_in_subquery(self, column: &str, subquery: QueryPlan) -> Self {
        self.filter(Predicate::SetMembership {
            column: column.into(),
            set: MembershipSet::Subquery(Box::new(subquery)),
            negated: false,
        })
    }

    /// Add WHERE condition with LIKE
    pub fn where_like(self, column: &str, pattern: &str) -> Self {
        self.filter(Predicate::like(column, pattern))
    }

    /// Add WHERE LIKE with a caller-chosen escape character
    pub fn where_like_escaped(self, column: &str, pattern: &str, escape: char) -> Self {
        self.filter(Predicate::Like {
            column: column.into(),
            pattern: pattern.to_string(),
            escape: Some(escape),
            negated: false,
        })
    }

    /// Add WHERE condition with IS NULL
    pub fn where_null(self, column: &str) -> Self {
        self.filter(Predicate::IsNull {
            column: column.into(),
            negated: false,
        })
    }

    /// Add WHERE condition with IS NOT NULL
    pub fn where_not_null(self, column: &str) -> Self {
        self.filter(Predicate::IsNull {
            column: column.into(),
            negated: true,
        })
    }

    /// Add WHERE condition with BETWEEN
    pub fn where_between<T: Into<SqlValue>>(self, column: &str, low: T, high: T) -> Self {
        self.filter(Predicate::Between {
            column: column.into(),
            low: low.into(),
            high: high.into(),
            negated: false,
        })
    }

    /// Add raw WHERE condition; `?` placeholders take the given values
    pub fn where_raw(self, sql: &str, values: Vec<SqlValue>) -> Self {
        self.filter(Predicate::raw(sql, values))
    }

    /// Add the negation of a predicate
    pub fn where_not(self, predicate: Predicate) -> Self {
        self.filter(Predicate::not(predicate))
    }

    /// Add EXISTS subquery condition
    pub fn where_exists(self, subquery: QueryPlan) -> Self {
        self.filter(Predicate::Exists {
            plan: Box::new(subquery),
            negated: false,
        })
    }

    /// Add NOT EXISTS subquery condition
    pub fn where_not_exists(self, subquery: QueryPlan) -> Self {
        self.filter(Predicate::Exists {
            plan: Box::new(subquery),
            negated: true,
        })
    }

    /// Add a condition compiled by the handler registered under `handler`
    pub fn where_custom<T: Into<SqlValue>>(self, handler: &str, column: &str, payload: T) -> Self {
        self.filter(Predicate::Custom {
            handler: handler.to_string(),
            column: column.into(),
            payload: payload.into(),
        })
    }
}
