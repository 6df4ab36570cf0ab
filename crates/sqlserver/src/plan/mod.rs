//! Query Plan - the dialect-agnostic query handed over by the ORM builder
//!
//! A plan is assembled with the fluent builder methods in this module and
//! then only read by the compiler.

pub mod joins;
pub mod ordering;
pub mod pagination;
pub mod select;
pub mod types;
pub mod where_clause;

pub use types::*;

/// Logical query plan
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    pub statement: StatementKind,
    pub source: Relation,
    pub joins: Vec<Join>,
    pub projections: Vec<Projection>,
    pub predicates: Vec<Predicate>,
    pub order_by: Vec<OrderTerm>,
    pub group_by: Vec<ColumnRef>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub lock: Option<LockHint>,
    pub distinct: bool,
    pub assignments: Vec<Assignment>,
    /// Rows come back in reverse of the requested order and must be flipped
    pub reverse_result: bool,
}

impl QueryPlan {
    fn new(statement: StatementKind, source: Relation) -> Self {
        Self {
            statement,
            source,
            joins: Vec::new(),
            projections: Vec::new(),
            predicates: Vec::new(),
            order_by: Vec::new(),
            group_by: Vec::new(),
            limit: None,
            offset: None,
            lock: None,
            distinct: false,
            assignments: Vec::new(),
            reverse_result: false,
        }
    }

    /// Start a SELECT from a relation
    pub fn select(source: impl Into<Relation>) -> Self {
        Self::new(StatementKind::Select, source.into())
    }

    /// Start an INSERT into a relation
    pub fn insert_into(target: impl Into<Relation>) -> Self {
        Self::new(StatementKind::Insert, target.into())
    }

    /// Start an UPDATE of a relation
    pub fn update(target: impl Into<Relation>) -> Self {
        Self::new(StatementKind::Update, target.into())
    }

    /// Start a DELETE from a relation
    pub fn delete_from(target: impl Into<Relation>) -> Self {
        Self::new(StatementKind::Delete, target.into())
    }

    /// Assign a column value (INSERT and UPDATE)
    pub fn set<T: Into<crate::value::SqlValue>>(mut self, column: &str, value: T) -> Self {
        self.assignments.push(Assignment {
            column: column.to_string(),
            value: value.into(),
        });
        self
    }

    /// Add a table hint such as `WITH(UPDLOCK)`
    pub fn lock(mut self, hint: LockHint) -> Self {
        self.lock = Some(hint);
        self
    }

    /// Relations visible to predicates of this plan
    pub fn relations(&self) -> impl Iterator<Item = &Relation> {
        std::iter::once(&self.source).chain(self.joins.iter().map(|join| &join.relation))
    }

    pub fn is_paginated(&self) -> bool {
        self.limit.is_some() || self.offset.is_some()
    }
}
