//! Query plan SELECT list operations

use super::types::*;
use super::QueryPlan;

impl QueryPlan {
    /// Select specific columns
    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.projections.extend(columns.iter().map(|c| Projection::Column {
            column: ColumnRef::parse(c),
            alias: None,
        }));
        self
    }

    /// Select a column under an alias
    pub fn column_as(mut self, column: &str, alias: &str) -> Self {
        self.projections.push(Projection::Column {
            column: ColumnRef::parse(column),
            alias: Some(alias.to_string()),
        });
        self
    }

    /// Select caller-written text, e.g. `topics.*, IIF (1 = 2, 1, 0) as is_test`
    pub fn select_raw(mut self, sql: &str) -> Self {
        self.projections.push(Projection::Raw(sql.to_string()));
        self
    }

    /// Select a correlated scalar subquery under an alias
    pub fn select_subquery(mut self, subquery: QueryPlan, alias: &str) -> Self {
        self.projections.push(Projection::Subquery {
            plan: Box::new(subquery),
            alias: alias.to_string(),
        });
        self
    }

    /// Select DISTINCT
    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Existence probe: `SELECT 1 AS one ... ` limited to one row
    pub fn exists(mut self) -> Self {
        self.projections = vec![Projection::One];
        self.limit(1)
    }
}
