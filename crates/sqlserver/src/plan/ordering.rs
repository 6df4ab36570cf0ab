//! Query plan ORDER BY and GROUP BY operations

use super::types::*;
use super::QueryPlan;

impl QueryPlan {
    /// Add ORDER BY clause (ascending)
    pub fn order_by(mut self, column: &str) -> Self {
        self.order_by.push(OrderTerm::Column {
            column: column.into(),
            direction: OrderDirection::Asc,
        });
        self
    }

    /// Add ORDER BY clause (descending)
    pub fn order_by_desc(mut self, column: &str) -> Self {
        self.order_by.push(OrderTerm::Column {
            column: column.into(),
            direction: OrderDirection::Desc,
        });
        self
    }

    /// Add caller-written ordering, e.g. `comments.id DESC`
    pub fn order_raw(mut self, sql: &str) -> Self {
        self.order_by.push(OrderTerm::Raw(sql.to_string()));
        self
    }

    /// Drop any ordering
    pub fn unordered(mut self) -> Self {
        self.order_by.clear();
        self
    }

    /// Add GROUP BY clause
    pub fn group_by(mut self, column: &str) -> Self {
        self.group_by.push(column.into());
        self
    }

    /// Reverse the ordering; an unordered plan is ordered by primary key descending
    pub fn reverse_order(mut self) -> Self {
        if self.order_by.is_empty() {
            if let Some(pk) = self.source.primary_key.clone() {
                let table = self.source.reference_name().to_string();
                self.order_by.push(OrderTerm::Column {
                    column: ColumnRef::qualified(table, pk),
                    direction: OrderDirection::Desc,
                });
            }
        } else {
            self.order_by = self.order_by.iter().map(OrderTerm::reverse).collect();
        }
        self
    }
}
