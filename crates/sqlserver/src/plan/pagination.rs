//! Query plan pagination operations

use super::types::*;
use super::QueryPlan;

impl QueryPlan {
    /// Add LIMIT
    pub fn limit(mut self, count: u64) -> Self {
        self.limit = Some(count);
        self
    }

    /// Add OFFSET
    pub fn offset(mut self, count: u64) -> Self {
        self.offset = Some(count);
        self
    }

    /// Add pagination (LIMIT + OFFSET); pages start at 1
    pub fn paginate(mut self, per_page: u64, page: u64) -> Self {
        self.limit = Some(per_page);
        self.offset = Some(page.saturating_sub(1).saturating_mul(per_page));
        self
    }

    /// Take `n` rows in whatever order the plan already has
    pub fn take(self, n: u64) -> Self {
        self.limit(n)
    }

    /// First `n` rows by the plan's order, or by primary key when unordered
    pub fn first(mut self, n: u64) -> Self {
        if self.order_by.is_empty() {
            if let Some(pk) = self.source.primary_key.clone() {
                let table = self.source.reference_name().to_string();
                self.order_by.push(OrderTerm::Column {
                    column: ColumnRef::qualified(table, pk),
                    direction: OrderDirection::Asc,
                });
            }
        }
        self.limit(n)
    }

    /// Last `n` rows: fetched in reverse order and flipped by the caller
    pub fn last(self, n: u64) -> Self {
        let mut plan = self.reverse_order().limit(n);
        plan.reverse_result = true;
        plan
    }
}
