//! Pagination compilation
//!
//! SQL Server has no LIMIT clause. Top-level and derived-table queries page
//! with `OFFSET .. ROWS FETCH NEXT .. ROWS ONLY`, which is only legal after
//! an ORDER BY; expression subqueries use `TOP (n)`. Legacy servers without
//! OFFSET/FETCH page through a `ROW_NUMBER()` window instead. A zero limit is
//! always `TOP (0)`, since `FETCH NEXT 0 ROWS` is rejected by the server.

use crate::config::{DialectRules, PaginationStrategy};
use crate::plan::QueryPlan;
use crate::quoting;

use super::QueryPosition;

/// How a SELECT restricts its rows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationClause {
    None,
    /// `SELECT TOP (n) ..`
    Top(u64),
    /// `ORDER BY .. OFFSET o ROWS [FETCH NEXT f ROWS ONLY]`
    OffsetFetch { offset: u64, fetch: Option<u64> },
    /// Derived table filtered on `ROW_NUMBER() OVER (ORDER BY ..)`
    RowNumber { offset: u64, fetch: Option<u64> },
}

impl PaginationClause {
    /// Whether the clause is only valid with an ORDER BY
    pub fn needs_order(&self) -> bool {
        matches!(
            self,
            PaginationClause::OffsetFetch { .. } | PaginationClause::RowNumber { .. }
        )
    }

    /// `TOP (n)` text placed after `SELECT`
    pub fn top_sql(&self) -> Option<String> {
        match self {
            PaginationClause::Top(n) => Some(format!("TOP ({})", n)),
            _ => None,
        }
    }

    /// Text placed after the ORDER BY clause
    pub fn suffix_sql(&self) -> Option<String> {
        match self {
            PaginationClause::OffsetFetch { offset, fetch } => {
                let mut sql = format!("OFFSET {} ROWS", offset);
                if let Some(fetch) = fetch {
                    sql.push_str(&format!(" FETCH NEXT {} ROWS ONLY", fetch));
                }
                Some(sql)
            }
            _ => None,
        }
    }
}

/// Choose the pagination form for a plan at a position
pub fn compile_pagination(rules: &DialectRules, plan: &QueryPlan, position: QueryPosition) -> PaginationClause {
    if !plan.is_paginated() {
        return PaginationClause::None;
    }

    let offset = plan.offset.unwrap_or(0);
    let fetch = plan.limit;

    match (fetch, offset, position, rules.pagination) {
        (Some(0), _, _, _) => PaginationClause::Top(0),
        (Some(n), 0, QueryPosition::Expression, _) | (Some(n), 0, _, PaginationStrategy::TopN) => {
            PaginationClause::Top(n)
        }
        (_, _, _, PaginationStrategy::OffsetFetch) => PaginationClause::OffsetFetch { offset, fetch },
        (_, _, _, PaginationStrategy::TopN) => PaginationClause::RowNumber { offset, fetch },
    }
}

/// Deterministic ordering for a paginated plan that has none: the source
/// relation's primary key, or `(SELECT NULL)` when no key is known
pub fn synthesized_order(rules: &DialectRules, plan: &QueryPlan) -> String {
    match &plan.source.primary_key {
        Some(pk) => {
            let table = match &plan.source.alias {
                Some(alias) => quoting::quote(rules, alias),
                None => quoting::quote_table_name(rules, &plan.source.name),
            };
            format!("{}.{} ASC", table, quoting::quote_column_name(rules, pk))
        }
        None => "(SELECT NULL)".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::Relation;

    #[test]
    fn test_top_level_uses_offset_fetch() {
        let rules = DialectRules::sqlserver();
        let plan = QueryPlan::select("topics").limit(3);
        let clause = compile_pagination(&rules, &plan, QueryPosition::TopLevel);
        assert_eq!(clause, PaginationClause::OffsetFetch { offset: 0, fetch: Some(3) });
        assert_eq!(
            clause.suffix_sql().as_deref(),
            Some("OFFSET 0 ROWS FETCH NEXT 3 ROWS ONLY")
        );
        assert!(clause.needs_order());

        let plan = QueryPlan::select("topics").offset(7);
        assert_eq!(
            compile_pagination(&rules, &plan, QueryPosition::DerivedTable).suffix_sql().as_deref(),
            Some("OFFSET 7 ROWS")
        );
    }

    #[test]
    fn test_expression_position_uses_top() {
        let rules = DialectRules::sqlserver();
        let plan = QueryPlan::select("topics").limit(1);
        let clause = compile_pagination(&rules, &plan, QueryPosition::Expression);
        assert_eq!(clause, PaginationClause::Top(1));
        assert_eq!(clause.top_sql().as_deref(), Some("TOP (1)"));
        assert!(!clause.needs_order());

        let plan = QueryPlan::select("topics").limit(1).offset(2);
        assert_eq!(
            compile_pagination(&rules, &plan, QueryPosition::Expression),
            PaginationClause::OffsetFetch { offset: 2, fetch: Some(1) }
        );
    }

    #[test]
    fn test_legacy_strategy() {
        let rules = DialectRules::legacy_sqlserver();
        let plan = QueryPlan::select("topics").limit(3);
        assert_eq!(
            compile_pagination(&rules, &plan, QueryPosition::TopLevel),
            PaginationClause::Top(3)
        );

        let plan = QueryPlan::select("topics").paginate(10, 2);
        assert_eq!(
            compile_pagination(&rules, &plan, QueryPosition::TopLevel),
            PaginationClause::RowNumber { offset: 10, fetch: Some(10) }
        );

        let plan = QueryPlan::select("comments").limit(5).offset(10);
        assert_eq!(
            compile_pagination(&rules, &plan, QueryPosition::Expression),
            PaginationClause::RowNumber { offset: 10, fetch: Some(5) }
        );
    }

    #[test]
    fn test_zero_limit_uses_top() {
        for rules in [DialectRules::sqlserver(), DialectRules::legacy_sqlserver()] {
            for position in [QueryPosition::TopLevel, QueryPosition::DerivedTable, QueryPosition::Expression] {
                let plan = QueryPlan::select("topics").limit(0).offset(3);
                let clause = compile_pagination(&rules, &plan, position);
                assert_eq!(clause, PaginationClause::Top(0));
                assert_eq!(clause.suffix_sql(), None);
            }
        }
    }

    #[test]
    fn test_unpaginated() {
        let rules = DialectRules::sqlserver();
        let plan = QueryPlan::select("topics").order_by("title");
        assert_eq!(
            compile_pagination(&rules, &plan, QueryPosition::TopLevel),
            PaginationClause::None
        );
    }

    #[test]
    fn test_synthesized_order() {
        let rules = DialectRules::sqlserver();
        let plan = QueryPlan::select(Relation::new("accounts").primary_key("id"));
        assert_eq!(synthesized_order(&rules, &plan), "[accounts].[id] ASC");

        let plan = QueryPlan::select(Relation::new("accounts").alias("a").primary_key("id"));
        assert_eq!(synthesized_order(&rules, &plan), "[a].[id] ASC");

        let plan = QueryPlan::select("logs");
        assert_eq!(synthesized_order(&rules, &plan), "(SELECT NULL)");
    }
}
