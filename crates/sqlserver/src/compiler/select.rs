//! SELECT assembly

use crate::error::{DialectError, DialectResult};
use crate::plan::{OrderTerm, Projection, QueryPlan, Relation, StatementKind};
use crate::quoting;

use super::pagination::{compile_pagination, synthesized_order, PaginationClause};
use super::{BindCollector, QueryPosition, SqlServerCompiler};

const ROW_NUMBER_COLUMN: &str = "__rn";
const ROW_NUMBER_TABLE: &str = "__rnt";
const COUNT_SUBQUERY: &str = "subquery_for_count";
const COUNT_ALIAS: &str = "count_all";

impl SqlServerCompiler {
    pub(crate) fn lower_select(
        &self,
        plan: &QueryPlan,
        position: QueryPosition,
        outer_scope: &[&Relation],
        binds: &mut BindCollector,
    ) -> DialectResult<String> {
        if plan.statement != StatementKind::Select {
            return Err(DialectError::InvalidPlan(format!(
                "expected a SELECT plan, got {:?}",
                plan.statement
            )));
        }

        let mut scope: Vec<&Relation> = outer_scope.to_vec();
        scope.extend(plan.relations());

        let pagination = compile_pagination(self.rules(), plan, position);
        let order = self.order_clause(plan, position, &pagination, &scope)?;

        let projections = self.projection_list(plan, &scope, binds)?;
        let body = self.from_where_group(plan, &scope, binds)?;

        let mut head = String::from("SELECT");
        if plan.distinct {
            head.push_str(" DISTINCT");
        }
        if let Some(top) = pagination.top_sql() {
            head.push(' ');
            head.push_str(&top);
        }

        if let PaginationClause::RowNumber { offset, fetch } = pagination {
            let order = order.unwrap_or_else(|| synthesized_order(self.rules(), plan));
            let rn = quoting::quote(self.rules(), ROW_NUMBER_COLUMN);
            let rnt = quoting::quote(self.rules(), ROW_NUMBER_TABLE);
            let outer = self.row_number_projection(plan, position)?;
            let mut sql = format!(
                "SELECT {} FROM ({} {}, ROW_NUMBER() OVER (ORDER BY {}) AS {}{}) AS {} WHERE {}.{} > {}",
                outer, head, projections, order, rn, body, rnt, rnt, rn, offset
            );
            if let Some(fetch) = fetch {
                sql.push_str(&format!(" AND {}.{} <= {}", rnt, rn, offset.saturating_add(fetch)));
            }
            if position == QueryPosition::TopLevel {
                sql.push_str(&format!(" ORDER BY {}.{}", rnt, rn));
            }
            return Ok(sql);
        }

        let mut sql = format!("{} {}{}", head, projections, body);
        if let Some(order) = order {
            sql.push_str(" ORDER BY ");
            sql.push_str(&order);
        }
        if let Some(suffix) = pagination.suffix_sql() {
            sql.push(' ');
            sql.push_str(&suffix);
        }
        Ok(sql)
    }

    /// Columns the row number wrapper hands back
    ///
    /// Expressions must not see the row number column, so they list the
    /// inner columns by name and need every projection to have one.
    fn row_number_projection(&self, plan: &QueryPlan, position: QueryPosition) -> DialectResult<String> {
        if position != QueryPosition::Expression {
            return Ok("*".to_string());
        }

        let rnt = quoting::quote(self.rules(), ROW_NUMBER_TABLE);
        let mut columns = Vec::with_capacity(plan.projections.len());
        for projection in &plan.projections {
            let name = match projection {
                Projection::Column { alias: Some(alias), .. } | Projection::Subquery { alias, .. } => alias.as_str(),
                Projection::Column { column, alias: None } => column.name.as_str(),
                Projection::One => "one",
                _ => {
                    return Err(DialectError::UnsupportedOperation(
                        "an offset subquery without OFFSET/FETCH needs named columns".to_string(),
                    ))
                }
            };
            columns.push(format!("{}.{}", rnt, quoting::quote(self.rules(), name)));
        }

        if columns.is_empty() {
            return Err(DialectError::UnsupportedOperation(
                "an offset subquery without OFFSET/FETCH needs named columns".to_string(),
            ));
        }
        Ok(columns.join(", "))
    }

    /// ORDER BY text, if the query at this position carries one
    ///
    /// T-SQL rejects ORDER BY in subqueries and derived tables unless TOP or
    /// OFFSET is present, so unpaginated nested plans drop their ordering.
    fn order_clause(
        &self,
        plan: &QueryPlan,
        position: QueryPosition,
        pagination: &PaginationClause,
        scope: &[&Relation],
    ) -> DialectResult<Option<String>> {
        let keep_ordering = position == QueryPosition::TopLevel || *pagination != PaginationClause::None;

        if !plan.order_by.is_empty() && keep_ordering {
            let mut terms = Vec::with_capacity(plan.order_by.len());
            for term in &plan.order_by {
                terms.push(match term {
                    OrderTerm::Column { column, direction } => {
                        format!("{} {}", self.column_sql(scope, column)?, direction)
                    }
                    OrderTerm::Raw(sql) => sql.clone(),
                });
            }
            return Ok(Some(terms.join(", ")));
        }

        if pagination.needs_order() {
            return Ok(Some(synthesized_order(self.rules(), plan)));
        }

        Ok(None)
    }

    fn projection_list(
        &self,
        plan: &QueryPlan,
        scope: &[&Relation],
        binds: &mut BindCollector,
    ) -> DialectResult<String> {
        if plan.projections.is_empty() {
            return Ok(self.star(plan));
        }

        let mut items = Vec::with_capacity(plan.projections.len());
        for projection in &plan.projections {
            items.push(match projection {
                Projection::Star => self.star(plan),
                Projection::Column { column, alias } => {
                    let column_sql = self.column_sql(scope, column)?;
                    match alias {
                        Some(alias) => format!("{} AS {}", column_sql, quoting::quote(self.rules(), alias)),
                        None => column_sql,
                    }
                }
                Projection::Raw(sql) => sql.clone(),
                Projection::One => "1 AS one".to_string(),
                Projection::CountAll => "COUNT(*)".to_string(),
                Projection::Subquery { plan: subquery, alias } => {
                    let sql = self.lower_select(subquery, QueryPosition::Expression, scope, binds)?;
                    format!("({}) AS {}", sql, quoting::quote(self.rules(), alias))
                }
            });
        }
        Ok(items.join(", "))
    }

    /// `*` alone, or the source's columns when joins would add their own
    fn star(&self, plan: &QueryPlan) -> String {
        if plan.joins.is_empty() {
            "*".to_string()
        } else {
            format!("{}.*", self.reference_sql(&plan.source))
        }
    }

    pub(crate) fn reference_sql(&self, relation: &Relation) -> String {
        match &relation.alias {
            Some(alias) => quoting::quote(self.rules(), alias),
            None => quoting::quote_table_name(self.rules(), &relation.name),
        }
    }

    /// ` FROM .. JOIN .. WHERE .. GROUP BY ..`
    fn from_where_group(
        &self,
        plan: &QueryPlan,
        scope: &[&Relation],
        binds: &mut BindCollector,
    ) -> DialectResult<String> {
        let mut sql = format!(" FROM {}", self.quote_table(&plan.source)?);
        if let Some(lock) = &plan.lock {
            sql.push(' ');
            sql.push_str(&lock.to_string());
        }

        for join in &plan.joins {
            if join.on.is_empty() {
                return Err(DialectError::InvalidPlan(format!(
                    "join with '{}' has no join condition",
                    join.relation.name
                )));
            }
            let mut conditions = Vec::with_capacity(join.on.len());
            for (left, right) in &join.on {
                conditions.push(format!(
                    "{} = {}",
                    self.column_sql(scope, left)?,
                    self.column_sql(scope, right)?
                ));
            }
            sql.push_str(&format!(
                " {} {} ON {}",
                join.join_type,
                self.quote_table(&join.relation)?,
                conditions.join(" AND ")
            ));
        }

        sql.push_str(&self.where_clause(plan, scope, binds)?);

        if !plan.group_by.is_empty() {
            let mut columns = Vec::with_capacity(plan.group_by.len());
            for column in &plan.group_by {
                columns.push(self.column_sql(scope, column)?);
            }
            sql.push_str(" GROUP BY ");
            sql.push_str(&columns.join(", "));
        }

        Ok(sql)
    }

    /// ` WHERE ..`, or nothing when the plan has no predicates
    pub(crate) fn where_clause(
        &self,
        plan: &QueryPlan,
        scope: &[&Relation],
        binds: &mut BindCollector,
    ) -> DialectResult<String> {
        if plan.predicates.is_empty() {
            return Ok(String::new());
        }
        let mut conditions = Vec::with_capacity(plan.predicates.len());
        for predicate in &plan.predicates {
            conditions.push(self.lower_predicate(predicate, scope, binds)?.into_string());
        }
        Ok(format!(" WHERE {}", conditions.join(" AND ")))
    }

    /// Row count of a plan
    ///
    /// A paginated plan is counted through a derived table so that its limit
    /// and offset still apply; otherwise the projection becomes `COUNT(*)`.
    pub(crate) fn lower_count(&self, plan: &QueryPlan, binds: &mut BindCollector) -> DialectResult<String> {
        if plan.is_paginated() || plan.distinct {
            let mut inner = plan.clone();
            if !plan.distinct {
                inner.projections = vec![Projection::One];
            }
            let inner_sql = self.lower_select(&inner, QueryPosition::DerivedTable, &[], binds)?;
            return Ok(format!(
                "SELECT COUNT(*) AS {} FROM ({}) AS {}",
                quoting::quote(self.rules(), COUNT_ALIAS),
                inner_sql,
                quoting::quote(self.rules(), COUNT_SUBQUERY)
            ));
        }

        let mut counted = plan.clone();
        counted.projections = vec![Projection::CountAll];
        counted.order_by.clear();
        self.lower_select(&counted, QueryPosition::TopLevel, &[], binds)
    }
}
