//! SQL Server compiler - lowers query plans into T-SQL
//!
//! The compiler is a pure function of its dialect rules and handler
//! registry: both are fixed at construction and shared read-only.

pub mod dml;
pub mod pagination;
pub mod predicate;
pub mod registry;
pub mod select;

use std::fmt;
use std::sync::Arc;

use crate::config::DialectRules;
use crate::dispatch::Bind;
use crate::error::{DialectError, DialectResult};
use crate::plan::{ColumnRef, Relation};
use crate::quoting;
use crate::sanitize::{self, LiteralOrBind};
use crate::value::{SqlValue, TypeHint};

pub use pagination::{compile_pagination, PaginationClause};
pub use predicate::normalize_negation;
pub use registry::{HandlerKey, HandlerRegistry, PredicateHandler};

/// A piece of SQL text produced by the compiler or a handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlFragment(String);

impl SqlFragment {
    pub fn new(sql: impl Into<String>) -> Self {
        Self(sql.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for SqlFragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a SELECT sits in the statement being compiled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryPosition {
    /// The outermost statement
    TopLevel,
    /// A derived table in a FROM clause
    DerivedTable,
    /// A scalar, IN or EXISTS subquery inside an expression
    Expression,
}

/// How values reach the statement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ValueMode {
    Bind,
    Inline,
}

/// Collects bind parameters in statement order
#[derive(Debug)]
pub(crate) struct BindCollector {
    mode: ValueMode,
    binds: Vec<Bind>,
}

impl BindCollector {
    pub(crate) fn new(mode: ValueMode) -> Self {
        Self {
            mode,
            binds: Vec::new(),
        }
    }

    /// Lower a value to a literal or a named parameter
    pub(crate) fn lower(&mut self, rules: &DialectRules, value: &SqlValue) -> DialectResult<LiteralOrBind> {
        match (self.mode, value) {
            (_, SqlValue::Regex(_)) | (_, SqlValue::Custom { .. }) => {
                Err(DialectError::unsupported_literal(value.kind()))
            }
            (ValueMode::Inline, _) | (_, SqlValue::Null) => {
                Ok(LiteralOrBind::Literal(sanitize::sanitize(rules, value, None)?))
            }
            (ValueMode::Bind, _) => {
                let bind = Bind {
                    name: format!("{}{}", rules.bind_prefix, self.binds.len()),
                    value: value.clone(),
                    sql_type: TypeHint::for_value(rules, value),
                };
                self.binds.push(bind.clone());
                Ok(LiteralOrBind::Bind(bind))
            }
        }
    }

    pub(crate) fn into_binds(self) -> Vec<Bind> {
        self.binds
    }
}

/// Compiler from query plans to SQL Server text
#[derive(Debug, Clone)]
pub struct SqlServerCompiler {
    rules: Arc<DialectRules>,
    registry: Arc<HandlerRegistry>,
}

impl SqlServerCompiler {
    pub fn new(rules: DialectRules, registry: HandlerRegistry) -> Self {
        Self {
            rules: Arc::new(rules),
            registry: Arc::new(registry),
        }
    }

    /// Compiler with SQL Server rules and no custom handlers
    pub fn sqlserver() -> Self {
        Self::new(DialectRules::sqlserver(), HandlerRegistry::new())
    }

    pub fn rules(&self) -> &DialectRules {
        &self.rules
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub(crate) fn quote_table(&self, relation: &Relation) -> DialectResult<String> {
        for part in relation.name.split('.') {
            quoting::validate_identifier(&self.rules, part.trim_matches(['[', ']']))?;
        }
        let mut sql = quoting::quote_table_name(&self.rules, &relation.name);
        if let Some(alias) = &relation.alias {
            quoting::validate_identifier(&self.rules, alias)?;
            sql.push_str(" AS ");
            sql.push_str(&quoting::quote(&self.rules, alias));
        }
        Ok(sql)
    }

    /// Quote a column after checking it against the relations in scope
    pub(crate) fn column_sql(&self, scope: &[&Relation], column: &ColumnRef) -> DialectResult<String> {
        check_column(scope, column)?;
        Ok(quoting::quote_column(&self.rules, column))
    }
}

/// Every qualified column must name a relation in scope, and a relation with
/// a known column list must contain the column. An empty scope checks nothing.
pub(crate) fn check_column(scope: &[&Relation], column: &ColumnRef) -> DialectResult<()> {
    if scope.is_empty() {
        return Ok(());
    }
    match &column.table {
        Some(table) => {
            let relation = scope
                .iter()
                .rev()
                .find(|relation| relation.answers_to(table))
                .ok_or_else(|| {
                    DialectError::InvalidPlan(format!(
                        "column '{}' references relation '{}' which is not part of the query",
                        column, table
                    ))
                })?;
            if relation.has_column(&column.name) {
                Ok(())
            } else {
                Err(DialectError::InvalidPlan(format!(
                    "relation '{}' has no column '{}'",
                    table, column.name
                )))
            }
        }
        None => {
            if scope.iter().any(|relation| relation.has_column(&column.name)) {
                Ok(())
            } else {
                Err(DialectError::InvalidPlan(format!(
                    "column '{}' is not defined by any relation of the query",
                    column.name
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_column_qualified() {
        let topics = Relation::new("topics").columns(&["id", "title"]);
        let scope = vec![&topics];
        assert!(check_column(&scope, &ColumnRef::parse("topics.title")).is_ok());
        assert!(check_column(&scope, &ColumnRef::parse("topics.*")).is_ok());
        assert!(check_column(&scope, &ColumnRef::parse("topics.body")).is_err());
        assert!(check_column(&scope, &ColumnRef::parse("posts.title")).is_err());
    }

    #[test]
    fn test_check_column_unqualified() {
        let topics = Relation::new("topics").columns(&["id"]);
        let posts = Relation::new("posts");
        assert!(check_column(&[&topics], &ColumnRef::new("title")).is_err());
        assert!(check_column(&[&topics, &posts], &ColumnRef::new("title")).is_ok());
        assert!(check_column(&[], &ColumnRef::parse("anything.at_all")).is_ok());
    }

    #[test]
    fn test_bind_collector_modes() {
        let rules = DialectRules::sqlserver();

        let mut binds = BindCollector::new(ValueMode::Bind);
        let first = binds.lower(&rules, &SqlValue::Int(1)).unwrap();
        let null = binds.lower(&rules, &SqlValue::Null).unwrap();
        let second = binds.lower(&rules, &SqlValue::from("x")).unwrap();
        assert_eq!(first.sql(), "@0");
        assert_eq!(null.sql(), "NULL");
        assert_eq!(second.sql(), "@1");
        assert_eq!(binds.into_binds().len(), 2);

        let mut inline = BindCollector::new(ValueMode::Inline);
        assert_eq!(inline.lower(&rules, &SqlValue::from("x")).unwrap().sql(), "N'x'");
        assert!(inline.lower(&rules, &SqlValue::regex("x")).is_err());
    }
}
