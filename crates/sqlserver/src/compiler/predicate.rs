//! Predicate compilation
//!
//! Negations are pushed down to the leaves before lowering. Comparison
//! operators flip, keyword predicates (IN, LIKE, IS NULL, BETWEEN, EXISTS)
//! take their negated form, and only raw and handler-produced fragments are
//! left under an explicit `NOT (..)`.

use crate::error::{DialectError, DialectResult};
use crate::plan::{ComparisonOp, MembershipSet, Predicate, Relation};
use crate::sanitize;
use crate::value::SqlValue;

use super::{BindCollector, QueryPosition, SqlFragment, SqlServerCompiler, ValueMode};

/// Rewrite a predicate so that negation only wraps raw or custom leaves
pub fn normalize_negation(predicate: &Predicate) -> Predicate {
    match predicate {
        Predicate::Negation(inner) => negate(inner),
        Predicate::And(parts) => Predicate::And(parts.iter().map(normalize_negation).collect()),
        Predicate::Or(parts) => Predicate::Or(parts.iter().map(normalize_negation).collect()),
        other => other.clone(),
    }
}

fn negate(predicate: &Predicate) -> Predicate {
    match predicate {
        Predicate::Negation(inner) => normalize_negation(inner),
        Predicate::And(parts) => Predicate::Or(parts.iter().map(negate).collect()),
        Predicate::Or(parts) => Predicate::And(parts.iter().map(negate).collect()),
        Predicate::Comparison { column, op, value } => Predicate::Comparison {
            column: column.clone(),
            op: op.negate(),
            value: value.clone(),
        },
        Predicate::SetMembership { column, set, negated } => Predicate::SetMembership {
            column: column.clone(),
            set: set.clone(),
            negated: !negated,
        },
        Predicate::Like {
            column,
            pattern,
            escape,
            negated,
        } => Predicate::Like {
            column: column.clone(),
            pattern: pattern.clone(),
            escape: *escape,
            negated: !negated,
        },
        Predicate::IsNull { column, negated } => Predicate::IsNull {
            column: column.clone(),
            negated: !negated,
        },
        Predicate::Between {
            column,
            low,
            high,
            negated,
        } => Predicate::Between {
            column: column.clone(),
            low: low.clone(),
            high: high.clone(),
            negated: !negated,
        },
        Predicate::Exists { plan, negated } => Predicate::Exists {
            plan: plan.clone(),
            negated: !negated,
        },
        Predicate::Raw { .. } | Predicate::Custom { .. } => Predicate::Negation(Box::new(predicate.clone())),
    }
}

fn not_keyword(negated: bool) -> &'static str {
    if negated {
        "NOT "
    } else {
        ""
    }
}

impl SqlServerCompiler {
    /// Compile a standalone predicate with values inlined as literals
    pub fn compile_predicate(&self, predicate: &Predicate) -> DialectResult<SqlFragment> {
        let mut binds = BindCollector::new(ValueMode::Inline);
        self.lower_predicate(predicate, &[], &mut binds)
    }

    pub(crate) fn lower_predicate(
        &self,
        predicate: &Predicate,
        scope: &[&Relation],
        binds: &mut BindCollector,
    ) -> DialectResult<SqlFragment> {
        let normalized = normalize_negation(predicate);
        self.lower_normalized(&normalized, scope, binds).map(SqlFragment::new)
    }

    fn lower_normalized(
        &self,
        predicate: &Predicate,
        scope: &[&Relation],
        binds: &mut BindCollector,
    ) -> DialectResult<String> {
        let rules = self.rules();
        match predicate {
            Predicate::Comparison { column, op, value } => {
                let column_sql = self.column_sql(scope, column)?;
                self.lower_comparison(&column_sql, *op, value, binds)
            }
            Predicate::Negation(inner) => {
                let inner_sql = self.lower_normalized(inner, scope, binds)?;
                match inner.as_ref() {
                    Predicate::Raw { .. } => Ok(format!("NOT {}", inner_sql)),
                    _ => Ok(format!("NOT ({})", inner_sql)),
                }
            }
            Predicate::SetMembership { column, set, negated } => {
                let column_sql = self.column_sql(scope, column)?;
                match set {
                    MembershipSet::Values(values) if values.is_empty() => {
                        Ok(if *negated { "1=1" } else { "1=0" }.to_string())
                    }
                    MembershipSet::Values(values) => {
                        let mut items = Vec::with_capacity(values.len());
                        for value in values {
                            items.push(binds.lower(rules, value)?.sql().to_string());
                        }
                        Ok(format!(
                            "{} {}IN ({})",
                            column_sql,
                            not_keyword(*negated),
                            items.join(", ")
                        ))
                    }
                    MembershipSet::Subquery(plan) => {
                        let subquery = self.lower_select(plan, QueryPosition::Expression, scope, binds)?;
                        Ok(format!("{} {}IN ({})", column_sql, not_keyword(*negated), subquery))
                    }
                }
            }
            Predicate::Like {
                column,
                pattern,
                escape,
                negated,
            } => {
                let column_sql = self.column_sql(scope, column)?;
                let pattern = binds.lower(rules, &SqlValue::String(pattern.clone()))?;
                let mut sql = format!("{} {}LIKE {}", column_sql, not_keyword(*negated), pattern.sql());
                if let Some(escape) = escape {
                    let escape = escape.to_string().replace('\'', "''");
                    sql.push_str(&format!(" ESCAPE '{}'", escape));
                }
                Ok(sql)
            }
            Predicate::Custom {
                handler,
                column,
                payload,
            } => {
                let column_sql = self.column_sql(scope, column)?;
                let handler_fn = self
                    .registry()
                    .handler_named(handler)
                    .ok_or_else(|| DialectError::UnsupportedLiteralKind { kind: handler.clone() })?;
                Ok(handler_fn(&column_sql, payload)?.into_string())
            }
            Predicate::IsNull { column, negated } => {
                let column_sql = self.column_sql(scope, column)?;
                Ok(format!("{} IS {}NULL", column_sql, not_keyword(*negated)))
            }
            Predicate::Between {
                column,
                low,
                high,
                negated,
            } => {
                let column_sql = self.column_sql(scope, column)?;
                let low = binds.lower(rules, low)?;
                let high = binds.lower(rules, high)?;
                Ok(format!(
                    "{} {}BETWEEN {} AND {}",
                    column_sql,
                    not_keyword(*negated),
                    low.sql(),
                    high.sql()
                ))
            }
            Predicate::Exists { plan, negated } => {
                let subquery = self.lower_select(plan, QueryPosition::Expression, scope, binds)?;
                Ok(format!("{}EXISTS ({})", not_keyword(*negated), subquery))
            }
            Predicate::And(parts) => self.lower_group(parts, " AND ", "1=1", scope, binds),
            Predicate::Or(parts) => self.lower_group(parts, " OR ", "1=0", scope, binds),
            Predicate::Raw { sql, values } => {
                let sql = sanitize::replace_placeholders(rules, sql, values)?;
                Ok(format!("({})", sql))
            }
        }
    }

    fn lower_group(
        &self,
        parts: &[Predicate],
        separator: &str,
        empty: &str,
        scope: &[&Relation],
        binds: &mut BindCollector,
    ) -> DialectResult<String> {
        match parts {
            [] => Ok(empty.to_string()),
            [single] => self.lower_normalized(single, scope, binds),
            _ => {
                let mut lowered = Vec::with_capacity(parts.len());
                for part in parts {
                    lowered.push(self.lower_normalized(part, scope, binds)?);
                }
                Ok(format!("({})", lowered.join(separator)))
            }
        }
    }

    fn lower_comparison(
        &self,
        column_sql: &str,
        op: ComparisonOp,
        value: &SqlValue,
        binds: &mut BindCollector,
    ) -> DialectResult<String> {
        if let Some(handler) = self.registry().handler_for_value(value) {
            let fragment = handler(column_sql, value)?;
            return match op {
                ComparisonOp::Eq => Ok(fragment.into_string()),
                ComparisonOp::NotEq => Ok(format!("NOT ({})", fragment)),
                other => Err(DialectError::UnsupportedOperation(format!(
                    "operator '{}' cannot be applied to {} values",
                    other,
                    value.kind()
                ))),
            };
        }

        if value.is_null() {
            return match op {
                ComparisonOp::Eq => Ok(format!("{} IS NULL", column_sql)),
                ComparisonOp::NotEq => Ok(format!("{} IS NOT NULL", column_sql)),
                other => Err(DialectError::InvalidPlan(format!(
                    "cannot compare {} with NULL using '{}'",
                    column_sql, other
                ))),
            };
        }

        let rhs = binds.lower(self.rules(), value)?;
        Ok(format!("{} {} {}", column_sql, op, rhs.sql()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::HandlerRegistry;
    use crate::config::DialectRules;
    use crate::plan::{ColumnRef, QueryPlan};
    use crate::value::ValueKind;

    fn compiler() -> SqlServerCompiler {
        SqlServerCompiler::sqlserver()
    }

    fn sql(predicate: &Predicate) -> String {
        compiler().compile_predicate(predicate).unwrap().into_string()
    }

    #[test]
    fn test_comparison() {
        assert_eq!(sql(&Predicate::eq("topics.title", "Budget")), "[topics].[title] = N'Budget'");
        assert_eq!(
            sql(&Predicate::compare("id", ComparisonOp::NotEq, 5)),
            "[id] <> 5"
        );
        assert_eq!(sql(&Predicate::eq("parent_id", SqlValue::Null)), "[parent_id] IS NULL");
    }

    #[test]
    fn test_de_morgan_negation() {
        // NOT (a AND b) is (NOT a OR NOT b), never (NOT a AND NOT b)
        let predicate = Predicate::not(Predicate::and(vec![
            Predicate::eq("a", 1),
            Predicate::compare("b", ComparisonOp::Gt, 2),
        ]));
        assert_eq!(sql(&predicate), "([a] <> 1 OR [b] <= 2)");

        let predicate = Predicate::not(Predicate::or(vec![
            Predicate::eq("a", 1),
            Predicate::like("b", "x%"),
        ]));
        assert_eq!(sql(&predicate), "([a] <> 1 AND [b] NOT LIKE N'x%')");
    }

    #[test]
    fn test_double_negation_cancels() {
        let predicate = Predicate::not(Predicate::not(Predicate::eq("a", 1)));
        assert_eq!(sql(&predicate), "[a] = 1");

        let predicate = Predicate::not(Predicate::not(Predicate::not(Predicate::in_values(
            "a",
            vec![1, 2],
        ))));
        assert_eq!(sql(&predicate), "[a] NOT IN (1, 2)");
    }

    #[test]
    fn test_negated_raw_fragment() {
        let predicate = Predicate::not(Predicate::raw("title = ?", vec![SqlValue::from("hello")]));
        assert_eq!(sql(&predicate), "NOT (title = N'hello')");
    }

    #[test]
    fn test_keyword_negations() {
        let predicate = Predicate::not(Predicate::IsNull {
            column: ColumnRef::new("a"),
            negated: false,
        });
        assert_eq!(sql(&predicate), "[a] IS NOT NULL");

        let predicate = Predicate::not(Predicate::Between {
            column: ColumnRef::new("a"),
            low: SqlValue::Int(1),
            high: SqlValue::Int(9),
            negated: false,
        });
        assert_eq!(sql(&predicate), "[a] NOT BETWEEN 1 AND 9");
    }

    #[test]
    fn test_empty_in_list() {
        assert_eq!(sql(&Predicate::in_values("a", Vec::<i64>::new())), "1=0");
        assert_eq!(
            sql(&Predicate::not(Predicate::in_values("a", Vec::<i64>::new()))),
            "1=1"
        );
    }

    #[test]
    fn test_like_with_escape() {
        let predicate = Predicate::Like {
            column: ColumnRef::new("title"),
            pattern: sanitize::sanitize_sql_like("20% off", Some('!')),
            escape: Some('!'),
            negated: false,
        };
        assert_eq!(sql(&predicate), "[title] LIKE N'20!% off' ESCAPE '!'");
    }

    #[test]
    fn test_regex_without_handler_is_unsupported() {
        let err = compiler()
            .compile_predicate(&Predicate::eq("title", SqlValue::regex("rails")))
            .unwrap_err();
        assert_eq!(
            err,
            DialectError::UnsupportedLiteralKind {
                kind: "regex".to_string()
            }
        );
    }

    #[test]
    fn test_registered_handlers() {
        let mut registry = HandlerRegistry::new();
        registry
            .register_handler(ValueKind::Regex, |column, value| match value {
                SqlValue::Regex(source) => Ok(SqlFragment::new(format!("{} ~ {}", column, source))),
                other => Err(DialectError::unsupported_literal(other.kind())),
            })
            .register_named("near", |column, payload| {
                Ok(SqlFragment::new(format!("{}.STDistance({}) < 10", column, payload.to_json())))
            });
        let compiler = SqlServerCompiler::new(DialectRules::sqlserver(), registry);

        let regex = Predicate::eq("topics.title", SqlValue::regex("rails"));
        assert_eq!(compiler.compile_predicate(&regex).unwrap().as_str(), "[topics].[title] ~ rails");
        assert_eq!(
            compiler.compile_predicate(&Predicate::not(regex)).unwrap().as_str(),
            "NOT ([topics].[title] ~ rails)"
        );

        let custom = Predicate::Custom {
            handler: "near".to_string(),
            column: ColumnRef::new("location"),
            payload: SqlValue::Int(3),
        };
        assert_eq!(
            compiler.compile_predicate(&Predicate::not(custom)).unwrap().as_str(),
            "NOT ([location].STDistance(3) < 10)"
        );
    }

    #[test]
    fn test_subquery_membership_uses_top() {
        let subquery = QueryPlan::select("comments").columns(&["post_id"]).limit(5);
        let predicate = Predicate::SetMembership {
            column: ColumnRef::new("id"),
            set: MembershipSet::Subquery(Box::new(subquery)),
            negated: false,
        };
        assert_eq!(
            sql(&predicate),
            "[id] IN (SELECT TOP (5) [post_id] FROM [comments])"
        );
    }

    #[test]
    fn test_negation_normalization_is_structural() {
        let predicate = Predicate::not(Predicate::and(vec![
            Predicate::eq("a", 1),
            Predicate::not(Predicate::eq("b", 2)),
        ]));
        assert_eq!(
            normalize_negation(&predicate),
            Predicate::or(vec![
                Predicate::compare("a", ComparisonOp::NotEq, 1),
                Predicate::eq("b", 2),
            ])
        );
    }
}
