//! INSERT, UPDATE and DELETE assembly

use crate::error::{DialectError, DialectResult};
use crate::plan::{QueryPlan, Relation, StatementKind};
use crate::quoting;

use super::{BindCollector, SqlServerCompiler};

impl SqlServerCompiler {
    pub(crate) fn lower_dml(&self, plan: &QueryPlan, binds: &mut BindCollector) -> DialectResult<String> {
        match plan.statement {
            StatementKind::Insert => self.lower_insert(plan, binds),
            StatementKind::Update => self.lower_update(plan, binds),
            StatementKind::Delete => self.lower_delete(plan, binds),
            StatementKind::Select => Err(DialectError::InvalidPlan(
                "SELECT plans are not data modification statements".to_string(),
            )),
        }
    }

    /// `INSERT INTO t (..) OUTPUT INSERTED.[pk] VALUES (..)`
    ///
    /// The OUTPUT clause is added for relations with an identity column so
    /// the caller receives the engine-assigned key.
    fn lower_insert(&self, plan: &QueryPlan, binds: &mut BindCollector) -> DialectResult<String> {
        let target = &plan.source;
        self.check_assignments(target, plan)?;

        let mut sql = format!("INSERT INTO {}", self.quote_table(target)?);

        let mut columns = Vec::with_capacity(plan.assignments.len());
        let mut values = Vec::with_capacity(plan.assignments.len());
        for assignment in &plan.assignments {
            columns.push(quoting::quote_column_name(self.rules(), &assignment.column));
            values.push(binds.lower(self.rules(), &assignment.value)?.sql().to_string());
        }
        if !columns.is_empty() {
            sql.push_str(&format!(" ({})", columns.join(", ")));
        }

        if let Some(identity) = &target.identity_column {
            let key = target.primary_key.as_deref().unwrap_or(identity);
            sql.push_str(&format!(
                " OUTPUT INSERTED.{}",
                quoting::quote_column_name(self.rules(), key)
            ));
        }

        if values.is_empty() {
            sql.push_str(" DEFAULT VALUES");
        } else {
            sql.push_str(&format!(" VALUES ({})", values.join(", ")));
        }
        Ok(sql)
    }

    fn lower_update(&self, plan: &QueryPlan, binds: &mut BindCollector) -> DialectResult<String> {
        let target = &plan.source;
        if plan.assignments.is_empty() {
            return Err(DialectError::InvalidPlan(format!(
                "UPDATE of '{}' assigns no columns",
                target.name
            )));
        }
        if let Some(assignment) = plan.assignments.iter().find(|a| target.is_identity(&a.column)) {
            return Err(DialectError::IdentityColumnImmutable {
                table: target.name.clone(),
                column: assignment.column.clone(),
            });
        }
        self.check_assignments(target, plan)?;

        let mut sql = String::from("UPDATE");
        if let Some(top) = self.dml_top(plan)? {
            sql.push(' ');
            sql.push_str(&top);
        }
        sql.push(' ');
        sql.push_str(&self.quote_table(target)?);
        if let Some(lock) = &plan.lock {
            sql.push(' ');
            sql.push_str(&lock.to_string());
        }

        let mut sets = Vec::with_capacity(plan.assignments.len());
        for assignment in &plan.assignments {
            sets.push(format!(
                "{} = {}",
                quoting::quote_column_name(self.rules(), &assignment.column),
                binds.lower(self.rules(), &assignment.value)?.sql()
            ));
        }
        sql.push_str(" SET ");
        sql.push_str(&sets.join(", "));
        sql.push_str(&self.where_clause(plan, &[target], binds)?);
        Ok(sql)
    }

    fn lower_delete(&self, plan: &QueryPlan, binds: &mut BindCollector) -> DialectResult<String> {
        let target = &plan.source;
        let mut sql = String::from("DELETE");
        if let Some(top) = self.dml_top(plan)? {
            sql.push(' ');
            sql.push_str(&top);
        }
        sql.push_str(" FROM ");
        sql.push_str(&self.quote_table(target)?);
        if let Some(lock) = &plan.lock {
            sql.push(' ');
            sql.push_str(&lock.to_string());
        }
        sql.push_str(&self.where_clause(plan, &[target], binds)?);
        Ok(sql)
    }

    /// Row limit of an UPDATE or DELETE, which only accept `TOP (n)`
    fn dml_top(&self, plan: &QueryPlan) -> DialectResult<Option<String>> {
        if !plan.joins.is_empty() {
            return Err(DialectError::UnsupportedOperation(format!(
                "{:?} statements with joins",
                plan.statement
            )));
        }
        if plan.offset.is_some() {
            return Err(DialectError::UnsupportedOperation(format!(
                "{:?} statements with an offset",
                plan.statement
            )));
        }
        if !plan.order_by.is_empty() {
            return Err(DialectError::UnsupportedOperation(format!(
                "{:?} statements with ORDER BY",
                plan.statement
            )));
        }
        Ok(plan.limit.map(|n| format!("TOP ({})", n)))
    }

    fn check_assignments(&self, target: &Relation, plan: &QueryPlan) -> DialectResult<()> {
        for assignment in &plan.assignments {
            quoting::validate_identifier(self.rules(), &assignment.column)?;
            if !target.has_column(&assignment.column) {
                return Err(DialectError::InvalidPlan(format!(
                    "relation '{}' has no column '{}'",
                    target.name, assignment.column
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::ValueMode;
    use crate::plan::LockHint;

    fn sql(plan: &QueryPlan) -> DialectResult<String> {
        let mut binds = BindCollector::new(ValueMode::Inline);
        SqlServerCompiler::sqlserver().lower_dml(plan, &mut binds)
    }

    fn companies() -> Relation {
        Relation::new("companies").identity("id")
    }

    #[test]
    fn test_insert_outputs_identity() {
        let plan = QueryPlan::insert_into(companies()).set("name", "Acme");
        assert_eq!(
            sql(&plan).unwrap(),
            "INSERT INTO [companies] ([name]) OUTPUT INSERTED.[id] VALUES (N'Acme')"
        );

        let plan = QueryPlan::insert_into(companies());
        assert_eq!(
            sql(&plan).unwrap(),
            "INSERT INTO [companies] OUTPUT INSERTED.[id] DEFAULT VALUES"
        );

        let plan = QueryPlan::insert_into("logs").set("line", "x");
        assert_eq!(sql(&plan).unwrap(), "INSERT INTO [logs] ([line]) VALUES (N'x')");
    }

    #[test]
    fn test_update_rejects_identity_column() {
        let plan = QueryPlan::update(companies()).set("id", 100).where_eq("id", 1);
        assert_eq!(
            sql(&plan).unwrap_err(),
            DialectError::IdentityColumnImmutable {
                table: "companies".to_string(),
                column: "id".to_string()
            }
        );
    }

    #[test]
    fn test_update_and_delete() {
        let plan = QueryPlan::update(companies())
            .set("name", "It's")
            .where_eq("id", 1)
            .lock(LockHint::RowLock);
        assert_eq!(
            sql(&plan).unwrap(),
            "UPDATE [companies] WITH(ROWLOCK) SET [name] = N'It''s' WHERE [id] = 1"
        );

        let plan = QueryPlan::delete_from(companies()).where_lt("id", 10).limit(5);
        assert_eq!(
            sql(&plan).unwrap(),
            "DELETE TOP (5) FROM [companies] WHERE [id] < 10"
        );
    }

    #[test]
    fn test_dml_rejects_offset() {
        let plan = QueryPlan::delete_from(companies()).offset(2);
        assert!(matches!(
            sql(&plan).unwrap_err(),
            DialectError::UnsupportedOperation(_)
        ));
    }

    #[test]
    fn test_unknown_assignment_column() {
        let target = Relation::new("companies").columns(&["id", "name"]);
        let plan = QueryPlan::insert_into(target).set("rating", 5);
        assert!(matches!(sql(&plan).unwrap_err(), DialectError::InvalidPlan(_)));
    }
}
