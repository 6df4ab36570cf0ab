//! Statement dispatch
//!
//! Turns compiled SQL into the text actually sent to the server. Statements
//! carrying bind parameters go out as a remote procedure call to
//! `sp_executesql`; everything else is sent inline.

use tokio_util::sync::CancellationToken;

use crate::compiler::{BindCollector, QueryPosition, SqlServerCompiler, ValueMode};
use crate::error::{DialectError, DialectResult};
use crate::plan::{QueryPlan, StatementKind};
use crate::quoting;
use crate::sanitize;
use crate::value::{SqlValue, TypeHint};

/// A named parameter sent alongside the statement
#[derive(Debug, Clone, PartialEq)]
pub struct Bind {
    /// `@0`, `@1`, .. in statement order
    pub name: String,
    pub value: SqlValue,
    pub sql_type: TypeHint,
}

/// How the driver should send the statement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Plain SQL batch
    Inline,
    /// `EXEC sp_executesql` call with typed parameters
    RemoteProcCall,
}

/// Caller preference for how values reach the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatementMode {
    /// Bind values; use a remote procedure call only when there are binds
    #[default]
    Auto,
    /// Always go through `sp_executesql`
    Prepared,
    /// Inline every value as a sanitized literal
    Unprepared,
}

/// Final statement handed to the driver
#[derive(Debug, Clone)]
pub struct CompiledStatement {
    pub text: String,
    pub binds: Vec<Bind>,
    pub execution_mode: ExecutionMode,
    /// Rows arrive in reverse of the requested order
    pub reverse_result: bool,
    /// Passed through to the driver untouched
    pub cancellation: Option<CancellationToken>,
}

impl CompiledStatement {
    /// Inline statement without binds, e.g. transaction control
    pub fn inline(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            binds: Vec::new(),
            execution_mode: ExecutionMode::Inline,
            reverse_result: false,
            cancellation: None,
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .map_or(false, CancellationToken::is_cancelled)
    }
}

impl SqlServerCompiler {
    /// Compile a plan into an executable statement
    pub fn compile_statement(&self, plan: &QueryPlan, mode: StatementMode) -> DialectResult<CompiledStatement> {
        let mut binds = BindCollector::new(value_mode(mode));
        let sql = match plan.statement {
            StatementKind::Select => {
                self.lower_select(plan, QueryPosition::TopLevel, &[], &mut binds)?
            }
            _ => self.lower_dml(plan, &mut binds)?,
        };
        self.dispatch(sql, binds.into_binds(), mode, plan.reverse_result)
    }

    /// Compile a row count of a plan
    pub fn compile_count_statement(&self, plan: &QueryPlan, mode: StatementMode) -> DialectResult<CompiledStatement> {
        let mut binds = BindCollector::new(value_mode(mode));
        let sql = self.lower_count(plan, &mut binds)?;
        self.dispatch(sql, binds.into_binds(), mode, false)
    }

    /// Unprepared SQL text of a plan
    pub fn to_sql(&self, plan: &QueryPlan) -> DialectResult<String> {
        Ok(self.compile_statement(plan, StatementMode::Unprepared)?.text)
    }

    /// `SET IDENTITY_INSERT <table> ON|OFF`
    pub fn identity_insert_sql(&self, table: &str, enabled: bool) -> DialectResult<String> {
        if !self.rules().identity_insert {
            return Err(DialectError::UnsupportedOperation(
                "explicit identity values are not supported by this dialect".to_string(),
            ));
        }
        quoting::validate_identifier(self.rules(), table)?;
        Ok(format!(
            "SET IDENTITY_INSERT {} {}",
            quoting::quote_table_name(self.rules(), table),
            if enabled { "ON" } else { "OFF" }
        ))
    }

    fn dispatch(
        &self,
        sql: String,
        binds: Vec<Bind>,
        mode: StatementMode,
        reverse_result: bool,
    ) -> DialectResult<CompiledStatement> {
        let execution_mode = match mode {
            StatementMode::Auto if binds.is_empty() => ExecutionMode::Inline,
            StatementMode::Unprepared => ExecutionMode::Inline,
            _ => ExecutionMode::RemoteProcCall,
        };

        let text = match execution_mode {
            ExecutionMode::Inline => sql,
            ExecutionMode::RemoteProcCall => self.wrap_executesql(&sql, &binds)?,
        };
        tracing::debug!("Compiled {:?} statement: {}", execution_mode, text);

        Ok(CompiledStatement {
            text,
            binds,
            execution_mode,
            reverse_result,
            cancellation: None,
        })
    }

    /// `EXEC sp_executesql N'<sql>', N'<declarations>', @0 = .., ..`
    fn wrap_executesql(&self, sql: &str, binds: &[Bind]) -> DialectResult<String> {
        let rules = self.rules();
        let mut text = format!("EXEC sp_executesql N'{}'", sql.replace('\'', "''"));
        if binds.is_empty() {
            return Ok(text);
        }

        let declarations: Vec<String> = binds
            .iter()
            .map(|bind| format!("{} {}", bind.name, bind.sql_type.as_sql(rules)))
            .collect();
        text.push_str(&format!(", N'{}'", declarations.join(", ")));

        for bind in binds {
            let literal = sanitize::sanitize(rules, &bind.value, Some(bind.sql_type))?;
            text.push_str(&format!(", {} = {}", bind.name, literal));
        }
        Ok(text)
    }
}

fn value_mode(mode: StatementMode) -> ValueMode {
    match mode {
        StatementMode::Unprepared => ValueMode::Inline,
        StatementMode::Auto | StatementMode::Prepared => ValueMode::Bind,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::Relation;

    fn compiler() -> SqlServerCompiler {
        SqlServerCompiler::sqlserver()
    }

    #[test]
    fn test_auto_mode_with_binds_uses_executesql() {
        let plan = QueryPlan::select("topics").where_eq("title", "It's").where_gt("id", 3);
        let statement = compiler().compile_statement(&plan, StatementMode::Auto).unwrap();

        assert_eq!(statement.execution_mode, ExecutionMode::RemoteProcCall);
        assert_eq!(statement.binds.len(), 2);
        assert_eq!(
            statement.text,
            "EXEC sp_executesql N'SELECT * FROM [topics] WHERE [title] = @0 AND [id] > @1', N'@0 nvarchar(4000), @1 int', @0 = N'It''s', @1 = 3"
        );
    }

    #[test]
    fn test_auto_mode_without_binds_is_inline() {
        let plan = QueryPlan::select("topics").where_null("parent_id");
        let statement = compiler().compile_statement(&plan, StatementMode::Auto).unwrap();
        assert_eq!(statement.execution_mode, ExecutionMode::Inline);
        assert_eq!(statement.text, "SELECT * FROM [topics] WHERE [parent_id] IS NULL");
    }

    #[test]
    fn test_prepared_mode_always_wraps() {
        let plan = QueryPlan::select("topics").where_raw("title = ?", vec![SqlValue::from("a'b")]);
        let statement = compiler().compile_statement(&plan, StatementMode::Prepared).unwrap();
        assert_eq!(statement.execution_mode, ExecutionMode::RemoteProcCall);
        assert_eq!(
            statement.text,
            "EXEC sp_executesql N'SELECT * FROM [topics] WHERE (title = N''a''''b'')'"
        );
    }

    #[test]
    fn test_unprepared_inlines_values() {
        let plan = QueryPlan::select("topics").where_eq("title", "x");
        assert_eq!(
            compiler().to_sql(&plan).unwrap(),
            "SELECT * FROM [topics] WHERE [title] = N'x'"
        );
    }

    #[test]
    fn test_reverse_result_and_cancellation_pass_through() {
        let plan = QueryPlan::select(Relation::new("topics").primary_key("id")).last(5);
        let token = CancellationToken::new();
        let statement = compiler()
            .compile_statement(&plan, StatementMode::Auto)
            .unwrap()
            .with_cancellation(token.clone());

        assert!(statement.reverse_result);
        assert!(statement.text.contains("ORDER BY [topics].[id] DESC OFFSET 0 ROWS FETCH NEXT 5 ROWS ONLY"));
        assert!(!statement.is_cancelled());
        token.cancel();
        assert!(statement.is_cancelled());
    }

    #[test]
    fn test_identity_insert_sql() {
        assert_eq!(
            compiler().identity_insert_sql("dbo.companies", true).unwrap(),
            "SET IDENTITY_INSERT [dbo].[companies] ON"
        );
        assert_eq!(
            compiler().identity_insert_sql("companies", false).unwrap(),
            "SET IDENTITY_INSERT [companies] OFF"
        );
    }
}
