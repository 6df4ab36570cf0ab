//! SQL Server connection adapter
//!
//! Owns a driver connection together with the compiler and the transaction
//! state of that connection. All operations take `&mut self`: a connection
//! runs one statement at a time.

use tracing::{debug, warn};

use crate::compiler::{HandlerRegistry, SqlServerCompiler};
use crate::config::DialectRules;
use crate::dispatch::{CompiledStatement, StatementMode};
use crate::driver::{Driver, DriverFuture, Row};
use crate::error::{DialectError, DialectResult};
use crate::inheritance::SubclassRegistry;
use crate::plan::{QueryPlan, StatementKind};
use crate::transaction::{is_deadlock_victim, IsolationLevel, TransactionConfig, TransactionController};
use crate::value::SqlValue;

/// Dialect adapter over a driver connection
pub struct SqlServerAdapter<D: Driver> {
    driver: D,
    compiler: SqlServerCompiler,
    transactions: TransactionController,
    statement_mode: StatementMode,
    /// Table with `IDENTITY_INSERT` currently ON
    identity_insert_table: Option<String>,
}

impl<D: Driver> SqlServerAdapter<D> {
    pub fn new(driver: D, rules: DialectRules, registry: HandlerRegistry) -> Self {
        Self {
            driver,
            transactions: TransactionController::new(rules.clone()),
            compiler: SqlServerCompiler::new(rules, registry),
            statement_mode: StatementMode::Auto,
            identity_insert_table: None,
        }
    }

    /// Adapter with SQL Server rules and no custom handlers
    pub fn sqlserver(driver: D) -> Self {
        Self::new(driver, DialectRules::sqlserver(), HandlerRegistry::new())
    }

    pub fn statement_mode(mut self, mode: StatementMode) -> Self {
        self.statement_mode = mode;
        self
    }

    pub fn compiler(&self) -> &SqlServerCompiler {
        &self.compiler
    }

    pub fn transactions(&self) -> &TransactionController {
        &self.transactions
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    pub fn into_driver(self) -> D {
        self.driver
    }

    /// Unprepared SQL text of a plan
    pub fn to_sql(&self, plan: &QueryPlan) -> DialectResult<String> {
        self.compiler.to_sql(plan)
    }

    /// Execute a caller-written statement as is
    pub async fn execute_raw(&mut self, sql: &str) -> DialectResult<u64> {
        self.driver.execute(&CompiledStatement::inline(sql)).await
    }

    /// Execute any plan and return the affected row count
    pub async fn execute(&mut self, plan: &QueryPlan) -> DialectResult<u64> {
        let statement = self.compiler.compile_statement(plan, self.statement_mode)?;
        self.driver.execute(&statement).await
    }

    /// Fetch the rows of a SELECT plan in the requested order
    pub async fn select_all(&mut self, plan: &QueryPlan) -> DialectResult<Vec<Row>> {
        let statement = self.compiler.compile_statement(plan, self.statement_mode)?;
        self.fetch(&statement).await
    }

    /// Fetch the rows of a compiled statement, e.g. one carrying a cancellation token
    pub async fn fetch(&mut self, statement: &CompiledStatement) -> DialectResult<Vec<Row>> {
        let mut rows = self.driver.fetch_all(statement).await?;
        if statement.reverse_result {
            rows.reverse();
        }
        Ok(rows)
    }

    /// Count the rows of a plan
    ///
    /// Inside a READ COMMITTED transaction the count reads past locked rows
    /// unless the plan carries its own table hint.
    pub async fn count(&mut self, plan: &QueryPlan) -> DialectResult<i64> {
        let mut plan = plan.clone();
        if plan.lock.is_none() {
            plan.lock = self.transactions.read_hint();
        }

        let statement = self.compiler.compile_count_statement(&plan, self.statement_mode)?;
        let rows = self.driver.fetch_all(&statement).await?;
        match rows.first().and_then(|row| row.get_by_index(0)) {
            Some(SqlValue::Int(count)) => Ok(*count),
            Some(other) => Err(DialectError::Driver(format!("count returned a non-integer value: {:?}", other))),
            None => Err(DialectError::Driver("count returned no rows".to_string())),
        }
    }

    /// Whether the plan matches any row
    pub async fn exists(&mut self, plan: &QueryPlan) -> DialectResult<bool> {
        let probe = plan.clone().exists();
        Ok(!self.select_all(&probe).await?.is_empty())
    }

    /// Insert a row and return the engine-assigned key, if the relation has one
    ///
    /// Assigning the identity column explicitly turns on `IDENTITY_INSERT`
    /// for the duration of the statement.
    pub async fn insert(&mut self, plan: &QueryPlan) -> DialectResult<Option<SqlValue>> {
        if plan.statement != StatementKind::Insert {
            return Err(DialectError::InvalidPlan("insert expects an INSERT plan".to_string()));
        }

        let assigns_identity = plan
            .assignments
            .iter()
            .any(|assignment| plan.source.is_identity(&assignment.column));
        let table = plan.source.name.clone();

        if assigns_identity && !self.identity_insert_enabled(&table) {
            let plan = plan.clone();
            return self
                .with_identity_insert_enabled(&table, move |adapter| {
                    Box::pin(async move { adapter.insert_row(&plan).await })
                })
                .await;
        }

        self.insert_row(plan).await
    }

    async fn insert_row(&mut self, plan: &QueryPlan) -> DialectResult<Option<SqlValue>> {
        let statement = self.compiler.compile_statement(plan, self.statement_mode)?;
        let key = match &plan.source.identity_column {
            Some(identity) => plan.source.primary_key.clone().unwrap_or_else(|| identity.clone()),
            None => {
                self.driver.execute(&statement).await?;
                return Ok(None);
            }
        };

        let rows = self.driver.fetch_all(&statement).await?;
        Ok(rows.first().and_then(|row| row.get(&key)).cloned())
    }

    /// Update rows and return the affected count
    pub async fn update(&mut self, plan: &QueryPlan) -> DialectResult<u64> {
        if plan.statement != StatementKind::Update {
            return Err(DialectError::InvalidPlan("update expects an UPDATE plan".to_string()));
        }
        self.execute(plan).await
    }

    /// Delete rows and return the affected count
    pub async fn delete(&mut self, plan: &QueryPlan) -> DialectResult<u64> {
        if plan.statement != StatementKind::Delete {
            return Err(DialectError::InvalidPlan("delete expects a DELETE plan".to_string()));
        }
        self.execute(plan).await
    }

    /// Run `block` with `IDENTITY_INSERT` enabled for `table`
    ///
    /// The setting is always switched off again, whether the block succeeds
    /// or not. When both the block and the switch-off fail, the block's error
    /// is returned and the other is logged.
    pub async fn with_identity_insert_enabled<F, T>(&mut self, table: &str, block: F) -> DialectResult<T>
    where
        F: for<'c> FnOnce(&'c mut Self) -> DriverFuture<'c, DialectResult<T>>,
    {
        if let Some(active) = &self.identity_insert_table {
            if active != table {
                return Err(DialectError::UnsupportedOperation(format!(
                    "IDENTITY_INSERT is already ON for table '{}'",
                    active
                )));
            }
            return block(self).await;
        }

        let enable = self.compiler.identity_insert_sql(table, true)?;
        let disable = self.compiler.identity_insert_sql(table, false)?;

        self.driver.execute(&CompiledStatement::inline(enable)).await?;
        self.identity_insert_table = Some(table.to_string());
        debug!("IDENTITY_INSERT enabled for {}", table);

        let result = block(self).await;

        let disabled = self.driver.execute(&CompiledStatement::inline(disable)).await;
        self.identity_insert_table = None;
        match disabled {
            Ok(_) => {
                debug!("IDENTITY_INSERT disabled for {}", table);
                result
            }
            Err(disable_err) => match result {
                Ok(_) => Err(disable_err),
                Err(block_err) => {
                    warn!("Failed to disable IDENTITY_INSERT for {}: {}", table, disable_err);
                    Err(block_err)
                }
            },
        }
    }

    /// Whether `IDENTITY_INSERT` is currently ON for `table`
    pub fn identity_insert_enabled(&self, table: &str) -> bool {
        self.identity_insert_table.as_deref() == Some(table)
    }

    async fn run_all(&mut self, statements: Vec<String>) -> DialectResult<()> {
        for sql in statements {
            self.driver.execute(&CompiledStatement::inline(sql)).await?;
        }
        Ok(())
    }

    /// Run the statements that open a transaction level; on failure the
    /// level is dropped again and the session isolation put back
    async fn run_opening(&mut self, statements: Vec<String>) -> DialectResult<()> {
        if let Err(e) = self.run_all(statements).await {
            match self.transactions.discard_top() {
                Ok(cleanup) => self.run_cleanup(cleanup).await,
                Err(cleanup_err) => warn!("Failed to plan transaction cleanup: {}", cleanup_err),
            }
            return Err(e);
        }
        self.transactions.statements_executed();
        Ok(())
    }

    /// Run the statements that close a transaction level
    ///
    /// When the closing statement itself fails, the controller is put back
    /// to `snapshot` so the level is still open. A failed isolation restore
    /// afterwards is only logged; the next outermost transaction sends it
    /// again.
    async fn run_closing(&mut self, snapshot: TransactionController, statements: Vec<String>) -> DialectResult<()> {
        let mut statements = statements.into_iter();
        if let Some(sql) = statements.next() {
            if let Err(e) = self.driver.execute(&CompiledStatement::inline(sql)).await {
                self.transactions = snapshot;
                return Err(e);
            }
        }
        self.run_cleanup(statements.collect()).await;
        Ok(())
    }

    async fn run_cleanup(&mut self, statements: Vec<String>) {
        match self.run_all(statements).await {
            Ok(()) => self.transactions.statements_executed(),
            Err(e) => warn!("Failed to restore the default isolation level: {}", e),
        }
    }

    /// Begin a transaction, or a savepoint inside an open one
    pub async fn begin_transaction(&mut self, isolation: Option<IsolationLevel>) -> DialectResult<()> {
        let statements = self.transactions.begin_transaction(isolation)?;
        self.run_opening(statements).await
    }

    pub async fn commit(&mut self) -> DialectResult<()> {
        let snapshot = self.transactions.clone();
        let statements = self.transactions.commit()?;
        self.run_closing(snapshot, statements).await
    }

    pub async fn rollback(&mut self) -> DialectResult<()> {
        let snapshot = self.transactions.clone();
        let statements = self.transactions.rollback()?;
        self.run_closing(snapshot, statements).await
    }

    pub async fn create_savepoint(&mut self, name: &str) -> DialectResult<()> {
        let statements = self.transactions.create_savepoint(name)?;
        self.run_opening(statements).await
    }

    pub async fn release_savepoint(&mut self, name: &str) -> DialectResult<()> {
        let statements = self.transactions.release_savepoint(name)?;
        self.run_all(statements).await
    }

    pub async fn rollback_to_savepoint(&mut self, name: &str) -> DialectResult<()> {
        let snapshot = self.transactions.clone();
        let statements = self.transactions.rollback_to_savepoint(name)?;
        self.run_closing(snapshot, statements).await
    }

    /// Execute `block` inside a transaction
    ///
    /// Commits when the block succeeds and rolls back when it fails. With
    /// `auto_retry`, an outermost transaction chosen as a deadlock victim is
    /// retried up to `max_retries` times.
    pub async fn with_transaction<F, T>(&mut self, config: TransactionConfig, mut block: F) -> DialectResult<T>
    where
        F: for<'c> FnMut(&'c mut Self) -> DriverFuture<'c, DialectResult<T>>,
    {
        let outermost = !self.transactions.is_active();
        let max_attempts = if config.auto_retry && outermost {
            config.max_retries + 1
        } else {
            1
        };
        let mut attempts = 0;

        loop {
            attempts += 1;
            debug!("Starting transaction attempt {} of {}", attempts, max_attempts);

            self.begin_transaction(config.isolation_level).await?;

            match block(self).await {
                Ok(result) => {
                    self.commit().await?;
                    return Ok(result);
                }
                Err(e) => {
                    if let Err(rollback_err) = self.rollback().await {
                        warn!("Rollback after failed transaction block also failed: {}", rollback_err);
                        return Err(e);
                    }

                    if attempts < max_attempts && is_deadlock_victim(&e) {
                        warn!("Deadlock on attempt {}, retrying: {}", attempts, e);
                        tokio::time::sleep(config.backoff_for(attempts)).await;
                        continue;
                    }
                    return Err(e);
                }
            }
        }
    }

    /// Fetch the first row of a plan and resolve its subclass
    pub async fn find_polymorphic(
        &mut self,
        plan: &QueryPlan,
        registry: &SubclassRegistry,
    ) -> DialectResult<Option<(String, Row)>> {
        let plan = plan.clone().take(1);
        let row = match self.select_all(&plan).await?.into_iter().next() {
            Some(row) => row,
            None => return Ok(None),
        };
        let variant = registry
            .resolve(row.get(registry.column()).unwrap_or(&SqlValue::Null))?
            .to_string();
        Ok(Some((variant, row)))
    }
}
