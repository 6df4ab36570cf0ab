//! # elif-sqlserver: SQL Server dialect for elif.rs
//!
//! Translates dialect-agnostic query plans into SQL Server (T-SQL) text:
//! bracket-quoted identifiers, `N'..'` literals, OFFSET/FETCH and TOP
//! pagination, `sp_executesql` dispatch for bound statements, identity
//! insert scoping and savepoint-based nested transactions.
//!
//! The crate never opens a connection itself; statements are handed to a
//! [`Driver`] implementation.

pub mod adapter;
pub mod compiler;
pub mod config;
pub mod dispatch;
pub mod driver;
pub mod error;
pub mod inheritance;
pub mod plan;
pub mod quoting;
pub mod sanitize;
pub mod transaction;
pub mod value;



pub use adapter::SqlServerAdapter;
pub use compiler::{HandlerRegistry, QueryPosition, SqlFragment, SqlServerCompiler};
pub use config::{ConfigError, DialectRules, PaginationStrategy, SavepointRelease};
pub use dispatch::{Bind, CompiledStatement, ExecutionMode, StatementMode};
pub use driver::{Driver, DriverFuture, FakeDriver, Row};
pub use error::{DialectError, DialectResult};
pub use inheritance::SubclassRegistry;
pub use plan::{
    ColumnRef, ComparisonOp, JoinType, LockHint, OrderDirection, Predicate, Projection, QueryPlan, Relation,
};
pub use sanitize::{sanitize, sanitize_sql_like, LiteralOrBind};
pub use transaction::{IsolationLevel, TransactionConfig, TransactionController, TransactionFrame};
pub use value::{SqlValue, TypeHint, ValueKind};
