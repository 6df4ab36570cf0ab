//! Query plan types - relations, columns, predicates and clauses

use std::fmt;

use crate::value::SqlValue;

use super::QueryPlan;

/// A table taking part in a query
#[derive(Debug, Clone, PartialEq)]
pub struct Relation {
    pub name: String,
    pub alias: Option<String>,
    pub primary_key: Option<String>,
    /// Engine-assigned auto-increment column
    pub identity_column: Option<String>,
    /// Known columns; empty when the schema is not known
    pub columns: Vec<String>,
}

impl Relation {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
            primary_key: None,
            identity_column: None,
            columns: Vec::new(),
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn primary_key(mut self, column: impl Into<String>) -> Self {
        self.primary_key = Some(column.into());
        self
    }

    /// Mark an identity column, which is also the primary key unless one is set
    pub fn identity(mut self, column: impl Into<String>) -> Self {
        let column = column.into();
        if self.primary_key.is_none() {
            self.primary_key = Some(column.clone());
        }
        self.identity_column = Some(column);
        self
    }

    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    /// Name other clauses use to refer to this relation
    pub fn reference_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    /// Whether `reference` names this relation
    pub fn answers_to(&self, reference: &str) -> bool {
        self.reference_name() == reference || (self.alias.is_none() && self.name == reference)
    }

    pub fn has_column(&self, column: &str) -> bool {
        column == "*" || self.columns.is_empty() || self.columns.iter().any(|c| c == column)
    }

    pub fn is_identity(&self, column: &str) -> bool {
        self.identity_column.as_deref() == Some(column)
    }
}

impl From<&str> for Relation {
    fn from(name: &str) -> Self {
        Relation::new(name)
    }
}

impl From<String> for Relation {
    fn from(name: String) -> Self {
        Relation::new(name)
    }
}

/// A possibly table-qualified column
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    pub table: Option<String>,
    pub name: String,
}

impl ColumnRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            table: None,
            name: name.into(),
        }
    }

    pub fn qualified(table: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            table: Some(table.into()),
            name: name.into(),
        }
    }

    /// Parse `table.column` or `column`; the last dot separates the column
    pub fn parse(reference: &str) -> Self {
        match reference.rsplit_once('.') {
            Some((table, name)) => Self::qualified(table, name),
            None => Self::new(reference),
        }
    }
}

impl From<&str> for ColumnRef {
    fn from(reference: &str) -> Self {
        ColumnRef::parse(reference)
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.table {
            Some(table) => write!(f, "{}.{}", table, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Eq,
    NotEq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl ComparisonOp {
    /// Operator selecting exactly the rows this one rejects (for non-NULL values)
    pub fn negate(self) -> Self {
        match self {
            ComparisonOp::Eq => ComparisonOp::NotEq,
            ComparisonOp::NotEq => ComparisonOp::Eq,
            ComparisonOp::Gt => ComparisonOp::Lte,
            ComparisonOp::Gte => ComparisonOp::Lt,
            ComparisonOp::Lt => ComparisonOp::Gte,
            ComparisonOp::Lte => ComparisonOp::Gt,
        }
    }
}

impl fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComparisonOp::Eq => write!(f, "="),
            ComparisonOp::NotEq => write!(f, "<>"),
            ComparisonOp::Gt => write!(f, ">"),
            ComparisonOp::Gte => write!(f, ">="),
            ComparisonOp::Lt => write!(f, "<"),
            ComparisonOp::Lte => write!(f, "<="),
        }
    }
}

/// Right-hand side of an IN predicate
#[derive(Debug, Clone, PartialEq)]
pub enum MembershipSet {
    Values(Vec<SqlValue>),
    Subquery(Box<QueryPlan>),
}

/// Logical predicate tree
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Comparison {
        column: ColumnRef,
        op: ComparisonOp,
        value: SqlValue,
    },
    Negation(Box<Predicate>),
    SetMembership {
        column: ColumnRef,
        set: MembershipSet,
        negated: bool,
    },
    Like {
        column: ColumnRef,
        pattern: String,
        escape: Option<char>,
        negated: bool,
    },
    /// Dispatched to the registry handler registered under `handler`
    Custom {
        handler: String,
        column: ColumnRef,
        payload: SqlValue,
    },
    IsNull {
        column: ColumnRef,
        negated: bool,
    },
    Between {
        column: ColumnRef,
        low: SqlValue,
        high: SqlValue,
        negated: bool,
    },
    Exists {
        plan: Box<QueryPlan>,
        negated: bool,
    },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    /// Caller-written SQL with `?` placeholders
    Raw { sql: String, values: Vec<SqlValue> },
}

impl Predicate {
    pub fn compare(column: impl Into<ColumnRef>, op: ComparisonOp, value: impl Into<SqlValue>) -> Self {
        Predicate::Comparison {
            column: column.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(column: impl Into<ColumnRef>, value: impl Into<SqlValue>) -> Self {
        Self::compare(column, ComparisonOp::Eq, value)
    }

    pub fn in_values<T: Into<SqlValue>>(column: impl Into<ColumnRef>, values: Vec<T>) -> Self {
        Predicate::SetMembership {
            column: column.into(),
            set: MembershipSet::Values(values.into_iter().map(Into::into).collect()),
            negated: false,
        }
    }

    pub fn like(column: impl Into<ColumnRef>, pattern: impl Into<String>) -> Self {
        Predicate::Like {
            column: column.into(),
            pattern: pattern.into(),
            escape: None,
            negated: false,
        }
    }

    pub fn raw(sql: impl Into<String>, values: Vec<SqlValue>) -> Self {
        Predicate::Raw {
            sql: sql.into(),
            values,
        }
    }

    pub fn and(predicates: Vec<Predicate>) -> Self {
        Predicate::And(predicates)
    }

    pub fn or(predicates: Vec<Predicate>) -> Self {
        Predicate::Or(predicates)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(predicate: Predicate) -> Self {
        Predicate::Negation(Box::new(predicate))
    }
}

/// Join types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinType::Inner => write!(f, "INNER JOIN"),
            JoinType::Left => write!(f, "LEFT OUTER JOIN"),
            JoinType::Right => write!(f, "RIGHT OUTER JOIN"),
            JoinType::Full => write!(f, "FULL OUTER JOIN"),
        }
    }
}

/// Join clause
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub join_type: JoinType,
    pub relation: Relation,
    /// (left_column, right_column) equalities
    pub on: Vec<(ColumnRef, ColumnRef)>,
}

/// Select list entry
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    Star,
    Column {
        column: ColumnRef,
        alias: Option<String>,
    },
    /// Caller-written select text, emitted verbatim
    Raw(String),
    /// `1 AS one`, used by existence checks
    One,
    CountAll,
    Subquery {
        plan: Box<QueryPlan>,
        alias: String,
    },
}

/// Order by direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    Asc,
    Desc,
}

impl OrderDirection {
    pub fn reverse(self) -> Self {
        match self {
            OrderDirection::Asc => OrderDirection::Desc,
            OrderDirection::Desc => OrderDirection::Asc,
        }
    }
}

impl fmt::Display for OrderDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderDirection::Asc => write!(f, "ASC"),
            OrderDirection::Desc => write!(f, "DESC"),
        }
    }
}

/// ORDER BY term
#[derive(Debug, Clone, PartialEq)]
pub enum OrderTerm {
    Column {
        column: ColumnRef,
        direction: OrderDirection,
    },
    /// Caller-written ordering such as `comments.id DESC`
    Raw(String),
}

impl OrderTerm {
    pub fn reverse(&self) -> Self {
        match self {
            OrderTerm::Column { column, direction } => OrderTerm::Column {
                column: column.clone(),
                direction: direction.reverse(),
            },
            OrderTerm::Raw(sql) => {
                let reversed: Vec<String> = split_top_level(sql)
                    .into_iter()
                    .map(reverse_raw_term)
                    .collect();
                OrderTerm::Raw(reversed.join(", "))
            }
        }
    }
}

/// Split an ORDER BY list on commas outside parentheses, quotes and brackets
fn split_top_level(sql: &str) -> Vec<&str> {
    let mut terms = Vec::new();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut in_brackets = false;
    let mut start = 0;

    for (i, c) in sql.char_indices() {
        match c {
            '\'' if !in_brackets => in_string = !in_string,
            '[' if !in_string => in_brackets = true,
            ']' if !in_string => in_brackets = false,
            '(' if !in_string && !in_brackets => depth += 1,
            ')' if !in_string && !in_brackets => depth = depth.saturating_sub(1),
            ',' if depth == 0 && !in_string && !in_brackets => {
                terms.push(sql[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    terms.push(sql[start..].trim());
    terms.into_iter().filter(|term| !term.is_empty()).collect()
}

fn reverse_raw_term(term: &str) -> String {
    let upper = term.to_ascii_uppercase();
    if let Some(expr) = upper.strip_suffix(" DESC").map(|e| &term[..e.len()]) {
        format!("{} ASC", expr.trim_end())
    } else if let Some(expr) = upper.strip_suffix(" ASC").map(|e| &term[..e.len()]) {
        format!("{} DESC", expr.trim_end())
    } else {
        format!("{} DESC", term)
    }
}

/// Table hints placed after the table name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockHint {
    UpdLock,
    HoldLock,
    NoLock,
    ReadPast,
    RowLock,
    /// Caller-written hint such as `WITH(READPAST)`
    Raw(String),
}

impl fmt::Display for LockHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockHint::UpdLock => write!(f, "WITH(UPDLOCK)"),
            LockHint::HoldLock => write!(f, "WITH(HOLDLOCK)"),
            LockHint::NoLock => write!(f, "WITH(NOLOCK)"),
            LockHint::ReadPast => write!(f, "WITH(READPAST)"),
            LockHint::RowLock => write!(f, "WITH(ROWLOCK)"),
            LockHint::Raw(sql) => write!(f, "{}", sql),
        }
    }
}

/// Statement types supported by the plan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
}

/// Column assignment for INSERT and UPDATE
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub column: String,
    pub value: SqlValue,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_ref_parse() {
        assert_eq!(ColumnRef::parse("title"), ColumnRef::new("title"));
        assert_eq!(
            ColumnRef::parse("dbo.topics.title"),
            ColumnRef::qualified("dbo.topics", "title")
        );
        assert_eq!(ColumnRef::parse("topics.title").to_string(), "topics.title");
    }

    #[test]
    fn test_relation_identity_defaults_primary_key() {
        let relation = Relation::new("companies").identity("id");
        assert_eq!(relation.primary_key.as_deref(), Some("id"));
        assert!(relation.is_identity("id"));
        assert!(relation.has_column("anything"));

        let relation = Relation::new("t").alias("x").columns(&["a"]);
        assert!(relation.answers_to("x"));
        assert!(!relation.answers_to("t"));
        assert!(!relation.has_column("b"));
    }

    #[test]
    fn test_comparison_negation() {
        assert_eq!(ComparisonOp::Eq.negate(), ComparisonOp::NotEq);
        assert_eq!(ComparisonOp::Gt.negate(), ComparisonOp::Lte);
        assert_eq!(ComparisonOp::Lte.negate().negate(), ComparisonOp::Lte);
    }

    #[test]
    fn test_order_term_reverse() {
        assert_eq!(
            OrderTerm::Raw("comments.id DESC".to_string()).reverse(),
            OrderTerm::Raw("comments.id ASC".to_string())
        );
        assert_eq!(
            OrderTerm::Raw("title".to_string()).reverse(),
            OrderTerm::Raw("title DESC".to_string())
        );
        assert_eq!(
            OrderTerm::Raw("a, b DESC".to_string()).reverse(),
            OrderTerm::Raw("a DESC, b ASC".to_string())
        );
        assert_eq!(
            OrderTerm::Raw("COALESCE(a, b) ASC, [x,y] desc".to_string()).reverse(),
            OrderTerm::Raw("COALESCE(a, b) DESC, [x,y] ASC".to_string())
        );
        let term = OrderTerm::Column {
            column: ColumnRef::new("id"),
            direction: OrderDirection::Asc,
        };
        assert_eq!(
            term.reverse(),
            OrderTerm::Column {
                column: ColumnRef::new("id"),
                direction: OrderDirection::Desc
            }
        );
    }

    #[test]
    fn test_lock_hint_display() {
        assert_eq!(LockHint::ReadPast.to_string(), "WITH(READPAST)");
        assert_eq!(LockHint::Raw("WITH(NOLOCK)".to_string()).to_string(), "WITH(NOLOCK)");
    }
}
