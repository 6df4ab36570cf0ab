//! Identifier quoting for SQL Server
//!
//! Identifiers are wrapped in the dialect's bracket pair and an embedded
//! closing bracket is doubled, so `foo]bar` becomes `[foo]]bar]`. Any
//! identifier can be quoted safely; quoting is favored over rejecting names.

use crate::config::DialectRules;
use crate::error::{DialectError, DialectResult};
use crate::plan::ColumnRef;

/// Quote a single identifier
///
/// ```
/// use elif_sqlserver::config::DialectRules;
/// use elif_sqlserver::quoting::quote;
///
/// let rules = DialectRules::sqlserver();
/// assert_eq!(quote(&rules, "foo'bar"), "[foo'bar]");
/// assert_eq!(quote(&rules, "user]data"), "[user]]data]");
/// ```
pub fn quote(rules: &DialectRules, identifier: &str) -> String {
    let close = rules.identifier_close;
    let mut quoted = String::with_capacity(identifier.len() + 2);
    quoted.push(rules.identifier_open);
    for c in identifier.chars() {
        if c == close {
            quoted.push(close);
        }
        quoted.push(c);
    }
    quoted.push(close);
    quoted
}

/// Reverse [`quote`]; unbracketed input is returned unchanged
pub fn unquote(rules: &DialectRules, quoted: &str) -> String {
    let open = rules.identifier_open;
    let close = rules.identifier_close;

    let inner = match quoted
        .strip_prefix(open)
        .and_then(|rest| rest.strip_suffix(close))
    {
        Some(inner) => inner,
        None => return quoted.to_string(),
    };

    let doubled: String = [close, close].iter().collect();
    inner.replace(&doubled, &close.to_string())
}

/// Check whether a part is already bracketed with a well-formed escape sequence
fn is_quoted(rules: &DialectRules, part: &str) -> bool {
    let close = rules.identifier_close;
    let inner = match part
        .strip_prefix(rules.identifier_open)
        .and_then(|rest| rest.strip_suffix(close))
    {
        Some(inner) => inner,
        None => return false,
    };

    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == close && chars.next() != Some(close) {
            return false;
        }
    }
    true
}

/// Split a dotted name, keeping dots inside brackets
fn split_parts(rules: &DialectRules, name: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_brackets = false;
    let mut chars = name.chars().peekable();

    while let Some(c) = chars.next() {
        if !in_brackets && c == rules.identifier_open && current.is_empty() {
            in_brackets = true;
            current.push(c);
        } else if in_brackets && c == rules.identifier_close {
            current.push(c);
            if chars.peek() == Some(&rules.identifier_close) {
                current.push(rules.identifier_close);
                chars.next();
            } else {
                in_brackets = false;
            }
        } else if !in_brackets && c == '.' {
            parts.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    parts.push(current);
    parts
}

/// Quote a possibly schema-qualified table name (`dbo.posts` -> `[dbo].[posts]`)
pub fn quote_table_name(rules: &DialectRules, name: &str) -> String {
    split_parts(rules, name)
        .iter()
        .map(|part| {
            if is_quoted(rules, part) {
                part.clone()
            } else {
                quote(rules, part)
            }
        })
        .collect::<Vec<_>>()
        .join(".")
}

/// Quote a column name; `*` is never quoted
pub fn quote_column_name(rules: &DialectRules, name: &str) -> String {
    if name == "*" || is_quoted(rules, name) {
        name.to_string()
    } else {
        quote(rules, name)
    }
}

/// Quote a column reference as `[table].[column]`
pub fn quote_column(rules: &DialectRules, column: &ColumnRef) -> String {
    match &column.table {
        Some(table) => format!(
            "{}.{}",
            quote_table_name(rules, table),
            quote_column_name(rules, &column.name)
        ),
        None => quote_column_name(rules, &column.name),
    }
}

/// Validate that an identifier fits the dialect's limits
pub fn validate_identifier(rules: &DialectRules, identifier: &str) -> DialectResult<()> {
    if identifier.is_empty() {
        return Err(DialectError::InvalidIdentifier(
            "Identifier cannot be empty".to_string(),
        ));
    }

    if identifier.chars().count() > rules.max_identifier_length {
        return Err(DialectError::InvalidIdentifier(format!(
            "Identifier '{}' is too long (max {} characters)",
            identifier, rules.max_identifier_length
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> DialectRules {
        DialectRules::sqlserver()
    }

    #[test]
    fn test_column_names_are_escaped() {
        assert_eq!(quote(&rules(), "foo'bar"), "[foo'bar]");
        assert_eq!(quote(&rules(), "foo]bar"), "[foo]]bar]");
        assert_eq!(quote(&rules(), "foo[bar"), "[foo[bar]");
    }

    #[test]
    fn test_quote_unquote_round_trip() {
        let identifiers = [
            "users",
            "first name",
            "O'Brien",
            "a.b",
            "",
            "çà_ünïcödé",
            "weird\"quote",
            "semi;colon",
        ];
        for identifier in identifiers {
            let quoted = quote(&rules(), identifier);
            assert_eq!(unquote(&rules(), &quoted), identifier, "{}", quoted);
        }
    }

    #[test]
    fn test_round_trip_with_closing_bracket() {
        let quoted = quote(&rules(), "x]]y");
        assert_eq!(quoted, "[x]]]]y]");
        assert_eq!(unquote(&rules(), &quoted), "x]]y");
    }

    #[test]
    fn test_quote_is_injective() {
        let a = quote(&rules(), "a]");
        let b = quote(&rules(), "a");
        let c = quote(&rules(), "a]]");
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_ne!(b, c);
    }

    #[test]
    fn test_unquote_plain_identifier() {
        assert_eq!(unquote(&rules(), "plain"), "plain");
    }

    #[test]
    fn test_quote_table_name() {
        assert_eq!(quote_table_name(&rules(), "posts"), "[posts]");
        assert_eq!(quote_table_name(&rules(), "dbo.posts"), "[dbo].[posts]");
        assert_eq!(quote_table_name(&rules(), "[dbo].posts"), "[dbo].[posts]");
        assert_eq!(quote_table_name(&rules(), "[my.schema].[t]"), "[my.schema].[t]");
    }

    #[test]
    fn test_quote_column() {
        let column = ColumnRef::parse("topics.title");
        assert_eq!(quote_column(&rules(), &column), "[topics].[title]");
        assert_eq!(quote_column(&rules(), &ColumnRef::new("title")), "[title]");
        assert_eq!(quote_column(&rules(), &ColumnRef::parse("topics.*")), "[topics].*");
    }

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier(&rules(), "topics").is_ok());
        assert!(validate_identifier(&rules(), "").is_err());
        let long = "x".repeat(129);
        assert!(matches!(
            validate_identifier(&rules(), &long),
            Err(DialectError::InvalidIdentifier(_))
        ));
    }
}
