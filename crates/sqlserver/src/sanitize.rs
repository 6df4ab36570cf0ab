//! Literal sanitization for SQL Server
//!
//! Converts host values into literals that are safe to splice into SQL text.
//! Values without a dialect mapping fail with `UnsupportedLiteralKind`; the
//! predicate compiler consults registered handlers before getting here.

use crate::config::DialectRules;
use crate::dispatch::Bind;
use crate::error::{DialectError, DialectResult};
use crate::value::{SqlValue, TypeHint};

/// Outcome of lowering a value into a statement
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralOrBind {
    /// Value spliced into the SQL text
    Literal(String),
    /// Value sent out of band as a named parameter
    Bind(Bind),
}

impl LiteralOrBind {
    /// Text that stands for the value inside the statement
    pub fn sql(&self) -> &str {
        match self {
            LiteralOrBind::Literal(text) => text,
            LiteralOrBind::Bind(bind) => &bind.name,
        }
    }
}

/// Quote a string literal, doubling single quotes
///
/// The national character prefix is added when the rules ask for unicode
/// tagging, unless the hint says the target column is non-unicode.
pub fn quote_string(rules: &DialectRules, value: &str, hint: Option<TypeHint>) -> String {
    let escaped = value.replace('\'', "''");
    let unicode = rules.unicode_literals && hint.map_or(true, |h| h.is_unicode());
    if unicode {
        format!("N'{}'", escaped)
    } else {
        format!("'{}'", escaped)
    }
}

/// Convert a value into a dialect-safe SQL literal
pub fn sanitize(rules: &DialectRules, value: &SqlValue, hint: Option<TypeHint>) -> DialectResult<String> {
    let literal = match value {
        SqlValue::Null => "NULL".to_string(),
        SqlValue::Bool(b) => if *b { "1" } else { "0" }.to_string(),
        SqlValue::Int(i) => i.to_string(),
        SqlValue::Decimal(text) => {
            validate_decimal(text)?;
            text.clone()
        }
        SqlValue::Float(f) => {
            if !f.is_finite() {
                return Err(DialectError::unsupported_literal(format!("non-finite float {}", f)));
            }
            f.to_string()
        }
        SqlValue::String(s) => quote_string(rules, s, hint),
        SqlValue::Json(json) => quote_string(rules, &json.to_string(), hint),
        SqlValue::Bytes(bytes) => {
            let hex: String = bytes.iter().map(|b| format!("{:02X}", b)).collect();
            format!("0x{}", hex)
        }
        SqlValue::Uuid(uuid) => format!("'{}'", uuid.hyphenated()),
        SqlValue::DateTime(dt) => format!("'{}'", dt.format("%Y-%m-%dT%H:%M:%S%.6f")),
        SqlValue::Date(date) => format!("'{}'", date.format("%Y-%m-%d")),
        SqlValue::Time(time) => format!("'{}'", time.format("%H:%M:%S%.6f")),
        SqlValue::Regex(_) | SqlValue::Custom { .. } => {
            return Err(DialectError::unsupported_literal(value.kind()));
        }
    };

    Ok(literal)
}

/// Decimals are spliced verbatim, so only plain numeric text is accepted
fn validate_decimal(text: &str) -> DialectResult<()> {
    let digits = text.strip_prefix(['-', '+']).unwrap_or(text);
    let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, ""));

    let well_formed = !(int_part.is_empty() && frac_part.is_empty())
        && int_part.chars().all(|c| c.is_ascii_digit())
        && frac_part.chars().all(|c| c.is_ascii_digit());

    if well_formed {
        Ok(())
    } else {
        Err(DialectError::InvalidPlan(format!(
            "'{}' is not a decimal literal",
            text
        )))
    }
}

/// Escape LIKE wildcards in a search term
///
/// The escape character itself, `%` and `_` are prefixed with the escape
/// character, which defaults to a backslash.
pub fn sanitize_sql_like(term: &str, escape: Option<char>) -> String {
    let escape = escape.unwrap_or('\\');
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if c == escape || c == '%' || c == '_' {
            escaped.push(escape);
        }
        escaped.push(c);
    }
    escaped
}

/// Replace `?` placeholders in a raw fragment with sanitized literals
///
/// Question marks inside quoted strings and bracketed identifiers are left
/// alone.
pub fn replace_placeholders(rules: &DialectRules, sql: &str, values: &[SqlValue]) -> DialectResult<String> {
    let mut output = String::with_capacity(sql.len());
    let mut values = values.iter();
    let mut in_string = false;
    let mut in_brackets = false;
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' if !in_brackets => {
                in_string = !in_string;
                output.push(c);
            }
            '[' if !in_string && !in_brackets => {
                in_brackets = true;
                output.push(c);
            }
            ']' if in_brackets => {
                output.push(c);
                if chars.peek() == Some(&']') {
                    chars.next();
                    output.push(']');
                } else {
                    in_brackets = false;
                }
            }
            '?' if !in_string && !in_brackets => {
                let value = values.next().ok_or_else(|| {
                    DialectError::InvalidPlan(format!("missing value for placeholder in '{}'", sql))
                })?;
                output.push_str(&sanitize(rules, value, None)?);
            }
            _ => output.push(c),
        }
    }

    if values.next().is_some() {
        return Err(DialectError::InvalidPlan(format!(
            "more values than placeholders in '{}'",
            sql
        )));
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlparser::ast::{Expr, SelectItem, SetExpr, Statement, Value};
    use sqlparser::dialect::MsSqlDialect;
    use sqlparser::parser::Parser;

    fn rules() -> DialectRules {
        DialectRules::sqlserver()
    }

    /// Parse `SELECT <literal>` and return the decoded string
    fn decode_select_literal(literal: &str) -> String {
        let sql = format!("SELECT {}", literal);
        let statements = Parser::parse_sql(&MsSqlDialect {}, &sql).unwrap();
        let query = match &statements[0] {
            Statement::Query(query) => query,
            other => panic!("expected query, got {:?}", other),
        };
        let select = match query.body.as_ref() {
            SetExpr::Select(select) => select,
            other => panic!("expected select, got {:?}", other),
        };
        match &select.projection[0] {
            SelectItem::UnnamedExpr(Expr::Value(Value::NationalStringLiteral(s)))
            | SelectItem::UnnamedExpr(Expr::Value(Value::SingleQuotedString(s))) => s.clone(),
            other => panic!("expected string literal, got {:?}", other),
        }
    }

    #[test]
    fn test_string_sanitation() {
        let literal = sanitize(&rules(), &SqlValue::from("something ' 1=1"), None).unwrap();
        assert_ne!(literal, "'something ' 1=1'");
        assert_eq!(literal, "N'something '' 1=1'");

        let literal = sanitize(&rules(), &SqlValue::from("something; select table"), None).unwrap();
        assert_eq!(literal, "N'something; select table'");
    }

    #[test]
    fn test_literal_round_trips_through_parser() {
        let literal = sanitize(&rules(), &SqlValue::from("it's a test"), None).unwrap();
        assert_eq!(literal, "N'it''s a test'");
        assert_eq!(decode_select_literal(&literal), "it's a test");
    }

    #[test]
    fn test_varchar_hint_drops_national_prefix() {
        let literal = sanitize(&rules(), &SqlValue::from("abc"), Some(TypeHint::VarChar)).unwrap();
        assert_eq!(literal, "'abc'");
        assert_eq!(decode_select_literal(&literal), "abc");
        assert_eq!(
            sanitize(&rules(), &SqlValue::from("abc"), Some(TypeHint::NVarCharMax)).unwrap(),
            "N'abc'"
        );

        let mut ascii_rules = rules();
        ascii_rules.unicode_literals = false;
        assert_eq!(quote_string(&ascii_rules, "x", None), "'x'");
    }

    #[test]
    fn test_decimal_keeps_precision() {
        let text = "12345678901234567890.123456789012345678";
        let literal = sanitize(&rules(), &SqlValue::decimal(text), None).unwrap();
        assert_eq!(literal, text);
        assert!(sanitize(&rules(), &SqlValue::decimal("1; DROP TABLE x"), None).is_err());
        assert!(sanitize(&rules(), &SqlValue::decimal("."), None).is_err());
        assert_eq!(sanitize(&rules(), &SqlValue::decimal("-.5"), None).unwrap(), "-.5");
    }

    #[test]
    fn test_scalar_literals() {
        assert_eq!(sanitize(&rules(), &SqlValue::Bool(true), None).unwrap(), "1");
        assert_eq!(sanitize(&rules(), &SqlValue::Bool(false), None).unwrap(), "0");
        assert_eq!(sanitize(&rules(), &SqlValue::Null, None).unwrap(), "NULL");
        assert_eq!(sanitize(&rules(), &SqlValue::Int(-42), None).unwrap(), "-42");
        assert_eq!(
            sanitize(&rules(), &SqlValue::Bytes(vec![0xde, 0xad, 0x01]), None).unwrap(),
            "0xDEAD01"
        );
        let date = chrono::NaiveDate::from_ymd_opt(2005, 1, 30).unwrap();
        assert_eq!(sanitize(&rules(), &SqlValue::Date(date), None).unwrap(), "'2005-01-30'");
        assert!(sanitize(&rules(), &SqlValue::Float(f64::NAN), None).is_err());
    }

    #[test]
    fn test_unregistered_values_are_unsupported() {
        let err = sanitize(&rules(), &SqlValue::regex("rails"), None).unwrap_err();
        assert_eq!(
            err,
            DialectError::UnsupportedLiteralKind {
                kind: "regex".to_string()
            }
        );

        let custom = SqlValue::custom("Point", serde_json::json!({"x": 1}));
        assert!(matches!(
            sanitize(&rules(), &custom, None),
            Err(DialectError::UnsupportedLiteralKind { .. })
        ));
    }

    #[test]
    fn test_sanitize_sql_like() {
        assert_eq!(sanitize_sql_like("20% _reduction_!", Some('!')), "20!% !_reduction!_!!");
        assert_eq!(sanitize_sql_like("100%", None), "100\\%");
        assert_eq!(sanitize_sql_like("a\\b", None), "a\\\\b");
    }

    #[test]
    fn test_replace_placeholders() {
        let sql = replace_placeholders(&rules(), "title = ?", &[SqlValue::from("hello")]).unwrap();
        assert_eq!(sql, "title = N'hello'");

        let sql = replace_placeholders(&rules(), "a = '?' AND b = ?", &[SqlValue::Int(1)]).unwrap();
        assert_eq!(sql, "a = '?' AND b = 1");

        assert!(replace_placeholders(&rules(), "a = ? AND b = ?", &[SqlValue::Int(1)]).is_err());
        assert!(replace_placeholders(&rules(), "a = 1", &[SqlValue::Int(1)]).is_err());
    }

    #[test]
    fn test_placeholders_skip_bracketed_identifiers() {
        let sql = replace_placeholders(&rules(), "[o'brien] = ?", &[SqlValue::from("x")]).unwrap();
        assert_eq!(sql, "[o'brien] = N'x'");

        let sql = replace_placeholders(&rules(), "[what?]]x] = ? AND c = '[?'", &[SqlValue::Int(1)]).unwrap();
        assert_eq!(sql, "[what?]]x] = 1 AND c = '[?'");
    }
}
