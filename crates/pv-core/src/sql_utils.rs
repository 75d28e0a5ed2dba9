//! SQL identifier and literal quoting utilities
//!
//! Every statement the catalog renders goes through these helpers, so that
//! definition values (table names, seed values) can never break out of the
//! position they are interpolated into.

/// Default schema used when a name carries no qualifier.
pub const DEFAULT_SCHEMA: &str = "public";

/// Quote a SQL identifier to prevent injection.
///
/// Wraps the identifier in double quotes and escapes any embedded double quotes
/// by doubling them, following the SQL standard.
///
/// # Examples
/// ```
/// use pv_core::sql_utils::quote_ident;
/// assert_eq!(quote_ident("products"), r#""products""#);
/// assert_eq!(quote_ident(r#"my"table"#), r#""my""table""#);
/// ```
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Split a potentially schema-qualified table name into (schema, table).
///
/// Uses the last `.` as the separator. If no `.` is present, returns
/// `("public", name)`.
///
/// # Examples
/// ```
/// use pv_core::sql_utils::split_qualified_name;
/// assert_eq!(split_qualified_name("pages"), ("public", "pages"));
/// assert_eq!(split_qualified_name("shop.orders"), ("shop", "orders"));
/// ```
pub fn split_qualified_name(name: &str) -> (&str, &str) {
    if let Some(pos) = name.rfind('.') {
        (&name[..pos], &name[pos + 1..])
    } else {
        (DEFAULT_SCHEMA, name)
    }
}

/// Strip identifier quoting and any schema qualifier, returning the bare
/// lower-cased relation name.
///
/// `"public"."Pages"` and `pages` both normalize to `pages`.
pub fn normalize_relation(name: &str) -> String {
    let unquoted = name.replace('"', "");
    let (_, table) = split_qualified_name(&unquoted);
    table.to_lowercase()
}

/// Whether `value` is a plain SQL identifier: a letter or underscore
/// followed by letters, digits, or underscores.
pub fn is_plain_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    let valid_start = chars
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false);
    valid_start && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Escape a SQL string literal value by doubling single quotes.
///
/// This is for use inside single-quoted SQL string literals, not identifiers.
pub fn escape_sql_string(value: &str) -> String {
    value.replace('\'', "''")
}

/// Render a JSON scalar as a SQL literal.
///
/// Objects and arrays are rendered as quoted JSON text, which PostgreSQL
/// accepts for `json`/`jsonb` columns.
pub fn json_to_sql_literal(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => "NULL".to_string(),
        serde_json::Value::Bool(b) => {
            if *b {
                "TRUE".to_string()
            } else {
                "FALSE".to_string()
            }
        }
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => format!("'{}'", escape_sql_string(s)),
        other => format!("'{}'", escape_sql_string(&other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_is_plain_identifier() {
        assert!(is_plain_identifier("order_items"));
        assert!(is_plain_identifier("_private2"));
        assert!(!is_plain_identifier("2fast"));
        assert!(!is_plain_identifier("drop table"));
        assert!(!is_plain_identifier(""));
    }

    #[test]
    fn test_quote_ident_simple() {
        assert_eq!(quote_ident("products"), r#""products""#);
    }

    #[test]
    fn test_quote_ident_with_embedded_quotes() {
        assert_eq!(quote_ident(r#"my"table"#), r#""my""table""#);
    }

    #[test]
    fn test_quote_ident_with_dots() {
        assert_eq!(quote_ident("public.pages"), r#""public.pages""#);
    }

    #[test]
    fn test_split_qualified_name_no_dot() {
        assert_eq!(split_qualified_name("pages"), ("public", "pages"));
    }

    #[test]
    fn test_split_qualified_name_multiple_dots() {
        assert_eq!(
            split_qualified_name("db.shop.orders"),
            ("db.shop", "orders")
        );
    }

    #[test]
    fn test_normalize_relation() {
        assert_eq!(normalize_relation(r#""public"."Pages""#), "pages");
        assert_eq!(normalize_relation("site_settings"), "site_settings");
    }

    #[test]
    fn test_escape_sql_string() {
        assert_eq!(escape_sql_string("it's"), "it''s");
        assert_eq!(escape_sql_string("O'Brien's"), "O''Brien''s");
    }

    #[test]
    fn test_json_to_sql_literal() {
        assert_eq!(json_to_sql_literal(&json!(null)), "NULL");
        assert_eq!(json_to_sql_literal(&json!(true)), "TRUE");
        assert_eq!(json_to_sql_literal(&json!(42)), "42");
        assert_eq!(json_to_sql_literal(&json!("Joe's")), "'Joe''s'");
        assert_eq!(
            json_to_sql_literal(&json!({"theme": "light"})),
            r#"'{"theme":"light"}'"#
        );
    }
}
