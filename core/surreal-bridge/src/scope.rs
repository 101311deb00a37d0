//! Namespace / schema resolution.
//!
//! SurrealDB scopes every statement by a namespace and a database (called
//! "schema" on the ORM side). Defaults apply only when the target backend is
//! SurrealDB, and the SQL-facing variants hide both fields entirely so they
//! never get rendered into a statement for a SQL dialect.

/// Effective namespace: `default` when targeting SurrealDB and `current` is empty.
///
/// ```rust
/// use surreal_bridge::scope::resolve_namespace;
///
/// assert_eq!(resolve_namespace(Some(""), "ns0", true), Some("ns0"));
/// assert_eq!(resolve_namespace(Some("custom"), "ns0", true), Some("custom"));
/// assert_eq!(resolve_namespace(Some(""), "ns0", false), Some(""));
/// ```
pub fn resolve_namespace<'a>(
    current: Option<&'a str>,
    default: &'a str,
    is_surreal: bool,
) -> Option<&'a str> {
    with_default(current, default, is_surreal)
}

/// Effective schema (SurrealDB database), same rules as [`resolve_namespace`].
pub fn resolve_schema<'a>(
    current: Option<&'a str>,
    default: &'a str,
    is_surreal: bool,
) -> Option<&'a str> {
    with_default(current, default, is_surreal)
}

/// Namespace as seen by a SQL statement generator: always absent for SurrealDB.
///
/// ```rust
/// use surreal_bridge::scope::resolve_sql_namespace;
///
/// assert_eq!(resolve_sql_namespace(Some("ns1"), true), None);
/// assert_eq!(resolve_sql_namespace(Some("ns1"), false), Some("ns1"));
/// ```
pub fn resolve_sql_namespace(current: Option<&str>, is_surreal: bool) -> Option<&str> {
    if is_surreal { None } else { current }
}

/// Schema as seen by a SQL statement generator: always absent for SurrealDB.
pub fn resolve_sql_schema(current: Option<&str>, is_surreal: bool) -> Option<&str> {
    if is_surreal { None } else { current }
}

fn with_default<'a>(current: Option<&'a str>, default: &'a str, is_surreal: bool) -> Option<&'a str> {
    match current {
        Some(value) if !value.is_empty() => Some(value),
        _ if is_surreal => Some(default),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_applies_only_to_surreal() {
        assert_eq!(resolve_namespace(None, "ns0", true), Some("ns0"));
        assert_eq!(resolve_namespace(None, "ns0", false), None);
        assert_eq!(resolve_schema(Some(""), "db0", true), Some("db0"));
        assert_eq!(resolve_schema(Some(""), "db0", false), Some(""));
    }

    #[test]
    fn test_explicit_value_wins() {
        assert_eq!(resolve_namespace(Some("custom"), "ns0", true), Some("custom"));
        assert_eq!(resolve_schema(Some("shop"), "db0", false), Some("shop"));
    }

    #[test]
    fn test_sql_variants_hide_surreal_scope() {
        assert_eq!(resolve_sql_namespace(Some("ns1"), true), None);
        assert_eq!(resolve_sql_schema(Some("db1"), true), None);
        assert_eq!(resolve_sql_schema(Some("db1"), false), Some("db1"));
        assert_eq!(resolve_sql_schema(None, false), None);
    }
}
