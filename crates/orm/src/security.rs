//! Identifier safety for generated SQL
//!
//! Values always travel as bind parameters. Collection names and the field
//! names used in index DDL cannot be bound, so they are validated against a
//! strict pattern and then quoted.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{OrmError, OrmResult};

/// Collection (table) names: letter or underscore first, then word characters
static COLLECTION_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$").expect("valid collection regex"));

/// Field paths: dot separated segments of word characters
static FIELD_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*$").expect("valid field regex")
});

/// SQL keywords rejected as collection names
static SQL_KEYWORDS: &[&str] = &[
    "SELECT", "INSERT", "UPDATE", "DELETE", "FROM", "WHERE", "JOIN", "UNION", "DROP", "CREATE",
    "ALTER", "GRANT", "REVOKE", "TRUNCATE", "TABLE", "INDEX", "USER", "ORDER", "GROUP",
];

/// Escape a SQL identifier by doubling quotes and wrapping it in double quotes
///
/// ```
/// use strata_orm::security::escape_identifier;
///
/// assert_eq!(escape_identifier("users"), "\"users\"");
/// assert_eq!(escape_identifier("we\"ird"), "\"we\"\"ird\"");
/// ```
pub fn escape_identifier(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

/// Validate a collection name before it is used as a table name
pub fn validate_collection_name(name: &str) -> OrmResult<()> {
    if !COLLECTION_NAME.is_match(name) {
        return Err(OrmError::Validation(format!(
            "Collection name '{}' must start with a letter or underscore and contain only \
             letters, digits and underscores (max 63 characters)",
            name
        )));
    }
    if SQL_KEYWORDS.contains(&name.to_uppercase().as_str()) {
        return Err(OrmError::Validation(format!(
            "Collection name '{}' is a reserved SQL keyword",
            name
        )));
    }
    Ok(())
}

/// Validate a field path used in DDL
pub fn validate_field_path(field: &str) -> OrmResult<()> {
    if !FIELD_PATH.is_match(field) {
        return Err(OrmError::Validation(format!(
            "Field '{}' is not a valid document path",
            field
        )));
    }
    Ok(())
}
