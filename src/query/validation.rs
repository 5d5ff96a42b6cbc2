//! Input checks applied before any request reaches the platform.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::AppError;

/// Destructive statement shapes that are always refused.
static BLOCKED_STATEMENTS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\bDROP\s+DATABASE\b",
        r"(?i)\bDROP\s+SCHEMA\b",
        r"(?i)\bDROP\s+TABLE\b",
        r"(?i)\bTRUNCATE\s+TABLE\b",
        // DELETE with nothing between the table name and the statement end.
        r"(?i)\bDELETE\s+FROM\s+[\w.]+\s*(;|$)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid blocklist pattern"))
    .collect()
});

/// UPDATE statements are refused only when they carry no WHERE clause.
static UPDATE_STATEMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bUPDATE\s+[\w.]+\s+SET\s+[^;]*(;|$)").expect("valid pattern"));
static WHERE_CLAUSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bWHERE\b").expect("valid pattern"));

/// Quoted text and comments, blanked out before looking for WHERE. An
/// unterminated quote or block comment runs to the end of the statement.
static QUOTED_OR_COMMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"'(?:[^']|'')*(?:'|$)|"(?:[^"]|"")*(?:"|$)|--[^\n]*|(?s:/\*.*?(?:\*/|$))"#)
        .expect("valid pattern")
});

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("valid pattern"));

static SECRET_LITERAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\b(password|token)\s*=\s*['"][^'"]*['"]"#).expect("valid pattern")
});

const LOG_PREVIEW_CHARS: usize = 200;

/// Returns the trimmed statement, or a `Validation` error if it is empty or destructive.
pub fn validate_sql(sql: &str) -> Result<&str, AppError> {
    let trimmed = sql.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation("SQL query cannot be empty".into()));
    }

    let code = QUOTED_OR_COMMENT.replace_all(trimmed, " ");
    let blocked = BLOCKED_STATEMENTS.iter().any(|re| re.is_match(trimmed))
        || UPDATE_STATEMENT
            .find_iter(&code)
            .any(|m| !WHERE_CLAUSE.is_match(m.as_str()));

    if blocked {
        return Err(AppError::Validation(
            "Query contains potentially dangerous operations. \
             Please contact an administrator for destructive operations."
                .into(),
        ));
    }
    Ok(trimmed)
}

/// Catalog, schema and table names: ASCII alphanumerics, `_` and `-` only.
pub fn validate_identifier<'a>(value: &'a str, label: &str) -> Result<&'a str, AppError> {
    if value.is_empty() {
        return Err(AppError::Validation(format!("{} must be a non-empty string", label)));
    }
    if !IDENTIFIER.is_match(value) {
        return Err(AppError::Validation(format!(
            "{} contains invalid characters. Only alphanumeric, underscore, and hyphen are allowed.",
            label
        )));
    }
    Ok(value)
}

/// Truncated, secret-masked rendering of a statement for log lines.
pub fn sanitize_for_log(sql: &str) -> String {
    let mut preview: String = sql.chars().take(LOG_PREVIEW_CHARS).collect();
    if sql.chars().count() > LOG_PREVIEW_CHARS {
        preview.push_str("...");
    }
    SECRET_LITERAL.replace_all(&preview, "$1='***'").into_owned()
}
