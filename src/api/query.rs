use crate::error::{Error, Result};
use serde_json::Value;
use sqlx::PgPool;

const STATEMENT_TIMEOUT: &str = "5s";

/// Accepts a single statement that lexically starts with `select`, ignoring case and leading
/// whitespace. Returns the statement with surrounding whitespace and one trailing `;` removed.
pub fn check_select(query: &str) -> Result<&str> {
    let statement = query.trim();
    let statement = statement.strip_suffix(';').unwrap_or(statement).trim_end();

    let starts_with_select = statement
        .get(..6)
        .is_some_and(|head| head.eq_ignore_ascii_case("select"));
    if !starts_with_select {
        return Err(Error::QueryRejected("Only SELECT queries are allowed".to_string()));
    }

    if statement.contains(';') {
        return Err(Error::QueryRejected("Only a single statement is allowed".to_string()));
    }

    Ok(statement)
}

/// Runs a checked SELECT in a read-only transaction and returns its rows as a JSON array.
pub async fn run_select(pool: &PgPool, query: &str) -> Result<Value> {
    let statement = check_select(query)?;

    let mut tx = pool.begin().await?;
    sqlx::query("SET TRANSACTION READ ONLY").execute(&mut *tx).await?;
    sqlx::query(&format!("SET LOCAL statement_timeout = '{}'", STATEMENT_TIMEOUT))
        .execute(&mut *tx)
        .await?;

    let wrapped = format!("SELECT COALESCE(json_agg(q), '[]'::json) FROM ({}) q", statement);
    let rows: Value = sqlx::query_scalar(&wrapped).fetch_one(&mut *tx).await?;

    tx.rollback().await?;
    Ok(rows)
}
