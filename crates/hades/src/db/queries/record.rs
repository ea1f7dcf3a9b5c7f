//! Generic queries over any registered record type.
//!
//! Table and column names come from `Record` constants, never from user
//! input; values are always bound.

use sqlx::{PgConnection, PgExecutor};

use crate::db::schema::{
    create_table_sql, delete_sql, insert_sql, quote_ident, select_by_key_sql, select_sql,
    update_sql, Record,
};
use crate::error::AppResult;

/// Load every row of `R`'s table ordered by primary key.
pub async fn list_records<'e, R: Record, E: PgExecutor<'e>>(executor: E) -> AppResult<Vec<R>> {
    let sql = select_sql::<R>();
    let rows = sqlx::query_as::<_, R>(&sql).fetch_all(executor).await?;
    Ok(rows)
}

/// Load one row by its primary key, given in raw string form.
pub async fn fetch_by_key<'e, R: Record, E: PgExecutor<'e>>(
    executor: E,
    key: &str,
) -> AppResult<Option<R>> {
    let key = R::primary_key().parse(key)?;
    let sql = select_by_key_sql::<R>();
    let row = key
        .bind(sqlx::query(&sql))
        .fetch_optional(executor)
        .await?;
    let record = row.map(|row| R::from_row(&row)).transpose()?;
    Ok(record)
}

/// Insert a record.
pub async fn insert_record<'e, R: Record, E: PgExecutor<'e>>(
    executor: E,
    record: &R,
) -> AppResult<()> {
    let sql = insert_sql::<R>();
    let mut query = sqlx::query(&sql);
    for value in record.values() {
        query = value.bind(query);
    }
    query.execute(executor).await?;
    Ok(())
}

/// Write every non-key column of a record back to its row.
///
/// Returns `false` if no row has the record's key.
pub async fn update_record<'e, R: Record, E: PgExecutor<'e>>(
    executor: E,
    record: &R,
) -> AppResult<bool> {
    let pk = R::primary_key();
    let sql = update_sql::<R>();
    let mut query = sqlx::query(&sql);
    for (column, value) in R::COLUMNS.iter().zip(record.values()) {
        if column.name != pk.name {
            query = value.bind(query);
        }
    }
    let result = record.key_value().bind(query).execute(executor).await?;
    Ok(result.rows_affected() > 0)
}

/// Delete a row by its primary key, given in raw string form.
pub async fn delete_by_key<'e, R: Record, E: PgExecutor<'e>>(
    executor: E,
    key: &str,
) -> AppResult<bool> {
    let key = R::primary_key().parse(key)?;
    let sql = delete_sql::<R>();
    let result = key.bind(sqlx::query(&sql)).execute(executor).await?;
    Ok(result.rows_affected() > 0)
}

/// Create `R`'s table if it does not exist yet.
pub async fn create_table<'e, R: Record, E: PgExecutor<'e>>(executor: E) -> AppResult<()> {
    sqlx::query(&create_table_sql::<R>())
        .execute(executor)
        .await?;
    Ok(())
}

/// Block concurrent writers to `table` until the surrounding transaction ends.
///
/// Readers are not blocked; a second submission waits here instead of
/// reading the same maximum id.
pub async fn lock_for_insert(conn: &mut PgConnection, table: &str) -> AppResult<()> {
    sqlx::query(&format!(
        "LOCK TABLE {} IN SHARE ROW EXCLUSIVE MODE",
        quote_ident(table)
    ))
    .execute(conn)
    .await?;
    Ok(())
}

/// Next identity key: current maximum `id` plus one, 1 for an empty table.
///
/// Only race free after [`lock_for_insert`] in the same transaction.
pub async fn next_id(conn: &mut PgConnection, table: &str) -> AppResult<i32> {
    let (id,): (i32,) = sqlx::query_as(&format!(
        "SELECT COALESCE(MAX(\"id\"), 0) + 1 FROM {}",
        quote_ident(table)
    ))
    .fetch_one(conn)
    .await?;
    Ok(id)
}

/// Whether any row of `table` has exactly this email.
pub async fn email_exists(conn: &mut PgConnection, table: &str, email: &str) -> AppResult<bool> {
    let (exists,): (bool,) = sqlx::query_as(&format!(
        "SELECT EXISTS (SELECT 1 FROM {} WHERE \"email\" = $1)",
        quote_ident(table)
    ))
    .bind(email)
    .fetch_one(conn)
    .await?;
    Ok(exists)
}

/// Whether any row of `table` mentions this phone number.
///
/// Stored phones may hold several numbers joined by `|`, so this is a
/// substring match.
pub async fn phone_exists(conn: &mut PgConnection, table: &str, phone: &str) -> AppResult<bool> {
    let (exists,): (bool,) = sqlx::query_as(&format!(
        "SELECT EXISTS (SELECT 1 FROM {} WHERE strpos(\"phone\", $1) > 0)",
        quote_ident(table)
    ))
    .bind(phone)
    .fetch_one(conn)
    .await?;
    Ok(exists)
}

/// Base tables of the `public` schema.
pub async fn list_tables<'e, E: PgExecutor<'e>>(executor: E) -> AppResult<Vec<String>> {
    let tables: Vec<(String,)> = sqlx::query_as(
        r#"
        SELECT table_name::text
        FROM information_schema.tables
        WHERE table_schema = 'public' AND table_type = 'BASE TABLE'
        ORDER BY table_name
        "#,
    )
    .fetch_all(executor)
    .await?;

    Ok(tables.into_iter().map(|(name,)| name).collect())
}
