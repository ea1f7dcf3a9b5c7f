//! Account, grant and event catalog queries.

use sqlx::PgExecutor;

use crate::db::models::{Event, User};
use crate::error::AppResult;

/// Get a user by username.
pub async fn get_user<'e, E: PgExecutor<'e>>(executor: E, username: &str) -> AppResult<Option<User>> {
    let user = sqlx::query_as::<_, User>(
        r#"
        SELECT username, name, email, password_hash, api_key_hash
        FROM users
        WHERE username = $1
        "#,
    )
    .bind(username)
    .fetch_optional(executor)
    .await?;

    Ok(user)
}

/// Users that have an API key.
pub async fn list_users_with_api_key<'e, E: PgExecutor<'e>>(executor: E) -> AppResult<Vec<User>> {
    let users = sqlx::query_as::<_, User>(
        r#"
        SELECT username, name, email, password_hash, api_key_hash
        FROM users
        WHERE api_key_hash IS NOT NULL
        "#,
    )
    .fetch_all(executor)
    .await?;

    Ok(users)
}

/// Replace a user's password hash.
pub async fn update_password_hash<'e, E: PgExecutor<'e>>(
    executor: E,
    username: &str,
    password_hash: &str,
) -> AppResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE users
        SET password_hash = $2
        WHERE username = $1
        "#,
    )
    .bind(username)
    .bind(password_hash)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Whether the email is on the TSG roster.
pub async fn is_tsg_member<'e, E: PgExecutor<'e>>(executor: E, email: &str) -> AppResult<bool> {
    let (member,): (bool,) =
        sqlx::query_as("SELECT EXISTS (SELECT 1 FROM tsg WHERE email = $1)")
            .bind(email)
            .fetch_one(executor)
            .await?;

    Ok(member)
}

/// Whether `username` holds a grant on `table`.
pub async fn has_access<'e, E: PgExecutor<'e>>(
    executor: E,
    username: &str,
    table: &str,
) -> AppResult<bool> {
    let (granted,): (bool,) = sqlx::query_as(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM access WHERE "user" = $1 AND event = $2
        )
        "#,
    )
    .bind(username)
    .bind(table)
    .fetch_one(executor)
    .await?;

    Ok(granted)
}

/// Events the user holds a grant on.
pub async fn accessible_events<'e, E: PgExecutor<'e>>(
    executor: E,
    username: &str,
) -> AppResult<Vec<Event>> {
    let events = sqlx::query_as::<_, Event>(
        r#"
        SELECT DISTINCT e.name, e.full_name
        FROM events e
        JOIN access a ON a.event = e.name
        WHERE a."user" = $1
        ORDER BY e.name
        "#,
    )
    .bind(username)
    .fetch_all(executor)
    .await?;

    Ok(events)
}

/// Display name of an event, if it is in the catalog.
pub async fn event_full_name<'e, E: PgExecutor<'e>>(
    executor: E,
    name: &str,
) -> AppResult<Option<String>> {
    let full_name: Option<(String,)> =
        sqlx::query_as("SELECT full_name FROM events WHERE name = $1")
            .bind(name)
            .fetch_optional(executor)
            .await?;

    Ok(full_name.map(|(n,)| n))
}
