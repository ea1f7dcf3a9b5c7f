//! Account endpoints: sign-up, login, logout and password change.

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Extension, Form, Json,
};
use serde::{Deserialize, Serialize};

use super::MessageResponse;
use crate::auth::{extract_session_token, SessionStore};
use crate::db::models::CurrentUser;
use crate::error::{AppError, AppResult};
use crate::services::account::{RegisterForm, RegisteredAccount};
use crate::services::AccountService;

/// Where to go after logging in when no `next` is given.
pub const DEFAULT_NEXT: &str = "/events";

#[derive(Debug, Deserialize, Default)]
pub struct LoginQuery {
    pub next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub response: String,
    pub session_token: String,
    pub next: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordForm {
    pub current_password: String,
    pub new_password: String,
}

/// Whether `next` is a path on this site.
///
/// Only relative paths are accepted; anything with a scheme, a host or a
/// protocol-relative prefix could send the user elsewhere.
pub fn is_safe_next(next: &str) -> bool {
    next.starts_with('/')
        && !next.starts_with("//")
        && !next.contains('\\')
        && !next.chars().any(char::is_control)
}

/// Log in with a form.
///
/// `POST /login?next=/events`
///
/// Sets the session cookie and returns the token for clients that send it
/// in `X-Session-Token` instead.
pub async fn login(
    State(accounts): State<AccountService>,
    Query(query): Query<LoginQuery>,
    Form(form): Form<LoginForm>,
) -> AppResult<Response> {
    let next = query.next.unwrap_or_else(|| DEFAULT_NEXT.to_string());
    if !is_safe_next(&next) {
        tracing::warn!(next = %next, "Rejected login redirect");
        return Err(AppError::BadRequest(format!("Unsafe redirect target {}", next)));
    }

    let session = accounts.login(&form.username, &form.password).await?;
    let cookie = accounts.sessions().cookie(&session);
    let body = LoginResponse {
        response: format!("Logged in as {}!", session.user.name),
        session_token: session.token,
        next,
    };

    Ok(([(header::SET_COOKIE, cookie)], Json(body)).into_response())
}

/// Create an account.
///
/// `POST /register`
///
/// The generated API key is only ever shown in this response.
pub async fn register(
    State(accounts): State<AccountService>,
    Form(form): Form<RegisterForm>,
) -> AppResult<(StatusCode, Json<RegisteredAccount>)> {
    let account = accounts.register(form).await?;
    Ok((StatusCode::CREATED, Json(account)))
}

/// End the current session.
///
/// `GET /logout`
pub async fn logout(
    State(accounts): State<AccountService>,
    Extension(user): Extension<CurrentUser>,
    headers: HeaderMap,
) -> Response {
    let message = accounts
        .logout(&user, extract_session_token(&headers))
        .await;
    (
        [(header::SET_COOKIE, SessionStore::clear_cookie())],
        Json(MessageResponse::new(message)),
    )
        .into_response()
}

/// Change the password and sign out everywhere.
///
/// `POST /changepassword`
pub async fn change_password(
    State(accounts): State<AccountService>,
    Extension(user): Extension<CurrentUser>,
    Form(form): Form<ChangePasswordForm>,
) -> AppResult<Response> {
    accounts
        .change_password(&user, &form.current_password, &form.new_password)
        .await?;
    Ok((
        [(header::SET_COOKIE, SessionStore::clear_cookie())],
        Json(MessageResponse::new(
            "Your password has been updated, please log in again!",
        )),
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_next() {
        assert!(is_safe_next("/events"));
        assert!(is_safe_next("/update?table=bov_2020"));
        assert!(!is_safe_next("//evil.example.com"));
        assert!(!is_safe_next("https://evil.example.com/"));
        assert!(!is_safe_next("/\\evil.example.com"));
        assert!(!is_safe_next("events"));
        assert!(!is_safe_next(""));
    }
}
