//! Request authentication for the admin routes.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use super::session::SESSION_COOKIE;
use crate::db::models::CurrentUser;
use crate::services::AccountService;

/// Middleware to authenticate a request and inject the [`CurrentUser`].
///
/// Tries the `Credentials` header, then an API key in `Authorization`,
/// then the session cookie or `X-Session-Token` header.
pub async fn require_user(
    State(accounts): State<AccountService>,
    mut request: Request,
    next: Next,
) -> Result<Response, Response> {
    // Owned copies: the request body is not Sync, so nothing borrowed from
    // the request may be held across an await.
    let method = request.method().to_string();
    let headers = request.headers();
    let credentials = header_str(headers, "credentials").map(str::to_string);
    let api_key = header_str(headers, "authorization").map(str::to_string);
    let token = extract_session_token(headers).map(str::to_string);

    let mut user = None;

    if let Some(credentials) = credentials {
        user = accounts
            .authenticate_credentials(&credentials, &method)
            .await
            .map_err(IntoResponse::into_response)?;
    }

    if user.is_none() {
        if let Some(api_key) = api_key {
            user = accounts
                .authenticate_api_key(&api_key, &method)
                .await
                .map_err(IntoResponse::into_response)?;
        }
    }

    if user.is_none() {
        if let Some(token) = token {
            user = accounts.session_user(&token).await;
        }
    }

    let Some(user) = user else {
        tracing::warn!(method = %method, path = %request.uri().path(), "Unauthenticated request");
        return Err(access_denied());
    };

    tracing::debug!(username = %user.username, "Authenticated request");
    request.extensions_mut().insert::<CurrentUser>(user);
    Ok(next.run(request).await)
}

fn access_denied() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "response": "Access denied" })),
    )
        .into_response()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty())
}

/// Extract the session token from the `X-Session-Token` header or cookie.
pub fn extract_session_token(headers: &HeaderMap) -> Option<&str> {
    if let Some(token) = header_str(headers, "x-session-token") {
        return Some(token);
    }

    headers
        .get_all("cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|cookie| cookie.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_token_from_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-session-token", HeaderValue::from_static("abc"));
        headers.insert("cookie", HeaderValue::from_static("session_token=def"));
        assert_eq!(extract_session_token(&headers), Some("abc"));
    }

    #[test]
    fn test_token_from_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "cookie",
            HeaderValue::from_static("theme=dark; session_token=def; lang=en"),
        );
        assert_eq!(extract_session_token(&headers), Some("def"));
    }

    #[test]
    fn test_no_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_session_token(&headers), None);
        headers.insert("cookie", HeaderValue::from_static("session_token="));
        assert_eq!(extract_session_token(&headers), None);
    }
}
