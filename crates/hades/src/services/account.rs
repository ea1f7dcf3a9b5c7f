//! Account service: sign-up, sign-in and the request authentication
//! schemes.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};

use crate::auth::password::{generate_api_key, hash_secret, verify_secret};
use crate::auth::session::{Session, SessionStore};
use crate::db::models::{Access, CurrentUser, User, TSG_DEFAULT_GRANTS};
use crate::db::queries::{account as queries, record};
use crate::db::{DbPool, Record, RowState};
use crate::error::{AppError, AppResult};
use crate::notify::Notifier;

/// Sign-up form. Every field is required.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterForm {
    pub name: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub email: Option<String>,
}

/// A created account and its API key, shown exactly once.
#[derive(Debug, Clone, Serialize)]
pub struct RegisteredAccount {
    pub username: String,
    pub api_key: String,
    pub granted: Vec<String>,
    pub message: String,
}

/// Service for accounts and authentication.
#[derive(Clone)]
pub struct AccountService {
    pool: DbPool,
    sessions: SessionStore,
    notifier: Notifier,
}

impl AccountService {
    pub fn new(pool: DbPool, sessions: SessionStore, notifier: Notifier) -> Self {
        Self {
            pool,
            sessions,
            notifier,
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Create an account. TSG members get the default grants.
    pub async fn register(&self, form: RegisterForm) -> AppResult<RegisteredAccount> {
        let require = |value: Option<String>, field: &str| {
            value.ok_or_else(|| AppError::Validation(format!("{} is required!", field)))
        };
        let name = require(form.name, "name")?;
        let username = require(form.username, "username")?;
        let password = require(form.password, "password")?;
        let email = require(form.email, "email")?;

        let api_key = generate_api_key();
        let user = User {
            username: username.clone(),
            name,
            email,
            password_hash: hash_secret(&password)?,
            api_key_hash: Some(hash_secret(&api_key)?),
            state: RowState::Transient,
        };

        let mut tx = self.pool.begin().await?;
        let mut granted = Vec::new();
        let result: AppResult<()> = async {
            record::insert_record(&mut *tx, &user).await?;

            if queries::is_tsg_member(&mut *tx, &user.email).await? {
                record::lock_for_insert(&mut *tx, Access::TABLE).await?;
                for table in TSG_DEFAULT_GRANTS {
                    let grant = Access {
                        id: record::next_id(&mut *tx, Access::TABLE).await?,
                        event: table.to_string(),
                        user: username.clone(),
                        state: RowState::Transient,
                    };
                    record::insert_record(&mut *tx, &grant).await?;
                    granted.push(table.to_string());
                }
            }
            Ok(())
        }
        .await;

        match result {
            Ok(()) => tx.commit().await?,
            Err(AppError::Integrity(detail)) => {
                tracing::warn!(username = %username, error = %detail, "Account rejected");
                return Err(AppError::BadRequest(
                    "Integrity constraint violated, please re-check your data!".to_string(),
                ));
            }
            Err(e) => return Err(e),
        }

        self.notifier
            .log(&format!(
                "User <code>{}</code> account has been registered!",
                user.name
            ))
            .await;

        Ok(RegisteredAccount {
            message: format!(
                "Hello {}, your account has been successfully created. If you wish to use an API Key for sending requests, your key is {}. Don't share it with anyone, if you're unsure of what it is, you don't need it",
                username, api_key
            ),
            username,
            api_key,
            granted,
        })
    }

    /// Check a password and open a session.
    pub async fn login(&self, username: &str, password: &str) -> AppResult<Session> {
        let user = queries::get_user(&self.pool, username)
            .await?
            .ok_or_else(|| AppError::Auth(format!("{} doesn't exist!", username)))?;

        if !verify_secret(&user.password_hash, password) {
            return Err(AppError::Auth(format!(
                "Wrong password for {}!",
                user.username
            )));
        }

        self.notifier
            .log(&format!("User <code>{}</code> logged in via webpage!", user.name))
            .await;
        Ok(self.sessions.create(CurrentUser::from(&user)).await)
    }

    /// Authenticate a `Credentials` header: base64 of `username|password`.
    ///
    /// Malformed headers and wrong passwords both yield `None`.
    pub async fn authenticate_credentials(
        &self,
        header: &str,
        method: &str,
    ) -> AppResult<Option<CurrentUser>> {
        let Some((username, password)) = decode_credentials(header) else {
            return Ok(None);
        };
        let Some(user) = queries::get_user(&self.pool, &username).await? else {
            return Ok(None);
        };
        if !verify_secret(&user.password_hash, password.trim()) {
            return Ok(None);
        }

        self.notifier
            .log(&format!(
                "User <code>{}</code> just authenticated a {} API call with credentials!",
                user.name, method
            ))
            .await;
        Ok(Some(CurrentUser::from(&user)))
    }

    /// Authenticate an `Authorization` header holding an API key, with or
    /// without a `Basic ` prefix.
    pub async fn authenticate_api_key(
        &self,
        header: &str,
        method: &str,
    ) -> AppResult<Option<CurrentUser>> {
        let key = strip_basic(header);
        if key.is_empty() {
            return Ok(None);
        }

        let users = queries::list_users_with_api_key(&self.pool).await?;
        let matched = users.iter().find(|user| {
            user.api_key_hash
                .as_deref()
                .is_some_and(|hash| verify_secret(hash, key))
        });
        let Some(user) = matched else {
            return Ok(None);
        };

        self.notifier
            .log(&format!(
                "User <code>{}</code> just authenticated a {} API call with an API key!",
                user.name, method
            ))
            .await;
        Ok(Some(CurrentUser::from(user)))
    }

    /// Resolve a session token.
    pub async fn session_user(&self, token: &str) -> Option<CurrentUser> {
        self.sessions.get(token).await.map(|s| s.user)
    }

    /// Replace the password and end every session of the user.
    pub async fn change_password(
        &self,
        user: &CurrentUser,
        current_password: &str,
        new_password: &str,
    ) -> AppResult<()> {
        let stored = queries::get_user(&self.pool, &user.username)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{} doesn't exist!", user.username)))?;

        if !verify_secret(&stored.password_hash, current_password) {
            return Err(AppError::Auth(
                "Current password you entered is wrong! Please try again!".to_string(),
            ));
        }

        let hash = hash_secret(new_password)?;
        queries::update_password_hash(&self.pool, &user.username, &hash).await?;
        let ended = self.sessions.invalidate_user(&user.username).await;
        tracing::debug!(username = %user.username, sessions = ended, "Password changed");

        self.notifier
            .log(&format!(
                "<code>{}</code> has updated their password!",
                user.name
            ))
            .await;
        Ok(())
    }

    /// End a session.
    pub async fn logout(&self, user: &CurrentUser, token: Option<&str>) -> String {
        if let Some(token) = token {
            self.sessions.invalidate(token).await;
        }
        format!("Logged out of {}'s account!", user.name)
    }
}

/// Split a `Credentials` header into username and password.
pub fn decode_credentials(header: &str) -> Option<(String, String)> {
    let bytes = BASE64.decode(header.trim()).ok()?;
    let decoded = String::from_utf8(bytes).ok()?;
    let (username, password) = decoded.split_once('|')?;
    Some((username.to_string(), password.to_string()))
}

pub fn strip_basic(header: &str) -> &str {
    let header = header.trim();
    header.strip_prefix("Basic ").unwrap_or(header)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_credentials() {
        let header = BASE64.encode("alice|s3cr|et ");
        assert_eq!(
            decode_credentials(&header),
            Some(("alice".to_string(), "s3cr|et ".to_string()))
        );
    }

    #[test]
    fn test_decode_credentials_rejects_garbage() {
        assert_eq!(decode_credentials("not base64!"), None);
        assert_eq!(decode_credentials(&BASE64.encode("no separator")), None);
        assert_eq!(decode_credentials(&BASE64.encode([0xff, 0xfe, b'|'])), None);
    }

    #[test]
    fn test_strip_basic() {
        assert_eq!(strip_basic("Basic abc123"), "abc123");
        assert_eq!(strip_basic("abc123"), "abc123");
        assert_eq!(strip_basic("Basic Basic x"), "Basic x");
    }
}
