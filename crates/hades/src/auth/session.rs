//! In-memory admin sessions.
//!
//! Sessions live for a fixed TTL and are dropped on logout, password
//! change or expiry. Restarting the server signs everyone out.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::db::models::CurrentUser;

/// Cookie carrying the session token.
pub const SESSION_COOKIE: &str = "session_token";

/// A signed-in session.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub user: CurrentUser,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Token to session map shared across requests.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    /// Open a session for `user` and return it.
    pub async fn create(&self, user: CurrentUser) -> Session {
        let session = Session {
            token: Uuid::new_v4().simple().to_string(),
            user,
            expires_at: Utc::now() + self.ttl,
        };

        let mut guard = self.sessions.write().await;
        guard.retain(|_, s| !s.is_expired(Utc::now()));
        guard.insert(session.token.clone(), session.clone());

        tracing::debug!(username = %session.user.username, "Session created");
        session
    }

    /// Look up a live session. Expired sessions are removed.
    pub async fn get(&self, token: &str) -> Option<Session> {
        let now = Utc::now();
        {
            let guard = self.sessions.read().await;
            match guard.get(token) {
                Some(session) if !session.is_expired(now) => return Some(session.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        self.sessions.write().await.remove(token);
        tracing::debug!("Session expired");
        None
    }

    /// End a session. Returns whether it existed.
    pub async fn invalidate(&self, token: &str) -> bool {
        self.sessions.write().await.remove(token).is_some()
    }

    /// End every session of a user.
    pub async fn invalidate_user(&self, username: &str) -> usize {
        let mut guard = self.sessions.write().await;
        let before = guard.len();
        guard.retain(|_, s| s.user.username != username);
        before - guard.len()
    }

    /// `Set-Cookie` value for a session.
    pub fn cookie(&self, session: &Session) -> String {
        format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            SESSION_COOKIE,
            session.token,
            self.ttl.num_seconds()
        )
    }

    /// `Set-Cookie` value that clears the session cookie.
    pub fn clear_cookie() -> String {
        format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", SESSION_COOKIE)
    }
}
