//! Authentication: secret hashing, admin sessions and the request
//! authentication middleware.

pub mod middleware;
pub mod password;
pub mod session;

pub use middleware::{extract_session_token, require_user};
pub use session::{Session, SessionStore, SESSION_COOKIE};
