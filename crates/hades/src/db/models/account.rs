//! Admin accounts, access grants, the event catalog and the TSG roster.

use serde::Serialize;

use crate::db::schema::record_schema;

record_schema! {
    /// An admin account. Secrets are Argon2 PHC strings.
    pub struct User {
        table: "users",
        columns: {
            username: String [Primary],
            name: String,
            email: String [Unique],
            #[serde(skip_serializing)]
            password_hash: String [Secret],
            #[serde(skip_serializing)]
            api_key_hash: Option<String> [Secret],
        }
    }
}

record_schema! {
    /// Grants `user` permission to view the table named `event`.
    pub struct Access {
        table: "access",
        references: [user => ("users", "username")],
        columns: {
            id: i32 [Primary],
            event: String,
            user: String,
        }
    }
}

record_schema! {
    /// Catalog entry mapping a table name to the event's display name.
    pub struct Event {
        table: "events",
        columns: {
            name: String [Primary],
            full_name: String,
        }
    }
}

record_schema! {
    /// Organisation roster. Members get default grants on sign-up.
    pub struct Tsg {
        table: "tsg",
        columns: {
            id: i32 [Primary],
            name: String,
            email: String [Unique],
            phone: String,
            department: String,
        }
    }
}

/// Signed-in account, as exposed to handlers.
#[derive(Debug, Clone, Serialize)]
pub struct CurrentUser {
    pub username: String,
    pub name: String,
}

impl From<&User> for CurrentUser {
    fn from(user: &User) -> Self {
        Self {
            username: user.username.clone(),
            name: user.name.clone(),
        }
    }
}

/// Tables granted to every new account whose email is on the TSG roster.
pub const TSG_DEFAULT_GRANTS: &[&str] = &["tsg", "test_users"];
