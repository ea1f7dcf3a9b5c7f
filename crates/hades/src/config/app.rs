//! Application configuration for the Hades server.

use serde::Deserialize;

use crate::db::{TableKind, TableLookup};
use crate::error::{AppError, AppResult};

/// Application configuration loaded from environment variables.
///
/// Environment variables are prefixed with `HADES_`:
/// - `HADES_HOST`: Server bind address (default: "0.0.0.0")
/// - `HADES_PORT`: Server port (default: 5000)
/// - `HADES_ACTIVE_TABLES`: Comma separated tables accepting registrations
/// - `HADES_ACTIVE_EVENTS`: Comma separated display names of running events
/// - `HADES_SESSION_TTL_HOURS`: Admin session lifetime (default: 8)
/// - `HADES_CORS_PERMISSIVE`: Allow any origin (default: true)
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server bind address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Tables currently accepting registrations
    #[serde(default = "default_active_tables")]
    pub active_tables: Vec<String>,

    /// Names of the currently running events
    #[serde(default = "default_active_events")]
    pub active_events: Vec<String>,

    /// Session lifetime in hours
    #[serde(default = "default_session_ttl_hours")]
    pub session_ttl_hours: i64,

    /// Allow requests from any origin
    #[serde(default = "default_true")]
    pub cors_permissive: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_active_tables() -> Vec<String> {
    vec!["coursera_2020".to_string()]
}

fn default_active_events() -> Vec<String> {
    vec!["Coursera 2020".to_string()]
}

fn default_session_ttl_hours() -> i64 {
    8
}

fn default_true() -> bool {
    true
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables are prefixed with `HADES_`.
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::prefixed("HADES_").from_env::<AppConfig>()
    }

    /// Get the server bind address as a string suitable for `TcpListener::bind`.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Resolve the active tables against the registry.
    ///
    /// Every entry must name a known table that has the registrant columns.
    pub fn active_table_kinds(&self) -> AppResult<Vec<TableKind>> {
        self.active_tables
            .iter()
            .map(|name| name.trim())
            .filter(|name| !name.is_empty())
            .map(|name| match TableKind::lookup(name) {
                TableLookup::Known(kind) if kind.is_registrant() => Ok(kind),
                TableLookup::Known(_) => Err(AppError::Config(format!(
                    "Table {} cannot take registrations",
                    name
                ))),
                TableLookup::Unknown => {
                    Err(AppError::Config(format!("Table {} does not exist", name)))
                }
            })
            .collect()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            active_tables: default_active_tables(),
            active_events: default_active_events(),
            session_ttl_hours: default_session_ttl_hours(),
            cors_permissive: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 5000);
        assert_eq!(config.session_ttl_hours, 8);
    }

    #[test]
    fn test_bind_address() {
        let config = AppConfig::default();
        assert_eq!(config.bind_address(), "0.0.0.0:5000");
    }

    #[test]
    fn test_active_table_kinds() {
        let mut config = AppConfig::default();
        config.active_tables = vec!["test_users".to_string(), " bov_2020 ".to_string()];
        assert_eq!(
            config.active_table_kinds().unwrap(),
            vec![TableKind::TestUsers, TableKind::Bov2020]
        );
    }

    #[test]
    fn test_active_tables_rejects_unknown_and_non_registrant() {
        let mut config = AppConfig::default();
        config.active_tables = vec!["nope".to_string()];
        assert!(matches!(
            config.active_table_kinds(),
            Err(AppError::Config(ref m)) if m == "Table nope does not exist"
        ));

        config.active_tables = vec!["users".to_string()];
        let err = config.active_table_kinds().unwrap_err();
        assert!(matches!(err, AppError::Config(ref m) if m.contains("cannot take registrations")));
    }
}
