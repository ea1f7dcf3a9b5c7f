//! Application state for the Hades server.
//!
//! This module defines the shared application state that is
//! passed to the health handlers via Axum's state management.

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::notify::Notifier;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: DbPool,

    /// Application configuration
    pub config: Arc<AppConfig>,

    /// Outgoing mail and chat channels
    pub notifier: Notifier,

    /// Server start time for uptime calculation
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(db: DbPool, config: AppConfig, notifier: Notifier) -> Self {
        Self {
            db,
            config: Arc::new(config),
            notifier,
            start_time: std::time::Instant::now(),
        }
    }

    /// Get the server uptime in seconds.
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
