//! Hades Library
//!
//! Event registration backend. Each event owns a registrant table; a
//! submitted form becomes one row, and the registrant gets a QR payload, a
//! confirmation mail and a chat announcement.
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading from environment variables
//! - [`db`]: Record schemas, the table registry and generic queries
//! - [`auth`]: Secret hashing, sessions and request authentication
//! - [`notify`]: Mail, chat and QR payloads
//! - [`services`]: Registration, account and admin logic
//! - [`handlers`]: HTTP route handlers and the router
//! - [`migrate`]: Database to database copy of every registered table
//! - [`error`]: Custom error types with Axum integration
//! - [`state`]: Shared application state
//!
//! ## Example
//!
//! ```ignore
//! use hades::{
//!     config::{AppConfig, DatabaseConfig},
//!     db::create_pool,
//!     state::AppState,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let app_config = AppConfig::from_env()?;
//!     let db_config = DatabaseConfig::from_env()?;
//!     let db_pool = create_pool(&db_config).await?;
//!     let state = AppState::new(db_pool, app_config, Default::default());
//!     // ... build services and run the router
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod migrate;
pub mod notify;
pub mod result_ext;
pub mod services;
pub mod state;

pub use error::{AppError, AppResult};
pub use result_ext::ResultExt;
