//! Database module for Hades.
//!
//! This module provides database connectivity, the table registry,
//! record schemas and the generic queries over them, using SQLx.

pub mod models;
pub mod pool;
pub mod queries;
pub mod registry;
pub mod schema;

pub use pool::{create_pool, create_pool_from_url, DbPool};
pub use registry::{TableKind, TableLookup};
pub use schema::{FieldMap, Record, RecordError, RowState};
