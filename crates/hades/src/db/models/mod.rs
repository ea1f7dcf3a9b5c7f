//! Database models for Hades.
//!
//! Each model is declared with `record_schema!` and registered in
//! [`TableKind`](crate::db::TableKind).

pub mod account;
pub mod registrant;

pub use account::*;
pub use registrant::*;
