//! Database queries for Hades.
//!
//! `record` holds the queries that work for any registered table;
//! `account` holds the fixed-table queries behind authentication and grants.

pub mod account;
pub mod record;
