//! Service layer for Hades.
//!
//! Services encapsulate business logic and coordinate
//! between handlers and database queries.

pub mod account;
pub mod admin;
pub mod registration;

pub use account::AccountService;
pub use admin::AdminService;
pub use registration::RegistrationService;
