//! HTTP handlers for the Hades API.
//!
//! This module contains all route handlers organized by domain, and the
//! router that wires them together.

pub mod admin;
pub mod auth;
pub mod health;
pub mod submit;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::require_user;
use crate::services::{AccountService, AdminService, RegistrationService};
use crate::state::AppState;

pub use health::{api_health, health_check, root};

/// Plain message body, `{"response": "..."}`.
#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub response: String,
}

impl MessageResponse {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
        }
    }
}

/// Services the routes dispatch to.
#[derive(Clone)]
pub struct Services {
    pub registration: RegistrationService,
    pub accounts: AccountService,
    pub admin: AdminService,
}

/// Build the application router with all routes.
pub fn router(state: AppState, services: Services) -> Router {
    let cors = if state.config.cors_permissive {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        CorsLayer::new()
    };
    let authenticated = middleware::from_fn_with_state(services.accounts.clone(), require_user);

    // Health check routes (no auth required)
    let health_routes = Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/api/health", get(api_health))
        .with_state(state);

    let registration_routes = Router::new()
        .route("/submit", post(submit::submit))
        .with_state(services.registration);

    let account_routes = Router::new()
        .route("/logout", get(auth::logout))
        .route("/changepassword", post(auth::change_password))
        .route_layer(authenticated.clone())
        .route("/login", post(auth::login))
        .route("/register", post(auth::register))
        .with_state(services.accounts);

    let admin_routes = Router::new()
        .route("/events", get(admin::events).post(admin::list))
        .route("/update", get(admin::fields).post(admin::update))
        .route("/delete", post(admin::delete))
        .route_layer(authenticated)
        .with_state(services.admin);

    Router::new()
        .merge(health_routes)
        .merge(registration_routes)
        .merge(account_routes)
        .merge(admin_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
